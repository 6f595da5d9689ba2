//! Kana to phoneme table (consonant, vowel) used by the notation codec and the mock analyzer.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::types::UNVOICED_VOWELS;

/// Longest kana spelling of a single mora, in characters.
pub(crate) const MAX_MORA_CHARS: usize = 2;

const MORA_LIST_MINIMUM: &[(&str, &str, &str)] = &[
    ("ヴォ", "v", "o"), ("ヴェ", "v", "e"), ("ヴィ", "v", "i"), ("ヴァ", "v", "a"), ("ヴ", "v", "u"),
    ("ン", "", "N"),
    ("ワ", "w", "a"),
    ("ロ", "r", "o"), ("レ", "r", "e"), ("ル", "r", "u"),
    ("リョ", "ry", "o"), ("リュ", "ry", "u"), ("リャ", "ry", "a"), ("リェ", "ry", "e"), ("リ", "r", "i"),
    ("ラ", "r", "a"),
    ("ヨ", "y", "o"), ("ユ", "y", "u"), ("ヤ", "y", "a"),
    ("モ", "m", "o"), ("メ", "m", "e"), ("ム", "m", "u"),
    ("ミョ", "my", "o"), ("ミュ", "my", "u"), ("ミャ", "my", "a"), ("ミェ", "my", "e"), ("ミ", "m", "i"),
    ("マ", "m", "a"),
    ("ポ", "p", "o"), ("ボ", "b", "o"), ("ホ", "h", "o"),
    ("ペ", "p", "e"), ("ベ", "b", "e"), ("ヘ", "h", "e"),
    ("プ", "p", "u"), ("ブ", "b", "u"),
    ("フォ", "f", "o"), ("フェ", "f", "e"), ("フィ", "f", "i"), ("ファ", "f", "a"), ("フ", "f", "u"),
    ("ピョ", "py", "o"), ("ピュ", "py", "u"), ("ピャ", "py", "a"), ("ピェ", "py", "e"), ("ピ", "p", "i"),
    ("ビョ", "by", "o"), ("ビュ", "by", "u"), ("ビャ", "by", "a"), ("ビェ", "by", "e"), ("ビ", "b", "i"),
    ("ヒョ", "hy", "o"), ("ヒュ", "hy", "u"), ("ヒャ", "hy", "a"), ("ヒェ", "hy", "e"), ("ヒ", "h", "i"),
    ("パ", "p", "a"), ("バ", "b", "a"), ("ハ", "h", "a"),
    ("ノ", "n", "o"), ("ネ", "n", "e"), ("ヌ", "n", "u"),
    ("ニョ", "ny", "o"), ("ニュ", "ny", "u"), ("ニャ", "ny", "a"), ("ニェ", "ny", "e"), ("ニ", "n", "i"),
    ("ナ", "n", "a"),
    ("ドゥ", "d", "u"), ("ド", "d", "o"), ("トゥ", "t", "u"), ("ト", "t", "o"),
    ("デョ", "dy", "o"), ("デュ", "dy", "u"), ("デャ", "dy", "a"), ("ディ", "d", "i"), ("デ", "d", "e"),
    ("テョ", "ty", "o"), ("テュ", "ty", "u"), ("テャ", "ty", "a"), ("ティ", "t", "i"), ("テ", "t", "e"),
    ("ツォ", "ts", "o"), ("ツェ", "ts", "e"), ("ツィ", "ts", "i"), ("ツァ", "ts", "a"), ("ツ", "ts", "u"),
    ("ッ", "", "cl"),
    ("チョ", "ch", "o"), ("チュ", "ch", "u"), ("チャ", "ch", "a"), ("チェ", "ch", "e"), ("チ", "ch", "i"),
    ("ダ", "d", "a"), ("タ", "t", "a"),
    ("ゾ", "z", "o"), ("ソ", "s", "o"), ("ゼ", "z", "e"), ("セ", "s", "e"),
    ("ズィ", "z", "i"), ("ズ", "z", "u"), ("スィ", "s", "i"), ("ス", "s", "u"),
    ("ジョ", "j", "o"), ("ジュ", "j", "u"), ("ジャ", "j", "a"), ("ジェ", "j", "e"), ("ジ", "j", "i"),
    ("ショ", "sh", "o"), ("シュ", "sh", "u"), ("シャ", "sh", "a"), ("シェ", "sh", "e"), ("シ", "sh", "i"),
    ("ザ", "z", "a"), ("サ", "s", "a"),
    ("ゴ", "g", "o"), ("コ", "k", "o"), ("ゲ", "g", "e"), ("ケ", "k", "e"),
    ("グヮ", "gw", "a"), ("グ", "g", "u"), ("クヮ", "kw", "a"), ("ク", "k", "u"),
    ("ギョ", "gy", "o"), ("ギュ", "gy", "u"), ("ギャ", "gy", "a"), ("ギェ", "gy", "e"), ("ギ", "g", "i"),
    ("キョ", "ky", "o"), ("キュ", "ky", "u"), ("キャ", "ky", "a"), ("キェ", "ky", "e"), ("キ", "k", "i"),
    ("ガ", "g", "a"), ("カ", "k", "a"),
    ("オ", "", "o"), ("エ", "", "e"),
    ("ウォ", "w", "o"), ("ウェ", "w", "e"), ("ウィ", "w", "i"), ("ウ", "", "u"),
    ("イェ", "y", "e"), ("イ", "", "i"), ("ア", "", "a"),
];

// Spellings accepted on input but never produced when mapping phonemes back to kana.
const MORA_LIST_ADDITIONAL: &[(&str, &str, &str)] = &[
    ("ヴョ", "by", "o"), ("ヴュ", "by", "u"), ("ヴャ", "by", "a"),
    ("ヲ", "", "o"), ("ヱ", "", "e"), ("ヰ", "", "i"), ("ヮ", "w", "a"),
    ("ョ", "y", "o"), ("ュ", "y", "u"), ("ヅ", "z", "u"), ("ヂ", "j", "i"), ("ヶ", "k", "e"),
    ("ャ", "y", "a"), ("ォ", "", "o"), ("ェ", "", "e"), ("ゥ", "", "u"), ("ィ", "", "i"), ("ァ", "", "a"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MoraPhonemes {
    pub consonant: Option<&'static str>,
    pub vowel: &'static str,
}

fn text2mora() -> &'static HashMap<&'static str, MoraPhonemes> {
    static TABLE: OnceLock<HashMap<&'static str, MoraPhonemes>> = OnceLock::new();
    TABLE.get_or_init(|| {
        MORA_LIST_MINIMUM
            .iter()
            .chain(MORA_LIST_ADDITIONAL)
            .map(|&(text, consonant, vowel)| {
                let consonant = if consonant.is_empty() { None } else { Some(consonant) };
                (text, MoraPhonemes { consonant, vowel })
            })
            .collect()
    })
}

fn mora2text() -> &'static HashMap<String, &'static str> {
    static TABLE: OnceLock<HashMap<String, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        MORA_LIST_MINIMUM
            .iter()
            .map(|&(text, consonant, vowel)| (format!("{}{}", consonant, vowel), text))
            .collect()
    })
}

pub(crate) fn lookup(kana: &str) -> Option<MoraPhonemes> {
    text2mora().get(kana).copied()
}

/// Kana spelling of a consonant+vowel pair. Devoiced vowels map like their voiced form.
pub(crate) fn phonemes_to_text(consonant: Option<&str>, vowel: &str) -> Option<&'static str> {
    let vowel = if UNVOICED_VOWELS.contains(&vowel) { vowel.to_lowercase() } else { vowel.to_owned() };
    mora2text().get(&format!("{}{}", consonant.unwrap_or(""), vowel)).copied()
}

/// Converts hiragana to katakana; other characters pass through.
pub(crate) fn to_katakana(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'ぁ'..='ゖ' => char::from_u32(c as u32 + 0x60).unwrap_or(c),
            _ => c,
        })
        .collect()
}
