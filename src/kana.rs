//! AquesTalk-like kana notation.
//!
//! * Phrases are separated by `/` (no pause) or `、` (pause inserted after the phrase).
//! * `_` before a kana devoices that mora.
//! * `'` follows the accent nucleus. Every phrase carries exactly one.
//! * A full-width `？` at the end of a phrase makes it interrogative.
//!
//! Only structure is encoded. Decoded moras carry zeroed lengths and pitch.

use crate::mora_list::{self, MAX_MORA_CHARS};
use crate::types::{AccentPhrase, Mora};

pub const UNVOICE_SYMBOL: char = '_';
pub const ACCENT_SYMBOL: char = '\'';
pub const NOPAUSE_DELIMITER: char = '/';
pub const PAUSE_DELIMITER: char = '、';
pub const WIDE_INTERROGATION_MARK: char = '？';

/// Positions are character offsets into the decoded string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KanaParseError {
    #[error("unknown mora {text:?} at position {position}")]
    UnknownMora { text: String, position: usize },
    #[error("accent marker at the top of a phrase (position {position})")]
    AccentTop { position: usize },
    #[error("multiple accent in phrase {phrase} (position {position})")]
    MultipleAccent { phrase: usize, position: usize },
    #[error("missing accent in phrase {phrase} (position {position})")]
    MissingAccent { phrase: usize, position: usize },
    #[error("phrase {phrase} is empty (position {position})")]
    EmptyPhrase { phrase: usize, position: usize },
    #[error("interrogation mark is not at the end of phrase {phrase} (position {position})")]
    InterrogationMarkNotAtEnd { phrase: usize, position: usize },
}

impl KanaParseError {
    pub fn position(&self) -> usize {
        match self {
            Self::UnknownMora { position, .. }
            | Self::AccentTop { position }
            | Self::MultipleAccent { position, .. }
            | Self::MissingAccent { position, .. }
            | Self::EmptyPhrase { position, .. }
            | Self::InterrogationMarkNotAtEnd { position, .. } => *position,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    PhraseStart,
    InMora,
    PostAccent,
    AwaitingSeparator,
}

#[derive(Debug, Default)]
struct PhraseBuilder {
    moras: Vec<Mora>,
    accent: Option<usize>,
    is_interrogative: bool,
    start: usize,
}

impl PhraseBuilder {
    fn starting_at(start: usize) -> Self {
        Self { start, ..Default::default() }
    }

    fn finish(self, phrase: usize, pause: bool) -> Result<AccentPhrase, KanaParseError> {
        let accent = self.accent.ok_or(KanaParseError::MissingAccent { phrase, position: self.start })?;
        let mut accent_phrase = AccentPhrase::new(self.moras, accent).interrogative(self.is_interrogative);
        if pause {
            accent_phrase = accent_phrase.with_pause();
        }
        Ok(accent_phrase)
    }
}

fn is_control(c: char) -> bool {
    matches!(
        c,
        UNVOICE_SYMBOL | ACCENT_SYMBOL | NOPAUSE_DELIMITER | PAUSE_DELIMITER | WIDE_INTERROGATION_MARK
    )
}

/// Reads one mora starting at `pos`, preferring the longest spelling.
/// Returns the mora and the number of characters consumed.
fn read_mora(chars: &[char], pos: usize) -> Result<(Mora, usize), KanaParseError> {
    let unvoiced = chars[pos] == UNVOICE_SYMBOL;
    let kana_start = if unvoiced { pos + 1 } else { pos };

    let available = chars[kana_start..]
        .iter()
        .take(MAX_MORA_CHARS)
        .take_while(|c| !is_control(**c))
        .count();

    for len in (1..=available).rev() {
        let text: String = chars[kana_start..kana_start + len].iter().collect();
        let Some(phonemes) = mora_list::lookup(&text) else {
            continue;
        };
        let mut mora = Mora::new(text, phonemes.consonant, phonemes.vowel);
        if unvoiced {
            if !mora.is_voiceable() {
                return Err(KanaParseError::UnknownMora {
                    text: format!("{}{}", UNVOICE_SYMBOL, mora.text),
                    position: pos,
                });
            }
            mora.devoice();
        }
        return Ok((mora, kana_start + len - pos));
    }

    let end = (kana_start + available.max(1)).min(chars.len());
    Err(KanaParseError::UnknownMora {
        text: chars[pos..end].iter().collect(),
        position: pos,
    })
}

/// Parses notation into accent phrases with placeholder prosody.
pub fn decode(text: &str) -> Result<Vec<AccentPhrase>, KanaParseError> {
    let chars: Vec<char> = text.chars().collect();
    let mut phrases = Vec::new();
    let mut builder = PhraseBuilder::starting_at(0);
    let mut state = State::PhraseStart;
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        let phrase = phrases.len() + 1;
        match (state, c) {
            (State::PhraseStart, NOPAUSE_DELIMITER | PAUSE_DELIMITER | WIDE_INTERROGATION_MARK) => {
                return Err(KanaParseError::EmptyPhrase { phrase, position: pos });
            }
            (State::PhraseStart, ACCENT_SYMBOL) => {
                return Err(KanaParseError::AccentTop { position: pos });
            }
            (State::PostAccent, ACCENT_SYMBOL) => {
                return Err(KanaParseError::MultipleAccent { phrase, position: pos });
            }
            (State::InMora, ACCENT_SYMBOL) => {
                builder.accent = Some(builder.moras.len());
                state = State::PostAccent;
                pos += 1;
            }
            (State::InMora | State::PostAccent, WIDE_INTERROGATION_MARK) => {
                builder.is_interrogative = true;
                state = State::AwaitingSeparator;
                pos += 1;
            }
            (State::InMora | State::PostAccent | State::AwaitingSeparator, NOPAUSE_DELIMITER | PAUSE_DELIMITER) => {
                // A separator closing the whole string is dropped along with its pause.
                let trailing = pos + 1 == chars.len();
                let pause = c == PAUSE_DELIMITER && !trailing;
                let finished = std::mem::replace(&mut builder, PhraseBuilder::starting_at(pos + 1));
                phrases.push(finished.finish(phrase, pause)?);
                state = State::PhraseStart;
                pos += 1;
            }
            (State::AwaitingSeparator, _) => {
                let position = pos - 1;
                return Err(KanaParseError::InterrogationMarkNotAtEnd { phrase, position });
            }
            (State::PhraseStart | State::InMora | State::PostAccent, _) => {
                let (mora, consumed) = read_mora(&chars, pos)?;
                builder.moras.push(mora);
                if state == State::PhraseStart {
                    state = State::InMora;
                }
                pos += consumed;
            }
        }
    }

    if state != State::PhraseStart {
        let phrase = phrases.len() + 1;
        phrases.push(builder.finish(phrase, false)?);
    }

    Ok(phrases)
}

/// A mora reads as devoiced when its vowel is the devoiced form, or when it
/// carries filled prosody with pitch 0. Placeholder moras (zero length) keep
/// the vowel as written.
fn reads_devoiced(mora: &Mora) -> bool {
    mora.is_unvoiced() || (mora.is_voiceable() && mora.pitch == 0.0 && mora.vowel_length > 0.0)
}

/// Renders accent phrases as notation. Numeric prosody is not represented
/// beyond the devoicing mark.
pub fn encode(accent_phrases: &[AccentPhrase]) -> String {
    let mut text = String::new();
    for (i, phrase) in accent_phrases.iter().enumerate() {
        for (j, mora) in phrase.moras.iter().enumerate() {
            if reads_devoiced(mora) {
                text.push(UNVOICE_SYMBOL);
            }
            text.push_str(&mora.text);
            if j + 1 == phrase.accent {
                text.push(ACCENT_SYMBOL);
            }
        }
        if phrase.is_interrogative {
            text.push(WIDE_INTERROGATION_MARK);
        }
        if i + 1 < accent_phrases.len() {
            if phrase.pause_mora.is_some() {
                text.push(PAUSE_DELIMITER);
            } else {
                text.push(NOPAUSE_DELIMITER);
            }
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(phrase: &AccentPhrase) -> Vec<&str> {
        phrase.moras.iter().map(|m| m.text.as_str()).collect()
    }

    #[test]
    fn decodes_two_plain_phrases() {
        let phrases = decode("コンニチワ'/セカイ'").unwrap();
        assert_eq!(phrases.len(), 2);
        assert_eq!(texts(&phrases[0]), ["コ", "ン", "ニ", "チ", "ワ"]);
        assert_eq!(phrases[0].accent, 5);
        assert!(phrases[0].pause_mora.is_none());
        assert_eq!(texts(&phrases[1]), ["セ", "カ", "イ"]);
        assert_eq!(phrases[1].accent, 3);
        assert!(phrases[1].pause_mora.is_none());
    }

    #[test]
    fn decodes_devoicing_and_pause() {
        let phrases = decode("ア'_メ、フ'ル").unwrap();
        assert_eq!(phrases.len(), 2);

        let first = &phrases[0];
        assert_eq!(first.accent, 1);
        assert_eq!(first.moras[1].text, "メ");
        assert_eq!(first.moras[1].consonant.as_deref(), Some("m"));
        assert_eq!(first.moras[1].vowel, "E");
        assert_eq!(first.moras[1].pitch, 0.0);
        let pause = first.pause_mora.as_ref().unwrap();
        assert_eq!(pause.vowel, "pau");
        assert!(pause.consonant.is_none());

        assert!(phrases[1].pause_mora.is_none());
        assert_eq!(phrases[1].accent, 1);
    }

    #[test]
    fn devoicing_marker_does_not_shift_accent_index() {
        let phrases = decode("_カキク'ケ").unwrap();
        assert_eq!(phrases[0].accent, 3);
        assert!(phrases[0].moras[0].is_unvoiced());
        assert_eq!(phrases[0].moras.len(), 4);
    }

    #[test]
    fn palatalized_digraph_is_one_mora() {
        let phrases = decode("キャ'ク").unwrap();
        assert_eq!(texts(&phrases[0]), ["キャ", "ク"]);
        assert_eq!(phrases[0].moras[0].consonant.as_deref(), Some("ky"));
        assert_eq!(phrases[0].accent, 1);
    }

    #[test]
    fn numeric_fields_are_placeholders() {
        let phrases = decode("カ'ナ").unwrap();
        for mora in &phrases[0].moras {
            assert_eq!(mora.vowel_length, 0.0);
            assert_eq!(mora.consonant_length, Some(0.0));
            assert_eq!(mora.pitch, 0.0);
        }
    }

    #[test]
    fn interrogative_mark_sets_flag() {
        let phrases = decode("ホ'ント？/ウ'ン").unwrap();
        assert!(phrases[0].is_interrogative);
        assert!(!phrases[1].is_interrogative);
        assert_eq!(texts(&phrases[0]), ["ホ", "ン", "ト"]);

        let phrases = decode("ア'？").unwrap();
        assert!(phrases[0].is_interrogative);
    }

    #[test]
    fn single_trailing_separator_is_dropped() {
        let phrases = decode("ア'/").unwrap();
        assert_eq!(phrases.len(), 1);
        let phrases = decode("ア'、").unwrap();
        assert_eq!(phrases.len(), 1);
        assert!(phrases[0].pause_mora.is_none());
    }

    #[test]
    fn empty_string_is_empty_sequence() {
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn missing_accent() {
        let err = decode("ア'/イウ").unwrap_err();
        assert_eq!(err, KanaParseError::MissingAccent { phrase: 2, position: 3 });
        assert!(err.to_string().contains("missing accent"));
    }

    #[test]
    fn multiple_accent() {
        let err = decode("ア'イ'").unwrap_err();
        assert_eq!(err, KanaParseError::MultipleAccent { phrase: 1, position: 3 });
        assert!(err.to_string().contains("multiple accent"));
    }

    #[test]
    fn accent_at_phrase_top() {
        assert_eq!(decode("'ア").unwrap_err(), KanaParseError::AccentTop { position: 0 });
    }

    #[test]
    fn unknown_mora_reports_position() {
        let err = decode("ア'/イx'").unwrap_err();
        assert!(matches!(err, KanaParseError::UnknownMora { position: 4, .. }));
        assert!(matches!(decode("_ン'").unwrap_err(), KanaParseError::UnknownMora { position: 0, .. }));
        assert!(matches!(decode("ア'_").unwrap_err(), KanaParseError::UnknownMora { position: 2, .. }));
    }

    #[test]
    fn misplaced_separators() {
        assert_eq!(decode("/ア'").unwrap_err(), KanaParseError::EmptyPhrase { phrase: 1, position: 0 });
        assert_eq!(decode("ア'//イ'").unwrap_err(), KanaParseError::EmptyPhrase { phrase: 2, position: 3 });
        assert_eq!(decode("ア'、、").unwrap_err(), KanaParseError::EmptyPhrase { phrase: 2, position: 3 });
    }

    #[test]
    fn interrogation_mark_inside_phrase() {
        let err = decode("ア？イ'").unwrap_err();
        assert_eq!(err, KanaParseError::InterrogationMarkNotAtEnd { phrase: 1, position: 1 });
    }

    #[test]
    fn encode_writes_markers() {
        let phrases = decode("ア'_メ、フ'ル？/コ'レ").unwrap();
        assert_eq!(encode(&phrases), "ア'_メ、フ'ル？/コ'レ");
    }

    #[test]
    fn encode_decode_normalizes_trailing_separator() {
        let phrases = decode("ヤ'マ/").unwrap();
        assert_eq!(encode(&phrases), "ヤ'マ");
    }

    #[test]
    fn decode_encode_keeps_structure_but_resets_numbers() {
        let mut phrases = decode("キョ'オ/_シ'タ、ア'メ").unwrap();
        for phrase in &mut phrases {
            for mora in &mut phrase.moras {
                mora.vowel_length = 0.12;
                if !mora.is_unvoiced() {
                    mora.pitch = 5.6;
                }
            }
        }
        let again = decode(&encode(&phrases)).unwrap();
        assert_eq!(again.len(), phrases.len());
        for (a, b) in again.iter().zip(&phrases) {
            assert!(a.same_structure(b));
            assert!(a.moras.iter().all(|m| m.vowel_length == 0.0 && m.pitch == 0.0));
        }
    }

    #[test]
    fn filled_mora_with_zero_pitch_encodes_devoiced() {
        let mut phrases = decode("ア'メ").unwrap();
        assert_eq!(encode(&phrases), "ア'メ");

        for mora in &mut phrases[0].moras {
            mora.vowel_length = 0.1;
            mora.pitch = 5.6;
        }
        phrases[0].moras[1].pitch = 0.0;
        assert_eq!(encode(&phrases), "ア'_メ");
        assert!(decode("ア'_メ").unwrap()[0].moras[1].is_unvoiced());
    }
}
