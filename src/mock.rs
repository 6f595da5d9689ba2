//! Deterministic stand-ins for the native collaborators.
//!
//! `MockAnalyzer` only understands kana text. `MockCore` predicts prosody from
//! the phoneme and accent structure with fixed rules and decodes to sine tones.

use std::collections::BTreeSet;

use parking_lot::RwLock;

use crate::backend::{
    AnalysisError, AnalyzedMora, Analyzer, Boundary, CatalogError, CoreError, MoraProsody, PcmBuffer,
    PhraseProsody, PresetStore, PresetStoreError, StyleCatalog, SynthesisCore,
};
use crate::mora_list::{self, MAX_MORA_CHARS};
use crate::types::{AccentPhrase, AudioQuery, Mora, Preset, Speaker, SpeakerStyle, StyleId};

pub const MOCK_SAMPLING_RATE: u32 = 24000;

#[derive(Debug, Default, Clone)]
pub struct MockAnalyzer;

impl MockAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

fn close_phrase(moras: &mut [AnalyzedMora], phrase_start: usize, pause: bool, interrogative: bool) {
    if let Some(last) = moras.get_mut(phrase_start..).and_then(|phrase| phrase.last_mut()) {
        last.boundary = Boundary::Phrase { pause, interrogative };
    }
}

impl Analyzer for MockAnalyzer {
    fn analyze(&self, text: &str) -> Result<Vec<AnalyzedMora>, AnalysisError> {
        let chars: Vec<char> = mora_list::to_katakana(text).chars().collect();
        let mut moras: Vec<AnalyzedMora> = Vec::new();
        let mut phrase_start = 0;
        let mut pos = 0;

        while pos < chars.len() {
            let c = chars[pos];
            let boundary = match c {
                '、' | ',' | '，' => Some((true, false)),
                '。' | '！' | '!' | '.' | ' ' | '　' | '\n' => Some((false, false)),
                '？' | '?' => Some((false, true)),
                _ => None,
            };
            if let Some((pause, interrogative)) = boundary {
                close_phrase(&mut moras, phrase_start, pause, interrogative);
                phrase_start = moras.len();
                pos += 1;
                continue;
            }

            if c == 'ー' {
                let previous = moras[phrase_start..]
                    .last()
                    .ok_or_else(|| AnalysisError::new(format!("long vowel mark without a preceding mora at {}", pos)))?;
                let vowel = previous.vowel.clone();
                let kana = mora_list::phonemes_to_text(None, &vowel).unwrap_or("ー").to_string();
                moras.push(AnalyzedMora {
                    kana,
                    consonant: None,
                    vowel,
                    is_accent_nucleus: false,
                    boundary: Boundary::None,
                });
                pos += 1;
                continue;
            }

            let available = (chars.len() - pos).min(MAX_MORA_CHARS);
            let matched = (1..=available).rev().find_map(|len| {
                let kana: String = chars[pos..pos + len].iter().collect();
                mora_list::lookup(&kana).map(|phonemes| (kana, phonemes, len))
            });
            let Some((kana, phonemes, len)) = matched else {
                return Err(AnalysisError::new(format!("unsupported character {:?} at {}", c, pos)));
            };
            moras.push(AnalyzedMora {
                kana,
                consonant: phonemes.consonant.map(str::to_owned),
                vowel: phonemes.vowel.to_owned(),
                is_accent_nucleus: moras.len() == phrase_start,
                boundary: Boundary::None,
            });
            pos += len;
        }

        Ok(moras)
    }
}

#[derive(Debug, Clone)]
pub struct MockCore {
    styles: BTreeSet<StyleId>,
}

impl Default for MockCore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCore {
    /// Knows the styles of [`StaticCatalog::sample`].
    pub fn new() -> Self {
        Self::with_styles(sample_speakers().iter().flat_map(|s| s.styles.iter().map(|style| style.id)))
    }

    pub fn with_styles(styles: impl IntoIterator<Item = StyleId>) -> Self {
        Self { styles: styles.into_iter().collect() }
    }

    fn check_style(&self, style_id: StyleId) -> Result<(), CoreError> {
        if self.styles.contains(&style_id) {
            Ok(())
        } else {
            Err(CoreError::UnknownStyle(style_id))
        }
    }

    fn mora_prosody(mora: &Mora, index: usize, phrase: &AccentPhrase, style_id: StyleId) -> MoraProsody {
        let style_offset = (style_id % 4) as f64;
        let consonant_length = mora.consonant.as_ref().map(|c| 0.04 + 0.01 * c.len() as f64);
        let vowel_length = match mora.vowel.as_str() {
            "N" => 0.08,
            "cl" => 0.07,
            _ if mora.is_unvoiced() => 0.06,
            _ => 0.1,
        } + 0.005 * style_offset;

        let position = index + 1;
        let high = if phrase.accent == 1 {
            position == 1
        } else {
            position > 1 && position <= phrase.accent
        };
        let pitch = if mora.is_unvoiced() || mora.vowel == "cl" {
            0.0
        } else {
            let rise = if phrase.is_interrogative && position == phrase.moras.len() { 0.1 } else { 0.0 };
            5.5 + 0.05 * style_offset + if high { 0.3 } else { 0.0 } + rise
        };

        MoraProsody { consonant_length, vowel_length, pitch }
    }
}

impl SynthesisCore for MockCore {
    fn default_prosody(&self, accent_phrases: &[AccentPhrase], style_id: StyleId) -> Result<Vec<PhraseProsody>, CoreError> {
        self.check_style(style_id)?;
        Ok(accent_phrases
            .iter()
            .map(|phrase| PhraseProsody {
                moras: phrase
                    .moras
                    .iter()
                    .enumerate()
                    .map(|(i, mora)| Self::mora_prosody(mora, i, phrase, style_id))
                    .collect(),
                pause_length: phrase.pause_mora.as_ref().map(|_| 0.3),
            })
            .collect())
    }

    fn decode(&self, query: &AudioQuery, style_id: StyleId) -> Result<PcmBuffer, CoreError> {
        self.check_style(style_id)?;
        if query.speed_scale <= 0.0 {
            return Err(CoreError::Failed(format!("speed_scale must be positive, got {}", query.speed_scale)));
        }

        let rate = MOCK_SAMPLING_RATE as f64;
        let frames = |seconds: f64| (seconds.max(0.0) * rate).round() as usize;
        let mut samples = vec![0.0f32; frames(query.pre_phoneme_length)];
        let mut phase = 0.0f64;

        for phrase in &query.accent_phrases {
            for mora in phrase.moras.iter().chain(phrase.pause_mora.as_ref()) {
                let seconds = (mora.consonant_length.unwrap_or(0.0) + mora.vowel_length) / query.speed_scale;
                let count = frames(seconds);
                if mora.pitch <= 0.0 {
                    samples.extend(std::iter::repeat(0.0).take(count));
                    continue;
                }
                let freq = mora.pitch.exp() * 2f64.powf(query.pitch_scale);
                let amplitude = 0.3 * query.volume_scale;
                for _ in 0..count {
                    samples.push((amplitude * phase.sin()) as f32);
                    phase += 2.0 * std::f64::consts::PI * freq / rate;
                }
            }
        }

        samples.extend(std::iter::repeat(0.0).take(frames(query.post_phoneme_length)));
        Ok(PcmBuffer { samples, sampling_rate: MOCK_SAMPLING_RATE })
    }
}

fn sample_speakers() -> Vec<Speaker> {
    vec![
        Speaker {
            name: "mock-a".to_string(),
            speaker_uuid: "7ffcb7ce-00ec-4bdc-82cd-45a8889e43ff".to_string(),
            styles: vec![
                SpeakerStyle { name: "ノーマル".to_string(), id: 0 },
                SpeakerStyle { name: "あまあま".to_string(), id: 1 },
            ],
            version: "0.0.1".to_string(),
        },
        Speaker {
            name: "mock-b".to_string(),
            speaker_uuid: "388f246b-8c41-4ac1-8e2d-5d79f3ff56d9".to_string(),
            styles: vec![
                SpeakerStyle { name: "ノーマル".to_string(), id: 2 },
                SpeakerStyle { name: "ささやき".to_string(), id: 3 },
            ],
            version: "0.0.1".to_string(),
        },
    ]
}

/// In-memory catalog. Contents can be swapped between requests.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    speakers: RwLock<Vec<Speaker>>,
}

impl StaticCatalog {
    pub fn new(speakers: Vec<Speaker>) -> Self {
        Self { speakers: RwLock::new(speakers) }
    }

    /// Two speakers with styles 0 to 3.
    pub fn sample() -> Self {
        Self::new(sample_speakers())
    }

    pub fn set_speakers(&self, speakers: Vec<Speaker>) {
        *self.speakers.write() = speakers;
    }
}

impl StyleCatalog for StaticCatalog {
    fn speakers(&self) -> Result<Vec<Speaker>, CatalogError> {
        Ok(self.speakers.read().clone())
    }
}

/// In-memory preset store. Contents can be swapped between requests.
#[derive(Debug, Default)]
pub struct StaticPresets {
    presets: RwLock<Vec<Preset>>,
}

impl StaticPresets {
    pub fn new(presets: Vec<Preset>) -> Self {
        Self { presets: RwLock::new(presets) }
    }

    pub fn set_presets(&self, presets: Vec<Preset>) {
        *self.presets.write() = presets;
    }
}

impl PresetStore for StaticPresets {
    fn load_presets(&self) -> Result<Vec<Preset>, PresetStoreError> {
        Ok(self.presets.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::group_accent_phrases;

    #[test]
    fn analyzer_reads_kana_and_punctuation() {
        let moras = MockAnalyzer::new().analyze("こんにちは、せかい？").unwrap();
        let phrases = group_accent_phrases(moras).unwrap();
        assert_eq!(phrases.len(), 2);
        assert_eq!(phrases[0].moras.len(), 5);
        assert_eq!(phrases[0].accent, 1);
        assert!(phrases[0].pause_mora.is_some());
        assert!(phrases[1].is_interrogative);
    }

    #[test]
    fn analyzer_expands_long_vowel() {
        let moras = MockAnalyzer::new().analyze("コーヒー").unwrap();
        let kana: Vec<&str> = moras.iter().map(|m| m.kana.as_str()).collect();
        assert_eq!(kana, ["コ", "オ", "ヒ", "イ"]);
    }

    #[test]
    fn analyzer_rejects_kanji() {
        assert!(MockAnalyzer::new().analyze("漢字").is_err());
    }

    #[test]
    fn core_rejects_unknown_style() {
        let err = MockCore::new().default_prosody(&[], 77).unwrap_err();
        assert!(matches!(err, CoreError::UnknownStyle(77)));
    }

    #[test]
    fn decode_pads_with_silence() {
        let query = AudioQuery {
            accent_phrases: Vec::new(),
            speed_scale: 1.0,
            pitch_scale: 0.0,
            intonation_scale: 1.0,
            volume_scale: 1.0,
            pre_phoneme_length: 0.1,
            post_phoneme_length: 0.2,
            output_sampling_rate: MOCK_SAMPLING_RATE,
            output_stereo: false,
            kana: None,
        };
        let pcm = MockCore::new().decode(&query, 0).unwrap();
        assert_eq!(pcm.samples.len(), 7200);
        assert!(pcm.samples.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn static_catalog_reflects_updates() {
        let catalog = StaticCatalog::sample();
        assert!(catalog.list_styles().unwrap().contains(&3));
        catalog.set_speakers(Vec::new());
        assert!(catalog.list_styles().unwrap().is_empty());
    }
}
