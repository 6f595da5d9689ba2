use serde::{Deserialize, Serialize};

pub type StyleId = u32;
pub type PresetId = u32;

/// Vowels that can be devoiced; the devoiced form is written in upper case.
pub(crate) const VOICEABLE_VOWELS: [&str; 5] = ["a", "i", "u", "e", "o"];
pub(crate) const UNVOICED_VOWELS: [&str; 5] = ["A", "I", "U", "E", "O"];

pub const PAUSE_MORA_TEXT: &str = "、";
pub const PAUSE_VOWEL: &str = "pau";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AudioQuery {
    pub accent_phrases: Vec<AccentPhrase>,
    pub speed_scale: f64,
    pub pitch_scale: f64,
    pub intonation_scale: f64,
    pub volume_scale: f64,
    pub pre_phoneme_length: f64,
    pub post_phoneme_length: f64,
    pub output_sampling_rate: u32,
    pub output_stereo: bool,
    /// Notation rendering of `accent_phrases`, refreshed only when the phrases
    /// are replaced as a whole. Partial edits leave it stale.
    pub kana: Option<String>,
}

impl AudioQuery {
    pub fn apply_overrides(&mut self, overrides: &QueryOverrides) {
        self.speed_scale = overrides.speed_scale;
        self.pitch_scale = overrides.pitch_scale;
        self.intonation_scale = overrides.intonation_scale;
        self.volume_scale = overrides.volume_scale;
        self.pre_phoneme_length = overrides.pre_phoneme_length;
        self.post_phoneme_length = overrides.post_phoneme_length;
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AccentPhrase {
    pub moras: Vec<Mora>,
    /// 1-based index of the accent nucleus.
    pub accent: usize,
    pub pause_mora: Option<Mora>,
    #[serde(default)]
    pub is_interrogative: bool,
}

impl AccentPhrase {
    pub fn new(moras: Vec<Mora>, accent: usize) -> Self {
        Self {
            moras,
            accent,
            pause_mora: None,
            is_interrogative: false,
        }
    }

    pub fn with_pause(mut self) -> Self {
        self.pause_mora = Some(Mora::pause());
        self
    }

    pub fn interrogative(mut self, is_interrogative: bool) -> Self {
        self.is_interrogative = is_interrogative;
        self
    }

    /// Compares everything the notation can express, ignoring numeric prosody.
    pub fn same_structure(&self, other: &AccentPhrase) -> bool {
        self.accent == other.accent
            && self.is_interrogative == other.is_interrogative
            && self.pause_mora.is_some() == other.pause_mora.is_some()
            && self.moras.len() == other.moras.len()
            && self.moras.iter().zip(&other.moras).all(|(a, b)| a.same_structure(b))
    }
}

/// A structural rule broken by caller-supplied accent phrases. Phrase and mora
/// numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructureError {
    #[error("phrase {phrase} has no moras")]
    NoMoras { phrase: usize },
    #[error("accent {accent} of phrase {phrase} is outside 1..={len}")]
    AccentOutOfRange { phrase: usize, accent: usize, len: usize },
    #[error("mora {mora} of phrase {phrase} has a consonant without a consonant length or the reverse")]
    ConsonantLength { phrase: usize, mora: usize },
}

/// Checks that every phrase has moras, an accent inside the phrase, and
/// consonant lengths exactly where there are consonants.
pub fn check_structure(accent_phrases: &[AccentPhrase]) -> Result<(), StructureError> {
    for (i, phrase) in accent_phrases.iter().enumerate() {
        let number = i + 1;
        let len = phrase.moras.len();
        if len == 0 {
            return Err(StructureError::NoMoras { phrase: number });
        }
        if phrase.accent == 0 || phrase.accent > len {
            return Err(StructureError::AccentOutOfRange { phrase: number, accent: phrase.accent, len });
        }
        let mut moras = phrase.moras.iter().chain(phrase.pause_mora.as_ref());
        if let Some(j) = moras.position(|m| m.consonant.is_some() != m.consonant_length.is_some()) {
            return Err(StructureError::ConsonantLength { phrase: number, mora: j + 1 });
        }
    }
    Ok(())
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Mora {
    pub text: String,
    pub consonant: Option<String>,
    pub consonant_length: Option<f64>,
    pub vowel: String,
    pub vowel_length: f64,
    pub pitch: f64,
}

impl Mora {
    /// Builds a mora with zeroed prosody. `consonant_length` follows `consonant`.
    pub fn new(text: impl Into<String>, consonant: Option<&str>, vowel: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            consonant: consonant.map(str::to_owned),
            consonant_length: consonant.map(|_| 0.0),
            vowel: vowel.into(),
            vowel_length: 0.0,
            pitch: 0.0,
        }
    }

    pub fn pause() -> Self {
        Self::new(PAUSE_MORA_TEXT, None, PAUSE_VOWEL)
    }

    pub fn is_unvoiced(&self) -> bool {
        UNVOICED_VOWELS.contains(&self.vowel.as_str())
    }

    pub fn is_voiceable(&self) -> bool {
        VOICEABLE_VOWELS.contains(&self.vowel.as_str())
    }

    /// Marks the mora devoiced: upper-case vowel (when it has a voiced form) and pitch 0.
    pub fn devoice(&mut self) {
        if self.is_voiceable() {
            self.vowel = self.vowel.to_uppercase();
        }
        self.pitch = 0.0;
    }

    /// Brings the vowel case in line with the pitch: pitch 0 is the unvoiced marker.
    pub(crate) fn sync_devoicing(&mut self) {
        if self.pitch == 0.0 || self.is_unvoiced() {
            self.devoice();
        }
    }

    pub fn same_structure(&self, other: &Mora) -> bool {
        self.text == other.text && self.consonant == other.consonant && self.vowel == other.vowel
    }
}

/// The numeric parameters a preset or a caller may impose on a query.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct QueryOverrides {
    pub speed_scale: f64,
    pub pitch_scale: f64,
    pub intonation_scale: f64,
    pub volume_scale: f64,
    pub pre_phoneme_length: f64,
    pub post_phoneme_length: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Preset {
    pub id: PresetId,
    pub name: String,
    pub speaker_uuid: String,
    pub style_id: StyleId,
    #[serde(rename = "speedScale")]
    pub speed_scale: f64,
    #[serde(rename = "pitchScale")]
    pub pitch_scale: f64,
    #[serde(rename = "intonationScale")]
    pub intonation_scale: f64,
    #[serde(rename = "volumeScale")]
    pub volume_scale: f64,
    #[serde(rename = "prePhonemeLength")]
    pub pre_phoneme_length: f64,
    #[serde(rename = "postPhonemeLength")]
    pub post_phoneme_length: f64,
}

impl Preset {
    pub fn overrides(&self) -> QueryOverrides {
        QueryOverrides {
            speed_scale: self.speed_scale,
            pitch_scale: self.pitch_scale,
            intonation_scale: self.intonation_scale,
            volume_scale: self.volume_scale,
            pre_phoneme_length: self.pre_phoneme_length,
            post_phoneme_length: self.post_phoneme_length,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SpeakerStyle {
    pub name: String,
    pub id: StyleId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Speaker {
    pub name: String,
    pub speaker_uuid: String,
    pub styles: Vec<SpeakerStyle>,
    #[serde(default)]
    pub version: String,
}
