//! Interfaces of the external collaborators the engine drives: the text analyzer,
//! the native synthesis core, the style catalog and the preset store.
//!
//! Every accessor is read-through. Implementations must not cache across calls,
//! so that edits to the backing files show up on the next request.

use std::collections::BTreeSet;

use crate::types::{AccentPhrase, AudioQuery, Preset, Speaker, StyleId};

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct AnalysisError {
    message: String,
}

impl AnalysisError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CoreError {
    #[error("unknown style id {0}")]
    UnknownStyle(StyleId),
    #[error("expected prosody for {expected} moras, got {found}")]
    ShapeMismatch { expected: usize, found: usize },
    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed catalog: {0}")]
    Format(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum PresetStoreError {
    #[error("failed to read presets: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed presets: {0}")]
    Format(#[from] serde_json::Error),
    #[error("malformed presets: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Where an analyzed mora sits relative to accent phrase boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Boundary {
    /// The phrase continues after this mora.
    #[default]
    None,
    /// The phrase ends after this mora.
    Phrase { pause: bool, interrogative: bool },
}

/// One mora as reported by the analyzer.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedMora {
    pub kana: String,
    pub consonant: Option<String>,
    pub vowel: String,
    pub is_accent_nucleus: bool,
    pub boundary: Boundary,
}

/// Morphological analysis plus pronunciation lookup.
pub trait Analyzer: Send + Sync {
    fn analyze(&self, text: &str) -> Result<Vec<AnalyzedMora>, AnalysisError>;
}

/// Default prosody for one mora.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoraProsody {
    pub consonant_length: Option<f64>,
    pub vowel_length: f64,
    pub pitch: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhraseProsody {
    pub moras: Vec<MoraProsody>,
    /// Length of the pause mora, when the phrase has one.
    pub pause_length: Option<f64>,
}

/// Mono PCM as rendered by the core.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    pub samples: Vec<f32>,
    pub sampling_rate: u32,
}

/// The native acoustic model and vocoder.
pub trait SynthesisCore: Send + Sync {
    /// Predicts lengths and pitch from the phoneme and accent structure of `accent_phrases`.
    /// Must be a pure function of its inputs.
    fn default_prosody(
        &self,
        accent_phrases: &[AccentPhrase],
        style_id: StyleId,
    ) -> Result<Vec<PhraseProsody>, CoreError>;

    /// Renders a finished query, applying its scales and silence padding.
    fn decode(&self, query: &AudioQuery, style_id: StyleId) -> Result<PcmBuffer, CoreError>;
}

pub trait StyleCatalog: Send + Sync {
    fn speakers(&self) -> Result<Vec<Speaker>, CatalogError>;

    fn list_styles(&self) -> Result<BTreeSet<StyleId>, CatalogError> {
        Ok(self
            .speakers()?
            .iter()
            .flat_map(|speaker| speaker.styles.iter().map(|style| style.id))
            .collect())
    }
}

pub trait PresetStore: Send + Sync {
    fn load_presets(&self) -> Result<Vec<Preset>, PresetStoreError>;
}
