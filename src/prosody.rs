//! Writes predicted lengths and pitch onto accent phrases.
//!
//! A fresh fill overwrites every numeric field. A refill recomputes the pitch
//! contour and keeps the lengths the caller flagged as explicitly set. The flags
//! travel in [`LengthOverrides`] next to the phrases: 0.0 is a legitimate value,
//! so the numbers themselves cannot say whether they were edited.

use std::sync::Arc;

use crate::backend::{CoreError, PhraseProsody, StyleCatalog, SynthesisCore};
use crate::error::{EngineError, EngineErrorDescription};
use crate::types::{self, AccentPhrase, StyleId};

/// Which lengths of one mora were set by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExplicitLengths {
    pub vowel_length: bool,
    pub consonant_length: bool,
}

impl ExplicitLengths {
    pub const BOTH: Self = Self { vowel_length: true, consonant_length: true };
}

/// Per-mora explicit-length flags, indexed like the phrases they describe.
/// Positions outside the recorded shape count as not set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LengthOverrides {
    phrases: Vec<Vec<ExplicitLengths>>,
}

impl LengthOverrides {
    pub fn none() -> Self {
        Self::default()
    }

    /// Flags every length of every mora in `accent_phrases`.
    pub fn all(accent_phrases: &[AccentPhrase]) -> Self {
        Self {
            phrases: accent_phrases
                .iter()
                .map(|phrase| vec![ExplicitLengths::BOTH; phrase.moras.len()])
                .collect(),
        }
    }

    pub fn set(&mut self, phrase: usize, mora: usize, lengths: ExplicitLengths) {
        if self.phrases.len() <= phrase {
            self.phrases.resize_with(phrase + 1, Vec::new);
        }
        let moras = &mut self.phrases[phrase];
        if moras.len() <= mora {
            moras.resize(mora + 1, ExplicitLengths::default());
        }
        moras[mora] = lengths;
    }

    pub fn get(&self, phrase: usize, mora: usize) -> ExplicitLengths {
        self.phrases
            .get(phrase)
            .and_then(|moras| moras.get(mora))
            .copied()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum FillMode<'a> {
    Fresh,
    Refill(&'a LengthOverrides),
}

#[derive(Debug, Clone, Copy)]
struct Targets {
    lengths: bool,
    pitch: bool,
}

#[derive(Clone)]
pub struct ProsodyFiller {
    core: Arc<dyn SynthesisCore>,
    catalog: Arc<dyn StyleCatalog>,
}

impl ProsodyFiller {
    pub fn new(core: Arc<dyn SynthesisCore>, catalog: Arc<dyn StyleCatalog>) -> Self {
        Self { core, catalog }
    }

    pub fn fill(&self, accent_phrases: &mut [AccentPhrase], style_id: StyleId, mode: FillMode<'_>) -> Result<(), EngineError> {
        let predicted = self.predict(accent_phrases, style_id)?;
        let overrides = match mode {
            FillMode::Fresh => None,
            FillMode::Refill(overrides) => Some(overrides),
        };
        apply(accent_phrases, &predicted, Targets { lengths: true, pitch: true }, overrides);
        Ok(())
    }

    /// Fresh fill of lengths and pitch.
    pub fn replace_mora_data(&self, mut accent_phrases: Vec<AccentPhrase>, style_id: StyleId) -> Result<Vec<AccentPhrase>, EngineError> {
        self.fill(&mut accent_phrases, style_id, FillMode::Fresh)?;
        Ok(accent_phrases)
    }

    /// Replaces vowel, consonant and pause lengths; pitch is left as given.
    pub fn replace_phoneme_length(&self, mut accent_phrases: Vec<AccentPhrase>, style_id: StyleId) -> Result<Vec<AccentPhrase>, EngineError> {
        let predicted = self.predict(&accent_phrases, style_id)?;
        apply(&mut accent_phrases, &predicted, Targets { lengths: true, pitch: false }, None);
        Ok(accent_phrases)
    }

    /// Replaces pitch; lengths are left as given.
    pub fn replace_mora_pitch(&self, mut accent_phrases: Vec<AccentPhrase>, style_id: StyleId) -> Result<Vec<AccentPhrase>, EngineError> {
        let predicted = self.predict(&accent_phrases, style_id)?;
        apply(&mut accent_phrases, &predicted, Targets { lengths: false, pitch: true }, None);
        Ok(accent_phrases)
    }

    fn predict(&self, accent_phrases: &[AccentPhrase], style_id: StyleId) -> Result<Vec<PhraseProsody>, EngineError> {
        types::check_structure(accent_phrases)?;
        if !self.catalog.list_styles()?.contains(&style_id) {
            return Err(EngineError::new(EngineErrorDescription::UnknownStyle(style_id)));
        }
        if accent_phrases.is_empty() {
            return Ok(Vec::new());
        }

        let predicted = self.core.default_prosody(accent_phrases, style_id)?;
        check_shape(accent_phrases, &predicted)?;
        log::debug!("Predicted prosody for {} accent phrases (style {})", accent_phrases.len(), style_id);
        Ok(predicted)
    }
}

fn check_shape(accent_phrases: &[AccentPhrase], predicted: &[PhraseProsody]) -> Result<(), CoreError> {
    let expected: usize = accent_phrases.iter().map(|p| p.moras.len()).sum();
    let found: usize = predicted.iter().map(|p| p.moras.len()).sum();
    let aligned = accent_phrases.len() == predicted.len()
        && accent_phrases.iter().zip(predicted).all(|(a, p)| a.moras.len() == p.moras.len());
    if aligned {
        Ok(())
    } else {
        Err(CoreError::ShapeMismatch { expected, found })
    }
}

fn apply(
    accent_phrases: &mut [AccentPhrase],
    predicted: &[PhraseProsody],
    targets: Targets,
    overrides: Option<&LengthOverrides>,
) {
    for (i, (phrase, prosody)) in accent_phrases.iter_mut().zip(predicted).enumerate() {
        for (j, (mora, values)) in phrase.moras.iter_mut().zip(&prosody.moras).enumerate() {
            if targets.lengths {
                let explicit = overrides.map(|o| o.get(i, j)).unwrap_or_default();
                if !explicit.vowel_length {
                    mora.vowel_length = values.vowel_length;
                }
                if !explicit.consonant_length {
                    mora.consonant_length = mora.consonant.as_ref().map(|_| values.consonant_length.unwrap_or(0.0));
                }
            }
            if targets.pitch {
                mora.pitch = values.pitch;
                mora.sync_devoicing();
            }
        }
        if targets.lengths {
            if let Some(pause) = phrase.pause_mora.as_mut() {
                pause.vowel_length = prosody.pause_length.unwrap_or(0.0);
            }
        }
    }
}
