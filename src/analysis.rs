use std::sync::Arc;

use crate::backend::{AnalysisError, AnalyzedMora, Analyzer, Boundary};
use crate::types::{AccentPhrase, Mora};

/// Turns analyzer output into accent phrases with placeholder prosody.
#[derive(Clone)]
pub struct TextAnalysisAdapter {
    analyzer: Arc<dyn Analyzer>,
}

impl TextAnalysisAdapter {
    pub fn new(analyzer: Arc<dyn Analyzer>) -> Self {
        Self { analyzer }
    }

    pub fn create_accent_phrases(&self, text: &str) -> Result<Vec<AccentPhrase>, AnalysisError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let analyzed = self.analyzer.analyze(text)?;
        let phrases = group_accent_phrases(analyzed)?;
        log::debug!("Analyzed {} chars into {} accent phrases", text.chars().count(), phrases.len());
        Ok(phrases)
    }
}

/// Groups moras at the boundaries the analyzer reported. A phrase without a
/// reported nucleus is flat and gets its length as accent.
pub(crate) fn group_accent_phrases(analyzed: Vec<AnalyzedMora>) -> Result<Vec<AccentPhrase>, AnalysisError> {
    let mut phrases = Vec::new();
    let mut moras: Vec<Mora> = Vec::new();
    let mut accent = None;

    let mut flush = |moras: &mut Vec<Mora>, accent: &mut Option<usize>, pause: bool, interrogative: bool| {
        if moras.is_empty() {
            return;
        }
        let taken = std::mem::take(moras);
        let nucleus = accent.take().unwrap_or(taken.len());
        let mut phrase = AccentPhrase::new(taken, nucleus).interrogative(interrogative);
        if pause {
            phrase = phrase.with_pause();
        }
        phrases.push(phrase);
    };

    for item in analyzed {
        if item.kana.is_empty() || item.vowel.is_empty() {
            return Err(AnalysisError::new(format!("analyzer returned an incomplete mora: {:?}", item)));
        }
        moras.push(Mora::new(item.kana, item.consonant.as_deref(), item.vowel));
        if item.is_accent_nucleus && accent.is_none() {
            accent = Some(moras.len());
        }
        if let Boundary::Phrase { pause, interrogative } = item.boundary {
            flush(&mut moras, &mut accent, pause, interrogative);
        }
    }
    flush(&mut moras, &mut accent, false, false);

    // The utterance never ends in a pause.
    if let Some(last) = phrases.last_mut() {
        last.pause_mora = None;
    }
    Ok(phrases)
}
