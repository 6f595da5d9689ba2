use crate::analysis::TextAnalysisAdapter;
use crate::config::QueryDefaults;
use crate::error::EngineError;
use crate::kana;
use crate::prosody::{FillMode, ProsodyFiller};
use crate::types::{AccentPhrase, AudioQuery, QueryOverrides, StyleId};

#[derive(Clone)]
pub struct QueryBuilder {
    analysis: TextAnalysisAdapter,
    filler: ProsodyFiller,
    defaults: QueryDefaults,
}

impl QueryBuilder {
    pub fn new(analysis: TextAnalysisAdapter, filler: ProsodyFiller, defaults: QueryDefaults) -> Self {
        Self { analysis, filler, defaults }
    }

    pub fn filler(&self) -> &ProsodyFiller {
        &self.filler
    }

    /// Scales at their neutral values and the configured silence padding.
    pub fn default_overrides(&self) -> QueryOverrides {
        QueryOverrides {
            speed_scale: 1.0,
            pitch_scale: 0.0,
            intonation_scale: 1.0,
            volume_scale: 1.0,
            pre_phoneme_length: self.defaults.pre_phoneme_length,
            post_phoneme_length: self.defaults.post_phoneme_length,
        }
    }

    /// Accent phrases with filled prosody, from text or from kana notation.
    pub fn create_accent_phrases(&self, text_or_kana: &str, style_id: StyleId, is_kana: bool) -> Result<Vec<AccentPhrase>, EngineError> {
        let mut accent_phrases = if is_kana {
            kana::decode(text_or_kana)?
        } else {
            self.analysis.create_accent_phrases(text_or_kana)?
        };
        self.filler.fill(&mut accent_phrases, style_id, FillMode::Fresh)?;
        Ok(accent_phrases)
    }

    pub fn build_query(&self, text_or_kana: &str, style_id: StyleId, is_kana: bool) -> Result<AudioQuery, EngineError> {
        self.build_query_with(text_or_kana, style_id, is_kana, &self.default_overrides())
    }

    pub fn build_query_with(
        &self,
        text_or_kana: &str,
        style_id: StyleId,
        is_kana: bool,
        overrides: &QueryOverrides,
    ) -> Result<AudioQuery, EngineError> {
        let accent_phrases = self.create_accent_phrases(text_or_kana, style_id, is_kana)?;
        log::debug!(
            "Built query for style {} from {} ({} accent phrases)",
            style_id,
            if is_kana { "kana" } else { "text" },
            accent_phrases.len()
        );

        let kana = kana::encode(&accent_phrases);
        let mut query = AudioQuery {
            accent_phrases,
            speed_scale: 1.0,
            pitch_scale: 0.0,
            intonation_scale: 1.0,
            volume_scale: 1.0,
            pre_phoneme_length: self.defaults.pre_phoneme_length,
            post_phoneme_length: self.defaults.post_phoneme_length,
            output_sampling_rate: self.defaults.output_sampling_rate,
            output_stereo: self.defaults.output_stereo,
            kana: Some(kana),
        };
        query.apply_overrides(overrides);
        Ok(query)
    }

    /// Swaps in the reading given as kana and keeps every other setting of `query`.
    /// On error `query` is left untouched.
    pub fn replace_accent_phrases_from_kana(&self, query: &mut AudioQuery, kana: &str, style_id: StyleId) -> Result<(), EngineError> {
        let accent_phrases = self.create_accent_phrases(kana, style_id, true)?;
        query.kana = Some(kana::encode(&accent_phrases));
        query.accent_phrases = accent_phrases;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::error::EngineErrorDescription;
    use crate::mock::{MockAnalyzer, MockCore, StaticCatalog};

    fn builder() -> QueryBuilder {
        let filler = ProsodyFiller::new(Arc::new(MockCore::new()), Arc::new(StaticCatalog::sample()));
        QueryBuilder::new(TextAnalysisAdapter::new(Arc::new(MockAnalyzer::new())), filler, QueryDefaults::default())
    }

    #[test]
    fn empty_text_builds_empty_query() {
        let query = builder().build_query("", 0, false).unwrap();
        assert!(query.accent_phrases.is_empty());
        assert_eq!(query.speed_scale, 1.0);
        assert_eq!(query.pitch_scale, 0.0);
        assert_eq!(query.intonation_scale, 1.0);
        assert_eq!(query.volume_scale, 1.0);
        assert_eq!(query.pre_phoneme_length, 0.1);
        assert_eq!(query.post_phoneme_length, 0.1);
        assert_eq!(query.output_sampling_rate, 24000);
        assert!(!query.output_stereo);
        assert_eq!(query.kana.as_deref(), Some(""));
    }

    #[test]
    fn kana_query_caches_notation() {
        let query = builder().build_query("ア'_メ、フ'ル", 0, true).unwrap();
        assert_eq!(query.kana.as_deref(), Some("ア'_メ、フ'ル"));
        assert!(query.accent_phrases[0].moras[0].pitch > 0.0);
    }

    #[test]
    fn text_query_uses_analyzer() {
        let query = builder().build_query("あめ、ふる", 2, false).unwrap();
        assert_eq!(query.accent_phrases.len(), 2);
        assert_eq!(query.kana.as_deref(), Some("ア'メ、フ'ル"));
    }

    #[test]
    fn kana_errors_propagate() {
        let err = builder().build_query("アメ", 0, true).unwrap_err();
        assert!(matches!(err.as_inner(), EngineErrorDescription::KanaParse(_)));
    }

    #[test]
    fn replacing_reading_keeps_settings() {
        let builder = builder();
        let mut query = builder.build_query("ア'メ", 0, true).unwrap();
        query.speed_scale = 1.4;
        query.volume_scale = 0.5;

        builder.replace_accent_phrases_from_kana(&mut query, "ユ'キ/フ'ル", 0).unwrap();
        assert_eq!(query.speed_scale, 1.4);
        assert_eq!(query.volume_scale, 0.5);
        assert_eq!(query.accent_phrases.len(), 2);
        assert_eq!(query.kana.as_deref(), Some("ユ'キ/フ'ル"));

        let before = query.clone();
        assert!(builder.replace_accent_phrases_from_kana(&mut query, "ユキ", 0).is_err());
        assert_eq!(query, before);
    }
}
