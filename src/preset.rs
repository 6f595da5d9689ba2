use std::collections::HashSet;
use std::sync::Arc;

use crate::backend::{PresetStore, StyleCatalog};
use crate::error::{EngineError, EngineErrorDescription};
use crate::types::{Preset, PresetId, QueryOverrides, StyleId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPreset {
    pub style_id: StyleId,
    pub overrides: QueryOverrides,
}

/// Looks presets up in a store that is re-read on every call.
#[derive(Clone)]
pub struct PresetResolver {
    store: Arc<dyn PresetStore>,
    catalog: Arc<dyn StyleCatalog>,
}

impl PresetResolver {
    pub fn new(store: Arc<dyn PresetStore>, catalog: Arc<dyn StyleCatalog>) -> Self {
        Self { store, catalog }
    }

    /// Current presets, rejected as a whole when an id repeats.
    pub fn presets(&self) -> Result<Vec<Preset>, EngineError> {
        let presets = self.store.load_presets()?;
        let mut seen = HashSet::new();
        if let Some(duplicate) = presets.iter().find(|preset| !seen.insert(preset.id)) {
            log::warn!("Preset store contains id {} more than once", duplicate.id);
            return Err(EngineError::new(EngineErrorDescription::DuplicatePresetId(duplicate.id)));
        }
        Ok(presets)
    }

    pub fn resolve(&self, preset_id: PresetId) -> Result<ResolvedPreset, EngineError> {
        let preset = self
            .presets()?
            .into_iter()
            .find(|preset| preset.id == preset_id)
            .ok_or_else(|| EngineError::new(EngineErrorDescription::PresetNotFound(preset_id)))?;

        if !self.catalog.list_styles()?.contains(&preset.style_id) {
            return Err(EngineError::new(EngineErrorDescription::InvalidStyleReference {
                preset_id,
                style_id: preset.style_id,
            }));
        }

        log::info!("Resolved preset {} ({}) to style {}", preset.id, preset.name, preset.style_id);
        Ok(ResolvedPreset {
            style_id: preset.style_id,
            overrides: preset.overrides(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{StaticCatalog, StaticPresets};

    fn preset(id: PresetId, style_id: StyleId) -> Preset {
        Preset {
            id,
            name: format!("preset {}", id),
            speaker_uuid: "7ffcb7ce-00ec-4bdc-82cd-45a8889e43ff".to_string(),
            style_id,
            speed_scale: 1.2,
            pitch_scale: 0.05,
            intonation_scale: 1.1,
            volume_scale: 0.9,
            pre_phoneme_length: 0.2,
            post_phoneme_length: 0.3,
        }
    }

    fn resolver(presets: Vec<Preset>) -> (PresetResolver, Arc<StaticPresets>, Arc<StaticCatalog>) {
        let store = Arc::new(StaticPresets::new(presets));
        let catalog = Arc::new(StaticCatalog::sample());
        (PresetResolver::new(store.clone(), catalog.clone()), store, catalog)
    }

    #[test]
    fn resolves_style_and_overrides() {
        let (resolver, _, _) = resolver(vec![preset(1, 0), preset(2, 3)]);
        let resolved = resolver.resolve(2).unwrap();
        assert_eq!(resolved.style_id, 3);
        assert_eq!(resolved.overrides.speed_scale, 1.2);
        assert_eq!(resolved.overrides.post_phoneme_length, 0.3);
    }

    #[test]
    fn missing_preset() {
        let (resolver, _, _) = resolver(vec![preset(1, 0)]);
        let err = resolver.resolve(5).unwrap_err();
        assert!(matches!(err.as_inner(), EngineErrorDescription::PresetNotFound(5)));
    }

    #[test]
    fn duplicate_ids_fail_every_lookup() {
        let (resolver, _, _) = resolver(vec![preset(1, 0), preset(2, 1), preset(1, 2)]);
        let err = resolver.resolve(2).unwrap_err();
        assert!(matches!(err.as_inner(), EngineErrorDescription::DuplicatePresetId(1)));
    }

    #[test]
    fn style_missing_from_catalog() {
        let (resolver, _, _) = resolver(vec![preset(1, 42)]);
        let err = resolver.resolve(1).unwrap_err();
        assert!(matches!(
            err.as_inner(),
            EngineErrorDescription::InvalidStyleReference { preset_id: 1, style_id: 42 }
        ));
    }

    #[test]
    fn store_edits_apply_to_next_call() {
        let (resolver, store, catalog) = resolver(vec![preset(1, 0)]);
        assert_eq!(resolver.resolve(1).unwrap().style_id, 0);

        store.set_presets(vec![preset(1, 2)]);
        assert_eq!(resolver.resolve(1).unwrap().style_id, 2);

        catalog.set_speakers(Vec::new());
        assert!(resolver.resolve(1).is_err());
    }
}
