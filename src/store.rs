//! JSON file collaborators. Files are read on every call so that edits made while
//! the engine runs take effect on the next request.

use std::path::{Path, PathBuf};

use crate::backend::{CatalogError, PresetStore, PresetStoreError, StyleCatalog};
use crate::types::{Preset, Speaker};

/// A list of presets, as edited by the user. Files ending in `.yaml` or `.yml`
/// are read as YAML, anything else as JSON.
#[derive(Debug, Clone)]
pub struct PresetFile {
    path: PathBuf,
}

impl PresetFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }
}

impl PresetFile {
    fn is_yaml(&self) -> bool {
        matches!(self.path.extension().and_then(|ext| ext.to_str()), Some("yaml" | "yml"))
    }
}

impl PresetStore for PresetFile {
    fn load_presets(&self) -> Result<Vec<Preset>, PresetStoreError> {
        let contents = std::fs::read_to_string(&self.path)?;
        if self.is_yaml() {
            Ok(serde_yaml::from_str(&contents)?)
        } else {
            Ok(serde_json::from_str(&contents)?)
        }
    }
}

/// A JSON array of speakers and their styles.
#[derive(Debug, Clone)]
pub struct SpeakersFile {
    path: PathBuf,
}

impl SpeakersFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }
}

impl StyleCatalog for SpeakersFile {
    fn speakers(&self) -> Result<Vec<Speaker>, CatalogError> {
        let json = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_file_is_reread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets.json");
        std::fs::write(&path, "[]").unwrap();
        let store = PresetFile::new(&path);
        assert!(store.load_presets().unwrap().is_empty());

        std::fs::write(
            &path,
            r#"[{"id": 1, "name": "a", "speaker_uuid": "u", "style_id": 0,
                "speedScale": 1.0, "pitchScale": 0.0, "intonationScale": 1.0,
                "volumeScale": 1.0, "prePhonemeLength": 0.1, "postPhonemeLength": 0.1}]"#,
        )
        .unwrap();
        assert_eq!(store.load_presets().unwrap().len(), 1);
    }

    #[test]
    fn missing_or_malformed_files_fail() {
        let dir = tempfile::tempdir().unwrap();
        let store = PresetFile::new(dir.path().join("absent.json"));
        assert!(matches!(store.load_presets(), Err(PresetStoreError::Io(_))));

        let path = dir.path().join("speakers.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(SpeakersFile::new(&path).speakers(), Err(CatalogError::Format(_))));
    }

    #[test]
    fn speakers_file_lists_styles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speakers.json");
        std::fs::write(
            &path,
            r#"[{"name": "s", "speaker_uuid": "u", "styles": [{"name": "n", "id": 8}, {"name": "m", "id": 9}]}]"#,
        )
        .unwrap();
        let styles = SpeakersFile::new(&path).list_styles().unwrap();
        assert_eq!(styles.into_iter().collect::<Vec<_>>(), vec![8, 9]);
    }

    #[test]
    fn preset_file_reads_yaml_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets.yaml");
        std::fs::write(
            &path,
            "- id: 1\n  name: サンプルプリセット\n  speaker_uuid: 7ffcb7ce-00ec-4bdc-82cd-45a8889e43ff\n  style_id: 0\n  speedScale: 1.1\n  pitchScale: 0.0\n  intonationScale: 1.0\n  volumeScale: 1.0\n  prePhonemeLength: 0.1\n  postPhonemeLength: 0.1\n",
        )
        .unwrap();
        let presets = PresetFile::new(&path).load_presets().unwrap();
        assert_eq!(presets.len(), 1);
        assert_eq!(presets[0].speed_scale, 1.1);

        std::fs::write(&path, "- id: [").unwrap();
        assert!(matches!(PresetFile::new(&path).load_presets(), Err(PresetStoreError::Yaml(_))));
    }
}
