use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::StyleId;

/// Values a freshly built query starts from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryDefaults {
    pub pre_phoneme_length: f64,
    pub post_phoneme_length: f64,
    pub output_sampling_rate: u32,
    pub output_stereo: bool,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            pre_phoneme_length: default_phoneme_padding(),
            post_phoneme_length: default_phoneme_padding(),
            output_sampling_rate: default_sampling_rate(),
            output_stereo: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_sampling_rate")]
    pub default_sampling_rate: u32,
    #[serde(default = "default_phoneme_padding")]
    pub pre_phoneme_length: f64,
    #[serde(default = "default_phoneme_padding")]
    pub post_phoneme_length: f64,
    #[serde(default = "default_presets_path")]
    pub presets_path: PathBuf,
    #[serde(default = "default_speakers_path")]
    pub speakers_path: PathBuf,
    #[serde(default = "default_open_jtalk_dict_dir")]
    pub open_jtalk_dict_dir: PathBuf,
    /// Style handed to the native analyzer; analysis output does not depend on it.
    #[serde(default)]
    pub analysis_style_id: StyleId,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_sampling_rate() -> u32 {
    24000
}

fn default_phoneme_padding() -> f64 {
    0.1
}

fn default_presets_path() -> PathBuf {
    PathBuf::from("presets.json")
}

fn default_speakers_path() -> PathBuf {
    PathBuf::from("speakers.json")
}

fn default_open_jtalk_dict_dir() -> PathBuf {
    PathBuf::from("./voicevox_core/open_jtalk_dic_utf_8-1.11")
}

fn default_workers() -> usize {
    1
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_sampling_rate: default_sampling_rate(),
            pre_phoneme_length: default_phoneme_padding(),
            post_phoneme_length: default_phoneme_padding(),
            presets_path: default_presets_path(),
            speakers_path: default_speakers_path(),
            open_jtalk_dict_dir: default_open_jtalk_dict_dir(),
            analysis_style_id: 0,
            workers: default_workers(),
        }
    }
}

impl EngineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&json)?;
        Ok(config)
    }

    pub fn query_defaults(&self) -> QueryDefaults {
        QueryDefaults {
            pre_phoneme_length: self.pre_phoneme_length,
            post_phoneme_length: self.post_phoneme_length,
            output_sampling_rate: self.default_sampling_rate,
            output_stereo: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"workers": 4}"#).unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(config.default_sampling_rate, 24000);
        assert_eq!(config.presets_path, PathBuf::from("presets.json"));
        assert_eq!(config.query_defaults(), QueryDefaults::default());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"default_sampling_rate": 48000, "pre_phoneme_length": 0.0}"#).unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.query_defaults().output_sampling_rate, 48000);
        assert_eq!(config.query_defaults().pre_phoneme_length, 0.0);
    }
}
