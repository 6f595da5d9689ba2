//! Analyzer and synthesis core backed by the VOICEVOX core library.

use std::ffi::CString;
use std::io::Cursor;
use std::path::Path;

use parking_lot::Mutex;
use vvcore::{AccelerationMode, AudioQueryOptions, SynthesisOptions, VoicevoxCore};

use crate::backend::{
    AnalysisError, AnalyzedMora, Analyzer, Boundary, CoreError, MoraProsody, PcmBuffer, PhraseProsody, SynthesisCore,
};
use crate::kana;
use crate::types::{AccentPhrase, AudioQuery, StyleId};

pub struct VvcoreBackend {
    vvc: Mutex<VoicevoxCore>,
    analysis_style_id: StyleId,
}

impl VvcoreBackend {
    /// Loads every model and the OpenJTalk dictionary at `open_jtalk_dict_dir`.
    pub fn new<P: AsRef<Path>>(open_jtalk_dict_dir: P, analysis_style_id: StyleId) -> Result<Self, CoreError> {
        let dir = open_jtalk_dict_dir
            .as_ref()
            .to_str()
            .and_then(|dir| CString::new(dir).ok())
            .ok_or_else(|| CoreError::Failed("Failed to convert path to CString".to_string()))?;
        let vvc = VoicevoxCore::new_from_options(AccelerationMode::Auto, 0, true, dir.as_c_str())
            .map_err(|e| CoreError::Failed(VoicevoxCore::error_result_to_message(e).to_string()))?;
        log::debug!("VOICEVOX core initialized with dictionary {}", open_jtalk_dict_dir.as_ref().display());

        Ok(Self {
            vvc: Mutex::new(vvc),
            analysis_style_id,
        })
    }

    fn audio_query(&self, text: &str, style_id: StyleId, kana: bool) -> Result<AudioQuery, CoreError> {
        let vvc = self.vvc.lock();
        let json = vvc
            .audio_query(text, style_id, AudioQueryOptions { kana })
            .map_err(|e| CoreError::Failed(VoicevoxCore::error_result_to_message(e).to_string()))?;
        serde_json::from_str(json.as_str()).map_err(|e| CoreError::Failed(format!("Failed to parse JSON: {}", e)))
    }
}

impl Analyzer for VvcoreBackend {
    fn analyze(&self, text: &str) -> Result<Vec<AnalyzedMora>, AnalysisError> {
        let query = self
            .audio_query(text, self.analysis_style_id, false)
            .map_err(|e| AnalysisError::new(e.to_string()))?;

        let mut analyzed = Vec::new();
        for phrase in query.accent_phrases {
            let pause = phrase.pause_mora.is_some();
            let count = phrase.moras.len();
            for (index, mora) in phrase.moras.into_iter().enumerate() {
                let boundary = if index + 1 == count {
                    Boundary::Phrase {
                        pause,
                        interrogative: phrase.is_interrogative,
                    }
                } else {
                    Boundary::None
                };
                analyzed.push(AnalyzedMora {
                    kana: mora.text,
                    consonant: mora.consonant,
                    vowel: mora.vowel,
                    is_accent_nucleus: index + 1 == phrase.accent,
                    boundary,
                });
            }
        }
        Ok(analyzed)
    }
}

impl SynthesisCore for VvcoreBackend {
    fn default_prosody(&self, accent_phrases: &[AccentPhrase], style_id: StyleId) -> Result<Vec<PhraseProsody>, CoreError> {
        let query = self.audio_query(&kana::encode(accent_phrases), style_id, true)?;
        Ok(query
            .accent_phrases
            .iter()
            .map(|phrase| PhraseProsody {
                moras: phrase
                    .moras
                    .iter()
                    .map(|mora| MoraProsody {
                        consonant_length: mora.consonant_length,
                        vowel_length: mora.vowel_length,
                        pitch: mora.pitch,
                    })
                    .collect(),
                pause_length: phrase.pause_mora.as_ref().map(|mora| mora.vowel_length),
            })
            .collect())
    }

    fn decode(&self, query: &AudioQuery, style_id: StyleId) -> Result<PcmBuffer, CoreError> {
        let mut query = query.clone();
        query.output_stereo = false;
        let json = serde_json::to_string(&query).map_err(|e| CoreError::Failed(e.to_string()))?;
        log::debug!("Synthesizing with JSON: {}", json);

        let wav = {
            let vvc = self.vvc.lock();
            let res = vvc
                .synthesis(&json, style_id, SynthesisOptions { enable_interrogative_upspeak: false })
                .map_err(|e| CoreError::Failed(VoicevoxCore::error_result_to_message(e).to_string()))?;
            res.as_slice().to_owned()
        };

        let mut reader = hound::WavReader::new(Cursor::new(wav)).map_err(|e| CoreError::Failed(e.to_string()))?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;
        let samples = reader
            .samples::<i16>()
            .step_by(channels)
            .map(|sample| sample.map(|s| s as f32 / 32768.0))
            .collect::<Result<Vec<f32>, _>>()
            .map_err(|e| CoreError::Failed(e.to_string()))?;

        Ok(PcmBuffer {
            samples,
            sampling_rate: spec.sample_rate,
        })
    }
}
