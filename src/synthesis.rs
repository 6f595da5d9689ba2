//! Hands finished queries to the core and renders the result as WAV.

use std::io::Cursor;
use std::sync::Arc;

use hound::{WavReader, WavSpec, WavWriter};
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

use crate::backend::{CoreError, PcmBuffer, StyleCatalog, SynthesisCore};
use crate::error::{EngineError, EngineErrorDescription};
use crate::mora_list;
use crate::types::{self, AccentPhrase, AudioQuery, Mora, StyleId};

const UPSPEAK_VOWEL_LENGTH: f64 = 0.15;
const UPSPEAK_PITCH_STEP: f64 = 0.3;
const UPSPEAK_MAX_PITCH: f64 = 6.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthesisOptions {
    /// Raise the end of interrogative phrases.
    pub enable_interrogative_upspeak: bool,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self { enable_interrogative_upspeak: true }
    }
}

#[derive(Clone)]
pub struct Synthesizer {
    core: Arc<dyn SynthesisCore>,
    catalog: Arc<dyn StyleCatalog>,
}

impl Synthesizer {
    pub fn new(core: Arc<dyn SynthesisCore>, catalog: Arc<dyn StyleCatalog>) -> Self {
        Self { core, catalog }
    }

    /// Renders `query` and returns a 16-bit WAV file.
    pub fn synthesize(&self, query: &AudioQuery, style_id: StyleId, options: SynthesisOptions) -> Result<Vec<u8>, EngineError> {
        types::check_structure(&query.accent_phrases)?;
        if !self.catalog.list_styles()?.contains(&style_id) {
            return Err(EngineError::new(EngineErrorDescription::UnknownStyle(style_id)));
        }

        let mut query = query.clone();
        for phrase in &mut query.accent_phrases {
            phrase.moras.iter_mut().for_each(Mora::sync_devoicing);
            if options.enable_interrogative_upspeak {
                adjust_interrogative_moras(phrase);
            }
        }

        let pcm = self.core.decode(&query, style_id)?;
        log::debug!("Core rendered {} samples at {} Hz", pcm.samples.len(), pcm.sampling_rate);

        let samples = if pcm.sampling_rate == query.output_sampling_rate {
            pcm.samples
        } else {
            resample(&pcm, query.output_sampling_rate)?
        };
        let channels = if query.output_stereo { 2 } else { 1 };
        encode_wav(&samples, query.output_sampling_rate, channels)
    }

    /// Renders several queries that share one output sampling rate.
    pub fn multi_synthesis(&self, queries: &[AudioQuery], style_id: StyleId) -> Result<Vec<Vec<u8>>, EngineError> {
        if let Some(first) = queries.first() {
            let expected = first.output_sampling_rate;
            if let Some(other) = queries.iter().find(|q| q.output_sampling_rate != expected) {
                return Err(EngineError::new(EngineErrorDescription::SamplingRateMismatch {
                    expected,
                    found: other.output_sampling_rate,
                }));
            }
        }
        queries
            .iter()
            .map(|query| self.synthesize(query, style_id, SynthesisOptions::default()))
            .collect()
    }
}

/// Appends a rising mora to an interrogative phrase that ends voiced.
fn adjust_interrogative_moras(phrase: &mut AccentPhrase) {
    if !phrase.is_interrogative {
        return;
    }
    let Some(last) = phrase.moras.last() else {
        return;
    };
    if last.pitch == 0.0 {
        return;
    }
    let text = mora_list::phonemes_to_text(None, &last.vowel).unwrap_or(last.text.as_str());
    let mut mora = Mora::new(text, None, last.vowel.clone());
    mora.vowel_length = UPSPEAK_VOWEL_LENGTH;
    mora.pitch = (last.pitch + UPSPEAK_PITCH_STEP).min(UPSPEAK_MAX_PITCH);
    phrase.moras.push(mora);
}

fn resample(pcm: &PcmBuffer, target_rate: u32) -> Result<Vec<f32>, EngineError> {
    if pcm.samples.is_empty() {
        return Ok(Vec::new());
    }
    let ratio = target_rate as f64 / pcm.sampling_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let chunk_size = pcm.samples.len().min(1024);
    let mut resampler = SincFixedIn::<f64>::new(ratio, 2.0, params, chunk_size, 1).map_err(core_failure)?;

    let input: Vec<f64> = pcm.samples.iter().map(|s| *s as f64).collect();
    let new_length = (input.len() as f64 * ratio) as usize;
    let delay = resampler.output_delay();
    let mut output: Vec<f64> = Vec::with_capacity(new_length + delay);
    let mut frames_out = vec![vec![0.0f64; resampler.output_frames_max()]];
    let mut chunk = vec![Vec::with_capacity(chunk_size)];
    let mut index = 0;

    loop {
        let needed = resampler.input_frames_next();
        if needed > input.len() - index {
            break;
        }
        chunk[0].clear();
        chunk[0].extend_from_slice(&input[index..index + needed]);
        let (_, written) = resampler.process_into_buffer(&chunk, &mut frames_out, None).map_err(core_failure)?;
        output.extend_from_slice(&frames_out[0][..written]);
        index += needed;
    }

    if index < input.len() {
        let needed = resampler.input_frames_next();
        chunk[0].clear();
        chunk[0].extend_from_slice(&input[index..]);
        chunk[0].resize(needed, 0.0);
        let (_, written) = resampler.process_into_buffer(&chunk, &mut frames_out, None).map_err(core_failure)?;
        output.extend_from_slice(&frames_out[0][..written]);
    }

    while output.len() < new_length + delay {
        let (_, written) = resampler
            .process_partial_into_buffer(None::<&[Vec<f64>]>, &mut frames_out, None)
            .map_err(core_failure)?;
        output.extend_from_slice(&frames_out[0][..written]);
    }

    Ok(output[delay..delay + new_length].iter().map(|s| *s as f32).collect())
}

fn core_failure<E: std::fmt::Display>(err: E) -> EngineError {
    EngineError::new(EngineErrorDescription::Core(CoreError::Failed(err.to_string())))
}

fn encode_wav(samples: &[f32], sampling_rate: u32, channels: u16) -> Result<Vec<u8>, EngineError> {
    let spec = WavSpec {
        channels,
        sample_rate: sampling_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            for _ in 0..channels {
                writer.write_sample(value)?;
            }
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Joins WAV files that share sampling rate and channel count.
pub fn connect_waves(waves: &[Vec<u8>]) -> Result<Vec<u8>, EngineError> {
    let mut spec: Option<WavSpec> = None;
    let mut samples: Vec<i16> = Vec::new();

    for wave in waves {
        let mut reader = WavReader::new(Cursor::new(wave.as_slice()))?;
        let current = reader.spec();
        match spec {
            None => spec = Some(current),
            Some(expected) if expected.sample_rate != current.sample_rate => {
                return Err(EngineError::new(EngineErrorDescription::SamplingRateMismatch {
                    expected: expected.sample_rate,
                    found: current.sample_rate,
                }));
            }
            Some(expected) if expected.channels != current.channels => {
                return Err(core_failure(format!(
                    "channel counts differ: expected {}, found {}",
                    expected.channels, current.channels
                )));
            }
            Some(_) => {}
        }
        match (current.sample_format, current.bits_per_sample) {
            (hound::SampleFormat::Int, 16) => {
                for sample in reader.samples::<i16>() {
                    samples.push(sample?);
                }
            }
            (hound::SampleFormat::Float, 32) => {
                for sample in reader.samples::<f32>() {
                    samples.push((sample?.clamp(-1.0, 1.0) * i16::MAX as f32) as i16);
                }
            }
            (format, bits) => {
                return Err(core_failure(format!("unsupported sample format: {:?} / {}", format, bits)));
            }
        }
    }

    let spec = spec.unwrap_or(WavSpec {
        channels: 1,
        sample_rate: 24000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    });
    let spec = WavSpec { bits_per_sample: 16, sample_format: hound::SampleFormat::Int, ..spec };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}
