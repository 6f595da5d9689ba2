use voicevox_query::backend::{Analyzer, SynthesisCore};
use voicevox_query::mock::{MockAnalyzer, MockCore, StaticCatalog};
use voicevox_query::store::PresetFile;
use voicevox_query::{AccentPhrase, AudioQuery, Engine, EngineConfig, EngineHandle, StyleId, SynthesisOptions};

use std::io::Read;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(about = "VOICEVOX audio query engine", long_about = None, version)]
struct Cli {
    /// Engine configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use the built-in mock analyzer and core instead of the native library
    #[arg(long)]
    enable_mock: bool,

    /// Preset file, overrides the configuration
    #[arg(long)]
    presets: Option<PathBuf>,

    /// Speaker catalog file, overrides the configuration
    #[arg(long)]
    speakers: Option<PathBuf>,

    /// OpenJTalk dictionary directory, overrides the configuration
    #[arg(long)]
    open_jtalk_dict_dir: Option<PathBuf>,

    /// Default output sampling rate, overrides the configuration
    #[arg(long)]
    sampling_rate: Option<u32>,

    /// Worker threads, overrides the configuration
    #[arg(long)]
    workers: Option<usize>,

    #[command(subcommand)]
    subcommand: Command,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum MoraTarget {
    All,
    Length,
    Pitch,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Builds an audio query from text (or kana) read on stdin
    AudioQuery {
        /// Style ID
        #[arg(long, default_value = "0", conflicts_with = "preset")]
        style_id: StyleId,

        /// Preset ID; the preset picks the style and scales
        #[arg(long)]
        preset: Option<u32>,

        /// Input is kana notation
        #[arg(long, conflicts_with = "preset")]
        kana: bool,
    },

    /// Prints accent phrases for text (or kana) read on stdin
    AccentPhrases {
        /// Style ID
        #[arg(long, default_value = "0")]
        style_id: StyleId,

        /// Input is kana notation
        #[arg(long)]
        kana: bool,
    },

    /// Refills lengths and/or pitch of accent phrases (JSON) read on stdin
    MoraData {
        /// Style ID
        #[arg(long, default_value = "0")]
        style_id: StyleId,

        /// Values to predict again
        #[arg(long, value_enum, default_value = "all")]
        target: MoraTarget,
    },

    /// Renders an audio query (JSON) read on stdin and writes WAV to stdout
    Synthesis {
        /// Style ID
        #[arg(long, default_value = "0")]
        style_id: StyleId,

        /// Do not raise the end of interrogative phrases
        #[arg(long)]
        disable_interrogative_upspeak: bool,
    },

    /// Renders a JSON array of audio queries into numbered WAV files
    #[command(arg_required_else_help = true)]
    MultiSynthesis {
        /// Style ID
        #[arg(long, default_value = "0")]
        style_id: StyleId,

        /// Directory receiving 001.wav, 002.wav, ...
        #[arg(long)]
        output_dir: PathBuf,
    },

    /// Concatenates WAV files and writes the result to stdout
    #[command(arg_required_else_help = true)]
    ConnectWaves {
        files: Vec<PathBuf>,
    },

    /// Lists presets
    Presets,

    /// Lists speakers
    Speakers {
        /// JSON output
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Cli::parse();
    let config = load_config(&args)?;
    log::debug!("Configuration: {:?}", config);
    let handle = EngineHandle::start(build_engine(&config, args.enable_mock)?, config.workers);

    match args.subcommand {
        Command::AudioQuery { style_id, preset, kana } => {
            let text = read_stdin()?;
            let query = match preset {
                Some(preset_id) => handle.audio_query_from_preset_blocking(text, preset_id)?,
                None => handle.audio_query_blocking(text, style_id, kana)?,
            };
            write_json(&query)?;
        },

        Command::AccentPhrases { style_id, kana } => {
            let text = read_stdin()?;
            let accent_phrases = handle.accent_phrases_blocking(text, style_id, kana)?;
            write_json(&accent_phrases)?;
        },

        Command::MoraData { style_id, target } => {
            let accent_phrases: Vec<AccentPhrase> = serde_json::from_str(&read_stdin()?)?;
            let accent_phrases = match target {
                MoraTarget::All => handle.mora_data_blocking(accent_phrases, style_id)?,
                MoraTarget::Length => handle.mora_length_blocking(accent_phrases, style_id)?,
                MoraTarget::Pitch => handle.mora_pitch_blocking(accent_phrases, style_id)?,
            };
            write_json(&accent_phrases)?;
        },

        Command::Synthesis { style_id, disable_interrogative_upspeak } => {
            let query: AudioQuery = serde_json::from_str(&read_stdin()?)?;
            let options = SynthesisOptions {
                enable_interrogative_upspeak: !disable_interrogative_upspeak,
            };
            let wav = handle.synthesize_blocking(query, style_id, options)?;
            std::io::stdout().write_all(wav.as_slice())?;
        },

        Command::MultiSynthesis { style_id, output_dir } => {
            let queries: Vec<AudioQuery> = serde_json::from_str(&read_stdin()?)?;
            let waves = handle.multi_synthesis_blocking(queries, style_id)?;
            std::fs::create_dir_all(&output_dir)?;
            for (index, wav) in waves.iter().enumerate() {
                let path = output_dir.join(format!("{:03}.wav", index + 1));
                std::fs::write(&path, wav)?;
                log::info!("Wrote {}", path.display());
            }
        },

        Command::ConnectWaves { files } => {
            let waves = files.iter().map(std::fs::read).collect::<Result<Vec<_>, _>>()?;
            let wav = handle.connect_waves_blocking(waves)?;
            std::io::stdout().write_all(wav.as_slice())?;
        },

        Command::Presets => {
            write_json(&handle.presets_blocking()?)?;
        },

        Command::Speakers { json } => {
            let speakers = handle.speakers_blocking()?;
            if json {
                write_json(&speakers)?;
            } else {
                println!("STYLE_ID\tSPEAKER_NAME\tSTYLE_NAME");
                for speaker in speakers {
                    for style in speaker.styles {
                        println!("{}\t{}\t{}", style.id, speaker.name, style.name);
                    }
                }
            }
        },
    }

    Ok(())
}

fn load_config(args: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(path) = &args.presets {
        config.presets_path = path.clone();
    }
    if let Some(path) = &args.speakers {
        config.speakers_path = path.clone();
    }
    if let Some(dir) = &args.open_jtalk_dict_dir {
        config.open_jtalk_dict_dir = dir.clone();
    }
    if let Some(rate) = args.sampling_rate {
        config.default_sampling_rate = rate;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    Ok(config)
}

fn build_engine(config: &EngineConfig, enable_mock: bool) -> anyhow::Result<Engine> {
    if enable_mock {
        log::info!("Using the mock backend");
        let analyzer: Arc<dyn Analyzer> = Arc::new(MockAnalyzer::new());
        let core: Arc<dyn SynthesisCore> = Arc::new(MockCore::new());
        return Ok(Engine::new(
            analyzer,
            core,
            Arc::new(StaticCatalog::sample()),
            Arc::new(PresetFile::new(&config.presets_path)),
            config.query_defaults(),
        ));
    }
    native_engine(config)
}

#[cfg(feature = "vvcore")]
fn native_engine(config: &EngineConfig) -> anyhow::Result<Engine> {
    log::info!("Initializing...");
    let backend = Arc::new(voicevox_query::VvcoreBackend::new(&config.open_jtalk_dict_dir, config.analysis_style_id)?);
    log::info!("Initialized.");
    Ok(Engine::with_files(config, backend.clone(), backend))
}

#[cfg(not(feature = "vvcore"))]
fn native_engine(_config: &EngineConfig) -> anyhow::Result<Engine> {
    anyhow::bail!("built without the vvcore feature; pass --enable-mock to use the mock backend")
}

fn read_stdin() -> anyhow::Result<String> {
    let mut text = String::new();
    let _ = std::io::stdin().read_to_string(&mut text)?;
    Ok(text.trim_end_matches(|c| c == '\r' || c == '\n').to_string())
}

fn write_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    std::io::stdout().write_all(json.as_bytes())?;
    Ok(())
}
