pub mod types;
mod mora_list;
pub mod kana;
pub mod error;
pub mod backend;
pub mod analysis;
pub mod prosody;
pub mod query;
pub mod preset;
pub mod synthesis;
pub mod store;
pub mod config;
pub mod mock;
mod engine;
#[cfg(feature = "vvcore")]
mod vvc;

pub mod deps {
    pub use serde_json;
    pub use serde;
}

pub use engine::{Engine, EngineHandle};

#[cfg(feature = "vvcore")]
pub use vvc::VvcoreBackend;

pub use error::{
    EngineError,
    EngineErrorDescription,
    ErrorDescription,
    GenericError,
};

pub use config::{EngineConfig, QueryDefaults};
pub use kana::KanaParseError;
pub use synthesis::SynthesisOptions;
pub use types::{AccentPhrase, AudioQuery, Mora, Preset, PresetId, QueryOverrides, Speaker, SpeakerStyle, StructureError, StyleId};
