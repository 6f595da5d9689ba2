use std::error::Error;
use std::fmt::{self, Display, Debug};

use crate::backend::{AnalysisError, CatalogError, CoreError, PresetStoreError};
use crate::kana::KanaParseError;
use crate::types::{PresetId, StructureError, StyleId};

pub trait ErrorDescription {
    fn description(&self) -> impl Display;
    /// HTTP status an outer transport should answer with.
    fn status(&self) -> Option<u16> {
        None
    }
    fn error_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}

impl<T> ErrorDescription for T
where
    T: Display,
{
    fn description(&self) -> impl Display {
        self
    }
}

pub struct GenericError<T>(pub T) where T: ErrorDescription;

impl<T> GenericError<T>
where
    T: ErrorDescription,
{
    pub const fn new(err: T) -> Self {
        Self(err)
    }

    pub fn as_inner(&self) -> &T {
        &self.0
    }

    pub fn error_name(&self) -> &'static str {
        self.0.error_name()
    }

    pub fn status(&self) -> Option<u16> {
        self.0.status()
    }
}

impl<T> Debug for GenericError<T>
where
    T: ErrorDescription,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.error_name(), self.0.description())?;
        match self.0.status() {
            Some(status) => write!(f, " [status {}]", status),
            None => Ok(()),
        }
    }
}

impl<T> Display for GenericError<T>
where
    T: ErrorDescription,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.description())
    }
}

impl<T> Error for GenericError<T>
where
    T: ErrorDescription,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.0.source()
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum EngineErrorDescription {
    KanaParse(KanaParseError),
    InvalidAccentPhrase(StructureError),
    Analysis(AnalysisError),
    UnknownStyle(StyleId),
    InvalidStyleReference { preset_id: PresetId, style_id: StyleId },
    PresetNotFound(PresetId),
    DuplicatePresetId(PresetId),
    PresetStore(PresetStoreError),
    Catalog(CatalogError),
    Core(CoreError),
    SamplingRateMismatch { expected: u32, found: u32 },
    Audio(hound::Error),
    NotRunning,
}

impl EngineErrorDescription {
    /// Whether the caller can fix the failure by changing its input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::KanaParse(_)
                | Self::InvalidAccentPhrase(_)
                | Self::UnknownStyle(_)
                | Self::InvalidStyleReference { .. }
                | Self::PresetNotFound(_)
                | Self::DuplicatePresetId(_)
                | Self::SamplingRateMismatch { .. }
        )
    }
}

impl ErrorDescription for EngineErrorDescription {
    #[allow(refining_impl_trait)]
    fn description(&self) -> String {
        match self {
            Self::KanaParse(e) => format!("Failed to parse kana: {}", e),
            Self::InvalidAccentPhrase(e) => format!("Invalid accent phrases: {}", e),
            Self::Analysis(e) => format!("Text analysis failed: {}", e),
            Self::UnknownStyle(id) => format!("Unknown style id: {}", id),
            Self::InvalidStyleReference { preset_id, style_id } => {
                format!("Preset {} refers to style {} which does not exist", preset_id, style_id)
            }
            Self::PresetNotFound(id) => format!("Preset not found: {}", id),
            Self::DuplicatePresetId(id) => format!("Preset id {} appears more than once", id),
            Self::PresetStore(e) => format!("Failed to load presets: {}", e),
            Self::Catalog(e) => format!("Failed to read style catalog: {}", e),
            Self::Core(e) => format!("Synthesis core failed: {}", e),
            Self::SamplingRateMismatch { expected, found } => {
                format!("Sampling rates differ: expected {}, found {}", expected, found)
            }
            Self::Audio(e) => format!("Audio encoding failed: {}", e),
            Self::NotRunning => "Engine is not running".to_string(),
        }
    }

    /// 400 for notation, 404 for unknown styles, 422 for other rejected
    /// input, 500 otherwise.
    fn status(&self) -> Option<u16> {
        let status = match self {
            Self::KanaParse(_) => 400,
            Self::UnknownStyle(_) => 404,
            _ if self.is_client_error() => 422,
            _ => 500,
        };
        Some(status)
    }

    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::KanaParse(e) => Some(e),
            Self::InvalidAccentPhrase(e) => Some(e),
            Self::Analysis(e) => Some(e),
            Self::PresetStore(e) => Some(e),
            Self::Catalog(e) => Some(e),
            Self::Core(e) => Some(e),
            Self::Audio(e) => Some(e),
            _ => None,
        }
    }
}

pub type EngineError = GenericError<EngineErrorDescription>;

impl From<KanaParseError> for EngineError {
    fn from(err: KanaParseError) -> Self {
        Self::new(EngineErrorDescription::KanaParse(err))
    }
}

impl From<StructureError> for EngineError {
    fn from(err: StructureError) -> Self {
        Self::new(EngineErrorDescription::InvalidAccentPhrase(err))
    }
}

impl From<AnalysisError> for EngineError {
    fn from(err: AnalysisError) -> Self {
        Self::new(EngineErrorDescription::Analysis(err))
    }
}

impl From<PresetStoreError> for EngineError {
    fn from(err: PresetStoreError) -> Self {
        Self::new(EngineErrorDescription::PresetStore(err))
    }
}

impl From<CatalogError> for EngineError {
    fn from(err: CatalogError) -> Self {
        Self::new(EngineErrorDescription::Catalog(err))
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnknownStyle(id) => Self::new(EngineErrorDescription::UnknownStyle(id)),
            err => Self::new(EngineErrorDescription::Core(err)),
        }
    }
}

impl From<hound::Error> for EngineError {
    fn from(err: hound::Error) -> Self {
        Self::new(EngineErrorDescription::Audio(err))
    }
}
