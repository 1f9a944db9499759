//! Error types for effect hosting

use crate::abi::PropertyId;
use std::path::PathBuf;
use thiserror::Error;

/// Status code returned by a native unit. Zero is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub i32);

impl Status {
    pub const INVALID_PROPERTY: Status = Status(-10879);
    pub const INVALID_PARAMETER: Status = Status(-10878);
    pub const INVALID_ELEMENT: Status = Status(-10877);
    pub const TOO_MANY_FRAMES: Status = Status(-10874);
    pub const FAILED_INITIALIZATION: Status = Status(-10875);
    pub const FORMAT_NOT_SUPPORTED: Status = Status(-10868);
    pub const UNINITIALIZED: Status = Status(-10867);
    pub const INVALID_SCOPE: Status = Status(-10866);
    pub const INVALID_PROPERTY_VALUE: Status = Status(-10851);

    pub const fn code(self) -> i32 {
        self.0
    }

    /// The code read as four characters, when it is printable text.
    pub fn four_cc(self) -> Option<String> {
        let bytes = self.0.to_be_bytes();
        bytes
            .iter()
            .all(|b| b.is_ascii_graphic() || *b == b' ')
            .then(|| String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.four_cc() {
            Some(text) => write!(f, "{} ('{}')", self.0, text),
            None => write!(f, "{}", self.0),
        }
    }
}

/// The configuration step at which a unit rejected the stream format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatStage {
    GlobalSampleRate,
    InputSampleRate,
    InputStreamFormat,
    OutputSampleRate,
    OutputStreamFormat,
    Initialize,
}

impl std::fmt::Display for FormatStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatStage::GlobalSampleRate => write!(f, "sample rate on global scope"),
            FormatStage::InputSampleRate => write!(f, "sample rate on input scope"),
            FormatStage::InputStreamFormat => write!(f, "stream format on input scope"),
            FormatStage::OutputSampleRate => write!(f, "sample rate on output scope"),
            FormatStage::OutputStreamFormat => write!(f, "stream format on output scope"),
            FormatStage::Initialize => write!(f, "initialize"),
        }
    }
}

#[derive(Error, Debug)]
pub enum HostError {
    #[error("Component not found: {0}")]
    ComponentNotFound(String),

    #[error("Failed to instantiate \"{path}\": {reason}")]
    InstantiationFailed { path: String, reason: String },

    #[error("Unit rejected {stage}: status {status}")]
    StreamFormatRejected { stage: FormatStage, status: Status },

    #[error("Failed to get parameter {id:#x}: status {status}")]
    ParameterQueryFailed { id: u32, status: Status },

    #[error("Failed to set parameter {id:#x}: status {status}")]
    ParameterSetFailed { id: u32, status: Status },

    #[error("Property {property:?} failed: status {status}")]
    Property { property: PropertyId, status: Status },

    #[error("Native {operation} failed: status {status}")]
    NativeCall {
        operation: &'static str,
        status: Status,
    },

    #[error("Malformed {property:?} payload: {source}")]
    PropertyCodec {
        property: PropertyId,
        #[source]
        source: bincode::Error,
    },

    #[error("Preset \"{preset}\" not found")]
    PresetNotFound { preset: String },

    #[error("Failed to decode \"{preset}\" preset: {reason}")]
    PresetDecodeFailed { preset: String, reason: String },

    #[error("Failed to encode \"{preset}\" preset: {reason}")]
    PresetEncodeFailed { preset: String, reason: String },

    #[error("Preset \"{preset}\" data is empty after conversion")]
    PresetEmpty { preset: String },

    #[error("Unable to store \"{key}\" in config group \"{group}\"")]
    ConfigWriteFailed { group: String, key: String },

    #[error("File error on \"{path}\": {source}")]
    FileIoFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: crate::instance::InstanceState,
    },

    #[error(transparent)]
    Core(#[from] fxhost_core::Error),
}

impl HostError {
    /// Soft failures are reported to the caller but leave the instance usable.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            HostError::ParameterQueryFailed { .. }
                | HostError::ParameterSetFailed { .. }
                | HostError::PresetEmpty { .. }
                | HostError::PresetNotFound { .. }
        )
    }

    pub(crate) fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HostError::FileIoFailed {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, HostError>;
