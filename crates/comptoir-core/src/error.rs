use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the Comptoir crates.
#[derive(Error, Debug)]
pub enum ComptoirError {
    /// The gauge selector does not name a recognised gauge.
    #[error("Unknown gauge: {0}")]
    UnknownGauge(String),

    /// The district selector does not name a recognised district.
    #[error("Unknown district: {0}")]
    UnknownDistrict(String),

    /// A gauge value fell outside `[0, max]`.
    #[error("La valeur doit être comprise entre 0 et {max} (reçu {value}).")]
    ValueOutOfRange { value: i64, max: u8 },

    /// A note is too long to be shown on the panels.
    #[error("La note ne peut pas dépasser {max} caractères (reçu {len}).")]
    NoteTooLong { len: usize, max: usize },

    /// The referenced panel message no longer exists on the platform.
    #[error("Message {message_id} not found in channel {channel_id}")]
    NotFound {
        channel_id: String,
        message_id: String,
    },

    /// The platform could not be reached or refused the request.
    #[error("Transient platform error: {0}")]
    Transient(String),

    /// The persisted snapshot could not be understood.
    #[error("Corrupt state file {path}: {reason}")]
    CorruptState { path: PathBuf, reason: String },

    /// A file could not be written to disk.
    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed or produced.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

}

impl ComptoirError {
    /// `true` for errors caused by a bad update request. These are the only
    /// errors surfaced to the requester.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownGauge(_)
                | Self::UnknownDistrict(_)
                | Self::ValueOutOfRange { .. }
                | Self::NoteTooLong { .. }
        )
    }

    /// `true` when the platform reported the target message as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience alias used throughout the comptoir crates.
pub type Result<T> = std::result::Result<T, ComptoirError>;
