//! Error types for NYB container operations.

use thiserror::Error;

/// Result type alias for NYB operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while encrypting or decrypting containers.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed container: bad magic, length, JSON, or a missing/misplaced field.
    #[error("Invalid container: {0}")]
    Validation(String),

    /// Authentication tag mismatch (wrong password or corrupted data).
    ///
    /// Both causes share this variant so the error cannot be used to test passwords.
    #[error("Integrity check failed: wrong password or corrupted data")]
    Integrity,

    /// Key derivation error.
    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    /// Encryption error.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// The deletion capability could not dispose of a path.
    #[error("Disposal failed: {0}")]
    Disposal(String),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Coarse classification of an [`Error`], used in batch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Validation,
    Integrity,
    KeyDerivation,
    Encryption,
    Disposal,
    Config,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Integrity => ErrorKind::Integrity,
            Error::KeyDerivation(_) => ErrorKind::KeyDerivation,
            Error::Encryption(_) => ErrorKind::Encryption,
            Error::Disposal(_) => ErrorKind::Disposal,
            Error::Config(_) => ErrorKind::Config,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Validation(format!("header JSON: {}", e))
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::Validation(format!("base64: {}", e))
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(e: tempfile::PersistError) -> Self {
        Error::Io(e.error)
    }
}
