//! Error types for hashchain

use std::fmt;

/// The first digest mismatch found while scanning a chain.
///
/// Both digests are kept as raw bytes so callers can diff them or decide
/// where to truncate; `Display` renders them as hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityViolation {
    pub index: usize,
    pub expected: Vec<u8>,
    pub actual: Vec<u8>,
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "block {} digest is invalid: got {}, expected {}",
            self.index,
            hex::encode(&self.actual),
            hex::encode(&self.expected)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("Chain integrity error: {0}")]
    Integrity(IntegrityViolation),
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Cryptographic error: {0}")]
    CryptoError(String),
    #[error("IO error: {0}")]
    IoError(String),
}

impl ChainError {
    /// Returns the violation when this is an integrity failure.
    pub fn integrity(&self) -> Option<&IntegrityViolation> {
        match self {
            ChainError::Integrity(violation) => Some(violation),
            _ => None,
        }
    }
}

impl From<IntegrityViolation> for ChainError {
    fn from(violation: IntegrityViolation) -> Self {
        ChainError::Integrity(violation)
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ChainError {
    fn from(err: toml::ser::Error) -> Self {
        ChainError::Config(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
