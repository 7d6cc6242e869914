//! Crate-wide error taxonomy
//!
//! Every failure surfaces as a typed, recoverable error; nothing in the
//! library logs-and-exits. Callers decide whether a bad configuration or an
//! out-of-order call is fatal.

use thiserror::Error;

/// Errors raised by the generation pipeline and the classifier wrapper
#[derive(Error, Debug)]
pub enum BiasgenError {
    /// Invalid settings value (bad ratio, bad threshold case, ...)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A settings key required by the selected mode is absent
    #[error("missing settings key: {0}")]
    MissingKey(&'static str),

    /// Operation invoked before its prerequisite stage completed
    #[error("precondition not met: {0}")]
    Precondition(&'static str),

    /// Matrix width disagrees with a declared dimensionality
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Unrecognized data/bias/model kind
    #[error("unsupported mode: {0}")]
    UnsupportedMode(String),

    /// Malformed dataset file (CSV or labels sidecar)
    #[error("invalid dataset file: {0}")]
    InvalidData(String),

    /// Classifier artifact could not be saved or restored
    #[error("model persistence error: {0}")]
    Model(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, BiasgenError>;
