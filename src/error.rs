//! Error types for sumset operations.

use thiserror::Error;

/// Errors that can occur while building, parsing or indexing signatures.
#[derive(Error, Debug)]
pub enum SumsetError {
    /// Unrecognised hash-algorithm identity.
    #[error("Bad magic: {0:#x} is not a known signature format")]
    BadMagic(u32),

    /// A construction parameter is out of range.
    #[error("Invalid parameter: {0}")]
    ParamError(String),

    /// A fallible reservation could not be satisfied.
    #[error("Allocation failure: could not reserve room for {requested} entries")]
    AllocationFailure {
        /// Number of entries the reservation asked for
        requested: usize,
    },

    /// I/O error while reading a reference blob or signature stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed signature stream.
    #[error("Format error: {0}")]
    Format(String),
}

impl SumsetError {
    /// Whether the caller can reasonably continue after this error.
    ///
    /// Everything except an allocation failure is reported before any state
    /// changes, so the caller may retry with different input.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::AllocationFailure { .. })
    }
}

/// Result type for sumset operations.
pub type Result<T> = std::result::Result<T, SumsetError>;
