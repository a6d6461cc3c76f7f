//! Error handling for libcorrect.
use std::fmt;

/// A custom error type to represent the service-level failures the core can surface.
///
/// The correction algorithms themselves never fail - every input produces a
/// [`crate::types::CorrectionResult`] with pass/fail booleans. This type only wraps the
/// failures that can come back from the host-supplied FM-index, overlap, and sink
/// services (see [`crate::service`]).
#[derive(Debug)]
pub enum CorrectError {
    /// The FM-index service returned a malformed or inconsistent response.
    FmIndexError(String),

    /// The overlap/alignment service returned a malformed or inconsistent response.
    OverlapServiceError(String),

    /// The sampled suffix array could not resolve a BWT index to a read id.
    SuffixArrayError(String),

    /// An IO error occurred while writing to a sink.
    IoError(std::io::Error),
}

impl fmt::Display for CorrectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrectError::FmIndexError(msg) => write!(f, "FM-index error: {}", msg),
            CorrectError::OverlapServiceError(msg) => write!(f, "overlap service error: {}", msg),
            CorrectError::SuffixArrayError(msg) => write!(f, "suffix array error: {}", msg),
            CorrectError::IoError(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for CorrectError {}

/// Converts a `std::io::Error` into a [`CorrectError`].
impl From<std::io::Error> for CorrectError {
    fn from(error: std::io::Error) -> Self {
        CorrectError::IoError(error)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CorrectError>;
