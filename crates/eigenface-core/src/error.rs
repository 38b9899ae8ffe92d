use thiserror::Error;

/// Errors raised by the recognition pipeline.
///
/// An "Unknown" classification is a normal outcome and never shows up here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecognitionError {
    #[error("failed to decode image {path}: {reason}")]
    Decode { path: String, reason: String },
    #[error("pixel count mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("sample {index} has {actual} pixels, expected {expected} (all samples must share the size of sample 0)")]
    SampleDimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("no eigenspace has been trained yet")]
    NotTrained,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("numeric failure: {0}")]
    NumericFailure(String),
}

pub type Result<T> = std::result::Result<T, RecognitionError>;
