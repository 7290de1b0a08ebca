///! Error types for visual perceiver operations
use std::fmt;

#[derive(Debug)]
pub enum VisualError {
    /// Image bytes could not be decoded or re-encoded
    ImageProcessing(String),

    /// OCR operation failed
    OcrFailed(String),

    /// No recognition backend compiled in or configured
    OcrUnavailable,

    /// Blocking worker panicked or was cancelled
    WorkerFailed(String),

    /// Invalid input parameters
    InvalidInput(String),
}

impl fmt::Display for VisualError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageProcessing(msg) => write!(f, "Image processing error: {}", msg),
            Self::OcrFailed(msg) => write!(f, "OCR operation failed: {}", msg),
            Self::OcrUnavailable => write!(f, "OCR backend unavailable"),
            Self::WorkerFailed(msg) => write!(f, "Blocking worker failed: {}", msg),
            Self::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for VisualError {}

impl From<image::ImageError> for VisualError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing(err.to_string())
    }
}

impl From<tokio::task::JoinError> for VisualError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::WorkerFailed(err.to_string())
    }
}
