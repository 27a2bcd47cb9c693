//! Extraction error types

use std::path::PathBuf;

use thiserror::Error;

use crate::pdf::PdfError;

/// Failure of a whole extraction run
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The PDF could not be opened or parsed
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Writing an output image failed; the run is aborted
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure converting a single image; only that image is skipped
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),
}

/// Result type alias for extraction runs
pub type Result<T> = std::result::Result<T, ExtractError>;
