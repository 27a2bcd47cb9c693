//! PDF image extraction
//!
//! Pulls every unique embedded image out of a PDF and writes it to an
//! output directory.
//!
//! # Pipeline
//!
//! ```text
//! PdfDocument ─► pages ─► images ─► DedupSet ─► (JPEG2000 → PNG) ─► name ─► write
//! ```
//!
//! - Duplicates are exact: identical payload bytes, same SHA-256.
//! - Only images that are actually written take a position, so the first
//!   two files are always `user-img-*` and `sign-img-*`.
//! - A JPEG2000 image that fails to decode is skipped; the run continues.
//! - A failed write aborts the run.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pdf_image_server::extractor::ImageExtractor;
//!
//! let extractor = ImageExtractor::new();
//! let files = extractor.extract("uploads/a.pdf".as_ref(), "images".as_ref());
//! ```

mod error;
mod fingerprint;
mod naming;
mod transcode;

use std::path::Path;
use std::sync::Arc;

pub use error::{ExtractError, Result, TranscodeError};
pub use fingerprint::{compute_fingerprint, DedupSet};
pub use naming::{needs_transcode, output_extension, output_file_name, ImageRole};
pub use transcode::{transcode_to_png, Jpeg2000Decoder, OpenJpegDecoder};

use crate::pdf::PdfDocument;

/// Extracts embedded images from PDF files
#[derive(Clone)]
pub struct ImageExtractor {
    jpeg2000: Arc<dyn Jpeg2000Decoder>,
}

impl Default for ImageExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageExtractor {
    /// Create an extractor using OpenJPEG for JPEG2000 images
    pub fn new() -> Self {
        Self::with_decoder(Arc::new(OpenJpegDecoder))
    }

    /// Create an extractor with a custom JPEG2000 decoder
    pub fn with_decoder(jpeg2000: Arc<dyn Jpeg2000Decoder>) -> Self {
        Self { jpeg2000 }
    }

    /// Extract images, returning the written filenames in first-seen order.
    ///
    /// Never fails: any error is logged and yields an empty list, so "no
    /// images" and "broken PDF" look the same. Use [`Self::try_extract`]
    /// to tell them apart.
    pub fn extract(&self, pdf_path: &Path, output_dir: &Path) -> Vec<String> {
        match self.try_extract(pdf_path, output_dir) {
            Ok(files) => files,
            Err(e) => {
                tracing::error!(
                    pdf = %pdf_path.display(),
                    "Failed to extract images: {}",
                    e
                );
                Vec::new()
            }
        }
    }

    /// Extract images, surfacing parse and write failures
    pub fn try_extract(&self, pdf_path: &Path, output_dir: &Path) -> Result<Vec<String>> {
        let document = PdfDocument::open(pdf_path)?;

        let mut dedup = DedupSet::new();
        let mut files: Vec<String> = Vec::new();
        let mut skipped = 0usize;

        for page in document.pages() {
            for image in page.images() {
                if !dedup.insert(&image.data) {
                    skipped += 1;
                    continue;
                }

                let mut extension = output_extension(&image.name);
                let data = if needs_transcode(&extension) {
                    match transcode_to_png(self.jpeg2000.as_ref(), &image.data) {
                        Ok(png) => {
                            extension = ".png".to_string();
                            png
                        }
                        Err(e) => {
                            tracing::warn!(
                                page = image.page,
                                image = %image.name,
                                "Skipping image, transcode failed: {}",
                                e
                            );
                            continue;
                        }
                    }
                } else {
                    image.data
                };

                let file_name = output_file_name(files.len(), &extension);
                let path = output_dir.join(&file_name);
                std::fs::write(&path, &data).map_err(|source| ExtractError::Io {
                    path: path.clone(),
                    source,
                })?;

                tracing::debug!(
                    page = image.page,
                    source = %image.name,
                    file = %file_name,
                    size = data.len(),
                    "Wrote image"
                );
                files.push(file_name);
            }
        }

        tracing::info!(
            pdf = %pdf_path.display(),
            pages = document.page_count(),
            unique = dedup.len(),
            written = files.len(),
            duplicates = skipped,
            "Image extraction complete"
        );

        Ok(files)
    }
}

// ============================================================================
// Tests
// ============================================================================
