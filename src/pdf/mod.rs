//! PDF parsing module
//!
//! Provides a read-only view over a PDF's pages and the raster images
//! embedded in them, built on `lopdf`.
//!
//! Each [`EmbeddedImage`] carries a self-contained image file payload:
//! JPEG and JPEG2000 streams are passed through untouched, raw pixel
//! streams are rasterized into PNG.

mod document;
mod raster;

pub use document::{EmbeddedImage, PdfDocument, PdfError, PdfPage};
pub use raster::{encode_png, ColorSpace, RasterError, RasterSpec};
