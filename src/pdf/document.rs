//! PDF document model
//!
//! Walks pages, their `/XObject` resources and inline `BI` operators to
//! enumerate embedded raster images.

use std::collections::HashSet;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use super::raster::{encode_png, rasterize, unpack_alpha, ColorSpace, RasterError, RasterSpec};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Document is encrypted")]
    Encrypted,

    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),
}

impl From<lopdf::Error> for PdfError {
    fn from(err: lopdf::Error) -> Self {
        PdfError::Parse(err.to_string())
    }
}

// ============================================================================
// Types
// ============================================================================

/// A raster image embedded in a page
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    /// Resource name plus an extension matching `data`, e.g. `Im0.jpg`
    pub name: String,

    /// Self-contained image file bytes
    pub data: Vec<u8>,

    /// 1-based page number the image was found on
    pub page: u32,
}

/// A parsed PDF, owned by a single extraction run
pub struct PdfDocument {
    doc: Document,
}

/// One page of a [`PdfDocument`]
pub struct PdfPage<'a> {
    doc: &'a Document,
    number: u32,
    id: ObjectId,
}

// ============================================================================
// Document
// ============================================================================

impl PdfDocument {
    /// Open and parse a PDF file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PdfError> {
        let doc = Document::load(path.as_ref())?;
        Self::from_document(doc)
    }

    /// Parse a PDF held in memory
    pub fn from_bytes(data: &[u8]) -> Result<Self, PdfError> {
        let doc = Document::load_mem(data)?;
        Self::from_document(doc)
    }

    fn from_document(mut doc: Document) -> Result<Self, PdfError> {
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            tracing::debug!("Decrypted PDF with empty password");
        }
        Ok(Self { doc })
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Pages in document order
    pub fn pages(&self) -> Vec<PdfPage<'_>> {
        self.doc
            .get_pages()
            .into_iter()
            .map(|(number, id)| PdfPage {
                doc: &self.doc,
                number,
                id,
            })
            .collect()
    }
}

// ============================================================================
// Page
// ============================================================================

impl<'a> PdfPage<'a> {
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Images in the order the page's XObject resources list them,
    /// followed by inline images in content stream order.
    ///
    /// Form XObjects are descended into. Images whose encoding cannot be
    /// turned into a standalone file are logged and left out.
    pub fn images(&self) -> Vec<EmbeddedImage> {
        let mut images = Vec::new();
        let mut visited = HashSet::new();

        if let Some(resources) = inherited_resources(self.doc, self.id) {
            self.collect_images(resources, &mut visited, &mut images);
        }
        self.collect_inline_images(&mut images);

        tracing::debug!(page = self.number, count = images.len(), "Enumerated page images");
        images
    }

    fn collect_images(
        &self,
        resources: &'a Dictionary,
        visited: &mut HashSet<ObjectId>,
        out: &mut Vec<EmbeddedImage>,
    ) {
        let Ok(xobjects) = resources.get(b"XObject") else {
            return;
        };
        let Ok((_, Object::Dictionary(xobjects))) = self.doc.dereference(xobjects) else {
            return;
        };

        for (name, entry) in xobjects.iter() {
            let Ok((id, Object::Stream(stream))) = self.doc.dereference(entry) else {
                continue;
            };
            if let Some(id) = id {
                if !visited.insert(id) {
                    continue;
                }
            }

            let name = String::from_utf8_lossy(name);
            match stream.dict.get(b"Subtype").and_then(Object::as_name) {
                Ok(b"Image") => match image_payload(self.doc, stream) {
                    Ok((ext, data)) => out.push(EmbeddedImage {
                        name: format!("{}{}", name, ext),
                        data,
                        page: self.number,
                    }),
                    Err(e) => {
                        tracing::warn!(page = self.number, xobject = %name, "Skipping image: {}", e);
                    }
                },
                Ok(b"Form") => {
                    if let Ok(form_resources) = stream.dict.get(b"Resources") {
                        if let Ok((_, Object::Dictionary(form_resources))) =
                            self.doc.dereference(form_resources)
                        {
                            self.collect_images(form_resources, visited, out);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// `BI ... ID ... EI` images written directly into the page content
    fn collect_inline_images(&self, out: &mut Vec<EmbeddedImage>) {
        let content = match self.doc.get_and_decode_page_content(self.id) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(page = self.number, "Skipping inline images: {}", e);
                return;
            }
        };

        let inline = content
            .operations
            .iter()
            .filter(|op| op.operator == "BI")
            .filter_map(|op| match op.operands.first() {
                Some(Object::Stream(stream)) => Some(stream),
                _ => None,
            });

        for (index, stream) in inline.enumerate() {
            let name = format!("Inline{}", index);
            match inline_payload(stream) {
                Ok(data) => out.push(EmbeddedImage {
                    name: format!("{}.png", name),
                    data,
                    page: self.number,
                }),
                Err(e) => {
                    tracing::warn!(page = self.number, image = %name, "Skipping inline image: {}", e);
                }
            }
        }
    }
}

/// Resources for a page, following `/Parent` links for inherited entries
fn inherited_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut current = Some(page_id);
    let mut seen = HashSet::new();

    while let Some(id) = current {
        if !seen.insert(id) {
            break;
        }
        let dict = doc.get_object(id).ok()?.as_dict().ok()?;
        if let Ok(resources) = dict.get(b"Resources") {
            if let Ok((_, Object::Dictionary(resources))) = doc.dereference(resources) {
                return Some(resources);
            }
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }

    None
}

// ============================================================================
// Image payloads
// ============================================================================

/// Turn an image XObject into `(extension, file bytes)`
fn image_payload(doc: &Document, stream: &Stream) -> Result<(&'static str, Vec<u8>), PdfError> {
    let filters = filter_names(doc, &stream.dict);

    match filters.last().map(Vec::as_slice) {
        Some(b"DCTDecode") if filters.len() == 1 => return Ok((".jpg", stream.content.clone())),
        Some(b"JPXDecode") if filters.len() == 1 => return Ok((".jp2", stream.content.clone())),
        Some(filter @ (b"DCTDecode" | b"JPXDecode" | b"JBIG2Decode" | b"CCITTFaxDecode")) => {
            return Err(PdfError::UnsupportedImage(format!(
                "{} encoding",
                String::from_utf8_lossy(filter)
            )));
        }
        _ => {}
    }

    let is_mask = stream
        .dict
        .get(b"ImageMask")
        .and_then(Object::as_bool)
        .unwrap_or(false);
    if is_mask {
        return Err(PdfError::UnsupportedImage("stencil mask".to_string()));
    }

    let spec = raster_spec(doc, &stream.dict)?;
    let data = stream_data(stream, &filters)?;
    let alpha = soft_mask(doc, &stream.dict, spec.width, spec.height);

    let image = rasterize(&spec, &data, alpha.as_deref())?;
    Ok((".png", encode_png(&image)?))
}

/// Rasterize an inline image. Its dictionary uses the abbreviated keys
/// (`/W`, `/H`, `/BPC`, `/CS`, `/IM`) and lopdf only accepts unfiltered data.
fn inline_payload(stream: &Stream) -> Result<Vec<u8>, PdfError> {
    let dict = &stream.dict;
    let entry = |short: &[u8], long: &[u8]| dict.get(short).or_else(|_| dict.get(long)).ok();

    let is_mask = entry(b"IM", b"ImageMask")
        .and_then(|o| o.as_bool().ok())
        .unwrap_or(false);
    if is_mask {
        return Err(PdfError::UnsupportedImage("stencil mask".to_string()));
    }

    let dimension = |short: &[u8], long: &[u8]| {
        entry(short, long)
            .and_then(|o| o.as_i64().ok())
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| {
                PdfError::UnsupportedImage(format!("missing {}", String::from_utf8_lossy(long)))
            })
    };

    let color_space = match entry(b"CS", b"ColorSpace").and_then(|o| o.as_name().ok()) {
        Some(name) => named_color_space(name)?,
        None => return Err(PdfError::UnsupportedImage("missing color space".to_string())),
    };

    let spec = RasterSpec {
        width: dimension(b"W", b"Width")?,
        height: dimension(b"H", b"Height")?,
        bits_per_component: entry(b"BPC", b"BitsPerComponent")
            .and_then(|o| o.as_i64().ok())
            .and_then(|v| u8::try_from(v).ok())
            .unwrap_or(8),
        color_space,
    };

    let image = rasterize(&spec, &stream.content, None)?;
    Ok(encode_png(&image)?)
}

fn stream_data(stream: &Stream, filters: &[Vec<u8>]) -> Result<Vec<u8>, PdfError> {
    if filters.is_empty() {
        Ok(stream.content.clone())
    } else {
        Ok(stream.decompressed_content()?)
    }
}

fn filter_names(doc: &Document, dict: &Dictionary) -> Vec<Vec<u8>> {
    let Ok(filter) = dict.get(b"Filter") else {
        return Vec::new();
    };
    match doc.dereference(filter) {
        Ok((_, Object::Name(name))) => vec![name.clone()],
        Ok((_, Object::Array(items))) => items
            .iter()
            .filter_map(|item| item.as_name().ok())
            .map(<[u8]>::to_vec)
            .collect(),
        _ => Vec::new(),
    }
}

fn dict_int(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<i64> {
    let obj = dict.get(key).ok()?;
    doc.dereference(obj).ok()?.1.as_i64().ok()
}

fn raster_spec(doc: &Document, dict: &Dictionary) -> Result<RasterSpec, PdfError> {
    let dimension = |key: &[u8]| {
        dict_int(doc, dict, key)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| {
                PdfError::UnsupportedImage(format!("missing {}", String::from_utf8_lossy(key)))
            })
    };
    let width = dimension(b"Width")?;
    let height = dimension(b"Height")?;

    let bits_per_component = dict_int(doc, dict, b"BitsPerComponent")
        .and_then(|v| u8::try_from(v).ok())
        .unwrap_or(8);

    let color_space = match dict.get(b"ColorSpace") {
        Ok(obj) => parse_color_space(doc, obj, true)?,
        Err(_) => return Err(PdfError::UnsupportedImage("missing color space".to_string())),
    };

    Ok(RasterSpec {
        width,
        height,
        bits_per_component,
        color_space,
    })
}

fn named_color_space(name: &[u8]) -> Result<ColorSpace, PdfError> {
    match name {
        b"DeviceGray" | b"G" | b"CalGray" => Ok(ColorSpace::Gray),
        b"DeviceRGB" | b"RGB" | b"CalRGB" => Ok(ColorSpace::Rgb),
        b"DeviceCMYK" | b"CMYK" => Ok(ColorSpace::Cmyk),
        other => Err(PdfError::UnsupportedImage(format!(
            "color space {}",
            String::from_utf8_lossy(other)
        ))),
    }
}

fn parse_color_space(doc: &Document, obj: &Object, allow_indexed: bool) -> Result<ColorSpace, PdfError> {
    let (_, obj) = doc.dereference(obj)?;

    let items = match obj {
        Object::Name(name) => return named_color_space(name),
        Object::Array(items) => items,
        _ => return Err(PdfError::UnsupportedImage("malformed color space".to_string())),
    };

    let family = items
        .first()
        .and_then(|o| o.as_name().ok())
        .ok_or_else(|| PdfError::UnsupportedImage("malformed color space".to_string()))?;

    match family {
        b"ICCBased" => {
            let profile = items
                .get(1)
                .ok_or_else(|| PdfError::UnsupportedImage("ICC profile missing".to_string()))?;
            let (_, profile) = doc.dereference(profile)?;
            let profile = profile.as_stream()?;
            match dict_int(doc, &profile.dict, b"N") {
                Some(1) => Ok(ColorSpace::Gray),
                Some(3) => Ok(ColorSpace::Rgb),
                Some(4) => Ok(ColorSpace::Cmyk),
                n => Err(PdfError::UnsupportedImage(format!("ICC profile with N={:?}", n))),
            }
        }
        b"Indexed" | b"I" if allow_indexed => {
            let base = items
                .get(1)
                .ok_or_else(|| PdfError::UnsupportedImage("indexed base missing".to_string()))?;
            let base = parse_color_space(doc, base, false)?;

            let lookup = items
                .get(3)
                .ok_or_else(|| PdfError::UnsupportedImage("indexed lookup missing".to_string()))?;
            let palette = match doc.dereference(lookup)?.1 {
                Object::String(bytes, _) => bytes.clone(),
                Object::Stream(stream) => stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone()),
                _ => return Err(PdfError::UnsupportedImage("indexed lookup".to_string())),
            };

            Ok(ColorSpace::Indexed {
                base: Box::new(base),
                palette,
            })
        }
        other => named_color_space(other),
    }
}

/// Unpacked `/SMask` alpha, if present and the same size as the image
fn soft_mask(doc: &Document, dict: &Dictionary, width: u32, height: u32) -> Option<Vec<u8>> {
    let smask = dict.get(b"SMask").ok()?;
    let (_, Object::Stream(mask)) = doc.dereference(smask).ok()? else {
        return None;
    };

    let mask_width = dict_int(doc, &mask.dict, b"Width")?;
    let mask_height = dict_int(doc, &mask.dict, b"Height")?;
    if mask_width != i64::from(width) || mask_height != i64::from(height) {
        tracing::debug!("Ignoring soft mask with mismatched size");
        return None;
    }

    let bits = dict_int(doc, &mask.dict, b"BitsPerComponent")
        .and_then(|v| u8::try_from(v).ok())
        .unwrap_or(8);
    let filters = filter_names(doc, &mask.dict);
    let data = stream_data(mask, &filters).ok()?;

    unpack_alpha(&data, width, height, bits).ok()
}

// ============================================================================
// Tests
// ============================================================================
