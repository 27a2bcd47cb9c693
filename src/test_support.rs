//! Fixture builders shared by unit tests

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

/// Encode an 8x8 solid-color JPEG
pub fn jpeg_bytes(color: [u8; 3]) -> Vec<u8> {
    encode(DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb(color))), ImageFormat::Jpeg)
}

/// 8x8 lossless JPEG2000 (JP2 container), sRGB. Pixel (x, y) is
/// `[200, 40 + 10x, 90 + 10y]`.
pub const JP2_RGB: &[u8] = include_bytes!("../tests/fixtures/rgb.jp2");

/// Same pixels as [`JP2_RGB`] plus an alpha channel: 0 on the left half,
/// 255 on the right.
pub const JP2_RGBA: &[u8] = include_bytes!("../tests/fixtures/rgba.jp2");

/// Encode any image as PNG
pub fn png_bytes(image: DynamicImage) -> Vec<u8> {
    encode(image, ImageFormat::Png)
}

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

/// An XObject to place on a test page
pub enum TestImage {
    Image { dict: Dictionary, content: Vec<u8> },
    Form(Vec<TestImage>),
    /// Unfiltered `BI ... ID ... EI` image in the page content
    Inline { width: u32, height: u32, pixels: Vec<u8> },
}

impl TestImage {
    pub fn jpeg(data: Vec<u8>) -> Self {
        Self::filtered("DCTDecode", data)
    }

    pub fn jpx(data: Vec<u8>) -> Self {
        Self::filtered("JPXDecode", data)
    }

    pub fn filtered(filter: &str, data: Vec<u8>) -> Self {
        TestImage::Image {
            dict: dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => Object::Integer(8),
                "Height" => Object::Integer(8),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => Object::Integer(8),
                "Filter" => Object::Name(filter.as_bytes().to_vec()),
            },
            content: data,
        }
    }

    pub fn raw_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        TestImage::Image {
            dict: dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => Object::Integer(i64::from(width)),
                "Height" => Object::Integer(i64::from(height)),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => Object::Integer(8),
            },
            content: pixels,
        }
    }

    pub fn form(children: Vec<TestImage>) -> Self {
        TestImage::Form(children)
    }

    /// Inline RGB image; the first pixel byte must not be whitespace
    pub fn inline_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        TestImage::Inline {
            width,
            height,
            pixels,
        }
    }
}

/// Minimal PDF builder: one entry per page, each a list of XObjects
#[derive(Default)]
pub struct TestPdf {
    pages: Vec<Vec<TestImage>>,
}

impl TestPdf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, images: Vec<TestImage>) -> Self {
        self.pages.push(images);
        self
    }

    pub fn to_bytes(self) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::new();
        for images in self.pages {
            let (inline, images): (Vec<_>, Vec<_>) = images
                .into_iter()
                .partition(|image| matches!(image, TestImage::Inline { .. }));
            let (xobjects, names) = add_xobjects(&mut doc, images);

            let mut ops: Vec<u8> = names
                .iter()
                .flat_map(|name| format!("q 100 0 0 100 0 0 cm /{} Do Q\n", name).into_bytes())
                .collect();
            for image in inline {
                if let TestImage::Inline {
                    width,
                    height,
                    pixels,
                } = image
                {
                    ops.extend(
                        format!("BI /W {} /H {} /CS /RGB /BPC 8\nID\n", width, height).bytes(),
                    );
                    ops.extend(pixels);
                    ops.extend(b"\nEI\n");
                }
            }
            let content_id = doc.add_object(Stream::new(dictionary! {}, ops));

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ],
                "Contents" => content_id,
                "Resources" => dictionary! { "XObject" => xobjects },
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(count),
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    pub fn write_to(self, path: &Path) {
        std::fs::write(path, self.to_bytes()).unwrap();
    }
}

fn add_xobjects(doc: &mut Document, images: Vec<TestImage>) -> (Dictionary, Vec<String>) {
    let mut xobjects = Dictionary::new();
    let mut names = Vec::new();

    for (index, image) in images.into_iter().enumerate() {
        let name = match image {
            TestImage::Form(_) => format!("Fm{}", index),
            _ => format!("Im{}", index),
        };
        let id = add_xobject(doc, image);
        xobjects.set(name.clone(), Object::Reference(id));
        names.push(name);
    }

    (xobjects, names)
}

fn add_xobject(doc: &mut Document, image: TestImage) -> ObjectId {
    match image {
        TestImage::Image { dict, content } => doc.add_object(Stream::new(dict, content)),
        TestImage::Inline { .. } => unreachable!("inline images live in page content"),
        TestImage::Form(children) => {
            let (xobjects, _) = add_xobjects(doc, children);
            let dict = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(1),
                    Object::Integer(1),
                ],
                "Resources" => dictionary! { "XObject" => xobjects },
            };
            doc.add_object(Stream::new(dict, Vec::new()))
        }
    }
}
