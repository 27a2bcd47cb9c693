//! Output naming
//!
//! The first two unique images of a run get role-tagged names; the rest
//! get plain random names. Extensions are lower-cased and normalized.

use std::path::Path;

use uuid::Uuid;

/// Extension used when an image declares none
pub const DEFAULT_EXTENSION: &str = ".png";

/// Extensions that are transcoded to PNG before writing
const TRANSCODE_EXTENSIONS: &[&str] = &[".jp2", ".jpx", ".j2k", ".jpf", ".j2c"];

/// Role an output file plays, by position within the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    /// Position 0: the user's photo
    User,
    /// Position 1: the signature
    Sign,
    /// Position 2 and later: untagged
    Other,
}

impl ImageRole {
    pub fn for_position(position: usize) -> Self {
        match position {
            0 => ImageRole::User,
            1 => ImageRole::Sign,
            _ => ImageRole::Other,
        }
    }

    /// Filename prefix for this role
    pub fn tag(self) -> Option<&'static str> {
        match self {
            ImageRole::User => Some("user-img"),
            ImageRole::Sign => Some("sign-img"),
            ImageRole::Other => None,
        }
    }
}

/// Output extension (with leading dot) for a declared image name
pub fn output_extension(declared_name: &str) -> String {
    let ext = Path::new(declared_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext.to_lowercase()));

    match ext {
        None => DEFAULT_EXTENSION.to_string(),
        Some(ext) if ext == ".jpeg" => ".jpg".to_string(),
        Some(ext) => ext,
    }
}

/// Whether an extension marks a format that must be converted to PNG
pub fn needs_transcode(extension: &str) -> bool {
    TRANSCODE_EXTENSIONS.contains(&extension)
}

/// Output filename for the image written at `position`
pub fn output_file_name(position: usize, extension: &str) -> String {
    let id = Uuid::new_v4();
    let name = match ImageRole::for_position(position).tag() {
        Some(tag) => format!("{}-{}{}", tag, id, extension),
        None => format!("{}{}", id, extension),
    };
    name.to_lowercase()
}
