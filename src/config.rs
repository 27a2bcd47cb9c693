//! Configuration management for the PDF image server

use serde::Deserialize;
use std::collections::BTreeSet;
use std::env;
use std::num::ParseIntError;
use std::path::PathBuf;

/// Default upload cap: 2 MiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 2 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL used when building download links.
    /// Falls back to the request's `Host` header when unset.
    pub public_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Staging directory for uploaded PDFs
    pub upload_dir: PathBuf,
    /// Directory extracted images are written to and served from
    pub images_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub max_file_size: u64,
    /// Lower-cased extensions without the leading dot
    pub allowed_extensions: BTreeSet<String>,
}

/// Errors raised while reading configuration from the environment
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {source}")]
    InvalidNumber {
        key: &'static str,
        #[source]
        source: ParseIntError,
    },

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
                public_url: None,
            },
            storage: StorageConfig {
                upload_dir: PathBuf::from("uploads"),
                images_dir: PathBuf::from("images"),
            },
            upload: UploadConfig {
                max_file_size: DEFAULT_MAX_FILE_SIZE,
                allowed_extensions: BTreeSet::from(["pdf".to_string()]),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let port = match env::var("SERVER_PORT") {
            Ok(raw) => raw.parse().map_err(|source| ConfigError::InvalidNumber {
                key: "SERVER_PORT",
                source,
            })?,
            Err(_) => defaults.server.port,
        };

        let max_file_size = match env::var("MAX_FILE_SIZE") {
            Ok(raw) => raw.parse().map_err(|source| ConfigError::InvalidNumber {
                key: "MAX_FILE_SIZE",
                source,
            })?,
            Err(_) => defaults.upload.max_file_size,
        };

        let allowed_extensions = match env::var("ALLOWED_EXTENSIONS") {
            Ok(raw) => {
                let set = parse_extensions(&raw);
                if set.is_empty() {
                    return Err(ConfigError::Empty("ALLOWED_EXTENSIONS"));
                }
                set
            }
            Err(_) => defaults.upload.allowed_extensions,
        };

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port,
                public_url: env::var("PUBLIC_URL")
                    .ok()
                    .map(|url| url.trim_end_matches('/').to_string())
                    .filter(|url| !url.is_empty()),
            },
            storage: StorageConfig {
                upload_dir: env::var("UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.upload_dir),
                images_dir: env::var("IMAGES_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.images_dir),
            },
            upload: UploadConfig {
                max_file_size,
                allowed_extensions,
            },
        })
    }

    /// Create the staging and output directories if they are missing
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.storage.upload_dir)?;
        std::fs::create_dir_all(&self.storage.images_dir)?;
        Ok(())
    }
}

/// Parse a comma-separated extension list (`"pdf, .PDF"` -> `{"pdf"}`)
fn parse_extensions(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}
