//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::extractor::ImageExtractor;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    extractor: ImageExtractor,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: Config, extractor: ImageExtractor) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, extractor }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the image extractor
    pub fn extractor(&self) -> &ImageExtractor {
        &self.inner.extractor
    }
}
