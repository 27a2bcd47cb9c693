//! Content fingerprints for exact-duplicate detection

use std::collections::HashSet;

use sha2::{Digest, Sha256};

/// Compute the SHA-256 fingerprint of an image payload
pub fn compute_fingerprint(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Fingerprints already seen during one extraction run
#[derive(Debug, Default)]
pub struct DedupSet {
    seen: HashSet<String>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a payload. Returns `false` if an identical payload was seen before.
    pub fn insert(&mut self, data: &[u8]) -> bool {
        let fingerprint = compute_fingerprint(data);
        if self.seen.contains(&fingerprint) {
            tracing::debug!(fingerprint = %fingerprint, "Duplicate image payload");
            return false;
        }
        self.seen.insert(fingerprint)
    }

    /// Number of distinct payloads seen so far
    pub(crate) fn len(&self) -> usize {
        self.seen.len()
    }
}
