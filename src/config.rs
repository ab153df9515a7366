//! Store configuration
//!
//! Options can be built in code or loaded from a TOML document:
//!
//! ```toml
//! hash = "sha256"
//! check_cost = 1
//! next_cost = 5
//! scan_batch = 256
//! ```

use crate::error::{QuadStoreError, Result};
use crate::hash::{HashAlgorithm, KeyCodec};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Relative costs reported by primitive iterators in their stats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostModel {
    pub check_cost: u64,
    pub next_cost: u64,
}

impl Default for CostModel {
    fn default() -> Self {
        CostModel {
            check_cost: 1,
            next_cost: 5,
        }
    }
}

/// Configuration shared by all backends
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Name of the node hash algorithm
    pub hash: String,
    /// Cost of an in-memory membership check
    pub check_cost: u64,
    /// Cost of advancing a backend cursor
    pub next_cost: u64,
    /// Keys fetched per round trip by paged disk cursors
    pub scan_batch: usize,
    /// Create the on-disk store when it does not exist yet
    pub create_if_missing: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        let costs = CostModel::default();
        StoreOptions {
            hash: HashAlgorithm::default().to_string(),
            check_cost: costs.check_cost,
            next_cost: costs.next_cost,
            scan_batch: 256,
            create_if_missing: true,
        }
    }
}

impl StoreOptions {
    pub fn with_hash(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash = algorithm.to_string();
        self
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let options: StoreOptions = toml::from_str(raw)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            QuadStoreError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Rejects settings no backend can run with.
    pub fn validate(&self) -> Result<()> {
        self.codec()?;
        if self.scan_batch == 0 {
            return Err(QuadStoreError::Config("scan_batch must be at least 1".to_string()));
        }
        if self.check_cost >= self.next_cost {
            return Err(QuadStoreError::Config(format!(
                "check_cost ({}) must be below next_cost ({})",
                self.check_cost, self.next_cost
            )));
        }
        Ok(())
    }

    pub fn codec(&self) -> Result<KeyCodec> {
        KeyCodec::from_name(&self.hash)
    }

    pub fn costs(&self) -> CostModel {
        CostModel {
            check_cost: self.check_cost,
            next_cost: self.next_cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let options = StoreOptions::default();
        options.validate().unwrap();
        assert_eq!(options.codec().unwrap().algorithm(), HashAlgorithm::Sha256);
        assert_eq!(options.costs(), CostModel::default());
    }

    #[test]
    fn test_toml_overrides() {
        let options = StoreOptions::from_toml_str("hash = \"xxh64\"\nnext_cost = 9\n").unwrap();
        assert_eq!(options.codec().unwrap().algorithm(), HashAlgorithm::Xxh64);
        assert_eq!(options.next_cost, 9);
        assert_eq!(options.check_cost, 1);
        assert_eq!(options.scan_batch, 256);
    }

    #[test]
    fn test_unknown_hash_is_fatal() {
        let err = StoreOptions::from_toml_str("hash = \"crc32\"").unwrap_err();
        assert!(matches!(err, QuadStoreError::Config(_)));
    }

    #[test]
    fn test_empty_hash_is_fatal() {
        let err = StoreOptions::from_toml_str("hash = \"\"").unwrap_err();
        assert!(matches!(err, QuadStoreError::Config(_)));
    }

    #[test]
    fn test_next_must_cost_more_than_check() {
        let equal = StoreOptions::from_toml_str("check_cost = 5\nnext_cost = 5\n").unwrap_err();
        assert!(matches!(equal, QuadStoreError::Config(_)));

        let inverted = StoreOptions {
            check_cost: 7,
            next_cost: 2,
            ..StoreOptions::default()
        };
        assert!(inverted.validate().is_err());

        let cheap_check = StoreOptions::from_toml_str("check_cost = 4\nnext_cost = 5\n").unwrap();
        assert_eq!(cheap_check.costs().check_cost, 4);
    }

    #[test]
    fn test_zero_batch_rejected() {
        let err = StoreOptions::from_toml_str("scan_batch = 0").unwrap_err();
        assert!(matches!(err, QuadStoreError::Config(_)));
    }
}
