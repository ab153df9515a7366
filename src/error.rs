//! Error type shared by every layer of the store

use crate::types::Quad;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, QuadStoreError>;

#[derive(Debug, Error)]
pub enum QuadStoreError {
    /// Storage or connection failure underneath a backend
    #[error("backend error: {0}")]
    Backend(String),

    /// Invalid or inconsistent configuration, fatal at startup
    #[error("configuration error: {0}")]
    Config(String),

    /// A caller broke the iterator/codec contract
    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("unknown collection '{0}'")]
    UnknownCollection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("Invalid quad at index {index}. {quad}")]
    InvalidQuad { index: usize, quad: Quad },

    #[error("ingestion error: {0}")]
    Ingest(String),
}

impl From<rocksdb::Error> for QuadStoreError {
    fn from(err: rocksdb::Error) -> Self {
        QuadStoreError::Backend(err.into_string())
    }
}

impl From<bincode::Error> for QuadStoreError {
    fn from(err: bincode::Error) -> Self {
        QuadStoreError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for QuadStoreError {
    fn from(err: serde_json::Error) -> Self {
        QuadStoreError::Ingest(err.to_string())
    }
}

impl From<toml::de::Error> for QuadStoreError {
    fn from(err: toml::de::Error) -> Self {
        QuadStoreError::Config(err.to_string())
    }
}
