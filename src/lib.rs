//! Quadstore - Rust Core Engine
//!
//! Storage-independent iterator core for a quad (subject, predicate, object,
//! label) graph store.
//!
//! # Architecture
//!
//! - Identity Codec: fixed-width node hashes and four-segment compound keys
//! - Backend Facade: name lookup, exact counts and ordered cursors per backend
//! - Primitive Iterators: the leaf of every iterator tree, one per constraint
//! - Iterator Base: last value and tag bindings shared by all iterator kinds
//! - Backends: in-memory (ordered maps) and RocksDB (column families)

pub mod types;
pub mod error;
pub mod hash;
pub mod config;
pub mod logging;

// Iterator protocol
pub mod base;
pub mod iterator;
pub mod primitive;

// Backends
pub mod backend;
pub mod memstore;
pub mod storage;

// Ingestion
pub mod ingest;

pub use types::{Direction, Quad, Value};
pub use error::{QuadStoreError, Result};
pub use hash::{HashAlgorithm, KeyCodec};
pub use config::{CostModel, StoreOptions};

// Iterator exports
pub use base::IteratorBase;
pub use iterator::{IteratorStats, IteratorType, QuadIterator, TypeRegistry};
pub use primitive::{nodes_all_iterator, quad_iterator, quads_all_iterator, PrimitiveIterator};

// Backend exports
pub use backend::{Collection, Constraint, Cursor, NodeRecord, QuadBackend, QuadStore, NODES, QUADS};
pub use memstore::{MemoryCursor, MemoryStore};
pub use storage::{RocksCursor, RocksStore};

// Ingestion exports
pub use ingest::{parse_json_quads, parse_json_quads_lenient, ParsedBatch};
