//! Backend facade
//!
//! A backend stores quads under their compound keys and keeps a separate
//! name ↔ hash mapping for nodes. Towards the iterator layer it only has to
//! answer three questions: what is this node called, how many keys match a
//! constraint, and give me an ordered cursor over them.

use crate::config::CostModel;
use crate::error::{QuadStoreError, Result};
use crate::hash::KeyCodec;
use crate::iterator::IteratorType;
use crate::types::{Direction, Quad, Value};
use serde::{Deserialize, Serialize};

/// Collection of compound keys, one per stored quad
pub const QUADS: &str = "quads";

/// Collection of node hashes, one per distinct node name
pub const NODES: &str = "nodes";

/// Handle on a backend collection, obtained from `QuadBackend::open_collection`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    name: String,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Collection { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Restricts a scan to quads whose `direction` component hashes to `value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub direction: Direction,
    pub value: Value,
}

/// Stored per node: its external name and how many quad slots reference it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    pub size: u64,
}

/// Forward-only position in a backend result set.
pub trait Cursor: Send {
    /// `Ok(None)` is exhaustion; `Err` is a backend failure.
    fn next_key(&mut self) -> Result<Option<Value>>;

    /// Releases the cursor. Idempotent.
    fn close(&mut self);
}

/// Read side of a backend, shared by every iterator built on it.
pub trait QuadBackend: Send + Sync + 'static {
    type Cursor: Cursor + 'static;

    fn codec(&self) -> KeyCodec;

    fn costs(&self) -> CostModel {
        CostModel::default()
    }

    /// Kind registered for this backend's primitive iterators
    fn iterator_type(&self) -> IteratorType;

    fn type_name(&self) -> &str;

    /// Whether repeated scans with one constraint return keys in one order
    fn stable_order(&self) -> bool {
        true
    }

    /// External name of a node hash, `None` when the node is unknown.
    fn name_of(&self, value: &Value) -> Result<Option<String>>;

    /// Internal value for an external node name.
    fn value_of(&self, name: &str) -> Value {
        self.codec().hash(name)
    }

    fn open_collection(&self, name: &str) -> Result<Collection>;

    /// Exact number of keys `find` would yield.
    fn count_matching(&self, collection: &Collection, constraint: Option<&Constraint>)
        -> Result<u64>;

    fn find(&self, collection: &Collection, constraint: Option<&Constraint>)
        -> Result<Self::Cursor>;
}

/// Write side and quad-level lookups.
pub trait QuadStore: QuadBackend {
    /// Stores a quad. Adding a quad that is already present is a no-op.
    fn add_quad(&self, quad: &Quad) -> Result<()>;

    /// Stores a batch; a single invalid quad rejects the whole batch.
    fn add_quad_set(&self, quads: &[Quad]) -> Result<()>;

    /// Removes a quad. Removing an absent quad is a no-op.
    fn remove_quad(&self, quad: &Quad) -> Result<()>;

    /// Decodes a compound key back into the stored quad.
    fn quad(&self, key: &Value) -> Result<Option<Quad>>;

    /// Number of stored quads
    fn size(&self) -> Result<u64>;

    /// Number of distinct named nodes
    fn node_count(&self) -> Result<u64>;

    /// Node hash in direction `dir` of a compound key.
    fn quad_direction(&self, key: &Value, dir: Direction) -> Result<Value> {
        Ok(Value::new(self.codec().segment(key.as_str(), dir)?))
    }
}

/// Rejects quads missing a subject, predicate or object.
pub(crate) fn validate_quads(quads: &[Quad]) -> Result<()> {
    match quads.iter().position(|q| !q.is_valid()) {
        Some(index) => Err(QuadStoreError::InvalidQuad {
            index,
            quad: quads[index].clone(),
        }),
        None => Ok(()),
    }
}

/// Constraints only make sense over the quads collection, and their value
/// must be a node hash of the codec's segment width.
pub(crate) fn check_constraint(
    codec: &KeyCodec,
    collection: &Collection,
    constraint: Option<&Constraint>,
) -> Result<()> {
    match constraint {
        Some(c) if c.direction == Direction::Any => Err(QuadStoreError::ContractViolation(
            "constraint direction must not be any".to_string(),
        )),
        Some(_) if collection.name() != QUADS => Err(QuadStoreError::ContractViolation(format!(
            "collection '{}' cannot be constrained by direction",
            collection.name()
        ))),
        Some(c) if c.value.len() != codec.segment_width() => {
            Err(QuadStoreError::ContractViolation(format!(
                "constraint value '{}' is {} wide, node hashes are {}",
                c.value,
                c.value.len(),
                codec.segment_width()
            )))
        }
        _ => Ok(()),
    }
}
