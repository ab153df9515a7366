//! In-memory quad store
//!
//! Quads, nodes and the per-direction indexes live in ordered maps behind a
//! single `RwLock`. Cursors take a snapshot of the matching keys when they
//! are opened, so concurrent writers never disturb a scan in progress and
//! every scan comes back in key order.

use crate::backend::{
    check_constraint, validate_quads, Collection, Constraint, Cursor, NodeRecord, QuadBackend,
    QuadStore, NODES, QUADS,
};
use crate::config::{CostModel, StoreOptions};
use crate::error::{QuadStoreError, Result};
use crate::hash::KeyCodec;
use crate::iterator::{IteratorType, TypeRegistry};
use crate::types::{Direction, Quad, Value};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

pub const TYPE_NAME: &str = "memstore";

#[derive(Debug, Default)]
struct MemoryState {
    quads: BTreeMap<Value, Quad>,
    nodes: BTreeMap<Value, NodeRecord>,
    index: HashMap<(Direction, Value), BTreeSet<Value>>,
}

impl MemoryState {
    fn insert(&mut self, codec: &KeyCodec, key: Value, quad: &Quad) {
        for dir in Direction::QUAD {
            let name = quad.get(dir).unwrap_or_default();
            let hash = codec.hash(name);
            self.index
                .entry((dir, hash.clone()))
                .or_default()
                .insert(key.clone());
            if !name.is_empty() {
                self.nodes
                    .entry(hash)
                    .or_insert_with(|| NodeRecord {
                        name: name.to_string(),
                        size: 0,
                    })
                    .size += 1;
            }
        }
        self.quads.insert(key, quad.clone());
    }

    fn remove(&mut self, codec: &KeyCodec, key: &Value, quad: &Quad) {
        for dir in Direction::QUAD {
            let name = quad.get(dir).unwrap_or_default();
            let hash = codec.hash(name);
            let slot = (dir, hash);
            if let Some(keys) = self.index.get_mut(&slot) {
                keys.remove(key);
                if keys.is_empty() {
                    self.index.remove(&slot);
                }
            }
            if name.is_empty() {
                continue;
            }
            let (_, hash) = slot;
            let drained = match self.nodes.get_mut(&hash) {
                Some(node) => {
                    node.size = node.size.saturating_sub(1);
                    node.size == 0
                }
                None => false,
            };
            if drained {
                self.nodes.remove(&hash);
            }
        }
        self.quads.remove(key);
    }

    fn matching(&self, collection: &Collection, constraint: Option<&Constraint>) -> Vec<Value> {
        match (collection.name(), constraint) {
            (NODES, _) => self.nodes.keys().cloned().collect(),
            (_, None) => self.quads.keys().cloned().collect(),
            (_, Some(c)) => self
                .index
                .get(&(c.direction, c.value.clone()))
                .map(|keys| keys.iter().cloned().collect())
                .unwrap_or_default(),
        }
    }

    fn count(&self, collection: &Collection, constraint: Option<&Constraint>) -> u64 {
        let count = match (collection.name(), constraint) {
            (NODES, _) => self.nodes.len(),
            (_, None) => self.quads.len(),
            (_, Some(c)) => self
                .index
                .get(&(c.direction, c.value.clone()))
                .map_or(0, BTreeSet::len),
        };
        count as u64
    }
}

/// Snapshot of matching keys taken when the cursor was opened
#[derive(Debug)]
pub struct MemoryCursor {
    keys: std::vec::IntoIter<Value>,
    closed: bool,
}

impl Cursor for MemoryCursor {
    fn next_key(&mut self) -> Result<Option<Value>> {
        if self.closed {
            return Err(QuadStoreError::Backend("cursor is closed".to_string()));
        }
        Ok(self.keys.next())
    }

    fn close(&mut self) {
        self.closed = true;
        self.keys = Vec::new().into_iter();
    }
}

pub struct MemoryStore {
    codec: KeyCodec,
    costs: CostModel,
    iterator_type: IteratorType,
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Registers the `memstore` iterator kind and builds an empty store.
    pub fn new(registry: &mut TypeRegistry, options: &StoreOptions) -> Result<Self> {
        options.validate()?;
        let codec = options.codec()?;
        debug!(hash = %codec.algorithm(), "opened memory store");
        Ok(MemoryStore {
            codec,
            costs: options.costs(),
            iterator_type: registry.register(TYPE_NAME),
            state: RwLock::new(MemoryState::default()),
        })
    }
}

impl QuadBackend for MemoryStore {
    type Cursor = MemoryCursor;

    fn codec(&self) -> KeyCodec {
        self.codec
    }

    fn costs(&self) -> CostModel {
        self.costs
    }

    fn iterator_type(&self) -> IteratorType {
        self.iterator_type
    }

    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn name_of(&self, value: &Value) -> Result<Option<String>> {
        Ok(self.state.read().nodes.get(value).map(|node| node.name.clone()))
    }

    fn open_collection(&self, name: &str) -> Result<Collection> {
        match name {
            QUADS | NODES => Ok(Collection::new(name)),
            other => Err(QuadStoreError::UnknownCollection(other.to_string())),
        }
    }

    fn count_matching(&self, collection: &Collection, constraint: Option<&Constraint>) -> Result<u64> {
        check_constraint(&self.codec, collection, constraint)?;
        Ok(self.state.read().count(collection, constraint))
    }

    fn find(&self, collection: &Collection, constraint: Option<&Constraint>) -> Result<MemoryCursor> {
        check_constraint(&self.codec, collection, constraint)?;
        let keys = self.state.read().matching(collection, constraint);
        Ok(MemoryCursor {
            keys: keys.into_iter(),
            closed: false,
        })
    }
}

impl QuadStore for MemoryStore {
    fn add_quad(&self, quad: &Quad) -> Result<()> {
        self.add_quad_set(std::slice::from_ref(quad))
    }

    fn add_quad_set(&self, quads: &[Quad]) -> Result<()> {
        validate_quads(quads)?;
        let mut state = self.state.write();
        for quad in quads {
            let key = self.codec.quad_key(quad);
            if state.quads.contains_key(&key) {
                continue;
            }
            state.insert(&self.codec, key, quad);
        }
        Ok(())
    }

    fn remove_quad(&self, quad: &Quad) -> Result<()> {
        let key = self.codec.quad_key(quad);
        let mut state = self.state.write();
        if let Some(stored) = state.quads.get(&key).cloned() {
            state.remove(&self.codec, &key, &stored);
        }
        Ok(())
    }

    fn quad(&self, key: &Value) -> Result<Option<Quad>> {
        Ok(self.state.read().quads.get(key).cloned())
    }

    fn size(&self) -> Result<u64> {
        Ok(self.state.read().quads.len() as u64)
    }

    fn node_count(&self) -> Result<u64> {
        Ok(self.state.read().nodes.len() as u64)
    }
}
