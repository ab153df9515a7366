//! Primitive iterators
//!
//! The leaf every backend contributes to an iterator tree: a cursor over one
//! collection, optionally restricted to a single (direction, node) pair.
//! Whatever the backend, `check` never goes back to storage. It slices the
//! candidate compound key at this iterator's direction and compares the
//! segment with the constraint hash, which keeps intersections cheap even
//! when `next` is a network round trip.

use crate::backend::{Collection, Constraint, Cursor, QuadBackend, NODES, QUADS};
use crate::base::IteratorBase;
use crate::error::{QuadStoreError, Result};
use crate::iterator::{IteratorStats, IteratorType, QuadIterator};
use crate::types::{Direction, Value};
use std::sync::Arc;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Positioned,
    Exhausted,
    Failed,
    Closed,
}

pub struct PrimitiveIterator<B: QuadBackend> {
    base: IteratorBase,
    store: Arc<B>,
    collection: Collection,
    dir: Direction,
    constraint: Option<Constraint>,
    cursor: Option<B::Cursor>,
    state: State,
    error: Option<QuadStoreError>,
    hash: String,
    name: String,
    size: u64,
}

impl<B: QuadBackend> PrimitiveIterator<B> {
    /// Iterator over the keys of `collection` whose `dir` component is `value`.
    ///
    /// `value` is an internal node value (a node hash). Fails if the backend
    /// cannot open the collection or cannot count the matches.
    pub fn new(store: Arc<B>, collection: &str, dir: Direction, value: &Value) -> Result<Self> {
        if dir == Direction::Any {
            return Err(QuadStoreError::ContractViolation(
                "constrained iterator needs a concrete direction".to_string(),
            ));
        }
        let collection = store.open_collection(collection)?;
        let name = store.name_of(value)?.unwrap_or_default();
        let constraint = Constraint {
            direction: dir,
            value: value.clone(),
        };
        Self::open(store, collection, dir, Some(constraint), value.to_string(), name)
    }

    /// Unconstrained iterator over every key of `collection`.
    pub fn all(store: Arc<B>, collection: &str) -> Result<Self> {
        let collection = store.open_collection(collection)?;
        Self::open(store, collection, Direction::Any, None, String::new(), String::new())
    }

    fn open(
        store: Arc<B>,
        collection: Collection,
        dir: Direction,
        constraint: Option<Constraint>,
        hash: String,
        name: String,
    ) -> Result<Self> {
        let mut cursor = store.find(&collection, constraint.as_ref())?;
        let size = match store.count_matching(&collection, constraint.as_ref()) {
            Ok(size) => size,
            Err(err) => {
                cursor.close();
                error!(collection = collection.name(), %dir, error = %err, "trouble getting size for iterator");
                return Err(err);
            }
        };
        debug!(collection = collection.name(), %dir, size, "opened primitive iterator");

        Ok(PrimitiveIterator {
            base: IteratorBase::new(),
            store,
            collection,
            dir,
            constraint,
            cursor: Some(cursor),
            state: State::Positioned,
            error: None,
            hash,
            name,
            size,
        })
    }

    pub fn is_all(&self) -> bool {
        self.constraint.is_none()
    }

    pub fn direction(&self) -> Direction {
        self.dir
    }

    pub fn collection(&self) -> &str {
        self.collection.name()
    }

    /// Hash the constraint matches against, empty for the all variant
    pub fn constraint_hash(&self) -> &str {
        &self.hash
    }

    /// Resolved external name of the constraint node
    pub fn constraint_name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    /// Backend error that ended the current scan, if any.
    ///
    /// `next` reports a failed scan as plain exhaustion; this is how a caller
    /// tells the two apart. Cleared by a successful `reset`.
    pub fn last_error(&self) -> Option<&QuadStoreError> {
        self.error.as_ref()
    }

    /// Fresh iterator over the same query, carrying this one's tags.
    pub fn duplicate(&self) -> Result<Self> {
        self.ensure_open("clone");
        let mut copy = match &self.constraint {
            Some(c) => Self::new(self.store.clone(), self.collection.name(), c.direction, &c.value)?,
            None => Self::all(self.store.clone(), self.collection.name())?,
        };
        copy.base.copy_tags_from(&self.base);
        Ok(copy)
    }

    fn release_cursor(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close();
        }
    }

    fn ensure_open(&self, op: &str) {
        if self.state == State::Closed {
            panic!(
                "{} called on closed {} iterator {}",
                op,
                self.type_name(),
                self.base.uid()
            );
        }
    }
}

impl<B: QuadBackend> QuadIterator for PrimitiveIterator<B> {
    fn base(&self) -> &IteratorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut IteratorBase {
        &mut self.base
    }

    fn next(&mut self) -> Option<Value> {
        self.ensure_open("next");
        if matches!(self.state, State::Exhausted | State::Failed) {
            return None;
        }
        let step = match self.cursor.as_mut() {
            Some(cursor) => cursor.next_key(),
            None => Ok(None),
        };
        match step {
            Ok(Some(value)) => {
                self.base.set_last(value.clone());
                self.base.log_next_out(self.type_name(), Some(&value));
                Some(value)
            }
            Ok(None) => {
                self.state = State::Exhausted;
                self.base.log_next_out(self.type_name(), None);
                None
            }
            Err(err) => {
                error!(
                    uid = self.base.uid(),
                    collection = self.collection.name(),
                    error = %err,
                    "error nexting iterator"
                );
                self.state = State::Failed;
                self.error = Some(err);
                None
            }
        }
    }

    /// # Panics
    ///
    /// On a constrained iterator, when `candidate` is too short to be a
    /// compound key.
    fn check(&mut self, candidate: &Value) -> bool {
        self.ensure_open("check");
        self.base.log_check_in(self.type_name(), candidate);
        if self.constraint.is_none() {
            self.base.set_last(candidate.clone());
            return self.base.log_check_out(self.type_name(), candidate, true);
        }

        let codec = self.store.codec();
        let segment = match codec.segment(candidate.as_str(), self.dir) {
            Ok(segment) => segment,
            Err(err) => panic!(
                "check on {} iterator {}: {}",
                self.type_name(),
                self.base.uid(),
                err
            ),
        };
        if segment == self.hash {
            self.base.set_last(candidate.clone());
            return self.base.log_check_out(self.type_name(), candidate, true);
        }
        self.base.log_check_out(self.type_name(), candidate, false)
    }

    fn size(&self) -> (u64, bool) {
        (self.size, true)
    }

    fn sorted(&self) -> bool {
        self.store.stable_order()
    }

    fn stats(&self) -> IteratorStats {
        let costs = self.store.costs();
        IteratorStats {
            check_cost: costs.check_cost,
            next_cost: costs.next_cost,
            size: self.size,
        }
    }

    fn optimize(self: Box<Self>) -> (Box<dyn QuadIterator>, bool) {
        (self, false)
    }

    fn reset(&mut self) {
        self.ensure_open("reset");
        self.release_cursor();
        match self.store.find(&self.collection, self.constraint.as_ref()) {
            Ok(cursor) => {
                self.cursor = Some(cursor);
                self.state = State::Positioned;
                self.error = None;
            }
            Err(err) => {
                error!(
                    uid = self.base.uid(),
                    collection = self.collection.name(),
                    error = %err,
                    "failed to reopen cursor on reset"
                );
                self.state = State::Failed;
                self.error = Some(err);
            }
        }
    }

    fn try_clone(&self) -> Result<Box<dyn QuadIterator>> {
        Ok(Box::new(self.duplicate()?))
    }

    fn close(&mut self) {
        self.release_cursor();
        self.state = State::Closed;
    }

    fn iterator_type(&self) -> IteratorType {
        if self.is_all() {
            IteratorType::ALL
        } else {
            self.store.iterator_type()
        }
    }

    fn type_name(&self) -> &str {
        if self.is_all() {
            "all"
        } else {
            self.store.type_name()
        }
    }

    fn debug_string(&self, indent: usize) -> String {
        let (size, _) = self.size();
        format!(
            "{}{}(size:{} {} {})",
            " ".repeat(indent),
            self.type_name(),
            size,
            self.hash,
            self.name
        )
    }
}

impl<B: QuadBackend> Drop for PrimitiveIterator<B> {
    fn drop(&mut self) {
        self.release_cursor();
    }
}

/// Quads whose `dir` component is the node `value`.
pub fn quad_iterator<B: QuadBackend>(
    store: &Arc<B>,
    dir: Direction,
    value: &Value,
) -> Result<PrimitiveIterator<B>> {
    PrimitiveIterator::new(Arc::clone(store), QUADS, dir, value)
}

/// Every stored quad.
pub fn quads_all_iterator<B: QuadBackend>(store: &Arc<B>) -> Result<PrimitiveIterator<B>> {
    PrimitiveIterator::all(Arc::clone(store), QUADS)
}

/// Every named node.
pub fn nodes_all_iterator<B: QuadBackend>(store: &Arc<B>) -> Result<PrimitiveIterator<B>> {
    PrimitiveIterator::all(Arc::clone(store), NODES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::QuadStore;
    use crate::config::StoreOptions;
    use crate::iterator::TypeRegistry;
    use crate::memstore::MemoryStore;
    use crate::types::Quad;
    use std::collections::HashMap;

    fn scenario() -> Arc<MemoryStore> {
        let mut registry = TypeRegistry::new();
        let store = MemoryStore::new(&mut registry, &StoreOptions::default()).unwrap();
        store
            .add_quad_set(&[
                Quad::new("A", "knows", "B", ""),
                Quad::new("A", "knows", "C", "g1"),
            ])
            .unwrap();
        Arc::new(store)
    }

    fn drain(it: &mut dyn QuadIterator) -> Vec<Value> {
        let mut out = Vec::new();
        while let Some(v) = it.next() {
            out.push(v);
        }
        out
    }

    #[test]
    fn test_subject_scenario() {
        let store = scenario();
        let codec = store.codec();
        let mut it = quad_iterator(&store, Direction::Subject, &store.value_of("A")).unwrap();

        assert_eq!(it.size(), (2, true));
        let keys = drain(&mut it);
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&codec.compound_key("A", "knows", "B", "")));
        assert!(keys.contains(&codec.compound_key("A", "knows", "C", "g1")));

        assert!(it.check(&codec.compound_key("A", "likes", "D", "")));
        assert!(!it.check(&codec.compound_key("E", "knows", "B", "")));
    }

    #[test]
    fn test_check_records_last_only_on_match() {
        let store = scenario();
        let codec = store.codec();
        let mut it = quad_iterator(&store, Direction::Object, &store.value_of("B")).unwrap();

        let hit = codec.compound_key("X", "y", "B", "");
        assert!(it.check(&hit));
        assert_eq!(it.last(), Some(&hit));

        assert!(!it.check(&codec.compound_key("X", "y", "Z", "")));
        assert_eq!(it.last(), Some(&hit));
    }

    #[test]
    fn test_all_accepts_anything() {
        let store = scenario();
        let mut it = quads_all_iterator(&store).unwrap();
        let stranger = store.codec().compound_key("P", "Q", "R", "S");

        assert_eq!(it.iterator_type(), IteratorType::ALL);
        assert!(it.check(&stranger));
        assert_eq!(it.last(), Some(&stranger));
        assert_eq!(it.size(), (2, true));
    }

    #[test]
    fn test_nodes_all_iterator() {
        let store = scenario();
        let mut it = nodes_all_iterator(&store).unwrap();
        let nodes = drain(&mut it);

        assert_eq!(nodes.len(), 5);
        assert_eq!(it.size(), (5, true));
        assert!(nodes.contains(&store.value_of("g1")));
        assert!(!nodes.contains(&store.value_of("")));
    }

    #[test]
    fn test_debug_string() {
        let store = scenario();
        let hash = store.value_of("A");
        let it = quad_iterator(&store, Direction::Subject, &hash).unwrap();
        assert_eq!(
            it.debug_string(2),
            format!("  memstore(size:2 {} A)", hash)
        );

        let all = quads_all_iterator(&store).unwrap();
        assert_eq!(all.debug_string(0), "all(size:2  )");
    }

    #[test]
    fn test_stats_and_flags() {
        let store = scenario();
        let it = quad_iterator(&store, Direction::Predicate, &store.value_of("knows")).unwrap();
        let stats = it.stats();

        assert_eq!(stats.size, 2);
        assert!(stats.check_cost < stats.next_cost);
        assert!(it.sorted());
        assert_eq!(it.iterator_type(), store.iterator_type());
        assert_eq!(it.type_name(), "memstore");

        let (it, changed) = Box::new(it).optimize();
        assert!(!changed);
        assert_eq!(it.size(), (2, true));
    }

    #[test]
    fn test_unknown_node_is_empty() {
        let store = scenario();
        let mut it = quad_iterator(&store, Direction::Subject, &store.value_of("nobody")).unwrap();
        assert_eq!(it.size(), (0, true));
        assert_eq!(it.constraint_name(), "");
        assert_eq!(it.next(), None);
    }

    #[test]
    fn test_reset_replays() {
        let store = scenario();
        let mut it = quad_iterator(&store, Direction::Subject, &store.value_of("A")).unwrap();
        let first = drain(&mut it);
        assert_eq!(it.next(), None);

        it.reset();
        assert_eq!(drain(&mut it), first);
        assert_eq!(it.size(), (2, true));
    }

    #[test]
    fn test_clone_copies_tags_not_position() {
        let store = scenario();
        let mut it = quad_iterator(&store, Direction::Subject, &store.value_of("A")).unwrap();
        it.add_tag("edge");
        it.add_fixed_tag("graph", Value::from("g1"));
        let first = it.next().unwrap();

        let mut copy = it.duplicate().unwrap();
        assert_eq!(copy.last(), None);
        assert_eq!(copy.next(), Some(first.clone()));

        let mut tags = HashMap::new();
        copy.tag_results(&mut tags);
        assert_eq!(tags.get("edge"), Some(&first));
        assert_eq!(tags.get("graph"), Some(&Value::from("g1")));
    }

    #[test]
    fn test_close_is_idempotent() {
        let store = scenario();
        let mut it = quads_all_iterator(&store).unwrap();
        it.close();
        it.close();
        assert!(it.is_closed());
    }

    #[test]
    #[should_panic(expected = "closed")]
    fn test_next_after_close_panics() {
        let store = scenario();
        let mut it = quads_all_iterator(&store).unwrap();
        it.close();
        it.next();
    }

    #[test]
    #[should_panic(expected = "contract violation")]
    fn test_check_short_candidate_panics() {
        let store = scenario();
        let mut it = quad_iterator(&store, Direction::Label, &store.value_of("g1")).unwrap();
        it.check(&store.value_of("g1"));
    }

    #[test]
    fn test_any_direction_rejected() {
        let store = scenario();
        let err = quad_iterator(&store, Direction::Any, &store.value_of("A")).err().unwrap();
        assert!(matches!(err, QuadStoreError::ContractViolation(_)));
    }

    #[test]
    fn test_unknown_collection_fails_construction() {
        let store = scenario();
        let err = PrimitiveIterator::all(Arc::clone(&store), "edges").err().unwrap();
        assert!(matches!(err, QuadStoreError::UnknownCollection(_)));
    }
}
