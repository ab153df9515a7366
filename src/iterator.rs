//! Iterator execution protocol
//!
//! Every leaf a backend contributes, and every composition iterator a
//! planner builds on top of them, speaks `QuadIterator`. The protocol is
//! synchronous and single-owner: an iterator tree is walked by one caller,
//! and `try_clone` exists so independent branches never share a cursor.

use crate::base::IteratorBase;
use crate::error::Result;
use crate::types::Value;
use std::collections::HashMap;
use std::fmt;

/// Small integer identifying an iterator kind, handed out by a `TypeRegistry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IteratorType(u32);

impl IteratorType {
    pub const INVALID: IteratorType = IteratorType(0);
    pub const ALL: IteratorType = IteratorType(1);
    pub const AND: IteratorType = IteratorType(2);
    pub const OR: IteratorType = IteratorType(3);
    pub const FIXED: IteratorType = IteratorType(4);
    pub const NOT: IteratorType = IteratorType(5);
    pub const OPTIONAL: IteratorType = IteratorType(6);
    pub const HASA: IteratorType = IteratorType(7);
    pub const LINKSTO: IteratorType = IteratorType(8);
    pub const COMPARISON: IteratorType = IteratorType(9);
    pub const NULL: IteratorType = IteratorType(10);

    pub fn id(&self) -> u32 {
        self.0
    }
}

/// Builtin kinds, in id order starting at 1
const BUILTIN_TYPES: [&str; 10] = [
    "all",
    "and",
    "or",
    "fixed",
    "not",
    "optional",
    "hasa",
    "linksto",
    "comparison",
    "null",
];

/// Maps iterator kind names to `IteratorType` ids.
///
/// Built once during startup and passed by reference to every backend that
/// registers a kind; afterwards it is only read.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    names: Vec<String>,
    ids: HashMap<String, IteratorType>,
}

impl TypeRegistry {
    /// A registry holding the builtin kinds.
    pub fn new() -> Self {
        let mut registry = TypeRegistry {
            names: vec!["invalid".to_string()],
            ids: HashMap::new(),
        };
        for name in BUILTIN_TYPES {
            registry.register(name);
        }
        registry
    }

    /// Registers `name`, returning the existing id if it is already known.
    pub fn register(&mut self, name: &str) -> IteratorType {
        if let Some(ty) = self.ids.get(name) {
            return *ty;
        }
        let ty = IteratorType(self.names.len() as u32);
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), ty);
        ty
    }

    pub fn lookup(&self, name: &str) -> Option<IteratorType> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, ty: IteratorType) -> Option<&str> {
        if ty == IteratorType::INVALID {
            return None;
        }
        self.names.get(ty.0 as usize).map(String::as_str)
    }

    /// Number of registered kinds, builtins included
    pub fn len(&self) -> usize {
        self.names.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Cost figures a planner uses to order joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IteratorStats {
    pub check_cost: u64,
    pub next_cost: u64,
    pub size: u64,
}

pub trait QuadIterator: Send {
    fn base(&self) -> &IteratorBase;

    fn base_mut(&mut self) -> &mut IteratorBase;

    /// Advances and returns the next value, `None` once exhausted.
    fn next(&mut self) -> Option<Value>;

    /// Whether `candidate` belongs to this iterator's result set.
    fn check(&mut self, candidate: &Value) -> bool;

    /// Result count and whether that count is exact.
    fn size(&self) -> (u64, bool);

    /// Whether results come back in a stable order.
    fn sorted(&self) -> bool;

    fn stats(&self) -> IteratorStats;

    /// Rewrites into a cheaper equivalent; the flag reports a change.
    fn optimize(self: Box<Self>) -> (Box<dyn QuadIterator>, bool);

    /// Restarts from the first value.
    fn reset(&mut self);

    /// Independent copy with its own cursor and the same tags.
    fn try_clone(&self) -> Result<Box<dyn QuadIterator>>;

    /// Releases backend resources. Idempotent; nothing else may be called after.
    fn close(&mut self);

    fn iterator_type(&self) -> IteratorType;

    fn type_name(&self) -> &str;

    fn debug_string(&self, indent: usize) -> String;

    fn uid(&self) -> u64 {
        self.base().uid()
    }

    fn last(&self) -> Option<&Value> {
        self.base().last()
    }

    fn add_tag(&mut self, tag: &str) {
        self.base_mut().add_tag(tag);
    }

    fn add_fixed_tag(&mut self, tag: &str, value: Value) {
        self.base_mut().add_fixed_tag(tag, value);
    }

    /// Fills `dst` with this iterator's bindings. Composition iterators extend
    /// this with their children's results.
    fn tag_results(&self, dst: &mut HashMap<String, Value>) {
        self.base().tag_results(dst);
    }

    fn copy_tags_from(&mut self, other: &dyn QuadIterator) {
        self.base_mut().copy_tags_from(other.base());
    }
}

impl fmt::Debug for dyn QuadIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.debug_string(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_have_fixed_ids() {
        let registry = TypeRegistry::new();
        assert_eq!(registry.lookup("all"), Some(IteratorType::ALL));
        assert_eq!(registry.lookup("null"), Some(IteratorType::NULL));
        assert_eq!(registry.name(IteratorType::HASA), Some("hasa"));
        assert_eq!(registry.len(), BUILTIN_TYPES.len());
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = TypeRegistry::new();
        let first = registry.register("memstore");
        let second = registry.register("memstore");
        let other = registry.register("rocksdb");

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(registry.name(first), Some("memstore"));
        assert_eq!(registry.lookup("rocksdb"), Some(other));
    }

    #[test]
    fn test_invalid_has_no_name() {
        let registry = TypeRegistry::new();
        assert_eq!(registry.name(IteratorType::INVALID), None);
        assert_eq!(registry.lookup("invalid"), None);
    }
}
