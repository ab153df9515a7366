//! Bookkeeping shared by every iterator kind
//!
//! Concrete iterators own an `IteratorBase` and expose it through
//! `QuadIterator::base`. It remembers the last value produced by `next` or
//! accepted by `check`, and the tags that bind that value into query results.

use crate::types::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub struct IteratorBase {
    uid: u64,
    last: Option<Value>,
    tags: Vec<String>,
    fixed_tags: HashMap<String, Value>,
}

impl IteratorBase {
    pub fn new() -> Self {
        IteratorBase {
            uid: NEXT_UID.fetch_add(1, Ordering::Relaxed),
            last: None,
            tags: Vec::new(),
            fixed_tags: HashMap::new(),
        }
    }

    /// Process-unique id, only used to correlate log lines
    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn last(&self) -> Option<&Value> {
        self.last.as_ref()
    }

    pub fn set_last(&mut self, value: Value) {
        self.last = Some(value);
    }

    /// Tag the value this iterator produces.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Bind a tag to a constant, independent of what the iterator produces.
    pub fn add_fixed_tag(&mut self, tag: impl Into<String>, value: Value) {
        self.fixed_tags.insert(tag.into(), value);
    }

    pub fn fixed_tags(&self) -> &HashMap<String, Value> {
        &self.fixed_tags
    }

    /// Write this iterator's bindings into `dst`.
    ///
    /// Tags are only bound once a value has been produced.
    pub fn tag_results(&self, dst: &mut HashMap<String, Value>) {
        if let Some(last) = &self.last {
            for tag in &self.tags {
                dst.insert(tag.clone(), last.clone());
            }
        }
        for (tag, value) in &self.fixed_tags {
            dst.insert(tag.clone(), value.clone());
        }
    }

    pub fn copy_tags_from(&mut self, other: &IteratorBase) {
        for tag in other.tags() {
            self.add_tag(tag.clone());
        }
        for (tag, value) in other.fixed_tags() {
            self.add_fixed_tag(tag.clone(), value.clone());
        }
    }

    pub fn log_check_in(&self, kind: &str, candidate: &Value) {
        trace!(uid = self.uid, kind, value = %candidate, "check");
    }

    /// Logs the outcome of a check and passes it through.
    pub fn log_check_out(&self, kind: &str, candidate: &Value, ok: bool) -> bool {
        if ok {
            trace!(uid = self.uid, kind, value = %candidate, "check accepted");
        } else {
            trace!(uid = self.uid, kind, value = %candidate, "check rejected");
        }
        ok
    }

    pub fn log_next_out(&self, kind: &str, value: Option<&Value>) {
        match value {
            Some(v) => trace!(uid = self.uid, kind, value = %v, "next"),
            None => trace!(uid = self.uid, kind, "next exhausted"),
        }
    }
}

impl Default for IteratorBase {
    fn default() -> Self {
        Self::new()
    }
}
