//! Core type definitions for the quad store

use serde::{Deserialize, Serialize};
use std::fmt;

/// Internal value handed between iterators.
///
/// Depending on the collection it came from this is either a compound key
/// (four hex segments) or a single node hash.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Value(pub String);

impl Value {
    pub fn new(raw: impl Into<String>) -> Self {
        Value(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Value {
    fn from(raw: String) -> Self {
        Value(raw)
    }
}

impl From<&str> for Value {
    fn from(raw: &str) -> Self {
        Value(raw.to_string())
    }
}

/// Position of a node inside a quad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Unconstrained; only meaningful for "all" iterators
    Any,
    Subject,
    Predicate,
    Object,
    Label,
}

impl Direction {
    /// The four concrete directions, in compound-key order.
    pub const QUAD: [Direction; 4] = [
        Direction::Subject,
        Direction::Predicate,
        Direction::Object,
        Direction::Label,
    ];

    /// Segment index inside a compound key, `None` for `Any`.
    pub fn index(&self) -> Option<usize> {
        match self {
            Direction::Any => None,
            Direction::Subject => Some(0),
            Direction::Predicate => Some(1),
            Direction::Object => Some(2),
            Direction::Label => Some(3),
        }
    }

    /// Single-byte tag used when a direction is encoded into storage keys.
    pub fn tag(&self) -> u8 {
        match self {
            Direction::Any => b'a',
            Direction::Subject => b's',
            Direction::Predicate => b'p',
            Direction::Object => b'o',
            Direction::Label => b'c',
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Any => "any",
            Direction::Subject => "subject",
            Direction::Predicate => "predicate",
            Direction::Object => "object",
            Direction::Label => "label",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (subject, predicate, object, label) statement.
///
/// An empty label means the quad lives in no named graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Quad {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub label: String,
}

impl Quad {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Quad {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            label: label.into(),
        }
    }

    /// Node name in the given direction. `Any` has no component.
    pub fn get(&self, dir: Direction) -> Option<&str> {
        match dir {
            Direction::Any => None,
            Direction::Subject => Some(&self.subject),
            Direction::Predicate => Some(&self.predicate),
            Direction::Object => Some(&self.object),
            Direction::Label => Some(&self.label),
        }
    }

    /// Subject, predicate and object are mandatory; the label is not.
    pub fn is_valid(&self) -> bool {
        !self.subject.is_empty() && !self.predicate.is_empty() && !self.object.is_empty()
    }
}

impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -- {} -> {}", self.subject, self.predicate, self.object)?;
        if !self.label.is_empty() {
            write!(f, " ({})", self.label)?;
        }
        Ok(())
    }
}
