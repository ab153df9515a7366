//! JSON quad ingestion
//!
//! Accepts an array of objects with `subject`, `predicate`, `object` and an
//! optional `label`. Unknown fields are ignored.

use crate::error::{QuadStoreError, Result};
use crate::types::Quad;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawQuad {
    subject: Option<String>,
    predicate: Option<String>,
    object: Option<String>,
    label: Option<String>,
}

impl From<RawQuad> for Quad {
    fn from(raw: RawQuad) -> Self {
        Quad {
            subject: raw.subject.unwrap_or_default(),
            predicate: raw.predicate.unwrap_or_default(),
            object: raw.object.unwrap_or_default(),
            label: raw.label.unwrap_or_default(),
        }
    }
}

/// Outcome of a lenient parse
#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub quads: Vec<Quad>,
    /// One `InvalidQuad` per rejected entry, in input order
    pub rejected: Vec<QuadStoreError>,
}

/// Parses a batch, failing on the first invalid entry.
///
/// The error names the entry's index and carries whatever was parsed of it.
pub fn parse_json_quads(data: &[u8]) -> Result<Vec<Quad>> {
    let raw: Vec<RawQuad> = serde_json::from_slice(data)?;
    let mut quads = Vec::with_capacity(raw.len());
    for (index, entry) in raw.into_iter().enumerate() {
        let quad = Quad::from(entry);
        if !quad.is_valid() {
            return Err(QuadStoreError::InvalidQuad { index, quad });
        }
        quads.push(quad);
    }
    Ok(quads)
}

/// Parses a batch, keeping the valid entries and reporting the rest.
///
/// Malformed JSON still fails the whole call.
pub fn parse_json_quads_lenient(data: &[u8]) -> Result<ParsedBatch> {
    let raw: Vec<RawQuad> = serde_json::from_slice(data)?;
    let mut batch = ParsedBatch::default();
    for (index, entry) in raw.into_iter().enumerate() {
        let quad = Quad::from(entry);
        if quad.is_valid() {
            batch.quads.push(quad);
        } else {
            batch.rejected.push(QuadStoreError::InvalidQuad { index, quad });
        }
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_correct_json() {
        let input = br#"[
            {"subject": "foo", "predicate": "bar", "object": "baz"},
            {"subject": "foo", "predicate": "bar", "object": "baz", "label": "graph"}
        ]"#;
        let quads = parse_json_quads(input).unwrap();
        assert_eq!(
            quads,
            vec![
                Quad::new("foo", "bar", "baz", ""),
                Quad::new("foo", "bar", "baz", "graph"),
            ]
        );
    }

    #[test]
    fn test_extra_fields_ignored() {
        let input = br#"[{"subject": "foo", "predicate": "bar", "object": "foo", "something_else": "extra data"}]"#;
        let quads = parse_json_quads(input).unwrap();
        assert_eq!(quads, vec![Quad::new("foo", "bar", "foo", "")]);
    }

    #[test]
    fn test_missing_object_rejected() {
        let input = br#"[{"subject": "foo", "predicate": "bar"}]"#;
        match parse_json_quads(input) {
            Err(QuadStoreError::InvalidQuad { index, quad }) => {
                assert_eq!(index, 0);
                assert_eq!(quad, Quad::new("foo", "bar", "", ""));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_lenient_keeps_valid_entries() {
        let input = br#"[
            {"subject": "a", "predicate": "b", "object": "c"},
            {"predicate": "b", "object": "c"},
            {"subject": "d", "predicate": "e", "object": "f", "label": null}
        ]"#;
        let batch = parse_json_quads_lenient(input).unwrap();
        assert_eq!(batch.quads.len(), 2);
        assert_eq!(batch.rejected.len(), 1);
        assert!(matches!(batch.rejected[0], QuadStoreError::InvalidQuad { index: 1, .. }));
    }

    #[test]
    fn test_absent_and_null_label_are_empty() {
        let input = br#"[
            {"subject": "a", "predicate": "b", "object": "c"},
            {"subject": "a", "predicate": "b", "object": "c", "label": null}
        ]"#;
        let quads = parse_json_quads(input).unwrap();
        assert!(quads.iter().all(|q| q.label.is_empty()));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            parse_json_quads(b"[{\"subject\": "),
            Err(QuadStoreError::Ingest(_))
        ));
    }
}
