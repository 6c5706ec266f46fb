//! The extraction output artifact: an ordered field → value mapping.
//!
//! Field names are not fixed by schema — they depend on the labels present in
//! the source markup for a given certificate — so the record is a map rather
//! than a struct. Insertion order is preserved because it mirrors the
//! reading order of the source table, which downstream presentation layers
//! rely on. The one guaranteed key is `rfc`, the tax identifier pulled from
//! the introductory list element.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single extracted field value.
///
/// `Absent` records "the label was present but its cell was blank", which is
/// distinct from the field simply never appearing in the source. Serialises
/// to JSON `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A non-empty, trimmed cell value.
    Text(String),
    /// The label's value cell was empty.
    Absent,
}

impl FieldValue {
    /// The text content, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Absent => None,
        }
    }

    /// Build a value from a raw cell, trimming whitespace and mapping an
    /// empty result to [`FieldValue::Absent`].
    pub fn from_cell(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            FieldValue::Absent
        } else {
            FieldValue::Text(trimmed.to_string())
        }
    }
}

/// The ordered mapping produced by a successful extraction.
///
/// Keys are normalized snake_case ASCII (see
/// [`crate::pipeline::normalize::normalize_label`]); duplicate labels are
/// last-write-wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedRecord {
    fields: IndexMap<String, FieldValue>,
}

impl ExtractedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, overwriting any earlier value for the same key
    /// without disturbing its position.
    pub fn insert(&mut self, key: impl Into<String>, value: FieldValue) {
        self.fields.insert(key.into(), value);
    }

    /// Look a field up by its normalized key.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// The guaranteed tax identifier field.
    pub fn rfc(&self) -> Option<&str> {
        self.get("rfc").and_then(FieldValue::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in extraction order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_cell_trims_and_maps_blank_to_absent() {
        assert_eq!(
            FieldValue::from_cell("  ACME SA  "),
            FieldValue::Text("ACME SA".into())
        );
        assert_eq!(FieldValue::from_cell("   "), FieldValue::Absent);
        assert_eq!(FieldValue::from_cell(""), FieldValue::Absent);
    }

    #[test]
    fn insert_is_last_write_wins() {
        let mut rec = ExtractedRecord::new();
        rec.insert("estado", FieldValue::Text("CDMX".into()));
        rec.insert("estado", FieldValue::Text("JALISCO".into()));
        assert_eq!(rec.len(), 1);
        assert_eq!(rec.get("estado").unwrap().as_str(), Some("JALISCO"));
    }

    #[test]
    fn preserves_insertion_order() {
        let mut rec = ExtractedRecord::new();
        rec.insert("rfc", FieldValue::Text("XAXX010101000".into()));
        rec.insert("nombre", FieldValue::Text("ACME SA".into()));
        rec.insert("regimen_fiscal", FieldValue::Absent);
        let keys: Vec<&str> = rec.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["rfc", "nombre", "regimen_fiscal"]);
    }

    #[test]
    fn absent_serialises_to_null() {
        let mut rec = ExtractedRecord::new();
        rec.insert("rfc", FieldValue::Text("XAXX010101000".into()));
        rec.insert("curp", FieldValue::Absent);
        let json = serde_json::to_string(&rec).unwrap();
        assert_eq!(json, r#"{"rfc":"XAXX010101000","curp":null}"#);
    }
}
