// Row Model - schema-less upload rows with a closed scalar value type
//
// A Row is an ordered list of (field name, scalar) pairs. Order matters:
// the extractor's fallback scan walks fields in input order. Nested JSON
// objects and arrays are dropped at construction, so extraction logic
// never has to defend against them.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

// ============================================================================
// FIELD VALUE
// ============================================================================

/// Scalar value of a single row field: string, number, boolean, or null.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl FieldValue {
    /// Convert a JSON value into a scalar field value.
    ///
    /// Returns None for objects and arrays - those are rejected at the
    /// boundary and never enter a Row.
    pub fn from_json(value: &Value) -> Option<FieldValue> {
        match value {
            Value::String(s) => Some(FieldValue::Text(s.clone())),
            Value::Number(n) => n.as_f64().map(FieldValue::Number),
            Value::Bool(b) => Some(FieldValue::Bool(*b)),
            Value::Null => Some(FieldValue::Null),
            Value::Object(_) | Value::Array(_) => None,
        }
    }

    /// Coerce to a string for extraction. Null yields None.
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Number(n) => Some(format!("{}", n)),
            FieldValue::Bool(b) => Some(b.to_string()),
            FieldValue::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Number(n) => serializer.serialize_f64(*n),
            FieldValue::Bool(b) => serializer.serialize_bool(*b),
            FieldValue::Null => serializer.serialize_none(),
        }
    }
}

// ============================================================================
// ROW
// ============================================================================

/// One uploaded record: field names mapped to scalar values, in input order.
/// Ephemeral - built per upload, never persisted.
#[derive(Debug, Clone, Default)]
pub struct Row {
    fields: Vec<(String, FieldValue)>,
}

impl Row {
    pub fn new() -> Self {
        Row { fields: Vec::new() }
    }

    /// Build a Row from a JSON object, skipping nested object/array values.
    pub fn from_json_object(object: &serde_json::Map<String, Value>) -> Row {
        let mut row = Row::new();
        for (name, value) in object {
            if let Some(scalar) = FieldValue::from_json(value) {
                row.insert(name, scalar);
            }
        }
        row
    }

    pub fn insert(&mut self, name: &str, value: FieldValue) {
        self.fields.push((name.to_string(), value));
    }

    /// First field whose name matches case-insensitively.
    pub fn get_ignore_case(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// Fields in input order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

// ============================================================================
// TESTS
// ============================================================================
