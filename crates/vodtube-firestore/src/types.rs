//! Firestore REST API types and value conversions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{FirestoreError, FirestoreResult};

/// Firestore document value types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(String), // Firestore sends integers as strings
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(GeoPoint),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    pub values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    pub fields: Option<HashMap<String, Value>>,
}

impl Value {
    pub fn map(fields: HashMap<String, Value>) -> Self {
        Value::MapValue(MapValue {
            fields: Some(fields),
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::NullValue(_))
    }
}

/// Firestore document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name
    pub name: Option<String>,
    /// Document fields
    pub fields: Option<HashMap<String, Value>>,
    /// Create time
    pub create_time: Option<String>,
    /// Update time
    pub update_time: Option<String>,
}

impl Document {
    /// Create a new document with the given fields.
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self {
            name: None,
            fields: Some(fields),
            create_time: None,
            update_time: None,
        }
    }

    /// Last path segment of the resource name.
    pub fn id(&self) -> Option<&str> {
        self.name.as_deref().and_then(|n| n.rsplit('/').next())
    }

    /// Typed view over the document fields.
    pub fn view(&self) -> FirestoreResult<Fields<'_>> {
        self.fields
            .as_ref()
            .map(Fields)
            .ok_or_else(|| FirestoreError::invalid_response("Document has no fields"))
    }
}

/// List documents response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsResponse {
    pub documents: Option<Vec<Document>>,
    pub next_page_token: Option<String>,
}

/// Read-only accessor over a field map.
///
/// Missing or mistyped fields read as `None`; the `*_or` helpers fall back
/// to a default.
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a>(pub &'a HashMap<String, Value>);

impl<'a> Fields<'a> {
    pub fn get<T: FromFirestoreValue>(&self, key: &str) -> Option<T> {
        self.0.get(key).and_then(T::from_firestore_value)
    }

    pub fn get_or<T: FromFirestoreValue>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn string(&self, key: &str) -> String {
        self.get(key).unwrap_or_default()
    }

    /// Non-empty string, or `None`.
    pub fn opt_string(&self, key: &str) -> Option<String> {
        self.get::<String>(key).filter(|s| !s.is_empty())
    }

    pub fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        self.get(key)
    }

    pub fn require<T: FromFirestoreValue>(&self, key: &str) -> FirestoreResult<T> {
        self.get(key)
            .ok_or_else(|| FirestoreError::invalid_response(format!("Missing field: {}", key)))
    }

    /// Entries of an array-of-maps field.
    pub fn maps(&self, key: &str) -> Vec<Fields<'a>> {
        match self.0.get(key) {
            Some(Value::ArrayValue(ArrayValue { values: Some(values) })) => values
                .iter()
                .filter_map(|v| match v {
                    Value::MapValue(MapValue { fields: Some(f) }) => Some(Fields(f)),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Convert a Rust value to Firestore Value.
pub trait ToFirestoreValue {
    fn to_firestore_value(&self) -> Value;
}

impl ToFirestoreValue for String {
    fn to_firestore_value(&self) -> Value {
        Value::StringValue(self.clone())
    }
}

impl ToFirestoreValue for &str {
    fn to_firestore_value(&self) -> Value {
        Value::StringValue(self.to_string())
    }
}

impl ToFirestoreValue for i64 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue(self.to_string())
    }
}

impl ToFirestoreValue for i32 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue(self.to_string())
    }
}

impl ToFirestoreValue for u32 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue(self.to_string())
    }
}

impl ToFirestoreValue for u64 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue((*self as i64).to_string())
    }
}

impl ToFirestoreValue for bool {
    fn to_firestore_value(&self) -> Value {
        Value::BooleanValue(*self)
    }
}

impl ToFirestoreValue for DateTime<Utc> {
    fn to_firestore_value(&self) -> Value {
        Value::TimestampValue(self.to_rfc3339())
    }
}

impl<T: ToFirestoreValue> ToFirestoreValue for Option<T> {
    fn to_firestore_value(&self) -> Value {
        match self {
            Some(v) => v.to_firestore_value(),
            None => Value::NullValue(()),
        }
    }
}

impl<T: ToFirestoreValue> ToFirestoreValue for Vec<T> {
    fn to_firestore_value(&self) -> Value {
        Value::ArrayValue(ArrayValue {
            values: Some(self.iter().map(|v| v.to_firestore_value()).collect()),
        })
    }
}

/// Convert Firestore Value to Rust type.
pub trait FromFirestoreValue: Sized {
    fn from_firestore_value(value: &Value) -> Option<Self>;
}

impl FromFirestoreValue for String {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::StringValue(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromFirestoreValue for i64 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntegerValue(s) => s.parse().ok(),
            Value::DoubleValue(f) => Some(*f as i64),
            _ => None,
        }
    }
}

impl FromFirestoreValue for i32 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        i64::from_firestore_value(value).and_then(|v| i32::try_from(v).ok())
    }
}

impl FromFirestoreValue for u32 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        i64::from_firestore_value(value).and_then(|v| u32::try_from(v).ok())
    }
}

impl FromFirestoreValue for u64 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        i64::from_firestore_value(value).and_then(|v| u64::try_from(v).ok())
    }
}

impl FromFirestoreValue for bool {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::BooleanValue(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromFirestoreValue for DateTime<Utc> {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::TimestampValue(s) => DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.into()),
            _ => None,
        }
    }
}

impl<T: FromFirestoreValue> FromFirestoreValue for Vec<T> {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::ArrayValue(ArrayValue { values }) => Some(
                values
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .filter_map(T::from_firestore_value)
                    .collect(),
            ),
            _ => None,
        }
    }
}
