//! # Snapshots
//!
//! The value delivered to reads and subscription callbacks: a key, a JSON
//! value and, for filtered queries, the ordered child sequence the ordering
//! produced.

use serde::Serialize;
use serde_json::Value;

/// One `{key, value}` child entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChildEntry {
    pub key: String,
    pub value: Value,
}

/// A point-in-time view of one location in the tree
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    key: Option<String>,
    value: Value,
    ordered: Option<Vec<(String, Value)>>,
}

impl Snapshot {
    pub fn new(key: Option<String>, value: Value) -> Self {
        Self {
            key,
            value,
            ordered: None,
        }
    }

    /// A snapshot carrying the explicit child order a query produced
    pub fn with_order(key: Option<String>, value: Value, ordered: Vec<(String, Value)>) -> Self {
        Self {
            key,
            value,
            ordered: Some(ordered),
        }
    }

    /// Key of the location, `None` at the root
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// False when the location holds no data
    pub fn exists(&self) -> bool {
        !self.value.is_null()
    }

    /// Whether the snapshot supports ordered child iteration
    pub fn has_children(&self) -> bool {
        self.ordered.is_some() || self.value.is_object()
    }

    /// Children as ordered `(key, value)` pairs
    ///
    /// Filtered queries carry their own order; plain snapshots iterate an
    /// object's entries in key order. Leaves yield nothing.
    pub fn children(&self) -> Vec<(String, Value)> {
        if let Some(ordered) = &self.ordered {
            return ordered.clone();
        }
        match &self.value {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Flatten children into the `[{key, value}]` shape of the `as_array`
    /// read option
    pub fn to_array(&self) -> Vec<ChildEntry> {
        self.children()
            .into_iter()
            .map(|(key, value)| ChildEntry { key, value })
            .collect()
    }
}
