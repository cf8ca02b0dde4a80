//! # Logical Paths and Queries
//!
//! Dot-delimited addresses into the remote tree, plus the closed set of
//! query modifiers a read or subscription can carry. Every operator takes a
//! logical path; the native slash form never leaks into caller code.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ProviderError, ProviderResult};

/// Native separator used by the backing store
pub const NATIVE_SEPARATOR: char = '/';

/// Delimiter used by logical paths
pub const PATH_DELIMITER: char = '.';

/// A dot-delimited logical path into the remote tree
///
/// The empty path addresses the tree root. Paths never contain the native
/// separator; validation happens at construction, synchronously.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TreePath {
    raw: String,
}

impl TreePath {
    /// Parse a logical path, rejecting the native separator
    pub fn parse(path: &str) -> ProviderResult<Self> {
        if path.contains(NATIVE_SEPARATOR) {
            return Err(ProviderError::InvalidPath(path.to_string()));
        }
        Ok(Self {
            raw: path.to_string(),
        })
    }

    /// Reconstruct a logical path from its native slash form
    pub fn from_native(native: &str) -> Self {
        Self {
            raw: native.replace(NATIVE_SEPARATOR, &PATH_DELIMITER.to_string()),
        }
    }

    /// The dot form, as the caller supplied it
    pub fn as_dots(&self) -> &str {
        &self.raw
    }

    /// The native slash form handed to the backing store
    pub fn to_native(&self) -> String {
        self.raw.replace(PATH_DELIMITER, &NATIVE_SEPARATOR.to_string())
    }

    /// True for the tree root
    pub fn is_root(&self) -> bool {
        self.raw.is_empty()
    }

    /// Path segments, root yielding none
    pub fn segments(&self) -> Vec<&str> {
        if self.raw.is_empty() {
            Vec::new()
        } else {
            self.raw.split(PATH_DELIMITER).collect()
        }
    }

    /// Last segment, `None` for the root
    pub fn key(&self) -> Option<&str> {
        if self.raw.is_empty() {
            None
        } else {
            self.raw.rsplit(PATH_DELIMITER).next()
        }
    }

    /// Append a child segment
    pub fn child(&self, segment: &str) -> Self {
        if self.raw.is_empty() {
            Self {
                raw: segment.to_string(),
            }
        } else {
            Self {
                raw: format!("{}{}{}", self.raw, PATH_DELIMITER, segment),
            }
        }
    }
}

impl std::fmt::Display for TreePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for TreePath {
    type Error = ProviderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TreePath> for String {
    fn from(path: TreePath) -> Self {
        path.raw
    }
}

/// Ordering applied to a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    /// Order children by key
    Key,
    /// Order children by their own value
    Value,
    /// Order children by a named child field
    Child(String),
}

/// Closed set of query modifiers
///
/// Unknown option names do not exist here; everything a read or
/// subscription can ask for is an explicit field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Ordering; defaults to key order when any bound or limit is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,

    /// Lower bound on the ordering target (inclusive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_at: Option<Value>,

    /// Upper bound on the ordering target (inclusive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_at: Option<Value>,

    /// Exact match on the ordering target
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equal_to: Option<Value>,

    /// Keep only the first N children after ordering
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_to_first: Option<usize>,

    /// Keep only the last N children after ordering
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_to_last: Option<usize>,

    /// Flatten the result into an ordered `{key, value}` sequence
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub as_array: bool,

    /// Static payload merged into every signal invocation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Map<String, Value>>,
}

impl QueryOptions {
    /// True when no server-side modifier applies
    ///
    /// `as_array` and `payload` are client-side concerns and do not make a
    /// query filtered.
    pub fn is_plain(&self) -> bool {
        self.order_by.is_none()
            && self.start_at.is_none()
            && self.end_at.is_none()
            && self.equal_to.is_none()
            && self.limit_to_first.is_none()
            && self.limit_to_last.is_none()
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by = Some(order);
        self
    }

    pub fn start_at(mut self, value: Value) -> Self {
        self.start_at = Some(value);
        self
    }

    pub fn end_at(mut self, value: Value) -> Self {
        self.end_at = Some(value);
        self
    }

    pub fn equal_to(mut self, value: Value) -> Self {
        self.equal_to = Some(value);
        self
    }

    pub fn limit_to_first(mut self, count: usize) -> Self {
        self.limit_to_first = Some(count);
        self
    }

    pub fn limit_to_last(mut self, count: usize) -> Self {
        self.limit_to_last = Some(count);
        self
    }

    pub fn as_array(mut self) -> Self {
        self.as_array = true;
        self
    }

    pub fn payload(mut self, payload: serde_json::Map<String, Value>) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// A logical path plus its query modifiers
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub path: TreePath,
    pub options: QueryOptions,
}

impl Query {
    pub fn new(path: TreePath, options: QueryOptions) -> Self {
        Self { path, options }
    }

    /// A query with no modifiers
    pub fn plain(path: TreePath) -> Self {
        Self {
            path,
            options: QueryOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rejects_native_separator() {
        let err = TreePath::parse("users/alice").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidPath(p) if p == "users/alice"));
    }

    #[test]
    fn test_native_round_trip() {
        for raw in ["", "a", "a.b", "users.alice.posts.p1"] {
            let path = TreePath::parse(raw).unwrap();
            assert_eq!(TreePath::from_native(&path.to_native()), path);
            assert_eq!(path.as_dots(), raw);
        }
    }

    #[test]
    fn test_key_and_segments() {
        let path = TreePath::parse("a.b.c").unwrap();
        assert_eq!(path.key(), Some("c"));
        assert_eq!(path.segments(), vec!["a", "b", "c"]);

        let root = TreePath::parse("").unwrap();
        assert!(root.is_root());
        assert_eq!(root.key(), None);
        assert!(root.segments().is_empty());
    }

    #[test]
    fn test_child_from_root() {
        let root = TreePath::parse("").unwrap();
        assert_eq!(root.child("a").as_dots(), "a");
        assert_eq!(root.child("a").child("b").as_dots(), "a.b");
    }

    #[test]
    fn test_plain_options_ignore_client_side_fields() {
        let options = QueryOptions::default().as_array();
        assert!(options.is_plain());

        let options = QueryOptions::default().limit_to_first(3);
        assert!(!options.is_plain());
    }

    #[test]
    fn test_options_builder() {
        let options = QueryOptions::default()
            .order_by(OrderBy::Child("age".to_string()))
            .start_at(json!(18))
            .limit_to_last(5);
        assert_eq!(options.order_by, Some(OrderBy::Child("age".to_string())));
        assert_eq!(options.start_at, Some(json!(18)));
        assert_eq!(options.limit_to_last, Some(5));
    }
}
