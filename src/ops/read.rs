//! One-shot reads.

use serde::Serialize;
use serde_json::Value;

use crate::errors::ProviderResult;
use crate::path::{Query, QueryOptions, TreePath};
use crate::provider::Provider;

/// Result of a `value` read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueResult {
    pub key: Option<String>,
    pub value: Value,
}

impl Provider {
    /// Read the value at `path` once
    ///
    /// With the `as_array` option set the value is flattened into an
    /// ordered `[{key, value}]` sequence instead of a raw object. A leaf
    /// has no children to iterate and flattens to an empty array.
    pub async fn value(&self, path: &str, options: QueryOptions) -> ProviderResult<ValueResult> {
        let path = TreePath::parse(path)?;
        let as_array = options.as_array;
        let snapshot = self.db.get(&Query::new(path, options)).await?;

        let key = snapshot.key().map(str::to_string);
        let value = if as_array {
            serde_json::to_value(snapshot.to_array())
                .unwrap_or_else(|_| snapshot.value().clone())
        } else {
            snapshot.into_value()
        };

        Ok(ValueResult { key, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryAuth, MemoryDatabase, MemoryFiles, RealtimeDatabase};
    use crate::errors::ProviderError;
    use crate::path::OrderBy;
    use crate::signal::SignalHub;
    use serde_json::json;
    use std::sync::Arc;

    fn setup() -> (Arc<MemoryDatabase>, Provider) {
        let db = Arc::new(MemoryDatabase::new());
        let provider = Provider::new(
            Arc::clone(&db) as Arc<dyn RealtimeDatabase>,
            Arc::new(MemoryAuth::new()),
            Arc::new(MemoryFiles::new("test")),
            Arc::new(SignalHub::new()),
        );
        (db, provider)
    }

    #[tokio::test]
    async fn test_value_resolves_key_and_value() {
        let (db, provider) = setup();
        db.set(&TreePath::parse("a.b").unwrap(), json!({"x": 1}))
            .await
            .unwrap();

        let result = provider.value("a.b", QueryOptions::default()).await.unwrap();
        assert_eq!(result.key.as_deref(), Some("b"));
        assert_eq!(result.value, json!({"x": 1}));
    }

    #[tokio::test]
    async fn test_value_of_missing_location_is_null() {
        let (_db, provider) = setup();
        let result = provider.value("nope", QueryOptions::default()).await.unwrap();
        assert_eq!(result.value, Value::Null);
    }

    #[tokio::test]
    async fn test_value_rejects_native_separator() {
        let (_db, provider) = setup();
        let err = provider
            .value("a/b", QueryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_as_array_flattens_ordered_children() {
        let (db, provider) = setup();
        db.set(
            &TreePath::parse("scores").unwrap(),
            json!({"a": 3, "b": 1, "c": 2}),
        )
        .await
        .unwrap();

        let options = QueryOptions::default()
            .order_by(OrderBy::Value)
            .as_array();
        let result = provider.value("scores", options).await.unwrap();
        assert_eq!(
            result.value,
            json!([
                {"key": "b", "value": 1},
                {"key": "c", "value": 2},
                {"key": "a", "value": 3}
            ])
        );
    }

    #[tokio::test]
    async fn test_as_array_flattens_leaf_to_empty_array() {
        let (db, provider) = setup();
        db.set(&TreePath::parse("n").unwrap(), json!(7)).await.unwrap();

        let result = provider
            .value("n", QueryOptions::default().as_array())
            .await
            .unwrap();
        assert_eq!(result.value, json!([]));
    }
}
