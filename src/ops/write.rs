//! Write primitives: set, update, remove, push, transaction.

use serde_json::{Map, Value};
use tracing::debug;

use crate::backend::{TransactionOutcome, TransformFn};
use crate::errors::ProviderResult;
use crate::path::TreePath;
use crate::provider::Provider;

impl Provider {
    /// Replace the value at `path`
    pub async fn set(&self, path: &str, value: Value) -> ProviderResult<()> {
        let path = TreePath::parse(path)?;
        self.db.set(&path, value).await
    }

    /// Write several children of `path` without touching siblings
    pub async fn update(&self, path: &str, values: Map<String, Value>) -> ProviderResult<()> {
        let path = TreePath::parse(path)?;
        self.db.update(&path, values).await
    }

    /// Remove the location
    pub async fn remove(&self, path: &str) -> ProviderResult<()> {
        let path = TreePath::parse(path)?;
        self.db.remove(&path).await
    }

    /// Append a child under a generated key; resolves with the key
    pub async fn push(&self, path: &str, value: Value) -> ProviderResult<String> {
        let path = TreePath::parse(path)?;
        let key = self.db.push(&path, value).await?;
        debug!(path = %path, key = %key, "pushed child");
        Ok(key)
    }

    /// Apply a pure transform to the current value
    ///
    /// Resolves with whether the optimistic-concurrency write committed and
    /// the resulting value. Returning `None` from the transform aborts.
    pub async fn transaction(
        &self,
        path: &str,
        transform: impl Fn(Option<&Value>) -> Option<Value> + Send + Sync + 'static,
    ) -> ProviderResult<TransactionOutcome> {
        let path = TreePath::parse(path)?;
        let transform: TransformFn = Box::new(transform);
        self.db.transaction(&path, transform).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryAuth, MemoryDatabase, MemoryFiles, RealtimeDatabase};
    use crate::path::{Query, QueryOptions};
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
    async fn test_set_and_remove() {
        let (db, provider) = setup();
        provider.set("a.b", json!(1)).await.unwrap();

        let snap = db
            .get(&Query::plain(TreePath::parse("a.b").unwrap()))
            .await
            .unwrap();
        assert_eq!(snap.value(), &json!(1));

        provider.remove("a.b").await.unwrap();
        let snap = db
            .get(&Query::plain(TreePath::parse("a.b").unwrap()))
            .await
            .unwrap();
        assert!(!snap.exists());
    }

    #[tokio::test]
    async fn test_push_resolves_key_readable_back() {
        let (_db, provider) = setup();
        let key = provider.push("a.b", json!({"n": 1})).await.unwrap();

        let result = provider
            .value(&format!("a.b.{key}"), QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(result.key.as_deref(), Some(key.as_str()));
        assert_eq!(result.value, json!({"n": 1}));
    }

    #[tokio::test]
    async fn test_update_merges() {
        let (_db, provider) = setup();
        provider.set("u", json!({"a": 1, "b": 2})).await.unwrap();

        let mut patch = Map::new();
        patch.insert("b".to_string(), json!(3));
        patch.insert("c".to_string(), json!(4));
        provider.update("u", patch).await.unwrap();

        let result = provider.value("u", QueryOptions::default()).await.unwrap();
        assert_eq!(result.value, json!({"a": 1, "b": 3, "c": 4}));
    }

    #[tokio::test]
    async fn test_transaction_reports_commit_state() {
        let (_db, provider) = setup();
        provider.set("n", json!(10)).await.unwrap();

        let outcome = provider
            .transaction("n", |current| {
                current.and_then(Value::as_i64).map(|n| json!(n * 2))
            })
            .await
            .unwrap();
        assert!(outcome.committed);
        assert_eq!(outcome.value, json!(20));

        let outcome = provider.transaction("n", |_| None).await.unwrap();
        assert!(!outcome.committed);
        assert_eq!(outcome.value, json!(20));
    }

    #[tokio::test]
    async fn test_writes_reject_native_separator() {
        let (_db, provider) = setup();
        assert!(provider.set("a/b", json!(1)).await.is_err());
        assert!(provider.remove("a/b").await.is_err());
        assert!(provider.push("a/b", json!(1)).await.is_err());
    }
}
