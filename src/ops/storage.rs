//! File storage operators.

use std::sync::Arc;

use serde_json::Map;
use tracing::debug;

use crate::backend::{ProgressFn, StoredFile};
use crate::errors::ProviderResult;
use crate::path::TreePath;
use crate::provider::Provider;
use crate::signal::merge_payload;

/// Options for `put`
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Signal invoked with transfer-progress metadata per tick
    pub progress_signal: Option<String>,
    /// Static payload merged into every progress invocation
    pub payload: Option<Map<String, serde_json::Value>>,
}

impl Provider {
    /// Upload `data` under `path/filename`; resolves with `{url, filename}`
    pub async fn put(
        &self,
        path: &str,
        filename: &str,
        data: Vec<u8>,
        options: PutOptions,
    ) -> ProviderResult<StoredFile> {
        let path = TreePath::parse(path)?;

        let progress: Option<ProgressFn> = options.progress_signal.map(|signal| {
            let signals = Arc::clone(&self.signals);
            let static_payload = options.payload;
            Box::new(move |tick: crate::backend::UploadProgress| {
                let mut payload = Map::new();
                payload.insert("progress".to_string(), tick.percent().into());
                payload.insert(
                    "bytes_transferred".to_string(),
                    tick.bytes_transferred.into(),
                );
                payload.insert("total_bytes".to_string(), tick.total_bytes.into());
                signals.invoke(&signal, merge_payload(payload, static_payload.as_ref()));
            }) as ProgressFn
        });

        let stored = self.files.put(&path, filename, data, progress).await?;
        debug!(path = %path, filename, "uploaded file");
        Ok(stored)
    }

    /// Delete `path/filename`
    pub async fn delete_file(&self, path: &str, filename: &str) -> ProviderResult<()> {
        let path = TreePath::parse(path)?;
        self.files.delete(&path, filename).await
    }

    /// Resolve the download URL for `path/filename`
    pub async fn get_download_url(&self, path: &str, filename: &str) -> ProviderResult<String> {
        let path = TreePath::parse(path)?;
        self.files.download_url(&path, filename).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryAuth, MemoryDatabase, MemoryFiles, RealtimeDatabase};
    use crate::errors::ProviderError;
    use crate::signal::SignalHub;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    fn setup() -> (Arc<SignalHub>, Provider) {
        let hub = Arc::new(SignalHub::new());
        let provider = Provider::new(
            Arc::new(MemoryDatabase::new()) as Arc<dyn RealtimeDatabase>,
            Arc::new(MemoryAuth::new()),
            Arc::new(MemoryFiles::new("uploads")),
            Arc::clone(&hub) as Arc<dyn crate::signal::SignalRouter>,
        );
        (hub, provider)
    }

    #[tokio::test]
    async fn test_put_resolves_url_and_filename() {
        let (_hub, provider) = setup();
        let stored = provider
            .put("docs.reports", "q1.pdf", vec![1, 2], PutOptions::default())
            .await
            .unwrap();
        assert_eq!(stored.filename, "q1.pdf");
        assert_eq!(stored.url, "memory://uploads/docs/reports/q1.pdf");

        let url = provider.get_download_url("docs.reports", "q1.pdf").await.unwrap();
        assert_eq!(url, stored.url);
    }

    #[tokio::test]
    async fn test_put_progress_signal_merges_payload() {
        let (hub, provider) = setup();
        let ticks: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&ticks);
        hub.register("uploadProgress", move |payload| {
            sink.lock().unwrap().push(payload);
        });

        let mut statik = Map::new();
        statik.insert("doc".to_string(), json!("q1"));
        provider
            .put(
                "docs",
                "q1.pdf",
                vec![0u8; 10],
                PutOptions {
                    progress_signal: Some("uploadProgress".to_string()),
                    payload: Some(statik),
                },
            )
            .await
            .unwrap();

        let ticks = ticks.lock().unwrap();
        assert!(!ticks.is_empty());
        let last = ticks.last().unwrap();
        assert_eq!(last["progress"], json!(100.0));
        assert_eq!(last["doc"], json!("q1"));
        assert_eq!(last["total_bytes"], json!(10));
    }

    #[tokio::test]
    async fn test_delete_file_round_trip() {
        let (_hub, provider) = setup();
        provider
            .put("d", "f.txt", vec![1], PutOptions::default())
            .await
            .unwrap();
        provider.delete_file("d", "f.txt").await.unwrap();

        let err = provider.get_download_url("d", "f.txt").await.unwrap_err();
        assert!(matches!(err, ProviderError::Storage(_)));
    }

    #[tokio::test]
    async fn test_storage_paths_reject_native_separator() {
        let (_hub, provider) = setup();
        let err = provider
            .put("a/b", "f", Vec::new(), PutOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidPath(_)));
    }
}
