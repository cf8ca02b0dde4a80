//! Durable task-queue enqueue.
//!
//! A task is a record pushed under the queue path carrying a `_state` tag
//! and the caller's auth token. An external worker owns the record from
//! there: completion is observed as the record's removal, failure as an
//! `_error_details` field appearing on it.

use std::sync::Mutex;

use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tracing::debug;

use crate::backend::DbEvent;
use crate::errors::{ProviderError, ProviderResult};
use crate::path::{Query, TreePath};
use crate::provider::Provider;

/// Host-framework execution metadata embedded as `_execution`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionDetails {
    pub id: String,
    pub function_index: u32,
}

impl Provider {
    /// Enqueue a task and wait for the worker's verdict
    ///
    /// Resolves once the record disappears; rejects with
    /// [`ProviderError::TaskFailed`] if `_error_details` appears first. The
    /// observation listener detaches on the first terminal transition, so
    /// the completion signal fires at most once.
    pub async fn task(
        &self,
        name: &str,
        payload: Map<String, Value>,
        execution: Option<ExecutionDetails>,
    ) -> ProviderResult<()> {
        let token = self.auth.id_token().await?;
        let tasks_path = TreePath::parse(&self.options.queue_path)?.child("tasks");

        let state = match &self.options.task_spec_prefix {
            Some(prefix) => format!("{prefix}_{name}"),
            None => name.to_string(),
        };

        let mut record = Map::new();
        record.insert("_state".to_string(), Value::String(state));
        record.insert("_token".to_string(), Value::String(token));
        if self.options.send_task_execution_details {
            if let Some(execution) = execution {
                record.insert(
                    "_execution".to_string(),
                    serde_json::json!({
                        "id": execution.id,
                        "function_index": execution.function_index,
                    }),
                );
            }
        }
        // Caller payload last; it may override the markers, as the host
        // framework's merge did.
        for (key, value) in payload {
            record.insert(key, value);
        }

        let key = self.db.push(&tasks_path, Value::Object(record)).await?;
        let record_path = tasks_path.child(&key);
        debug!(task = name, key = %key, "task enqueued");

        let (tx, rx) = oneshot::channel::<ProviderResult<()>>();
        let tx = Mutex::new(Some(tx));
        let task_name = name.to_string();

        let handle = self.db.listen(
            &Query::plain(record_path),
            DbEvent::Value,
            Box::new(move |snapshot| {
                let verdict = if !snapshot.exists() {
                    Some(Ok(()))
                } else {
                    snapshot.value().get("_error_details").map(|details| {
                        Err(ProviderError::TaskFailed {
                            name: task_name.clone(),
                            details: details.clone(),
                        })
                    })
                };
                if let Some(verdict) = verdict {
                    let sender = tx.lock().ok().and_then(|mut slot| slot.take());
                    if let Some(sender) = sender {
                        let _ = sender.send(verdict);
                    }
                }
            }),
        )?;

        let verdict = rx
            .await
            .map_err(|_| ProviderError::Backend("task observer dropped".to_string()))?;
        handle.detach();
        verdict
    }
}
