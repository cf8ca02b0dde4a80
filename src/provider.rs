//! # Provider
//!
//! The constructed adapter object. It owns the backend handles, the signal
//! router, the listener registry and the single disconnect-write slot —
//! nothing in this crate is process-global. Operators live in [`crate::ops`]
//! as methods on this type.

use std::sync::{Arc, Mutex};

use crate::backend::{AuthClient, DisconnectHandle, FileStore, RealtimeDatabase};
use crate::listeners::ListenerRegistry;
use crate::signal::SignalRouter;

/// Behavior settings supplied at construction
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    /// Root location of the durable task queue
    pub queue_path: String,

    /// Prefix folded into every task's `_state` tag
    pub task_spec_prefix: Option<String>,

    /// Embed `_execution` metadata into queue tasks
    pub send_task_execution_details: bool,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            queue_path: "queue".to_string(),
            task_spec_prefix: None,
            send_task_execution_details: false,
        }
    }
}

/// The operator layer's entry point
pub struct Provider {
    pub(crate) db: Arc<dyn RealtimeDatabase>,
    pub(crate) auth: Arc<dyn AuthClient>,
    pub(crate) files: Arc<dyn FileStore>,
    pub(crate) signals: Arc<dyn SignalRouter>,
    pub(crate) listeners: ListenerRegistry,
    pub(crate) disconnect: Mutex<Option<DisconnectHandle>>,
    pub(crate) options: ProviderOptions,
}

impl Provider {
    pub fn new(
        db: Arc<dyn RealtimeDatabase>,
        auth: Arc<dyn AuthClient>,
        files: Arc<dyn FileStore>,
        signals: Arc<dyn SignalRouter>,
    ) -> Self {
        Self {
            db,
            auth,
            files,
            signals,
            listeners: ListenerRegistry::new(),
            disconnect: Mutex::new(None),
            options: ProviderOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ProviderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ProviderOptions {
        &self.options
    }

    /// Registered (path, event) pairs, for tests and diagnostics
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Tear the provider down: detach every listener and withdraw any
    /// pending disconnect write
    pub fn dispose(&self) {
        self.listeners.remove_all();
        let pending = self.disconnect.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = pending {
            handle.cancel();
        }
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("listeners", &self.listeners.len())
            .field("options", &self.options)
            .finish()
    }
}
