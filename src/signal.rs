//! # Signal Dispatch
//!
//! The seam toward the host framework: a signal is a named, invokable action
//! sequence that receives a JSON payload. Operators never call host code
//! directly; they route through a [`SignalRouter`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};
use tracing::warn;

/// Handler invoked when its signal fires
pub type SignalFn = dyn Fn(Value) + Send + Sync;

/// Named-action dispatch into the host framework
pub trait SignalRouter: Send + Sync {
    /// Fire the named signal with a JSON payload
    ///
    /// Delivery is fire-and-forget; failures never propagate back into the
    /// operator that triggered the signal.
    fn invoke(&self, name: &str, payload: Value);
}

/// A name-to-handler registry implementing [`SignalRouter`]
///
/// Handlers are stored as `Arc` closures; the lock is never held while a
/// handler runs, so a handler may register or remove signals.
#[derive(Default)]
pub struct SignalHub {
    handlers: RwLock<HashMap<String, Arc<SignalFn>>>,
}

impl SignalHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous handler of the same name
    pub fn register(&self, name: &str, handler: impl Fn(Value) + Send + Sync + 'static) {
        if let Ok(mut handlers) = self.handlers.write() {
            handlers.insert(name.to_string(), Arc::new(handler));
        }
    }

    /// Remove a handler; missing names are ignored
    pub fn unregister(&self, name: &str) {
        if let Ok(mut handlers) = self.handlers.write() {
            handlers.remove(name);
        }
    }
}

impl SignalRouter for SignalHub {
    fn invoke(&self, name: &str, payload: Value) {
        let handler = self
            .handlers
            .read()
            .ok()
            .and_then(|handlers| handlers.get(name).cloned());

        match handler {
            Some(handler) => handler(payload),
            None => warn!(signal = name, "dropping signal with no registered handler"),
        }
    }
}

impl std::fmt::Debug for SignalHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.handlers.read().map(|h| h.len()).unwrap_or(0);
        f.debug_struct("SignalHub").field("handlers", &count).finish()
    }
}

/// Merge a static caller payload into an event payload
///
/// Static payload keys win over event keys, matching the host framework's
/// merge direction.
pub fn merge_payload(mut event: Map<String, Value>, statik: Option<&Map<String, Value>>) -> Value {
    if let Some(statik) = statik {
        for (key, value) in statik {
            event.insert(key.clone(), value.clone());
        }
    }
    Value::Object(event)
}
