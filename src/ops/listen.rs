//! Subscription operators: onValue, onChild*, off.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Map;
use tracing::debug;

use crate::backend::DbEvent;
use crate::errors::ProviderResult;
use crate::listeners::EventSpec;
use crate::path::{Query, QueryOptions, TreePath};
use crate::provider::Provider;
use crate::signal::merge_payload;

impl Provider {
    /// Forward value changes at `path` to `signal`
    ///
    /// The first native delivery is the backend's replay of current state;
    /// it is suppressed so the signal only ever sees changes. Callers that
    /// want the current state read it with [`Provider::value`] first.
    pub fn on_value(&self, path: &str, signal: &str, options: QueryOptions) -> ProviderResult<()> {
        let tree_path = TreePath::parse(path)?;
        let signals = Arc::clone(&self.signals);
        let signal_name = signal.to_string();
        let static_payload = options.payload.clone();
        let replayed = AtomicBool::new(false);

        let handle = self.db.listen(
            &Query::new(tree_path.clone(), options),
            DbEvent::Value,
            Box::new(move |snapshot| {
                if !replayed.swap(true, Ordering::SeqCst) {
                    return;
                }
                let mut payload = Map::new();
                payload.insert("value".to_string(), snapshot.value().clone());
                signals.invoke(&signal_name, merge_payload(payload, static_payload.as_ref()));
            }),
        )?;

        debug!(path = %tree_path, signal, "value listener registered");
        self.listeners.insert(tree_path.as_dots(), DbEvent::Value, handle)
    }

    /// Forward added children under `path` to `signal` as `{key, value}`
    pub fn on_child_added(
        &self,
        path: &str,
        signal: &str,
        options: QueryOptions,
    ) -> ProviderResult<()> {
        self.child_listener(path, signal, options, DbEvent::ChildAdded, true)
    }

    /// Forward changed children under `path` to `signal` as `{key, value}`
    pub fn on_child_changed(
        &self,
        path: &str,
        signal: &str,
        options: QueryOptions,
    ) -> ProviderResult<()> {
        self.child_listener(path, signal, options, DbEvent::ChildChanged, true)
    }

    /// Forward removed children under `path` to `signal` as `{key}`
    pub fn on_child_removed(
        &self,
        path: &str,
        signal: &str,
        options: QueryOptions,
    ) -> ProviderResult<()> {
        self.child_listener(path, signal, options, DbEvent::ChildRemoved, false)
    }

    fn child_listener(
        &self,
        path: &str,
        signal: &str,
        options: QueryOptions,
        event: DbEvent,
        include_value: bool,
    ) -> ProviderResult<()> {
        let tree_path = TreePath::parse(path)?;
        let signals = Arc::clone(&self.signals);
        let signal_name = signal.to_string();
        let static_payload = options.payload.clone();

        let handle = self.db.listen(
            &Query::new(tree_path.clone(), options),
            event,
            Box::new(move |snapshot| {
                let mut payload = Map::new();
                if let Some(key) = snapshot.key() {
                    payload.insert("key".to_string(), key.into());
                }
                if include_value {
                    payload.insert("value".to_string(), snapshot.value().clone());
                }
                signals.invoke(&signal_name, merge_payload(payload, static_payload.as_ref()));
            }),
        )?;

        debug!(path = %tree_path, signal, event = %event, "child listener registered");
        self.listeners.insert(tree_path.as_dots(), event, handle)
    }

    /// Detach listeners by path and event
    ///
    /// `event` of `None` or `"*"` targets every event; a path ending in
    /// `.*` (or the bare `*`) targets every registered path under the
    /// prefix. Fails when nothing matches.
    pub fn off(&self, path: &str, event: Option<&str>) -> ProviderResult<()> {
        let spec = EventSpec::parse(event)?;
        self.listeners.remove(path, spec)
    }
}
