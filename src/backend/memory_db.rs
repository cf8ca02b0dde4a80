//! # In-Memory Database
//!
//! Reference implementation of [`RealtimeDatabase`] over a JSON tree.
//! Mutations diff the subtree under every registered listener to decide
//! which events to deliver, so subscription semantics match the wrapped
//! service: per-path delivery in mutation order, value events on any
//! subtree change, child events from the child-map diff.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::{ProviderError, ProviderResult};
use crate::path::{OrderBy, Query, QueryOptions, TreePath};
use crate::snapshot::Snapshot;

use super::{
    DbEvent, DisconnectHandle, EventCallback, ListenerHandle, PushIdGenerator, RealtimeDatabase,
    TransactionOutcome, TransformFn,
};

type SharedCallback = Arc<dyn Fn(Snapshot) + Send + Sync>;

struct RegisteredListener {
    id: u64,
    path: TreePath,
    options: QueryOptions,
    event: DbEvent,
    callback: SharedCallback,
}

/// In-memory realtime database
pub struct MemoryDatabase {
    root: RwLock<Value>,
    listeners: Arc<Mutex<Vec<RegisteredListener>>>,
    pending_disconnect: Arc<Mutex<Vec<(u64, TreePath, Value)>>>,
    push_ids: PushIdGenerator,
    next_id: AtomicU64,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self {
            root: RwLock::new(Value::Null),
            listeners: Arc::new(Mutex::new(Vec::new())),
            pending_disconnect: Arc::new(Mutex::new(Vec::new())),
            push_ids: PushIdGenerator::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of live subscriptions, for tests
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }

    /// Number of pending disconnect writes, for tests
    pub fn pending_disconnect_count(&self) -> usize {
        self.pending_disconnect.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Test hook: drop the connection, applying every pending disconnect
    /// write in registration order
    pub fn simulate_disconnect(&self) -> ProviderResult<()> {
        let writes: Vec<(TreePath, Value)> = {
            let mut pending = self
                .pending_disconnect
                .lock()
                .map_err(|_| ProviderError::Backend("disconnect lock poisoned".to_string()))?;
            pending.drain(..).map(|(_, path, value)| (path, value)).collect()
        };
        debug!(writes = writes.len(), "applying disconnect writes");
        for (path, value) in writes {
            self.mutate(|root| write_at(root, &path.segments(), value))?;
        }
        Ok(())
    }

    fn mutate(&self, apply: impl FnOnce(&mut Value)) -> ProviderResult<()> {
        let (old_root, new_root) = {
            let mut root = self
                .root
                .write()
                .map_err(|_| ProviderError::Backend("tree lock poisoned".to_string()))?;
            let old = root.clone();
            apply(&mut root);
            prune(&mut root);
            (old, root.clone())
        };
        self.dispatch(&old_root, &new_root);
        Ok(())
    }

    /// Deliver events to every listener whose subtree changed
    ///
    /// The listener list is snapshotted before delivery; callbacks may
    /// detach handles without deadlocking. Each listener's query options
    /// are applied first, so filtered subscriptions only see children
    /// inside their window.
    fn dispatch(&self, old_root: &Value, new_root: &Value) {
        let listeners: Vec<(SharedCallback, DbEvent, TreePath, QueryOptions)> =
            match self.listeners.lock() {
                Ok(guard) => guard
                    .iter()
                    .map(|l| {
                        (
                            Arc::clone(&l.callback),
                            l.event,
                            l.path.clone(),
                            l.options.clone(),
                        )
                    })
                    .collect(),
                Err(_) => return,
            };

        for (callback, event, path, options) in listeners {
            let old_sub = value_at(old_root, &path.segments()).cloned().unwrap_or(Value::Null);
            let new_sub = value_at(new_root, &path.segments()).cloned().unwrap_or(Value::Null);
            if old_sub == new_sub {
                continue;
            }

            let old_view = listener_view(&path, old_sub, &options);
            let new_view = listener_view(&path, new_sub, &options);

            match event {
                DbEvent::Value => {
                    if old_view.value() != new_view.value() {
                        callback(new_view);
                    }
                }
                DbEvent::ChildAdded => {
                    let before = old_view.children();
                    for (key, value) in new_view.children() {
                        if !before.iter().any(|(k, _)| *k == key) {
                            callback(Snapshot::new(Some(key), value));
                        }
                    }
                }
                DbEvent::ChildChanged => {
                    let before = old_view.children();
                    for (key, value) in new_view.children() {
                        let previous = before.iter().find(|(k, _)| *k == key);
                        if matches!(previous, Some((_, old)) if *old != value) {
                            callback(Snapshot::new(Some(key), value));
                        }
                    }
                }
                DbEvent::ChildRemoved => {
                    let after = new_view.children();
                    for (key, value) in old_view.children() {
                        if !after.iter().any(|(k, _)| *k == key) {
                            callback(Snapshot::new(Some(key), value));
                        }
                    }
                }
            }
        }
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDatabase")
            .field("listeners", &self.listener_count())
            .field("pending_disconnect", &self.pending_disconnect_count())
            .finish()
    }
}

#[async_trait]
impl RealtimeDatabase for MemoryDatabase {
    async fn get(&self, query: &Query) -> ProviderResult<Snapshot> {
        let root = self
            .root
            .read()
            .map_err(|_| ProviderError::Backend("tree lock poisoned".to_string()))?;
        let key = query.path.key().map(str::to_string);
        let value = value_at(&root, &query.path.segments())
            .cloned()
            .unwrap_or(Value::Null);

        if query.options.is_plain() {
            Ok(Snapshot::new(key, value))
        } else {
            Ok(apply_query(key, value, &query.options))
        }
    }

    async fn set(&self, path: &TreePath, value: Value) -> ProviderResult<()> {
        self.mutate(|root| write_at(root, &path.segments(), value))
    }

    async fn update(&self, path: &TreePath, values: Map<String, Value>) -> ProviderResult<()> {
        self.mutate(|root| {
            for (child, value) in values {
                // Update keys may themselves be dotted sub-paths.
                write_at(root, &path.child(&child).segments(), value);
            }
        })
    }

    async fn remove(&self, path: &TreePath) -> ProviderResult<()> {
        self.mutate(|root| write_at(root, &path.segments(), Value::Null))
    }

    async fn push(&self, path: &TreePath, value: Value) -> ProviderResult<String> {
        let key = self.push_ids.next_id();
        self.mutate(|root| write_at(root, &path.child(&key).segments(), value))?;
        Ok(key)
    }

    async fn transaction(
        &self,
        path: &TreePath,
        transform: TransformFn,
    ) -> ProviderResult<TransactionOutcome> {
        let (outcome, old_root, new_root) = {
            let mut root = self
                .root
                .write()
                .map_err(|_| ProviderError::Backend("tree lock poisoned".to_string()))?;
            let old = root.clone();
            let current = value_at(&root, &path.segments()).cloned();

            match transform(current.as_ref()) {
                Some(next) => {
                    write_at(&mut root, &path.segments(), next.clone());
                    prune(&mut root);
                    (
                        TransactionOutcome {
                            committed: true,
                            value: next,
                        },
                        old,
                        root.clone(),
                    )
                }
                None => {
                    let value = current.unwrap_or(Value::Null);
                    (
                        TransactionOutcome {
                            committed: false,
                            value,
                        },
                        old.clone(),
                        old,
                    )
                }
            }
        };
        self.dispatch(&old_root, &new_root);
        Ok(outcome)
    }

    fn listen(
        &self,
        query: &Query,
        event: DbEvent,
        callback: EventCallback,
    ) -> ProviderResult<ListenerHandle> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let callback: SharedCallback = Arc::from(callback);
        let path = query.path.clone();
        let options = query.options.clone();

        // Initial replay happens before registration so the listener never
        // sees its own replay twice. The tree lock is released before the
        // callback runs so the callback may read or write freely.
        let current = {
            let root = self
                .root
                .read()
                .map_err(|_| ProviderError::Backend("tree lock poisoned".to_string()))?;
            value_at(&root, &path.segments()).cloned().unwrap_or(Value::Null)
        };
        let view = listener_view(&path, current, &options);
        match event {
            DbEvent::Value => {
                callback(view);
            }
            DbEvent::ChildAdded => {
                for (key, value) in view.children() {
                    callback(Snapshot::new(Some(key), value));
                }
            }
            DbEvent::ChildChanged | DbEvent::ChildRemoved => {}
        }

        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(RegisteredListener {
                id,
                path,
                options,
                event,
                callback,
            });
        }

        let listeners = Arc::clone(&self.listeners);
        Ok(ListenerHandle::new(id, move || {
            if let Ok(mut listeners) = listeners.lock() {
                listeners.retain(|l| l.id != id);
            }
        }))
    }

    fn on_disconnect_set(
        &self,
        path: &TreePath,
        value: Value,
    ) -> ProviderResult<DisconnectHandle> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.pending_disconnect
            .lock()
            .map_err(|_| ProviderError::Backend("disconnect lock poisoned".to_string()))?
            .push((id, path.clone(), value));

        let pending = Arc::clone(&self.pending_disconnect);
        Ok(DisconnectHandle::new(path.clone(), move || {
            if let Ok(mut pending) = pending.lock() {
                pending.retain(|(pid, _, _)| *pid != id);
            }
        }))
    }
}

/// Walk to the value under `segments`
fn value_at<'a>(node: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    let mut current = node;
    for segment in segments {
        current = current.as_object()?.get(*segment)?;
    }
    Some(current)
}

/// Write `value` at `segments`, creating intermediate objects; `null`
/// removes the location
fn write_at(node: &mut Value, segments: &[&str], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let Some(map) = node.as_object_mut() else {
        return;
    };

    if rest.is_empty() {
        if value.is_null() {
            map.remove(*first);
        } else {
            map.insert((*first).to_string(), value);
        }
    } else {
        let child = map
            .entry((*first).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        write_at(child, rest, value);
    }
}

/// Collapse empty objects to null, bottom-up; returns true when `node`
/// ended up null
fn prune(node: &mut Value) -> bool {
    if let Value::Object(map) = node {
        let empty_keys: Vec<String> = map
            .iter_mut()
            .filter_map(|(key, child)| prune(child).then(|| key.clone()))
            .collect();
        for key in empty_keys {
            map.remove(&key);
        }
        if map.is_empty() {
            *node = Value::Null;
        }
    }
    node.is_null()
}

fn entries(value: &Value) -> Vec<(String, Value)> {
    match value {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        _ => Vec::new(),
    }
}

/// The subtree as a given listener sees it: the raw value for plain
/// queries, the ordered and bounded window otherwise
fn listener_view(path: &TreePath, value: Value, options: &QueryOptions) -> Snapshot {
    let key = path.key().map(str::to_string);
    if options.is_plain() {
        Snapshot::new(key, value)
    } else {
        apply_query(key, value, options)
    }
}

/// Order, bound and limit children per the query options
fn apply_query(key: Option<String>, value: Value, options: &QueryOptions) -> Snapshot {
    let order = options.order_by.clone().unwrap_or(OrderBy::Key);
    let target = |child_key: &str, child: &Value| -> Value {
        match &order {
            OrderBy::Key => Value::String(child_key.to_string()),
            OrderBy::Value => child.clone(),
            OrderBy::Child(field) => child.get(field).cloned().unwrap_or(Value::Null),
        }
    };

    let mut pairs = entries(&value);
    pairs.sort_by(|a, b| {
        compare_values(&target(&a.0, &a.1), &target(&b.0, &b.1)).then_with(|| a.0.cmp(&b.0))
    });

    if let Some(equal) = &options.equal_to {
        pairs.retain(|(k, v)| compare_values(&target(k, v), equal) == CmpOrdering::Equal);
    } else {
        if let Some(start) = &options.start_at {
            pairs.retain(|(k, v)| compare_values(&target(k, v), start) != CmpOrdering::Less);
        }
        if let Some(end) = &options.end_at {
            pairs.retain(|(k, v)| compare_values(&target(k, v), end) != CmpOrdering::Greater);
        }
    }

    if let Some(count) = options.limit_to_first {
        pairs.truncate(count);
    }
    if let Some(count) = options.limit_to_last {
        if pairs.len() > count {
            pairs.drain(..pairs.len() - count);
        }
    }

    let mut map = Map::new();
    for (k, v) in &pairs {
        map.insert(k.clone(), v.clone());
    }
    let value = if map.is_empty() {
        Value::Null
    } else {
        Value::Object(map)
    };
    Snapshot::with_order(key, value, pairs)
}

/// Total order over JSON values: null < false < true < numbers < strings,
/// objects last
fn compare_values(a: &Value, b: &Value) -> CmpOrdering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(false) => 1,
            Value::Bool(true) => 2,
            Value::Number(_) => 3,
            Value::String(_) => 4,
            _ => 5,
        }
    }

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
