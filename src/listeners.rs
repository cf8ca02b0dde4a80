//! # Listener Registry
//!
//! Bookkeeping for active subscriptions so they can be torn down by logical
//! path and event, including wildcard teardown over a path prefix. The
//! registry owns nothing but handles; delivery stays with the backend.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use crate::backend::{DbEvent, ListenerHandle};
use crate::errors::{ProviderError, ProviderResult};
use crate::path::PATH_DELIMITER;

/// Wildcard marker accepted as a trailing path segment or event name
pub const WILDCARD: &str = "*";

/// Which listeners a teardown targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSpec {
    /// One exact event
    Exact(DbEvent),
    /// Every event under the path
    All,
}

impl EventSpec {
    /// Parse an optional event name; `None` and `"*"` mean every event
    pub fn parse(event: Option<&str>) -> ProviderResult<Self> {
        match event {
            None => Ok(EventSpec::All),
            Some(WILDCARD) => Ok(EventSpec::All),
            Some(name) => DbEvent::parse(name).map(EventSpec::Exact).ok_or_else(|| {
                ProviderError::InvalidEvent(name.to_string(), DbEvent::valid_names().to_string())
            }),
        }
    }
}

/// Registry of active subscription handles keyed by (path, event)
///
/// Invariant: no empty buckets. Removing the last handle of a pair removes
/// the pair; removing the last pair of a path removes the path.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    entries: Mutex<HashMap<String, HashMap<DbEvent, Vec<ListenerHandle>>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new handle under (path, event)
    ///
    /// A poisoned lock is an error: dropping the handle here would leave
    /// the backend subscription live but untrackable.
    pub fn insert(&self, path: &str, event: DbEvent, handle: ListenerHandle) -> ProviderResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ProviderError::Backend("registry lock poisoned".to_string()))?;
        entries
            .entry(path.to_string())
            .or_default()
            .entry(event)
            .or_default()
            .push(handle);
        Ok(())
    }

    /// Detach and forget listeners
    ///
    /// A path ending in the wildcard segment targets every registered path
    /// sharing the prefix. With [`EventSpec::Exact`], every targeted path
    /// must have listeners for that event; with [`EventSpec::All`], every
    /// event under each targeted path is detached.
    pub fn remove(&self, path: &str, spec: EventSpec) -> ProviderResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ProviderError::Backend("registry lock poisoned".to_string()))?;

        let (target_path, is_wildcard) = split_wildcard(path);

        let hit_paths: Vec<String> = if is_wildcard {
            entries
                .keys()
                .filter(|registered| matches_prefix(registered, target_path))
                .cloned()
                .collect()
        } else if entries.contains_key(target_path) {
            vec![target_path.to_string()]
        } else {
            Vec::new()
        };

        if hit_paths.is_empty() {
            return Err(ProviderError::NoListeners(target_path.to_string()));
        }

        for hit in &hit_paths {
            let Some(buckets) = entries.get_mut(hit) else {
                continue;
            };
            match spec {
                EventSpec::All => {
                    for (_, handles) in buckets.drain() {
                        for handle in handles {
                            handle.detach();
                        }
                    }
                }
                EventSpec::Exact(event) => {
                    let Some(handles) = buckets.remove(&event) else {
                        return Err(ProviderError::NoListenersForEvent(
                            target_path.to_string(),
                            event.wire_name().to_string(),
                        ));
                    };
                    for handle in handles {
                        handle.detach();
                    }
                }
            }
            if buckets.is_empty() {
                entries.remove(hit);
            }
        }

        debug!(path = target_path, paths = hit_paths.len(), "detached listeners");
        Ok(())
    }

    /// Detach everything; empty registries are fine
    pub fn remove_all(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            for (_, buckets) in entries.drain() {
                for (_, handles) in buckets {
                    for handle in handles {
                        handle.detach();
                    }
                }
            }
        }
    }

    /// Number of registered (path, event) pairs
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.values().map(|buckets| buckets.len()).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether (path, event) currently holds any handles
    pub fn contains(&self, path: &str, event: DbEvent) -> bool {
        self.entries
            .lock()
            .map(|entries| {
                entries
                    .get(path)
                    .map(|buckets| buckets.contains_key(&event))
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }
}

/// Strip a trailing wildcard segment; `"a.b.*"` → (`"a.b"`, true),
/// `"*"` → (`""`, true)
fn split_wildcard(path: &str) -> (&str, bool) {
    if path == WILDCARD {
        ("", true)
    } else if let Some(prefix) = path.strip_suffix(".*") {
        (prefix, true)
    } else {
        (path, false)
    }
}

/// Prefix match on whole segments
fn matches_prefix(registered: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    registered == prefix
        || registered.starts_with(&format!("{}{}", prefix, PATH_DELIMITER))
}
