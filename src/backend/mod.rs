//! # Backend Traits
//!
//! The seam toward the wrapped realtime-database/auth/storage service. The
//! operator layer never speaks a wire protocol; it calls these traits and
//! adapts the results. In-memory reference implementations live alongside
//! the traits so the layer is testable without a network.

pub mod memory_auth;
pub mod memory_db;
pub mod memory_files;
pub mod push_id;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{AuthResult, ProviderResult};
use crate::path::{Query, TreePath};
use crate::snapshot::Snapshot;
use crate::user::ProviderData;

pub use memory_auth::MemoryAuth;
pub use memory_db::MemoryDatabase;
pub use memory_files::MemoryFiles;
pub use push_id::PushIdGenerator;

/// Subscription event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DbEvent {
    Value,
    ChildAdded,
    ChildChanged,
    ChildRemoved,
}

impl DbEvent {
    /// Native wire name of the event
    pub fn wire_name(&self) -> &'static str {
        match self {
            DbEvent::Value => "value",
            DbEvent::ChildAdded => "child_added",
            DbEvent::ChildChanged => "child_changed",
            DbEvent::ChildRemoved => "child_removed",
        }
    }

    /// Parse either an operator name (`onChildAdded`) or a wire name
    /// (`child_added`)
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "onValue" | "value" => Some(DbEvent::Value),
            "onChildAdded" | "child_added" => Some(DbEvent::ChildAdded),
            "onChildChanged" | "child_changed" => Some(DbEvent::ChildChanged),
            "onChildRemoved" | "child_removed" => Some(DbEvent::ChildRemoved),
            _ => None,
        }
    }

    /// Accepted event names, for error messages
    pub fn valid_names() -> &'static str {
        "onValue, onChildAdded, onChildChanged, onChildRemoved, *"
    }
}

impl fmt::Display for DbEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Callback invoked with each event delivery
pub type EventCallback = Box<dyn Fn(Snapshot) + Send + Sync>;

/// Pure transform applied by a transaction; `None` aborts
pub type TransformFn = Box<dyn Fn(Option<&Value>) -> Option<Value> + Send + Sync>;

/// Outcome of an optimistic-concurrency transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionOutcome {
    pub committed: bool,
    pub value: Value,
}

/// Handle to one active subscription
///
/// Detaching stops delivery; dropping without detaching leaves the
/// subscription live, mirroring the wrapped service.
pub struct ListenerHandle {
    id: u64,
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerHandle {
    pub fn new(id: u64, detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            detach: Some(Box::new(detach)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop delivery for this subscription
    pub fn detach(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle").field("id", &self.id).finish()
    }
}

/// Handle to one pending server-side disconnect write
pub struct DisconnectHandle {
    path: TreePath,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl DisconnectHandle {
    pub fn new(path: TreePath, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            path,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn path(&self) -> &TreePath {
        &self.path
    }

    /// Withdraw the pending write
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for DisconnectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisconnectHandle")
            .field("path", &self.path)
            .finish()
    }
}

/// Realtime tree store
#[async_trait]
pub trait RealtimeDatabase: Send + Sync {
    /// One-shot read, applying the query's ordering/bounds/limits
    async fn get(&self, query: &Query) -> ProviderResult<Snapshot>;

    /// Replace the value at `path`; `null` removes the location
    async fn set(&self, path: &TreePath, value: Value) -> ProviderResult<()>;

    /// Write several children of `path` without touching siblings
    async fn update(&self, path: &TreePath, values: Map<String, Value>) -> ProviderResult<()>;

    /// Remove the location
    async fn remove(&self, path: &TreePath) -> ProviderResult<()>;

    /// Append a child under a generated, time-ordered key; returns the key
    async fn push(&self, path: &TreePath, value: Value) -> ProviderResult<String>;

    /// Apply a pure transform to the current value
    async fn transaction(
        &self,
        path: &TreePath,
        transform: TransformFn,
    ) -> ProviderResult<TransactionOutcome>;

    /// Register a subscription
    ///
    /// Initial replay follows the wrapped service: `Value` fires immediately
    /// with current state, `ChildAdded` replays existing children in order,
    /// the other child events start silent.
    fn listen(
        &self,
        query: &Query,
        event: DbEvent,
        callback: EventCallback,
    ) -> ProviderResult<ListenerHandle>;

    /// Schedule a server-side write for when this connection drops
    fn on_disconnect_set(&self, path: &TreePath, value: Value)
        -> ProviderResult<DisconnectHandle>;
}

/// OAuth identity providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Facebook,
    Google,
    GitHub,
}

impl OAuthProvider {
    /// Provider identifier as it appears in provider data
    pub fn provider_id(&self) -> &'static str {
        match self {
            OAuthProvider::Facebook => "facebook.com",
            OAuthProvider::Google => "google.com",
            OAuthProvider::GitHub => "github.com",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.provider_id())
    }
}

/// The backend's native user record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
    pub is_anonymous: bool,
    pub provider_data: Vec<ProviderData>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub email_verified: bool,
    pub photo_url: Option<String>,
}

impl AuthUser {
    /// A bare anonymous user record
    pub fn anonymous(uid: String) -> Self {
        Self {
            uid,
            is_anonymous: true,
            provider_data: Vec::new(),
            display_name: None,
            email: None,
            email_verified: false,
            photo_url: None,
        }
    }
}

/// Result of a completed OAuth popup flow
#[derive(Debug, Clone)]
pub struct OAuthSignIn {
    pub user: AuthUser,
    pub access_token: Option<String>,
}

/// Authentication service
#[async_trait]
pub trait AuthClient: Send + Sync {
    async fn sign_in_anonymously(&self) -> AuthResult<AuthUser>;

    async fn create_user_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<AuthUser>;

    async fn sign_in_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<AuthUser>;

    async fn sign_in_with_custom_token(&self, token: &str) -> AuthResult<AuthUser>;

    /// Popup completion model: resolves once the popup finishes
    async fn sign_in_with_popup(
        &self,
        provider: OAuthProvider,
        scopes: &[String],
    ) -> AuthResult<OAuthSignIn>;

    /// Redirect completion model: resolves immediately with no user; the
    /// profile is observed later through an external auth-state subscription
    async fn sign_in_with_redirect(
        &self,
        provider: OAuthProvider,
        scopes: &[String],
    ) -> AuthResult<()>;

    async fn link_with_popup(
        &self,
        provider: OAuthProvider,
        scopes: &[String],
    ) -> AuthResult<OAuthSignIn>;

    async fn link_with_redirect(
        &self,
        provider: OAuthProvider,
        scopes: &[String],
    ) -> AuthResult<()>;

    async fn send_password_reset_email(&self, email: &str) -> AuthResult<()>;

    async fn sign_out(&self) -> AuthResult<()>;

    /// Re-verify the current user's password ahead of a sensitive operation
    async fn reauthenticate(&self, password: &str) -> AuthResult<()>;

    /// Delete the current user's account
    async fn delete_user(&self) -> AuthResult<()>;

    /// Currently signed-in user, if any
    fn current_user(&self) -> Option<AuthUser>;

    /// Auth token for the current user, embedded into queue tasks
    async fn id_token(&self) -> AuthResult<String>;
}

/// Transfer-progress metadata handed to upload callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UploadProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    /// Progress as a 0-100 percentage
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            100.0
        } else {
            self.bytes_transferred as f64 / self.total_bytes as f64 * 100.0
        }
    }
}

/// Callback invoked per upload progress tick
pub type ProgressFn = Box<dyn Fn(UploadProgress) + Send + Sync>;

/// A stored file's resolved location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub url: String,
    pub filename: String,
}

/// File storage service
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Upload `data` under `path/filename`
    async fn put(
        &self,
        path: &TreePath,
        filename: &str,
        data: Vec<u8>,
        progress: Option<ProgressFn>,
    ) -> ProviderResult<StoredFile>;

    /// Delete `path/filename`
    async fn delete(&self, path: &TreePath, filename: &str) -> ProviderResult<()>;

    /// Resolve the download URL for `path/filename`
    async fn download_url(&self, path: &TreePath, filename: &str) -> ProviderResult<String>;
}
