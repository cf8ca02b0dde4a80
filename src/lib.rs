//! signalfire - declarative operators over a realtime backend
//!
//! An adapter layer translating a realtime-database/auth/storage backend
//! into declarative operations for signal-driven applications: build a
//! reference from a dot-delimited logical path, call one backend method,
//! adapt the result into the shape the host framework expects.
//!
//! The backend itself sits behind the traits in [`backend`]; in-memory
//! reference implementations make the whole layer testable offline.

pub mod backend;
pub mod errors;
pub mod listeners;
pub mod ops;
pub mod path;
pub mod provider;
pub mod signal;
pub mod snapshot;
pub mod user;

pub use backend::{DbEvent, OAuthProvider, StoredFile, TransactionOutcome, UploadProgress};
pub use errors::{AuthError, AuthResult, ProviderError, ProviderResult};
pub use ops::auth::OAuthOptions;
pub use ops::{ExecutionDetails, PutOptions, ValueResult};
pub use path::{OrderBy, Query, QueryOptions, TreePath};
pub use provider::{Provider, ProviderOptions};
pub use signal::{SignalHub, SignalRouter};
pub use snapshot::{ChildEntry, Snapshot};
pub use user::{ProviderData, UserProfile};
