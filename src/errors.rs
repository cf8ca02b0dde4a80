//! # Error Types
//!
//! The two error kinds surfaced by the operator layer: a generic provider
//! error for database/storage/registry failures and an authentication error
//! for sign-in/sign-up/link flows. Nothing is retried internally; every
//! failure is handed straight back to the caller.

use thiserror::Error;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Result type for authentication flows
pub type AuthResult<T> = Result<T, AuthError>;

/// Generic provider errors
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    // ==================
    // Path Errors
    // ==================
    /// Logical path contains the native separator
    #[error("The path \"{0}\" is not valid. Use dot notation instead of \"/\"")]
    InvalidPath(String),

    /// Unknown subscription event name
    #[error("The event \"{0}\" is not a valid event. Use: {1}")]
    InvalidEvent(String, String),

    // ==================
    // Registry Errors
    // ==================
    /// No listeners registered under the path
    #[error("The path \"{0}\" has no listeners")]
    NoListeners(String),

    /// Path is registered, but not for the requested event
    #[error("The path \"{0}\" has no listeners for \"{1}\"")]
    NoListenersForEvent(String, String),

    // ==================
    // Disconnect Errors
    // ==================
    /// A disconnect write is already pending
    #[error("You already have a disconnect write registered")]
    DisconnectAlreadySet,

    /// Cancel requested with no pending disconnect write
    #[error("You have no disconnect write registered")]
    NoDisconnectSet,

    // ==================
    // Task Errors
    // ==================
    /// A queue worker reported failure through `_error_details`
    #[error("Task \"{name}\" failed: {details}")]
    TaskFailed {
        name: String,
        details: serde_json::Value,
    },

    // ==================
    // Backend Errors
    // ==================
    /// File storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Any other backend failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Authentication failure surfaced through a mixed pipeline
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),
}

/// Authentication errors
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Operation requires a signed-in user
    #[error("No user is signed in")]
    SignedOut,

    /// Wrong email/password combination (generic, never leaks which)
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Email already registered
    #[error("Email already registered")]
    EmailAlreadyExists,

    /// No account for the given identifier
    #[error("User not found")]
    UserNotFound,

    /// Custom token rejected
    #[error("Invalid or expired token")]
    InvalidToken,

    /// OAuth popup dismissed before completing
    #[error("Sign-in popup was closed before completing")]
    PopupClosed,

    /// OAuth provider not configured or reachable
    #[error("Provider \"{0}\" is not available")]
    ProviderUnavailable(String),

    /// Credential already linked to another account
    #[error("Credential is already linked to another account")]
    CredentialInUse,

    /// Sensitive operation requires fresh credentials
    #[error("This operation requires a recent sign-in")]
    RequiresRecentLogin,

    /// Any other backend failure during an auth flow
    #[error("Backend error: {0}")]
    Backend(String),
}
