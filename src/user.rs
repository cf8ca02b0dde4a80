//! # User Profile
//!
//! The normalized projection of a backend user handed to callers after every
//! successful authentication flow.

use serde::{Deserialize, Serialize};

use crate::backend::AuthUser;

/// Identity attached by one sign-in provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderData {
    /// Provider identifier, e.g. `facebook.com`
    pub provider_id: String,

    /// Provider-scoped user id
    pub uid: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// Normalized user projection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub uid: String,
    pub is_anonymous: bool,
    pub provider_data: Vec<ProviderData>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub email_verified: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,

    /// OAuth access token, present only after a popup sign-in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl UserProfile {
    /// Attach the access token an OAuth popup flow returned
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token;
        self
    }
}

impl From<AuthUser> for UserProfile {
    fn from(user: AuthUser) -> Self {
        Self {
            uid: user.uid,
            is_anonymous: user.is_anonymous,
            provider_data: user.provider_data,
            display_name: user.display_name,
            email: user.email,
            email_verified: user.email_verified,
            photo_url: user.photo_url,
            access_token: None,
        }
    }
}
