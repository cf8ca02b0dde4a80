//! # In-Memory Auth
//!
//! Reference implementation of [`AuthClient`]: an email-keyed user table,
//! anonymous users, custom-token and OAuth simulation with staging hooks
//! for tests.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::errors::{AuthError, AuthResult};
use crate::user::ProviderData;

use super::{AuthClient, AuthUser, OAuthProvider, OAuthSignIn};

#[derive(Debug, Clone)]
struct EmailAccount {
    uid: String,
    password: String,
}

/// Staged outcome for a popup/redirect flow
#[derive(Debug, Clone)]
struct StagedOAuth {
    user: AuthUser,
    access_token: Option<String>,
}

/// In-memory authentication service
#[derive(Debug, Default)]
pub struct MemoryAuth {
    users: RwLock<HashMap<String, AuthUser>>,
    accounts: RwLock<HashMap<String, EmailAccount>>,
    custom_tokens: RwLock<HashMap<String, String>>,
    staged_oauth: RwLock<HashMap<OAuthProvider, StagedOAuth>>,
    reset_emails: RwLock<Vec<String>>,
    current: RwLock<Option<String>>,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: make `token` sign in as a fresh user with the given uid
    pub fn register_custom_token(&self, token: &str, uid: &str) {
        if let Ok(mut tokens) = self.custom_tokens.write() {
            tokens.insert(token.to_string(), uid.to_string());
        }
    }

    /// Test hook: stage the user an OAuth popup/redirect will produce
    pub fn stage_oauth_user(
        &self,
        provider: OAuthProvider,
        user: AuthUser,
        access_token: Option<String>,
    ) {
        if let Ok(mut staged) = self.staged_oauth.write() {
            staged.insert(
                provider,
                StagedOAuth {
                    user,
                    access_token,
                },
            );
        }
    }

    /// Test hook: password-reset emails recorded so far
    pub fn reset_emails(&self) -> Vec<String> {
        self.reset_emails.read().map(|e| e.clone()).unwrap_or_default()
    }

    fn store_user(&self, user: AuthUser) -> AuthResult<()> {
        self.users
            .write()
            .map_err(|_| AuthError::Backend("user lock poisoned".to_string()))?
            .insert(user.uid.clone(), user);
        Ok(())
    }

    fn set_current(&self, uid: Option<String>) -> AuthResult<()> {
        *self
            .current
            .write()
            .map_err(|_| AuthError::Backend("session lock poisoned".to_string()))? = uid;
        Ok(())
    }

    fn current_uid(&self) -> Option<String> {
        self.current.read().ok().and_then(|c| c.clone())
    }

    fn take_staged(&self, provider: OAuthProvider) -> AuthResult<StagedOAuth> {
        self.staged_oauth
            .read()
            .map_err(|_| AuthError::Backend("oauth lock poisoned".to_string()))?
            .get(&provider)
            .cloned()
            .ok_or_else(|| AuthError::ProviderUnavailable(provider.to_string()))
    }
}

#[async_trait]
impl AuthClient for MemoryAuth {
    async fn sign_in_anonymously(&self) -> AuthResult<AuthUser> {
        let user = AuthUser::anonymous(Uuid::new_v4().to_string());
        self.store_user(user.clone())?;
        self.set_current(Some(user.uid.clone()))?;
        debug!(uid = %user.uid, "anonymous sign-in");
        Ok(user)
    }

    async fn create_user_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<AuthUser> {
        {
            let accounts = self
                .accounts
                .read()
                .map_err(|_| AuthError::Backend("account lock poisoned".to_string()))?;
            if accounts.contains_key(email) {
                return Err(AuthError::EmailAlreadyExists);
            }
        }

        let uid = Uuid::new_v4().to_string();
        let user = AuthUser {
            uid: uid.clone(),
            is_anonymous: false,
            provider_data: vec![ProviderData {
                provider_id: "password".to_string(),
                uid: email.to_string(),
                email: Some(email.to_string()),
                ..Default::default()
            }],
            display_name: None,
            email: Some(email.to_string()),
            email_verified: false,
            photo_url: None,
        };

        self.accounts
            .write()
            .map_err(|_| AuthError::Backend("account lock poisoned".to_string()))?
            .insert(
                email.to_string(),
                EmailAccount {
                    uid: uid.clone(),
                    password: password.to_string(),
                },
            );
        self.store_user(user.clone())?;
        self.set_current(Some(uid))?;
        Ok(user)
    }

    async fn sign_in_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<AuthUser> {
        let uid = {
            let accounts = self
                .accounts
                .read()
                .map_err(|_| AuthError::Backend("account lock poisoned".to_string()))?;
            match accounts.get(email) {
                Some(account) if account.password == password => account.uid.clone(),
                _ => return Err(AuthError::InvalidCredentials),
            }
        };

        let user = self
            .users
            .read()
            .map_err(|_| AuthError::Backend("user lock poisoned".to_string()))?
            .get(&uid)
            .cloned()
            .ok_or(AuthError::UserNotFound)?;
        self.set_current(Some(uid))?;
        Ok(user)
    }

    async fn sign_in_with_custom_token(&self, token: &str) -> AuthResult<AuthUser> {
        let uid = self
            .custom_tokens
            .read()
            .map_err(|_| AuthError::Backend("token lock poisoned".to_string()))?
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)?;

        let existing = self
            .users
            .read()
            .map_err(|_| AuthError::Backend("user lock poisoned".to_string()))?
            .get(&uid)
            .cloned();
        let user = match existing {
            Some(user) => user,
            None => {
                let mut user = AuthUser::anonymous(uid.clone());
                user.is_anonymous = false;
                self.store_user(user.clone())?;
                user
            }
        };
        self.set_current(Some(uid))?;
        Ok(user)
    }

    async fn sign_in_with_popup(
        &self,
        provider: OAuthProvider,
        _scopes: &[String],
    ) -> AuthResult<OAuthSignIn> {
        let staged = self.take_staged(provider)?;
        self.store_user(staged.user.clone())?;
        self.set_current(Some(staged.user.uid.clone()))?;
        debug!(provider = %provider, uid = %staged.user.uid, "popup sign-in");
        Ok(OAuthSignIn {
            user: staged.user,
            access_token: staged.access_token,
        })
    }

    async fn sign_in_with_redirect(
        &self,
        provider: OAuthProvider,
        _scopes: &[String],
    ) -> AuthResult<()> {
        // The redirect leaves the app; completion is observed out of band.
        // Staging must exist so the flow is at least addressable.
        let staged = self.take_staged(provider)?;
        self.store_user(staged.user.clone())?;
        self.set_current(Some(staged.user.uid))?;
        Ok(())
    }

    async fn link_with_popup(
        &self,
        provider: OAuthProvider,
        _scopes: &[String],
    ) -> AuthResult<OAuthSignIn> {
        let uid = self.current_uid().ok_or(AuthError::SignedOut)?;
        let staged = self.take_staged(provider)?;

        let mut users = self
            .users
            .write()
            .map_err(|_| AuthError::Backend("user lock poisoned".to_string()))?;
        let user = users.get_mut(&uid).ok_or(AuthError::UserNotFound)?;

        if user
            .provider_data
            .iter()
            .any(|p| p.provider_id == provider.provider_id())
        {
            return Err(AuthError::CredentialInUse);
        }

        user.provider_data.push(ProviderData {
            provider_id: provider.provider_id().to_string(),
            uid: staged.user.uid.clone(),
            display_name: staged.user.display_name.clone(),
            email: staged.user.email.clone(),
            photo_url: staged.user.photo_url.clone(),
        });
        user.is_anonymous = false;

        Ok(OAuthSignIn {
            user: user.clone(),
            access_token: staged.access_token,
        })
    }

    async fn link_with_redirect(
        &self,
        provider: OAuthProvider,
        scopes: &[String],
    ) -> AuthResult<()> {
        self.link_with_popup(provider, scopes).await.map(|_| ())
    }

    async fn send_password_reset_email(&self, email: &str) -> AuthResult<()> {
        let known = self
            .accounts
            .read()
            .map_err(|_| AuthError::Backend("account lock poisoned".to_string()))?
            .contains_key(email);
        if !known {
            return Err(AuthError::UserNotFound);
        }
        self.reset_emails
            .write()
            .map_err(|_| AuthError::Backend("reset lock poisoned".to_string()))?
            .push(email.to_string());
        Ok(())
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.set_current(None)
    }

    async fn reauthenticate(&self, password: &str) -> AuthResult<()> {
        let uid = self.current_uid().ok_or(AuthError::SignedOut)?;
        let accounts = self
            .accounts
            .read()
            .map_err(|_| AuthError::Backend("account lock poisoned".to_string()))?;
        let matches = accounts
            .values()
            .any(|account| account.uid == uid && account.password == password);
        if matches {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    async fn delete_user(&self) -> AuthResult<()> {
        let uid = self.current_uid().ok_or(AuthError::SignedOut)?;
        self.users
            .write()
            .map_err(|_| AuthError::Backend("user lock poisoned".to_string()))?
            .remove(&uid);
        if let Ok(mut accounts) = self.accounts.write() {
            accounts.retain(|_, account| account.uid != uid);
        }
        self.set_current(None)
    }

    fn current_user(&self) -> Option<AuthUser> {
        let uid = self.current_uid()?;
        self.users.read().ok()?.get(&uid).cloned()
    }

    async fn id_token(&self) -> AuthResult<String> {
        let uid = self.current_uid().ok_or(AuthError::SignedOut)?;
        Ok(format!("idtoken-{uid}"))
    }
}
