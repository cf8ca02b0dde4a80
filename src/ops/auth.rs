//! Authentication flow operators.
//!
//! One operation per flow; every success normalizes the backend user into a
//! [`UserProfile`], every failure is an [`AuthError`] distinct from the
//! generic provider error.

use tracing::debug;

use crate::backend::OAuthProvider;
use crate::errors::{AuthError, AuthResult};
use crate::provider::Provider;
use crate::user::UserProfile;

/// Options for OAuth sign-in and linking
#[derive(Debug, Clone, Default)]
pub struct OAuthOptions {
    /// Complete via redirect instead of popup
    pub redirect: bool,
    /// Extra scopes requested from the provider
    pub scopes: Vec<String>,
}

impl Provider {
    /// Profile of the currently signed-in user
    pub fn get_user(&self) -> AuthResult<UserProfile> {
        self.auth
            .current_user()
            .map(UserProfile::from)
            .ok_or(AuthError::SignedOut)
    }

    pub async fn sign_in_anonymously(&self) -> AuthResult<UserProfile> {
        let user = self.auth.sign_in_anonymously().await?;
        Ok(UserProfile::from(user))
    }

    pub async fn create_user_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<UserProfile> {
        let user = self
            .auth
            .create_user_with_email_and_password(email, password)
            .await?;
        Ok(UserProfile::from(user))
    }

    pub async fn sign_in_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<UserProfile> {
        let user = self
            .auth
            .sign_in_with_email_and_password(email, password)
            .await?;
        Ok(UserProfile::from(user))
    }

    pub async fn sign_in_with_custom_token(&self, token: &str) -> AuthResult<UserProfile> {
        let user = self.auth.sign_in_with_custom_token(token).await?;
        Ok(UserProfile::from(user))
    }

    /// OAuth sign-in
    ///
    /// Popup completion resolves with the profile. Redirect completion
    /// resolves with `None` immediately; the profile is observed later via
    /// the embedder's auth-state subscription.
    pub async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        options: OAuthOptions,
    ) -> AuthResult<Option<UserProfile>> {
        if options.redirect {
            self.auth
                .sign_in_with_redirect(provider, &options.scopes)
                .await?;
            debug!(provider = %provider, "redirect sign-in started");
            return Ok(None);
        }

        let signed_in = self.auth.sign_in_with_popup(provider, &options.scopes).await?;
        Ok(Some(
            UserProfile::from(signed_in.user).with_access_token(signed_in.access_token),
        ))
    }

    pub async fn sign_in_with_facebook(
        &self,
        options: OAuthOptions,
    ) -> AuthResult<Option<UserProfile>> {
        self.sign_in_with_oauth(OAuthProvider::Facebook, options).await
    }

    pub async fn sign_in_with_google(
        &self,
        options: OAuthOptions,
    ) -> AuthResult<Option<UserProfile>> {
        self.sign_in_with_oauth(OAuthProvider::Google, options).await
    }

    pub async fn sign_in_with_github(
        &self,
        options: OAuthOptions,
    ) -> AuthResult<Option<UserProfile>> {
        self.sign_in_with_oauth(OAuthProvider::GitHub, options).await
    }

    /// Attach an OAuth credential to the current account
    pub async fn link_with_oauth(
        &self,
        provider: OAuthProvider,
        options: OAuthOptions,
    ) -> AuthResult<Option<UserProfile>> {
        if options.redirect {
            self.auth.link_with_redirect(provider, &options.scopes).await?;
            return Ok(None);
        }

        let linked = self.auth.link_with_popup(provider, &options.scopes).await?;
        Ok(Some(
            UserProfile::from(linked.user).with_access_token(linked.access_token),
        ))
    }

    pub async fn link_with_facebook(
        &self,
        options: OAuthOptions,
    ) -> AuthResult<Option<UserProfile>> {
        self.link_with_oauth(OAuthProvider::Facebook, options).await
    }

    pub async fn link_with_google(
        &self,
        options: OAuthOptions,
    ) -> AuthResult<Option<UserProfile>> {
        self.link_with_oauth(OAuthProvider::Google, options).await
    }

    pub async fn link_with_github(
        &self,
        options: OAuthOptions,
    ) -> AuthResult<Option<UserProfile>> {
        self.link_with_oauth(OAuthProvider::GitHub, options).await
    }

    pub async fn send_password_reset_email(&self, email: &str) -> AuthResult<()> {
        self.auth.send_password_reset_email(email).await
    }

    /// Sign the current user out, detaching every registered listener
    pub async fn sign_out(&self) -> AuthResult<()> {
        self.auth.sign_out().await?;
        self.listeners.remove_all();
        debug!("signed out");
        Ok(())
    }

    /// Delete the current account after reauthenticating with `password`
    ///
    /// Also detaches every registered listener; the account's subscriptions
    /// must not outlive it.
    pub async fn delete_user(&self, password: &str) -> AuthResult<()> {
        self.auth.reauthenticate(password).await?;
        self.auth.delete_user().await?;
        self.listeners.remove_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        AuthUser, MemoryAuth, MemoryDatabase, MemoryFiles, RealtimeDatabase,
    };
    use crate::path::QueryOptions;
    use crate::signal::SignalHub;
    use std::sync::Arc;

    fn setup() -> (Arc<MemoryAuth>, Provider) {
        let auth = Arc::new(MemoryAuth::new());
        let provider = Provider::new(
            Arc::new(MemoryDatabase::new()) as Arc<dyn RealtimeDatabase>,
            Arc::clone(&auth) as Arc<dyn crate::backend::AuthClient>,
            Arc::new(MemoryFiles::new("test")),
            Arc::new(SignalHub::new()),
        );
        (auth, provider)
    }

    fn oauth_user(uid: &str) -> AuthUser {
        AuthUser {
            uid: uid.to_string(),
            is_anonymous: false,
            provider_data: Vec::new(),
            display_name: Some("Pat".to_string()),
            email: Some("pat@example.com".to_string()),
            email_verified: true,
            photo_url: Some("https://example.com/pat.png".to_string()),
        }
    }

    #[tokio::test]
    async fn test_get_user_requires_sign_in() {
        let (_auth, provider) = setup();
        assert!(matches!(provider.get_user(), Err(AuthError::SignedOut)));

        provider.sign_in_anonymously().await.unwrap();
        assert!(provider.get_user().unwrap().is_anonymous);
    }

    #[tokio::test]
    async fn test_email_flow_normalizes_profile() {
        let (_auth, provider) = setup();
        let profile = provider
            .create_user_with_email_and_password("a@x.io", "pw")
            .await
            .unwrap();
        assert_eq!(profile.email.as_deref(), Some("a@x.io"));
        assert!(!profile.is_anonymous);
        assert!(!profile.email_verified);

        provider.sign_out().await.unwrap();
        let profile = provider
            .sign_in_with_email_and_password("a@x.io", "pw")
            .await
            .unwrap();
        assert_eq!(profile.email.as_deref(), Some("a@x.io"));
    }

    #[tokio::test]
    async fn test_popup_sign_in_carries_access_token() {
        let (auth, provider) = setup();
        auth.stage_oauth_user(
            OAuthProvider::Facebook,
            oauth_user("fb-1"),
            Some("fb-token".to_string()),
        );

        let profile = provider
            .sign_in_with_facebook(OAuthOptions::default())
            .await
            .unwrap()
            .expect("popup resolves with a profile");
        assert_eq!(profile.uid, "fb-1");
        assert_eq!(profile.access_token.as_deref(), Some("fb-token"));
    }

    #[tokio::test]
    async fn test_redirect_sign_in_resolves_without_profile() {
        let (auth, provider) = setup();
        auth.stage_oauth_user(OAuthProvider::Google, oauth_user("g-1"), None);

        let result = provider
            .sign_in_with_google(OAuthOptions {
                redirect: true,
                scopes: Vec::new(),
            })
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_link_adds_provider_data() {
        let (auth, provider) = setup();
        provider.sign_in_anonymously().await.unwrap();
        auth.stage_oauth_user(OAuthProvider::GitHub, oauth_user("gh-1"), None);

        let profile = provider
            .link_with_github(OAuthOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert!(profile
            .provider_data
            .iter()
            .any(|p| p.provider_id == "github.com"));
    }

    #[tokio::test]
    async fn test_sign_out_detaches_listeners() {
        let (_auth, provider) = setup();
        provider.sign_in_anonymously().await.unwrap();
        provider
            .on_value("a", "changed", QueryOptions::default())
            .unwrap();
        assert_eq!(provider.listener_count(), 1);

        provider.sign_out().await.unwrap();
        assert_eq!(provider.listener_count(), 0);
        assert!(matches!(provider.get_user(), Err(AuthError::SignedOut)));
    }

    #[tokio::test]
    async fn test_delete_user_requires_matching_password() {
        let (_auth, provider) = setup();
        provider
            .create_user_with_email_and_password("a@x.io", "pw")
            .await
            .unwrap();

        let err = provider.delete_user("wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert!(provider.get_user().is_ok(), "failed delete keeps the account");

        provider.delete_user("pw").await.unwrap();
        assert!(matches!(provider.get_user(), Err(AuthError::SignedOut)));
    }
}
