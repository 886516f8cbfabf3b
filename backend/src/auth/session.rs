//! Client-side holder of the current session.

use std::sync::Arc;

use tokio::sync::watch;

use super::identity::{IdentityService, Session};
use crate::errors::AppError;
use crate::models::{ProviderProfile, RegisterRequest, User};

/// Tracks the signed-in session of one client and notifies observers on
/// sign-in, sign-out and restore.
pub struct AuthSession {
    identity: Arc<dyn IdentityService>,
    state: watch::Sender<Option<Session>>,
}

impl AuthSession {
    pub fn new(identity: Arc<dyn IdentityService>) -> Self {
        let (state, _) = watch::channel(None);
        Self { identity, state }
    }

    /// Receiver that sees every auth state change. Drop it to unsubscribe.
    pub fn on_auth_state_changed(&self) -> watch::Receiver<Option<Session>> {
        self.state.subscribe()
    }

    pub fn current(&self) -> Option<Session> {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().as_ref().map(|s| s.user.clone())
    }

    /// Re-establish a session from a stored token. Returns whether the
    /// token was still live.
    pub async fn restore(&self, token: &str) -> Result<bool, AppError> {
        let session = self
            .identity
            .resolve(token)
            .await?
            .map(|user| Session {
                token: token.to_string(),
                user,
            });
        let restored = session.is_some();
        self.state.send_replace(session);
        Ok(restored)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<User, AppError> {
        let session = self.identity.register(request).await?;
        Ok(self.signed_in(session))
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, AppError> {
        let session = self.identity.sign_in(email, password).await?;
        Ok(self.signed_in(session))
    }

    pub async fn sign_in_with_provider(&self, profile: &ProviderProfile) -> Result<User, AppError> {
        let session = self.identity.sign_in_with_provider(profile).await?;
        Ok(self.signed_in(session))
    }

    /// End the current session, if any.
    pub async fn sign_out(&self) -> Result<(), AppError> {
        if let Some(session) = self.current() {
            self.identity.sign_out(&session.token).await?;
        }
        self.state.send_replace(None);
        Ok(())
    }

    fn signed_in(&self, session: Session) -> User {
        let user = session.user.clone();
        self.state.send_replace(Some(session));
        user
    }
}
