//! Identity service: accounts, credentials and session tokens.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Serialize;

use super::password::{generate_token, hash_password, validate_password, verify_password};
use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{normalize_email, NewUser, ProviderProfile, RegisterRequest, User};

/// How long a password reset token stays valid.
pub const PASSWORD_RESET_TTL_MINUTES: i64 = 60;

/// A signed-in session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Account and session operations the rest of the crate relies on.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn register(&self, request: &RegisterRequest) -> Result<Session, AppError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError>;

    /// Sign in with a profile already verified by an external provider,
    /// creating the account on first use. An email that belongs to an
    /// account without this provider link is rejected.
    async fn sign_in_with_provider(&self, profile: &ProviderProfile)
        -> Result<Session, AppError>;

    async fn sign_out(&self, token: &str) -> Result<(), AppError>;

    /// Start a password reset. Succeeds whether or not the address is known.
    async fn send_password_reset(&self, email: &str) -> Result<(), AppError>;

    async fn confirm_password_reset(&self, token: &str, new_password: &str)
        -> Result<(), AppError>;

    /// The user owning `token`, if the session is live.
    async fn resolve(&self, token: &str) -> Result<Option<User>, AppError>;
}

/// Identity service backed by the local database.
#[derive(Clone)]
pub struct LocalIdentity {
    repo: Arc<Repository>,
}

impl LocalIdentity {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    async fn open_session(&self, user: User) -> Result<Session, AppError> {
        let token = generate_token();
        self.repo.create_session(&token, &user.id).await?;
        Ok(Session { token, user })
    }

    /// Issue a reset token for `email`. Returns `None` for unknown addresses.
    pub async fn issue_password_reset(&self, email: &str) -> Result<Option<String>, AppError> {
        let email = normalize_email(email)?;
        let Some(user) = self.repo.find_user_by_email(&email).await? else {
            return Ok(None);
        };

        let token = generate_token();
        let expires_at = Utc::now() + Duration::minutes(PASSWORD_RESET_TTL_MINUTES);
        self.repo
            .create_password_reset(&token, &user.id, expires_at)
            .await?;
        Ok(Some(token))
    }
}

fn invalid_credentials() -> AppError {
    AppError::Auth("Invalid email or password".to_string())
}

#[async_trait]
impl IdentityService for LocalIdentity {
    async fn register(&self, request: &RegisterRequest) -> Result<Session, AppError> {
        validate_password(&request.password)?;
        let new_user = NewUser {
            display_name: request.display_name.clone(),
            email: request.email.clone(),
            photo_url: String::new(),
        }
        .validated()?;

        let hash = hash_password(&request.password);
        let user = self.repo.create_user(&new_user, Some(&hash)).await?;

        tracing::info!("Registered user {}", user.id);
        self.open_session(user).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let email = normalize_email(email).map_err(|_| invalid_credentials())?;
        let user = self
            .repo
            .find_user_by_email(&email)
            .await?
            .ok_or_else(invalid_credentials)?;

        let hash = self
            .repo
            .password_hash(&user.id)
            .await?
            .ok_or_else(invalid_credentials)?;

        if !verify_password(password, &hash) {
            tracing::debug!("Rejected sign-in for {}", user.id);
            return Err(invalid_credentials());
        }

        self.open_session(user).await
    }

    async fn sign_in_with_provider(
        &self,
        profile: &ProviderProfile,
    ) -> Result<Session, AppError> {
        if profile.provider.trim().is_empty() || profile.subject.trim().is_empty() {
            return Err(AppError::Validation(
                "Provider and subject are required".to_string(),
            ));
        }

        if let Some(user) = self
            .repo
            .find_user_by_provider(&profile.provider, &profile.subject)
            .await?
        {
            return self.open_session(user).await;
        }

        let email = normalize_email(&profile.email)?;
        if self.repo.find_user_by_email(&email).await?.is_some() {
            // Existing accounts are never linked by email alone.
            tracing::warn!(
                "Rejected {} sign-in for an address owned by another account",
                profile.provider
            );
            return Err(AppError::Auth(
                "An account with this email already exists".to_string(),
            ));
        }

        let display_name = profile
            .display_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
        let new_user = NewUser {
            display_name,
            email,
            photo_url: profile.photo_url.clone().unwrap_or_default(),
        }
        .validated()?;
        let user = self.repo.create_user(&new_user, None).await?;
        tracing::info!("Created user {} from {} sign-in", user.id, profile.provider);

        self.repo
            .link_provider(&profile.provider, &profile.subject, &user.id)
            .await?;
        self.open_session(user).await
    }

    async fn sign_out(&self, token: &str) -> Result<(), AppError> {
        if !self.repo.delete_session(token).await? {
            tracing::debug!("Sign-out for unknown session");
        }
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AppError> {
        match self.issue_password_reset(email).await? {
            // Delivery is handled outside this service.
            Some(token) => tracing::debug!("Password reset token for {}: {}", email, token),
            None => tracing::debug!("Password reset requested for unknown address"),
        }
        Ok(())
    }

    async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        validate_password(new_password)?;

        let invalid = || AppError::Auth("Invalid or expired reset token".to_string());
        let (user_id, expires_at) = self
            .repo
            .take_password_reset(token)
            .await?
            .ok_or_else(invalid)?;
        if expires_at < Utc::now() {
            return Err(invalid());
        }

        self.repo
            .set_password_hash(&user_id, &hash_password(new_password))
            .await?;
        let closed = self.repo.delete_user_sessions(&user_id).await?;
        tracing::info!("Password reset for {}; closed {} sessions", user_id, closed);
        Ok(())
    }

    async fn resolve(&self, token: &str) -> Result<Option<User>, AppError> {
        self.repo.session_user(token).await
    }
}
