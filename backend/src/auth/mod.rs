//! Session-based authentication module.
//!
//! Resolves bearer tokens into the signed-in user for each request.

mod identity;
mod password;
mod session;

pub use identity::*;
pub use password::{generate_token, hash_password, validate_password, verify_password};
pub use session::AuthSession;

use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension,
};
use subtle::ConstantTimeEq;

use crate::errors::AppError;
use crate::models::User;

/// Header carrying the shared secret of the trusted provider gateway.
pub const PROVIDER_SECRET_HEADER: &str = "x-provider-secret";

/// The signed-in user attached to a request by [`session_auth_layer`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }
}

/// Session layer function that takes the identity service as a parameter.
///
/// Requests without a bearer token pass through anonymously; a token that
/// does not resolve is rejected.
pub async fn session_auth_layer(
    identity: Arc<dyn IdentityService>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()) else {
        return next.run(request).await;
    };

    match identity.resolve(&token).await {
        Ok(Some(user)) => {
            request
                .extensions_mut()
                .insert(CurrentUser { user, token });
            next.run(request).await
        }
        Ok(None) => AppError::Unauthorized("Invalid or expired session".to_string()).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Extract the token from an `Authorization: Bearer` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Turn an optional session into the signed-in user or a 401.
pub fn require_user(current: Option<Extension<CurrentUser>>) -> Result<CurrentUser, AppError> {
    current
        .map(|Extension(user)| user)
        .ok_or_else(|| AppError::Unauthorized("Sign in required".to_string()))
}

/// Check that a provider sign-in comes from the trusted gateway.
///
/// Provider sign-in is disabled when no secret is configured.
pub fn verify_provider_secret(expected: Option<&str>, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = expected else {
        return Err(AppError::Forbidden(
            "Provider sign-in is not enabled".to_string(),
        ));
    };

    let provided = headers
        .get(PROVIDER_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if provided.as_bytes().ct_eq(expected.as_bytes()).into() {
        Ok(())
    } else {
        Err(AppError::Unauthorized(
            "Missing or invalid provider secret".to_string(),
        ))
    }
}
