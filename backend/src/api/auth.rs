//! Authentication API endpoints.

use axum::{extract::State, http::HeaderMap, Extension, Json};

use super::{filter_session_key, success, ApiResult};
use crate::auth::{require_user, verify_provider_secret, CurrentUser, Session};
use crate::models::{
    ConfirmPasswordResetRequest, PasswordResetRequest, ProviderProfile, RegisterRequest,
    SignInRequest, User,
};
use crate::AppState;

/// POST /api/auth/register - Create an account and sign in.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Session> {
    success(state.identity.register(&request).await?)
}

/// POST /api/auth/sign-in - Sign in with email and password.
pub async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> ApiResult<Session> {
    success(
        state
            .identity
            .sign_in(&request.email, &request.password)
            .await?,
    )
}

/// POST /api/auth/provider - Sign in with a profile vouched for by the
/// provider gateway.
pub async fn sign_in_with_provider(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(profile): Json<ProviderProfile>,
) -> ApiResult<Session> {
    verify_provider_secret(state.config.provider_secret.as_deref(), &headers)?;
    success(state.identity.sign_in_with_provider(&profile).await?)
}

/// POST /api/auth/sign-out - End the caller's session.
pub async fn sign_out(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
) -> ApiResult<()> {
    let current = require_user(current)?;
    state.identity.sign_out(&current.token).await?;

    let key = filter_session_key(Some(&current), &Default::default());
    state.filters.remove(&key).await;
    success(())
}

/// POST /api/auth/password-reset - Request a password reset.
pub async fn send_password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetRequest>,
) -> ApiResult<()> {
    state.identity.send_password_reset(&request.email).await?;
    success(())
}

/// POST /api/auth/password-reset/confirm - Set a new password with a reset token.
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(request): Json<ConfirmPasswordResetRequest>,
) -> ApiResult<()> {
    state
        .identity
        .confirm_password_reset(&request.token, &request.new_password)
        .await?;
    success(())
}

/// GET /api/auth/me - The signed-in user.
pub async fn me(current: Option<Extension<CurrentUser>>) -> ApiResult<User> {
    success(require_user(current)?.user)
}
