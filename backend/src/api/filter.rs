//! Filter state API endpoints.

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Extension, Json};

use super::{success, ApiResult};
use crate::auth::CurrentUser;
use crate::filter::{FilterAction, FilterSession};
use crate::models::FilterSpec;
use crate::AppState;

/// Header carrying an anonymous client's session key.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// Key of the filter session a request belongs to: the signed-in user, else
/// the anonymous client key, else a shared anonymous session.
pub fn filter_session_key(current: Option<&CurrentUser>, headers: &HeaderMap) -> String {
    if let Some(current) = current {
        return format!("user:{}", current.id());
    }

    headers
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|client| format!("client:{}", client))
        .unwrap_or_else(|| "anonymous".to_string())
}

pub(crate) async fn filter_session(
    state: &AppState,
    current: Option<&CurrentUser>,
    headers: &HeaderMap,
) -> Arc<FilterSession> {
    state
        .filters
        .session(&filter_session_key(current, headers))
        .await
}

/// GET /api/filter - Current filter selection of the caller's session.
pub async fn get_filter(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
    headers: HeaderMap,
) -> ApiResult<FilterSpec> {
    let current = current.map(|Extension(user)| user);
    let session = filter_session(&state, current.as_ref(), &headers).await;
    success(session.store.spec())
}

/// POST /api/filter/actions - Apply one filter action and return the new selection.
///
/// Search input sent as `inputSearchQuery` is committed after the debounce
/// window, so it is not yet visible in the returned selection.
pub async fn dispatch_filter_action(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
    headers: HeaderMap,
    Json(action): Json<FilterAction>,
) -> ApiResult<FilterSpec> {
    let current = current.map(|Extension(user)| user);
    let session = filter_session(&state, current.as_ref(), &headers).await;

    tracing::debug!("Filter action {:?}", action);
    session.dispatch(action);

    success(session.store.spec())
}
