//! Prompt API endpoints.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Extension, Json,
};

use super::{filter_session, success, ApiResult, ListParams};
use crate::auth::{require_user, CurrentUser};
use crate::db::PromptRepository;
use crate::errors::AppError;
use crate::models::{CreatePromptRequest, Prompt, UpdatePromptRequest};
use crate::query::{self, QueryContext};
use crate::AppState;

/// Fetch a prompt the caller may read. Private prompts of other authors
/// read as missing.
pub(crate) async fn readable_prompt(
    state: &AppState,
    current: Option<&CurrentUser>,
    id: &str,
) -> Result<Prompt, AppError> {
    let not_found = || AppError::NotFound(format!("Prompt {} not found", id));
    let prompt = state.repo.get_by_id(id).await?.ok_or_else(not_found)?;

    let is_author = current.is_some_and(|c| c.id() == prompt.author_id);
    if !prompt.is_public && !is_author {
        return Err(not_found());
    }
    Ok(prompt)
}

/// Fetch a prompt the caller may change.
async fn owned_prompt(state: &AppState, current: &CurrentUser, id: &str) -> Result<Prompt, AppError> {
    let prompt = readable_prompt(state, Some(current), id).await?;
    if prompt.author_id != current.id() {
        return Err(AppError::Forbidden(
            "Only the author can modify this prompt".to_string(),
        ));
    }
    Ok(prompt)
}

/// GET /api/prompts/public - Public prompts under the caller's filter selection.
pub async fn list_public_prompts(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> ApiResult<Vec<Prompt>> {
    let current = current.map(|Extension(user)| user);
    let session = filter_session(&state, current.as_ref(), &headers).await;

    let mut spec = session.store.spec();
    spec.is_public = Some(true);

    let favorites = match &current {
        Some(user) => Some(state.favorites.membership(user.id()).await?),
        None => None,
    };
    let ctx = QueryContext {
        author_id: None,
        favorites: favorites.as_ref(),
        limit: params.limit.or(state.config.default_limit),
    };

    success(query::fetch(state.repo.as_ref(), &spec, &ctx).await?)
}

/// GET /api/prompts/library - The caller's own prompts, favorites first.
pub async fn list_library_prompts(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> ApiResult<Vec<Prompt>> {
    let current = require_user(current)?;
    let session = filter_session(&state, Some(&current), &headers).await;
    let spec = session.store.spec();

    let favorites = state.favorites.membership(current.id()).await?;
    let ctx = QueryContext {
        author_id: Some(current.id()),
        favorites: Some(&favorites),
        limit: params.limit.or(state.config.default_limit),
    };

    success(query::fetch(state.repo.as_ref(), &spec, &ctx).await?)
}

/// GET /api/prompts/{id} - Get a single prompt.
pub async fn get_prompt(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
    Path(id): Path<String>,
) -> ApiResult<Prompt> {
    let current = current.map(|Extension(user)| user);

    success(readable_prompt(&state, current.as_ref(), &id).await?)
}

/// POST /api/prompts - Create a new prompt owned by the caller.
pub async fn create_prompt(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
    Json(request): Json<CreatePromptRequest>,
) -> ApiResult<Prompt> {
    let current = require_user(current)?;
    let request = request.validated()?;

    let prompt = state.repo.create(current.id(), &request).await?;
    tracing::info!("Prompt {} created by {}", prompt.id, current.id());
    success(prompt)
}

/// PUT /api/prompts/{id} - Update a prompt. Author only.
pub async fn update_prompt(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
    Path(id): Path<String>,
    Json(request): Json<UpdatePromptRequest>,
) -> ApiResult<Prompt> {
    let current = require_user(current)?;
    owned_prompt(&state, &current, &id).await?;
    let request = request.validated()?;

    success(state.repo.update(&id, &request).await?)
}

/// DELETE /api/prompts/{id} - Delete a prompt. Author only.
pub async fn delete_prompt(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let current = require_user(current)?;
    owned_prompt(&state, &current, &id).await?;

    if !state.repo.delete(&id).await? {
        return Err(AppError::NotFound(format!("Prompt {} not found", id)));
    }
    tracing::info!("Prompt {} deleted by {}", id, current.id());
    success(())
}
