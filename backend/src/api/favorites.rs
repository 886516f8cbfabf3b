//! Favorites API endpoints.

use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use super::{readable_prompt, success, ApiResult};
use crate::auth::{require_user, CurrentUser};
use crate::favorites::ToggleOutcome;
use crate::models::Prompt;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckFavoritesRequest {
    pub prompt_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteStatus {
    pub is_favorite: bool,
    pub favorite_count: u32,
}

/// GET /api/favorites - The caller's favorited prompts.
pub async fn list_favorites(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
) -> ApiResult<Vec<Prompt>> {
    let current = require_user(current)?;
    success(state.favorites.get_user_favorites(current.id()).await?)
}

/// POST /api/favorites/{promptId}/toggle - Flip favorite membership.
pub async fn toggle_favorite(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
    Path(prompt_id): Path<String>,
) -> ApiResult<ToggleOutcome> {
    let current = require_user(current)?;
    readable_prompt(&state, Some(&current), &prompt_id).await?;

    success(
        state
            .favorites
            .toggle_favorite(current.id(), &prompt_id)
            .await?,
    )
}

/// GET /api/favorites/{promptId} - Membership and count for one prompt.
pub async fn get_favorite_status(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
    Path(prompt_id): Path<String>,
) -> ApiResult<FavoriteStatus> {
    let current = require_user(current)?;
    let prompt = readable_prompt(&state, Some(&current), &prompt_id).await?;

    let is_favorite = state
        .favorites
        .is_favorite(current.id(), &prompt_id)
        .await?;
    success(FavoriteStatus {
        is_favorite,
        favorite_count: prompt.favorite_count,
    })
}

/// POST /api/favorites/check - Membership for many prompts at once.
pub async fn check_favorites(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
    Json(request): Json<CheckFavoritesRequest>,
) -> ApiResult<HashMap<String, bool>> {
    let current = require_user(current)?;
    success(
        state
            .favorites
            .check_multiple(current.id(), &request.prompt_ids)
            .await?,
    )
}
