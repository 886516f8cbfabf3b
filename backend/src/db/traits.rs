//! Storage seams used by the query engine and the favorites ledger.

use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::{CreatePromptRequest, Prompt, UpdatePromptRequest, User};
use crate::query::{PromptFilter, PromptSort};

/// Prompt persistence.
#[async_trait]
pub trait PromptRepository: Send + Sync {
    /// Store a new prompt owned by `author_id` with a zero favorite count.
    async fn create(&self, author_id: &str, data: &CreatePromptRequest)
        -> Result<Prompt, AppError>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Prompt>, AppError>;

    /// Apply the present fields of `patch` and bump `updated_at`.
    async fn update(&self, id: &str, patch: &UpdatePromptRequest) -> Result<Prompt, AppError>;

    /// Remove a prompt and every favorite reference to it. Returns `false`
    /// when no such prompt existed.
    async fn delete(&self, id: &str) -> Result<bool, AppError>;

    async fn query(
        &self,
        filter: &PromptFilter,
        sort: PromptSort,
        limit: Option<usize>,
    ) -> Result<Vec<Prompt>, AppError>;
}

/// Change applied to a user's favorite set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteSetOp {
    Add,
    Remove,
}

/// User favorite sets and the per-prompt favorite counter.
#[async_trait]
pub trait FavoritesRepository: Send + Sync {
    async fn get_user(&self, id: &str) -> Result<Option<User>, AppError>;

    /// Add or remove `prompt_id` in the user's favorite set. Returns whether
    /// the set changed.
    async fn update_favorite_set(
        &self,
        user_id: &str,
        prompt_id: &str,
        op: FavoriteSetOp,
    ) -> Result<bool, AppError>;

    /// Add `delta` to the prompt's favorite count, flooring at zero, and
    /// return the stored value.
    async fn increment_favorite_count(&self, prompt_id: &str, delta: i64)
        -> Result<u32, AppError>;
}
