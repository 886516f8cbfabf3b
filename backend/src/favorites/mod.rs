//! Favorites ledger.
//!
//! A user's favorite set is the authoritative membership; each prompt's
//! `favorite_count` is a denormalized aggregate. A toggle writes both, one
//! after the other, without a surrounding transaction: a failure between the
//! two writes leaves the counter off by one until the next toggle.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::db::{FavoriteSetOp, FavoritesRepository, PromptRepository};
use crate::errors::AppError;
use crate::models::{Prompt, User};

/// State after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleOutcome {
    pub is_favorite: bool,
    pub favorite_count: u32,
}

#[derive(Clone)]
pub struct FavoritesLedger {
    prompts: Arc<dyn PromptRepository>,
    users: Arc<dyn FavoritesRepository>,
}

impl FavoritesLedger {
    pub fn new(prompts: Arc<dyn PromptRepository>, users: Arc<dyn FavoritesRepository>) -> Self {
        Self { prompts, users }
    }

    async fn user(&self, user_id: &str) -> Result<User, AppError> {
        self.users
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    async fn prompt(&self, prompt_id: &str) -> Result<Prompt, AppError> {
        self.prompts
            .get_by_id(prompt_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Prompt {} not found", prompt_id)))
    }

    pub async fn is_favorite(&self, user_id: &str, prompt_id: &str) -> Result<bool, AppError> {
        Ok(self.user(user_id).await?.has_favorite(prompt_id))
    }

    pub async fn favorite_count(&self, prompt_id: &str) -> Result<u32, AppError> {
        Ok(self.prompt(prompt_id).await?.favorite_count)
    }

    /// Flip membership of `prompt_id` in the user's set and move the prompt's
    /// counter the same way.
    pub async fn toggle_favorite(
        &self,
        user_id: &str,
        prompt_id: &str,
    ) -> Result<ToggleOutcome, AppError> {
        // Both must exist before anything is written.
        let prompt = self.prompt(prompt_id).await?;
        let user = self.user(user_id).await?;

        let (op, delta) = if user.has_favorite(prompt_id) {
            (FavoriteSetOp::Remove, -1)
        } else {
            (FavoriteSetOp::Add, 1)
        };

        let changed = self
            .users
            .update_favorite_set(user_id, prompt_id, op)
            .await?;

        let favorite_count = if changed {
            self.bump_counter(prompt_id, delta).await?
        } else {
            // A concurrent toggle got there first; leave the counter alone.
            prompt.favorite_count
        };

        let is_favorite = op == FavoriteSetOp::Add;
        tracing::debug!(
            "User {} {} favorite {} (count {})",
            user_id,
            if is_favorite { "added" } else { "removed" },
            prompt_id,
            favorite_count
        );

        Ok(ToggleOutcome {
            is_favorite,
            favorite_count,
        })
    }

    async fn bump_counter(&self, prompt_id: &str, delta: i64) -> Result<u32, AppError> {
        self.users
            .increment_favorite_count(prompt_id, delta)
            .await
            .inspect_err(|e| {
                tracing::warn!(
                    "Favorite set updated but counter write failed for {}: {}",
                    prompt_id,
                    e
                )
            })
    }

    /// Membership of each id in the user's set.
    pub async fn check_multiple(
        &self,
        user_id: &str,
        prompt_ids: &[String],
    ) -> Result<HashMap<String, bool>, AppError> {
        if prompt_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let user = self.user(user_id).await?;
        Ok(prompt_ids
            .iter()
            .map(|id| (id.clone(), user.has_favorite(id)))
            .collect())
    }

    /// Membership map over the user's whole set, for favorite-aware sorting.
    pub async fn membership(&self, user_id: &str) -> Result<HashMap<String, bool>, AppError> {
        let user = self.user(user_id).await?;
        Ok(user
            .favorite_prompts
            .into_iter()
            .map(|id| (id, true))
            .collect())
    }

    /// The user's favorited prompts in the order they were added. Ids whose
    /// prompt no longer exists are skipped.
    pub async fn get_user_favorites(&self, user_id: &str) -> Result<Vec<Prompt>, AppError> {
        let user = self.user(user_id).await?;

        let mut prompts = Vec::with_capacity(user.favorite_prompts.len());
        for id in &user.favorite_prompts {
            match self.prompts.get_by_id(id).await? {
                Some(prompt) => prompts.push(prompt),
                None => tracing::debug!("Skipping dangling favorite {} for {}", id, user_id),
            }
        }
        Ok(prompts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_database, Repository};
    use crate::models::{CreatePromptRequest, NewUser, PromptCategory, MAX_FAVORITES};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        repo: Arc<Repository>,
        ledger: FavoritesLedger,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("ledger.sqlite")).await.unwrap();
        let repo = Arc::new(Repository::new(pool));
        let ledger = FavoritesLedger::new(repo.clone(), repo.clone());
        Fixture {
            _dir: dir,
            repo,
            ledger,
        }
    }

    async fn user(repo: &Repository, email: &str) -> User {
        let new_user = NewUser {
            display_name: "Fan".to_string(),
            email: email.to_string(),
            photo_url: String::new(),
        };
        repo.create_user(&new_user, None).await.unwrap()
    }

    async fn prompt(repo: &Repository, title: &str) -> Prompt {
        let request = CreatePromptRequest {
            title: title.to_string(),
            description: None,
            content: "content".to_string(),
            tags: vec!["Template".to_string()],
            category: PromptCategory::Utility,
            is_public: true,
        };
        repo.create("author", &request).await.unwrap()
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_state() {
        let fx = fixture().await;
        let prompt = prompt(&fx.repo, "Shared").await;

        // Three other users already hold it.
        for i in 0..3 {
            let other = user(&fx.repo, &format!("other{}@example.com", i)).await;
            fx.ledger.toggle_favorite(&other.id, &prompt.id).await.unwrap();
        }
        let me = user(&fx.repo, "me@example.com").await;
        assert_eq!(fx.ledger.favorite_count(&prompt.id).await.unwrap(), 3);
        assert!(!fx.ledger.is_favorite(&me.id, &prompt.id).await.unwrap());

        let added = fx.ledger.toggle_favorite(&me.id, &prompt.id).await.unwrap();
        assert_eq!(
            added,
            ToggleOutcome {
                is_favorite: true,
                favorite_count: 4
            }
        );
        assert!(fx.ledger.is_favorite(&me.id, &prompt.id).await.unwrap());

        let removed = fx.ledger.toggle_favorite(&me.id, &prompt.id).await.unwrap();
        assert_eq!(
            removed,
            ToggleOutcome {
                is_favorite: false,
                favorite_count: 3
            }
        );
        assert!(!fx.ledger.is_favorite(&me.id, &prompt.id).await.unwrap());
        assert_eq!(fx.ledger.favorite_count(&prompt.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_counter_never_goes_negative() {
        let fx = fixture().await;
        let prompt = prompt(&fx.repo, "Drifted").await;
        let me = user(&fx.repo, "me@example.com").await;

        // Membership recorded without the counter, as after a failed second write.
        fx.repo
            .update_favorite_set(&me.id, &prompt.id, FavoriteSetOp::Add)
            .await
            .unwrap();

        let outcome = fx.ledger.toggle_favorite(&me.id, &prompt.id).await.unwrap();
        assert!(!outcome.is_favorite);
        assert_eq!(outcome.favorite_count, 0);
    }

    #[tokio::test]
    async fn test_toggle_missing_prompt_writes_nothing() {
        let fx = fixture().await;
        let me = user(&fx.repo, "me@example.com").await;

        let result = fx.ledger.toggle_favorite(&me.id, "no-such-prompt").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(fx.repo.find_user(&me.id).await.unwrap().unwrap().favorite_prompts.is_empty());
    }

    #[tokio::test]
    async fn test_missing_user_is_not_found() {
        let fx = fixture().await;
        let prompt = prompt(&fx.repo, "Lonely").await;

        let result = fx.ledger.is_favorite("ghost", &prompt.id).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let result = fx
            .ledger
            .check_multiple("ghost", &[prompt.id.clone()])
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        assert!(matches!(
            fx.ledger.favorite_count("no-such-prompt").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_check_multiple() {
        let fx = fixture().await;
        let me = user(&fx.repo, "me@example.com").await;
        let liked = prompt(&fx.repo, "Liked").await;
        let other = prompt(&fx.repo, "Other").await;
        fx.ledger.toggle_favorite(&me.id, &liked.id).await.unwrap();

        let ids = vec![liked.id.clone(), other.id.clone(), "unknown".to_string()];
        let result = fx.ledger.check_multiple(&me.id, &ids).await.unwrap();
        assert_eq!(result.len(), 3);
        assert!(result[&liked.id]);
        assert!(!result[&other.id]);
        assert!(!result["unknown"]);

        assert!(fx.ledger.check_multiple(&me.id, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_user_favorites_in_insertion_order() {
        let fx = fixture().await;
        let me = user(&fx.repo, "me@example.com").await;
        let first = prompt(&fx.repo, "First").await;
        let second = prompt(&fx.repo, "Second").await;

        fx.ledger.toggle_favorite(&me.id, &second.id).await.unwrap();
        fx.ledger.toggle_favorite(&me.id, &first.id).await.unwrap();
        // Dangling id left behind by an out-of-band delete.
        fx.repo
            .update_favorite_set(&me.id, "vanished", FavoriteSetOp::Add)
            .await
            .unwrap();

        let titles: Vec<String> = fx
            .ledger
            .get_user_favorites(&me.id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["Second", "First"]);
    }

    #[tokio::test]
    async fn test_favorite_set_is_bounded() {
        let fx = fixture().await;
        let me = user(&fx.repo, "me@example.com").await;
        for i in 0..MAX_FAVORITES {
            fx.repo
                .update_favorite_set(&me.id, &format!("p{}", i), FavoriteSetOp::Add)
                .await
                .unwrap();
        }
        let extra = prompt(&fx.repo, "One too many").await;

        let result = fx.ledger.toggle_favorite(&me.id, &extra.id).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(fx.ledger.favorite_count(&extra.id).await.unwrap(), 0);
    }
}
