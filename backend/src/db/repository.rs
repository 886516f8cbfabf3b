//! Database repository for CRUD operations.
//!
//! Uses prepared statements and transactions for data integrity.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::{FavoriteSetOp, FavoritesRepository, PromptRepository};
use crate::errors::AppError;
use crate::models::{
    CreatePromptRequest, NewUser, Prompt, PromptCategory, SortField, UpdatePromptRequest, User,
    MAX_FAVORITES,
};
use crate::query::{PromptFilter, PromptSort};

const PROMPT_COLUMNS: &str = "id, title, description, content, tags, category, author_id, \
                              is_public, created_at, updated_at, favorite_count";

const USER_COLUMNS: &str = "id, display_name, email, photo_url, created_at, favorite_prompts";

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== USER OPERATIONS ====================

    /// Get a user by ID.
    pub async fn find_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Get a user by normalized email.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Get the user linked to an external provider identity.
    pub async fn find_user_by_provider(
        &self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<User>, AppError> {
        let row = sqlx::query(
            r#"SELECT u.id, u.display_name, u.email, u.photo_url, u.created_at, u.favorite_prompts
               FROM provider_links p JOIN users u ON u.id = p.user_id
               WHERE p.provider = ? AND p.subject = ?"#,
        )
        .bind(provider)
        .bind(subject)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Create a user record, with a password credential when one is given.
    /// The favorite set starts empty.
    pub async fn create_user(
        &self,
        new_user: &NewUser,
        password_hash: Option<&str>,
    ) -> Result<User, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now();
        let now_str = format_timestamp(now);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO users (id, display_name, email, photo_url, created_at, favorite_prompts) VALUES (?, ?, ?, ?, ?, '[]')",
        )
        .bind(&id)
        .bind(&new_user.display_name)
        .bind(&new_user.email)
        .bind(&new_user.photo_url)
        .bind(&now_str)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return AppError::Auth("An account with this email already exists".to_string());
                }
            }
            AppError::from(e)
        })?;

        if let Some(hash) = password_hash {
            sqlx::query(
                "INSERT INTO credentials (user_id, password_hash, updated_at) VALUES (?, ?, ?)",
            )
            .bind(&id)
            .bind(hash)
            .bind(&now_str)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(User {
            id,
            display_name: new_user.display_name.clone(),
            email: new_user.email.clone(),
            photo_url: new_user.photo_url.clone(),
            created_at: now,
            favorite_prompts: Vec::new(),
        })
    }

    // ==================== CREDENTIAL OPERATIONS ====================

    pub async fn password_hash(&self, user_id: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query("SELECT password_hash FROM credentials WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get("password_hash")))
    }

    /// Insert or replace the user's password credential.
    pub async fn set_password_hash(&self, user_id: &str, hash: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"INSERT INTO credentials (user_id, password_hash, updated_at) VALUES (?, ?, ?)
               ON CONFLICT(user_id) DO UPDATE SET password_hash = excluded.password_hash,
                                                  updated_at = excluded.updated_at"#,
        )
        .bind(user_id)
        .bind(hash)
        .bind(format_timestamp(now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn link_provider(
        &self,
        provider: &str,
        subject: &str,
        user_id: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT OR IGNORE INTO provider_links (provider, subject, user_id) VALUES (?, ?, ?)",
        )
        .bind(provider)
        .bind(subject)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ==================== SESSION OPERATIONS ====================

    pub async fn create_session(&self, token: &str, user_id: &str) -> Result<(), AppError> {
        sqlx::query("INSERT INTO sessions (token, user_id, created_at) VALUES (?, ?, ?)")
            .bind(token)
            .bind(user_id)
            .bind(format_timestamp(now()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Resolve a session token to its user.
    pub async fn session_user(&self, token: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(
            r#"SELECT u.id, u.display_name, u.email, u.photo_url, u.created_at, u.favorite_prompts
               FROM sessions s JOIN users u ON u.id = s.user_id
               WHERE s.token = ?"#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Delete a session. Returns whether it existed.
    pub async fn delete_session(&self, token: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_user_sessions(&self, user_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn create_password_reset(
        &self,
        token: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query("INSERT INTO password_resets (token, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(token)
            .bind(user_id)
            .bind(format_timestamp(expires_at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Consume a reset token, returning its user and expiry.
    pub async fn take_password_reset(
        &self,
        token: &str,
    ) -> Result<Option<(String, DateTime<Utc>)>, AppError> {
        let row = sqlx::query(
            "DELETE FROM password_resets WHERE token = ? RETURNING user_id, expires_at",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let expires_at: String = row.get("expires_at");
                Ok(Some((row.get("user_id"), parse_timestamp(&expires_at)?)))
            }
            None => Ok(None),
        }
    }
}

// ==================== PROMPT OPERATIONS ====================

#[async_trait]
impl PromptRepository for Repository {
    async fn create(
        &self,
        author_id: &str,
        data: &CreatePromptRequest,
    ) -> Result<Prompt, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now();
        let now_str = format_timestamp(now);
        let tags: BTreeSet<String> = data.tags.iter().cloned().collect();
        let tags_json = serde_json::to_string(&tags)?;
        let description = data.description.clone().unwrap_or_default();

        sqlx::query(
            r#"INSERT INTO prompts (
                id, title, description, content, tags, category, author_id,
                is_public, created_at, updated_at, favorite_count
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)"#,
        )
        .bind(&id)
        .bind(&data.title)
        .bind(&description)
        .bind(&data.content)
        .bind(&tags_json)
        .bind(data.category.as_str())
        .bind(author_id)
        .bind(data.is_public as i32)
        .bind(&now_str)
        .bind(&now_str)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Created prompt {} for {}", id, author_id);

        Ok(Prompt {
            id,
            title: data.title.clone(),
            description,
            content: data.content.clone(),
            tags,
            category: data.category,
            author_id: author_id.to_string(),
            is_public: data.is_public,
            created_at: now,
            updated_at: now,
            favorite_count: 0,
        })
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Prompt>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM prompts WHERE id = ?", PROMPT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(prompt_from_row).transpose()
    }

    async fn update(&self, id: &str, patch: &UpdatePromptRequest) -> Result<Prompt, AppError> {
        let existing = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Prompt {} not found", id)))?;

        let now = now();
        let title = patch.title.clone().unwrap_or(existing.title);
        let description = patch.description.clone().unwrap_or(existing.description);
        let content = patch.content.clone().unwrap_or(existing.content);
        let tags: BTreeSet<String> = match &patch.tags {
            Some(tags) => tags.iter().cloned().collect(),
            None => existing.tags,
        };
        let category = patch.category.unwrap_or(existing.category);
        let is_public = patch.is_public.unwrap_or(existing.is_public);
        let tags_json = serde_json::to_string(&tags)?;

        let result = sqlx::query(
            r#"UPDATE prompts SET
                title = ?, description = ?, content = ?, tags = ?, category = ?,
                is_public = ?, updated_at = ?
            WHERE id = ?"#,
        )
        .bind(&title)
        .bind(&description)
        .bind(&content)
        .bind(&tags_json)
        .bind(category.as_str())
        .bind(is_public as i32)
        .bind(format_timestamp(now))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Prompt {} not found", id)));
        }

        Ok(Prompt {
            id: id.to_string(),
            title,
            description,
            content,
            tags,
            category,
            author_id: existing.author_id,
            is_public,
            created_at: existing.created_at,
            updated_at: now,
            favorite_count: existing.favorite_count,
        })
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM prompts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        // Drop the prompt from every favorite set that references it
        let cleared = sqlx::query(
            r#"UPDATE users SET favorite_prompts = (
                   SELECT json_group_array(json_each.value) FROM json_each(users.favorite_prompts)
                   WHERE json_each.value != ?)
               WHERE EXISTS (SELECT 1 FROM json_each(users.favorite_prompts) WHERE json_each.value = ?)"#,
        )
        .bind(id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            "Deleted prompt {} and cleared it from {} favorite sets",
            id,
            cleared.rows_affected()
        );
        Ok(true)
    }

    async fn query(
        &self,
        filter: &PromptFilter,
        sort: PromptSort,
        limit: Option<usize>,
    ) -> Result<Vec<Prompt>, AppError> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM prompts WHERE 1 = 1", PROMPT_COLUMNS));

        if let Some(is_public) = filter.is_public {
            builder.push(" AND is_public = ").push_bind(is_public as i32);
        }

        if let Some(author_id) = &filter.author_id {
            builder.push(" AND author_id = ").push_bind(author_id.clone());
        }

        if let Some(categories) = &filter.categories {
            builder.push(" AND category IN (");
            let mut values = builder.separated(", ");
            for category in categories {
                values.push_bind(category.clone());
            }
            values.push_unseparated(")");
        }

        if let Some(tags) = &filter.tags_any {
            builder.push(
                " AND EXISTS (SELECT 1 FROM json_each(prompts.tags) WHERE json_each.value IN (",
            );
            let mut values = builder.separated(", ");
            for tag in tags {
                values.push_bind(tag.clone());
            }
            values.push_unseparated("))");
        }

        let column = match sort.field.effective() {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::Title | SortField::Category => "title COLLATE NOCASE",
        };
        builder
            .push(" ORDER BY ")
            .push(column)
            .push(" ")
            .push(sort.direction.as_sql());

        if let Some(limit) = limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = builder.build().fetch_all(&self.pool).await?;

        rows.iter().map(prompt_from_row).collect()
    }
}

// ==================== FAVORITE OPERATIONS ====================

#[async_trait]
impl FavoritesRepository for Repository {
    async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        self.find_user(id).await
    }

    async fn update_favorite_set(
        &self,
        user_id: &str,
        prompt_id: &str,
        op: FavoriteSetOp,
    ) -> Result<bool, AppError> {
        // Each change is a single statement, so concurrent toggles never
        // read a set that another writer is about to replace.
        let result = match op {
            FavoriteSetOp::Add => {
                sqlx::query(
                    r#"UPDATE users SET favorite_prompts = json_insert(favorite_prompts, '$[#]', ?)
                       WHERE id = ?
                         AND NOT EXISTS (SELECT 1 FROM json_each(users.favorite_prompts) WHERE json_each.value = ?)
                         AND json_array_length(favorite_prompts) < ?"#,
                )
                .bind(prompt_id)
                .bind(user_id)
                .bind(prompt_id)
                .bind(MAX_FAVORITES as i64)
                .execute(&self.pool)
                .await?
            }
            FavoriteSetOp::Remove => {
                sqlx::query(
                    r#"UPDATE users SET favorite_prompts = (
                           SELECT json_group_array(json_each.value) FROM json_each(users.favorite_prompts)
                           WHERE json_each.value != ?)
                       WHERE id = ?
                         AND EXISTS (SELECT 1 FROM json_each(users.favorite_prompts) WHERE json_each.value = ?)"#,
                )
                .bind(prompt_id)
                .bind(user_id)
                .bind(prompt_id)
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // Nothing changed: tell a missing user or a full set apart from a no-op.
        let user = self
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
        if op == FavoriteSetOp::Add
            && !user.has_favorite(prompt_id)
            && user.favorite_prompts.len() >= MAX_FAVORITES
        {
            return Err(AppError::Validation(format!(
                "Cannot have more than {} favorites",
                MAX_FAVORITES
            )));
        }
        Ok(false)
    }

    async fn increment_favorite_count(
        &self,
        prompt_id: &str,
        delta: i64,
    ) -> Result<u32, AppError> {
        let row = sqlx::query(
            r#"UPDATE prompts SET favorite_count = MAX(favorite_count + ?, 0)
               WHERE id = ? RETURNING favorite_count"#,
        )
        .bind(delta)
        .bind(prompt_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Prompt {} not found", prompt_id)))?;

        Ok(count_from_db(row.get("favorite_count")))
    }
}

// Helper functions for row conversion

/// Current time at the precision timestamps are stored with.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Fixed-width UTC text, so lexical order equals chronological order.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| AppError::Repository(format!("Invalid stored timestamp {}: {}", raw, e)))
}

fn count_from_db(count: i64) -> u32 {
    u32::try_from(count.max(0)).unwrap_or(u32::MAX)
}

fn prompt_from_row(row: &SqliteRow) -> Result<Prompt, AppError> {
    let tags_str: String = row.get("tags");
    let category: String = row.get("category");
    let is_public: i32 = row.get("is_public");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Prompt {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        content: row.get("content"),
        tags: parse_json_array(&tags_str)?.into_iter().collect(),
        category: PromptCategory::from_str(&category).unwrap_or_default(),
        author_id: row.get("author_id"),
        is_public: is_public != 0,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
        favorite_count: count_from_db(row.get("favorite_count")),
    })
}

fn user_from_row(row: &SqliteRow) -> Result<User, AppError> {
    let created_at: String = row.get("created_at");
    let favorites_str: String = row.get("favorite_prompts");

    Ok(User {
        id: row.get("id"),
        display_name: row.get("display_name"),
        email: row.get("email"),
        photo_url: row.get("photo_url"),
        created_at: parse_timestamp(&created_at)?,
        favorite_prompts: parse_json_array(&favorites_str)?,
    })
}

fn parse_json_array(raw: &str) -> Result<Vec<String>, AppError> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::Repository(format!("Invalid stored JSON array {:?}: {}", raw, e)))
}
