//! Prompt model and the request bodies that create and edit it.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{is_known_tag, PromptCategory};
use crate::errors::AppError;

pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_DESCRIPTION_CHARS: usize = 500;
pub const MAX_CONTENT_CHARS: usize = 10_000;
pub const MAX_TAGS: usize = 10;

/// A stored, reusable text prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub id: String,
    pub title: String,
    /// Missing descriptions read as empty.
    #[serde(default)]
    pub description: String,
    pub content: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub category: PromptCategory,
    pub author_id: String,
    #[serde(default)]
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Number of users holding this prompt in their favorites.
    #[serde(default)]
    pub favorite_count: u32,
}

/// Request body for creating a new prompt.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePromptRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: PromptCategory,
    #[serde(default)]
    pub is_public: bool,
}

impl CreatePromptRequest {
    /// Trim and check every field, returning the normalized request.
    pub fn validated(self) -> Result<Self, AppError> {
        let title = validate_title(&self.title)?;
        let description = validate_description(self.description.as_deref())?;
        let content = validate_content(&self.content)?;
        validate_tags(&self.tags)?;

        Ok(Self {
            title,
            description: Some(description),
            content,
            tags: self.tags,
            category: self.category,
            is_public: self.is_public,
        })
    }
}

/// Request body for updating an existing prompt. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePromptRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub category: Option<PromptCategory>,
    #[serde(default)]
    pub is_public: Option<bool>,
}

impl UpdatePromptRequest {
    pub fn validated(self) -> Result<Self, AppError> {
        let title = self.title.as_deref().map(validate_title).transpose()?;
        let description = match self.description.as_deref() {
            Some(d) => Some(validate_description(Some(d))?),
            None => None,
        };
        let content = self.content.as_deref().map(validate_content).transpose()?;
        if let Some(tags) = &self.tags {
            validate_tags(tags)?;
        }

        Ok(Self {
            title,
            description,
            content,
            tags: self.tags,
            category: self.category,
            is_public: self.is_public,
        })
    }
}

fn validate_title(title: &str) -> Result<String, AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::Validation(format!(
            "Title cannot exceed {} characters",
            MAX_TITLE_CHARS
        )));
    }
    Ok(title.to_string())
}

fn validate_description(description: Option<&str>) -> Result<String, AppError> {
    let description = description.unwrap_or_default();
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(AppError::Validation(format!(
            "Description cannot exceed {} characters",
            MAX_DESCRIPTION_CHARS
        )));
    }
    Ok(description.to_string())
}

fn validate_content(content: &str) -> Result<String, AppError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("Content is required".to_string()));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(AppError::Validation(format!(
            "Content cannot exceed {} characters",
            MAX_CONTENT_CHARS
        )));
    }
    Ok(content.to_string())
}

fn validate_tags(tags: &[String]) -> Result<(), AppError> {
    if tags.is_empty() {
        return Err(AppError::Validation("At least one tag is required".to_string()));
    }
    if tags.len() > MAX_TAGS {
        return Err(AppError::Validation(format!(
            "Cannot have more than {} tags",
            MAX_TAGS
        )));
    }
    if let Some(unknown) = tags.iter().find(|t| !is_known_tag(t)) {
        return Err(AppError::Validation(format!("Unknown tag: {}", unknown)));
    }
    Ok(())
}
