//! User model and the identity request bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Upper bound on a user's favorite set.
pub const MAX_FAVORITES: usize = 500;

/// A signed-up user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub email: String,
    #[serde(rename = "photoURL", default)]
    pub photo_url: String,
    pub created_at: DateTime<Utc>,
    /// Favorited prompt ids in the order they were added, without duplicates.
    #[serde(default)]
    pub favorite_prompts: Vec<String>,
}

impl User {
    pub fn has_favorite(&self, prompt_id: &str) -> bool {
        self.favorite_prompts.iter().any(|id| id == prompt_id)
    }
}

/// Profile fields for a user record that is about to be created.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub display_name: String,
    pub email: String,
    pub photo_url: String,
}

impl NewUser {
    pub fn validated(self) -> Result<Self, AppError> {
        let display_name = self.display_name.trim().to_string();
        let len = display_name.chars().count();
        if !(2..=50).contains(&len) {
            return Err(AppError::Validation(
                "Display name must be between 2 and 50 characters".to_string(),
            ));
        }
        let email = normalize_email(&self.email)?;
        if !self.photo_url.is_empty()
            && !(self.photo_url.starts_with("http://") || self.photo_url.starts_with("https://"))
        {
            return Err(AppError::Validation("Valid URL is required".to_string()));
        }
        Ok(Self {
            display_name,
            email,
            photo_url: self.photo_url,
        })
    }
}

/// Lowercase and sanity-check an email address.
pub fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    };
    if !valid {
        return Err(AppError::Validation(
            "Valid email address is required".to_string(),
        ));
    }
    Ok(email)
}

/// Request body for registering with email and password.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

/// Request body for signing in with email and password.
#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// A profile already verified by an external provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProfile {
    pub provider: String,
    pub subject: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPasswordResetRequest {
    pub token: String,
    pub new_password: String,
}
