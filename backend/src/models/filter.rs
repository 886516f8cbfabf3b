//! Filter, search and sort selection.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Prompt field a listing is ordered by.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Title,
    #[default]
    CreatedAt,
    UpdatedAt,
    /// Orders by title; the store never indexed category for ordering.
    Category,
}

impl SortField {
    /// The field actually used for ordering.
    pub fn effective(self) -> SortField {
        match self {
            SortField::Category => SortField::Title,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// The complete set of active search, filter and sort selections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSpec {
    pub search_query: String,
    pub selected_categories: BTreeSet<String>,
    pub selected_tags: BTreeSet<String>,
    pub sort_field: SortField,
    pub sort_direction: SortDirection,
    /// `None` shows both public and private prompts.
    pub is_public: Option<bool>,
}
