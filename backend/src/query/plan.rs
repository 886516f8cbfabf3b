//! Split a filter spec between the repository and in-memory refinement.

use crate::models::{FilterSpec, SortDirection, SortField};

use super::QueryContext;

/// Largest value list the store accepts in a single membership clause.
pub const MAX_PUSHDOWN_VALUES: usize = 10;

/// Conditions evaluated by the repository. Every populated field narrows
/// the candidate set; `None` means unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptFilter {
    pub is_public: Option<bool>,
    pub author_id: Option<String>,
    /// Category must be one of these.
    pub categories: Option<Vec<String>>,
    /// At least one tag must be one of these.
    pub tags_any: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptSort {
    pub field: SortField,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub filter: PromptFilter,
    pub sort: PromptSort,
    /// Row cap for the repository. Only set when the repository's result is
    /// already the final result.
    pub repository_limit: Option<usize>,
    /// Whether some stage is left for the in-memory engine alone.
    pub client_refinement: bool,
}

/// Decide which stages the repository evaluates. The engine re-applies every
/// stage afterwards, so a plan only has to avoid excluding valid rows.
pub fn plan(spec: &FilterSpec, ctx: &QueryContext<'_>) -> QueryPlan {
    let mut client_refinement = false;

    let categories = pushdown_values(&spec.selected_categories, &mut client_refinement);
    let tags_any = pushdown_values(&spec.selected_tags, &mut client_refinement);

    if !spec.search_query.trim().is_empty() {
        client_refinement = true;
    }

    // Favorite-aware ordering and locale collation happen in memory, so the
    // row cap has to wait for them.
    let order_in_memory = ctx.favorites.is_some() || spec.sort_field.effective() == SortField::Title;

    let repository_limit = if client_refinement || order_in_memory {
        None
    } else {
        ctx.limit
    };

    QueryPlan {
        filter: PromptFilter {
            is_public: spec.is_public,
            author_id: ctx.author_id.map(str::to_string),
            categories,
            tags_any,
        },
        sort: PromptSort {
            field: spec.sort_field.effective(),
            direction: spec.sort_direction,
        },
        repository_limit,
        client_refinement,
    }
}

fn pushdown_values(
    selected: &std::collections::BTreeSet<String>,
    client_refinement: &mut bool,
) -> Option<Vec<String>> {
    if selected.is_empty() {
        None
    } else if selected.len() > MAX_PUSHDOWN_VALUES {
        *client_refinement = true;
        None
    } else {
        Some(selected.iter().cloned().collect())
    }
}
