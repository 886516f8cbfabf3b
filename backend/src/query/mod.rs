//! Prompt query engine.
//!
//! [`apply`] is a pure function from a prompt list and a [`FilterSpec`] to an
//! ordered, filtered view. Stages run in a fixed order: visibility, author,
//! category, tag, text search, sort, limit. [`fetch`] pairs it with a
//! repository using the split computed by [`plan`].

mod plan;

pub use plan::*;

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::db::PromptRepository;
use crate::errors::AppError;
use crate::models::{FilterSpec, Prompt, SortDirection, SortField};

/// Per-call inputs that are not part of the user's filter selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryContext<'a> {
    /// Restrict to prompts by this author ("my library" views).
    pub author_id: Option<&'a str>,
    /// Favorite membership of the current user. When present, favorited
    /// prompts sort first, then by favorite count, then by the requested field.
    pub favorites: Option<&'a HashMap<String, bool>>,
    /// Keep at most this many results after sorting.
    pub limit: Option<usize>,
}

/// Filter, sort and truncate `prompts` according to `spec`.
pub fn apply(prompts: Vec<Prompt>, spec: &FilterSpec, ctx: &QueryContext<'_>) -> Vec<Prompt> {
    let terms = search_terms(&spec.search_query);

    let mut results: Vec<Prompt> = prompts
        .into_iter()
        .filter(|p| matches_visibility(p, spec.is_public))
        .filter(|p| ctx.author_id.map_or(true, |author| p.author_id == author))
        .filter(|p| matches_categories(p, spec))
        .filter(|p| matches_tags(p, spec))
        .filter(|p| matches_search(p, &terms))
        .collect();

    sort_prompts(&mut results, spec, ctx.favorites);

    if let Some(limit) = ctx.limit {
        results.truncate(limit);
    }

    results
}

/// Run a listing against a repository: push down what the store can
/// evaluate, then refine and order in memory.
pub async fn fetch(
    repo: &dyn PromptRepository,
    spec: &FilterSpec,
    ctx: &QueryContext<'_>,
) -> Result<Vec<Prompt>, AppError> {
    let plan = plan(spec, ctx);
    tracing::debug!(
        "Query plan: {:?}, client refinement: {}",
        plan.filter,
        plan.client_refinement
    );

    let candidates = repo
        .query(&plan.filter, plan.sort, plan.repository_limit)
        .await?;

    Ok(apply(candidates, spec, ctx))
}

pub(crate) fn matches_visibility(prompt: &Prompt, is_public: Option<bool>) -> bool {
    is_public.map_or(true, |wanted| prompt.is_public == wanted)
}

pub(crate) fn matches_categories(prompt: &Prompt, spec: &FilterSpec) -> bool {
    spec.selected_categories.is_empty()
        || spec.selected_categories.contains(prompt.category.as_str())
}

pub(crate) fn matches_tags(prompt: &Prompt, spec: &FilterSpec) -> bool {
    spec.selected_tags.is_empty()
        || prompt
            .tags
            .iter()
            .any(|tag| spec.selected_tags.contains(tag))
}

/// Lowercased whitespace-separated terms of a search query.
pub fn search_terms(query: &str) -> Vec<String> {
    query.split_whitespace().map(str::to_lowercase).collect()
}

/// Every term must occur in the title, description or content.
pub(crate) fn matches_search(prompt: &Prompt, terms: &[String]) -> bool {
    if terms.is_empty() {
        return true;
    }

    let title = prompt.title.to_lowercase();
    let description = prompt.description.to_lowercase();
    let content = prompt.content.to_lowercase();

    terms.iter().all(|term| {
        title.contains(term.as_str())
            || description.contains(term.as_str())
            || content.contains(term.as_str())
    })
}

fn sort_prompts(
    prompts: &mut [Prompt],
    spec: &FilterSpec,
    favorites: Option<&HashMap<String, bool>>,
) {
    match favorites {
        Some(favorites) => {
            let is_favorite = |p: &Prompt| favorites.get(&p.id).copied().unwrap_or(false);
            prompts.sort_by(|a, b| {
                is_favorite(b)
                    .cmp(&is_favorite(a))
                    .then_with(|| b.favorite_count.cmp(&a.favorite_count))
                    .then_with(|| compare_by_field(a, b, spec.sort_field, spec.sort_direction))
            });
        }
        None => prompts
            .sort_by(|a, b| compare_by_field(a, b, spec.sort_field, spec.sort_direction)),
    }
}

fn compare_by_field(a: &Prompt, b: &Prompt, field: SortField, direction: SortDirection) -> Ordering {
    let ordering = match field.effective() {
        SortField::CreatedAt => a
            .created_at
            .timestamp_millis()
            .cmp(&b.created_at.timestamp_millis()),
        SortField::UpdatedAt => a
            .updated_at
            .timestamp_millis()
            .cmp(&b.updated_at.timestamp_millis()),
        SortField::Title | SortField::Category => locale_cmp(&a.title, &b.title),
    };

    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// Case-insensitive ordering; strings that differ only in case put the
/// lowercase form first.
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
        .then_with(|| b.cmp(a))
}
