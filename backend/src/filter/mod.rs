//! Filter state store.
//!
//! Holds one [`FilterSpec`] per view session. Every operation replaces the
//! spec atomically and notifies subscribers; dropping a subscription's
//! receiver unsubscribes it.

mod debounce;

pub use debounce::SearchDebouncer;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};

use crate::models::{FilterSpec, SortDirection, SortField};

/// A single filter operation, as dispatched by a remote presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FilterAction {
    SetSearchQuery { query: String },
    /// Keystroke-level search input; committed after the debounce window.
    InputSearchQuery { query: String },
    SetCategories { categories: BTreeSet<String> },
    SetTags { tags: BTreeSet<String> },
    SetSortField { field: SortField },
    SetSortDirection { direction: SortDirection },
    SetPublicFilter { value: Option<bool> },
    ToggleCategory { category: String },
    ToggleTag { tag: String },
    ToggleSortDirection,
    Reset,
}

/// Observable container for one filter spec.
#[derive(Debug)]
pub struct FilterStore {
    state: watch::Sender<FilterSpec>,
}

impl Default for FilterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterStore {
    pub fn new() -> Self {
        Self::with_spec(FilterSpec::default())
    }

    pub fn with_spec(spec: FilterSpec) -> Self {
        let (state, _) = watch::channel(spec);
        Self { state }
    }

    /// Snapshot of the current spec.
    pub fn spec(&self) -> FilterSpec {
        self.state.borrow().clone()
    }

    /// Receiver that observes every later change.
    pub fn subscribe(&self) -> watch::Receiver<FilterSpec> {
        self.state.subscribe()
    }

    pub fn search_query(&self) -> String {
        self.state.borrow().search_query.clone()
    }

    pub fn selected_categories(&self) -> BTreeSet<String> {
        self.state.borrow().selected_categories.clone()
    }

    pub fn selected_tags(&self) -> BTreeSet<String> {
        self.state.borrow().selected_tags.clone()
    }

    pub fn sort_field(&self) -> SortField {
        self.state.borrow().sort_field
    }

    pub fn sort_direction(&self) -> SortDirection {
        self.state.borrow().sort_direction
    }

    pub fn public_filter(&self) -> Option<bool> {
        self.state.borrow().is_public
    }

    pub fn set_search_query(&self, query: impl Into<String>) {
        let query = query.into();
        self.state.send_modify(|spec| spec.search_query = query);
    }

    pub fn set_categories(&self, categories: BTreeSet<String>) {
        self.state
            .send_modify(|spec| spec.selected_categories = categories);
    }

    pub fn set_tags(&self, tags: BTreeSet<String>) {
        self.state.send_modify(|spec| spec.selected_tags = tags);
    }

    pub fn set_sort_field(&self, field: SortField) {
        self.state.send_modify(|spec| spec.sort_field = field);
    }

    pub fn set_sort_direction(&self, direction: SortDirection) {
        self.state.send_modify(|spec| spec.sort_direction = direction);
    }

    pub fn set_public_filter(&self, is_public: Option<bool>) {
        self.state.send_modify(|spec| spec.is_public = is_public);
    }

    pub fn toggle_category(&self, category: &str) {
        self.state
            .send_modify(|spec| toggle_member(&mut spec.selected_categories, category));
    }

    pub fn toggle_tag(&self, tag: &str) {
        self.state
            .send_modify(|spec| toggle_member(&mut spec.selected_tags, tag));
    }

    pub fn toggle_sort_direction(&self) {
        self.state
            .send_modify(|spec| spec.sort_direction = spec.sort_direction.toggled());
    }

    pub fn reset(&self) {
        self.state.send_replace(FilterSpec::default());
    }

    /// Apply an action. Search input is committed immediately here; route it
    /// through a [`SearchDebouncer`] to rate-limit it.
    pub fn dispatch(&self, action: FilterAction) {
        match action {
            FilterAction::SetSearchQuery { query } | FilterAction::InputSearchQuery { query } => {
                self.set_search_query(query)
            }
            FilterAction::SetCategories { categories } => self.set_categories(categories),
            FilterAction::SetTags { tags } => self.set_tags(tags),
            FilterAction::SetSortField { field } => self.set_sort_field(field),
            FilterAction::SetSortDirection { direction } => self.set_sort_direction(direction),
            FilterAction::SetPublicFilter { value } => self.set_public_filter(value),
            FilterAction::ToggleCategory { category } => self.toggle_category(&category),
            FilterAction::ToggleTag { tag } => self.toggle_tag(&tag),
            FilterAction::ToggleSortDirection => self.toggle_sort_direction(),
            FilterAction::Reset => self.reset(),
        }
    }
}

fn toggle_member(set: &mut BTreeSet<String>, value: &str) {
    if !set.remove(value) {
        set.insert(value.to_string());
    }
}

/// A view session's filter store together with its search debouncer.
pub struct FilterSession {
    pub store: Arc<FilterStore>,
    debouncer: SearchDebouncer,
}

impl FilterSession {
    pub fn new(search_debounce: Duration) -> Self {
        let store = Arc::new(FilterStore::new());
        let debouncer = SearchDebouncer::new(store.clone(), search_debounce);
        Self { store, debouncer }
    }

    pub fn dispatch(&self, action: FilterAction) {
        match action {
            FilterAction::InputSearchQuery { query } => self.debouncer.input(query),
            FilterAction::SetSearchQuery { query } => {
                // A committed query supersedes any pending keystrokes.
                self.debouncer.cancel();
                self.store.set_search_query(query);
            }
            FilterAction::Reset => {
                self.debouncer.cancel();
                self.store.reset();
            }
            other => self.store.dispatch(other),
        }
    }
}

struct SessionEntry {
    session: Arc<FilterSession>,
    last_seen: Instant,
}

/// Filter sessions keyed by signed-in user id or anonymous client key.
///
/// Sessions idle for longer than `idle_timeout` are swept when a new session
/// is created, and the least recently used one is evicted once
/// `max_sessions` is reached.
pub struct FilterRegistry {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    search_debounce: Duration,
    idle_timeout: Duration,
    max_sessions: usize,
}

impl FilterRegistry {
    pub fn new(search_debounce: Duration, idle_timeout: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            search_debounce,
            idle_timeout,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Fetch the session for `key`, creating it with the default spec on first use.
    pub async fn session(&self, key: &str) -> Arc<FilterSession> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        if let Some(entry) = sessions.get_mut(key) {
            entry.last_seen = now;
            return entry.session.clone();
        }

        let idle_timeout = self.idle_timeout;
        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_seen) < idle_timeout);
        if sessions.len() < before {
            tracing::debug!("Evicted {} idle filter sessions", before - sessions.len());
        }

        while sessions.len() >= self.max_sessions {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            tracing::debug!("Filter session limit reached, evicting {}", oldest);
            sessions.remove(&oldest);
        }

        tracing::debug!("Creating filter session for {}", key);
        let session = Arc::new(FilterSession::new(self.search_debounce));
        sessions.insert(
            key.to_string(),
            SessionEntry {
                session: session.clone(),
                last_seen: now,
            },
        );
        session
    }

    /// Drop a session, e.g. on sign-out.
    pub async fn remove(&self, key: &str) {
        self.sessions.write().await.remove(key);
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
