//! Debounced search input.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use super::FilterStore;

/// Commits search input to a [`FilterStore`] once the input has been quiet
/// for the configured delay. Newer input replaces a pending commit.
///
/// Input is trimmed before it is committed. Clearing the input commits the
/// empty query at once.
///
/// Must be used from within a Tokio runtime.
pub struct SearchDebouncer {
    store: Arc<FilterStore>,
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl SearchDebouncer {
    pub fn new(store: Arc<FilterStore>, delay: Duration) -> Self {
        Self {
            store,
            delay,
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `query` to be committed after the delay.
    pub fn input(&self, query: impl AsRef<str>) {
        let query = query.as_ref().trim().to_string();

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            previous.abort();
        }

        if query.is_empty() {
            self.store.set_search_query(query);
            return;
        }

        let store = self.store.clone();
        let delay = self.delay;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::trace!("Committing debounced search query");
            store.set_search_query(query);
        }));
    }

    /// Drop any pending commit.
    pub fn cancel(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            previous.abort();
        }
    }
}

impl Drop for SearchDebouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
