//! Location selection and its publish/subscribe store.
//!
//! The selection is owned by one `SelectionStore`; every view (map, chart,
//! table) holds a `watch::Receiver` and recomputes from the new value.

use flumap_env::ChoroplethQuery;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Map granularity implied by a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Nation,
    State,
    County,
}

/// The current location filter.
///
/// Empty strings count as "not selected".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub state: Option<String>,
    pub county: Option<String>,
}

impl Selection {
    /// Creates a selection, dropping empty strings.
    pub fn new(state: Option<&str>, county: Option<&str>) -> Self {
        let keep = |s: Option<&str>| {
            s.map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            state: keep(state),
            county: keep(county),
        }
    }

    /// Whole-nation view.
    pub fn nation() -> Self {
        Self::default()
    }

    /// State-level view.
    pub fn state(state: &str) -> Self {
        Self::new(Some(state), None)
    }

    /// County-level view.
    pub fn county(state: &str, county: &str) -> Self {
        Self::new(Some(state), Some(county))
    }

    /// Resolves a county without a state to the nation view.
    ///
    /// The backend ignores `county` when `state` is absent, so the rest of
    /// the pipeline must not treat such a selection as a county view.
    pub fn normalized(self) -> Self {
        if self.state.is_none() && self.county.is_some() {
            warn!(
                "county {:?} selected without a state; using nation view",
                self.county
            );
            return Self::nation();
        }
        self
    }

    pub fn granularity(&self) -> Granularity {
        match (&self.state, &self.county) {
            (None, _) => Granularity::Nation,
            (Some(_), None) => Granularity::State,
            (Some(_), Some(_)) => Granularity::County,
        }
    }

    pub fn is_county_view(&self) -> bool {
        self.granularity() == Granularity::County
    }

    /// Query parameters for the choropleth endpoint.
    pub fn query(&self) -> ChoroplethQuery {
        ChoroplethQuery::new(self.state.as_deref(), self.county.as_deref())
    }
}

impl std::fmt::Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.query())
    }
}

/// Single owner of the selection; publishes changes to subscribers.
pub struct SelectionStore {
    tx: watch::Sender<Selection>,
}

impl SelectionStore {
    /// Creates a store starting at the nation view.
    pub fn new() -> Self {
        Self::with_initial(Selection::nation())
    }

    pub fn with_initial(initial: Selection) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Returns a snapshot of the current selection.
    pub fn current(&self) -> Selection {
        self.tx.borrow().clone()
    }

    /// Subscribes to selection changes.
    pub fn subscribe(&self) -> watch::Receiver<Selection> {
        self.tx.subscribe()
    }

    /// Replaces the selection. Returns true if subscribers were notified.
    pub fn set(&self, next: Selection) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!("selection {} -> {}", current, next);
            *current = next;
            true
        })
    }

    /// Selects a state and clears the county.
    pub fn select_state(&self, state: &str) -> bool {
        self.set(Selection::state(state))
    }

    /// Selects a county within the current state.
    pub fn select_county(&self, county: &str) -> bool {
        let state = self.current().state;
        self.set(Selection::new(state.as_deref(), Some(county)))
    }

    /// Back to the nation view.
    pub fn clear(&self) -> bool {
        self.set(Selection::nation())
    }
}

impl Default for SelectionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_granularity() {
        assert_eq!(Selection::nation().granularity(), Granularity::Nation);
        assert_eq!(Selection::state("IA").granularity(), Granularity::State);
        assert_eq!(Selection::county("IA", "Sioux").granularity(), Granularity::County);
    }

    #[test]
    fn test_empty_strings_are_absent() {
        let sel = Selection::new(Some(""), Some("  "));
        assert_eq!(sel, Selection::nation());
    }

    #[test]
    fn test_county_without_state_normalizes_to_nation() {
        let sel = Selection::new(None, Some("Sioux")).normalized();
        assert_eq!(sel, Selection::nation());
        assert!(!sel.is_county_view());
    }

    #[test]
    fn test_query_mapping() {
        let q = Selection::county("AK", "Anchorage").query();
        assert_eq!(q.state.as_deref(), Some("AK"));
        assert_eq!(q.county.as_deref(), Some("Anchorage"));
    }

    #[test]
    fn test_select_state_clears_county() {
        let store = SelectionStore::with_initial(Selection::county("IA", "Sioux"));
        store.select_state("MN");
        assert_eq!(store.current(), Selection::state("MN"));
    }

    #[test]
    fn test_select_county_keeps_state() {
        let store = SelectionStore::new();
        store.select_state("IA");
        store.select_county("Sioux");
        assert_eq!(store.current(), Selection::county("IA", "Sioux"));
    }

    #[tokio::test]
    async fn test_subscribers_notified_only_on_change() {
        let store = SelectionStore::new();
        let mut rx = store.subscribe();

        assert!(!store.clear());
        assert!(!rx.has_changed().unwrap());

        assert!(store.select_state("CA"));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Selection::state("CA"));
    }
}
