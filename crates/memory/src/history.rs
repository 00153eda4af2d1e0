//! History Store backed by a [`KeyValueStore`].
//!
//! The whole [`History`] lives under a single key as JSON. Storage failures
//! are never surfaced: after the first one the store switches to an
//! in-memory copy for the rest of its lifetime.

use crate::decay::{aggregate_preferences, weighted_view};
use async_trait::async_trait;
use siteshift_core::error::StorageError;
use siteshift_core::history::{History, HistoryLimits, HistoryStore, MinimalContext, Visit, VisitInput};
use siteshift_core::store::KeyValueStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const HISTORY_KEY: &str = "siteshift_history";

pub struct KvHistoryStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
    degraded: AtomicBool,
    ephemeral: Mutex<Option<History>>,
}

impl KvHistoryStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, HISTORY_KEY)
    }

    /// Use a custom storage key (e.g. one history per site).
    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            degraded: AtomicBool::new(false),
            ephemeral: Mutex::new(None),
        }
    }

    /// Whether a storage failure has switched this store to memory only.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    async fn degrade(&self, err: &StorageError, history: History) -> History {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            warn!(backend = self.store.name(), error = %err, "History storage unavailable, continuing in memory");
        }
        *self.ephemeral.lock().await = Some(history.clone());
        history
    }

    /// Persist, or fall back to memory if that fails.
    async fn save(&self, history: History) -> History {
        if self.is_degraded() {
            *self.ephemeral.lock().await = Some(history.clone());
            return history;
        }

        let serialized = match serde_json::to_string(&history) {
            Ok(s) => s,
            Err(e) => {
                let err = StorageError::Write(e.to_string());
                return self.degrade(&err, history).await;
            }
        };

        match self.store.set(&self.key, serialized).await {
            Ok(()) => history,
            Err(err) => self.degrade(&err, history).await,
        }
    }

    /// Create a fresh identity and persist it.
    async fn fresh(&self) -> History {
        let history = History::new(crate::now_ms());
        debug!(user_id = %history.user_id, "Created new visitor history");
        self.save(history).await
    }
}

/// Accepts only an object whose `visits` is an array and that decodes fully.
fn parse_history(raw: &str) -> Option<History> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    if !value.is_object() || !value.get("visits").is_some_and(|v| v.is_array()) {
        return None;
    }
    serde_json::from_value(value).ok()
}

#[async_trait]
impl HistoryStore for KvHistoryStore {
    async fn load(&self) -> History {
        if self.is_degraded() {
            let mut ephemeral = self.ephemeral.lock().await;
            return ephemeral
                .get_or_insert_with(|| History::new(crate::now_ms()))
                .clone();
        }

        match self.store.get(&self.key).await {
            Ok(Some(raw)) => match parse_history(&raw) {
                Some(history) => history,
                None => {
                    warn!(key = %self.key, "Replacing malformed visitor history");
                    self.fresh().await
                }
            },
            Ok(None) => self.fresh().await,
            Err(err) => self.degrade(&err, History::new(crate::now_ms())).await,
        }
    }

    async fn record_visit(&self, input: VisitInput, limits: HistoryLimits) -> History {
        let mut history = self.load().await;

        history.visits.push(Visit {
            timestamp: crate::now_ms(),
            minimal_context: MinimalContext::from_context(&input.context),
            intent: input.intent,
            selected_variant: input.selected_variant,
            source: input.source,
            ai_decision: input.ai_decision,
        });

        let max_size = limits.max_size.max(1);
        if history.visits.len() > max_size {
            let overflow = history.visits.len() - max_size;
            history.visits.drain(..overflow);
        }

        let weighted = weighted_view(&history, limits.decay_rate, usize::MAX);
        history.preferences = aggregate_preferences(&weighted);

        debug!(visits = history.visits.len(), "Recorded visit");
        self.save(history).await
    }

    async fn clear(&self) {
        *self.ephemeral.lock().await = None;
        if self.is_degraded() {
            return;
        }
        if let Err(err) = self.store.remove(&self.key).await {
            warn!(error = %err, "Failed to clear visitor history");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryStore;
    use crate::noop::NoopStore;
    use siteshift_core::context::VisitContext;
    use siteshift_core::history::VisitSource;

    fn input(intent: &str) -> VisitInput {
        VisitInput {
            context: VisitContext::new(0).with_utm("utm_source", "reddit"),
            intent: intent.into(),
            selected_variant: Some(intent.into()),
            source: VisitSource::Utm,
            ai_decision: false,
        }
    }

    fn limits(max_size: usize) -> HistoryLimits {
        HistoryLimits { max_size, decay_rate: 0.9 }
    }

    #[tokio::test]
    async fn load_creates_and_persists_identity() {
        let kv = Arc::new(InMemoryStore::new());
        let store = KvHistoryStore::new(kv.clone());

        let first = store.load().await;
        let second = store.load().await;
        assert_eq!(first.user_id, second.user_id);
        assert!(kv.get(HISTORY_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn malformed_history_is_replaced() {
        let kv = Arc::new(InMemoryStore::new());
        kv.set(HISTORY_KEY, r#"{"userId":"x","visits":"nope"}"#.into()).await.unwrap();
        let store = KvHistoryStore::new(kv.clone());

        let history = store.load().await;
        assert_ne!(history.user_id, "x");
        assert!(history.visits.is_empty());

        let stored = kv.get(HISTORY_KEY).await.unwrap().unwrap();
        assert!(stored.contains(&history.user_id));
    }

    #[tokio::test]
    async fn non_object_history_is_replaced() {
        let kv = Arc::new(InMemoryStore::new());
        kv.set(HISTORY_KEY, "[1,2,3]".into()).await.unwrap();
        let history = KvHistoryStore::new(kv).load().await;
        assert!(history.visits.is_empty());
    }

    #[tokio::test]
    async fn record_trims_to_most_recent_in_order() {
        let store = KvHistoryStore::new(Arc::new(InMemoryStore::new()));
        for i in 0..8 {
            store.record_visit(input(&format!("intent{i}")), limits(5)).await;
        }

        let history = store.load().await;
        let intents: Vec<&str> = history.visits.iter().map(|v| v.intent.as_str()).collect();
        assert_eq!(intents, vec!["intent3", "intent4", "intent5", "intent6", "intent7"]);
    }

    #[tokio::test]
    async fn record_recomputes_preferences() {
        let store = KvHistoryStore::new(Arc::new(InMemoryStore::new()));
        store.record_visit(input("gaming"), limits(10)).await;
        store.record_visit(input("default"), limits(10)).await;
        let history = store.record_visit(input("gaming"), limits(10)).await;

        assert!(!history.preferences.contains_key("default"));
        assert!(history.preferences["gaming"] > 1.9);
    }

    #[tokio::test]
    async fn record_keeps_only_minimal_context() {
        let kv = Arc::new(InMemoryStore::new());
        let store = KvHistoryStore::new(kv.clone());
        let mut visit = input("gaming");
        visit.context.referrer.url = Some("https://example.com/secret-path".into());
        store.record_visit(visit, limits(10)).await;

        let raw = kv.get(HISTORY_KEY).await.unwrap().unwrap();
        assert!(!raw.contains("secret-path"));
        assert!(raw.contains("reddit"));
    }

    #[tokio::test]
    async fn clear_creates_new_identity() {
        let store = KvHistoryStore::new(Arc::new(InMemoryStore::new()));
        let before = store.record_visit(input("gaming"), limits(10)).await;
        store.clear().await;
        let after = store.load().await;
        assert_ne!(before.user_id, after.user_id);
        assert!(after.visits.is_empty());
    }

    #[tokio::test]
    async fn storage_failure_degrades_to_memory() {
        let store = KvHistoryStore::new(Arc::new(NoopStore));
        let first = store.load().await;
        assert!(store.is_degraded());

        let recorded = store.record_visit(input("gaming"), limits(10)).await;
        assert_eq!(recorded.user_id, first.user_id);
        assert_eq!(store.load().await.visits.len(), 1);
    }
}
