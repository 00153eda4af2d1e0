//! Decision cache — reuses AI decisions across visits from the same traffic segment.
//!
//! The cache key is a lossy fingerprint of the context: mode, UTM
//! source/medium/campaign, referrer source and device class. Campaign
//! content/term and the timestamp are left out on purpose so that materially
//! identical visitors share one model call.

use serde::{Deserialize, Serialize};
use siteshift_core::context::VisitContext;
use siteshift_core::decision::{Decision, DecisionSource};
use siteshift_core::gateway::Mode;
use siteshift_core::store::KeyValueStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const CACHE_PREFIX: &str = "siteshift_cache_";

/// What is persisted per cache key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub decision: Decision,
    /// Epoch milliseconds
    pub cached_at: i64,
}

pub struct DecisionCache {
    store: Arc<dyn KeyValueStore>,
}

impl DecisionCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Storage key for a context in the given mode.
    ///
    /// The fields are encoded as a JSON array, so separators inside values
    /// cannot make two segments collide. Values are compared as given.
    pub fn key_for(mode: Mode, ctx: &VisitContext) -> String {
        let fields = serde_json::json!([
            mode.as_str(),
            ctx.utm_value("source"),
            ctx.utm_value("medium"),
            ctx.utm_value("campaign"),
            ctx.referrer.source,
            ctx.device_class().as_str(),
        ]);
        format!("{CACHE_PREFIX}{fields}")
    }

    /// A fresh cached decision relabelled `ai-cached`, or `None`.
    ///
    /// Expired, malformed and non-AI entries are removed on sight.
    pub async fn get(&self, key: &str, ttl: Duration) -> Option<Decision> {
        self.get_at(key, ttl, crate::now_ms()).await
    }

    async fn get_at(&self, key: &str, ttl: Duration, now_ms: i64) -> Option<Decision> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(error = %err, "Decision cache unavailable");
                return None;
            }
        };

        let entry = match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) if entry.decision.source() == DecisionSource::Ai && entry.decision.is_consistent() => entry,
            _ => {
                warn!(key, "Dropping malformed cache entry");
                self.remove_quietly(key).await;
                return None;
            }
        };

        if is_expired(entry.cached_at, ttl, now_ms) {
            debug!(key, "Cache entry expired");
            self.remove_quietly(key).await;
            return None;
        }

        Some(entry.decision.into_cached())
    }

    /// Store an AI decision. Anything else is ignored; returns whether it was written.
    pub async fn put(&self, key: &str, decision: &Decision) -> bool {
        self.put_at(key, decision, crate::now_ms()).await
    }

    async fn put_at(&self, key: &str, decision: &Decision, now_ms: i64) -> bool {
        if decision.source() != DecisionSource::Ai {
            return false;
        }

        let entry = CacheEntry {
            decision: decision.clone(),
            cached_at: now_ms,
        };
        let serialized = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "Failed to serialize cache entry");
                return false;
            }
        };

        match self.store.set(key, serialized).await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "Failed to write decision cache");
                false
            }
        }
    }

    /// Remove every cache entry. Returns how many were removed.
    pub async fn clear(&self) -> usize {
        let keys = self.cache_keys().await;
        let mut removed = 0;
        for key in keys {
            if self.store.remove(&key).await.is_ok() {
                removed += 1;
            }
        }
        removed
    }

    /// Remove expired and malformed entries. Returns how many were removed.
    pub async fn purge_expired(&self, ttl: Duration) -> usize {
        let now_ms = crate::now_ms();
        let mut removed = 0;
        for key in self.cache_keys().await {
            let stale = match self.store.get(&key).await {
                Ok(Some(raw)) => serde_json::from_str::<CacheEntry>(&raw)
                    .map(|entry| is_expired(entry.cached_at, ttl, now_ms))
                    .unwrap_or(true),
                Ok(None) => false,
                Err(_) => continue,
            };
            if stale && self.store.remove(&key).await.is_ok() {
                removed += 1;
            }
        }
        removed
    }

    async fn cache_keys(&self) -> Vec<String> {
        match self.store.keys().await {
            Ok(keys) => keys.into_iter().filter(|k| k.starts_with(CACHE_PREFIX)).collect(),
            Err(err) => {
                warn!(error = %err, "Cannot enumerate decision cache");
                Vec::new()
            }
        }
    }

    async fn remove_quietly(&self, key: &str) {
        if let Err(err) = self.store.remove(key).await {
            warn!(key, error = %err, "Failed to remove cache entry");
        }
    }
}

fn is_expired(cached_at: i64, ttl: Duration, now_ms: i64) -> bool {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now_ms.saturating_sub(cached_at) >= ttl_ms
}
