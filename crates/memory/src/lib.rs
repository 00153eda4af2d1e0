//! Persistence for siteshift: key-value stores, the visit history and the
//! decision cache.
//!
//! Everything here sits on top of [`siteshift_core::KeyValueStore`], so the
//! same history and cache logic runs against browser-like storage, a JSON
//! file, or nothing at all.

pub mod cache;
pub mod decay;
pub mod file_backend;
pub mod history;
pub mod in_memory;
pub mod noop;

pub use cache::{CacheEntry, DecisionCache, CACHE_PREFIX};
pub use decay::{aggregate_preferences, weight, weight_at, weighted_view};
pub use file_backend::FileStore;
pub use history::{HISTORY_KEY, KvHistoryStore};
pub use in_memory::InMemoryStore;
pub use noop::NoopStore;

/// Current wall-clock time in epoch milliseconds.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
