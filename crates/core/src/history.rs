//! Visit history — the per-browser log of past personalization outcomes.
//!
//! The history is append-only: visits are recorded verbatim, trimmed from the
//! oldest end, and never mutated. Preferences are a derived aggregate that is
//! recomputed on every write.

use crate::context::{DeviceClass, VisitContext};
use crate::decision::DecisionSource;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Which layer produced the recorded outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisitSource {
    Ai,
    Utm,
    Referrer,
    CustomRule,
    RandomAb,
    Default,
}

impl VisitSource {
    /// The visit source for a decision that should be recorded.
    ///
    /// Cache hits and error decisions are not new observations.
    pub fn from_decision(source: DecisionSource) -> Option<Self> {
        match source {
            DecisionSource::Ai => Some(Self::Ai),
            DecisionSource::Utm => Some(Self::Utm),
            DecisionSource::Referrer => Some(Self::Referrer),
            DecisionSource::CustomRule => Some(Self::CustomRule),
            DecisionSource::RandomAb => Some(Self::RandomAb),
            DecisionSource::Default => Some(Self::Default),
            DecisionSource::AiCached | DecisionSource::Error => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ai => "ai",
            Self::Utm => "utm",
            Self::Referrer => "referrer",
            Self::CustomRule => "custom-rule",
            Self::RandomAb => "random-ab",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimalReferrer {
    pub source: String,
    pub category: String,
}

/// The persisted subset of a [`VisitContext`].
///
/// Raw user agents and URLs are never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimalContext {
    #[serde(default)]
    pub utm: BTreeMap<String, String>,
    pub referrer: MinimalReferrer,
    pub device: DeviceClass,
}

impl MinimalContext {
    pub fn from_context(ctx: &VisitContext) -> Self {
        Self {
            utm: ctx
                .utm
                .iter()
                .filter(|(k, _)| k.starts_with("utm_"))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            referrer: MinimalReferrer {
                source: ctx.referrer.source.clone(),
                category: ctx.referrer.category.clone(),
            },
            device: ctx.device_class(),
        }
    }
}

/// One recorded visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    /// Epoch milliseconds at recording time
    pub timestamp: i64,
    pub minimal_context: MinimalContext,
    pub intent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_variant: Option<String>,
    pub source: VisitSource,
    #[serde(default)]
    pub ai_decision: bool,
}

/// What the caller knows about a visit before it is recorded.
#[derive(Debug, Clone)]
pub struct VisitInput {
    pub context: VisitContext,
    pub intent: String,
    pub selected_variant: Option<String>,
    pub source: VisitSource,
    pub ai_decision: bool,
}

/// A visit annotated with its recency weight. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedVisit {
    pub visit: Visit,
    /// In `(0, 1]`
    pub weight: f64,
}

/// The persisted visitor record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    pub user_id: String,
    pub created_at: i64,
    pub visits: Vec<Visit>,
    #[serde(default)]
    pub preferences: BTreeMap<String, f64>,
}

impl History {
    /// A fresh identity with no visits.
    pub fn new(created_at: i64) -> Self {
        Self {
            user_id: Uuid::new_v4().to_string(),
            created_at,
            visits: Vec::new(),
            preferences: BTreeMap::new(),
        }
    }
}

/// Trimming and weighting parameters for history writes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryLimits {
    pub max_size: usize,
    /// Per-day weight multiplier in `(0, 1]`
    pub decay_rate: f64,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            max_size: 50,
            decay_rate: 0.9,
        }
    }
}

/// The History Store capability.
///
/// Implementations never fail: storage problems degrade to an ephemeral,
/// in-memory history instead of surfacing.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Read the history, creating (and persisting) a new identity if absent or malformed.
    async fn load(&self) -> History;

    /// Append a visit, trim to `limits.max_size`, recompute preferences.
    async fn record_visit(&self, visit: VisitInput, limits: HistoryLimits) -> History;

    /// Forget everything; the next `load` creates a new identity.
    async fn clear(&self);
}
