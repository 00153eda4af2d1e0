//! The deterministic engine: the non-AI path and the AI fallback.
//!
//! Priority: first matching custom rule, then a uniform random variant for
//! signal-less visits (no UTM, no external referrer), then the context's
//! primary intent.

use crate::rules::RuleSet;
use rand::Rng;
use siteshift_core::context::VisitContext;
use siteshift_core::decision::{Decision, DecisionSource, TemplateCatalog};
use siteshift_core::history::HistoryLimits;
use tracing::debug;

/// Knobs for the deterministic path.
#[derive(Debug, Clone, Copy)]
pub struct StandardOptions {
    /// Pick a random variant when the visit carries no traffic signal
    pub random_fallback: bool,
    /// Record deterministic decisions in the visit history
    pub record_history: bool,
    /// History limits used when the AI path is off
    pub history: HistoryLimits,
}

impl Default for StandardOptions {
    fn default() -> Self {
        Self {
            random_fallback: true,
            record_history: true,
            history: HistoryLimits::default(),
        }
    }
}

/// A decision plus the catalog key it resolved to.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub decision: Decision,
    pub variant: Option<String>,
}

/// Catalog key for an intent: the intent itself, then `default`, then the first entry.
pub fn resolve_key(catalog: &TemplateCatalog, intent: &str) -> Option<String> {
    if catalog.contains(intent) {
        return Some(intent.to_string());
    }
    if catalog.contains("default") {
        return Some("default".to_string());
    }
    catalog.first().map(|(key, _)| key.to_string())
}

pub struct StandardEngine;

impl StandardEngine {
    pub fn decide(
        catalog: &TemplateCatalog,
        ctx: &VisitContext,
        rules: &RuleSet,
        options: &StandardOptions,
    ) -> Resolved {
        Self::decide_with(catalog, ctx, rules, options, &mut rand::rng())
    }

    /// Same as [`StandardEngine::decide`] with a caller-supplied RNG.
    pub fn decide_with<R: Rng>(
        catalog: &TemplateCatalog,
        ctx: &VisitContext,
        rules: &RuleSet,
        options: &StandardOptions,
        rng: &mut R,
    ) -> Resolved {
        if catalog.is_empty() {
            return Resolved {
                decision: Decision::standard(None, ctx.primary_intent.clone(), DecisionSource::Error, ctx.clone()),
                variant: None,
            };
        }

        let (intent, source) = if let Some(rule) = rules.first_match(ctx) {
            debug!(rule = rule.name(), "Custom rule matched");
            (rule.intent().to_string(), DecisionSource::CustomRule)
        } else if !ctx.has_utm && !ctx.referrer.is_external() && options.random_fallback {
            let keys: Vec<&str> = catalog.keys().collect();
            let pick = keys[rng.random_range(0..keys.len())];
            (pick.to_string(), DecisionSource::RandomAb)
        } else {
            let source = if ctx.has_utm {
                DecisionSource::Utm
            } else if ctx.referrer.is_external() {
                DecisionSource::Referrer
            } else {
                DecisionSource::Default
            };
            (ctx.primary_intent.clone(), source)
        };

        let variant = resolve_key(catalog, &intent);
        let template = variant.as_deref().and_then(|key| catalog.get(key)).cloned();

        Resolved {
            decision: Decision::standard(template, intent, source, ctx.clone()),
            variant,
        }
    }
}
