//! Custom rules: caller-defined predicates that override every other layer.

use siteshift_config::{RuleCondition, RuleConfig};
use siteshift_core::context::VisitContext;
use std::sync::Arc;

type Matcher = Arc<dyn Fn(&VisitContext) -> bool + Send + Sync>;

/// A named predicate over the visit context.
#[derive(Clone)]
pub struct CustomRule {
    name: String,
    intent: Option<String>,
    matcher: Matcher,
}

impl CustomRule {
    pub fn new(name: impl Into<String>, matcher: impl Fn(&VisitContext) -> bool + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            intent: None,
            matcher: Arc::new(matcher),
        }
    }

    /// Resolve to `intent` instead of the rule name.
    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }

    /// Build a rule from its declarative form.
    pub fn from_config(config: &RuleConfig) -> Self {
        let condition = config.when.clone();
        Self {
            name: config.name.clone(),
            intent: config.intent.clone(),
            matcher: Arc::new(move |ctx: &VisitContext| condition_matches(&condition, ctx)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The rule's intent, or its name when none was given.
    pub fn intent(&self) -> &str {
        self.intent.as_deref().unwrap_or(&self.name)
    }

    pub fn matches(&self, ctx: &VisitContext) -> bool {
        (self.matcher)(ctx)
    }
}

impl std::fmt::Debug for CustomRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomRule")
            .field("name", &self.name)
            .field("intent", &self.intent)
            .finish_non_exhaustive()
    }
}

/// Rules in declaration order; the first match wins.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CustomRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_configs(configs: &[RuleConfig]) -> Self {
        Self {
            rules: configs.iter().map(CustomRule::from_config).collect(),
        }
    }

    pub fn push(&mut self, rule: CustomRule) {
        self.rules.push(rule);
    }

    pub fn with(mut self, rule: CustomRule) -> Self {
        self.push(rule);
        self
    }

    pub fn first_match(&self, ctx: &VisitContext) -> Option<&CustomRule> {
        self.rules.iter().find(|rule| rule.matches(ctx))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Every present field must match, ignoring case. An empty condition never matches.
fn condition_matches(condition: &RuleCondition, ctx: &VisitContext) -> bool {
    if condition.is_empty() {
        return false;
    }

    let equals = |expected: &Option<String>, actual: Option<&str>| match expected {
        None => true,
        Some(expected) => actual.is_some_and(|a| a.eq_ignore_ascii_case(expected)),
    };

    let campaign_ok = match &condition.utm_campaign_contains {
        None => true,
        Some(needle) => ctx
            .utm_value("campaign")
            .is_some_and(|c| c.to_lowercase().contains(&needle.to_lowercase())),
    };

    equals(&condition.utm_source, ctx.utm_value("source"))
        && equals(&condition.utm_medium, ctx.utm_value("medium"))
        && campaign_ok
        && equals(&condition.referrer_source, Some(ctx.referrer.source.as_str()))
        && equals(&condition.referrer_category, Some(ctx.referrer.category.as_str()))
        && equals(&condition.device, Some(ctx.device_class().as_str()))
}
