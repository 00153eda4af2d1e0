//! The decision policy: custom rule → cache → history → prompt → model and
//! validate (retried together) → record & cache, with the deterministic engine as fallback.
//!
//! Collaborators are injected at construction. Nothing is looked up at
//! runtime, and the policy never reaches back into them except through
//! their traits.

use crate::prompt::{PromptInput, build_messages};
use crate::rules::RuleSet;
use crate::standard::{Resolved, StandardEngine, StandardOptions};
use crate::validate;
use siteshift_config::RawModelConfig;
use siteshift_core::context::{ContextProvider, VisitContext};
use siteshift_core::decision::{Decision, ModelResponseMeta, Template, TemplateCatalog};
use siteshift_core::error::{ModelError, Result};
use siteshift_core::gateway::{Mode, ModelConfig, ModelGateway, ModelReply};
use siteshift_core::history::{HistoryLimits, HistoryStore, VisitInput, VisitSource};
use siteshift_memory::{DecisionCache, aggregate_preferences, weighted_view};
use siteshift_providers::invoke_with_retry;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Variant label recorded for generated content.
const GENERATED_VARIANT: &str = "generated";

/// One personalization request.
#[derive(Debug, Clone, Default)]
pub struct DecisionRequest {
    pub templates: TemplateCatalog,
    /// AI settings; the AI path runs only when present and enabled
    pub ai: Option<RawModelConfig>,
    /// Taken from the context provider when absent
    pub context: Option<VisitContext>,
    pub rules: RuleSet,
    pub options: StandardOptions,
}

impl DecisionRequest {
    pub fn new(templates: TemplateCatalog) -> Self {
        Self {
            templates,
            ..Self::default()
        }
    }

    pub fn with_ai(mut self, ai: RawModelConfig) -> Self {
        self.ai = Some(ai);
        self
    }

    pub fn with_context(mut self, context: VisitContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_options(mut self, options: StandardOptions) -> Self {
        self.options = options;
        self
    }
}

/// Orchestrates one decision per call.
pub struct DecisionPolicy {
    history: Arc<dyn HistoryStore>,
    gateway: Arc<dyn ModelGateway>,
    cache: DecisionCache,
    context_provider: Arc<dyn ContextProvider>,
}

impl DecisionPolicy {
    pub fn new(
        history: Arc<dyn HistoryStore>,
        gateway: Arc<dyn ModelGateway>,
        cache: DecisionCache,
        context_provider: Arc<dyn ContextProvider>,
    ) -> Self {
        Self {
            history,
            gateway,
            cache,
            context_provider,
        }
    }

    /// Produce a decision.
    ///
    /// Fails only on configuration errors, or on AI failures when
    /// `fallbackToStandard` is off.
    pub async fn decide(&self, request: DecisionRequest) -> Result<Decision> {
        let ctx = match &request.context {
            Some(ctx) => ctx.clone(),
            None => self.context_provider.current(),
        };

        let raw = match request.ai.as_ref().filter(|ai| ai.enabled) {
            Some(raw) => raw,
            None => {
                debug!("AI disabled, using deterministic engine");
                let record = request.options.record_history;
                return Ok(self.standard(&request, &ctx, record, request.options.history).await);
            }
        };

        if request.rules.first_match(&ctx).is_some() {
            let record = request.options.record_history;
            return Ok(self.standard(&request, &ctx, record, request.options.history).await);
        }

        let config = raw.normalize()?;
        let record = config.history_enabled;

        if config.mode == Mode::Select && request.templates.is_empty() {
            warn!("Select mode needs a non-empty catalog, skipping model call");
            return Ok(self.standard(&request, &ctx, record, config.history).await);
        }

        let cache_key = DecisionCache::key_for(config.mode, &ctx);
        if config.cache_enabled {
            if let Some(hit) = self.cache.get(&cache_key, config.cache_ttl).await {
                debug!(key = %cache_key, "Decision cache hit");
                return Ok(hit);
            }
        }

        match self.model_decision(&request.templates, &ctx, &config).await {
            Ok(resolved) => {
                info!(
                    intent = resolved.decision.intent(),
                    variant = resolved.variant.as_deref().unwrap_or("none"),
                    "AI decision"
                );
                if record {
                    self.record(&resolved, config.history).await;
                }
                if config.cache_enabled {
                    self.cache.put(&cache_key, &resolved.decision).await;
                }
                Ok(resolved.decision)
            }
            Err(err) if config.fallback_to_standard => {
                info!(error = %err, "AI path failed, falling back to deterministic engine");
                Ok(self.standard(&request, &ctx, record, config.history).await)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// History refresh, prompt, model call and validation.
    async fn model_decision(
        &self,
        catalog: &TemplateCatalog,
        ctx: &VisitContext,
        config: &ModelConfig,
    ) -> std::result::Result<Resolved, ModelError> {
        let (history, preferences) = if config.history_enabled {
            let history = self.history.load().await;
            let all = weighted_view(&history, config.history.decay_rate, usize::MAX);
            let preferences = aggregate_preferences(&all);
            let window = all.into_iter().take(config.history_window).collect();
            (window, preferences)
        } else {
            (Vec::new(), BTreeMap::new())
        };

        let messages = build_messages(
            &PromptInput {
                context: ctx,
                history: &history,
                preferences: &preferences,
                catalog,
            },
            config,
        );

        invoke_with_retry(self.gateway.as_ref(), &messages, config, |reply| {
            resolve_reply(reply, catalog, ctx, config.mode)
        })
        .await
    }

    async fn standard(
        &self,
        request: &DecisionRequest,
        ctx: &VisitContext,
        record: bool,
        limits: HistoryLimits,
    ) -> Decision {
        let resolved = StandardEngine::decide(&request.templates, ctx, &request.rules, &request.options);
        info!(
            source = %resolved.decision.source(),
            intent = resolved.decision.intent(),
            "Deterministic decision"
        );
        if record {
            self.record(&resolved, limits).await;
        }
        resolved.decision
    }

    /// Append a visit for a new observation. Cache hits and errors are skipped.
    async fn record(&self, resolved: &Resolved, limits: HistoryLimits) {
        let decision = &resolved.decision;
        let Some(source) = VisitSource::from_decision(decision.source()) else {
            return;
        };
        self.history
            .record_visit(
                VisitInput {
                    context: decision.context().clone(),
                    intent: decision.intent().to_string(),
                    selected_variant: resolved.variant.clone(),
                    source,
                    ai_decision: source == VisitSource::Ai,
                },
                limits,
            )
            .await;
    }
}

/// Validate a model reply and turn it into a decision.
fn resolve_reply(
    reply: ModelReply,
    catalog: &TemplateCatalog,
    ctx: &VisitContext,
    mode: Mode,
) -> std::result::Result<Resolved, ModelError> {
    let meta = ModelResponseMeta {
        confidence: validate::confidence(&reply.payload),
        reasoning: validate::reasoning(&reply.payload),
        latency: reply.latency_ms,
        model: reply.model.clone(),
        mode,
        cached: validate::proxy_cached(&reply.payload),
    };

    match mode {
        Mode::Select => {
            let key = validate::selection(&reply.payload, catalog).inspect_err(|err| {
                warn!(error = %err, "Rejected model selection");
            })?;
            let template = catalog.get(&key).cloned().unwrap_or_default();
            Ok(Resolved {
                decision: Decision::from_model(template, key.clone(), ctx.clone(), meta),
                variant: Some(key),
            })
        }
        Mode::Generate => {
            let copy = validate::generated(&reply.payload).inspect_err(|err| {
                warn!(error = %err, "Rejected generated content");
            })?;
            let base = catalog
                .get("default")
                .or_else(|| catalog.first().map(|(_, t)| t));
            let template = Template {
                headline: copy.headline,
                subheadline: copy.subheadline,
                cta_label: copy.cta_label,
                cta_link: base.map(|t| t.cta_link.clone()).unwrap_or_default(),
                image: base.and_then(|t| t.image.clone()),
            };
            Ok(Resolved {
                decision: Decision::from_model(template, ctx.primary_intent.clone(), ctx.clone(), meta),
                variant: Some(GENERATED_VARIANT.to_string()),
            })
        }
    }
}
