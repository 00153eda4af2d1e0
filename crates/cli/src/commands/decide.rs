//! `siteshift decide` — Run one decision and print it as JSON.

use super::{load_config, open_store};
use siteshift_config::AppConfig;
use siteshift_core::{HistoryLimits, Mode, StaticContext, TemplateCatalog, VisitContext};
use siteshift_engine::{DecisionPolicy, DecisionRequest, RuleSet, StandardOptions};
use siteshift_memory::{DecisionCache, KvHistoryStore};
use siteshift_providers::HttpModelGateway;
use std::path::Path;
use std::sync::Arc;

pub async fn run(
    config_path: Option<&Path>,
    context_path: &Path,
    templates_path: &Path,
    no_ai: bool,
    mode: Option<Mode>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let context: VisitContext = read_json(context_path)?;
    let templates: TemplateCatalog = read_json(templates_path)?;

    let store = open_store(&config);
    let policy = DecisionPolicy::new(
        Arc::new(KvHistoryStore::new(store.clone())),
        Arc::new(HttpModelGateway::new()?),
        DecisionCache::new(store),
        Arc::new(StaticContext(context.clone())),
    );

    let request = build_request(&config, context, templates, no_ai, mode);
    let decision = policy.decide(request).await?;

    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}

/// Assemble the request from config and command-line overrides.
fn build_request(
    config: &AppConfig,
    context: VisitContext,
    templates: TemplateCatalog,
    no_ai: bool,
    mode: Option<Mode>,
) -> DecisionRequest {
    let mut ai = config.ai.clone();
    if no_ai {
        ai.enabled = false;
    }
    if let Some(mode) = mode {
        ai.mode = mode;
    }

    DecisionRequest::new(templates)
        .with_ai(ai)
        .with_context(context)
        .with_rules(RuleSet::from_configs(&config.rules))
        .with_options(StandardOptions {
            random_fallback: config.engine.random_fallback,
            record_history: config.engine.record_history,
            history: HistoryLimits {
                max_size: config.engine.max_history_size,
                decay_rate: config.engine.history_decay,
            },
        })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let value = serde_json::from_str(&content)
        .map_err(|e| format!("Invalid JSON in {}: {e}", path.display()))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use siteshift_config::{RuleCondition, RuleConfig};

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.ai.enabled = true;
        config.engine.random_fallback = false;
        config.engine.max_history_size = 7;
        config.rules.push(RuleConfig {
            name: "newsletter".into(),
            intent: None,
            when: RuleCondition {
                utm_medium: Some("email".into()),
                ..RuleCondition::default()
            },
        });
        config
    }

    #[test]
    fn overrides_apply_on_top_of_config() {
        let request = build_request(
            &config(),
            VisitContext::new(0),
            TemplateCatalog::new(),
            true,
            Some(Mode::Generate),
        );
        let ai = request.ai.unwrap();
        assert!(!ai.enabled);
        assert_eq!(ai.mode, Mode::Generate);
        assert_eq!(request.rules.len(), 1);
        assert!(!request.options.random_fallback);
        assert_eq!(request.options.history.max_size, 7);
    }

    #[test]
    fn read_json_reports_path_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.json");
        std::fs::write(&path, "{ nope").unwrap();

        let err = read_json::<VisitContext>(&path).unwrap_err();
        assert!(err.to_string().contains("context.json"));
    }

    #[test]
    fn read_json_parses_catalog_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("templates.json");
        std::fs::write(
            &path,
            r#"{"gaming": {"headline": "Play"}, "default": {"headline": "Hi"}}"#,
        )
        .unwrap();

        let catalog: TemplateCatalog = read_json(&path).unwrap();
        assert_eq!(catalog.keys().collect::<Vec<_>>(), vec!["gaming", "default"]);
    }
}
