//! Prompt assembly for the model call.
//!
//! Builds a system/user message pair from the visit context, the weighted
//! history, the preference map and either the variant catalog (select mode)
//! or the brand profile (generate mode).
//!
//! # Determinism
//!
//! Pure functions: identical inputs always produce identical messages. The
//! JSON-only reply requirement is appended to every system message, including
//! caller overrides, because response parsing depends on it.

use siteshift_core::context::VisitContext;
use siteshift_core::decision::{Template, TemplateCatalog};
use siteshift_core::gateway::{BrandProfile, Mode, ModelConfig};
use siteshift_core::history::WeightedVisit;
use siteshift_core::message::Message;
use std::collections::BTreeMap;
use std::fmt::Write;

const SELECT_INSTRUCTION: &str = "You are a conversion-focused website personalization engine. \
Given a visitor's traffic context and browsing history, choose the single content variant \
most likely to resonate with this visitor. You must choose exactly one variant key from the \
catalog provided.";

const GENERATE_INSTRUCTION: &str = "You are a conversion-focused copywriter for a website \
personalization engine. Given a visitor's traffic context and browsing history, write hero \
content tailored to this visitor. Keep the headline to 3-8 words, the subheadline to 8-15 \
words and the call-to-action label to 2-4 words.";

const SELECT_SCHEMA: &str = r#"{"selectedVariant": "<catalog key>", "confidence": <number 0.0-1.0>, "reasoning": "<at most 50 words>"}"#;

const GENERATE_SCHEMA: &str = r#"{"headline": "<3-8 words>", "subheadline": "<8-15 words>", "ctaLabel": "<2-4 words>", "confidence": <number 0.0-1.0>, "reasoning": "<at most 50 words>"}"#;

/// Everything a prompt is built from, minus the model settings.
pub struct PromptInput<'a> {
    pub context: &'a VisitContext,
    /// Heaviest first, already limited to the history window
    pub history: &'a [WeightedVisit],
    pub preferences: &'a BTreeMap<String, f64>,
    pub catalog: &'a TemplateCatalog,
}

/// Messages for the configured mode.
pub fn build_messages(input: &PromptInput<'_>, config: &ModelConfig) -> Vec<Message> {
    match config.mode {
        Mode::Select => build_select(input, config.prompt_override.as_deref()),
        Mode::Generate => build_generate(
            input,
            config.brand_profile.as_ref(),
            config.reference_template.as_deref(),
            config.prompt_override.as_deref(),
        ),
    }
}

/// Ask the model to pick one catalog key.
pub fn build_select(input: &PromptInput<'_>, prompt_override: Option<&str>) -> Vec<Message> {
    let system = system_message(prompt_override.unwrap_or(SELECT_INSTRUCTION), SELECT_SCHEMA);

    let mut user = String::new();
    push_context(&mut user, input.context);
    push_history(&mut user, input.history, input.preferences);

    user.push_str("\n## Content variants\n");
    for (key, template) in input.catalog.iter() {
        let _ = writeln!(user, "- {key}:");
        push_template(&mut user, template, "  ");
    }

    let keys: Vec<&str> = input.catalog.keys().collect();
    let _ = write!(
        user,
        "\nChoose exactly one of: {}. Report your confidence between 0.0 and 1.0.",
        keys.join(", ")
    );

    vec![Message::system(system), Message::user(user)]
}

/// Ask the model to write new hero content.
pub fn build_generate(
    input: &PromptInput<'_>,
    brand: Option<&BrandProfile>,
    reference: Option<&str>,
    prompt_override: Option<&str>,
) -> Vec<Message> {
    let system = system_message(prompt_override.unwrap_or(GENERATE_INSTRUCTION), GENERATE_SCHEMA);

    let mut user = String::new();
    push_context(&mut user, input.context);
    push_history(&mut user, input.history, input.preferences);

    if let Some(brand) = brand {
        push_brand(&mut user, brand);
    }

    if let Some(reference) = reference {
        user.push_str("\n## Reference for tone\n");
        // A catalog key renders that template; anything else is quoted as given.
        match input.catalog.get(reference) {
            Some(template) => push_template(&mut user, template, ""),
            None => {
                let _ = writeln!(user, "{reference}");
            }
        }
    }

    user.push_str(
        "\nWrite a headline, subheadline and call-to-action label for this visitor. \
         Report your confidence between 0.0 and 1.0.",
    );

    vec![Message::system(system), Message::user(user)]
}

fn system_message(instruction: &str, schema: &str) -> String {
    format!(
        "{instruction}\n\nRespond ONLY with a JSON object, no markdown and no other text, \
         matching this schema:\n{schema}"
    )
}

fn push_context(out: &mut String, ctx: &VisitContext) {
    out.push_str("## Visitor context\n");
    if ctx.utm.is_empty() {
        out.push_str("- UTM parameters: none\n");
    } else {
        for (key, value) in &ctx.utm {
            let _ = writeln!(out, "- {key}: {value}");
        }
    }
    let _ = writeln!(
        out,
        "- Referrer: {} ({})",
        ctx.referrer.source, ctx.referrer.category
    );
    let _ = writeln!(out, "- Device: {}", ctx.device_class());
    let _ = writeln!(out, "- Inferred intent: {}", ctx.primary_intent);
}

/// History summary plus preference scores. Empty history says so explicitly.
fn push_history(out: &mut String, history: &[WeightedVisit], preferences: &BTreeMap<String, f64>) {
    out.push_str("\n## Visit history\n");
    if history.is_empty() {
        out.push_str("First visit, no history.\n");
    } else {
        for (i, entry) in history.iter().enumerate() {
            let visit = &entry.visit;
            let _ = writeln!(
                out,
                "{}. intent={} variant={} source={} referrer={} device={} (weight {:.2})",
                i + 1,
                visit.intent,
                visit.selected_variant.as_deref().unwrap_or("none"),
                visit.source.as_str(),
                visit.minimal_context.referrer.source,
                visit.minimal_context.device,
                entry.weight,
            );
        }
    }

    if !preferences.is_empty() {
        out.push_str("\n## Preference scores (recency weighted)\n");
        let mut ranked: Vec<(&String, &f64)> = preferences.iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
        for (intent, score) in ranked {
            let _ = writeln!(out, "- {intent}: {score:.2}");
        }
    }
}

fn push_template(out: &mut String, template: &Template, indent: &str) {
    let _ = writeln!(out, "{indent}headline: {}", template.headline);
    let _ = writeln!(out, "{indent}subheadline: {}", template.subheadline);
    let _ = writeln!(out, "{indent}cta: {}", template.cta_label);
}

fn push_brand(out: &mut String, brand: &BrandProfile) {
    out.push_str("\n## Brand profile\n");
    let known = [
        ("Voice", &brand.voice),
        ("Audience", &brand.audience),
        ("Product type", &brand.product_type),
        ("Industry", &brand.industry),
    ];
    for (label, value) in known {
        if let Some(value) = value {
            let _ = writeln!(out, "- {label}: {value}");
        }
    }
    for (key, value) in &brand.extra {
        match value {
            serde_json::Value::String(s) => {
                let _ = writeln!(out, "- {key}: {s}");
            }
            other => {
                let _ = writeln!(out, "- {key}: {other}");
            }
        }
    }
}
