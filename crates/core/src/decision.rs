//! Content templates and the final personalization decision.

use crate::context::VisitContext;
use crate::gateway::Mode;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A piece of on-page content that can be swapped in for a visitor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub subheadline: String,
    #[serde(default)]
    pub cta_label: String,
    #[serde(default)]
    pub cta_link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Template {
    pub fn new(
        headline: impl Into<String>,
        subheadline: impl Into<String>,
        cta_label: impl Into<String>,
    ) -> Self {
        Self {
            headline: headline.into(),
            subheadline: subheadline.into(),
            cta_label: cta_label.into(),
            ..Self::default()
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.cta_link = link.into();
        self
    }
}

/// Named content variants in declaration order.
///
/// Serialized as a JSON object; deserialization keeps the order in which keys
/// appear in the document, since "first declared" is a lookup fallback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateCatalog {
    entries: Vec<(String, Template)>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a variant. Replacing keeps the original position.
    pub fn insert(&mut self, key: impl Into<String>, template: Template) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = template,
            None => self.entries.push((key, template)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, template: Template) -> Self {
        self.insert(key, template);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Template> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, t)| t)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Template)> {
        self.entries.iter().map(|(k, t)| (k.as_str(), t))
    }

    pub fn first(&self) -> Option<(&str, &Template)> {
        self.entries.first().map(|(k, t)| (k.as_str(), t))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Template for an intent, falling back to `default`, then to the first
    /// declared variant.
    pub fn resolve(&self, intent: &str) -> Option<&Template> {
        self.get(intent)
            .or_else(|| self.get("default"))
            .or_else(|| self.first().map(|(_, t)| t))
    }
}

impl Serialize for TemplateCatalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, template) in &self.entries {
            map.serialize_entry(key, template)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TemplateCatalog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CatalogVisitor;

        impl<'de> Visitor<'de> for CatalogVisitor {
            type Value = TemplateCatalog;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a map of variant keys to templates")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut catalog = TemplateCatalog::new();
                while let Some((key, template)) = access.next_entry::<String, Template>()? {
                    catalog.insert(key, template);
                }
                Ok(catalog)
            }
        }

        deserializer.deserialize_map(CatalogVisitor)
    }
}

/// Which layer of the decision policy produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionSource {
    Ai,
    AiCached,
    Utm,
    Referrer,
    CustomRule,
    RandomAb,
    Default,
    Error,
}

impl DecisionSource {
    pub fn is_ai(&self) -> bool {
        matches!(self, Self::Ai | Self::AiCached)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ai => "ai",
            Self::AiCached => "ai-cached",
            Self::Utm => "utm",
            Self::Referrer => "referrer",
            Self::CustomRule => "custom-rule",
            Self::RandomAb => "random-ab",
            Self::Default => "default",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Details of the model call behind an AI decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelResponseMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Milliseconds spent in the successful attempt
    pub latency: u64,
    pub model: String,
    pub mode: Mode,
    /// Set when a proxy reports the reply as served from its own cache
    #[serde(default)]
    pub cached: bool,
}

/// The outcome of one personalization call.
///
/// AI decisions (`ai`, `ai-cached`) always carry a [`ModelResponseMeta`];
/// every other source carries none. The constructors enforce this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    template: Option<Template>,
    intent: String,
    source: DecisionSource,
    context: VisitContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model_response: Option<ModelResponseMeta>,
}

impl Decision {
    /// A decision produced by a genuine model invocation.
    pub fn from_model(
        template: Template,
        intent: impl Into<String>,
        context: VisitContext,
        meta: ModelResponseMeta,
    ) -> Self {
        Self {
            template: Some(template),
            intent: intent.into(),
            source: DecisionSource::Ai,
            context,
            model_response: Some(meta),
        }
    }

    /// A decision produced without the model. AI sources are demoted to
    /// `default` since they would lack model metadata.
    pub fn standard(
        template: Option<Template>,
        intent: impl Into<String>,
        source: DecisionSource,
        context: VisitContext,
    ) -> Self {
        let source = if source.is_ai() { DecisionSource::Default } else { source };
        Self {
            template,
            intent: intent.into(),
            source,
            context,
            model_response: None,
        }
    }

    /// The same decision, relabelled as served from the local cache.
    pub fn into_cached(mut self) -> Self {
        self.source = DecisionSource::AiCached;
        self
    }

    /// Whether the source/metadata pairing holds (checked for data read back from storage).
    pub fn is_consistent(&self) -> bool {
        self.source.is_ai() == self.model_response.is_some()
    }

    pub fn template(&self) -> Option<&Template> {
        self.template.as_ref()
    }

    pub fn intent(&self) -> &str {
        &self.intent
    }

    pub fn source(&self) -> DecisionSource {
        self.source
    }

    pub fn context(&self) -> &VisitContext {
        &self.context
    }

    pub fn model_response(&self) -> Option<&ModelResponseMeta> {
        self.model_response.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> ModelResponseMeta {
        ModelResponseMeta {
            confidence: Some(0.9),
            reasoning: Some("gaming campaign".into()),
            latency: 120,
            model: "gpt-4o-mini".into(),
            mode: Mode::Select,
            cached: false,
        }
    }

    #[test]
    fn catalog_preserves_document_order() {
        let json = r#"{"zeta": {"headline": "Z"}, "alpha": {"headline": "A"}, "default": {"headline": "D"}}"#;
        let catalog: TemplateCatalog = serde_json::from_str(json).unwrap();
        let keys: Vec<&str> = catalog.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "default"]);

        let back = serde_json::to_string(&catalog).unwrap();
        assert!(back.find("zeta").unwrap() < back.find("alpha").unwrap());
    }

    #[test]
    fn resolve_falls_back_to_default_then_first() {
        let catalog = TemplateCatalog::new()
            .with("gaming", Template::new("Play", "", ""))
            .with("default", Template::new("Welcome", "", ""));
        assert_eq!(catalog.resolve("gaming").unwrap().headline, "Play");
        assert_eq!(catalog.resolve("travel").unwrap().headline, "Welcome");

        let no_default = TemplateCatalog::new().with("gaming", Template::new("Play", "", ""));
        assert_eq!(no_default.resolve("travel").unwrap().headline, "Play");
        assert!(TemplateCatalog::new().resolve("any").is_none());
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut catalog = TemplateCatalog::new()
            .with("a", Template::new("1", "", ""))
            .with("b", Template::new("2", "", ""));
        catalog.insert("a", Template::new("3", "", ""));
        assert_eq!(catalog.first().unwrap().1.headline, "3");
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn standard_decisions_never_carry_ai_source() {
        let d = Decision::standard(None, "default", DecisionSource::Ai, VisitContext::new(0));
        assert_eq!(d.source(), DecisionSource::Default);
        assert!(d.model_response().is_none());
        assert!(d.is_consistent());
    }

    #[test]
    fn cached_decision_only_changes_source() {
        let d = Decision::from_model(Template::new("Play", "", ""), "gaming", VisitContext::new(0), meta());
        let cached = d.clone().into_cached();
        assert_eq!(cached.source(), DecisionSource::AiCached);
        assert_eq!(cached.model_response(), d.model_response());
        assert_eq!(cached.template(), d.template());
    }

    #[test]
    fn source_serializes_kebab_case() {
        let json = serde_json::to_string(&DecisionSource::AiCached).unwrap();
        assert_eq!(json, "\"ai-cached\"");
        let json = serde_json::to_string(&DecisionSource::RandomAb).unwrap();
        assert_eq!(json, "\"random-ab\"");
    }
}
