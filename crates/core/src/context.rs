//! Visit context — the immutable traffic snapshot taken once per page view.
//!
//! Contexts are produced by an external [`ContextProvider`] (UTM extraction,
//! referrer classification, device detection and intent inference all happen
//! there). The decision engine only consumes them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Traffic metadata for a single page view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitContext {
    /// UTM parameters keyed by their full name (`utm_source`, `utm_campaign`, ...)
    #[serde(default)]
    pub utm: BTreeMap<String, String>,

    #[serde(default)]
    pub referrer: ReferrerInfo,

    #[serde(default)]
    pub device: DeviceInfo,

    /// Epoch milliseconds
    #[serde(default)]
    pub timestamp: i64,

    #[serde(default, rename = "hasUTM")]
    pub has_utm: bool,

    /// Intent inferred by the context provider's classifier
    #[serde(default = "default_intent")]
    pub primary_intent: String,
}

fn default_intent() -> String {
    "default".into()
}

/// Where the visitor came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferrerInfo {
    #[serde(default = "direct")]
    pub source: String,

    #[serde(default = "direct")]
    pub category: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

fn direct() -> String {
    "direct".into()
}

impl Default for ReferrerInfo {
    fn default() -> Self {
        Self {
            source: direct(),
            category: direct(),
            url: None,
        }
    }
}

impl ReferrerInfo {
    /// True when the visitor arrived from somewhere other than a direct visit.
    pub fn is_external(&self) -> bool {
        !self.source.is_empty() && !self.source.eq_ignore_ascii_case("direct")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(default)]
    pub is_mobile: bool,
    #[serde(default)]
    pub is_tablet: bool,
    #[serde(default)]
    pub is_desktop: bool,
}

/// Coarse device class; the only device detail that is ever persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceInfo {
    pub fn class(&self) -> DeviceClass {
        if self.is_mobile {
            DeviceClass::Mobile
        } else if self.is_tablet {
            DeviceClass::Tablet
        } else {
            DeviceClass::Desktop
        }
    }
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mobile => "mobile",
            Self::Tablet => "tablet",
            Self::Desktop => "desktop",
        }
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl VisitContext {
    /// A direct, desktop, UTM-less visit at the given time.
    pub fn new(timestamp: i64) -> Self {
        Self {
            utm: BTreeMap::new(),
            referrer: ReferrerInfo::default(),
            device: DeviceInfo {
                is_desktop: true,
                ..DeviceInfo::default()
            },
            timestamp,
            has_utm: false,
            primary_intent: default_intent(),
        }
    }

    /// Look up a UTM field by short (`source`) or full (`utm_source`) name.
    pub fn utm_value(&self, field: &str) -> Option<&str> {
        let full = if field.starts_with("utm_") {
            field.to_string()
        } else {
            format!("utm_{field}")
        };
        self.utm.get(&full).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn device_class(&self) -> DeviceClass {
        self.device.class()
    }

    pub fn with_utm(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.utm.insert(key.into(), value.into());
        self.has_utm = true;
        self
    }

    pub fn with_referrer(mut self, source: impl Into<String>, category: impl Into<String>) -> Self {
        self.referrer.source = source.into();
        self.referrer.category = category.into();
        self
    }

    pub fn with_device(mut self, class: DeviceClass) -> Self {
        self.device = DeviceInfo {
            is_mobile: class == DeviceClass::Mobile,
            is_tablet: class == DeviceClass::Tablet,
            is_desktop: class == DeviceClass::Desktop,
        };
        self
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.primary_intent = intent.into();
        self
    }
}

/// Produces the context for the current page view.
///
/// Used when a decision request does not carry its own context.
pub trait ContextProvider: Send + Sync {
    fn current(&self) -> VisitContext;
}

/// A provider that always hands out the same context.
pub struct StaticContext(pub VisitContext);

impl ContextProvider for StaticContext {
    fn current(&self) -> VisitContext {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utm_lookup_accepts_short_and_full_names() {
        let ctx = VisitContext::new(0).with_utm("utm_campaign", "gaming_console");
        assert_eq!(ctx.utm_value("campaign"), Some("gaming_console"));
        assert_eq!(ctx.utm_value("utm_campaign"), Some("gaming_console"));
        assert_eq!(ctx.utm_value("medium"), None);
        assert!(ctx.has_utm);
    }

    #[test]
    fn device_class_prefers_mobile() {
        let device = DeviceInfo {
            is_mobile: true,
            is_tablet: true,
            is_desktop: false,
        };
        assert_eq!(device.class(), DeviceClass::Mobile);
        assert_eq!(DeviceInfo::default().class(), DeviceClass::Desktop);
    }

    #[test]
    fn direct_referrer_is_not_external() {
        assert!(!ReferrerInfo::default().is_external());
        let ctx = VisitContext::new(0).with_referrer("google", "search");
        assert!(ctx.referrer.is_external());
    }

    #[test]
    fn deserializes_camel_case_contract() {
        let json = r#"{
            "utm": {"utm_source": "reddit"},
            "referrer": {"source": "reddit", "category": "social"},
            "device": {"isMobile": true},
            "timestamp": 1700000000000,
            "hasUTM": true,
            "primaryIntent": "gaming"
        }"#;
        let ctx: VisitContext = serde_json::from_str(json).unwrap();
        assert!(ctx.has_utm);
        assert_eq!(ctx.primary_intent, "gaming");
        assert_eq!(ctx.device_class(), DeviceClass::Mobile);
        assert_eq!(ctx.referrer.category, "social");
    }
}
