//! Runtime feature toggles.
//!
//! The store holds a flat key/value map; each run reads it once and parses it
//! into [`FeatureFlags`]. Unrecognised keys are ignored, missing keys are off.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw settings map as persisted.
pub type Settings = BTreeMap<String, Value>;

pub const AUTO_DISPATCH_ENABLED: &str = "AUTO_DISPATCH_ENABLED";
pub const BILLING_ENABLED: &str = "BILLING_ENABLED";
pub const DOCUSIGN_ENABLED: &str = "DOCUSIGN_ENABLED";
pub const BRAIN_ENABLED: &str = "BRAIN_ENABLED";
pub const FOLLOW_UP_ENABLED: &str = "FOLLOW_UP_ENABLED";
pub const OUTREACH_ENABLED: &str = "OUTREACH_ENABLED";
pub const CRAWLER_ENABLED: &str = "CRAWLER_ENABLED";
pub const DAILY_SUPPLIER_PING_ENABLED: &str = "DAILY_SUPPLIER_PING_ENABLED";

pub const KNOWN_KEYS: [&str; 8] = [
    AUTO_DISPATCH_ENABLED,
    BILLING_ENABLED,
    DOCUSIGN_ENABLED,
    BRAIN_ENABLED,
    FOLLOW_UP_ENABLED,
    OUTREACH_ENABLED,
    CRAWLER_ENABLED,
    DAILY_SUPPLIER_PING_ENABLED,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub dispatch_enabled: bool,
    pub billing_enabled: bool,
    pub signature_enabled: bool,
    pub brain_enabled: bool,
    pub follow_up_enabled: bool,
    pub outreach_enabled: bool,
    pub crawler_enabled: bool,
    pub supplier_ping_enabled: bool,
}

impl FeatureFlags {
    pub fn from_settings(settings: &Settings) -> Self {
        let flag = |key: &str| settings.get(key).is_some_and(truthy);
        Self {
            dispatch_enabled: flag(AUTO_DISPATCH_ENABLED),
            billing_enabled: flag(BILLING_ENABLED),
            signature_enabled: flag(DOCUSIGN_ENABLED),
            brain_enabled: flag(BRAIN_ENABLED),
            follow_up_enabled: flag(FOLLOW_UP_ENABLED),
            outreach_enabled: flag(OUTREACH_ENABLED),
            crawler_enabled: flag(CRAWLER_ENABLED),
            supplier_ping_enabled: flag(DAILY_SUPPLIER_PING_ENABLED),
        }
    }
}

/// JSON truthiness for toggles written by hand or by older tooling.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "on"
        ),
        Value::Null | Value::Array(_) | Value::Object(_) => false,
    }
}

/// Parse a value typed on the command line: JSON if it parses, otherwise a string.
pub fn parse_setting_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_keys_are_off() {
        assert_eq!(FeatureFlags::from_settings(&Settings::new()), FeatureFlags::default());
    }

    #[test]
    fn mixed_representations() {
        let mut s = Settings::new();
        s.insert(AUTO_DISPATCH_ENABLED.into(), json!(true));
        s.insert(BILLING_ENABLED.into(), json!("true"));
        s.insert(DOCUSIGN_ENABLED.into(), json!(1));
        s.insert(BRAIN_ENABLED.into(), json!("false"));
        s.insert(FOLLOW_UP_ENABLED.into(), json!(0));
        let flags = FeatureFlags::from_settings(&s);
        assert!(flags.dispatch_enabled);
        assert!(flags.billing_enabled);
        assert!(flags.signature_enabled);
        assert!(!flags.brain_enabled);
        assert!(!flags.follow_up_enabled);
        assert!(!flags.outreach_enabled);
    }

    #[test]
    fn cli_values() {
        assert_eq!(parse_setting_value("true"), json!(true));
        assert_eq!(parse_setting_value("12"), json!(12));
        assert_eq!(parse_setting_value("hello"), json!("hello"));
    }
}
