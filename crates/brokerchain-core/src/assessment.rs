use serde::{Deserialize, Serialize};

/// Advisory qualification produced by the LLM for a single lead.
///
/// Always present in this shape: when the model call fails the conservative
/// [`Default`] is used instead (`qualified: false`, `confidence: 0.0`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadAssessment {
    #[serde(default)]
    pub qualified: bool,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_urgency")]
    pub urgency: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub reasoning: String,
    /// Estimated job value in USD, if the model offered one.
    #[serde(default)]
    pub estimated_value: Option<f64>,
    #[serde(default)]
    pub key_requirements: Vec<String>,
}

fn default_category() -> String {
    "general".to_string()
}

fn default_urgency() -> String {
    "unknown".to_string()
}

impl Default for LeadAssessment {
    fn default() -> Self {
        Self {
            qualified: false,
            category: default_category(),
            urgency: default_urgency(),
            confidence: 0.0,
            reasoning: String::new(),
            estimated_value: None,
            key_requirements: Vec::new(),
        }
    }
}

impl LeadAssessment {
    /// The conservative answer returned when the model cannot be consulted.
    pub fn fallback(reason: impl Into<String>) -> Self {
        Self {
            reasoning: reason.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_model_output_fills_defaults() {
        let parsed: LeadAssessment =
            serde_json::from_str(r#"{"qualified": true, "confidence": 0.9}"#).unwrap();
        assert!(parsed.qualified);
        assert_eq!(parsed.category, "general");
        assert_eq!(parsed.urgency, "unknown");
        assert!(parsed.key_requirements.is_empty());
    }

    #[test]
    fn fallback_is_unqualified() {
        let a = LeadAssessment::fallback("OPENAI_API_KEY missing");
        assert!(!a.qualified);
        assert_eq!(a.confidence, 0.0);
        assert_eq!(a.reasoning, "OPENAI_API_KEY missing");
    }
}
