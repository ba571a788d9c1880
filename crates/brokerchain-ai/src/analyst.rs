//! Advisory lead assessment and outreach drafting.
//!
//! Neither call is allowed to block the pipeline: on any failure the
//! conservative assessment or a fixed outreach template is returned.

use async_trait::async_trait;
use brokerchain_core::{Lead, LeadAssessment, Supplier};
use serde_json::json;
use tracing::{info, warn};

use crate::client::{ChatMessage, OpenAiClient};

const ASSESSMENT_SYSTEM: &str = "You qualify emergency service and procurement leads for a dispatch desk. \
Reply with one JSON object with keys: qualified (boolean), category (string), \
urgency (one of \"1-2h\", \"today\", \"this-week\", \"unknown\"), confidence (0..1), \
reasoning (one sentence), estimated_value (USD number or null), key_requirements (array of strings).";

const OUTREACH_SYSTEM: &str = "You are BrokerChain. You write first-contact emails as a real human in US business English.\n\
Style:\n\
- calm, direct, short sentences\n\
- you are Dispatch / Procurement Desk\n\
- never say you're AI\n\
- never sign a personal name\n\
- under 6 short lines.";

#[async_trait]
pub trait LeadAnalyst: Send + Sync {
    /// Assess a lead. Always returns an assessment.
    async fn process_lead(&self, lead: &Lead) -> LeadAssessment;

    /// Draft a short first-contact email to the lead's buyer about `supplier`.
    async fn generate_outreach_email(&self, lead: &Lead, supplier: &Supplier) -> String;
}

/// [`LeadAnalyst`] backed by an OpenAI-compatible model.
pub struct OpenAiAnalyst {
    client: OpenAiClient,
}

impl OpenAiAnalyst {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

pub fn assessment_prompt(lead: &Lead) -> String {
    let context = json!({
        "title": lead.title,
        "body": lead.body,
        "state": lead.state,
        "zip": lead.zip,
        "urgency": lead.urgency.as_str(),
        "buyer_type": lead.buyer_type.as_str(),
        "tenant": lead.tenant.as_str(),
        "category": lead.category,
        "authorized_under_15k": lead.authorized_under_15k,
    });
    format!("Lead: {context}\nAssess this lead.")
}

pub fn outreach_prompt(lead: &Lead, supplier: &Supplier) -> String {
    let context = json!({
        "need": lead.body,
        "category": lead.category,
        "state": lead.state,
        "urgency": lead.urgency.as_str(),
        "supplier": supplier.business_name,
        "supplier_phone": supplier.phone24h,
    });
    format!("Context: {context}\nNow draft a short outreach email:")
}

/// Parse model output into an assessment, tolerating a fenced code block.
pub fn parse_assessment(raw: &str) -> Result<LeadAssessment, serde_json::Error> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    let mut assessment: LeadAssessment = serde_json::from_str(body.trim())?;
    assessment.confidence = assessment.confidence.clamp(0.0, 1.0);
    Ok(assessment)
}

pub fn fallback_outreach(lead: &Lead, supplier: &Supplier) -> String {
    let name = if supplier.business_name.is_empty() {
        "our partner crew"
    } else {
        supplier.business_name.as_str()
    };
    format!(
        "Hello,\n\n\
         We received your {} request in {}. {} is lined up to help.\n\
         Reply with your ZIP and the best number to reach you and we will confirm timing.\n\n\
         Dispatch Desk, BrokerChain",
        lead.category, lead.state, name
    )
}

#[async_trait]
impl LeadAnalyst for OpenAiAnalyst {
    async fn process_lead(&self, lead: &Lead) -> LeadAssessment {
        let messages = [
            ChatMessage::system(ASSESSMENT_SYSTEM),
            ChatMessage::user(assessment_prompt(lead)),
        ];
        let raw = match self.client.chat(&messages, 400, true).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(lead_id = %lead.id, class = %err.class, error = %err.message, "assessment unavailable");
                return LeadAssessment::fallback(err.message);
            }
        };
        match parse_assessment(&raw) {
            Ok(assessment) => {
                info!(
                    lead_id = %lead.id,
                    qualified = assessment.qualified,
                    confidence = assessment.confidence,
                    model = self.client.model(),
                    "lead assessed"
                );
                assessment
            }
            Err(err) => {
                warn!(lead_id = %lead.id, error = %err, "assessment unparseable");
                LeadAssessment::fallback(format!("unparseable assessment: {err}"))
            }
        }
    }

    async fn generate_outreach_email(&self, lead: &Lead, supplier: &Supplier) -> String {
        let messages = [
            ChatMessage::system(OUTREACH_SYSTEM),
            ChatMessage::user(outreach_prompt(lead, supplier)),
        ];
        match self.client.chat(&messages, 200, false).await {
            Ok(text) => text.trim().to_string(),
            Err(err) => {
                warn!(lead_id = %lead.id, error = %err.message, "outreach draft fell back to template");
                fallback_outreach(lead, supplier)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::OpenAiConfig;
    use brokerchain_core::NewLead;
    use brokerchain_providers::RetryPolicy;
    use brokerchain_providers::http::test_server;
    use chrono::Utc;
    use std::time::Duration;

    fn lead() -> Lead {
        Lead::from_draft(
            NewLead {
                title: "Flooded lift station".into(),
                body: "Need 3 diesel pumps today".into(),
                state: "TX".into(),
                category: Some("water-mitigation".into()),
                ..Default::default()
            },
            "lead-1".into(),
            Utc::now(),
        )
    }

    fn supplier() -> Supplier {
        serde_json::from_str(r#"{"id":"s1","name":"Gulf Pumps","state":"TX"}"#).unwrap()
    }

    #[test]
    fn parses_plain_and_fenced_json() {
        let a = parse_assessment(r#"{"qualified":true,"confidence":0.8,"category":"water-mitigation"}"#).unwrap();
        assert!(a.qualified);
        assert_eq!(a.category, "water-mitigation");

        let fenced = "```json\n{\"qualified\": false, \"confidence\": 3.5}\n```";
        let b = parse_assessment(fenced).unwrap();
        assert!(!b.qualified);
        assert_eq!(b.confidence, 1.0);

        assert!(parse_assessment("I think it is qualified").is_err());
    }

    #[test]
    fn prompts_carry_lead_context() {
        let p = assessment_prompt(&lead());
        assert!(p.contains("Flooded lift station"));
        assert!(p.contains("federal-micro-purchase-fastlane"));
        let o = outreach_prompt(&lead(), &supplier());
        assert!(o.contains("Gulf Pumps"));
    }

    #[tokio::test]
    async fn unconfigured_model_degrades() {
        let analyst = OpenAiAnalyst::new(OpenAiClient::new(OpenAiConfig::default(), RetryPolicy::default()));
        let a = analyst.process_lead(&lead()).await;
        assert!(!a.qualified);
        assert_eq!(a.confidence, 0.0);
        assert_eq!(a.reasoning, "OPENAI_API_KEY missing");

        let email = analyst.generate_outreach_email(&lead(), &supplier()).await;
        assert_eq!(email, fallback_outreach(&lead(), &supplier()));
        assert!(email.contains("Gulf Pumps"));
    }

    fn analyst_at(base: &str) -> OpenAiAnalyst {
        OpenAiAnalyst::new(OpenAiClient::new(
            OpenAiConfig {
                api_key: Some("sk-test".into()),
                base_url: format!("{base}/v1"),
                ..Default::default()
            },
            RetryPolicy::new(2, Duration::from_millis(5)),
        ))
    }

    #[tokio::test]
    async fn model_assessment_is_parsed() {
        let (base, _server) = test_server::serve(vec![(
            200,
            r#"{"choices":[{"message":{"content":"{\"qualified\":true,\"confidence\":0.9,\"urgency\":\"today\",\"reasoning\":\"pumps needed\"}"}}]}"#,
        )])
        .await;
        let a = analyst_at(&base).process_lead(&lead()).await;
        assert!(a.qualified);
        assert_eq!(a.confidence, 0.9);
        assert_eq!(a.reasoning, "pumps needed");
    }

    #[tokio::test]
    async fn empty_completion_falls_back() {
        let (base, _server) =
            test_server::serve(vec![(200, r#"{"choices":[{"message":{"content":""}}]}"#)]).await;
        let a = analyst_at(&base).process_lead(&lead()).await;
        assert_eq!(a, LeadAssessment::fallback("completion had no content"));
    }
}
