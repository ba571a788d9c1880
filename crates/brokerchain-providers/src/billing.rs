//! Checkout sessions for dispatch fees (Stripe).

use async_trait::async_trait;
use brokerchain_core::Lead;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::http::{self, send_json};
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::ProviderError;

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
pub const DEFAULT_SUCCESS_URL: &str = "https://example.com/success";
pub const DEFAULT_CANCEL_URL: &str = "https://example.com/cancel";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub checkout_url: String,
    pub session_id: String,
}

#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Create a one-line-item payment session for `amount_usd` whole dollars.
    async fn create_checkout_session(
        &self,
        lead: &Lead,
        amount_usd: u32,
        description: &str,
    ) -> Result<CheckoutSession, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    pub api_base: String,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            success_url: DEFAULT_SUCCESS_URL.to_string(),
            cancel_url: DEFAULT_CANCEL_URL.to_string(),
            api_base: DEFAULT_STRIPE_API_BASE.to_string(),
        }
    }
}

pub struct StripeBilling {
    client: reqwest::Client,
    config: StripeConfig,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

impl StripeBilling {
    pub fn new(config: StripeConfig, retry: RetryPolicy) -> Self {
        Self {
            client: http::client(),
            config,
            retry,
        }
    }

    fn secret_key(&self) -> Option<&str> {
        self.config
            .secret_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
    }
}

/// Form fields for `POST /v1/checkout/sessions`, in Stripe's bracketed notation.
pub fn checkout_form(
    config: &StripeConfig,
    lead: &Lead,
    amount_usd: u32,
    description: &str,
) -> Vec<(String, String)> {
    let amount_cents = u64::from(amount_usd) * 100;
    [
        ("mode", "payment".to_string()),
        ("line_items[0][quantity]", "1".to_string()),
        ("line_items[0][price_data][currency]", "usd".to_string()),
        ("line_items[0][price_data][unit_amount]", amount_cents.to_string()),
        (
            "line_items[0][price_data][product_data][name]",
            description.to_string(),
        ),
        ("success_url", config.success_url.clone()),
        ("cancel_url", config.cancel_url.clone()),
        ("metadata[lead_id]", lead.id.clone()),
        ("metadata[category]", lead.category.clone()),
        ("metadata[tenant]", lead.tenant.as_str().to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

#[async_trait]
impl BillingProvider for StripeBilling {
    async fn create_checkout_session(
        &self,
        lead: &Lead,
        amount_usd: u32,
        description: &str,
    ) -> Result<CheckoutSession, ProviderError> {
        let Some(secret) = self.secret_key() else {
            return Err(ProviderError::configuration("STRIPE_SECRET_KEY missing"));
        };
        let url = format!(
            "{}/v1/checkout/sessions",
            self.config.api_base.trim_end_matches('/')
        );
        let form = checkout_form(&self.config, lead, amount_usd, description);

        let result = retry_with_backoff(&self.retry, "stripe.checkout", || {
            let request = self.client.post(&url).bearer_auth(secret).form(&form);
            send_json::<SessionResponse>("stripe", request)
        })
        .await;

        match result {
            Ok(session) => {
                let Some(checkout_url) = session.url else {
                    return Err(ProviderError::permanent(format!(
                        "checkout session {} has no url",
                        session.id
                    )));
                };
                info!(lead_id = %lead.id, session_id = %session.id, amount_usd, "checkout session created");
                Ok(CheckoutSession {
                    checkout_url,
                    session_id: session.id,
                })
            }
            Err(err) => {
                warn!(lead_id = %lead.id, class = %err.class, error = %err.message, "checkout session failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FailureClass;
    use crate::http::test_server;
    use brokerchain_core::{NewLead, Tenant};
    use chrono::Utc;
    use std::time::Duration;

    fn lead() -> Lead {
        Lead::from_draft(
            NewLead {
                title: "Roof leak".into(),
                contact_email: "a@b.com".into(),
                tenant: Some(Tenant::EmergencyDispatchExchange),
                category: Some("roofing".into()),
                ..Default::default()
            },
            "lead-1".into(),
            Utc::now(),
        )
    }

    fn config(api_base: &str) -> StripeConfig {
        StripeConfig {
            secret_key: Some("sk_test_123".into()),
            api_base: api_base.into(),
            ..Default::default()
        }
    }

    fn quick() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(5))
    }

    #[test]
    fn form_carries_amount_in_cents_and_metadata() {
        let form = checkout_form(&StripeConfig::default(), &lead(), 500, "Emergency field dispatch / mitigation");
        let get = |k: &str| form.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("50000"));
        assert_eq!(get("metadata[lead_id]"), Some("lead-1"));
        assert_eq!(get("metadata[tenant]"), Some("emergency-dispatch-exchange"));
        assert_eq!(get("metadata[category]"), Some("roofing"));
        assert_eq!(get("success_url"), Some(DEFAULT_SUCCESS_URL));
    }

    #[tokio::test]
    async fn missing_key_is_configuration_failure() {
        let billing = StripeBilling::new(StripeConfig::default(), quick());
        let err = billing
            .create_checkout_session(&lead(), 500, "x")
            .await
            .unwrap_err();
        assert_eq!(err.class, FailureClass::Configuration);
        assert_eq!(err.message, "STRIPE_SECRET_KEY missing");
    }

    #[tokio::test]
    async fn session_created_after_transient_failure() {
        let (base, server) = test_server::serve(vec![
            (503, r#"{"error":"busy"}"#),
            (200, r#"{"id":"cs_test_1","url":"https://checkout.stripe.com/pay/cs_test_1"}"#),
        ])
        .await;
        let billing = StripeBilling::new(config(&base), quick());
        let session = billing
            .create_checkout_session(&lead(), 500, "Emergency field dispatch / mitigation")
            .await
            .unwrap();
        assert_eq!(session.session_id, "cs_test_1");
        assert_eq!(session.checkout_url, "https://checkout.stripe.com/pay/cs_test_1");

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].starts_with("POST /v1/checkout/sessions"));
        assert!(requests[1].to_ascii_lowercase().contains("authorization: bearer sk_test_123"));
        assert!(requests[1].contains("unit_amount%5D=50000"));
    }

    #[tokio::test]
    async fn rejected_request_is_permanent() {
        let (base, server) = test_server::serve(vec![(400, r#"{"error":"bad"}"#)]).await;
        let billing = StripeBilling::new(config(&base), quick());
        let err = billing
            .create_checkout_session(&lead(), 500, "x")
            .await
            .unwrap_err();
        assert_eq!(err.class, FailureClass::Permanent);
        assert_eq!(server.await.unwrap().len(), 1);
    }
}
