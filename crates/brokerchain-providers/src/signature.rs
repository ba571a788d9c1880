//! Authorization envelopes (DocuSign eSignature REST v2.1).

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use brokerchain_core::Lead;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::http::{self, send_json};
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::ProviderError;

const PLACEHOLDER_SIGNER_EMAIL: &str = "noemail@example.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub envelope_id: String,
}

#[async_trait]
pub trait SignatureProvider: Send + Sync {
    /// Send an authorization envelope to the lead's contact.
    async fn create_envelope(&self, lead: &Lead) -> Result<Envelope, ProviderError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocusignConfig {
    pub base_url: Option<String>,
    pub account_id: Option<String>,
    pub access_token: Option<String>,
    /// When set, envelopes are built from this server-side template.
    pub template_id: Option<String>,
}

impl DocusignConfig {
    /// Names of the required settings that are absent or blank.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("DOCUSIGN_BASE_URL", &self.base_url),
            ("DOCUSIGN_ACCOUNT_ID", &self.account_id),
            ("DOCUSIGN_ACCESS_TOKEN", &self.access_token),
        ]
        .into_iter()
        .filter(|(_, v)| v.as_deref().is_none_or(|s| s.trim().is_empty()))
        .map(|(name, _)| name)
        .collect()
    }
}

pub struct DocusignSignature {
    client: reqwest::Client,
    config: DocusignConfig,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct EnvelopeResponse {
    #[serde(rename = "envelopeId", alias = "envelopeID")]
    envelope_id: Option<String>,
}

impl DocusignSignature {
    pub fn new(config: DocusignConfig, retry: RetryPolicy) -> Self {
        Self {
            client: http::client(),
            config,
            retry,
        }
    }
}

fn authorization_text(lead: &Lead) -> String {
    format!(
        "EMERGENCY AUTHORIZATION / MICRO-PURCHASE\n\n\
         Lead ID: {}\n\
         Need: {}\n\
         Location State: {}\n\
         Authorized under 15k USD: {}\n\n\
         By signing you confirm you are authorized to approve this emergency purchase / dispatch.\n",
        lead.id,
        lead.body,
        lead.state,
        authorization_label(lead.authorized_under_15k),
    )
}

fn authorization_label(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "true",
        Some(false) => "false",
        None => "unknown",
    }
}

/// Envelope creation body: template roles when a template is configured,
/// otherwise an inline plain-text authorization document.
pub fn envelope_payload(lead: &Lead, template_id: Option<&str>) -> Value {
    let signer_email = if lead.contact_email.trim().is_empty() {
        PLACEHOLDER_SIGNER_EMAIL
    } else {
        lead.contact_email.trim()
    };
    let signer_name = if lead.contact_email.trim().is_empty() {
        "Buyer"
    } else {
        signer_email
    };

    match template_id.filter(|t| !t.trim().is_empty()) {
        Some(template_id) => json!({
            "templateId": template_id,
            "status": "sent",
            "templateRoles": [{
                "roleName": "Buyer",
                "name": signer_name,
                "email": signer_email,
                "tabs": {
                    "textTabs": [
                        { "tabLabel": "LEAD_ID", "value": lead.id },
                        { "tabLabel": "NEED_DESC", "value": lead.body },
                        { "tabLabel": "STATE", "value": lead.state },
                        { "tabLabel": "AUTHORIZED_UNDER_15K", "value": authorization_label(lead.authorized_under_15k) },
                    ]
                }
            }]
        }),
        None => json!({
            "status": "sent",
            "emailSubject": "Emergency Authorization / Dispatch Confirmation",
            "documents": [{
                "documentBase64": STANDARD.encode(authorization_text(lead)),
                "documentId": "1",
                "fileExtension": "txt",
                "name": "emergency_authorization.txt",
            }],
            "recipients": {
                "signers": [{
                    "name": signer_name,
                    "email": signer_email,
                    "recipientId": "1",
                    "routingOrder": "1",
                }]
            }
        }),
    }
}

#[async_trait]
impl SignatureProvider for DocusignSignature {
    async fn create_envelope(&self, lead: &Lead) -> Result<Envelope, ProviderError> {
        let missing = self.config.missing();
        if !missing.is_empty() {
            return Err(ProviderError::configuration(format!(
                "{} missing",
                missing.join(", ")
            )));
        }
        let (Some(base_url), Some(account_id), Some(token)) = (
            self.config.base_url.as_deref(),
            self.config.account_id.as_deref(),
            self.config.access_token.as_deref(),
        ) else {
            return Err(ProviderError::configuration("DocuSign settings missing"));
        };

        let url = format!(
            "{}/v2.1/accounts/{}/envelopes",
            base_url.trim_end_matches('/'),
            account_id
        );
        let payload = envelope_payload(lead, self.config.template_id.as_deref());

        let result = retry_with_backoff(&self.retry, "docusign.envelope", || {
            let request = self.client.post(&url).bearer_auth(token).json(&payload);
            send_json::<EnvelopeResponse>("docusign", request)
        })
        .await;

        match result {
            Ok(resp) => {
                let envelope_id = resp
                    .envelope_id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| "unknown-envelope".to_string());
                info!(lead_id = %lead.id, envelope_id = %envelope_id, "envelope sent");
                Ok(Envelope { envelope_id })
            }
            Err(err) => {
                warn!(lead_id = %lead.id, class = %err.class, error = %err.message, "envelope failed");
                Err(err)
            }
        }
    }
}
