//! Inbound provider notifications, reduced to the events the pipeline acts on.

use serde::Deserialize;

use crate::ProviderError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEvent {
    Completed { lead_id: String },
    Expired { lead_id: String },
    /// Acknowledged but not acted on.
    Ignored { event_type: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureEvent {
    Completed { envelope_id: String },
    /// Declined by the signer or voided by the sender.
    Declined { envelope_id: String },
    Ignored { status: String },
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct StripeEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: StripeData,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct StripeData {
    object: StripeObject,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct StripeObject {
    metadata: StripeMetadata,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct StripeMetadata {
    lead_id: Option<String>,
}

/// Parse a Stripe event body. Checkout events without a `metadata.lead_id`
/// cannot be attributed and are ignored.
pub fn parse_stripe_event(raw: &str) -> Result<BillingEvent, ProviderError> {
    let event: StripeEvent = serde_json::from_str(raw)?;
    let lead_id = event
        .data
        .object
        .metadata
        .lead_id
        .filter(|id| !id.trim().is_empty());
    Ok(match (event.event_type.as_str(), lead_id) {
        ("checkout.session.completed", Some(lead_id)) => BillingEvent::Completed { lead_id },
        ("checkout.session.expired", Some(lead_id)) => BillingEvent::Expired { lead_id },
        _ => BillingEvent::Ignored {
            event_type: event.event_type,
        },
    })
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct DocusignEvent {
    #[serde(rename = "envelopeId")]
    envelope_id: Option<String>,
    status: Option<String>,
    data: DocusignData,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct DocusignData {
    #[serde(rename = "envelopeId")]
    envelope_id: Option<String>,
    #[serde(rename = "envelopeStatus")]
    envelope_status: Option<String>,
}

/// Parse a DocuSign Connect body. Top-level `envelopeId`/`status` win over
/// the nested `data` form.
pub fn parse_docusign_event(raw: &str) -> Result<SignatureEvent, ProviderError> {
    let event: DocusignEvent = serde_json::from_str(raw)?;
    let envelope_id = event
        .envelope_id
        .or(event.data.envelope_id)
        .filter(|id| !id.trim().is_empty());
    let status = event
        .status
        .or(event.data.envelope_status)
        .unwrap_or_default()
        .to_ascii_lowercase();
    Ok(match (status.as_str(), envelope_id) {
        ("completed", Some(envelope_id)) => SignatureEvent::Completed { envelope_id },
        ("declined" | "voided", Some(envelope_id)) => SignatureEvent::Declined { envelope_id },
        _ => SignatureEvent::Ignored { status },
    })
}
