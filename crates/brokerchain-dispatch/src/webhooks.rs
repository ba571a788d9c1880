//! Apply provider notifications to the leads they concern.

use brokerchain_core::{Lead, LeadStatus};
use brokerchain_providers::{BillingEvent, SignatureEvent};
use brokerchain_store::Store;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::DispatchError;

pub const ALERT_STRIPE_EXPIRED: &str = "stripe_session_expired";
pub const ALERT_DOCUSIGN_DECLINED: &str = "docusign_declined_or_voided";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Applied { lead_id: String, status: LeadStatus },
    /// The event references a lead (or envelope) the store does not know.
    UnknownLead { reference: String },
    Ignored,
}

/// Move the lead forward if the transition set allows it; otherwise keep its
/// status and only record the provider fields.
fn advance_or_keep(lead: &mut Lead, next: LeadStatus) {
    if let Err(err) = lead.advance(next) {
        warn!(lead_id = %lead.id, error = %err, "status left unchanged");
    }
}

pub async fn apply_billing_event(
    store: &dyn Store,
    event: BillingEvent,
) -> Result<WebhookOutcome, DispatchError> {
    let (lead_id, completed) = match event {
        BillingEvent::Completed { lead_id } => (lead_id, true),
        BillingEvent::Expired { lead_id } => (lead_id, false),
        BillingEvent::Ignored { event_type } => {
            info!(event_type = %event_type, "stripe event ignored");
            return Ok(WebhookOutcome::Ignored);
        }
    };
    let Some(mut lead) = store
        .get_lead(&lead_id)
        .await
        .map_err(DispatchError::load("lead"))?
    else {
        warn!(lead_id = %lead_id, "stripe event for unknown lead");
        return Ok(WebhookOutcome::UnknownLead { reference: lead_id });
    };

    let now = Utc::now();
    if completed {
        lead.stripe_payment_completed = true;
        lead.stripe_payment_completed_utc = Some(now);
        advance_or_keep(&mut lead, LeadStatus::PaymentCompleted);
    } else {
        lead.stripe_payment_expired = true;
        lead.stripe_payment_expired_utc = Some(now);
        lead.raise_alert(ALERT_STRIPE_EXPIRED);
    }
    store
        .update_lead(&lead)
        .await
        .map_err(DispatchError::Persist)?;
    info!(lead_id = %lead.id, completed, status = %lead.status, "stripe event applied");
    Ok(WebhookOutcome::Applied {
        lead_id: lead.id,
        status: lead.status,
    })
}

pub async fn apply_signature_event(
    store: &dyn Store,
    event: SignatureEvent,
) -> Result<WebhookOutcome, DispatchError> {
    let (envelope_id, completed) = match event {
        SignatureEvent::Completed { envelope_id } => (envelope_id, true),
        SignatureEvent::Declined { envelope_id } => (envelope_id, false),
        SignatureEvent::Ignored { status } => {
            info!(status = %status, "docusign event ignored");
            return Ok(WebhookOutcome::Ignored);
        }
    };
    let Some(mut lead) = store
        .find_lead_by_envelope(&envelope_id)
        .await
        .map_err(DispatchError::load("lead"))?
    else {
        warn!(envelope_id = %envelope_id, "docusign event for unknown envelope");
        return Ok(WebhookOutcome::UnknownLead {
            reference: envelope_id,
        });
    };

    let now = Utc::now();
    if completed {
        lead.docusign_completed = true;
        lead.docusign_completed_utc = Some(now);
        advance_or_keep(&mut lead, LeadStatus::DocumentSigned);
    } else {
        lead.docusign_declined = true;
        lead.docusign_declined_utc = Some(now);
        lead.raise_alert(ALERT_DOCUSIGN_DECLINED);
    }
    store
        .update_lead(&lead)
        .await
        .map_err(DispatchError::Persist)?;
    info!(lead_id = %lead.id, envelope_id = %envelope_id, completed, "docusign event applied");
    Ok(WebhookOutcome::Applied {
        lead_id: lead.id,
        status: lead.status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use brokerchain_core::NewLead;
    use brokerchain_providers::{parse_docusign_event, parse_stripe_event};
    use brokerchain_store::JsonStore;

    async fn dispatched(store: &JsonStore) -> Lead {
        let mut lead = store
            .create_lead(NewLead {
                title: "Leak".into(),
                contact_email: "a@b.com".into(),
                status: Some(LeadStatus::New),
                sale_ready: true,
                ..Default::default()
            })
            .await
            .unwrap()
            .lead;
        lead.status = LeadStatus::PendingSupplier;
        lead.docusign_envelope_id = Some("env-1".into());
        store.update_lead(&lead).await.unwrap();
        lead
    }

    #[tokio::test]
    async fn payment_then_signature() {
        let store = JsonStore::open();
        let lead = dispatched(&store).await;

        let raw = format!(
            r#"{{"type":"checkout.session.completed","data":{{"object":{{"metadata":{{"lead_id":"{}"}}}}}}}}"#,
            lead.id
        );
        let outcome = apply_billing_event(&store, parse_stripe_event(&raw).unwrap())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Applied {
                lead_id: lead.id.clone(),
                status: LeadStatus::PaymentCompleted
            }
        );

        let event = parse_docusign_event(r#"{"envelopeId":"env-1","status":"completed"}"#).unwrap();
        apply_signature_event(&store, event).await.unwrap();

        let stored = store.get_lead(&lead.id).await.unwrap().unwrap();
        assert!(stored.stripe_payment_completed);
        assert!(stored.docusign_completed);
        assert_eq!(stored.status, LeadStatus::DocumentSigned);
        assert!(!stored.alert_pending);
    }

    #[tokio::test]
    async fn expiry_and_decline_raise_alerts() {
        let store = JsonStore::open();
        let lead = dispatched(&store).await;

        apply_billing_event(&store, BillingEvent::Expired { lead_id: lead.id.clone() })
            .await
            .unwrap();
        apply_signature_event(&store, SignatureEvent::Declined { envelope_id: "env-1".into() })
            .await
            .unwrap();

        let stored = store.get_lead(&lead.id).await.unwrap().unwrap();
        assert!(stored.stripe_payment_expired);
        assert!(stored.docusign_declined);
        assert_eq!(stored.status, LeadStatus::PendingSupplier);
        assert_eq!(stored.alert_reason, "stripe_session_expired|docusign_declined_or_voided");
    }

    #[tokio::test]
    async fn unknown_references_are_reported() {
        let store = JsonStore::open();
        let outcome = apply_billing_event(&store, BillingEvent::Completed { lead_id: "lead-x".into() })
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::UnknownLead { reference: "lead-x".into() });

        let outcome = apply_signature_event(&store, SignatureEvent::Ignored { status: "sent".into() })
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored);
    }

    #[tokio::test]
    async fn payment_on_undispatched_lead_keeps_status() {
        let store = JsonStore::open();
        let lead = store
            .create_lead(NewLead {
                title: "Scraped".into(),
                ..Default::default()
            })
            .await
            .unwrap()
            .lead;
        apply_billing_event(&store, BillingEvent::Completed { lead_id: lead.id.clone() })
            .await
            .unwrap();
        let stored = store.get_lead(&lead.id).await.unwrap().unwrap();
        assert!(stored.stripe_payment_completed);
        assert_eq!(stored.status, LeadStatus::Scraped);
    }
}
