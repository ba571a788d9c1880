//! Dispatch run: assign suppliers to sale-ready leads and open the payment
//! and authorization flows in the order each tenant requires.
//!
//! Leads are processed one at a time and every per-lead failure is folded into
//! that lead's alert trail. Only loading the inputs or persisting the batch can
//! fail the run.

use brokerchain_core::settings::FeatureFlags;
use brokerchain_core::{Lead, LeadStatus, Supplier};
use brokerchain_providers::{FailureClass, ProviderError};
use brokerchain_store::LeadFilter;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::{DispatchContext, DispatchError};

pub const BLOCK_AUTHORIZATION_MISSING: &str = "authorization_missing_under_15k";

pub const ALERT_NEED_AUTHORIZATION: &str = "need_authorization_under_15k";
pub const ALERT_MATCH_ERROR: &str = "matchSupplier_error";
pub const ALERT_NO_SUPPLIER: &str = "no_supplier_available";
pub const ALERT_NO_VALID_EMAIL: &str = "no_valid_email_for_docusign";
pub const ALERT_TRANSITION_REJECTED: &str = "status_transition_rejected";

/// Aggregate outcome of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// `AUTO_DISPATCH_ENABLED` was off; nothing was read or written.
    pub skipped: bool,
    pub candidates: usize,
    /// Leads that reached supplier assignment.
    pub updated_leads: usize,
    pub awaiting_authorization: usize,
    pub stripe_sessions_created: usize,
    pub docusign_envelopes_created: usize,
    pub alerts_raised: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Billing,
    Signature,
}

/// Public-sector tenants capture authorization before money moves.
fn step_order(lead: &Lead) -> [Step; 2] {
    if lead.tenant.is_public_sector() {
        [Step::Signature, Step::Billing]
    } else {
        [Step::Billing, Step::Signature]
    }
}

fn failure_tag(provider: &str, err: &ProviderError) -> String {
    let suffix = match err.class {
        FailureClass::Configuration => "config_missing",
        FailureClass::Permanent => "create_failed",
        FailureClass::Transient => "exception",
    };
    format!("{provider}_{suffix}")
}

pub async fn run_dispatch(ctx: &DispatchContext) -> Result<DispatchReport, DispatchError> {
    let settings = ctx
        .store
        .get_settings()
        .await
        .map_err(DispatchError::load("settings"))?;
    let flags = FeatureFlags::from_settings(&settings);
    if !flags.dispatch_enabled {
        info!("dispatch disabled, skipping run");
        return Ok(DispatchReport {
            skipped: true,
            ..Default::default()
        });
    }

    let leads = ctx
        .store
        .list_leads(&LeadFilter::dispatchable())
        .await
        .map_err(DispatchError::load("leads"))?;
    info!(
        candidates = leads.len(),
        billing = flags.billing_enabled,
        signature = flags.signature_enabled,
        "dispatch run starting"
    );

    let mut report = DispatchReport {
        candidates: leads.len(),
        ..Default::default()
    };
    let mut touched = Vec::with_capacity(leads.len());
    for mut lead in leads {
        dispatch_lead(ctx, &flags, &mut lead, &mut report).await;
        touched.push(lead);
    }

    if !touched.is_empty() {
        ctx.store
            .update_leads_batch(&touched)
            .await
            .map_err(DispatchError::Persist)?;
    }

    info!(
        updated = report.updated_leads,
        awaiting_authorization = report.awaiting_authorization,
        stripe_sessions = report.stripe_sessions_created,
        docusign_envelopes = report.docusign_envelopes_created,
        alerts = report.alerts_raised,
        "dispatch run complete"
    );
    Ok(report)
}

fn alert(lead: &mut Lead, report: &mut DispatchReport, tag: &str) {
    lead.raise_alert(tag);
    report.alerts_raised += 1;
}

async fn dispatch_lead(
    ctx: &DispatchContext,
    flags: &FeatureFlags,
    lead: &mut Lead,
    report: &mut DispatchReport,
) {
    if lead.tenant.is_public_sector() && !lead.is_authorized_under_15k() {
        if let Err(err) = lead.advance(LeadStatus::AwaitingAuthorization) {
            warn!(lead_id = %lead.id, error = %err, "cannot park lead");
            alert(lead, report, ALERT_TRANSITION_REJECTED);
            return;
        }
        lead.billing_block_reason = Some(BLOCK_AUTHORIZATION_MISSING.to_string());
        alert(lead, report, ALERT_NEED_AUTHORIZATION);
        report.awaiting_authorization += 1;
        info!(lead_id = %lead.id, "awaiting micro-purchase authorization");
        return;
    }

    let supplier = match ctx.matcher.match_supplier(lead).await {
        Ok(Some(supplier)) => supplier,
        Ok(None) => {
            info!(lead_id = %lead.id, state = %lead.state, category = %lead.category, "no supplier available");
            alert(lead, report, ALERT_NO_SUPPLIER);
            return;
        }
        Err(err) => {
            warn!(lead_id = %lead.id, error = %err, "supplier matching failed");
            alert(lead, report, ALERT_MATCH_ERROR);
            alert(lead, report, ALERT_NO_SUPPLIER);
            return;
        }
    };

    if let Err(err) = assign(lead, &supplier) {
        warn!(lead_id = %lead.id, error = %err, "cannot assign supplier");
        alert(lead, report, ALERT_TRANSITION_REJECTED);
        return;
    }
    report.updated_leads += 1;
    info!(lead_id = %lead.id, supplier_id = %supplier.id, tenant = %lead.tenant, "supplier assigned");

    for step in step_order(lead) {
        match step {
            Step::Billing if flags.billing_enabled => open_checkout(ctx, lead, report).await,
            Step::Signature if flags.signature_enabled => send_envelope(ctx, lead, report).await,
            _ => {}
        }
    }
}

fn assign(lead: &mut Lead, supplier: &Supplier) -> Result<(), brokerchain_core::CoreError> {
    lead.advance(LeadStatus::PendingSupplier)?;
    lead.assigned_supplier_id = Some(supplier.id.clone());
    lead.assigned_supplier_contact = Some(supplier.contact_snapshot());
    lead.dispatch_assigned_utc = Some(Utc::now());
    Ok(())
}

async fn open_checkout(ctx: &DispatchContext, lead: &mut Lead, report: &mut DispatchReport) {
    let charge = lead.tenant.dispatch_charge();
    match ctx
        .billing
        .create_checkout_session(lead, charge.amount_usd, charge.description)
        .await
    {
        Ok(session) => {
            lead.stripe_checkout_url = Some(session.checkout_url);
            lead.stripe_session_id = Some(session.session_id);
            lead.stripe_created_utc = Some(Utc::now());
            lead.stripe_error = None;
            report.stripe_sessions_created += 1;
        }
        Err(err) => {
            lead.stripe_error = Some(err.message.clone());
            alert(lead, report, &failure_tag("stripe", &err));
        }
    }
}

async fn send_envelope(ctx: &DispatchContext, lead: &mut Lead, report: &mut DispatchReport) {
    if !lead.has_valid_email() {
        lead.docusign_error = Some(ALERT_NO_VALID_EMAIL.to_string());
        alert(lead, report, ALERT_NO_VALID_EMAIL);
        return;
    }
    match ctx.signature.create_envelope(lead).await {
        Ok(envelope) => {
            lead.docusign_envelope_id = Some(envelope.envelope_id);
            lead.docusign_created_utc = Some(Utc::now());
            lead.docusign_error = None;
            report.docusign_envelopes_created += 1;
        }
        Err(err) => {
            lead.docusign_error = Some(err.message.clone());
            alert(lead, report, &failure_tag("docusign", &err));
        }
    }
}
