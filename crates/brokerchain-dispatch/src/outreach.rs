//! Outreach drafts for dispatched leads. Drafts are returned, never sent.

use brokerchain_ai::LeadAnalyst;
use brokerchain_core::settings::FeatureFlags;
use brokerchain_store::{Store, SupplierFilter};
use serde::Serialize;
use tracing::info;

use crate::DispatchError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutreachDraft {
    pub lead_id: String,
    pub to: String,
    pub supplier_id: String,
    pub body: String,
}

/// Draft a first-contact email for `lead_id` about its assigned supplier.
///
/// Returns `Ok(None)` when `OUTREACH_ENABLED` is off.
pub async fn draft_outreach(
    store: &dyn Store,
    analyst: &dyn LeadAnalyst,
    lead_id: &str,
) -> Result<Option<OutreachDraft>, DispatchError> {
    let settings = store
        .get_settings()
        .await
        .map_err(DispatchError::load("settings"))?;
    if !FeatureFlags::from_settings(&settings).outreach_enabled {
        info!("outreach disabled");
        return Ok(None);
    }

    let lead = store
        .get_lead(lead_id)
        .await
        .map_err(DispatchError::load("lead"))?
        .ok_or_else(|| DispatchError::LeadNotFound(lead_id.to_string()))?;
    let supplier_id = lead
        .assigned_supplier_id
        .clone()
        .ok_or_else(|| DispatchError::NoSupplier(lead.id.clone()))?;
    let supplier = store
        .list_suppliers(&SupplierFilter::default())
        .await
        .map_err(DispatchError::load("suppliers"))?
        .into_iter()
        .find(|s| s.id == supplier_id)
        .ok_or_else(|| DispatchError::NoSupplier(lead.id.clone()))?;

    let body = analyst.generate_outreach_email(&lead, &supplier).await;
    info!(lead_id = %lead.id, supplier_id = %supplier.id, chars = body.len(), "outreach drafted");
    Ok(Some(OutreachDraft {
        lead_id: lead.id,
        to: lead.contact_email,
        supplier_id,
        body,
    }))
}
