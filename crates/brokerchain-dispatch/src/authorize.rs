//! Operator action: record a micro-purchase authorization for a public-sector
//! lead and put it back in the dispatch queue.

use brokerchain_core::{Lead, LeadStatus};
use brokerchain_store::Store;
use tracing::info;

use crate::DispatchError;
use crate::orchestrator::BLOCK_AUTHORIZATION_MISSING;

/// Mark `id` as authorized under $15k.
///
/// A lead parked in `awaiting-authorization` returns to `new` so the next
/// dispatch run picks it up. A `new` lead can be authorized ahead of its first
/// run. Any other status is refused.
pub async fn authorize_lead(store: &dyn Store, id: &str) -> Result<Lead, DispatchError> {
    let mut lead = store
        .get_lead(id)
        .await
        .map_err(DispatchError::load("lead"))?
        .ok_or_else(|| DispatchError::LeadNotFound(id.to_string()))?;

    match lead.status {
        LeadStatus::AwaitingAuthorization => {
            lead.status = LeadStatus::New;
        }
        LeadStatus::New => {}
        status => {
            return Err(DispatchError::NotAuthorizable {
                id: lead.id,
                status,
            });
        }
    }
    lead.authorized_under_15k = Some(true);
    lead.sale_ready = true;
    if lead.billing_block_reason.as_deref() == Some(BLOCK_AUTHORIZATION_MISSING) {
        lead.billing_block_reason = None;
    }
    store.update_lead(&lead).await.map_err(DispatchError::Persist)?;
    info!(lead_id = %lead.id, "micro-purchase authorization recorded, lead re-queued");
    Ok(lead)
}
