//! Qualification pass ("brain"): refresh clarifying questions, promote urgent
//! leads into the dispatch queue, and attach advisory assessments.

use brokerchain_ai::LeadAnalyst;
use brokerchain_core::settings::FeatureFlags;
use brokerchain_core::{LeadStatus, build_missing_questions, should_mark_sale_ready};
use brokerchain_store::{LeadFilter, Store};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::DispatchError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QualifyReport {
    /// `BRAIN_ENABLED` was off.
    pub skipped: bool,
    pub total_leads: usize,
    pub leads_promoted: usize,
    pub leads_assessed: usize,
}

/// Run the pass over every stored lead.
///
/// With an `analyst`, leads still in `scraped` without an assessment get one.
/// The assessment is advisory and never changes status.
pub async fn run_qualification(
    store: &dyn Store,
    analyst: Option<&dyn LeadAnalyst>,
) -> Result<QualifyReport, DispatchError> {
    let settings = store
        .get_settings()
        .await
        .map_err(DispatchError::load("settings"))?;
    if !FeatureFlags::from_settings(&settings).brain_enabled {
        info!("qualification disabled, skipping run");
        return Ok(QualifyReport {
            skipped: true,
            ..Default::default()
        });
    }

    let leads = store
        .list_leads(&LeadFilter::default())
        .await
        .map_err(DispatchError::load("leads"))?;
    let mut report = QualifyReport {
        total_leads: leads.len(),
        ..Default::default()
    };
    let now = Utc::now();
    let mut changed = Vec::new();

    for mut lead in leads {
        let before = lead.clone();
        lead.ai_missing_questions = build_missing_questions(&lead);

        if !lead.sale_ready && should_mark_sale_ready(&lead) {
            lead.sale_ready = true;
            if lead.status == LeadStatus::Scraped {
                lead.status = LeadStatus::New;
            }
            lead.promoted_utc = Some(now);
            report.leads_promoted += 1;
            info!(lead_id = %lead.id, urgency = %lead.urgency.as_str(), tenant = %lead.tenant, "lead promoted");
        }

        if let Some(analyst) = analyst
            && lead.status == LeadStatus::Scraped
            && lead.ai_assessment.is_none()
        {
            lead.ai_assessment = Some(analyst.process_lead(&lead).await);
            report.leads_assessed += 1;
        }

        if lead != before {
            changed.push(lead);
        }
    }

    debug!(changed = changed.len(), "qualification changes");
    if !changed.is_empty() {
        store
            .update_leads_batch(&changed)
            .await
            .map_err(DispatchError::Persist)?;
    }
    info!(
        total = report.total_leads,
        promoted = report.leads_promoted,
        assessed = report.leads_assessed,
        "qualification run complete"
    );
    Ok(report)
}
