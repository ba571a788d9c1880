//! Follow-up runner: send each open lead the next scheduled message for its tenant.

use brokerchain_core::follow_up::next_follow_up;
use brokerchain_core::settings::FeatureFlags;
use brokerchain_core::{Lead, LeadStatus};
use brokerchain_providers::Mailer;
use brokerchain_store::{LeadFilter, Store};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::DispatchError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FollowUpReport {
    pub skipped: bool,
    /// The mailer does not deliver; nothing was sent or recorded.
    pub dry_run: bool,
    pub processed: usize,
    pub sent: usize,
    /// Messages that would have gone out in a dry run.
    pub planned: usize,
    pub failed: usize,
}

fn is_open(lead: &Lead) -> bool {
    !matches!(lead.status, LeadStatus::Converted | LeadStatus::Lost) && lead.has_valid_email()
}

/// Send due follow-ups as of `now`.
///
/// Each lead is saved right after its message goes out; a send or save failure
/// is counted and the run moves on. With a mailer that does not deliver, due
/// messages are only counted as planned and no lead is touched.
pub async fn run_follow_ups(
    store: &dyn Store,
    mailer: &dyn Mailer,
    now: DateTime<Utc>,
) -> Result<FollowUpReport, DispatchError> {
    let settings = store
        .get_settings()
        .await
        .map_err(DispatchError::load("settings"))?;
    if !FeatureFlags::from_settings(&settings).follow_up_enabled {
        info!("follow-ups disabled, skipping run");
        return Ok(FollowUpReport {
            skipped: true,
            ..Default::default()
        });
    }

    let leads = store
        .list_leads(&LeadFilter::default())
        .await
        .map_err(DispatchError::load("leads"))?;
    let mut report = FollowUpReport {
        dry_run: !mailer.delivers(),
        ..Default::default()
    };

    for mut lead in leads.into_iter().filter(is_open) {
        report.processed += 1;
        let Some(rule) = next_follow_up(&lead, now) else {
            continue;
        };
        if let Err(err) = mailer.send(&lead.contact_email, rule.subject, rule.html).await {
            warn!(lead_id = %lead.id, error = %err, "follow-up send failed");
            report.failed += 1;
            continue;
        }
        if report.dry_run {
            report.planned += 1;
            continue;
        }
        lead.last_contact = Some(now);
        lead.last_follow_up_subject = Some(rule.subject.to_string());
        match store.update_lead(&lead).await {
            Ok(()) => {
                report.sent += 1;
                info!(lead_id = %lead.id, subject = rule.subject, "follow-up sent");
            }
            Err(err) => {
                warn!(lead_id = %lead.id, error = %err, "follow-up sent but not recorded");
                report.failed += 1;
            }
        }
    }

    info!(
        dry_run = report.dry_run,
        processed = report.processed,
        sent = report.sent,
        planned = report.planned,
        failed = report.failed,
        "follow-up run complete"
    );
    Ok(report)
}
