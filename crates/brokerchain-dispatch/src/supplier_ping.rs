//! Daily standby ping: ask every active supplier whether they can take work
//! today.
//!
//! Runs only when both outreach and the daily ping are switched on. A supplier
//! is pinged at most once per UTC day; one failed send does not stop the rest.

use brokerchain_core::Supplier;
use brokerchain_core::lead::is_valid_email;
use brokerchain_core::settings::FeatureFlags;
use brokerchain_core::supplier::STANDBY_SUBJECT;
use brokerchain_providers::Mailer;
use brokerchain_store::{Store, SupplierFilter};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::DispatchError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PingReport {
    pub skipped: bool,
    /// The mailer does not deliver; nothing was sent or recorded.
    pub dry_run: bool,
    /// Active suppliers with a usable address.
    pub suppliers: usize,
    pub already_pinged: usize,
    pub sent: usize,
    pub planned: usize,
    pub failed: usize,
}

fn pinged_today(supplier: &Supplier, now: DateTime<Utc>) -> bool {
    supplier
        .last_update_utc
        .is_some_and(|at| at.date_naive() == now.date_naive())
}

pub async fn run_supplier_ping(
    store: &dyn Store,
    mailer: &dyn Mailer,
    now: DateTime<Utc>,
) -> Result<PingReport, DispatchError> {
    let settings = store
        .get_settings()
        .await
        .map_err(DispatchError::load("settings"))?;
    let flags = FeatureFlags::from_settings(&settings);
    if !(flags.outreach_enabled && flags.supplier_ping_enabled) {
        info!(
            outreach = flags.outreach_enabled,
            ping = flags.supplier_ping_enabled,
            "supplier ping disabled, skipping run"
        );
        return Ok(PingReport {
            skipped: true,
            ..Default::default()
        });
    }

    let suppliers = store
        .list_suppliers(&SupplierFilter::active())
        .await
        .map_err(DispatchError::load("suppliers"))?;
    let mut report = PingReport {
        dry_run: !mailer.delivers(),
        ..Default::default()
    };

    for mut supplier in suppliers.into_iter().filter(|s| is_valid_email(&s.email)) {
        report.suppliers += 1;
        if pinged_today(&supplier, now) {
            report.already_pinged += 1;
            continue;
        }
        let body = supplier.standby_message();
        if let Err(err) = mailer.send(&supplier.email, STANDBY_SUBJECT, &body).await {
            warn!(supplier_id = %supplier.id, error = %err, "standby ping failed");
            report.failed += 1;
            continue;
        }
        if report.dry_run {
            report.planned += 1;
            continue;
        }
        supplier.last_update_utc = Some(now);
        match store.update_supplier(&supplier).await {
            Ok(()) => report.sent += 1,
            Err(err) => {
                warn!(supplier_id = %supplier.id, error = %err, "standby ping sent but not recorded");
                report.failed += 1;
            }
        }
    }

    info!(
        dry_run = report.dry_run,
        suppliers = report.suppliers,
        sent = report.sent,
        planned = report.planned,
        failed = report.failed,
        "supplier ping complete"
    );
    Ok(report)
}
