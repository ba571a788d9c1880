//! Crawl run: fetch every active source, and turn pages that changed since
//! the last visit into sale-ready leads.
//!
//! A source that cannot be fetched is marked `fetch_error` and keeps its last
//! hash, so the next run retries it. Leads go through the store's fingerprint
//! dedup like any other intake.

use brokerchain_core::crawl::{STATUS_FETCH_ERROR, STATUS_OK, STATUS_UNCHANGED};
use brokerchain_core::settings::FeatureFlags;
use brokerchain_core::{CrawlSource, read_page};
use brokerchain_providers::PageFetcher;
use brokerchain_store::Store;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::DispatchError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    /// `CRAWLER_ENABLED` was off; nothing was fetched.
    pub skipped: bool,
    pub sources_touched: usize,
    pub new_leads: usize,
    /// Changed pages whose lead was already stored.
    pub duplicates: usize,
    pub unchanged: usize,
    pub fetch_errors: usize,
    /// Sources whose lead or status could not be saved.
    pub failed: usize,
}

pub async fn run_crawl(
    store: &dyn Store,
    fetcher: &dyn PageFetcher,
) -> Result<CrawlReport, DispatchError> {
    let settings = store
        .get_settings()
        .await
        .map_err(DispatchError::load("settings"))?;
    if !FeatureFlags::from_settings(&settings).crawler_enabled {
        info!("crawler disabled, skipping run");
        return Ok(CrawlReport {
            skipped: true,
            ..Default::default()
        });
    }

    let sources = store
        .list_sources()
        .await
        .map_err(DispatchError::load("crawl sources"))?;
    let mut report = CrawlReport::default();

    for mut source in sources.into_iter().filter(|s| s.active) {
        report.sources_touched += 1;
        if !crawl_source(store, fetcher, &mut source, &mut report).await {
            continue;
        }
        source.last_crawl_utc = Some(Utc::now());
        if let Err(err) = store.update_source(&source).await {
            warn!(url = %source.url, error = %err, "crawl status not recorded");
            report.failed += 1;
        }
    }

    info!(
        sources = report.sources_touched,
        new_leads = report.new_leads,
        unchanged = report.unchanged,
        fetch_errors = report.fetch_errors,
        "crawl run complete"
    );
    Ok(report)
}

/// Fetch one source and file its lead. Returns whether the source's status
/// should be saved.
async fn crawl_source(
    store: &dyn Store,
    fetcher: &dyn PageFetcher,
    source: &mut CrawlSource,
    report: &mut CrawlReport,
) -> bool {
    let html = match fetcher.fetch(&source.url).await {
        Ok(html) => html,
        Err(err) => {
            warn!(url = %source.url, error = %err, "crawl fetch failed");
            source.last_status = STATUS_FETCH_ERROR.to_string();
            report.fetch_errors += 1;
            return true;
        }
    };

    let page = read_page(&html);
    if !source.is_changed(&page) {
        source.last_status = STATUS_UNCHANGED.to_string();
        report.unchanged += 1;
        return true;
    }

    match store.create_lead(source.draft_lead(&page)).await {
        Ok(created) if created.created => {
            info!(url = %source.url, lead_id = %created.lead.id, "crawled lead created");
            report.new_leads += 1;
        }
        Ok(_) => report.duplicates += 1,
        Err(err) => {
            warn!(url = %source.url, error = %err, "crawled lead not saved");
            report.failed += 1;
            return false;
        }
    }
    source.last_seen_hash = Some(page.hash);
    source.last_status = STATUS_OK.to_string();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{self, FakeMatcher};
    use crate::run_dispatch;
    use brokerchain_core::settings::{AUTO_DISPATCH_ENABLED, CRAWLER_ENABLED};
    use brokerchain_core::{LeadStatus, NewCrawlSource, Tenant};
    use brokerchain_providers::http::test_server;
    use brokerchain_providers::{HttpFetcher, RetryPolicy};
    use brokerchain_store::{JsonStore, LeadFilter};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    const BIDS: &str = "<html><body><h2>Emergency generator rental</h2>\
        <p>Backup power needed today at the county shelter. Purchase card accepted.</p>\
        <p>Email ops@county.gov or call 512-555-0199.</p></body></html>";

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(RetryPolicy::new(2, Duration::from_millis(5)))
    }

    async fn add_source(store: &JsonStore, url: String) {
        store
            .add_source(NewCrawlSource {
                url,
                state: "TX".into(),
                ..Default::default()
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn changed_pages_become_dispatchable_leads() {
        let store = Arc::new(JsonStore::open());
        store.update_setting(CRAWLER_ENABLED, json!(true)).await.unwrap();
        let (base, server) = test_server::serve_as(
            "text/html",
            vec![(200, BIDS), (404, "gone"), (200, BIDS), (404, "gone")],
        )
        .await;
        add_source(&store, format!("{base}/bids")).await;
        add_source(&store, format!("{base}/old")).await;

        let report = run_crawl(store.as_ref(), &fetcher()).await.unwrap();
        assert_eq!(report.sources_touched, 2);
        assert_eq!(report.new_leads, 1);
        assert_eq!(report.fetch_errors, 1);

        let leads = store.list_leads(&LeadFilter::dispatchable()).await.unwrap();
        assert_eq!(leads.len(), 1);
        let lead = &leads[0];
        assert_eq!(lead.title, "generator request (TX)");
        assert_eq!(lead.contact_email, "ops@county.gov");
        assert_eq!(lead.contact_phone, "512-555-0199");
        assert_eq!(lead.tenant, Tenant::FederalMicroPurchaseFastlane);
        assert!(lead.is_authorized_under_15k());
        assert_eq!(lead.source_url, format!("{base}/bids"));

        let sources = store.list_sources().await.unwrap();
        assert_eq!(sources[0].last_status, STATUS_OK);
        assert!(sources[0].last_seen_hash.is_some());
        assert_eq!(sources[1].last_status, STATUS_FETCH_ERROR);
        assert!(sources[1].last_seen_hash.is_none());
        assert!(sources[1].last_crawl_utc.is_some());

        // Same page again: nothing new.
        let report = run_crawl(store.as_ref(), &fetcher()).await.unwrap();
        assert_eq!((report.new_leads, report.unchanged), (0, 1));
        assert_eq!(store.list_sources().await.unwrap()[0].last_status, STATUS_UNCHANGED);
        assert_eq!(server.await.unwrap().len(), 4);

        store.update_setting(AUTO_DISPATCH_ENABLED, json!(true)).await.unwrap();
        let (ctx, _) = fakes::context(store.clone(), FakeMatcher::always(fakes::supplier("TX")));
        let dispatched = run_dispatch(&ctx).await.unwrap();
        assert_eq!(dispatched.updated_leads, 1);
        let stored = store.get_lead(&lead.id).await.unwrap().unwrap();
        assert_eq!(stored.status, LeadStatus::PendingSupplier);
    }

    #[tokio::test]
    async fn inactive_sources_are_not_fetched() {
        let store = JsonStore::open();
        store.update_setting(CRAWLER_ENABLED, json!(true)).await.unwrap();
        let (base, server) = test_server::serve_as("text/html", vec![(200, BIDS)]).await;
        add_source(&store, "http://127.0.0.1:9/paused".into()).await;
        add_source(&store, format!("{base}/bids")).await;
        let mut paused = store.list_sources().await.unwrap().remove(0);
        paused.active = false;
        store.update_source(&paused).await.unwrap();

        let report = run_crawl(&store, &fetcher()).await.unwrap();
        assert_eq!(report.sources_touched, 1);
        assert_eq!(report.new_leads, 1);
        assert_eq!(server.await.unwrap().len(), 1);
        let sources = store.list_sources().await.unwrap();
        assert!(sources[0].last_crawl_utc.is_none());
    }

    #[tokio::test]
    async fn disabled_crawler_fetches_nothing() {
        let store = JsonStore::open();
        add_source(&store, "http://127.0.0.1:9/never".into()).await;
        let report = run_crawl(&store, &fetcher()).await.unwrap();
        assert!(report.skipped);
        let sources = store.list_sources().await.unwrap();
        assert!(sources[0].last_crawl_utc.is_none());
        assert_eq!(sources[0].last_status, "added-manual");
    }
}
