//! Storage layer: the record-store contract consumed by the runs, plus a
//! JSON-backed implementation (in-memory or file-backed).

mod error;
mod json;

pub use error::StoreError;
pub use json::JsonStore;

use async_trait::async_trait;
use brokerchain_core::{
    Buyer, CrawlSource, Lead, LeadStatus, NewCrawlSource, NewLead, NewSupplier, Settings, Supplier,
    Tenant,
};
use serde_json::Value;

/// Equality filter over the lead columns the runs select on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadFilter {
    pub status: Option<LeadStatus>,
    pub sale_ready: Option<bool>,
    pub tenant: Option<Tenant>,
}

impl LeadFilter {
    /// Leads eligible for dispatch: `sale_ready = true AND status = new`.
    pub fn dispatchable() -> Self {
        Self {
            status: Some(LeadStatus::New),
            sale_ready: Some(true),
            tenant: None,
        }
    }

    pub fn matches(&self, lead: &Lead) -> bool {
        self.status.is_none_or(|s| lead.status == s)
            && self.sale_ready.is_none_or(|r| lead.sale_ready == r)
            && self.tenant.is_none_or(|t| lead.tenant == t)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupplierFilter {
    pub active: Option<bool>,
    pub state: Option<String>,
}

impl SupplierFilter {
    pub fn active() -> Self {
        Self {
            active: Some(true),
            state: None,
        }
    }

    pub fn matches(&self, supplier: &Supplier) -> bool {
        self.active.is_none_or(|a| supplier.active == a)
            && self.state.as_deref().is_none_or(|s| supplier.state == s)
    }
}

/// Result of [`Store::create_lead`].
#[derive(Debug, Clone)]
pub struct CreatedLead {
    pub lead: Lead,
    /// `false` when an identical lead (same fingerprint) already existed and
    /// `lead` is that first record.
    pub created: bool,
}

/// The record store. All entities are owned here; runs only hold
/// request-scoped copies.
#[async_trait]
pub trait Store: Send + Sync {
    /// Matching leads, newest first.
    async fn list_leads(&self, filter: &LeadFilter) -> Result<Vec<Lead>, StoreError>;

    async fn get_lead(&self, id: &str) -> Result<Option<Lead>, StoreError>;

    async fn find_lead_by_envelope(&self, envelope_id: &str) -> Result<Option<Lead>, StoreError>;

    /// Insert a lead unless its fingerprint is already stored (first write wins),
    /// then fold it into the buyer directory.
    async fn create_lead(&self, draft: NewLead) -> Result<CreatedLead, StoreError>;

    async fn update_lead(&self, lead: &Lead) -> Result<(), StoreError>;

    /// Upsert every lead by id in a single write. Returns the number written.
    async fn update_leads_batch(&self, leads: &[Lead]) -> Result<usize, StoreError>;

    async fn list_suppliers(&self, filter: &SupplierFilter) -> Result<Vec<Supplier>, StoreError>;

    async fn create_supplier(&self, supplier: NewSupplier) -> Result<Supplier, StoreError>;

    async fn update_supplier(&self, supplier: &Supplier) -> Result<(), StoreError>;

    /// Buyers, most recently seen first.
    async fn list_buyers(&self) -> Result<Vec<Buyer>, StoreError>;

    async fn get_settings(&self) -> Result<Settings, StoreError>;

    async fn update_setting(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Crawl sources in registration order.
    async fn list_sources(&self) -> Result<Vec<CrawlSource>, StoreError>;

    /// Register a source. URLs are unique.
    async fn add_source(&self, source: NewCrawlSource) -> Result<CrawlSource, StoreError>;

    /// Replace the source with the same URL.
    async fn update_source(&self, source: &CrawlSource) -> Result<(), StoreError>;
}
