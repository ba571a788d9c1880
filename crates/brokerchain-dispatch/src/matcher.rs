//! Supplier matching seam.

use std::sync::Arc;

use async_trait::async_trait;
use brokerchain_core::{Lead, Supplier, select_supplier};
use brokerchain_store::{Store, StoreError, SupplierFilter};
use tracing::debug;

#[async_trait]
pub trait SupplierMatcher: Send + Sync {
    /// One eligible supplier for `lead`, or `None` when nobody covers it.
    async fn match_supplier(&self, lead: &Lead) -> Result<Option<Supplier>, StoreError>;
}

/// Matches against the active suppliers in the store.
pub struct StoreSupplierMatcher {
    store: Arc<dyn Store>,
}

impl StoreSupplierMatcher {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SupplierMatcher for StoreSupplierMatcher {
    async fn match_supplier(&self, lead: &Lead) -> Result<Option<Supplier>, StoreError> {
        let suppliers = self.store.list_suppliers(&SupplierFilter::active()).await?;
        let chosen = {
            let mut rng = rand::thread_rng();
            select_supplier(lead, &suppliers, &mut rng).cloned()
        };
        debug!(
            lead_id = %lead.id,
            candidates = suppliers.len(),
            supplier_id = chosen.as_ref().map(|s| s.id.as_str()),
            "supplier match"
        );
        Ok(chosen)
    }
}
