use std::sync::Arc;

use brokerchain_providers::{BillingProvider, SignatureProvider};
use brokerchain_store::Store;

use crate::matcher::{StoreSupplierMatcher, SupplierMatcher};

/// Collaborators for one dispatch run, constructed by the caller.
///
/// Nothing here caches state between runs; counters come back in the
/// run's report.
#[derive(Clone)]
pub struct DispatchContext {
    pub store: Arc<dyn Store>,
    pub matcher: Arc<dyn SupplierMatcher>,
    pub billing: Arc<dyn BillingProvider>,
    pub signature: Arc<dyn SignatureProvider>,
}

impl DispatchContext {
    /// Context that matches suppliers from `store`.
    pub fn new(
        store: Arc<dyn Store>,
        billing: Arc<dyn BillingProvider>,
        signature: Arc<dyn SignatureProvider>,
    ) -> Self {
        let matcher = Arc::new(StoreSupplierMatcher::new(store.clone()));
        Self {
            store,
            matcher,
            billing,
            signature,
        }
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn SupplierMatcher>) -> Self {
        self.matcher = matcher;
        self
    }
}
