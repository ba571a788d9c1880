use brokerchain_core::LeadStatus;
use brokerchain_store::StoreError;
use thiserror::Error;

/// Run-level failure. Per-lead problems never surface here; they become
/// alert tags on the lead.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("failed to load {what}: {source}")]
    Load {
        what: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("failed to persist leads: {0}")]
    Persist(#[source] StoreError),
    #[error("lead not found: {0}")]
    LeadNotFound(String),
    #[error("lead {0} has no assigned supplier")]
    NoSupplier(String),
    #[error("lead {id} is {status}; only new or parked leads can be authorized")]
    NotAuthorizable { id: String, status: LeadStatus },
}

impl DispatchError {
    pub(crate) fn load(what: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Load { what, source }
    }
}
