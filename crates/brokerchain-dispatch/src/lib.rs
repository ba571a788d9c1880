//! Pipeline runs over the store: crawling, dispatch, qualification,
//! follow-ups, supplier standby pings, webhook application and outreach
//! drafting.
//!
//! Each run is stateless: it reads settings and leads, works on request-scoped
//! copies, writes back, and returns its counts.

mod context;
mod error;

pub mod authorize;
pub mod crawl;
pub mod follow_up;
pub mod matcher;
pub mod orchestrator;
pub mod outreach;
pub mod qualify;
pub mod supplier_ping;
pub mod webhooks;

#[cfg(test)]
mod fakes;

pub use authorize::authorize_lead;
pub use context::DispatchContext;
pub use crawl::{CrawlReport, run_crawl};
pub use error::DispatchError;
pub use follow_up::{FollowUpReport, run_follow_ups};
pub use matcher::{StoreSupplierMatcher, SupplierMatcher};
pub use orchestrator::{DispatchReport, run_dispatch};
pub use outreach::{OutreachDraft, draft_outreach};
pub use qualify::{QualifyReport, run_qualification};
pub use supplier_ping::{PingReport, run_supplier_ping};
pub use webhooks::{WebhookOutcome, apply_billing_event, apply_signature_event};
