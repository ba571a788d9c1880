//! Core domain for BrokerChain: leads, suppliers, buyers, tenants, and the
//! pure rules that qualify, schedule and match them.

mod error;

pub mod assessment;
pub mod buyer;
pub mod crawl;
pub mod follow_up;
pub mod ids;
pub mod intake;
pub mod lead;
pub mod matching;
pub mod rules;
pub mod settings;
pub mod supplier;
pub mod tenant;

pub use assessment::LeadAssessment;
pub use buyer::{Buyer, buyer_key};
pub use crawl::{CrawlSource, NewCrawlSource, PageFindings, read_page};
pub use error::CoreError;
pub use follow_up::{FollowUpRule, next_follow_up};
pub use ids::random_id;
pub use intake::IntakeRequest;
pub use lead::{BuyerType, Lead, LeadStatus, NewLead, Urgency, fingerprint};
pub use matching::select_supplier;
pub use rules::{build_missing_questions, should_mark_sale_ready};
pub use settings::{FeatureFlags, Settings};
pub use supplier::{NewSupplier, Supplier, SupplierContact};
pub use tenant::{DispatchCharge, Tenant};
