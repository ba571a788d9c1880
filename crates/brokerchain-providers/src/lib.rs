//! Provider layer: retry-wrapped clients for billing (Stripe Checkout),
//! e-signature (DocuSign) and crawler page fetches, webhook parsing, and the
//! mail seam.
//!
//! Every client failure is normalised to a [`ProviderError`] carrying a
//! [`FailureClass`] at the client boundary; nothing past this crate inspects
//! HTTP statuses.

mod error;

pub mod billing;
pub mod fetch;
pub mod http;
pub mod mail;
pub mod retry;
pub mod signature;
pub mod webhook;

pub use billing::{BillingProvider, CheckoutSession, StripeBilling, StripeConfig};
pub use error::{FailureClass, ProviderError};
pub use fetch::{HttpFetcher, PageFetcher};
pub use mail::{LogMailer, MailClass, Mailer, classify_email, thread_key};
pub use retry::{RetryPolicy, retry_with_backoff};
pub use signature::{DocusignConfig, DocusignSignature, Envelope, SignatureProvider};
pub use webhook::{BillingEvent, SignatureEvent, parse_docusign_event, parse_stripe_event};
