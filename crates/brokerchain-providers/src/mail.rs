//! Outbound mail seam and inbound mail heuristics.
//!
//! Transport (SMTP) lives outside this crate. [`LogMailer`] is a dry-run
//! stand-in: it records each send in the log and reports that it does not
//! deliver, so callers must not record contact made through it.

use async_trait::async_trait;
use tracing::info;

use crate::ProviderError;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), ProviderError>;

    /// Whether a successful `send` means the message actually left.
    fn delivers(&self) -> bool {
        true
    }
}

/// Dry-run mailer: logs instead of delivering.
#[derive(Debug, Clone)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

impl Default for LogMailer {
    fn default() -> Self {
        Self::new("contact@brokerchain.business")
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), ProviderError> {
        if to.trim().is_empty() {
            return Err(ProviderError::permanent("recipient address is empty"));
        }
        info!(from = %self.from, to, subject, bytes = html.len(), "dry run, mail not sent");
        Ok(())
    }

    fn delivers(&self) -> bool {
        false
    }
}

/// Coarse intent of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailClass {
    Buyer,
    Supplier,
    Support,
    General,
}

impl MailClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Supplier => "supplier",
            Self::Support => "support",
            Self::General => "general",
        }
    }
}

/// Keyword classification over subject and body. English and Portuguese terms.
pub fn classify_email(subject: &str, body: &str) -> MailClass {
    let text = format!("{subject} {body}").to_lowercase();
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let contains_any = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

    if words
        .iter()
        .any(|w| w.ends_with("buy") || *w == "quote" || *w == "price")
        || contains_any(&["cotação", "preço", "orçamento"])
    {
        MailClass::Buyer
    } else if contains_any(&["supplier", "supply", "wholesale", "fornecedor", "distribuidor"]) {
        MailClass::Supplier
    } else if contains_any(&["support", "help", "issue", "erro", "bug"]) {
        MailClass::Support
    } else {
        MailClass::General
    }
}

/// Thread reference for an inbound message: `In-Reply-To`, else the first
/// `References` entry, else its own `Message-ID`, else the subject.
pub fn thread_key(
    message_id: Option<&str>,
    in_reply_to: Option<&str>,
    references: &[String],
    subject: &str,
) -> String {
    fn present<'a>(v: Option<&'a str>) -> Option<&'a str> {
        v.map(str::trim).filter(|s| !s.is_empty())
    }
    present(in_reply_to)
        .or_else(|| present(references.first().map(String::as_str)))
        .or_else(|| present(message_id))
        .unwrap_or(subject.trim())
        .to_string()
}
