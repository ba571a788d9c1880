//! Lead records: a unit of demand moving through qualification and dispatch.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

use crate::{CoreError, LeadAssessment, SupplierContact, Tenant};

// ── Enumerations ──

/// Lead lifecycle state.
///
/// Dispatch owns `new → pending-supplier` and `new → awaiting-authorization`;
/// webhook handlers own `payment-completed` and `document-signed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeadStatus {
    #[default]
    Scraped,
    New,
    PendingSupplier,
    AwaitingAuthorization,
    PaymentCompleted,
    DocumentSigned,
    Contacted,
    Converted,
    Lost,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 9] = [
        LeadStatus::Scraped,
        LeadStatus::New,
        LeadStatus::PendingSupplier,
        LeadStatus::AwaitingAuthorization,
        LeadStatus::PaymentCompleted,
        LeadStatus::DocumentSigned,
        LeadStatus::Contacted,
        LeadStatus::Converted,
        LeadStatus::Lost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scraped => "scraped",
            Self::New => "new",
            Self::PendingSupplier => "pending-supplier",
            Self::AwaitingAuthorization => "awaiting-authorization",
            Self::PaymentCompleted => "payment-completed",
            Self::DocumentSigned => "document-signed",
            Self::Contacted => "contacted",
            Self::Converted => "converted",
            Self::Lost => "lost",
        }
    }

    /// Whether `self → next` is part of the transition set. Staying put is always allowed.
    pub fn can_transition_to(&self, next: LeadStatus) -> bool {
        use LeadStatus::*;
        if *self == next {
            return true;
        }
        match (self, next) {
            (_, Lost) => !matches!(self, Converted),
            (Scraped, New) => true,
            (New, PendingSupplier | AwaitingAuthorization | Contacted) => true,
            (AwaitingAuthorization, New) => true,
            (PendingSupplier, PaymentCompleted | DocumentSigned | Contacted | Converted) => true,
            (PaymentCompleted, DocumentSigned | Converted) => true,
            (DocumentSigned, PaymentCompleted | Converted) => true,
            (Contacted, New | PendingSupplier | Converted) => true,
            _ => false,
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        LeadStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "lead status",
                value: s.to_string(),
            })
    }
}

/// How soon the buyer needs the job done. Unrecognised values read as `unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Urgency {
    #[serde(rename = "1-2h")]
    WithinHours,
    #[serde(rename = "today")]
    Today,
    #[serde(rename = "this-week")]
    ThisWeek,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl<'de> Deserialize<'de> for Urgency {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_default())
    }
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WithinHours => "1-2h",
            Self::Today => "today",
            Self::ThisWeek => "this-week",
            Self::Unknown => "unknown",
        }
    }
}

impl FromStr for Urgency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1-2h" => Ok(Self::WithinHours),
            "today" => Ok(Self::Today),
            "this-week" => Ok(Self::ThisWeek),
            "unknown" => Ok(Self::Unknown),
            other => Err(CoreError::UnknownVariant {
                kind: "urgency",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuyerType {
    #[default]
    Public,
    Private,
    #[serde(alias = "business")]
    Commercial,
    Residential,
}

impl BuyerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Commercial => "commercial",
            Self::Residential => "residential",
        }
    }
}

impl FromStr for BuyerType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            "commercial" | "business" => Ok(Self::Commercial),
            "residential" => Ok(Self::Residential),
            other => Err(CoreError::UnknownVariant {
                kind: "buyer type",
                value: other.to_string(),
            }),
        }
    }
}

/// Serde helpers for the `authorized_under_15k` tri-state.
///
/// Accepts JSON booleans, `null`, and the strings `"true"`, `"false"`,
/// `"yes"`, `"no"` and `"unknown"`. Unknown maps to `None`.
pub mod tri_state {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
        match value {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::Bool(b)) => Ok(Some(b)),
            Some(serde_json::Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" => Ok(Some(true)),
                "false" | "no" => Ok(Some(false)),
                "" | "unknown" => Ok(None),
                other => Err(D::Error::custom(format!(
                    "cannot read '{other}' as authorization"
                ))),
            },
            Some(other) => Err(D::Error::custom(format!(
                "expected boolean authorization, found: {other}"
            ))),
        }
    }
}

// ── Lead ──

/// A lead as stored. Field names are the storage column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub created_utc: DateTime<Utc>,
    /// SHA-256 over title, contact and body. One canonical record per value.
    pub dedup_hash: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub contact_email: String,
    #[serde(default)]
    pub contact_phone: String,
    #[serde(default = "unknown_state")]
    pub state: String,
    #[serde(default = "placeholder_zip")]
    pub zip: String,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub buyer_type: BuyerType,
    #[serde(default)]
    pub tenant: Tenant,
    #[serde(default = "general_category")]
    pub category: String,
    #[serde(default, deserialize_with = "tri_state::deserialize")]
    pub authorized_under_15k: Option<bool>,
    #[serde(default)]
    pub sale_ready: bool,
    #[serde(default)]
    pub status: LeadStatus,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub source_channel: String,

    // qualification
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ai_missing_questions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_assessment: Option<LeadAssessment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promoted_utc: Option<DateTime<Utc>>,

    // dispatch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_supplier_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_supplier_contact: Option<SupplierContact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_assigned_utc: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_block_reason: Option<String>,

    // billing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_checkout_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_created_utc: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_error: Option<String>,
    #[serde(default)]
    pub stripe_payment_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_payment_completed_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stripe_payment_expired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_payment_expired_utc: Option<DateTime<Utc>>,

    // signature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docusign_envelope_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docusign_created_utc: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docusign_error: Option<String>,
    #[serde(default)]
    pub docusign_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docusign_completed_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub docusign_declined: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docusign_declined_utc: Option<DateTime<Utc>>,

    // alerts
    #[serde(default)]
    pub alert_pending: bool,
    /// Pipe-delimited failure tags, oldest first.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alert_reason: String,

    // follow-up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_contact: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_follow_up_subject: Option<String>,
}

fn unknown_state() -> String {
    "?".to_string()
}

fn placeholder_zip() -> String {
    PLACEHOLDER_ZIP.to_string()
}

fn general_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// ZIP stored when the source did not provide one.
pub const PLACEHOLDER_ZIP: &str = "00000";
pub const DEFAULT_CATEGORY: &str = "general";

impl Lead {
    /// Build the canonical record for a freshly ingested draft.
    ///
    /// Drafts start in `scraped` unless the source already vouches for them
    /// (form submissions arrive as `new`).
    pub fn from_draft(draft: NewLead, id: String, now: DateTime<Utc>) -> Self {
        let dedup_hash = fingerprint(
            &draft.title,
            &draft.contact_email,
            &draft.contact_phone,
            &draft.body,
        );
        Self {
            id,
            created_utc: now,
            dedup_hash,
            title: draft.title,
            body: draft.body,
            contact_email: draft.contact_email,
            contact_phone: draft.contact_phone,
            state: non_empty_or(draft.state, unknown_state),
            zip: non_empty_or(draft.zip, placeholder_zip),
            urgency: draft.urgency.unwrap_or_default(),
            buyer_type: draft.buyer_type.unwrap_or_default(),
            tenant: draft.tenant.unwrap_or_default(),
            category: non_empty_or(draft.category.unwrap_or_default(), general_category),
            authorized_under_15k: draft.authorized_under_15k,
            sale_ready: draft.sale_ready,
            status: draft.status.unwrap_or_default(),
            source_url: draft.source_url,
            source_channel: non_empty_or(draft.source_channel, || "crawler".to_string()),
            ai_missing_questions: Vec::new(),
            ai_assessment: None,
            promoted_utc: None,
            assigned_supplier_id: None,
            assigned_supplier_contact: None,
            dispatch_assigned_utc: None,
            billing_block_reason: None,
            stripe_checkout_url: None,
            stripe_session_id: None,
            stripe_created_utc: None,
            stripe_error: None,
            stripe_payment_completed: false,
            stripe_payment_completed_utc: None,
            stripe_payment_expired: false,
            stripe_payment_expired_utc: None,
            docusign_envelope_id: None,
            docusign_created_utc: None,
            docusign_error: None,
            docusign_completed: false,
            docusign_completed_utc: None,
            docusign_declined: false,
            docusign_declined_utc: None,
            alert_pending: false,
            alert_reason: String::new(),
            last_contact: None,
            last_follow_up_subject: None,
        }
    }

    /// Flag the lead for manual attention and append `tag` to the reason trail.
    pub fn raise_alert(&mut self, tag: &str) {
        self.alert_pending = true;
        if !self.alert_reason.is_empty() {
            self.alert_reason.push('|');
        }
        self.alert_reason.push_str(tag);
    }

    /// Tags accumulated in `alert_reason`, oldest first.
    pub fn alert_tags(&self) -> impl Iterator<Item = &str> {
        self.alert_reason.split('|').filter(|t| !t.is_empty())
    }

    /// Move to `next` if the transition set allows it.
    pub fn advance(&mut self, next: LeadStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// `authorized_under_15k` is strictly `true`; unknown counts as not authorized.
    pub fn is_authorized_under_15k(&self) -> bool {
        self.authorized_under_15k == Some(true)
    }

    /// Minimal syntactic check: one `@` with non-empty local part and a dotted domain.
    pub fn has_valid_email(&self) -> bool {
        is_valid_email(&self.contact_email)
    }
}

fn non_empty_or(value: String, default: impl FnOnce() -> String) -> String {
    if value.trim().is_empty() {
        default()
    } else {
        value
    }
}

pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}

/// Dedup fingerprint: hex SHA-256 over the canonical JSON of title, contact and body.
pub fn fingerprint(title: &str, contact_email: &str, contact_phone: &str, body: &str) -> String {
    let basis = serde_json::json!({
        "title": title,
        "contact_email": contact_email,
        "contact_phone": contact_phone,
        "body": body,
    });
    let digest = Sha256::digest(basis.to_string().as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

// ── Drafts ──

/// Lead as submitted by a scraper, crawler, form or inbox before canonicalisation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewLead {
    pub title: String,
    pub body: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub state: String,
    pub zip: String,
    pub urgency: Option<Urgency>,
    pub buyer_type: Option<BuyerType>,
    pub tenant: Option<Tenant>,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "tri_state::deserialize")]
    pub authorized_under_15k: Option<bool>,
    pub sale_ready: bool,
    pub status: Option<LeadStatus>,
    pub source_url: String,
    pub source_channel: String,
}
