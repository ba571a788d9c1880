//! Crawl sources and the page heuristics that turn a public procurement or
//! emergency-services page into a lead draft.
//!
//! Extraction is pattern based: markup is stripped, contact details are
//! pulled out with loose email/phone patterns, and urgency, authorization and
//! category are read off keyword alternations. A page whose text hash has not
//! changed since the last crawl yields nothing.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{BuyerType, LeadStatus, NewLead, Tenant, Urgency};

pub const DEFAULT_CATEGORY_GUESS: &str = "general-emergency";
pub const STATUS_ADDED: &str = "added-manual";
pub const STATUS_OK: &str = "ok";
pub const STATUS_UNCHANGED: &str = "unchanged";
pub const STATUS_FETCH_ERROR: &str = "fetch_error";

/// Characters of page text kept as the lead body.
pub const BODY_LIMIT: usize = 2000;

static SCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*?</script\s*>").expect("script pattern"));
static STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b.*?</style\s*>").expect("style pattern"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag pattern"));
static SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("space pattern"));

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}").expect("email pattern")
});
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(?\d{3}\)?[\s-]\d{3}[\s-]\d{4}").expect("phone pattern"));

static WITHIN_HOURS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)within 2 hours|within 1 hour|1-2h|2h response|immediately|asap|right now")
        .expect("within-hours pattern")
});
static SAME_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)today|same day|24/7|24-7|24x7").expect("same-day pattern")
});
static MICRO_PURCHASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)micro-purchase|under \$15k|under 15000|purchase card")
        .expect("micro-purchase pattern")
});

/// Category keywords, first match wins.
static CATEGORIES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("generator", r"(?i)generator|backup power|emergency power"),
        ("flood-pump", r"(?i)pump|pumping|dewater|flood"),
        ("roof-repair", r"(?i)roof|roofing|tarp"),
        ("hvac", r"(?i)hvac|air conditioning|cooling"),
        ("solar-backup", r"(?i)solar|pv system|photovoltaic"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("category pattern")))
    .collect()
});

/// A page the crawler visits on each run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlSource {
    pub url: String,
    #[serde(default = "unknown_state")]
    pub state: String,
    #[serde(default, alias = "tenantGuess")]
    pub tenant_guess: Option<Tenant>,
    #[serde(default = "default_category_guess", alias = "categoryGuess")]
    pub category_guess: String,
    #[serde(default, alias = "buyer_typeGuess")]
    pub buyer_type_guess: Option<BuyerType>,
    #[serde(default = "yes")]
    pub active: bool,
    #[serde(default)]
    pub last_seen_hash: Option<String>,
    #[serde(default)]
    pub last_crawl_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_status: String,
}

fn unknown_state() -> String {
    "?".to_string()
}

fn default_category_guess() -> String {
    DEFAULT_CATEGORY_GUESS.to_string()
}

fn yes() -> bool {
    true
}

/// Operator input for a new source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NewCrawlSource {
    pub url: String,
    pub state: String,
    pub tenant_guess: Option<Tenant>,
    pub category_guess: String,
    pub buyer_type_guess: Option<BuyerType>,
}

impl NewCrawlSource {
    pub fn into_source(self) -> CrawlSource {
        let state = self.state.trim();
        let category = self.category_guess.trim();
        CrawlSource {
            url: self.url.trim().to_string(),
            state: if state.is_empty() {
                unknown_state()
            } else {
                state.to_uppercase()
            },
            tenant_guess: self.tenant_guess,
            category_guess: if category.is_empty() {
                default_category_guess()
            } else {
                category.to_string()
            },
            buyer_type_guess: self.buyer_type_guess,
            active: true,
            last_seen_hash: None,
            last_crawl_utc: None,
            last_status: STATUS_ADDED.to_string(),
        }
    }
}

/// What one page says, after markup is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFindings {
    pub text: String,
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub urgency: Urgency,
    pub mentions_micro_purchase: bool,
    /// `None` when no category keyword appears.
    pub category: Option<&'static str>,
    pub hash: String,
}

/// Drop script and style blocks, then every tag, and collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let text = SCRIPT.replace_all(html, " ");
    let text = STYLE.replace_all(&text, " ");
    let text = TAG.replace_all(&text, " ");
    SPACE.replace_all(&text, " ").trim().to_string()
}

fn unique_matches(pattern: &Regex, text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for m in pattern.find_iter(text) {
        let found = m.as_str().to_string();
        if !out.contains(&found) {
            out.push(found);
        }
    }
    out
}

pub fn extract_emails(text: &str) -> Vec<String> {
    unique_matches(&EMAIL, text)
}

pub fn extract_phones(text: &str) -> Vec<String> {
    unique_matches(&PHONE, text)
}

/// Fastest urgency the wording supports; pages that say nothing are this-week.
pub fn classify_urgency(text: &str) -> Urgency {
    if WITHIN_HOURS.is_match(text) {
        Urgency::WithinHours
    } else if SAME_DAY.is_match(text) {
        Urgency::Today
    } else {
        Urgency::ThisWeek
    }
}

pub fn mentions_micro_purchase(text: &str) -> bool {
    MICRO_PURCHASE.is_match(text)
}

pub fn classify_category(text: &str) -> Option<&'static str> {
    CATEGORIES
        .iter()
        .find(|(_, pattern)| pattern.is_match(text))
        .map(|(name, _)| *name)
}

/// Hex SHA-256 of the stripped page text.
pub fn content_hash(text: &str) -> String {
    Sha256::digest(text.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

pub fn read_page(html: &str) -> PageFindings {
    let text = strip_html(html);
    PageFindings {
        emails: extract_emails(&text),
        phones: extract_phones(&text),
        urgency: classify_urgency(&text),
        mentions_micro_purchase: mentions_micro_purchase(&text),
        category: classify_category(&text),
        hash: content_hash(&text),
        text,
    }
}

impl CrawlSource {
    /// The page changed since the last successful crawl.
    pub fn is_changed(&self, findings: &PageFindings) -> bool {
        self.last_seen_hash.as_deref() != Some(findings.hash.as_str())
    }

    /// Lead draft for a changed page.
    ///
    /// Crawled leads go straight to the dispatch queue: they are sale-ready
    /// and `new`. Authorization is only asserted when the page says so; a page
    /// that is silent leaves it unknown.
    pub fn draft_lead(&self, findings: &PageFindings) -> NewLead {
        let category = findings
            .category
            .map(str::to_string)
            .unwrap_or_else(|| self.category_guess.clone());
        NewLead {
            title: format!("{category} request ({})", self.state),
            body: findings.text.chars().take(BODY_LIMIT).collect(),
            contact_email: findings.emails.first().cloned().unwrap_or_default(),
            contact_phone: findings.phones.first().cloned().unwrap_or_default(),
            state: self.state.clone(),
            urgency: Some(findings.urgency),
            buyer_type: Some(self.buyer_type_guess.unwrap_or(BuyerType::Public)),
            tenant: Some(
                self.tenant_guess
                    .unwrap_or(Tenant::FederalMicroPurchaseFastlane),
            ),
            category: Some(category),
            authorized_under_15k: findings.mentions_micro_purchase.then_some(true),
            sale_ready: true,
            status: Some(LeadStatus::New),
            source_url: self.url.clone(),
            source_channel: "crawler".to_string(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><style>body { color: red }</style>
        <script>var contact = "bot@tracker.io";</script></head>
        <body><h1>Emergency dewatering</h1>
        <p>County needs pumping crews <b>immediately</b>. Micro-purchase eligible.</p>
        <p>Contact <a href="mailto:ops@county.gov">ops@county.gov</a> or (512) 555-0199,
        backup 512-555-0100. Again: ops@county.gov</p></body></html>"#;

    fn source() -> CrawlSource {
        NewCrawlSource {
            url: "https://county.gov/bids".into(),
            state: "tx".into(),
            ..Default::default()
        }
        .into_source()
    }

    #[test]
    fn markup_and_scripts_are_stripped() {
        let text = strip_html(PAGE);
        assert!(text.starts_with("Emergency dewatering County needs"));
        assert!(!text.contains('<'));
        assert!(!text.contains("bot@tracker.io"));
        assert!(!text.contains("color: red"));
    }

    #[test]
    fn page_findings() {
        let page = read_page(PAGE);
        assert_eq!(page.emails, vec!["ops@county.gov"]);
        assert_eq!(page.phones, vec!["(512) 555-0199", "512-555-0100"]);
        assert_eq!(page.urgency, Urgency::WithinHours);
        assert!(page.mentions_micro_purchase);
        assert_eq!(page.category, Some("flood-pump"));
        assert_eq!(page.hash.len(), 64);
    }

    #[test]
    fn urgency_falls_through_to_this_week() {
        assert_eq!(classify_urgency("crews on call 24/7"), Urgency::Today);
        assert_eq!(classify_urgency("Same day service"), Urgency::Today);
        assert_eq!(classify_urgency("quotes due next month"), Urgency::ThisWeek);
    }

    #[test]
    fn first_category_wins() {
        assert_eq!(classify_category("generator for the flood shelter"), Some("generator"));
        assert_eq!(classify_category("Roof tarp install"), Some("roof-repair"));
        assert_eq!(classify_category("PV system maintenance"), Some("solar-backup"));
        assert_eq!(classify_category("janitorial services"), None);
    }

    #[test]
    fn draft_is_dispatchable() {
        let src = source();
        let draft = src.draft_lead(&read_page(PAGE));
        assert_eq!(draft.title, "flood-pump request (TX)");
        assert_eq!(draft.contact_email, "ops@county.gov");
        assert_eq!(draft.contact_phone, "(512) 555-0199");
        assert_eq!(draft.tenant, Some(Tenant::FederalMicroPurchaseFastlane));
        assert_eq!(draft.buyer_type, Some(BuyerType::Public));
        assert_eq!(draft.authorized_under_15k, Some(true));
        assert!(draft.sale_ready);
        assert_eq!(draft.status, Some(LeadStatus::New));
        assert_eq!(draft.source_channel, "crawler");
    }

    #[test]
    fn silent_pages_use_source_guesses() {
        let mut src = source();
        src.category_guess = "hvac".into();
        src.tenant_guess = Some(Tenant::GlobalSourcingB2b);
        let long = format!("<p>{}</p>", "janitorial ".repeat(400));
        let draft = src.draft_lead(&read_page(&long));
        assert_eq!(draft.category.as_deref(), Some("hvac"));
        assert_eq!(draft.tenant, Some(Tenant::GlobalSourcingB2b));
        assert_eq!(draft.authorized_under_15k, None);
        assert_eq!(draft.body.chars().count(), BODY_LIMIT);
    }

    #[test]
    fn unchanged_page_is_detected() {
        let mut src = source();
        let page = read_page(PAGE);
        assert!(src.is_changed(&page));
        src.last_seen_hash = Some(page.hash.clone());
        assert!(!src.is_changed(&page));
    }

    #[test]
    fn stored_sources_accept_legacy_field_names() {
        let src: CrawlSource = serde_json::from_str(
            r#"{"url":"https://x.gov","tenantGuess":"solar-home-us","buyer_typeGuess":"residential"}"#,
        )
        .unwrap();
        assert_eq!(src.state, "?");
        assert_eq!(src.category_guess, DEFAULT_CATEGORY_GUESS);
        assert_eq!(src.tenant_guess, Some(Tenant::SolarHomeUs));
        assert!(src.active);
    }
}
