//! Buyers: contacts deduplicated across leads by normalised email or phone.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BuyerType, Lead, Tenant};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Buyer {
    pub id: String,
    pub dedupe_key: String,
    pub first_seen_utc: DateTime<Utc>,
    pub last_seen_utc: DateTime<Utc>,
    #[serde(default)]
    pub contact_email: String,
    #[serde(default)]
    pub contact_phone: String,
    #[serde(default)]
    pub states: BTreeSet<String>,
    #[serde(default)]
    pub intents: BTreeSet<Tenant>,
    #[serde(default)]
    pub authorized_under_15k: bool,
    #[serde(default)]
    pub buyer_type: BuyerType,
}

/// Lowercased email, else the digits of the phone number. `None` when the
/// lead carries no usable contact.
pub fn buyer_key(lead: &Lead) -> Option<String> {
    let email = lead.contact_email.trim();
    if !email.is_empty() {
        return Some(email.to_lowercase());
    }
    let digits: String = lead
        .contact_phone
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    (!digits.is_empty()).then_some(digits)
}

impl Buyer {
    /// First sighting of a contact.
    pub fn from_lead(id: String, key: String, lead: &Lead, now: DateTime<Utc>) -> Self {
        let mut buyer = Self {
            id,
            dedupe_key: key,
            first_seen_utc: now,
            last_seen_utc: now,
            contact_email: lead.contact_email.clone(),
            contact_phone: lead.contact_phone.clone(),
            states: BTreeSet::new(),
            intents: BTreeSet::new(),
            authorized_under_15k: false,
            buyer_type: lead.buyer_type,
        };
        buyer.observe(lead, now);
        buyer
    }

    /// Fold another lead from the same contact into this record.
    ///
    /// Authorization is sticky once granted; contact fields are only filled, never replaced.
    pub fn observe(&mut self, lead: &Lead, now: DateTime<Utc>) {
        self.last_seen_utc = now;
        if self.contact_email.is_empty() && !lead.contact_email.is_empty() {
            self.contact_email = lead.contact_email.clone();
        }
        if self.contact_phone.is_empty() && !lead.contact_phone.is_empty() {
            self.contact_phone = lead.contact_phone.clone();
        }
        self.states.insert(lead.state.clone());
        self.intents.insert(lead.tenant);
        if lead.is_authorized_under_15k() {
            self.authorized_under_15k = true;
        }
    }
}
