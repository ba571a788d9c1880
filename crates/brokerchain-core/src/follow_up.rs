//! Per-tenant follow-up schedules.
//!
//! Elapsed time is measured from the last contact, or from creation when the
//! lead has never been contacted. The next rule due is the first whose
//! `after_minutes` threshold has not yet elapsed.

use chrono::{DateTime, Utc};

use crate::{Lead, Tenant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowUpRule {
    pub after_minutes: i64,
    pub subject: &'static str,
    pub html: &'static str,
}

const EMERGENCY_DISPATCH: &[FollowUpRule] = &[
    FollowUpRule {
        after_minutes: 5,
        subject: "Emergency Team Ready",
        html: "<p>We are ready to assist you.</p>",
    },
    FollowUpRule {
        after_minutes: 15,
        subject: "Limited Slots Remaining",
        html: "<p>Act fast to secure your spot.</p>",
    },
];

const SOLAR_HOME: &[FollowUpRule] = &[
    FollowUpRule {
        after_minutes: 30,
        subject: "Schedule Your Assessment",
        html: "<p>Book your solar consultation today.</p>",
    },
    FollowUpRule {
        after_minutes: 120,
        subject: "Tax Credit Deadline",
        html: "<p>Don't miss out on savings.</p>",
    },
];

/// Rule table for a tenant. Tenants without a table get no follow-ups.
pub fn follow_up_rules(tenant: Tenant) -> &'static [FollowUpRule] {
    match tenant {
        Tenant::EmergencyDispatchExchange => EMERGENCY_DISPATCH,
        Tenant::SolarHomeUs => SOLAR_HOME,
        Tenant::FederalMicroPurchaseFastlane | Tenant::GlobalSourcingB2b => &[],
    }
}

/// Whole minutes since last contact (or creation).
pub fn elapsed_minutes(lead: &Lead, now: DateTime<Utc>) -> i64 {
    let reference = lead.last_contact.unwrap_or(lead.created_utc);
    (now - reference).num_minutes()
}

pub fn next_follow_up(lead: &Lead, now: DateTime<Utc>) -> Option<&'static FollowUpRule> {
    let elapsed = elapsed_minutes(lead, now);
    follow_up_rules(lead.tenant)
        .iter()
        .find(|rule| rule.after_minutes > elapsed)
}
