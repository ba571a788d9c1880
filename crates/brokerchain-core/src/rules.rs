//! Qualification rules. Pure functions over a lead.

use crate::lead::PLACEHOLDER_ZIP;
use crate::{BuyerType, Lead, Tenant, Urgency};

pub const ZIP_QUESTION: &str = "Please confirm ZIP code for dispatch / delivery.";
pub const AUTHORIZATION_QUESTION: &str = "Are you authorized to approve under the micro-purchase threshold (under ~15k USD) on card right now?";

/// Urgent leads are sale-ready. B2B sourcing also accepts this-week jobs.
pub fn should_mark_sale_ready(lead: &Lead) -> bool {
    match lead.urgency {
        Urgency::WithinHours | Urgency::Today => true,
        Urgency::ThisWeek => lead.tenant == Tenant::GlobalSourcingB2b,
        Urgency::Unknown => false,
    }
}

/// Clarifying questions still needed before the lead can be dispatched.
pub fn build_missing_questions(lead: &Lead) -> Vec<String> {
    let mut questions = Vec::new();
    let zip = lead.zip.trim();
    if zip.is_empty() || zip == PLACEHOLDER_ZIP {
        questions.push(ZIP_QUESTION.to_string());
    }
    if lead.buyer_type == BuyerType::Public && lead.authorized_under_15k.is_none() {
        questions.push(AUTHORIZATION_QUESTION.to_string());
    }
    questions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewLead;
    use chrono::Utc;

    fn lead(urgency: Urgency, tenant: Tenant) -> Lead {
        Lead::from_draft(
            NewLead {
                urgency: Some(urgency),
                tenant: Some(tenant),
                ..Default::default()
            },
            "lead-1".into(),
            Utc::now(),
        )
    }

    #[test]
    fn urgent_leads_are_sale_ready_for_every_tenant() {
        for tenant in Tenant::ALL {
            assert!(should_mark_sale_ready(&lead(Urgency::WithinHours, tenant)));
            assert!(should_mark_sale_ready(&lead(Urgency::Today, tenant)));
            assert!(!should_mark_sale_ready(&lead(Urgency::Unknown, tenant)));
        }
    }

    #[test]
    fn this_week_only_for_b2b_sourcing() {
        for tenant in Tenant::ALL {
            let expected = tenant == Tenant::GlobalSourcingB2b;
            assert_eq!(should_mark_sale_ready(&lead(Urgency::ThisWeek, tenant)), expected);
        }
    }

    #[test]
    fn placeholder_zip_and_unknown_authorization_are_asked() {
        let l = lead(Urgency::Today, Tenant::FederalMicroPurchaseFastlane);
        assert_eq!(
            build_missing_questions(&l),
            vec![ZIP_QUESTION.to_string(), AUTHORIZATION_QUESTION.to_string()]
        );
    }

    #[test]
    fn complete_lead_needs_nothing() {
        let mut l = lead(Urgency::Today, Tenant::FederalMicroPurchaseFastlane);
        l.zip = "78701".into();
        l.authorized_under_15k = Some(false);
        assert!(build_missing_questions(&l).is_empty());
    }

    #[test]
    fn private_buyers_are_not_asked_about_authorization() {
        let mut l = lead(Urgency::Today, Tenant::EmergencyDispatchExchange);
        l.zip = "78701".into();
        l.buyer_type = BuyerType::Private;
        assert!(build_missing_questions(&l).is_empty());
    }
}
