//! Intake heuristics for free-text requests from the public form.

use serde::{Deserialize, Serialize};

use crate::{BuyerType, LeadStatus, NewLead, Tenant, Urgency};

/// Keyword-based category guess for a free-text need.
pub fn guess_category(need: &str) -> &'static str {
    let text = need.to_lowercase();
    let has_word = |w: &str| {
        text.split(|c: char| !c.is_ascii_alphanumeric())
            .any(|token| token == w)
    };

    if ["roof", "hail", "leak"].iter().any(|k| text.contains(k)) {
        "roofing"
    } else if ["flood", "water", "pump"].iter().any(|k| text.contains(k)) {
        "water-mitigation"
    } else if has_word("ac")
        || ["hvac", "air conditioning", "plumbing"]
            .iter()
            .any(|k| text.contains(k))
    {
        "hvac-plumbing"
    } else if ["generator", "power"].iter().any(|k| text.contains(k)) {
        "power-gen"
    } else {
        "general"
    }
}

/// Public buyers, and needs that read like micro-purchase equipment, go to the federal lane.
pub fn pick_tenant(buyer_type: Option<BuyerType>, need: &str) -> Tenant {
    if buyer_type == Some(BuyerType::Public) {
        return Tenant::FederalMicroPurchaseFastlane;
    }
    let text = need.to_lowercase();
    if ["pump", "generator", "spill kit", "under $15k"]
        .iter()
        .any(|k| text.contains(k))
    {
        Tenant::FederalMicroPurchaseFastlane
    } else {
        Tenant::EmergencyDispatchExchange
    }
}

/// Request submitted through the public form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeRequest {
    pub need: String,
    pub zip: String,
    pub state: String,
    pub urgency: Option<Urgency>,
    pub buyer_type: Option<BuyerType>,
    pub email: String,
    pub phone: String,
    pub source: String,
}

impl IntakeRequest {
    /// Form submissions skip qualification: sale-ready, status `new`, urgency
    /// defaulting to `today`.
    pub fn into_draft(self) -> NewLead {
        let category = guess_category(&self.need).to_string();
        let tenant = pick_tenant(self.buyer_type, &self.need);
        let title: String = self.need.chars().take(80).collect();
        NewLead {
            title,
            body: self.need,
            contact_email: self.email,
            contact_phone: self.phone,
            state: self.state,
            zip: self.zip,
            urgency: Some(self.urgency.unwrap_or(Urgency::Today)),
            buyer_type: Some(self.buyer_type.unwrap_or(BuyerType::Commercial)),
            tenant: Some(tenant),
            category: Some(category),
            authorized_under_15k: None,
            sale_ready: true,
            status: Some(LeadStatus::New),
            source_url: String::new(),
            source_channel: if self.source.is_empty() {
                "form".to_string()
            } else {
                self.source
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_from_keywords() {
        assert_eq!(guess_category("Hail damage on the roof"), "roofing");
        assert_eq!(guess_category("Basement FLOOD, need pump"), "water-mitigation");
        assert_eq!(guess_category("AC died in the server room"), "hvac-plumbing");
        assert_eq!(guess_category("Need a backup generator"), "power-gen");
        assert_eq!(guess_category("Replace broken glass"), "general");
    }

    #[test]
    fn tenant_from_buyer_and_need() {
        assert_eq!(
            pick_tenant(Some(BuyerType::Public), "anything"),
            Tenant::FederalMicroPurchaseFastlane
        );
        assert_eq!(
            pick_tenant(None, "Spill kit for the depot"),
            Tenant::FederalMicroPurchaseFastlane
        );
        assert_eq!(
            pick_tenant(Some(BuyerType::Residential), "Roof leak"),
            Tenant::EmergencyDispatchExchange
        );
    }

    #[test]
    fn form_request_becomes_sale_ready_draft() {
        let draft = IntakeRequest {
            need: "Roof leak over the kitchen".into(),
            zip: "78701".into(),
            email: "home@owner.com".into(),
            buyer_type: Some(BuyerType::Residential),
            ..Default::default()
        }
        .into_draft();
        assert!(draft.sale_ready);
        assert_eq!(draft.status, Some(LeadStatus::New));
        assert_eq!(draft.urgency, Some(Urgency::Today));
        assert_eq!(draft.category.as_deref(), Some("roofing"));
        assert_eq!(draft.tenant, Some(Tenant::EmergencyDispatchExchange));
        assert_eq!(draft.source_channel, "form");
    }
}
