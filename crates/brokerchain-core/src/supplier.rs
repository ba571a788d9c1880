//! Fulfilment candidates. Read-only from the dispatch side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: String,
    #[serde(default, alias = "name")]
    pub business_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "phone")]
    pub phone24h: String,
    /// Home state.
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub states_served: Vec<String>,
    /// Empty means the supplier takes every category.
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_billing_pref")]
    pub billing_pref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_utc: Option<DateTime<Utc>>,
    /// Last standby ping sent to this supplier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_utc: Option<DateTime<Utc>>,
}

pub const STANDBY_SUBJECT: &str = "Standby check - availability today?";

fn default_true() -> bool {
    true
}

fn default_billing_pref() -> String {
    "card".to_string()
}

/// Contact details copied onto a lead at assignment time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierContact {
    pub business_name: String,
    pub email: String,
    pub phone24h: String,
    pub billing_pref: String,
}

impl Supplier {
    pub fn serves_state(&self, state: &str) -> bool {
        self.state == state || self.states_served.iter().any(|s| s == state)
    }

    pub fn serves_category(&self, category: &str) -> bool {
        self.categories.is_empty() || self.categories.iter().any(|c| c == category)
    }

    pub fn contact_snapshot(&self) -> SupplierContact {
        let business_name = if self.business_name.is_empty() {
            "Supplier".to_string()
        } else {
            self.business_name.clone()
        };
        SupplierContact {
            business_name,
            email: self.email.clone(),
            phone24h: self.phone24h.clone(),
            billing_pref: self.billing_pref.clone(),
        }
    }

    /// Body of the standby ping asking whether the supplier can take work today.
    pub fn standby_message(&self) -> String {
        let name = if self.business_name.is_empty() {
            "there"
        } else {
            self.business_name.as_str()
        };
        let state = if self.state.is_empty() { "your area" } else { self.state.as_str() };
        format!(
            "<p>Hi {name},</p>\
             <p>Are you available TODAY for emergency work in {state}?</p>\
             <p>Reply YES or NO, and the best phone number to reach you on.</p>\
             <p>BrokerChain Dispatch</p>"
        )
    }
}

/// Registration payload for a new supplier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewSupplier {
    #[serde(alias = "name")]
    pub business_name: String,
    pub email: String,
    #[serde(alias = "phone")]
    pub phone24h: String,
    pub state: String,
    pub states_served: Vec<String>,
    pub categories: Vec<String>,
}

impl NewSupplier {
    pub fn into_supplier(self, id: String, now: DateTime<Utc>) -> Supplier {
        let mut states_served = self.states_served;
        if !self.state.is_empty() && !states_served.contains(&self.state) {
            states_served.push(self.state.clone());
        }
        Supplier {
            id,
            business_name: self.business_name,
            email: self.email,
            phone24h: self.phone24h,
            state: self.state,
            states_served,
            categories: self.categories,
            active: true,
            billing_pref: default_billing_pref(),
            created_utc: Some(now),
            last_update_utc: None,
        }
    }
}
