//! Business lines. The set is closed: every lead belongs to exactly one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Tenant {
    /// Private, commercial and residential physical emergencies.
    #[serde(rename = "emergency-dispatch-exchange")]
    EmergencyDispatchExchange,
    /// Public sector / critical infrastructure buying on card under the micro-purchase cap.
    #[default]
    #[serde(rename = "federal-micro-purchase-fastlane")]
    FederalMicroPurchaseFastlane,
    #[serde(rename = "solar-home-us")]
    SolarHomeUs,
    /// Industrial MRO / PPE / critical parts that must arrive this week.
    #[serde(rename = "global-sourcing-b2b")]
    GlobalSourcingB2b,
}

/// Amount and line-item description charged when a lead is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchCharge {
    pub amount_usd: u32,
    pub description: &'static str,
}

impl Tenant {
    pub const ALL: [Tenant; 4] = [
        Tenant::EmergencyDispatchExchange,
        Tenant::FederalMicroPurchaseFastlane,
        Tenant::SolarHomeUs,
        Tenant::GlobalSourcingB2b,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmergencyDispatchExchange => "emergency-dispatch-exchange",
            Self::FederalMicroPurchaseFastlane => "federal-micro-purchase-fastlane",
            Self::SolarHomeUs => "solar-home-us",
            Self::GlobalSourcingB2b => "global-sourcing-b2b",
        }
    }

    /// Public-sector tenants need micro-purchase authorization before dispatch
    /// and capture the signature before any money moves.
    pub fn is_public_sector(&self) -> bool {
        matches!(self, Self::FederalMicroPurchaseFastlane)
    }

    pub fn dispatch_charge(&self) -> DispatchCharge {
        if self.is_public_sector() {
            DispatchCharge {
                amount_usd: 1000,
                description: "Emergency parts under micro-purchase cap",
            }
        } else {
            DispatchCharge {
                amount_usd: 500,
                description: "Emergency field dispatch / mitigation",
            }
        }
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tenant {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Tenant::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "tenant",
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_names_match_display() {
        for tenant in Tenant::ALL {
            let json = serde_json::to_string(&tenant).unwrap();
            assert_eq!(json, format!("\"{}\"", tenant.as_str()));
            assert_eq!(tenant.as_str().parse::<Tenant>().unwrap(), tenant);
        }
    }

    #[test]
    fn unknown_tenant_rejected() {
        let err = "lawn-care".parse::<Tenant>().unwrap_err();
        assert_eq!(
            err,
            CoreError::UnknownVariant {
                kind: "tenant",
                value: "lawn-care".into()
            }
        );
    }

    #[test]
    fn only_federal_is_public_sector() {
        assert!(Tenant::FederalMicroPurchaseFastlane.is_public_sector());
        assert!(!Tenant::EmergencyDispatchExchange.is_public_sector());
        assert!(!Tenant::SolarHomeUs.is_public_sector());
        assert!(!Tenant::GlobalSourcingB2b.is_public_sector());
    }

    #[test]
    fn federal_charge_is_higher() {
        assert_eq!(Tenant::FederalMicroPurchaseFastlane.dispatch_charge().amount_usd, 1000);
        assert_eq!(Tenant::SolarHomeUs.dispatch_charge().amount_usd, 500);
    }
}
