//! Recording collaborators for run tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use brokerchain_core::{Lead, Supplier};
use brokerchain_providers::{
    BillingProvider, CheckoutSession, Envelope, Mailer, ProviderError, SignatureProvider,
};
use brokerchain_store::{JsonStore, StoreError};

use crate::{DispatchContext, SupplierMatcher};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Match(String),
    Checkout(String, u32),
    Envelope(String),
    Mail { to: String, subject: String },
}

/// Shared, ordered record of collaborator calls.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }
}

pub fn supplier(state: &str) -> Supplier {
    Supplier {
        id: format!("supplier-{}", state.to_lowercase()),
        business_name: format!("{state} Rapid Response"),
        email: "dispatch@rapid.test".into(),
        phone24h: "555-0100".into(),
        state: state.into(),
        states_served: vec![state.into()],
        categories: Vec::new(),
        active: true,
        billing_pref: "card".into(),
        created_utc: None,
        last_update_utc: None,
    }
}

enum Outcome {
    Found(Supplier),
    Nobody,
    Fail,
}

pub struct FakeMatcher {
    outcome: Outcome,
    log: Option<CallLog>,
}

impl FakeMatcher {
    pub fn always(supplier: Supplier) -> Self {
        Self {
            outcome: Outcome::Found(supplier),
            log: None,
        }
    }

    pub fn none() -> Self {
        Self {
            outcome: Outcome::Nobody,
            log: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            outcome: Outcome::Fail,
            log: None,
        }
    }

    pub fn logging(mut self, log: &CallLog) -> Self {
        self.log = Some(log.clone());
        self
    }
}

#[async_trait]
impl SupplierMatcher for FakeMatcher {
    async fn match_supplier(&self, lead: &Lead) -> Result<Option<Supplier>, StoreError> {
        if let Some(log) = &self.log {
            log.push(Call::Match(lead.id.clone()));
        }
        match &self.outcome {
            Outcome::Found(s) => Ok(Some(s.clone())),
            Outcome::Nobody => Ok(None),
            Outcome::Fail => Err(StoreError::Other("supplier table unavailable".into())),
        }
    }
}

pub struct FakeBilling {
    log: CallLog,
    failures: HashMap<String, ProviderError>,
}

impl FakeBilling {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            failures: HashMap::new(),
        }
    }

    pub fn failing_for(mut self, lead_id: &str, err: ProviderError) -> Self {
        self.failures.insert(lead_id.to_string(), err);
        self
    }
}

#[async_trait]
impl BillingProvider for FakeBilling {
    async fn create_checkout_session(
        &self,
        lead: &Lead,
        amount_usd: u32,
        _description: &str,
    ) -> Result<CheckoutSession, ProviderError> {
        self.log.push(Call::Checkout(lead.id.clone(), amount_usd));
        if let Some(err) = self.failures.get(&lead.id) {
            return Err(err.clone());
        }
        Ok(CheckoutSession {
            checkout_url: format!("https://checkout.test/{}", lead.id),
            session_id: format!("cs_{}", lead.id),
        })
    }
}

pub struct FakeSignature {
    log: CallLog,
    failures: HashMap<String, ProviderError>,
}

impl FakeSignature {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            failures: HashMap::new(),
        }
    }

    pub fn failing_for(mut self, lead_id: &str, err: ProviderError) -> Self {
        self.failures.insert(lead_id.to_string(), err);
        self
    }
}

#[async_trait]
impl SignatureProvider for FakeSignature {
    async fn create_envelope(&self, lead: &Lead) -> Result<Envelope, ProviderError> {
        self.log.push(Call::Envelope(lead.id.clone()));
        if let Some(err) = self.failures.get(&lead.id) {
            return Err(err.clone());
        }
        Ok(Envelope {
            envelope_id: format!("env-{}", lead.id),
        })
    }
}

pub struct FakeMailer {
    log: CallLog,
    reject: Option<String>,
    delivers: bool,
}

impl FakeMailer {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            reject: None,
            delivers: true,
        }
    }

    pub fn dry_run(mut self) -> Self {
        self.delivers = false;
        self
    }

    pub fn rejecting(mut self, to: &str) -> Self {
        self.reject = Some(to.to_string());
        self
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> Result<(), ProviderError> {
        if self.reject.as_deref() == Some(to) {
            return Err(ProviderError::permanent("mailbox unavailable"));
        }
        self.log.push(Call::Mail {
            to: to.to_string(),
            subject: subject.to_string(),
        });
        Ok(())
    }

    fn delivers(&self) -> bool {
        self.delivers
    }
}

/// Context where every collaborator records into one log.
pub fn context(store: Arc<JsonStore>, matcher: FakeMatcher) -> (DispatchContext, CallLog) {
    let log = CallLog::default();
    let ctx = DispatchContext {
        store,
        matcher: Arc::new(matcher.logging(&log)),
        billing: Arc::new(FakeBilling::new(&log)),
        signature: Arc::new(FakeSignature::new(&log)),
    };
    (ctx, log)
}
