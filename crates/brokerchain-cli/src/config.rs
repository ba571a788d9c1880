//! Command-line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use brokerchain_ai::OpenAiConfig;
use brokerchain_ai::client::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use brokerchain_core::{BuyerType, LeadStatus, Tenant, Urgency};
use brokerchain_providers::billing::{DEFAULT_CANCEL_URL, DEFAULT_STRIPE_API_BASE, DEFAULT_SUCCESS_URL};
use brokerchain_providers::{DocusignConfig, RetryPolicy, StripeConfig};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "brokerchain", version, about = "Lead qualification and dispatch pipeline")]
pub struct Cli {
    /// Store file. Created on first write.
    #[arg(long, env = "BROKERCHAIN_DATA", default_value = "brokerchain.json", global = true)]
    pub data: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(flatten)]
    pub providers: ProviderArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Provider credentials. Absent values are reported when a call needs them.
#[derive(Debug, Clone, Args)]
pub struct ProviderArgs {
    #[arg(long, env = "STRIPE_SECRET_KEY", hide_env_values = true)]
    pub stripe_secret_key: Option<String>,
    #[arg(long, env = "STRIPE_SUCCESS_URL", default_value = DEFAULT_SUCCESS_URL)]
    pub stripe_success_url: String,
    #[arg(long, env = "STRIPE_CANCEL_URL", default_value = DEFAULT_CANCEL_URL)]
    pub stripe_cancel_url: String,
    #[arg(long, env = "STRIPE_API_BASE", default_value = DEFAULT_STRIPE_API_BASE)]
    pub stripe_api_base: String,

    #[arg(long, env = "DOCUSIGN_BASE_URL")]
    pub docusign_base_url: Option<String>,
    #[arg(long, env = "DOCUSIGN_ACCOUNT_ID")]
    pub docusign_account_id: Option<String>,
    #[arg(long, env = "DOCUSIGN_ACCESS_TOKEN", hide_env_values = true)]
    pub docusign_access_token: Option<String>,
    #[arg(long, env = "DOCUSIGN_TEMPLATE_ID")]
    pub docusign_template_id: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,
    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    pub openai_model: String,
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub openai_base_url: String,

    /// Attempts per provider call, including the first.
    #[arg(long, env = "RETRY_MAX_ATTEMPTS", default_value_t = 3)]
    pub retry_max_attempts: u32,
    #[arg(long, env = "RETRY_INITIAL_DELAY_MS", default_value_t = 1000)]
    pub retry_initial_delay_ms: u64,
}

fn blank_to_none(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.trim().is_empty())
}

impl ProviderArgs {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            Duration::from_millis(self.retry_initial_delay_ms),
        )
    }

    pub fn stripe(&self) -> StripeConfig {
        StripeConfig {
            secret_key: blank_to_none(&self.stripe_secret_key),
            success_url: self.stripe_success_url.clone(),
            cancel_url: self.stripe_cancel_url.clone(),
            api_base: self.stripe_api_base.clone(),
        }
    }

    pub fn docusign(&self) -> DocusignConfig {
        DocusignConfig {
            base_url: blank_to_none(&self.docusign_base_url),
            account_id: blank_to_none(&self.docusign_account_id),
            access_token: blank_to_none(&self.docusign_access_token),
            template_id: blank_to_none(&self.docusign_template_id),
        }
    }

    pub fn openai(&self) -> OpenAiConfig {
        OpenAiConfig {
            api_key: blank_to_none(&self.openai_api_key),
            model: self.openai_model.clone(),
            base_url: self.openai_base_url.clone(),
        }
    }

    /// Critical variables that are unset, grouped by service.
    pub fn missing_by_service(&self) -> Vec<(&'static str, Vec<&'static str>)> {
        let openai = if self.openai().api_key.is_none() {
            vec!["OPENAI_API_KEY"]
        } else {
            Vec::new()
        };
        let stripe = if self.stripe().secret_key.is_none() {
            vec!["STRIPE_SECRET_KEY"]
        } else {
            Vec::new()
        };
        vec![
            ("openai", openai),
            ("stripe", stripe),
            ("docusign", self.docusign().missing()),
        ]
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Assign suppliers and open payment/authorization flows for sale-ready leads.
    Dispatch,
    /// Refresh clarifying questions and promote urgent leads.
    Qualify {
        /// Also ask the model for an advisory assessment of unpromoted leads.
        #[arg(long)]
        assess: bool,
    },
    /// Send due follow-up emails. Without a mail transport this is a dry run.
    FollowUp {
        #[arg(long, default_value = "contact@brokerchain.business")]
        from: String,
    },
    /// Fetch active crawl sources and file changed pages as leads.
    Crawl,
    #[command(subcommand)]
    Sources(SourcesCommand),
    /// Ask active suppliers whether they can take work today.
    PingSuppliers {
        #[arg(long, default_value = "contact@brokerchain.business")]
        from: String,
    },
    /// Submit a request the way the public form does.
    Intake(IntakeArgs),
    /// Import lead drafts from a JSON array file.
    Ingest { file: PathBuf },
    /// Apply a provider webhook payload (file path, or `-` for stdin).
    #[command(subcommand)]
    Webhook(WebhookCommand),
    /// Report missing provider configuration.
    CheckEnv {
        /// Exit non-zero when anything is missing.
        #[arg(long)]
        strict: bool,
    },
    #[command(subcommand)]
    Settings(SettingsCommand),
    #[command(subcommand)]
    Suppliers(SuppliersCommand),
    #[command(subcommand)]
    Leads(LeadsCommand),
    #[command(subcommand)]
    Buyers(BuyersCommand),
    /// Draft a first-contact email for a dispatched lead.
    Outreach { lead_id: String },
    /// Classify an inbound message and print its thread key.
    ClassifyMail(ClassifyMailArgs),
}

#[derive(Debug, Clone, Args)]
pub struct IntakeArgs {
    #[arg(long)]
    pub need: String,
    #[arg(long, default_value = "")]
    pub zip: String,
    #[arg(long, default_value = "")]
    pub state: String,
    #[arg(long)]
    pub urgency: Option<Urgency>,
    #[arg(long)]
    pub buyer_type: Option<BuyerType>,
    #[arg(long, default_value = "")]
    pub email: String,
    #[arg(long, default_value = "")]
    pub phone: String,
    #[arg(long, default_value = "")]
    pub source: String,
}

#[derive(Debug, Subcommand)]
pub enum WebhookCommand {
    Stripe { payload: PathBuf },
    Docusign { payload: PathBuf },
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    Show,
    /// Set a toggle. VALUE is parsed as JSON when possible (`true`, `1`, `"x"`).
    Set { key: String, value: String },
}

#[derive(Debug, Subcommand)]
pub enum SuppliersCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long)]
        state: String,
        /// Additional states served, comma separated.
        #[arg(long, value_delimiter = ',')]
        serves: Vec<String>,
        /// Categories, comma separated. Empty means every category.
        #[arg(long, value_delimiter = ',')]
        categories: Vec<String>,
    },
    List {
        /// Include inactive suppliers.
        #[arg(long)]
        all: bool,
        #[arg(long)]
        state: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum LeadsCommand {
    List {
        #[arg(long)]
        status: Option<LeadStatus>,
        #[arg(long)]
        tenant: Option<Tenant>,
        #[arg(long)]
        sale_ready: Option<bool>,
    },
    Show { id: String },
    /// Record a micro-purchase authorization and return the lead to the dispatch queue.
    Authorize { id: String },
}

#[derive(Debug, Subcommand)]
pub enum SourcesCommand {
    Add {
        url: String,
        #[arg(long, default_value = "")]
        state: String,
        #[arg(long)]
        tenant: Option<Tenant>,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long)]
        buyer_type: Option<BuyerType>,
    },
    List,
    /// Pause or resume a source.
    SetActive {
        url: String,
        #[arg(action = clap::ArgAction::Set)]
        active: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum BuyersCommand {
    List,
}

#[derive(Debug, Clone, Args)]
pub struct ClassifyMailArgs {
    #[arg(long, default_value = "")]
    pub subject: String,
    #[arg(long, default_value = "")]
    pub body: String,
    #[arg(long)]
    pub message_id: Option<String>,
    #[arg(long)]
    pub in_reply_to: Option<String>,
    #[arg(long, value_delimiter = ' ')]
    pub references: Vec<String>,
}
