use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use brokerchain_ai::{LeadAnalyst, OpenAiAnalyst, OpenAiClient};
use brokerchain_core::settings::{FeatureFlags, KNOWN_KEYS, parse_setting_value};
use brokerchain_core::{IntakeRequest, NewCrawlSource, NewLead, NewSupplier};
use brokerchain_dispatch::{
    DispatchContext, apply_billing_event, apply_signature_event, authorize_lead, draft_outreach,
    run_crawl, run_dispatch, run_follow_ups, run_qualification, run_supplier_ping,
};
use brokerchain_providers::{
    DocusignSignature, HttpFetcher, LogMailer, StripeBilling, classify_email,
    parse_docusign_event, parse_stripe_event, thread_key,
};
use brokerchain_store::{JsonStore, LeadFilter, Store, SupplierFilter};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::config::{
    BuyersCommand, ClassifyMailArgs, Cli, Command, LeadsCommand, ProviderArgs, SettingsCommand,
    SourcesCommand, SuppliersCommand, WebhookCommand,
};

/// Run one command and return the JSON document to print.
pub async fn execute(cli: Cli) -> anyhow::Result<Value> {
    let Cli {
        data,
        providers,
        command,
        ..
    } = cli;

    let open_store = || -> anyhow::Result<Arc<JsonStore>> {
        let store = JsonStore::open_persistent(&data)
            .with_context(|| format!("failed to open store {}", data.display()))?;
        Ok(Arc::new(store))
    };

    match command {
        Command::CheckEnv { strict } => check_env(&providers, strict),
        Command::ClassifyMail(args) => Ok(classify_mail(&args)),
        Command::Dispatch => {
            let store = open_store()?;
            let retry = providers.retry_policy();
            let ctx = DispatchContext::new(
                store,
                Arc::new(StripeBilling::new(providers.stripe(), retry)),
                Arc::new(DocusignSignature::new(providers.docusign(), retry)),
            );
            let report = run_dispatch(&ctx).await.context("dispatch run failed")?;
            Ok(serde_json::to_value(report)?)
        }
        Command::Qualify { assess } => {
            let store = open_store()?;
            let analyst = assess.then(|| analyst(&providers));
            let report = run_qualification(
                store.as_ref(),
                analyst.as_ref().map(|a| a as &dyn LeadAnalyst),
            )
            .await
            .context("qualification run failed")?;
            Ok(serde_json::to_value(report)?)
        }
        Command::FollowUp { from } => {
            let store = open_store()?;
            let mailer = LogMailer::new(from);
            let report = run_follow_ups(store.as_ref(), &mailer, Utc::now())
                .await
                .context("follow-up run failed")?;
            if report.dry_run {
                warn!(planned = report.planned, "no mail transport, follow-ups not sent or recorded");
            }
            Ok(serde_json::to_value(report)?)
        }
        Command::Crawl => {
            let store = open_store()?;
            let fetcher = HttpFetcher::new(providers.retry_policy());
            let report = run_crawl(store.as_ref(), &fetcher)
                .await
                .context("crawl run failed")?;
            Ok(serde_json::to_value(report)?)
        }
        Command::Sources(SourcesCommand::Add {
            url,
            state,
            tenant,
            category,
            buyer_type,
        }) => {
            let store = open_store()?;
            let source = store
                .add_source(NewCrawlSource {
                    url,
                    state,
                    tenant_guess: tenant,
                    category_guess: category,
                    buyer_type_guess: buyer_type,
                })
                .await?;
            Ok(serde_json::to_value(source)?)
        }
        Command::Sources(SourcesCommand::List) => {
            let store = open_store()?;
            Ok(serde_json::to_value(store.list_sources().await?)?)
        }
        Command::Sources(SourcesCommand::SetActive { url, active }) => {
            let store = open_store()?;
            let Some(mut source) = store
                .list_sources()
                .await?
                .into_iter()
                .find(|s| s.url == url)
            else {
                bail!("crawl source {url} not found");
            };
            source.active = active;
            store.update_source(&source).await?;
            Ok(serde_json::to_value(source)?)
        }
        Command::PingSuppliers { from } => {
            let store = open_store()?;
            let mailer = LogMailer::new(from);
            let report = run_supplier_ping(store.as_ref(), &mailer, Utc::now())
                .await
                .context("supplier ping failed")?;
            if report.dry_run {
                warn!(planned = report.planned, "no mail transport, standby pings not sent or recorded");
            }
            Ok(serde_json::to_value(report)?)
        }
        Command::Intake(args) => {
            let store = open_store()?;
            let request = IntakeRequest {
                need: args.need,
                zip: args.zip,
                state: args.state,
                urgency: args.urgency,
                buyer_type: args.buyer_type,
                email: args.email,
                phone: args.phone,
                source: args.source,
            };
            let created = store.create_lead(request.into_draft()).await?;
            Ok(json!({
                "id": created.lead.id,
                "tenant": created.lead.tenant,
                "created": created.created,
            }))
        }
        Command::Ingest { file } => {
            let store = open_store()?;
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let drafts: Vec<NewLead> = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a JSON array of leads", file.display()))?;
            ingest(store.as_ref(), drafts).await
        }
        Command::Webhook(webhook) => {
            let store = open_store()?;
            let outcome = match webhook {
                WebhookCommand::Stripe { payload } => {
                    let event = parse_stripe_event(&read_payload(&payload)?)?;
                    apply_billing_event(store.as_ref(), event).await?
                }
                WebhookCommand::Docusign { payload } => {
                    let event = parse_docusign_event(&read_payload(&payload)?)?;
                    apply_signature_event(store.as_ref(), event).await?
                }
            };
            Ok(serde_json::to_value(outcome)?)
        }
        Command::Settings(SettingsCommand::Show) => {
            let store = open_store()?;
            let settings = store.get_settings().await?;
            Ok(json!({
                "settings": settings,
                "flags": FeatureFlags::from_settings(&settings),
            }))
        }
        Command::Settings(SettingsCommand::Set { key, value }) => {
            let store = open_store()?;
            if !KNOWN_KEYS.contains(&key.as_str()) {
                warn!(key = %key, "not a known toggle, storing anyway");
            }
            let value = parse_setting_value(&value);
            store.update_setting(&key, value.clone()).await?;
            Ok(json!({ key: value }))
        }
        Command::Suppliers(SuppliersCommand::Add {
            name,
            email,
            phone,
            state,
            serves,
            categories,
        }) => {
            let store = open_store()?;
            let supplier = store
                .create_supplier(NewSupplier {
                    business_name: name,
                    email,
                    phone24h: phone,
                    state,
                    states_served: serves,
                    categories,
                })
                .await?;
            Ok(serde_json::to_value(supplier)?)
        }
        Command::Suppliers(SuppliersCommand::List { all, state }) => {
            let store = open_store()?;
            let filter = SupplierFilter {
                active: (!all).then_some(true),
                state,
            };
            Ok(serde_json::to_value(store.list_suppliers(&filter).await?)?)
        }
        Command::Leads(LeadsCommand::List {
            status,
            tenant,
            sale_ready,
        }) => {
            let store = open_store()?;
            let filter = LeadFilter {
                status,
                sale_ready,
                tenant,
            };
            Ok(serde_json::to_value(store.list_leads(&filter).await?)?)
        }
        Command::Leads(LeadsCommand::Show { id }) => {
            let store = open_store()?;
            match store.get_lead(&id).await? {
                Some(lead) => Ok(serde_json::to_value(lead)?),
                None => bail!("lead {id} not found"),
            }
        }
        Command::Leads(LeadsCommand::Authorize { id }) => {
            let store = open_store()?;
            let lead = authorize_lead(store.as_ref(), &id).await?;
            Ok(json!({
                "id": lead.id,
                "status": lead.status,
                "authorized_under_15k": lead.authorized_under_15k,
            }))
        }
        Command::Buyers(BuyersCommand::List) => {
            let store = open_store()?;
            Ok(serde_json::to_value(store.list_buyers().await?)?)
        }
        Command::Outreach { lead_id } => {
            let store = open_store()?;
            let analyst = analyst(&providers);
            match draft_outreach(store.as_ref(), &analyst, &lead_id).await? {
                Some(draft) => Ok(serde_json::to_value(draft)?),
                None => Ok(json!({ "drafted": false, "reason": "outreach disabled" })),
            }
        }
    }
}

fn analyst(providers: &ProviderArgs) -> OpenAiAnalyst {
    OpenAiAnalyst::new(OpenAiClient::new(
        providers.openai(),
        providers.retry_policy(),
    ))
}

/// `-` reads the payload from stdin.
fn read_payload(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        return std::io::read_to_string(std::io::stdin()).context("failed to read stdin");
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

async fn ingest(store: &dyn Store, drafts: Vec<NewLead>) -> anyhow::Result<Value> {
    let total = drafts.len();
    let mut created = 0usize;
    for draft in drafts {
        if store.create_lead(draft).await?.created {
            created += 1;
        }
    }
    info!(total, created, duplicates = total - created, "ingest complete");
    Ok(json!({ "total": total, "created": created, "duplicates": total - created }))
}

fn check_env(providers: &ProviderArgs, strict: bool) -> anyhow::Result<Value> {
    let missing = providers.missing_by_service();
    let names: Vec<&str> = missing.iter().flat_map(|(_, vars)| vars.iter().copied()).collect();
    for (service, vars) in &missing {
        if !vars.is_empty() {
            warn!(service, missing = ?vars, "provider not configured");
        }
    }
    if strict && !names.is_empty() {
        bail!("missing configuration: {}", names.join(", "));
    }
    let report: serde_json::Map<String, Value> = missing
        .into_iter()
        .map(|(service, vars)| (service.to_string(), json!(vars)))
        .collect();
    Ok(json!({ "ok": names.is_empty(), "missing": report }))
}

fn classify_mail(args: &ClassifyMailArgs) -> Value {
    let class = classify_email(&args.subject, &args.body);
    let thread = thread_key(
        args.message_id.as_deref(),
        args.in_reply_to.as_deref(),
        &args.references,
        &args.subject,
    );
    json!({ "class": class.as_str(), "thread": thread })
}
