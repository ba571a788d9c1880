//! JSON record store.
//!
//! Holds leads, suppliers, buyers and settings in one snapshot. Persistent
//! mode rewrites the whole file atomically (temp file + rename) after each
//! mutation; a mutation only becomes visible once that write succeeded.
//!
//! Several processes may share one file. Each mutation holds an exclusive
//! lock on `<file>.lock`, re-reads the file, applies its change and writes it
//! back before releasing, so no writer overwrites another's records. Reads
//! reload the file and never see a half-written snapshot.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use brokerchain_core::{
    Buyer, CrawlSource, Lead, NewCrawlSource, NewLead, NewSupplier, Settings, Supplier, buyer_key,
    random_id,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::{CreatedLead, LeadFilter, Store, StoreError, SupplierFilter};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    leads: Vec<Lead>,
    #[serde(default)]
    suppliers: Vec<Supplier>,
    #[serde(default)]
    buyers: Vec<Buyer>,
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    sources: Vec<CrawlSource>,
}

/// JSON store for leads, suppliers, buyers and settings.
///
/// Use [`open`](Self::open) for an ephemeral in-memory store and
/// [`open_persistent`](Self::open_persistent) for a file that survives
/// across runs.
pub struct JsonStore {
    snapshot: Mutex<Snapshot>,
    path: Option<PathBuf>,
}

impl JsonStore {
    /// Open an empty in-memory store.
    pub fn open() -> Self {
        Self {
            snapshot: Mutex::new(Snapshot::default()),
            path: None,
        }
    }

    /// Open or create a store file at `path`.
    ///
    /// A missing file starts empty and is created on the first write.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let snapshot = read_snapshot(path)?;
        info!(
            path = %path.display(),
            leads = snapshot.leads.len(),
            suppliers = snapshot.suppliers.len(),
            "opened store"
        );
        Ok(Self {
            snapshot: Mutex::new(snapshot),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The current snapshot, reloaded from disk in persistent mode.
    async fn current(&self) -> Result<MutexGuard<'_, Snapshot>, StoreError> {
        let mut guard = self.snapshot.lock().await;
        if let Some(path) = &self.path {
            *guard = load(path.clone()).await?;
        }
        Ok(guard)
    }

    /// Apply `f` to the latest snapshot, flush it, then make it current.
    ///
    /// In persistent mode the file lock is held from the re-read until the
    /// write has landed.
    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Snapshot) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.snapshot.lock().await;
        let Some(path) = &self.path else {
            let mut next = guard.clone();
            let out = f(&mut next)?;
            *guard = next;
            return Ok(out);
        };
        let _lock = FileLock::acquire(path.clone()).await?;
        let mut next = load(path.clone()).await?;
        let out = f(&mut next)?;
        flush(path.clone(), &next).await?;
        *guard = next;
        Ok(out)
    }
}

fn read_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
    if !path.exists() {
        return Ok(Snapshot::default());
    }
    let raw = std::fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Ok(Snapshot::default());
    }
    Ok(serde_json::from_str(&raw)?)
}

async fn load(path: PathBuf) -> Result<Snapshot, StoreError> {
    tokio::task::spawn_blocking(move || read_snapshot(&path))
        .await
        .map_err(|e| StoreError::Other(format!("store read task failed: {e}")))?
}

/// Exclusive advisory lock on `<store file>.lock`, released on drop.
struct FileLock {
    _file: File,
}

impl FileLock {
    async fn acquire(path: PathBuf) -> Result<Self, StoreError> {
        tokio::task::spawn_blocking(move || -> Result<Self, StoreError> {
            let mut name = path.into_os_string();
            name.push(".lock");
            let lock_path = PathBuf::from(name);
            if let Some(dir) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?;
            file.lock()?;
            debug!(path = %lock_path.display(), "store lock held");
            Ok(Self { _file: file })
        })
        .await
        .map_err(|e| StoreError::Other(format!("store lock task failed: {e}")))?
    }
}

async fn flush(path: PathBuf, snapshot: &Snapshot) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(snapshot)?;
    tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        std::io::Write::write_all(&mut tmp, &bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path)?;
        debug!(path = %path.display(), bytes = bytes.len(), "flushed store");
        Ok(())
    })
    .await
    .map_err(|e| StoreError::Other(format!("store flush task failed: {e}")))?
}

fn upsert_buyer(buyers: &mut Vec<Buyer>, lead: &Lead) {
    let Some(key) = buyer_key(lead) else {
        return;
    };
    let now = Utc::now();
    match buyers.iter_mut().find(|b| b.dedupe_key == key) {
        Some(buyer) => buyer.observe(lead, now),
        None => buyers.push(Buyer::from_lead(random_id("buyer"), key, lead, now)),
    }
}

#[async_trait]
impl Store for JsonStore {
    async fn list_leads(&self, filter: &LeadFilter) -> Result<Vec<Lead>, StoreError> {
        let snapshot = self.current().await?;
        let mut leads: Vec<Lead> = snapshot
            .leads
            .iter()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        leads.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(leads)
    }

    async fn get_lead(&self, id: &str) -> Result<Option<Lead>, StoreError> {
        let snapshot = self.current().await?;
        Ok(snapshot.leads.iter().find(|l| l.id == id).cloned())
    }

    async fn find_lead_by_envelope(&self, envelope_id: &str) -> Result<Option<Lead>, StoreError> {
        let snapshot = self.current().await?;
        Ok(snapshot
            .leads
            .iter()
            .find(|l| l.docusign_envelope_id.as_deref() == Some(envelope_id))
            .cloned())
    }

    async fn create_lead(&self, draft: NewLead) -> Result<CreatedLead, StoreError> {
        let candidate = Lead::from_draft(draft, random_id("lead"), Utc::now());
        self.mutate(move |snap| {
            if let Some(existing) = snap
                .leads
                .iter()
                .find(|l| l.dedup_hash == candidate.dedup_hash)
            {
                info!(lead_id = %existing.id, "lead already exists");
                return Ok(CreatedLead {
                    lead: existing.clone(),
                    created: false,
                });
            }
            upsert_buyer(&mut snap.buyers, &candidate);
            snap.leads.push(candidate.clone());
            info!(lead_id = %candidate.id, tenant = %candidate.tenant, "lead created");
            Ok(CreatedLead {
                lead: candidate,
                created: true,
            })
        })
        .await
    }

    async fn update_lead(&self, lead: &Lead) -> Result<(), StoreError> {
        self.mutate(|snap| {
            let slot = snap
                .leads
                .iter_mut()
                .find(|l| l.id == lead.id)
                .ok_or_else(|| StoreError::LeadNotFound(lead.id.clone()))?;
            *slot = lead.clone();
            Ok(())
        })
        .await
    }

    async fn update_leads_batch(&self, leads: &[Lead]) -> Result<usize, StoreError> {
        self.mutate(|snap| {
            for lead in leads {
                match snap.leads.iter_mut().find(|l| l.id == lead.id) {
                    Some(slot) => *slot = lead.clone(),
                    None => snap.leads.push(lead.clone()),
                }
            }
            Ok(leads.len())
        })
        .await
    }

    async fn list_suppliers(&self, filter: &SupplierFilter) -> Result<Vec<Supplier>, StoreError> {
        let snapshot = self.current().await?;
        Ok(snapshot
            .suppliers
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect())
    }

    async fn create_supplier(&self, supplier: NewSupplier) -> Result<Supplier, StoreError> {
        let supplier = supplier.into_supplier(random_id("supplier"), Utc::now());
        self.mutate(move |snap| {
            snap.suppliers.push(supplier.clone());
            info!(supplier_id = %supplier.id, state = %supplier.state, "supplier registered");
            Ok(supplier)
        })
        .await
    }

    async fn update_supplier(&self, supplier: &Supplier) -> Result<(), StoreError> {
        self.mutate(|snap| {
            let slot = snap
                .suppliers
                .iter_mut()
                .find(|s| s.id == supplier.id)
                .ok_or_else(|| StoreError::SupplierNotFound(supplier.id.clone()))?;
            *slot = supplier.clone();
            Ok(())
        })
        .await
    }

    async fn list_buyers(&self) -> Result<Vec<Buyer>, StoreError> {
        let snapshot = self.current().await?;
        let mut buyers = snapshot.buyers.clone();
        buyers.sort_by(|a, b| b.last_seen_utc.cmp(&a.last_seen_utc));
        Ok(buyers)
    }

    async fn get_settings(&self) -> Result<Settings, StoreError> {
        let snapshot = self.current().await?;
        debug!(count = snapshot.settings.len(), "loaded settings");
        Ok(snapshot.settings.clone())
    }

    async fn update_setting(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.mutate(|snap| {
            snap.settings.insert(key.to_string(), value);
            Ok(())
        })
        .await
    }

    async fn list_sources(&self) -> Result<Vec<CrawlSource>, StoreError> {
        let snapshot = self.current().await?;
        Ok(snapshot.sources.clone())
    }

    async fn add_source(&self, source: NewCrawlSource) -> Result<CrawlSource, StoreError> {
        let source = source.into_source();
        self.mutate(move |snap| {
            if snap.sources.iter().any(|s| s.url == source.url) {
                return Err(StoreError::DuplicateSource(source.url.clone()));
            }
            snap.sources.push(source.clone());
            info!(url = %source.url, state = %source.state, "crawl source registered");
            Ok(source)
        })
        .await
    }

    async fn update_source(&self, source: &CrawlSource) -> Result<(), StoreError> {
        self.mutate(|snap| {
            let slot = snap
                .sources
                .iter_mut()
                .find(|s| s.url == source.url)
                .ok_or_else(|| StoreError::SourceNotFound(source.url.clone()))?;
            *slot = source.clone();
            Ok(())
        })
        .await
    }
}
