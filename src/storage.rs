use crate::enrichment::{apply_jobs, company_key, competitor_from_jobs, merge_competitor};
use crate::errors::{AppError, ResultExt};
use crate::file_lock::{self, LockSettings};
use crate::models::{CompanyLead, EnrichedCompetitor, JobUpdate};
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub const LEADS_FILE_NAME: &str = "companies.json";
pub const COMPETITORS_FILE_NAME: &str = "enriched-competitors.json";

/// Lock file path for a store file: `<file>.lock` next to it.
pub fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

/// A JSON array on disk, rewritten atomically under a lock file.
///
/// Reads skip the lock since writes replace the file with a rename.
#[derive(Debug)]
pub struct JsonFileStore<T> {
    path: PathBuf,
    lock_path: PathBuf,
    settings: LockSettings,
    // Serializes writers of this process before they contend on the lock file.
    local: Mutex<()>,
    _records: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    pub fn new(path: PathBuf, settings: LockSettings) -> Self {
        Self {
            lock_path: lock_path_for(&path),
            path,
            settings,
            local: Mutex::new(()),
            _records: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// All records. A missing file is empty; an unparseable one is logged and
    /// treated as empty so a single bad write cannot wedge the service.
    pub async fn read(&self) -> Result<Vec<T>, AppError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("read {}", self.path.display()));
            }
        };

        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        match serde_json::from_slice::<Vec<T>>(&raw) {
            Ok(records) => Ok(records),
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable store file {}: {}",
                    self.path.display(),
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    /// Run `f` on the current records under both locks and persist the result.
    pub async fn update<R, F>(&self, f: F) -> Result<R, AppError>
    where
        F: FnOnce(&mut Vec<T>) -> R,
    {
        let _local = self.local.lock().await;
        let _lock = file_lock::acquire(&self.lock_path, self.settings).await?;

        let mut records = self.read().await?;
        let result = f(&mut records);
        self.write(&records).await?;
        Ok(result)
    }

    async fn write(&self, records: &[T]) -> Result<(), AppError> {
        let bytes = serde_json::to_vec_pretty(records)?;
        let parent = self
            .path
            .parent()
            .ok_or_else(|| AppError::StorageError("store path has no parent".to_string()))?;
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create store dir {}", parent.display()))?;

        let file_name = self
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("store");
        let tmp = parent.join(format!(".{}.tmp-{}", file_name, std::process::id()));

        tokio::fs::write(&tmp, &bytes)
            .await
            .with_context(|| format!("write tmp {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("rename {} -> {}", tmp.display(), self.path.display()))?;
        Ok(())
    }
}

// ============ Lead Store ============

/// Result of adding a batch of leads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddOutcome {
    pub added: usize,
    pub duplicates: usize,
    pub total: usize,
}

/// Leads of the current search session, unique by company name.
#[derive(Debug)]
pub struct LeadStore {
    file: JsonFileStore<CompanyLead>,
}

impl LeadStore {
    pub fn new(dir: &Path, settings: LockSettings) -> Self {
        Self {
            file: JsonFileStore::new(dir.join(LEADS_FILE_NAME), settings),
        }
    }

    pub fn file(&self) -> &JsonFileStore<CompanyLead> {
        &self.file
    }

    /// Add one lead; `false` if a lead with the same name is already stored.
    pub async fn add(&self, lead: CompanyLead) -> Result<bool, AppError> {
        let outcome = self.add_many(vec![lead]).await?;
        Ok(outcome.added == 1)
    }

    /// Add leads in order, skipping names already stored (or repeated in the batch).
    pub async fn add_many(&self, leads: Vec<CompanyLead>) -> Result<AddOutcome, AppError> {
        self.add_many_returning(leads)
            .await
            .map(|(outcome, _)| outcome)
    }

    /// Like [`LeadStore::add_many`], also returning the leads actually inserted.
    pub async fn add_many_returning(
        &self,
        leads: Vec<CompanyLead>,
    ) -> Result<(AddOutcome, Vec<CompanyLead>), AppError> {
        self.file
            .update(|records| {
                let mut inserted = Vec::new();
                let mut duplicates = 0;
                for lead in leads {
                    let key = company_key(&lead.company_name);
                    if records.iter().any(|r| company_key(&r.company_name) == key) {
                        tracing::debug!("Company already exists, skipping: {}", lead.company_name);
                        duplicates += 1;
                        continue;
                    }
                    records.push(lead.clone());
                    inserted.push(lead);
                }
                let outcome = AddOutcome {
                    added: inserted.len(),
                    duplicates,
                    total: records.len(),
                };
                (outcome, inserted)
            })
            .await
            .context("add leads")
    }

    pub async fn get_all(&self) -> Result<Vec<CompanyLead>, AppError> {
        self.file.read().await
    }

    pub async fn count(&self) -> Result<usize, AppError> {
        Ok(self.get_all().await?.len())
    }

    pub async fn clear(&self) -> Result<(), AppError> {
        self.file
            .update(|records| records.clear())
            .await
            .context("clear leads")
    }
}

// ============ Enriched Competitor Store ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Merged,
}

/// Enriched profiles, unique by company name, merged field-wise on conflict.
#[derive(Debug)]
pub struct CompetitorStore {
    file: JsonFileStore<EnrichedCompetitor>,
}

impl CompetitorStore {
    pub fn new(dir: &Path, settings: LockSettings) -> Self {
        Self {
            file: JsonFileStore::new(dir.join(COMPETITORS_FILE_NAME), settings),
        }
    }

    pub fn file(&self) -> &JsonFileStore<EnrichedCompetitor> {
        &self.file
    }

    /// Insert `competitor`, or merge it into the stored profile of the same company.
    pub async fn upsert(&self, competitor: EnrichedCompetitor) -> Result<UpsertOutcome, AppError> {
        let name = competitor.company_name.clone();
        self.file
            .update(move |records| {
                let key = company_key(&competitor.company_name);
                match records
                    .iter_mut()
                    .find(|r| company_key(&r.company_name) == key)
                {
                    Some(existing) => {
                        merge_competitor(existing, competitor);
                        UpsertOutcome::Merged
                    }
                    None => {
                        records.push(competitor);
                        UpsertOutcome::Inserted
                    }
                }
            })
            .await
            .with_context(|| format!("upsert competitor {}", name))
    }

    /// Union job postings into the company's profile, creating a placeholder
    /// profile when the main enrichment has not arrived yet.
    pub async fn apply_jobs(&self, update: JobUpdate) -> Result<UpsertOutcome, AppError> {
        let name = update.company_name.clone();
        self.file
            .update(move |records| {
                let key = company_key(&update.company_name);
                match records
                    .iter_mut()
                    .find(|r| company_key(&r.company_name) == key)
                {
                    Some(existing) => {
                        apply_jobs(existing, &update);
                        UpsertOutcome::Merged
                    }
                    None => {
                        records.push(competitor_from_jobs(&update));
                        UpsertOutcome::Inserted
                    }
                }
            })
            .await
            .with_context(|| format!("apply jobs for {}", name))
    }

    pub async fn get_all(&self) -> Result<Vec<EnrichedCompetitor>, AppError> {
        self.file.read().await
    }

    pub async fn clear(&self) -> Result<(), AppError> {
        self.file
            .update(|records| records.clear())
            .await
            .context("clear enriched competitors")
    }
}
