use async_trait::async_trait;
use parking_lot::Mutex;
use snip_core::error::{Result, StorageError};
use snip_core::{
    AddOutcome, Database, DeleteRequest, OwnerId, Resolution, ShortCode, Storage, UrlRecord,
};
use std::collections::{HashMap, HashSet};

/// In-memory storage entry for a URL mapping.
#[derive(Debug, Clone)]
struct Entry {
    owner: OwnerId,
    original_url: String,
    deleted: bool,
}

impl Entry {
    fn to_record(&self, short: &ShortCode) -> UrlRecord {
        UrlRecord::new(self.original_url.clone(), short.clone())
    }
}

/// The mapping shared by the in-memory and file backends.
///
/// Three views over the same data are kept in lockstep: code → entry,
/// owner → codes, and (owner, url) → code. Callers serialize access with
/// their own lock, so every method here sees a consistent snapshot.
#[derive(Debug, Default)]
pub(crate) struct Index {
    entries: HashMap<ShortCode, Entry>,
    by_owner: HashMap<OwnerId, Vec<ShortCode>>,
    by_origin: HashMap<(OwnerId, String), ShortCode>,
}

impl Index {
    /// Returns why `record` cannot be inserted for `owner`, if it cannot.
    pub(crate) fn check_add(&self, owner: &OwnerId, record: &UrlRecord) -> Option<AddOutcome> {
        let pair = (owner.clone(), record.original_url.clone());
        if let Some(existing) = self.by_origin.get(&pair) {
            return Some(AddOutcome::Existing(existing.clone()));
        }
        if self.entries.contains_key(&record.short) {
            return Some(AddOutcome::CodeTaken);
        }
        None
    }

    pub(crate) fn insert(&mut self, owner: &OwnerId, record: UrlRecord) {
        self.by_origin.insert(
            (owner.clone(), record.original_url.clone()),
            record.short.clone(),
        );
        self.by_owner
            .entry(owner.clone())
            .or_default()
            .push(record.short.clone());
        self.entries.insert(
            record.short,
            Entry {
                owner: owner.clone(),
                original_url: record.original_url,
                deleted: false,
            },
        );
    }

    pub(crate) fn add(&mut self, owner: &OwnerId, record: UrlRecord) -> AddOutcome {
        if let Some(outcome) = self.check_add(owner, &record) {
            return outcome;
        }
        self.insert(owner, record);
        AddOutcome::Inserted
    }

    /// Verifies a whole batch can be inserted without breaking uniqueness.
    pub(crate) fn check_batch(&self, owner: &OwnerId, records: &[UrlRecord]) -> Result<()> {
        let mut codes = HashSet::with_capacity(records.len());
        let mut origins = HashSet::with_capacity(records.len());

        for record in records {
            if self.entries.contains_key(&record.short) || !codes.insert(&record.short) {
                return Err(StorageError::Conflict(format!(
                    "short code {} already exists",
                    record.short
                )));
            }

            let pair = (owner.clone(), record.original_url.clone());
            if self.by_origin.contains_key(&pair) || !origins.insert(&record.original_url) {
                return Err(StorageError::Conflict(format!(
                    "{} was already shortened by {}",
                    record.original_url, owner
                )));
            }
        }

        Ok(())
    }

    pub(crate) fn get(&self, code: &ShortCode) -> Resolution {
        match self.entries.get(code) {
            Some(entry) if entry.deleted => Resolution::Gone(code.clone()),
            Some(entry) => Resolution::Found(entry.to_record(code)),
            None => Resolution::NotFound,
        }
    }

    pub(crate) fn user_urls(&self, owner: &OwnerId) -> Vec<UrlRecord> {
        let Some(codes) = self.by_owner.get(owner) else {
            return Vec::new();
        };

        codes
            .iter()
            .filter_map(|code| self.entries.get(code).map(|entry| entry.to_record(code)))
            .collect()
    }

    /// Whether `request` names a live code owned by the requester.
    pub(crate) fn is_deletable(&self, request: &DeleteRequest) -> bool {
        self.entries
            .get(&request.short)
            .is_some_and(|entry| !entry.deleted && entry.owner == request.owner)
    }

    /// Tombstones `code`. Returns `false` if it was unknown or already gone.
    pub(crate) fn mark_deleted(&mut self, code: &ShortCode) -> bool {
        match self.entries.get_mut(code) {
            Some(entry) if !entry.deleted => {
                entry.deleted = true;
                true
            }
            _ => false,
        }
    }

    /// Replays one persisted record, used when rebuilding from disk.
    pub(crate) fn restore(&mut self, owner: &OwnerId, record: UrlRecord, deleted: bool) {
        let short = record.short.clone();
        if !self.entries.contains_key(&short) {
            self.insert(owner, record);
        }
        if deleted {
            self.mark_deleted(&short);
        }
    }

    pub(crate) fn count_urls(&self) -> u64 {
        self.entries.values().filter(|entry| !entry.deleted).count() as u64
    }

    pub(crate) fn count_users(&self) -> u64 {
        self.by_owner.len() as u64
    }
}

/// In-memory implementation of the storage contract.
///
/// A single mutex guards the index so that the check-then-insert in
/// [`Storage::add`] and the all-or-nothing [`Database::write_batch`] are
/// atomic. The lock is never held across an await point.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    index: Mutex<Index>,
}

impl InMemoryRepository {
    /// Creates a new, empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for InMemoryRepository {
    async fn add(&self, owner: &OwnerId, record: UrlRecord) -> Result<AddOutcome> {
        Ok(self.index.lock().add(owner, record))
    }

    async fn get(&self, code: &ShortCode) -> Result<Resolution> {
        Ok(self.index.lock().get(code))
    }

    async fn user_urls(&self, owner: &OwnerId) -> Result<Vec<UrlRecord>> {
        Ok(self.index.lock().user_urls(owner))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl Database for InMemoryRepository {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn write_batch(&self, owner: &OwnerId, records: &[UrlRecord]) -> Result<()> {
        let mut index = self.index.lock();
        index.check_batch(owner, records)?;
        for record in records {
            index.insert(owner, record.clone());
        }
        Ok(())
    }

    async fn delete_batch(&self, requests: &[DeleteRequest]) -> Result<()> {
        let mut index = self.index.lock();
        for request in requests {
            if index.is_deletable(request) {
                index.mark_deleted(&request.short);
            }
        }
        Ok(())
    }

    async fn count_urls(&self) -> Result<u64> {
        Ok(self.index.lock().count_urls())
    }

    async fn count_users(&self) -> Result<u64> {
        Ok(self.index.lock().count_users())
    }
}
