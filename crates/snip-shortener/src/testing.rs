use async_trait::async_trait;
use parking_lot::Mutex;
use snip_core::error::{Result, StorageError};
use snip_core::{
    AddOutcome, Database, DeleteRequest, OwnerId, Resolution, ShortCode, Storage, UrlRecord,
};
use snip_storage::InMemoryRepository;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// In-memory storage that records delete batches and can be told to fail.
#[derive(Default)]
pub(crate) struct RecordingDatabase {
    inner: InMemoryRepository,
    deletes: Mutex<Vec<Vec<DeleteRequest>>>,
    fail_deletes: AtomicBool,
    fail_batches: AtomicBool,
    fail_counts: AtomicBool,
    delete_delay: Mutex<Option<Duration>>,
}

impl RecordingDatabase {
    pub(crate) fn delete_batches(&self) -> Vec<Vec<DeleteRequest>> {
        self.deletes.lock().clone()
    }

    pub(crate) fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_batches(&self, fail: bool) {
        self.fail_batches.store(fail, Ordering::SeqCst);
    }

    /// Makes every `delete_batch` sleep before it touches storage.
    pub(crate) fn delay_deletes(&self, delay: Duration) {
        *self.delete_delay.lock() = Some(delay);
    }

    pub(crate) fn fail_counts(&self, fail: bool) {
        self.fail_counts.store(fail, Ordering::SeqCst);
    }
}

fn injected() -> StorageError {
    StorageError::Unavailable("injected failure".to_string())
}

#[async_trait]
impl Storage for RecordingDatabase {
    async fn add(&self, owner: &OwnerId, record: UrlRecord) -> Result<AddOutcome> {
        self.inner.add(owner, record).await
    }

    async fn get(&self, code: &ShortCode) -> Result<Resolution> {
        self.inner.get(code).await
    }

    async fn user_urls(&self, owner: &OwnerId) -> Result<Vec<UrlRecord>> {
        self.inner.user_urls(owner).await
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }
}

#[async_trait]
impl Database for RecordingDatabase {
    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }

    async fn write_batch(&self, owner: &OwnerId, records: &[UrlRecord]) -> Result<()> {
        if self.fail_batches.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.write_batch(owner, records).await
    }

    async fn delete_batch(&self, requests: &[DeleteRequest]) -> Result<()> {
        self.deletes.lock().push(requests.to_vec());
        let delay = *self.delete_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.delete_batch(requests).await
    }

    async fn count_urls(&self) -> Result<u64> {
        self.inner.count_urls().await
    }

    async fn count_users(&self) -> Result<u64> {
        if self.fail_counts.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.count_users().await
    }
}
