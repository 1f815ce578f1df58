use crate::error::Result;
use crate::owner::OwnerId;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A stored mapping from a short code to the URL it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// The original URL that was shortened.
    pub original_url: String,
    /// The short code the URL is reachable under.
    pub short: ShortCode,
}

impl UrlRecord {
    pub fn new(original_url: impl Into<String>, short: ShortCode) -> Self {
        Self {
            original_url: original_url.into(),
            short,
        }
    }
}

/// A request to tombstone one short code on behalf of its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub owner: OwnerId,
    pub short: ShortCode,
}

/// Result of [`Storage::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// The record was persisted under the requested code.
    Inserted,
    /// The owner already shortened this URL; carries the code it got back then.
    Existing(ShortCode),
    /// Another record claimed the requested code first.
    CodeTaken,
}

/// Result of looking a short code up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The code is live and maps to the record.
    Found(UrlRecord),
    /// The code was issued and later deleted. It never resolves again.
    Gone(ShortCode),
    /// The code was never issued.
    NotFound,
}

impl Resolution {
    /// Whether any record, live or tombstoned, occupies the code.
    pub fn is_occupied(&self) -> bool {
        !matches!(self, Resolution::NotFound)
    }
}

/// The persistence contract every backend honours.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Inserts `record` for `owner` unless the owner already shortened the
    /// same URL. Atomic per call.
    async fn add(&self, owner: &OwnerId, record: UrlRecord) -> Result<AddOutcome>;

    /// Looks a short code up, distinguishing live, tombstoned and unknown codes.
    async fn get(&self, code: &ShortCode) -> Result<Resolution>;

    /// Returns every record created by `owner`, in no particular order.
    async fn user_urls(&self, owner: &OwnerId) -> Result<Vec<UrlRecord>>;

    /// Releases underlying resources. Calling it more than once is fine.
    async fn close(&self) -> Result<()>;
}

/// Extended contract needed for batch writes, deletion and statistics.
#[async_trait]
pub trait Database: Storage {
    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<()>;

    /// Persists all records for `owner` or none of them.
    async fn write_batch(&self, owner: &OwnerId, records: &[UrlRecord]) -> Result<()>;

    /// Tombstones each requested code owned by the requesting owner.
    ///
    /// Best effort: a failing item does not stop the rest, and the first
    /// failure is returned once every item was attempted.
    async fn delete_batch(&self, requests: &[DeleteRequest]) -> Result<()>;

    /// Number of live short links.
    async fn count_urls(&self) -> Result<u64>;

    /// Number of distinct owners.
    async fn count_users(&self) -> Result<u64>;
}
