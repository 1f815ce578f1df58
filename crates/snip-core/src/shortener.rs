use crate::owner::OwnerId;
use crate::repository::{Resolution, UrlRecord};
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, crate::error::ShortenerError>;

/// Outcome of shortening a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A new short link was created.
    Created(UrlRecord),
    /// The owner had already shortened this URL; the existing link is returned.
    Conflict(UrlRecord),
}

impl CreateOutcome {
    pub fn record(&self) -> &UrlRecord {
        match self {
            CreateOutcome::Created(record) | CreateOutcome::Conflict(record) => record,
        }
    }

    pub fn into_record(self) -> UrlRecord {
        match self {
            CreateOutcome::Created(record) | CreateOutcome::Conflict(record) => record,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, CreateOutcome::Conflict(_))
    }
}

/// One URL of a batch request, tagged by a caller-chosen correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub correlation_id: String,
    pub original_url: String,
}

/// The short code assigned to one [`BatchEntry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub correlation_id: String,
    pub short: ShortCode,
}

/// Aggregate counters over the whole mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub urls: u64,
    pub users: u64,
}

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Shortens `original_url` for `owner`.
    ///
    /// Shortening the same URL twice for the same owner yields
    /// [`CreateOutcome::Conflict`] carrying the first code.
    async fn create(&self, owner: &OwnerId, original_url: &str) -> Result<CreateOutcome>;

    /// Resolves a short code.
    async fn resolve(&self, code: &ShortCode) -> Result<Resolution>;

    /// Lists every link `owner` created.
    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<UrlRecord>>;

    /// Shortens a batch of URLs in one atomic write. Unlike [`Shortener::create`]
    /// this never reuses existing links.
    async fn create_batch(&self, owner: &OwnerId, entries: Vec<BatchEntry>)
        -> Result<Vec<BatchItem>>;

    /// Requests deletion of `shorts` owned by `owner`.
    ///
    /// Returns once every request was handed to the deletion worker. Whether
    /// the deletion eventually succeeds is not reported back.
    async fn delete_urls(&self, owner: &OwnerId, shorts: Vec<ShortCode>);

    /// Counts live links and distinct owners.
    async fn stats(&self) -> Result<Stats>;

    /// Checks that storage is reachable.
    async fn ping(&self) -> Result<()>;
}
