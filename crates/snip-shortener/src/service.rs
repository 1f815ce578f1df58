use crate::deletion::{DeletionConfig, DeletionPipeline};
use async_trait::async_trait;
use snip_core::{
    AddOutcome, BatchEntry, BatchItem, CreateOutcome, Database, OwnerId, Resolution, ShortCode,
    Shortener, ShortenerError, Stats, UrlRecord,
};
use snip_generator::Generator;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

type Result<T> = std::result::Result<T, ShortenerError>;

pub const DEFAULT_MAX_ATTEMPTS: usize = 32;

#[derive(Debug, Clone, TypedBuilder)]
pub struct ShortenerConfig {
    /// Upper bound on candidate codes tried for one new link.
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: usize,
    #[builder(default)]
    pub deletion: DeletionConfig,
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A concrete implementation of the `Shortener` trait.
///
/// This service wraps a `Database` and a `Generator` to handle:
/// - Short code generation with collision retry
/// - Per-owner deduplication of shortened URLs
/// - Atomic batch creation
/// - Debounced soft deletion through a [`DeletionPipeline`]
///
/// The generator does not promise unique codes. Every candidate is checked
/// against storage, and a candidate occupied by any record, live or deleted,
/// is thrown away.
pub struct ShortenerService<D, G> {
    storage: Arc<D>,
    generator: G,
    config: ShortenerConfig,
    deletion: DeletionPipeline,
}

impl<D: Database, G: Generator> ShortenerService<D, G> {
    /// Creates a service with the default configuration.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime, since the deletion
    /// worker is spawned right away.
    pub fn new(storage: D, generator: G) -> Self {
        Self::with_config(storage, generator, ShortenerConfig::default())
    }

    pub fn with_config(storage: D, generator: G, config: ShortenerConfig) -> Self {
        let storage = Arc::new(storage);
        let deletion = DeletionPipeline::spawn(Arc::clone(&storage), config.deletion.clone());

        Self {
            storage,
            generator,
            config,
            deletion,
        }
    }

    pub fn storage(&self) -> &D {
        &self.storage
    }

    /// Drains the deletion pipeline, then closes storage.
    pub async fn shutdown(&self) -> Result<()> {
        self.deletion.shutdown().await;
        self.storage.close().await?;
        info!("shortener service stopped");
        Ok(())
    }

    fn next_code(&self) -> ShortCode {
        self.generator.generate().into()
    }

    /// Draws a code that no other entry of the same batch uses yet.
    fn next_batch_code(&self, in_flight: &mut HashSet<ShortCode>) -> Result<ShortCode> {
        for _ in 0..self.config.max_attempts {
            let candidate = self.next_code();
            if in_flight.insert(candidate.clone()) {
                return Ok(candidate);
            }
            debug!(code = %candidate, "short code repeated within batch, retrying");
        }

        warn!(attempts = self.config.max_attempts, "gave up generating a batch short code");
        Err(ShortenerError::GenerationExhausted {
            attempts: self.config.max_attempts,
        })
    }
}

fn validate_owner(owner: &OwnerId) -> Result<()> {
    if owner.as_str().trim().is_empty() {
        return Err(ShortenerError::InvalidInput(
            "owner cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_url(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(ShortenerError::InvalidInput(
            "URL cannot be empty".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl<D: Database, G: Generator> Shortener for ShortenerService<D, G> {
    async fn create(&self, owner: &OwnerId, original_url: &str) -> Result<CreateOutcome> {
        validate_owner(owner)?;
        validate_url(original_url)?;

        for attempt in 1..=self.config.max_attempts {
            let candidate = self.next_code();

            if self.storage.get(&candidate).await?.is_occupied() {
                debug!(code = %candidate, attempt, "short code collision, retrying");
                continue;
            }

            let record = UrlRecord::new(original_url, candidate);
            match self.storage.add(owner, record.clone()).await? {
                AddOutcome::Inserted => {
                    debug!(owner = %owner, code = %record.short, "created short url");
                    return Ok(CreateOutcome::Created(record));
                }
                AddOutcome::Existing(short) => {
                    debug!(owner = %owner, code = %short, "url already shortened by owner");
                    return Ok(CreateOutcome::Conflict(UrlRecord::new(original_url, short)));
                }
                AddOutcome::CodeTaken => {
                    debug!(code = %record.short, attempt, "short code taken concurrently, retrying");
                }
            }
        }

        warn!(
            owner = %owner,
            attempts = self.config.max_attempts,
            "gave up generating a free short code"
        );
        Err(ShortenerError::GenerationExhausted {
            attempts: self.config.max_attempts,
        })
    }

    async fn resolve(&self, code: &ShortCode) -> Result<Resolution> {
        Ok(self.storage.get(code).await?)
    }

    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<UrlRecord>> {
        validate_owner(owner)?;
        Ok(self.storage.user_urls(owner).await?)
    }

    async fn create_batch(
        &self,
        owner: &OwnerId,
        entries: Vec<BatchEntry>,
    ) -> Result<Vec<BatchItem>> {
        validate_owner(owner)?;
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        for entry in &entries {
            if entry.correlation_id.is_empty() {
                return Err(ShortenerError::InvalidInput(
                    "correlation id cannot be empty".to_string(),
                ));
            }
            validate_url(&entry.original_url)?;
        }

        let mut in_flight = HashSet::with_capacity(entries.len());
        let mut records = Vec::with_capacity(entries.len());
        let mut items = Vec::with_capacity(entries.len());

        for entry in entries {
            let short = self.next_batch_code(&mut in_flight)?;
            records.push(UrlRecord::new(entry.original_url, short.clone()));
            items.push(BatchItem {
                correlation_id: entry.correlation_id,
                short,
            });
        }

        self.storage.write_batch(owner, &records).await?;
        debug!(owner = %owner, size = items.len(), "created short url batch");

        Ok(items)
    }

    async fn delete_urls(&self, owner: &OwnerId, shorts: Vec<ShortCode>) {
        if shorts.is_empty() {
            return;
        }
        let requested = shorts.len();
        let accepted = self.deletion.submit(owner, shorts).await;
        debug!(owner = %owner, requested, accepted, "queued short urls for deletion");
    }

    async fn stats(&self) -> Result<Stats> {
        let (urls, users) =
            tokio::try_join!(self.storage.count_urls(), self.storage.count_users())?;
        Ok(Stats { urls, users })
    }

    async fn ping(&self) -> Result<()> {
        Ok(self.storage.ping().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingDatabase;
    use snip_core::StorageError;
    use snip_generator::{RandomGenerator, ScriptedGenerator};
    use snip_storage::InMemoryRepository;
    use std::time::Duration;

    fn owner(value: &str) -> OwnerId {
        OwnerId::new_unchecked(value)
    }

    fn code(value: &str) -> ShortCode {
        ShortCode::new_unchecked(value)
    }

    fn entry(correlation_id: &str, url: &str) -> BatchEntry {
        BatchEntry {
            correlation_id: correlation_id.to_string(),
            original_url: url.to_string(),
        }
    }

    fn scripted<I>(codes: I) -> ShortenerService<RecordingDatabase, ScriptedGenerator>
    where
        I: IntoIterator<Item = &'static str>,
    {
        ShortenerService::new(RecordingDatabase::default(), ScriptedGenerator::new(codes))
    }

    #[tokio::test]
    async fn create_then_conflict_then_resolve() {
        let service = scripted(["AbC1234", "ZzZzZzZ"]);

        let first = service.create(&owner("u1"), "http://x.com").await.unwrap();
        assert_eq!(
            first,
            CreateOutcome::Created(UrlRecord::new("http://x.com", code("AbC1234")))
        );

        let second = service.create(&owner("u1"), "http://x.com").await.unwrap();
        assert!(second.is_conflict());
        assert_eq!(second.record().short, code("AbC1234"));

        let resolved = service.resolve(&code("AbC1234")).await.unwrap();
        assert_eq!(
            resolved,
            Resolution::Found(UrlRecord::new("http://x.com", code("AbC1234")))
        );
    }

    #[tokio::test]
    async fn same_url_for_different_owners_gets_distinct_codes() {
        let service = ShortenerService::new(InMemoryRepository::new(), RandomGenerator::seeded(7));

        let a = service.create(&owner("u1"), "https://example.com").await.unwrap();
        let b = service.create(&owner("u2"), "https://example.com").await.unwrap();

        assert!(!a.is_conflict());
        assert!(!b.is_conflict());
        assert_ne!(a.record().short, b.record().short);
    }

    #[tokio::test]
    async fn generated_codes_have_fixed_shape() {
        let service = ShortenerService::new(InMemoryRepository::new(), RandomGenerator::new());

        let outcome = service.create(&owner("u1"), "https://example.com").await.unwrap();
        let short = outcome.record().short.as_str();

        assert_eq!(short.len(), 7);
        assert!(short.chars().all(|c| c.is_ascii_alphabetic()));
    }

    #[tokio::test]
    async fn collision_is_retried_with_a_new_code() {
        let service = scripted(["aaaaaaa", "aaaaaaa", "bbbbbbb"]);

        service.create(&owner("u1"), "https://one.example").await.unwrap();
        let outcome = service.create(&owner("u2"), "https://two.example").await.unwrap();

        assert_eq!(outcome.record().short, code("bbbbbbb"));
    }

    #[tokio::test]
    async fn exhausted_attempts_are_reported() {
        let service = ShortenerService::with_config(
            RecordingDatabase::default(),
            ScriptedGenerator::new(["aaaaaaa"]),
            ShortenerConfig::builder().max_attempts(4).build(),
        );

        service.create(&owner("u1"), "https://one.example").await.unwrap();
        let err = service
            .create(&owner("u1"), "https://two.example")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ShortenerError::GenerationExhausted { attempts: 4 }
        ));
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let service = scripted(["aaaaaaa"]);

        let resolved = service.resolve(&code("missing")).await.unwrap();
        assert_eq!(resolved, Resolution::NotFound);
    }

    #[tokio::test]
    async fn blank_input_is_rejected() {
        let service = scripted(["aaaaaaa"]);

        let err = service.create(&owner("u1"), "  ").await.unwrap_err();
        assert!(matches!(err, ShortenerError::InvalidInput(_)));

        let err = service
            .create(&owner(""), "https://example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, ShortenerError::InvalidInput(_)));

        let err = service
            .create_batch(&owner("u1"), vec![entry("", "https://example.com")])
            .await
            .unwrap_err();
        assert!(matches!(err, ShortenerError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn batch_assigns_distinct_codes_in_input_order() {
        let service = scripted(["aaaaaaa", "aaaaaaa", "bbbbbbb"]);

        let items = service
            .create_batch(
                &owner("u1"),
                vec![entry("c1", "https://a.com"), entry("c2", "https://b.com")],
            )
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].correlation_id, "c1");
        assert_eq!(items[0].short, code("aaaaaaa"));
        assert_eq!(items[1].correlation_id, "c2");
        assert_eq!(items[1].short, code("bbbbbbb"));

        assert_eq!(
            service.resolve(&code("aaaaaaa")).await.unwrap(),
            Resolution::Found(UrlRecord::new("https://a.com", code("aaaaaaa")))
        );
        assert_eq!(
            service.resolve(&code("bbbbbbb")).await.unwrap(),
            Resolution::Found(UrlRecord::new("https://b.com", code("bbbbbbb")))
        );
    }

    #[tokio::test]
    async fn failed_batch_creates_nothing() {
        let service = scripted(["aaaaaaa", "bbbbbbb"]);
        service.storage().fail_batches(true);

        let err = service
            .create_batch(
                &owner("u1"),
                vec![entry("c1", "https://a.com"), entry("c2", "https://b.com")],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ShortenerError::Storage(_)));
        assert_eq!(
            service.resolve(&code("aaaaaaa")).await.unwrap(),
            Resolution::NotFound
        );
        assert_eq!(
            service.resolve(&code("bbbbbbb")).await.unwrap(),
            Resolution::NotFound
        );
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let service = scripted(["aaaaaaa"]);
        service.storage().fail_batches(true);

        let items = service.create_batch(&owner("u1"), Vec::new()).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn empty_batch_still_requires_an_owner() {
        let service = scripted(["aaaaaaa"]);

        let err = service.create_batch(&owner(" "), Vec::new()).await.unwrap_err();
        assert!(matches!(err, ShortenerError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn list_includes_only_own_links() {
        let service = scripted(["aaaaaaa", "bbbbbbb", "ccccccc"]);

        service.create(&owner("u1"), "https://a.com").await.unwrap();
        service.create(&owner("u1"), "https://b.com").await.unwrap();
        service.create(&owner("u2"), "https://c.com").await.unwrap();

        let mut listed = service.list_by_owner(&owner("u1")).await.unwrap();
        listed.sort_by(|a, b| a.short.cmp(&b.short));

        assert_eq!(
            listed,
            vec![
                UrlRecord::new("https://a.com", code("aaaaaaa")),
                UrlRecord::new("https://b.com", code("bbbbbbb")),
            ]
        );
        assert!(service.list_by_owner(&owner("u3")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stats_count_live_links_and_owners() {
        let service = scripted(["aaaaaaa", "bbbbbbb", "ccccccc"]);

        service.create(&owner("u1"), "https://a.com").await.unwrap();
        service.create(&owner("u1"), "https://b.com").await.unwrap();
        service.create(&owner("u2"), "https://c.com").await.unwrap();

        assert_eq!(service.stats().await.unwrap(), Stats { urls: 3, users: 2 });
    }

    #[tokio::test]
    async fn stats_fail_when_either_count_fails() {
        let service = scripted(["aaaaaaa"]);
        service.storage().fail_counts(true);

        let err = service.stats().await.unwrap_err();
        assert!(matches!(
            err,
            ShortenerError::Storage(StorageError::Unavailable(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn deleted_link_resolves_as_gone() {
        let service = scripted(["aaaaaaa", "bbbbbbb"]);

        service.create(&owner("u1"), "https://a.com").await.unwrap();
        service.create(&owner("u1"), "https://b.com").await.unwrap();

        service
            .delete_urls(&owner("u1"), vec![code("aaaaaaa")])
            .await;
        // Someone else's code is left alone.
        service
            .delete_urls(&owner("u2"), vec![code("bbbbbbb")])
            .await;

        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(
            service.resolve(&code("aaaaaaa")).await.unwrap(),
            Resolution::Gone(code("aaaaaaa"))
        );
        assert!(matches!(
            service.resolve(&code("bbbbbbb")).await.unwrap(),
            Resolution::Found(_)
        ));
        assert_eq!(service.stats().await.unwrap(), Stats { urls: 1, users: 1 });
    }

    #[tokio::test]
    async fn deleted_code_is_never_reissued() {
        let service = scripted(["aaaaaaa", "aaaaaaa", "bbbbbbb"]);

        service.create(&owner("u1"), "https://a.com").await.unwrap();
        service
            .delete_urls(&owner("u1"), vec![code("aaaaaaa")])
            .await;
        service.shutdown().await.unwrap();

        assert_eq!(
            service.resolve(&code("aaaaaaa")).await.unwrap(),
            Resolution::Gone(code("aaaaaaa"))
        );

        // The in-memory backend keeps serving after close.
        let outcome = service.create(&owner("u2"), "https://b.com").await.unwrap();
        assert_eq!(outcome.record().short, code("bbbbbbb"));
    }

    #[tokio::test]
    async fn ping_reaches_storage() {
        let service = scripted(["aaaaaaa"]);
        service.ping().await.unwrap();
    }

    #[tokio::test]
    async fn service_is_usable_as_trait_object() {
        let service: Arc<dyn Shortener> = Arc::new(scripted(["aaaaaaa"]));

        let outcome = service.create(&owner("u1"), "https://a.com").await.unwrap();
        assert_eq!(outcome.into_record().short, code("aaaaaaa"));
    }
}
