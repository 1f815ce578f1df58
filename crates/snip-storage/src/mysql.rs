use async_trait::async_trait;
use jiff::Timestamp;
use snip_core::error::{Result, StorageError};
use snip_core::{
    AddOutcome, Database, DeleteRequest, OwnerId, Resolution, ShortCode, Storage, UrlRecord,
};
use sqlx::{Connection, MySqlPool, Row};
use tracing::warn;

const SCHEMA: &str = include_str!("../ddl/mysql/short_urls.sql");

/// MySQL implementation of the storage contract.
///
/// Soft delete is implemented with `deleted_at`. A tombstoned row keeps its
/// primary key, so its short code is never handed out again. Uniqueness of
/// `(original_url, owner_id)` is enforced by the schema, which makes
/// [`Storage::add`] atomic without an explicit transaction.
#[derive(Debug, Clone)]
pub struct MySqlRepository {
    pool: MySqlPool,
}

impl MySqlRepository {
    /// Creates a repository from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a repository by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Creates the `short_urls` table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn find_by_origin(&self, owner: &OwnerId, original_url: &str) -> Result<Option<ShortCode>> {
        let short: Option<String> = sqlx::query_scalar(
            r#"
            SELECT short_code
            FROM short_urls
            WHERE original_url = ?
              AND owner_id = ?
            LIMIT 1
            "#,
        )
        .bind(original_url)
        .bind(owner.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(short.map(ShortCode::new_unchecked))
    }
}

fn now_unix_seconds() -> i64 {
    Timestamp::now().as_second()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

fn count_to_u64(value: i64) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| StorageError::InvalidData(format!("negative row count: {value}")))
}

#[async_trait]
impl Storage for MySqlRepository {
    async fn add(&self, owner: &OwnerId, record: UrlRecord) -> Result<AddOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO short_urls (short_code, original_url, owner_id, created_at, deleted_at)
            VALUES (?, ?, ?, ?, NULL)
            "#,
        )
        .bind(record.short.as_str())
        .bind(record.original_url.as_str())
        .bind(owner.as_str())
        .bind(now_unix_seconds())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(AddOutcome::Inserted),
            // Either the pair already exists or the code is taken; the pair
            // lookup tells the two apart.
            Err(err) if is_unique_violation(&err) => {
                match self.find_by_origin(owner, &record.original_url).await? {
                    Some(existing) => Ok(AddOutcome::Existing(existing)),
                    None => Ok(AddOutcome::CodeTaken),
                }
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn get(&self, code: &ShortCode) -> Result<Resolution> {
        let row = sqlx::query(
            r#"
            SELECT original_url, deleted_at
            FROM short_urls
            WHERE short_code = ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(Resolution::NotFound);
        };

        let deleted_at: Option<i64> = row.try_get("deleted_at").map_err(map_sqlx_error)?;
        if deleted_at.is_some() {
            return Ok(Resolution::Gone(code.clone()));
        }

        let original_url: String = row.try_get("original_url").map_err(map_sqlx_error)?;
        Ok(Resolution::Found(UrlRecord::new(original_url, code.clone())))
    }

    async fn user_urls(&self, owner: &OwnerId) -> Result<Vec<UrlRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT short_code, original_url
            FROM short_urls
            WHERE owner_id = ?
            "#,
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                let short: String = row.try_get("short_code").map_err(map_sqlx_error)?;
                let original_url: String = row.try_get("original_url").map_err(map_sqlx_error)?;
                Ok(UrlRecord::new(original_url, ShortCode::new_unchecked(short)))
            })
            .collect()
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

#[async_trait]
impl Database for MySqlRepository {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        conn.ping().await.map_err(map_sqlx_error)
    }

    async fn write_batch(&self, owner: &OwnerId, records: &[UrlRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let now = now_unix_seconds();

        for record in records {
            let result = sqlx::query(
                r#"
                INSERT INTO short_urls (short_code, original_url, owner_id, created_at, deleted_at)
                VALUES (?, ?, ?, ?, NULL)
                "#,
            )
            .bind(record.short.as_str())
            .bind(record.original_url.as_str())
            .bind(owner.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await;

            // Dropping `tx` on the error paths rolls the whole batch back.
            match result {
                Ok(_) => {}
                Err(err) if is_unique_violation(&err) => {
                    return Err(StorageError::Conflict(format!(
                        "batch item {} ({}) collides with an existing record",
                        record.short, record.original_url
                    )));
                }
                Err(err) => return Err(map_sqlx_error(err)),
            }
        }

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn delete_batch(&self, requests: &[DeleteRequest]) -> Result<()> {
        let now = now_unix_seconds();
        let mut first_error = None;

        for request in requests {
            let result = sqlx::query(
                r#"
                UPDATE short_urls
                SET deleted_at = ?
                WHERE short_code = ?
                  AND owner_id = ?
                  AND deleted_at IS NULL
                "#,
            )
            .bind(now)
            .bind(request.short.as_str())
            .bind(request.owner.as_str())
            .execute(&self.pool)
            .await;

            if let Err(err) = result {
                let err = map_sqlx_error(err);
                warn!(code = %request.short, owner = %request.owner, error = %err, "failed to tombstone short code");
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn count_urls(&self) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM short_urls WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        count_to_u64(count)
    }

    async fn count_users(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT owner_id) FROM short_urls")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        count_to_u64(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_maps_to_timeout() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            StorageError::Timeout(_)
        ));
    }

    #[test]
    fn closed_pool_maps_to_unavailable() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolClosed),
            StorageError::Unavailable(_)
        ));
    }

    #[test]
    fn missing_row_maps_to_invalid_data() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            StorageError::InvalidData(_)
        ));
    }

    #[test]
    fn negative_counts_are_rejected() {
        assert_eq!(count_to_u64(3).unwrap(), 3);
        assert!(count_to_u64(-1).is_err());
    }

    #[test]
    fn schema_declares_tombstone_and_pair_uniqueness() {
        assert!(SCHEMA.contains("deleted_at"));
        assert!(SCHEMA.contains("UNIQUE KEY uniq_origin_owner (original_url, owner_id)"));
    }
}
