use crate::memory::Index;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snip_core::error::{Result, StorageError};
use snip_core::{
    AddOutcome, Database, DeleteRequest, OwnerId, Resolution, ShortCode, Storage, UrlRecord,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// One line of the storage file.
#[derive(Debug, Serialize, Deserialize)]
struct Line {
    owner: OwnerId,
    short_url: ShortCode,
    original_url: String,
    #[serde(default, skip_serializing_if = "is_false")]
    is_deleted: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Line {
    fn created(owner: &OwnerId, record: &UrlRecord) -> Self {
        Self {
            owner: owner.clone(),
            short_url: record.short.clone(),
            original_url: record.original_url.clone(),
            is_deleted: false,
        }
    }
}

struct FileState {
    index: Index,
    file: Option<File>,
}

/// Append-only JSON-lines implementation of the storage contract.
///
/// The whole mapping lives in memory and is rebuilt from the file on open.
/// Every mutation appends lines before it touches the in-memory index, so a
/// failed write leaves both sides unchanged. Deletions append a copy of the
/// record with `"is_deleted": true`; nothing is ever rewritten in place.
pub struct FileRepository {
    path: PathBuf,
    state: Mutex<FileState>,
}

impl FileRepository {
    /// Opens (or creates) the storage file and replays its contents.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut index = Index::default();

        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                for (number, raw) in contents.lines().enumerate() {
                    if raw.trim().is_empty() {
                        continue;
                    }
                    let line: Line = serde_json::from_str(raw).map_err(|e| {
                        StorageError::InvalidData(format!(
                            "{}:{}: {e}",
                            path.display(),
                            number + 1
                        ))
                    })?;
                    index.restore(
                        &line.owner,
                        UrlRecord::new(line.original_url, line.short_url),
                        line.is_deleted,
                    );
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        info!(path = %path.display(), urls = index.count_urls(), "opened file storage");

        Ok(Self {
            path,
            state: Mutex::new(FileState {
                index,
                file: Some(file),
            }),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, file: &mut Option<File>, lines: &[Line]) -> Result<()> {
        let Some(file) = file.as_mut() else {
            return Err(StorageError::Unavailable(format!(
                "file storage {} is closed",
                self.path.display()
            )));
        };

        let mut buf = String::new();
        for line in lines {
            buf.push_str(&serde_json::to_string(line)?);
            buf.push('\n');
        }

        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for FileRepository {
    async fn add(&self, owner: &OwnerId, record: UrlRecord) -> Result<AddOutcome> {
        let mut state = self.state.lock().await;
        if let Some(outcome) = state.index.check_add(owner, &record) {
            return Ok(outcome);
        }

        let FileState { index, file } = &mut *state;
        self.append(file, &[Line::created(owner, &record)]).await?;
        index.insert(owner, record);
        Ok(AddOutcome::Inserted)
    }

    async fn get(&self, code: &ShortCode) -> Result<Resolution> {
        Ok(self.state.lock().await.index.get(code))
    }

    async fn user_urls(&self, owner: &OwnerId) -> Result<Vec<UrlRecord>> {
        Ok(self.state.lock().await.index.user_urls(owner))
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(mut file) = state.file.take() {
            file.flush().await?;
            file.sync_all().await?;
            debug!(path = %self.path.display(), "closed file storage");
        }
        Ok(())
    }
}

#[async_trait]
impl Database for FileRepository {
    async fn ping(&self) -> Result<()> {
        if self.state.lock().await.file.is_none() {
            return Err(StorageError::Unavailable(format!(
                "file storage {} is closed",
                self.path.display()
            )));
        }
        Ok(())
    }

    async fn write_batch(&self, owner: &OwnerId, records: &[UrlRecord]) -> Result<()> {
        let mut state = self.state.lock().await;
        state.index.check_batch(owner, records)?;

        let lines: Vec<Line> = records
            .iter()
            .map(|record| Line::created(owner, record))
            .collect();

        let FileState { index, file } = &mut *state;
        self.append(file, &lines).await?;
        for record in records {
            index.insert(owner, record.clone());
        }
        Ok(())
    }

    async fn delete_batch(&self, requests: &[DeleteRequest]) -> Result<()> {
        let mut state = self.state.lock().await;

        let mut seen = HashSet::new();
        let mut lines = Vec::new();
        for request in requests {
            if !state.index.is_deletable(request) || !seen.insert(&request.short) {
                continue;
            }
            if let Resolution::Found(record) = state.index.get(&request.short) {
                lines.push(Line {
                    is_deleted: true,
                    ..Line::created(&request.owner, &record)
                });
            }
        }

        if lines.is_empty() {
            return Ok(());
        }

        let FileState { index, file } = &mut *state;
        self.append(file, &lines).await?;
        for line in &lines {
            index.mark_deleted(&line.short_url);
        }
        Ok(())
    }

    async fn count_urls(&self) -> Result<u64> {
        Ok(self.state.lock().await.index.count_urls())
    }

    async fn count_users(&self) -> Result<u64> {
        Ok(self.state.lock().await.index.count_users())
    }
}
