//! Append-only JSON-lines baseline store.
//!
//! Each line is one `BaselineRecord`:
//! `{"id":1,"rms":0.0123,"timestamp":1700000000000}`. Records are never
//! rewritten; the newest record is the last parseable line of the file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{BaselineRecord, BaselineStore};
use crate::error::{log_storage_error, StorageError};

pub struct JsonlBaselineStore {
    path: PathBuf,
    /// Serialises appends so ids stay unique within the process
    write_lock: Mutex<()>,
}

impl JsonlBaselineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_contents(&self) -> Result<String, StorageError> {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(StorageError::Read {
                reason: format!("{}: {}", self.path.display(), err),
            }),
        }
    }

    async fn read_all(&self) -> Result<Vec<BaselineRecord>, StorageError> {
        Ok(parse_records(&self.read_contents().await?))
    }
}

/// Parse every well-formed line; corrupt lines are logged and skipped so one
/// bad row cannot hide the records around it or block later appends.
fn parse_records(contents: &str) -> Vec<BaselineRecord> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(index, line)| match serde_json::from_str::<BaselineRecord>(line) {
            Ok(record) => Some(record),
            Err(err) => {
                let err = StorageError::Corrupt {
                    line: index + 1,
                    reason: err.to_string(),
                };
                log_storage_error(&err, "read");
                None
            }
        })
        .collect()
}

#[async_trait]
impl BaselineStore for JsonlBaselineStore {
    async fn insert(&self, rms: f64, captured_at_ms: u64) -> Result<BaselineRecord, StorageError> {
        let _guard = self.write_lock.lock().await;

        let contents = self.read_contents().await?;
        let next_id = parse_records(&contents)
            .iter()
            .map(|r| r.id)
            .max()
            .map(|id| id + 1)
            .unwrap_or(1);
        let record = BaselineRecord {
            id: next_id,
            rms,
            captured_at_ms,
        };

        let mut line = String::new();
        // a torn last line must not swallow the new record
        if !contents.is_empty() && !contents.ends_with('\n') {
            line.push('\n');
        }
        line.push_str(&serde_json::to_string(&record).map_err(|err| StorageError::Write {
            reason: err.to_string(),
        })?);
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|err| StorageError::Open {
                reason: format!("{}: {}", self.path.display(), err),
            })?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|err| StorageError::Write {
                reason: err.to_string(),
            })?;
        file.sync_data().await.map_err(|err| StorageError::Write {
            reason: err.to_string(),
        })?;

        tracing::info!(
            "[BaselineStore] Stored baseline #{} (rms {:.9}) in {}",
            record.id,
            record.rms,
            self.path.display()
        );
        Ok(record)
    }

    async fn latest(&self) -> Result<Option<BaselineRecord>, StorageError> {
        Ok(self.read_all().await?.pop())
    }
}
