use std::sync::Mutex;

use async_trait::async_trait;

use super::{BaselineRecord, BaselineStore};
use crate::error::StorageError;

/// In-memory store used by tests and one-off sessions
#[derive(Default)]
pub struct MemoryBaselineStore {
    records: Mutex<Vec<BaselineRecord>>,
}

impl MemoryBaselineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with one baseline
    pub fn with_baseline(rms: f64, captured_at_ms: u64) -> Self {
        Self {
            records: Mutex::new(vec![BaselineRecord {
                id: 1,
                rms,
                captured_at_ms,
            }]),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_records(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, Vec<BaselineRecord>>, StorageError> {
        self.records.lock().map_err(|_| StorageError::Read {
            reason: "baseline records lock poisoned".to_string(),
        })
    }
}

#[async_trait]
impl BaselineStore for MemoryBaselineStore {
    async fn insert(&self, rms: f64, captured_at_ms: u64) -> Result<BaselineRecord, StorageError> {
        let mut records = self.lock_records()?;
        let record = BaselineRecord {
            id: records.last().map(|r| r.id + 1).unwrap_or(1),
            rms,
            captured_at_ms,
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn latest(&self) -> Result<Option<BaselineRecord>, StorageError> {
        Ok(self.lock_records()?.last().cloned())
    }
}
