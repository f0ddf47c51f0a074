// Baseline storage - append-only persistence of calibrated RMS values
//
// Calibration appends one record per run. Only the most recently inserted
// record is ever read back; retention is left to whoever owns the backing
// store.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::StorageError;

mod jsonl;
mod memory;

pub use jsonl::JsonlBaselineStore;
pub use memory::MemoryBaselineStore;

/// A persisted calibration result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineRecord {
    /// Auto-incrementing id, starting at 1
    pub id: u64,
    /// Ambient RMS amplitude
    #[serde(deserialize_with = "deserialize_rms")]
    pub rms: f64,
    /// Wall-clock capture time in milliseconds since the Unix epoch
    #[serde(rename = "timestamp")]
    pub captured_at_ms: u64,
}

/// Durable keyed storage for baseline records
#[async_trait]
pub trait BaselineStore: Send + Sync {
    /// Append a new record and return it with its assigned id
    async fn insert(&self, rms: f64, captured_at_ms: u64) -> Result<BaselineRecord, StorageError>;

    /// Most recently inserted record, if any
    async fn latest(&self) -> Result<Option<BaselineRecord>, StorageError>;
}

/// Older stores wrote the RMS as a string; accept both.
fn deserialize_rms<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RmsValue {
        Number(f64),
        Text(String),
    }

    match RmsValue::deserialize(deserializer)? {
        RmsValue::Number(value) => Ok(value),
        RmsValue::Text(text) => text.trim().parse::<f64>().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_timestamp_field() {
        let record = BaselineRecord {
            id: 1,
            rms: 0.25,
            captured_at_ms: 42,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"id":1,"rms":0.25,"timestamp":42}"#);
    }

    #[test]
    fn test_record_accepts_string_rms() {
        let record: BaselineRecord =
            serde_json::from_str(r#"{"id":3,"rms":"0.000000100","timestamp":7}"#).unwrap();
        assert_eq!(record.rms, 1e-7);
        assert_eq!(record.id, 3);
    }

    #[test]
    fn test_record_rejects_non_numeric_rms() {
        let result: Result<BaselineRecord, _> =
            serde_json::from_str(r#"{"id":3,"rms":"loud","timestamp":7}"#);
        assert!(result.is_err());
    }
}
