use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use super::record_id::RecordId;

/// Coarse category of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Image,
    /// Archives (zip, tar, rar, 7z and compressed streams)
    File,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Image => "image",
            RecordKind::File => "file",
        }
    }
}

impl FromStr for RecordKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(RecordKind::Image),
            "file" => Ok(RecordKind::File),
            _ => Err(anyhow::anyhow!("Invalid record kind: {}", s)),
        }
    }
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Metadata describing one stored upload.
///
/// Records are immutable once committed; the only mutation is deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub id: RecordId,
    pub kind: RecordKind,
    pub mime_type: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub original_name: String,
    /// Internal blob key; never part of a client response.
    #[serde(skip_serializing)]
    pub storage_key: String,
}

impl Record {
    /// Age of the record at `now`.
    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }

    /// Whole days left before the record becomes eligible for expiry.
    pub fn remaining_days(&self, now: DateTime<Utc>, ttl_days: i64) -> i64 {
        (ttl_days - self.age_at(now).num_days()).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(created_at: DateTime<Utc>) -> Record {
        Record {
            id: RecordId::generate(),
            kind: RecordKind::Image,
            mime_type: "image/png".to_string(),
            size_bytes: 42,
            created_at,
            original_name: "cat.png".to_string(),
            storage_key: "blobs/x".to_string(),
        }
    }

    #[test]
    fn test_kind_parse_and_display() {
        assert_eq!("image".parse::<RecordKind>().unwrap(), RecordKind::Image);
        assert_eq!("FILE".parse::<RecordKind>().unwrap(), RecordKind::File);
        assert!("video".parse::<RecordKind>().is_err());
        assert_eq!(RecordKind::File.to_string(), "file");
    }

    #[test]
    fn test_remaining_days_clamps_at_zero() {
        let now = Utc::now();
        let record = sample(now - Duration::days(20));
        assert_eq!(record.remaining_days(now, 14), 0);
        let fresh = sample(now - Duration::days(3));
        assert_eq!(fresh.remaining_days(now, 14), 11);
    }

    #[test]
    fn test_storage_key_is_not_serialized() {
        let json = serde_json::to_value(sample(Utc::now())).unwrap();
        assert!(json.get("storage_key").is_none());
        assert_eq!(json.get("kind").and_then(|v| v.as_str()), Some("image"));
    }
}
