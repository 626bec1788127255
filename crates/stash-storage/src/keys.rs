//! Mapping from record id to blob location.

use stash_core::constants::BLOBS_DIR;
use stash_core::RecordId;
use std::fmt;

/// Location of a blob relative to the storage root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobKey {
    record_id: RecordId,
}

impl BlobKey {
    /// The single place where a record id becomes a storage location.
    pub fn for_record(record_id: &RecordId) -> Self {
        Self {
            record_id: record_id.clone(),
        }
    }

    /// Rebuild a key from its string form (as persisted in the index).
    pub fn parse(raw: &str) -> Option<Self> {
        let name = raw.strip_prefix(BLOBS_DIR)?.strip_prefix('/')?;
        RecordId::parse(name).map(|record_id| Self { record_id })
    }

    pub fn record_id(&self) -> &RecordId {
        &self.record_id
    }

    /// File name inside the blobs directory.
    pub fn file_name(&self) -> &str {
        self.record_id.as_str()
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", BLOBS_DIR, self.record_id)
    }
}
