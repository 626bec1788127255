//! Stash Services Layer
//!
//! Orchestration on top of the record store: the [`IngestionService`] turns an
//! incoming byte stream into a stored record, and the [`RetentionSweeper`]
//! expires records once they outlive the configured TTL. The HTTP crate only
//! talks to these two services.

pub mod cleanup;
pub mod ingestion;

pub use cleanup::{RetentionSweeper, SweepReport, SweepState, SweeperHandle};
pub use ingestion::{IngestionService, UploadRequest};
pub use stash_db::{OpenedRecord, RecordStore};
pub use stash_storage::{LocalStorage, Storage, StorageError, StorageResult};
