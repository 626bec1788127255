//! Stash metadata index
//!
//! The [`RecordStore`] is the authoritative mapping from record id to metadata
//! and blob. Metadata lives in SQLite; bytes live in a
//! [`stash_storage::Storage`] backend.

pub mod locks;
pub mod pool;
pub mod record;

pub use locks::KeyedLocks;
pub use pool::{connect_index, MIGRATOR};
pub use record::{OpenedRecord, RecordStore};
pub use sqlx::SqlitePool;
