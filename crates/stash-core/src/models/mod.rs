pub mod record;
pub mod record_id;

pub use record::{Record, RecordKind};
pub use record_id::RecordId;
