pub mod health;
pub mod list;
pub mod page;
pub mod raw;
pub mod response;
pub mod robots;
pub mod upload;

pub use response::{ListResponse, PageResponse, RecordResponse};
