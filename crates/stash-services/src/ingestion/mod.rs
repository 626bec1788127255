mod service;

pub use service::{IngestionService, UploadRequest};
