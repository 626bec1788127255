//! Constants shared across crates.

/// Bytes in one megabyte as used by `MAX_FILE_MB`.
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Number of leading bytes handed to the content classifier.
///
/// Must cover the TAR `ustar` magic at offset 257.
pub const SNIFF_LEN: usize = 512;

/// Staging files older than this are considered abandoned by the sweeper.
pub const STALE_STAGING_SECS: u64 = 60 * 60;

/// Subdirectory of the data root holding committed blobs.
pub const BLOBS_DIR: &str = "blobs";

/// Subdirectory of the data root holding in-progress uploads.
pub const STAGING_DIR: &str = "tmp";

/// File name of the metadata index inside the data root.
pub const INDEX_FILE: &str = "records.db";
