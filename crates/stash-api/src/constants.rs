//! HTTP layer constants.

/// Room for multipart boundaries and part headers on top of the file limit.
pub const MULTIPART_SLACK_BYTES: u64 = 64 * 1024;

/// Name of the multipart field carrying the upload.
pub const UPLOAD_FIELD: &str = "file";

pub const IMAGE_CACHE_CONTROL: &str = "public, max-age=604800, immutable";
pub const FILE_CACHE_CONTROL: &str = "public, max-age=604800";

/// Applied to responses that did not choose their own caching policy.
pub const DEFAULT_CACHE_CONTROL: &str = "no-store";

pub const ROBOTS_TXT: &str = "User-agent: *\nDisallow: /";
