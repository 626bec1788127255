pub mod security_headers;
pub mod trusted_host;

pub use security_headers::{security_headers_middleware, SecurityHeadersConfig};
pub use trusted_host::{trusted_host_middleware, TrustedHosts};
