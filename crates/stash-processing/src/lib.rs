//! Stash Processing Library
//!
//! Pure, synchronous inspection of upload content: signature based
//! classification and client filename cleanup. Nothing in here performs I/O.

pub mod classifier;
pub mod filename;

pub use classifier::{classify, Classification, Signature};
pub use filename::sanitize_original_name;
