//! Record identifiers.
//!
//! An identifier is 128 bits drawn from the thread-local CSPRNG and encoded as
//! 32 lowercase hex characters. Identifiers are random rather than derived from
//! content, so uploading the same bytes twice yields two independent records.

use serde::{Deserialize, Serialize};
use std::fmt;

const ID_BYTES: usize = 16;
const ID_LEN: usize = ID_BYTES * 2;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generate a fresh identifier.
    ///
    /// Panics only if the operating system entropy source is unavailable.
    pub fn generate() -> Self {
        let bytes: [u8; ID_BYTES] = rand::random();
        RecordId(hex::encode(bytes))
    }

    /// Parse an identifier received from a client or read back from the index.
    ///
    /// Only 32 lowercase hex characters are accepted, so a parsed id is always
    /// safe to use as a single path component.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() == ID_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            Some(RecordId(raw.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_id_is_url_safe_hex() {
        let id = RecordId::generate();
        assert_eq!(id.as_str().len(), 32);
        assert!(id
            .as_str()
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
    }

    #[test]
    fn test_generated_ids_do_not_repeat() {
        let ids: HashSet<RecordId> = (0..10_000).map(|_| RecordId::generate()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_parse_roundtrip() {
        let id = RecordId::generate();
        assert_eq!(RecordId::parse(id.as_str()), Some(id));
    }

    #[test]
    fn test_parse_rejects_path_like_input() {
        assert!(RecordId::parse("../../etc/passwd").is_none());
        assert!(RecordId::parse("0123456789abcdef0123456789abcde/").is_none());
        assert!(RecordId::parse("").is_none());
    }

    #[test]
    fn test_parse_rejects_uppercase_and_wrong_length() {
        assert!(RecordId::parse("0123456789ABCDEF0123456789ABCDEF").is_none());
        assert!(RecordId::parse("0123456789abcdef").is_none());
        assert!(RecordId::parse("0123456789abcdef0123456789abcdef00").is_none());
    }
}
