//! Content classification by magic bytes.
//!
//! Only the leading bytes of an upload are inspected. The client filename and
//! any declared content type never take part in the decision.

use stash_core::constants::SNIFF_LEN;
use stash_core::RecordKind;

const TAR_MAGIC_OFFSET: usize = 257;

/// Every format the store accepts, in matching priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signature {
    Png,
    Jpeg,
    Gif,
    Webp,
    SevenZip,
    Rar,
    Zip,
    Gzip,
    Bzip2,
    Xz,
    Tar,
}

impl Signature {
    /// Matching order. More specific signatures come first.
    pub const ALL: [Signature; 11] = [
        Signature::Png,
        Signature::Jpeg,
        Signature::Gif,
        Signature::Webp,
        Signature::SevenZip,
        Signature::Rar,
        Signature::Zip,
        Signature::Gzip,
        Signature::Bzip2,
        Signature::Xz,
        Signature::Tar,
    ];

    pub fn kind(&self) -> RecordKind {
        match self {
            Signature::Png | Signature::Jpeg | Signature::Gif | Signature::Webp => {
                RecordKind::Image
            }
            _ => RecordKind::File,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Signature::Png => "image/png",
            Signature::Jpeg => "image/jpeg",
            Signature::Gif => "image/gif",
            Signature::Webp => "image/webp",
            Signature::SevenZip => "application/x-7z-compressed",
            Signature::Rar => "application/x-rar-compressed",
            Signature::Zip => "application/zip",
            Signature::Gzip => "application/gzip",
            Signature::Bzip2 => "application/x-bzip2",
            Signature::Xz => "application/x-xz",
            Signature::Tar => "application/x-tar",
        }
    }

    fn matches(&self, buf: &[u8]) -> bool {
        match self {
            Signature::Png => buf.starts_with(b"\x89PNG\r\n\x1a\n"),
            Signature::Jpeg => buf.starts_with(&[0xFF, 0xD8, 0xFF]),
            Signature::Gif => buf.starts_with(b"GIF87a") || buf.starts_with(b"GIF89a"),
            Signature::Webp => buf.len() >= 12 && &buf[0..4] == b"RIFF" && &buf[8..12] == b"WEBP",
            Signature::SevenZip => buf.starts_with(&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C]),
            Signature::Rar => {
                buf.starts_with(b"Rar!\x1a\x07\x00") || buf.starts_with(b"Rar!\x1a\x07\x01\x00")
            }
            // Local file header, empty archive, spanned archive
            Signature::Zip => {
                buf.starts_with(b"PK\x03\x04")
                    || buf.starts_with(b"PK\x05\x06")
                    || buf.starts_with(b"PK\x07\x08")
            }
            Signature::Gzip => buf.starts_with(&[0x1F, 0x8B]),
            Signature::Bzip2 => buf.starts_with(b"BZh"),
            Signature::Xz => buf.starts_with(&[0xFD, b'7', b'z', b'X', b'Z', 0x00]),
            Signature::Tar => buf
                .get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 5)
                .is_some_and(|magic| magic == b"ustar"),
        }
    }
}

/// Outcome of inspecting an upload prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Accepted {
        kind: RecordKind,
        mime: &'static str,
        signature: Signature,
    },
    Rejected,
}

/// Classify an upload from its leading bytes.
///
/// Only the first [`SNIFF_LEN`] bytes are looked at; passing more is harmless.
pub fn classify(prefix: &[u8]) -> Classification {
    let buf = &prefix[..prefix.len().min(SNIFF_LEN)];

    match Signature::ALL.into_iter().find(|sig| sig.matches(buf)) {
        Some(signature) => Classification::Accepted {
            kind: signature.kind(),
            mime: signature.mime_type(),
            signature,
        },
        None => {
            tracing::debug!(prefix_len = buf.len(), "No supported signature found");
            Classification::Rejected
        }
    }
}
