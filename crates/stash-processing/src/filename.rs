/// Longest original name kept, in characters.
const MAX_NAME_CHARS: usize = 255;

/// Reduce a client supplied filename to something safe to store and echo back.
///
/// Only the final path component survives (both `/` and `\` count as
/// separators) and control characters are dropped. The result is display
/// metadata only; it never becomes part of a storage path.
pub fn sanitize_original_name(raw: &str) -> String {
    let base = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(raw);

    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_CHARS)
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
