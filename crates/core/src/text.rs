//! Text utilities shared across the workspace.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

/// Normalizes content for comparison: CRLF → LF, outer whitespace trimmed.
pub fn normalize_content(content: &str) -> String {
    content.replace("\r\n", "\n").trim().to_string()
}

/// Whether two contents match after normalization.
///
/// ```
/// use corral_core::content_matches;
///
/// assert!(content_matches("A\n", "A\r\n"));
/// assert!(!content_matches("A", "B"));
/// ```
pub fn content_matches(a: &str, b: &str) -> bool {
    normalize_content(a) == normalize_content(b)
}

/// Computes a SHA-256 hash of the given content, returning lowercase hex.
pub fn hash_content(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Lowercases and collapses runs of non-alphanumerics to single dashes,
/// trimming dashes at both ends.
pub fn slugify(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

// Fixed-width so ids of any two instants compare lexicographically in
// real-time order (variable-width subseconds would break that).
const ID_FORMAT: &[BorrowedFormatItem<'_>] = format_description!(
    "[year]-[month]-[day]T[hour]-[minute]-[second]-[subsecond digits:3]Z"
);

/// Renders a UTC timestamp as a filesystem-safe id: ISO-8601 with `:` and
/// `.` replaced by `-`. Ids sort lexicographically in real-time order.
pub fn timestamp_id(ts: OffsetDateTime) -> String {
    let utc = ts.to_offset(time::UtcOffset::UTC);
    utc.format(&ID_FORMAT)
        .unwrap_or_else(|_| utc.unix_timestamp().to_string())
}

/// Expands a leading `~` or `~/` against the given home directory.
pub fn expand_tilde(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = path.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(path)
}
