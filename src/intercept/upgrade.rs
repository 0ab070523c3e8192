//! Protocol upgrade detection.
//!
//! Upgrade exchanges hand off the raw connection and cannot be buffered or replayed,
//! so they must be recognised before any capture starts.

use axum::http::header::{HeaderMap, CONNECTION, UPGRADE};

/// Returns true if the request asks to switch protocols.
///
/// A non-empty `Upgrade` header qualifies, as does a `Connection` header containing
/// "upgrade" anywhere in its value (case-insensitive substring, not a token match).
pub fn is_upgrade(headers: &HeaderMap) -> bool {
    let upgrade = headers
        .get(UPGRADE)
        .map(|v| !v.as_bytes().is_empty())
        .unwrap_or(false);

    let connection = headers
        .get(CONNECTION)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).to_ascii_lowercase().contains("upgrade"))
        .unwrap_or(false);

    upgrade || connection
}
