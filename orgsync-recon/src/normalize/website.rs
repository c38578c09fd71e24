//! Website URL normalization
//!
//! Canonical form: `https://<lowercased host>`. Path and query information
//! is discarded; this is intentionally lossy. Placeholder tokens and strings
//! that cannot be a hostname normalize to absent.

/// Placeholder values sources use for "no website"
const PLACEHOLDER_TOKENS: &[&str] = &[
    "N/A",
    "NA",
    "NONE",
    "NULL",
    "NOT APPLICABLE",
    "S3.AMAZONAWS.COM",
];

/// Normalize a raw website string to `https://<host>`
///
/// Returns `None` for placeholders and corrupted values (whitespace in the
/// host, or a result shorter than 10 characters including the scheme).
pub fn normalize_website(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if PLACEHOLDER_TOKENS.contains(&trimmed.to_uppercase().as_str()) {
        return None;
    }

    // Strip scheme, then a leading www.
    let mut rest = trimmed;
    for scheme in ["https://", "http://"] {
        if let Some(stripped) = strip_prefix_ci(rest, scheme) {
            rest = stripped;
            break;
        }
    }
    if let Some(stripped) = strip_prefix_ci(rest, "www.") {
        rest = stripped;
    }

    // Host only: truncate at the first path or query separator
    let host = rest
        .split('/')
        .next()
        .unwrap_or("")
        .split('?')
        .next()
        .unwrap_or("");

    let url = format!("https://{}", host).to_lowercase();

    if url.len() < 10 || url.contains(char::is_whitespace) {
        return None;
    }

    Some(url)
}

/// Case-insensitive ASCII prefix strip; `None` when the prefix is absent
fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}
