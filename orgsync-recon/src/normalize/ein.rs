//! Identifier normalization
//!
//! Canonical form: exactly 9 ASCII digits, zero-padded on the left. This is
//! the sole key used for matching and storage; two inputs that normalize to
//! the same 9-digit string are the same organization by definition.

/// Normalize a raw identifier to its canonical 9-digit form
///
/// Strips `-` separators and surrounding whitespace. Returns `None` when the
/// remainder is empty, non-numeric, or longer than 9 digits.
pub fn normalize_ein(raw: &str) -> Option<String> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != '-').collect();

    if cleaned.is_empty() || cleaned.len() > 9 {
        return None;
    }
    if !cleaned.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some(format!("{:0>9}", cleaned))
}
