//! Address comparison helpers
//!
//! Comparison is case-insensitive and ZIP extensions are ignored; the stored
//! values preserve their original casing.

use crate::models::ContactInfo;

/// Comparison form of one address sub-field
pub fn comparison_key(value: &str) -> String {
    value.trim().to_uppercase()
}

/// Base 5-digit ZIP prefix; the `-NNNN` extension is ignored
pub fn base_zip(zip: &str) -> &str {
    let base = zip.trim().split('-').next().unwrap_or("");
    if base.len() > 5 {
        &base[..5]
    } else {
        base
    }
}

/// Whether two contact sub-records describe the same address
pub fn same_address(a: &ContactInfo, b: &ContactInfo) -> bool {
    let key = |c: &ContactInfo| {
        (
            comparison_key(c.address.as_deref().unwrap_or("")),
            comparison_key(c.city.as_deref().unwrap_or("")),
            comparison_key(c.state.as_deref().unwrap_or("")),
            base_zip(c.zip.as_deref().unwrap_or("")).to_string(),
        )
    };
    key(a) == key(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(address: &str, city: &str, state: &str, zip: &str) -> ContactInfo {
        ContactInfo {
            address: Some(address.to_string()),
            city: Some(city.to_string()),
            state: Some(state.to_string()),
            zip: Some(zip.to_string()),
            phone: None,
        }
    }

    #[test]
    fn test_comparison_ignores_case_and_zip_extension() {
        let a = contact("1 Main St", "Springfield", "IL", "62704");
        let b = contact("1 MAIN ST", "SPRINGFIELD", "il", "62704-1234");
        assert!(same_address(&a, &b));
    }

    #[test]
    fn test_different_street_differs() {
        let a = contact("1 Main St", "Springfield", "IL", "62704");
        let b = contact("2 Main St", "Springfield", "IL", "62704");
        assert!(!same_address(&a, &b));
    }

    #[test]
    fn test_base_zip() {
        assert_eq!(base_zip("62704-1234"), "62704");
        assert_eq!(base_zip("627041234"), "62704");
        assert_eq!(base_zip(" 62704 "), "62704");
        assert_eq!(base_zip(""), "");
    }
}
