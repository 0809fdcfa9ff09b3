//! Heuristic classification of raw filter values

use crate::types::FilterKind;

/// Classify a filter value as a domain or a URL pattern.
///
/// Check order matters: `*.example.com` contains `*` but is a domain.
pub fn detect_filter_type(value: &str) -> FilterKind {
    let v = value.trim();
    if v.is_empty() {
        return FilterKind::UrlPattern;
    }
    if v.contains("://") || v.contains('/') {
        return FilterKind::UrlPattern;
    }
    if v.starts_with("*.") {
        return FilterKind::Domain;
    }
    if v.contains('*') {
        return FilterKind::UrlPattern;
    }
    FilterKind::Domain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_filter_type() {
        assert_eq!(detect_filter_type("*.example.com"), FilterKind::Domain);
        assert_eq!(detect_filter_type("*://x/*"), FilterKind::UrlPattern);
        assert_eq!(detect_filter_type("example.com"), FilterKind::Domain);
        assert_eq!(detect_filter_type("example.com/path"), FilterKind::UrlPattern);
        assert_eq!(detect_filter_type("https://example.com"), FilterKind::UrlPattern);
        assert_eq!(detect_filter_type("ex*ample.com"), FilterKind::UrlPattern);
        assert_eq!(detect_filter_type("*.example.com/*"), FilterKind::UrlPattern);
    }

    #[test]
    fn test_detect_empty_defaults_to_url() {
        assert_eq!(detect_filter_type(""), FilterKind::UrlPattern);
        assert_eq!(detect_filter_type("   "), FilterKind::UrlPattern);
    }

    #[test]
    fn test_detect_trims() {
        assert_eq!(detect_filter_type("  *.example.com  "), FilterKind::Domain);
    }
}
