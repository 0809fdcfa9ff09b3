//! Filter matching against navigation URLs
//!
//! Matching is total: unparseable URLs, empty filters and patterns that do
//! not compile all answer `false` rather than erroring.

use crate::types::{Filter, FilterKind};
use crate::url::{glob_to_regex, has_hostname, hostname};

/// Whether `filter` applies to `url`.
pub fn matches(url: &str, filter: &Filter) -> bool {
    if filter.value.is_empty() {
        return false;
    }

    let host = match hostname(url) {
        Some(host) => host,
        None => return false,
    };

    match filter.kind {
        FilterKind::Domain => match normalize_domain_filter(&filter.value) {
            Some(domain) => host_matches_domain(host.trim(), &domain),
            None => false,
        },
        FilterKind::UrlPattern => match glob_to_regex(&filter.value) {
            Some(re) => re.is_match(url),
            None => false,
        },
    }
}

/// Whether any of `filters` applies to `url`.
pub fn matches_any<'a, I>(url: &str, filters: I) -> bool
where
    I: IntoIterator<Item = &'a Filter>,
{
    filters.into_iter().any(|f| matches(url, f))
}

/// Exact host or a subdomain of it. `notexample.com` does not match `example.com`.
#[inline]
pub fn host_matches_domain(host: &str, domain: &str) -> bool {
    if host.len() == domain.len() {
        return host == domain;
    }
    host.len() > domain.len()
        && host.ends_with(domain)
        && host.as_bytes()[host.len() - domain.len() - 1] == b'.'
}

/// Canonical form of a domain filter value.
///
/// Lowercases and trims, takes the hostname of a pasted URL, and drops a
/// leading `*.`. Returns `None` when nothing usable remains.
pub fn normalize_domain_filter(value: &str) -> Option<String> {
    let mut domain = value.trim().to_ascii_lowercase();

    if domain.contains('/') {
        // Unparseable values are kept as typed; they simply never match.
        if let Some(host) = hostname(&domain) {
            domain = host;
        }
    }

    if let Some(rest) = domain.strip_prefix("*.") {
        domain = rest.to_string();
    }

    if domain.is_empty() {
        None
    } else {
        Some(domain)
    }
}

/// Whether `value` is acceptable as a domain filter.
///
/// Accepts bare hostnames, hostnames with a leading `*.`, and full URLs with a
/// non-empty host.
pub fn is_valid_domain(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }

    if value.contains('/') || value.starts_with("http://") || value.starts_with("https://") {
        return has_hostname(value);
    }

    let lower = value.to_ascii_lowercase();
    let host = lower.strip_prefix("*.").unwrap_or(&lower);
    is_valid_hostname(host)
}

/// Dot-separated labels of ASCII alphanumerics with internal hyphens only.
fn is_valid_hostname(host: &str) -> bool {
    !host.is_empty() && host.split('.').all(is_valid_label)
}

fn is_valid_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes.iter().all(|&b| b.is_ascii_alphanumeric() || b == b'-')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(value: &str) -> Filter {
        Filter::new(FilterKind::Domain, value)
    }

    fn pattern(value: &str) -> Filter {
        Filter::new(FilterKind::UrlPattern, value)
    }

    #[test]
    fn domain_matches_exact_and_subdomains() {
        assert!(matches("https://example.com/", &domain("example.com")));
        assert!(matches("https://sub.example.com", &domain("example.com")));
        assert!(matches("https://a.b.example.com/x?y", &domain("example.com")));
    }

    #[test]
    fn domain_is_not_substring_match() {
        assert!(!matches("https://notexample.com", &domain("example.com")));
        assert!(!matches("https://example.com.evil.net", &domain("example.com")));
        assert!(!matches("https://example.org", &domain("example.com")));
    }

    #[test]
    fn domain_is_case_insensitive_and_trimmed() {
        assert!(matches("https://Sub.Example.com/", &domain("  EXAMPLE.com ")));
    }

    #[test]
    fn wildcard_prefix_equals_stripped_form() {
        let urls = [
            "https://example.com/",
            "https://sub.example.com/a",
            "https://notexample.com/",
            "http://example.net/",
            "garbage",
        ];
        for url in urls {
            assert_eq!(
                matches(url, &domain("*.example.com")),
                matches(url, &domain("example.com")),
                "mismatch for {url}"
            );
        }
    }

    #[test]
    fn domain_filter_accepts_pasted_url() {
        assert!(matches("https://api.github.com/x", &domain("https://github.com/some/path")));
        assert!(!matches("https://gitlab.com/x", &domain("https://github.com/some/path")));
    }

    #[test]
    fn domain_filter_with_unparseable_path_never_matches() {
        assert!(!matches("https://example.com/path", &domain("example.com/path")));
    }

    #[test]
    fn url_pattern_is_anchored() {
        let filter = pattern("*://github.com/*");
        assert!(matches("https://github.com/a/b", &filter));
        assert!(!matches("https://gist.github.com", &filter));
        assert!(!matches("https://gist.github.com/a", &filter));
    }

    #[test]
    fn url_pattern_is_case_sensitive() {
        assert!(matches("https://example.com/API/v1", &pattern("https://example.com/API/*")));
        assert!(!matches("https://example.com/api/v1", &pattern("https://example.com/API/*")));
    }

    #[test]
    fn url_pattern_treats_question_mark_literally() {
        let filter = pattern("https://example.com/search?q=*");
        assert!(matches("https://example.com/search?q=rust", &filter));
        assert!(!matches("https://example.com/searchq=rust", &filter));
    }

    #[test]
    fn empty_filter_or_bad_url_never_matches() {
        assert!(!matches("https://example.com", &domain("")));
        assert!(!matches("https://example.com", &pattern("")));
        assert!(!matches("not a url", &pattern("*")));
        assert!(!matches("", &domain("example.com")));
    }

    #[test]
    fn matches_any_is_or() {
        let filters = [domain("a.com"), pattern("*://b.com/*")];
        assert!(matches_any("https://b.com/x", filters.iter()));
        assert!(matches_any("https://x.a.com/", filters.iter()));
        assert!(!matches_any("https://c.com/", filters.iter()));
    }

    #[test]
    fn valid_domains() {
        assert!(is_valid_domain("example.com"));
        assert!(is_valid_domain("*.example.com"));
        assert!(is_valid_domain("localhost"));
        assert!(is_valid_domain("my-host.example.co.uk"));
        assert!(is_valid_domain("https://example.com/path"));
        assert!(is_valid_domain("http://localhost:8080"));
    }

    #[test]
    fn invalid_domains() {
        assert!(!is_valid_domain(""));
        assert!(!is_valid_domain("   "));
        assert!(!is_valid_domain("exa mple.com"));
        assert!(!is_valid_domain("-example.com"));
        assert!(!is_valid_domain("example-.com"));
        assert!(!is_valid_domain("example..com"));
        assert!(!is_valid_domain("example.com."));
        assert!(!is_valid_domain("*example.com"));
        assert!(!is_valid_domain("example.com/path"));
    }
}
