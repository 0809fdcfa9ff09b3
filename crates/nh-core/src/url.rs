//! URL helpers shared by the matcher
//!
//! Hostnames are taken from a full WHATWG parse so that userinfo, ports and
//! percent-encoding behave the way the browser sees them.

use regex::{Regex, RegexBuilder};
use url::Url;

const PATTERN_SIZE_LIMIT: usize = 1 << 20;

// =============================================================================
// Host Extraction
// =============================================================================

/// Hostname of `url`, or `None` if it does not parse or has no host.
pub fn hostname(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?;
    if host.is_empty() {
        return None;
    }
    Some(host.to_ascii_lowercase())
}

/// Whether `url` parses to something with a non-empty hostname.
pub fn has_hostname(url: &str) -> bool {
    hostname(url).is_some()
}

// =============================================================================
// Glob Patterns
// =============================================================================

/// Translate a `*` glob into an anchored, case-sensitive regex.
///
/// Every character other than `*` is matched literally.
pub fn glob_to_regex(pattern: &str) -> Option<Regex> {
    if pattern.is_empty() {
        return None;
    }

    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    for (i, literal) in pattern.split('*').enumerate() {
        if i > 0 {
            source.push_str(".*");
        }
        source.push_str(&regex::escape(literal));
    }
    source.push('$');

    RegexBuilder::new(&source)
        .size_limit(PATTERN_SIZE_LIMIT)
        .build()
        .ok()
}
