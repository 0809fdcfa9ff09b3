//! Profile selection for auto-switching and badge counting

use crate::matcher::matches_any;
use crate::types::{GlobalConfig, Header, Profile};

// =============================================================================
// Auto-Switch
// =============================================================================

/// First profile with an active filter matching `url`.
///
/// Profiles without filters never auto-select. First match wins.
pub fn select_profile_for_url<'a>(profiles: &'a [Profile], url: &str) -> Option<&'a Profile> {
    profiles
        .iter()
        .filter(|p| !p.filters.is_empty())
        .find(|p| matches_any(url, p.active_filters()))
}

/// Make the profile selected for `url` active.
///
/// Returns the new active id if it changed. When nothing matches the active
/// profile is left alone.
pub fn auto_switch(config: &mut GlobalConfig, url: &str) -> Option<String> {
    let selected = select_profile_for_url(&config.profiles, url)?;
    if config.active_profile_id.as_deref() == Some(selected.id.as_str()) {
        return None;
    }
    let id = selected.id.clone();
    log::debug!("auto-switching to profile {} for {}", id, url);
    config.active_profile_id = Some(id.clone());
    Some(id)
}

// =============================================================================
// Contributing Profiles
// =============================================================================

/// Profiles that feed rule compilation: the explicitly enabled ones, or the
/// active profile when none are enabled.
pub fn contributing_profiles(config: &GlobalConfig) -> Vec<&Profile> {
    let enabled: Vec<&Profile> = config.profiles.iter().filter(|p| p.enabled).collect();
    if !enabled.is_empty() {
        return enabled;
    }
    config.active_profile().into_iter().collect()
}

// =============================================================================
// Applicability
// =============================================================================

/// Whether `header` of `profile` would be applied on `url`.
///
/// An unknown URL or a profile without active filters counts as applying.
pub fn header_applies_to_url(profile: &Profile, header: &Header, url: Option<&str>) -> bool {
    if !header.enabled {
        return false;
    }
    let url = match url {
        Some(url) if !url.is_empty() => url,
        _ => return true,
    };
    if !profile.has_active_filters() {
        return true;
    }
    matches_any(url, profile.active_filters())
}

/// Number of headers across `profiles` that apply to `url`.
pub fn count_applicable<'a, I>(profiles: I, url: Option<&str>) -> usize
where
    I: IntoIterator<Item = &'a Profile>,
{
    profiles
        .into_iter()
        .map(|p| {
            p.headers
                .iter()
                .filter(|h| header_applies_to_url(p, h, url))
                .count()
        })
        .sum()
}

/// Badge count for the current configuration. Zero while globally disabled.
pub fn badge_count(config: &GlobalConfig, url: Option<&str>) -> usize {
    if !config.global_enabled {
        return 0;
    }
    count_applicable(contributing_profiles(config), url)
}

/// Badge label; empty hides the badge.
pub fn badge_text(count: usize) -> String {
    if count == 0 {
        String::new()
    } else {
        count.to_string()
    }
}
