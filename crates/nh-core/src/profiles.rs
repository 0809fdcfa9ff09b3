//! Profile editing operations
//!
//! Every operation takes the configuration explicitly and mutates it in
//! place; persisting the result is the caller's job.

use crate::detect::detect_filter_type;
use crate::types::{Filter, FilterKind, GlobalConfig, Header, HeaderKind, Profile};

/// Suffix appended to the name of a duplicated profile.
pub const COPY_SUFFIX: &str = " (Copy)";

/// Error type for profile editing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("Profile not found: {0}")]
    NotFound(String),
    #[error("Cannot delete the last remaining profile")]
    LastProfile,
    #[error("Profile name must not be empty")]
    EmptyName,
    #[error("Header index {0} out of range")]
    HeaderIndex(usize),
    #[error("Filter index {0} out of range")]
    FilterIndex(usize),
}

/// Fresh, globally unique profile id.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Partial update of a header; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct HeaderUpdate {
    pub enabled: Option<bool>,
    pub kind: Option<HeaderKind>,
    pub name: Option<String>,
    pub value: Option<String>,
}

fn clean_name(name: &str) -> Result<String, ProfileError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ProfileError::EmptyName);
    }
    Ok(name.to_string())
}

fn profile_mut<'a>(config: &'a mut GlobalConfig, id: &str) -> Result<&'a mut Profile, ProfileError> {
    config
        .profile_mut(id)
        .ok_or_else(|| ProfileError::NotFound(id.to_string()))
}

// =============================================================================
// Profiles
// =============================================================================

/// Create an empty profile and make it active. Returns its id.
pub fn add_profile(config: &mut GlobalConfig, name: &str) -> Result<String, ProfileError> {
    let profile = Profile::new(generate_id(), clean_name(name)?);
    let id = profile.id.clone();
    config.profiles.push(profile);
    config.active_profile_id = Some(id.clone());
    Ok(id)
}

/// Deep-copy a profile under a fresh id and make the copy active.
pub fn duplicate_profile(config: &mut GlobalConfig, id: &str) -> Result<String, ProfileError> {
    let source = config
        .profile(id)
        .ok_or_else(|| ProfileError::NotFound(id.to_string()))?;
    let mut copy = source.clone();
    copy.id = generate_id();
    copy.name = format!("{}{}", source.name, COPY_SUFFIX);
    let new_id = copy.id.clone();
    config.profiles.push(copy);
    config.active_profile_id = Some(new_id.clone());
    Ok(new_id)
}

/// Remove a profile. The last remaining profile cannot be deleted.
///
/// If the deleted profile was active, the first remaining one becomes active.
pub fn delete_profile(config: &mut GlobalConfig, id: &str) -> Result<Profile, ProfileError> {
    let index = config
        .profiles
        .iter()
        .position(|p| p.id == id)
        .ok_or_else(|| ProfileError::NotFound(id.to_string()))?;
    if config.profiles.len() <= 1 {
        return Err(ProfileError::LastProfile);
    }
    let removed = config.profiles.remove(index);
    if config.active_profile().is_none() {
        config.active_profile_id = config.profiles.first().map(|p| p.id.clone());
    }
    Ok(removed)
}

pub fn rename_profile(config: &mut GlobalConfig, id: &str, name: &str) -> Result<(), ProfileError> {
    let name = clean_name(name)?;
    profile_mut(config, id)?.name = name;
    Ok(())
}

pub fn set_active_profile(config: &mut GlobalConfig, id: &str) -> Result<(), ProfileError> {
    if config.profile(id).is_none() {
        return Err(ProfileError::NotFound(id.to_string()));
    }
    config.active_profile_id = Some(id.to_string());
    Ok(())
}

pub fn set_profile_enabled(config: &mut GlobalConfig, id: &str, enabled: bool) -> Result<(), ProfileError> {
    profile_mut(config, id)?.enabled = enabled;
    Ok(())
}

pub fn set_global_enabled(config: &mut GlobalConfig, enabled: bool) {
    config.global_enabled = enabled;
}

// =============================================================================
// Headers
// =============================================================================

/// Append a default header. Returns its index.
pub fn add_header(config: &mut GlobalConfig, id: &str) -> Result<usize, ProfileError> {
    let profile = profile_mut(config, id)?;
    profile.headers.push(Header::default());
    Ok(profile.headers.len() - 1)
}

pub fn update_header(
    config: &mut GlobalConfig,
    id: &str,
    index: usize,
    update: HeaderUpdate,
) -> Result<(), ProfileError> {
    let header = profile_mut(config, id)?
        .headers
        .get_mut(index)
        .ok_or(ProfileError::HeaderIndex(index))?;
    if let Some(enabled) = update.enabled {
        header.enabled = enabled;
    }
    if let Some(kind) = update.kind {
        header.kind = kind;
    }
    if let Some(name) = update.name {
        header.name = name;
    }
    if let Some(value) = update.value {
        header.value = value;
    }
    Ok(())
}

pub fn remove_header(config: &mut GlobalConfig, id: &str, index: usize) -> Result<Header, ProfileError> {
    let profile = profile_mut(config, id)?;
    if index >= profile.headers.len() {
        return Err(ProfileError::HeaderIndex(index));
    }
    Ok(profile.headers.remove(index))
}

// =============================================================================
// Filters
// =============================================================================

/// Append an empty, enabled filter. Returns its index.
pub fn add_filter(config: &mut GlobalConfig, id: &str) -> Result<usize, ProfileError> {
    let profile = profile_mut(config, id)?;
    profile.filters.push(Filter::default());
    Ok(profile.filters.len() - 1)
}

fn filter_mut<'a>(config: &'a mut GlobalConfig, id: &str, index: usize) -> Result<&'a mut Filter, ProfileError> {
    profile_mut(config, id)?
        .filters
        .get_mut(index)
        .ok_or(ProfileError::FilterIndex(index))
}

/// Set a filter value; the kind is re-detected from the new value.
pub fn set_filter_value(
    config: &mut GlobalConfig,
    id: &str,
    index: usize,
    value: &str,
) -> Result<FilterKind, ProfileError> {
    let filter = filter_mut(config, id, index)?;
    filter.value = value.to_string();
    filter.kind = detect_filter_type(value);
    Ok(filter.kind)
}

pub fn set_filter_enabled(
    config: &mut GlobalConfig,
    id: &str,
    index: usize,
    enabled: bool,
) -> Result<(), ProfileError> {
    filter_mut(config, id, index)?.enabled = enabled;
    Ok(())
}

pub fn remove_filter(config: &mut GlobalConfig, id: &str, index: usize) -> Result<Filter, ProfileError> {
    let profile = profile_mut(config, id)?;
    if index >= profile.filters.len() {
        return Err(ProfileError::FilterIndex(index));
    }
    Ok(profile.filters.remove(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(names: &[&str]) -> GlobalConfig {
        let mut config = GlobalConfig::default();
        for name in names {
            add_profile(&mut config, name).expect("add should succeed");
        }
        config
    }

    #[test]
    fn add_profile_becomes_active() {
        let mut config = GlobalConfig::default();
        let id = add_profile(&mut config, "  Work  ").expect("add should succeed");
        assert_eq!(config.active_profile_id.as_deref(), Some(id.as_str()));
        let profile = config.active_profile().expect("active profile");
        assert_eq!(profile.name, "Work");
        assert!(!profile.enabled);
        assert!(profile.headers.is_empty());
        assert!(profile.filters.is_empty());
    }

    #[test]
    fn add_profile_rejects_blank_name() {
        let mut config = GlobalConfig::default();
        assert_eq!(add_profile(&mut config, "   "), Err(ProfileError::EmptyName));
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn ids_are_unique() {
        let config = config_with(&["a", "b", "c"]);
        let mut ids: Vec<&str> = config.profiles.iter().map(|p| p.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn duplicate_is_deep_copy_with_fresh_id() {
        let mut config = config_with(&["Work"]);
        let id = config.profiles[0].id.clone();
        let idx = add_header(&mut config, &id).expect("header");
        update_header(
            &mut config,
            &id,
            idx,
            HeaderUpdate {
                name: Some("X-A".to_string()),
                value: Some("1".to_string()),
                ..Default::default()
            },
        )
        .expect("update");

        let copy_id = duplicate_profile(&mut config, &id).expect("duplicate");
        assert_ne!(copy_id, id);
        assert_eq!(config.active_profile_id.as_deref(), Some(copy_id.as_str()));

        let copy = config.profile(&copy_id).expect("copy exists").clone();
        assert_eq!(copy.name, "Work (Copy)");
        assert_eq!(copy.headers, config.profiles[0].headers);

        update_header(
            &mut config,
            &copy_id,
            0,
            HeaderUpdate {
                value: Some("2".to_string()),
                ..Default::default()
            },
        )
        .expect("update copy");
        assert_eq!(config.profiles[0].headers[0].value, "1");
    }

    #[test]
    fn delete_last_profile_is_rejected() {
        let mut config = config_with(&["Only"]);
        let id = config.profiles[0].id.clone();
        assert_eq!(delete_profile(&mut config, &id), Err(ProfileError::LastProfile));
        assert_eq!(config.profiles.len(), 1);
    }

    #[test]
    fn delete_active_falls_back_to_first() {
        let mut config = config_with(&["a", "b"]);
        let first = config.profiles[0].id.clone();
        let second = config.profiles[1].id.clone();
        assert_eq!(config.active_profile_id.as_deref(), Some(second.as_str()));

        delete_profile(&mut config, &second).expect("delete");
        assert_eq!(config.active_profile_id.as_deref(), Some(first.as_str()));
    }

    #[test]
    fn delete_inactive_keeps_active() {
        let mut config = config_with(&["a", "b", "c"]);
        let first = config.profiles[0].id.clone();
        let active = config.active_profile_id.clone();
        delete_profile(&mut config, &first).expect("delete");
        assert_eq!(config.active_profile_id, active);
    }

    #[test]
    fn unknown_profile_errors() {
        let mut config = config_with(&["a"]);
        assert_eq!(
            set_active_profile(&mut config, "missing"),
            Err(ProfileError::NotFound("missing".to_string()))
        );
        assert!(matches!(add_header(&mut config, "missing"), Err(ProfileError::NotFound(_))));
    }

    #[test]
    fn filter_value_redetects_kind() {
        let mut config = config_with(&["a"]);
        let id = config.profiles[0].id.clone();
        let idx = add_filter(&mut config, &id).expect("filter");
        assert_eq!(config.profiles[0].filters[idx].kind, FilterKind::UrlPattern);

        let kind = set_filter_value(&mut config, &id, idx, "*.example.com").expect("value");
        assert_eq!(kind, FilterKind::Domain);

        let kind = set_filter_value(&mut config, &id, idx, "*://example.com/*").expect("value");
        assert_eq!(kind, FilterKind::UrlPattern);
    }

    #[test]
    fn index_errors() {
        let mut config = config_with(&["a"]);
        let id = config.profiles[0].id.clone();
        assert_eq!(remove_header(&mut config, &id, 0), Err(ProfileError::HeaderIndex(0)));
        assert_eq!(remove_filter(&mut config, &id, 3), Err(ProfileError::FilterIndex(3)));
        assert_eq!(
            set_filter_enabled(&mut config, &id, 1, false),
            Err(ProfileError::FilterIndex(1))
        );
    }

    #[test]
    fn remove_header_returns_removed() {
        let mut config = config_with(&["a"]);
        let id = config.profiles[0].id.clone();
        add_header(&mut config, &id).expect("header");
        add_header(&mut config, &id).expect("header");
        update_header(
            &mut config,
            &id,
            1,
            HeaderUpdate {
                name: Some("X-Second".to_string()),
                ..Default::default()
            },
        )
        .expect("update");
        let removed = remove_header(&mut config, &id, 1).expect("remove");
        assert_eq!(removed.name, "X-Second");
        assert_eq!(config.profiles[0].headers.len(), 1);
    }
}
