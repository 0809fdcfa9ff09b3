//! Core type definitions for NoobHeaders
//!
//! These types map directly to the JSON documents kept in the extension's
//! configuration store and to the import/export file format.

use serde::{Deserialize, Serialize};

use crate::detect::detect_filter_type;

// =============================================================================
// Storage Keys
// =============================================================================

/// Store key holding the profile list.
pub const PROFILES_KEY: &str = "noobheaders_profiles";
/// Store key holding the active profile id.
pub const ACTIVE_PROFILE_KEY: &str = "noobheaders_active_profile";
/// Store key holding the global enable flag.
pub const GLOBAL_ENABLED_KEY: &str = "noobheaders_global_enabled";

/// Name given to the profile synthesized for an empty store.
pub const DEFAULT_PROFILE_NAME: &str = "Default Profile";

/// One of the three keys of the configuration store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Profiles,
    ActiveProfile,
    GlobalEnabled,
}

impl StorageKey {
    pub const ALL: [StorageKey; 3] = [Self::Profiles, Self::ActiveProfile, Self::GlobalEnabled];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Profiles => PROFILES_KEY,
            Self::ActiveProfile => ACTIVE_PROFILE_KEY,
            Self::GlobalEnabled => GLOBAL_ENABLED_KEY,
        }
    }

    /// Parse a raw store key. Unrelated keys yield `None`.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            PROFILES_KEY => Some(Self::Profiles),
            ACTIVE_PROFILE_KEY => Some(Self::ActiveProfile),
            GLOBAL_ENABLED_KEY => Some(Self::GlobalEnabled),
            _ => None,
        }
    }
}

// =============================================================================
// Headers
// =============================================================================

/// Which side of the exchange a header modification targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderKind {
    #[default]
    Request,
    Response,
}

/// A single header modification owned by a profile.
///
/// An empty `value` removes the header instead of setting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub enabled: bool,
    #[serde(rename = "type")]
    pub kind: HeaderKind,
    pub name: String,
    pub value: String,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            enabled: true,
            kind: HeaderKind::Request,
            name: String::new(),
            value: String::new(),
        }
    }
}

impl Header {
    pub fn new(kind: HeaderKind, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            enabled: true,
            kind,
            name: name.into(),
            value: value.into(),
        }
    }
}

// =============================================================================
// Filters
// =============================================================================

/// How a filter value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilterKind {
    /// Hostname, matched with subdomain containment
    #[serde(rename = "domain")]
    Domain,
    /// Glob over the full URL where `*` matches any substring
    #[default]
    #[serde(rename = "url")]
    UrlPattern,
}

/// A URL or domain restriction owned by a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub enabled: bool,
    #[serde(rename = "type")]
    pub kind: FilterKind,
    pub value: String,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            enabled: true,
            kind: FilterKind::UrlPattern,
            value: String::new(),
        }
    }
}

impl Filter {
    pub fn new(kind: FilterKind, value: impl Into<String>) -> Self {
        Self {
            enabled: true,
            kind,
            value: value.into(),
        }
    }

    /// Build a filter whose kind is derived from its value.
    pub fn detected(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            enabled: true,
            kind: detect_filter_type(&value),
            value,
        }
    }

    /// Enabled and non-empty.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.value.is_empty()
    }
}

// =============================================================================
// Profiles
// =============================================================================

/// Named bundle of header modifications and the filters restricting them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    /// Absent in older documents; absent and `false` both mean "not contributing".
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl Profile {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: false,
            headers: Vec::new(),
            filters: Vec::new(),
        }
    }

    pub fn active_filters(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter().filter(|f| f.is_active())
    }

    pub fn has_active_filters(&self) -> bool {
        self.filters.iter().any(Filter::is_active)
    }

    /// Re-derive every filter kind from its value. Returns true if any changed.
    pub fn refresh_filter_kinds(&mut self) -> bool {
        let mut changed = false;
        for filter in &mut self.filters {
            let kind = detect_filter_type(&filter.value);
            if filter.kind != kind {
                filter.kind = kind;
                changed = true;
            }
        }
        changed
    }
}

// =============================================================================
// Global Configuration
// =============================================================================

/// The whole configuration document as kept in the store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(rename = "noobheaders_global_enabled", default)]
    pub global_enabled: bool,
    #[serde(
        rename = "noobheaders_active_profile",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub active_profile_id: Option<String>,
    #[serde(rename = "noobheaders_profiles", default)]
    pub profiles: Vec<Profile>,
}

impl GlobalConfig {
    /// Profile referenced by the active id. A dangling id resolves to `None`.
    pub fn active_profile(&self) -> Option<&Profile> {
        let id = self.active_profile_id.as_deref()?;
        self.profiles.iter().find(|p| p.id == id)
    }

    pub fn active_profile_mut(&mut self) -> Option<&mut Profile> {
        let id = self.active_profile_id.clone()?;
        self.profiles.iter_mut().find(|p| p.id == id)
    }

    pub fn profile(&self, id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    pub fn profile_mut(&mut self, id: &str) -> Option<&mut Profile> {
        self.profiles.iter_mut().find(|p| p.id == id)
    }

    /// Synthesize a default profile when the list is empty.
    /// Returns true if the configuration was modified.
    pub fn ensure_default_profile(&mut self) -> bool {
        if !self.profiles.is_empty() {
            return false;
        }
        let profile = Profile::new(crate::profiles::generate_id(), DEFAULT_PROFILE_NAME);
        log::info!("no profiles stored, created default profile {}", profile.id);
        self.active_profile_id = Some(profile.id.clone());
        self.profiles.push(profile);
        true
    }

    /// Apply the on-load normalizations: default profile and derived filter kinds.
    /// Returns true if anything changed and the document should be written back.
    pub fn normalize(&mut self) -> bool {
        let mut changed = self.ensure_default_profile();
        for profile in &mut self.profiles {
            changed |= profile.refresh_filter_kinds();
        }
        changed
    }

    /// Keys whose values differ between two snapshots of the store.
    pub fn changed_keys(old: &GlobalConfig, new: &GlobalConfig) -> Vec<StorageKey> {
        let mut keys = Vec::new();
        if old.profiles != new.profiles {
            keys.push(StorageKey::Profiles);
        }
        if old.active_profile_id != new.active_profile_id {
            keys.push(StorageKey::ActiveProfile);
        }
        if old.global_enabled != new.global_enabled {
            keys.push(StorageKey::GlobalEnabled);
        }
        keys
    }
}
