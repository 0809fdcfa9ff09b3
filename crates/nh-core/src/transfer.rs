//! Profile import and export
//!
//! The file format is a JSON array of profiles using the same field names as
//! the configuration store. Imports are all-or-nothing.

use std::collections::HashSet;

use serde_json::Value;

use crate::types::{GlobalConfig, Profile};

/// Error type for profile imports.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Invalid profile format: expected an array of profiles")]
    NotAnArray,
    #[error("Invalid profile at index {index}: {reason}")]
    InvalidProfile { index: usize, reason: String },
    #[error("Duplicate profile id: {0}")]
    DuplicateId(String),
}

/// Serialize profiles for export.
pub fn export_profiles(profiles: &[Profile]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(profiles)
}

/// Parse and validate an exported profile list.
pub fn import_profiles(text: &str) -> Result<Vec<Profile>, ImportError> {
    let value: Value = serde_json::from_str(text)?;
    let items = value.as_array().ok_or(ImportError::NotAnArray)?;

    let mut profiles = Vec::with_capacity(items.len());
    let mut seen = HashSet::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        check_shape(item).map_err(|reason| ImportError::InvalidProfile {
            index,
            reason: reason.to_string(),
        })?;

        let mut profile: Profile =
            serde_json::from_value(item.clone()).map_err(|e| ImportError::InvalidProfile {
                index,
                reason: e.to_string(),
            })?;

        if !seen.insert(profile.id.clone()) {
            return Err(ImportError::DuplicateId(profile.id));
        }

        profile.refresh_filter_kinds();
        profiles.push(profile);
    }

    log::debug!("validated {} imported profiles", profiles.len());
    Ok(profiles)
}

fn check_shape(item: &Value) -> Result<(), &'static str> {
    let obj = item.as_object().ok_or("not an object")?;
    if !obj.get("id").is_some_and(Value::is_string) {
        return Err("missing string field 'id'");
    }
    if !obj.get("name").is_some_and(Value::is_string) {
        return Err("missing string field 'name'");
    }
    if !obj.get("enabled").is_some_and(Value::is_boolean) {
        return Err("missing boolean field 'enabled'");
    }
    if !obj.get("headers").is_some_and(Value::is_array) {
        return Err("missing array field 'headers'");
    }
    if !obj.get("filters").is_some_and(Value::is_array) {
        return Err("missing array field 'filters'");
    }
    Ok(())
}

impl GlobalConfig {
    /// Replace every profile with an imported batch.
    ///
    /// The first imported profile becomes active; an empty batch leaves a
    /// freshly synthesized default profile.
    pub fn replace_profiles(&mut self, profiles: Vec<Profile>) {
        self.profiles = profiles;
        self.active_profile_id = self.profiles.first().map(|p| p.id.clone());
        self.ensure_default_profile();
    }
}
