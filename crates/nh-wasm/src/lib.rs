//! WebAssembly bindings for NoobHeaders
//!
//! Values cross the boundary as plain JSON-compatible objects using the same
//! field names as the configuration store.

use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use nh_compiler::{compile_profile as compile_one, plan_rule_update as plan_update, Trigger};
use nh_core::matcher;
use nh_core::profiles::generate_id;
use nh_core::select;
use nh_core::transfer;
use nh_core::types::{Filter, FilterKind, GlobalConfig, Profile};

// =============================================================================
// Logging
// =============================================================================

struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = JsValue::from_str(&format!("[noobheaders] {}", record.args()));
        match record.level() {
            log::Level::Error => web_sys::console::error_1(&message),
            log::Level::Warn => web_sys::console::warn_1(&message),
            log::Level::Info => web_sys::console::info_1(&message),
            _ => web_sys::console::debug_1(&message),
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

#[wasm_bindgen]
pub fn init_logging(verbose: bool) {
    // A second call only adjusts the level.
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });
}

// =============================================================================
// Conversion
// =============================================================================

fn from_js<T: DeserializeOwned>(value: &JsValue, what: &str) -> Result<T, JsValue> {
    if value.is_undefined() {
        return Err(JsValue::from_str(&format!("Missing {}", what)));
    }
    let text = js_sys::JSON::stringify(value)
        .ok()
        .and_then(|s| s.as_string())
        .ok_or_else(|| JsValue::from_str(&format!("{} is not serializable", what)))?;
    serde_json::from_str(&text).map_err(|e| JsValue::from_str(&format!("Invalid {}: {}", what, e)))
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    let text = serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))?;
    js_sys::JSON::parse(&text)
}

/// Stored kinds may be stale; every document is normalized on the way in
/// so that detection wins, as it does on load.
fn config_from_js(value: &JsValue) -> Result<GlobalConfig, JsValue> {
    let mut config: GlobalConfig = from_js(value, "configuration")?;
    config.normalize();
    Ok(config)
}

fn profiles_from_js(value: &JsValue) -> Result<Vec<Profile>, JsValue> {
    let mut profiles: Vec<Profile> = from_js(value, "profiles")?;
    for profile in &mut profiles {
        profile.refresh_filter_kinds();
    }
    Ok(profiles)
}

fn kind_name(kind: FilterKind) -> &'static str {
    match kind {
        FilterKind::Domain => "domain",
        FilterKind::UrlPattern => "url",
    }
}

// =============================================================================
// Filters
// =============================================================================

#[wasm_bindgen]
pub fn detect_filter_type(value: &str) -> String {
    kind_name(nh_core::detect_filter_type(value)).to_string()
}

/// Malformed filters never match.
#[wasm_bindgen]
pub fn matches_filter(url: &str, filter: JsValue) -> bool {
    match from_js::<Filter>(&filter, "filter") {
        Ok(mut filter) => {
            filter.kind = nh_core::detect_filter_type(&filter.value);
            matcher::matches(url, &filter)
        }
        Err(_) => false,
    }
}

#[wasm_bindgen]
pub fn is_valid_domain(value: &str) -> bool {
    matcher::is_valid_domain(value)
}

// =============================================================================
// Rules
// =============================================================================

#[wasm_bindgen]
pub fn compile_profile(profile: JsValue, global_enabled: bool, id_offset: u32) -> Result<JsValue, JsValue> {
    let mut profile: Profile = from_js(&profile, "profile")?;
    profile.refresh_filter_kinds();
    to_js(&compile_one(&profile, global_enabled, id_offset))
}

/// Plan the dynamic rule update for a store snapshot: every installed id is
/// removed and the compiled batch added, in `updateDynamicRules` shape.
#[wasm_bindgen]
pub fn plan_rule_update(config: JsValue, installed_ids: JsValue) -> Result<JsValue, JsValue> {
    let config = config_from_js(&config)?;
    let installed: Vec<u32> = if installed_ids.is_undefined() || installed_ids.is_null() {
        Vec::new()
    } else {
        from_js(&installed_ids, "installed rule ids")?
    };
    let update = plan_update(&config, &installed);
    log::debug!(
        "planned update: remove {} rules, add {}",
        update.remove_rule_ids.len(),
        update.add_rules.len()
    );
    to_js(&update)
}

/// Whether a batch of changed store keys should trigger a recompute.
#[wasm_bindgen]
pub fn should_recompute(changed_keys: JsValue) -> Result<bool, JsValue> {
    let keys: Vec<String> = from_js(&changed_keys, "changed keys")?;
    Ok(Trigger::from_changed_keys(keys.iter().map(String::as_str)).requires_recompute())
}

#[wasm_bindgen]
pub fn is_update_rules_message(action: &str) -> bool {
    Trigger::from_message(action).is_some()
}

// =============================================================================
// Profiles
// =============================================================================

/// Apply on-load normalizations (default profile, derived filter kinds).
#[wasm_bindgen]
pub fn normalize_config(config: JsValue) -> Result<JsValue, JsValue> {
    if config.is_undefined() || config.is_null() {
        let mut config = GlobalConfig::default();
        config.normalize();
        return to_js(&config);
    }
    to_js(&config_from_js(&config)?)
}

#[wasm_bindgen]
pub fn new_profile_id() -> String {
    generate_id()
}

#[wasm_bindgen]
pub fn select_profile_for_url(profiles: JsValue, url: &str) -> Result<Option<String>, JsValue> {
    let profiles = profiles_from_js(&profiles)?;
    Ok(select::select_profile_for_url(&profiles, url).map(|p| p.id.clone()))
}

/// New active profile id for `url`, or `undefined` if it should not change.
#[wasm_bindgen]
pub fn auto_switch(config: JsValue, url: &str) -> Result<Option<String>, JsValue> {
    let mut config = config_from_js(&config)?;
    Ok(select::auto_switch(&mut config, url))
}

#[wasm_bindgen]
pub fn count_applicable_headers(profiles: JsValue, url: Option<String>) -> Result<u32, JsValue> {
    let profiles = profiles_from_js(&profiles)?;
    Ok(select::count_applicable(profiles.iter(), url.as_deref()) as u32)
}

#[wasm_bindgen]
pub fn badge_count(config: JsValue, url: Option<String>) -> Result<u32, JsValue> {
    let config = config_from_js(&config)?;
    Ok(select::badge_count(&config, url.as_deref()) as u32)
}

#[wasm_bindgen]
pub fn badge_text(count: u32) -> String {
    select::badge_text(count as usize)
}

// =============================================================================
// Import / Export
// =============================================================================

#[wasm_bindgen]
pub fn export_profiles(profiles: JsValue) -> Result<String, JsValue> {
    let profiles = profiles_from_js(&profiles)?;
    transfer::export_profiles(&profiles).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Validate an import file. Rejects with a readable reason; nothing is
/// written until the caller stores the returned list.
#[wasm_bindgen]
pub fn import_profiles(text: &str) -> Result<JsValue, JsValue> {
    let profiles = transfer::import_profiles(text).map_err(|e| JsValue::from_str(&e.to_string()))?;
    to_js(&profiles)
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::wasm_bindgen_test;

    fn parse(text: &str) -> JsValue {
        js_sys::JSON::parse(text).expect("valid json")
    }

    #[wasm_bindgen_test]
    fn detect_returns_store_names() {
        assert_eq!(detect_filter_type("*.example.com"), "domain");
        assert_eq!(detect_filter_type("*://x/*"), "url");
    }

    #[wasm_bindgen_test]
    fn malformed_filter_does_not_match() {
        assert!(!matches_filter("https://example.com", parse(r#"{"value": 3}"#)));
        assert!(matches_filter(
            "https://sub.example.com",
            parse(r#"{"enabled": true, "type": "domain", "value": "example.com"}"#)
        ));
    }

    #[wasm_bindgen_test]
    fn plan_removes_installed_ids() {
        let config = parse(
            r#"{"noobheaders_global_enabled": true, "noobheaders_active_profile": "p",
                "noobheaders_profiles": [{"id": "p", "name": "P", "headers": [
                    {"enabled": true, "type": "request", "name": "X-Test", "value": "v"}
                ], "filters": []}]}"#,
        );
        let update = plan_rule_update(config, parse("[3, 4]")).expect("plan");
        let update: nh_compiler::RuleUpdate = from_js(&update, "update").expect("round trip");
        assert_eq!(update.remove_rule_ids, vec![3, 4]);
        assert_eq!(update.add_rules.len(), 1);
    }

    #[wasm_bindgen_test]
    fn stale_stored_kind_agrees_between_badge_and_rules() {
        let stored = r#"{"noobheaders_global_enabled": true, "noobheaders_active_profile": "a",
            "noobheaders_profiles": [
                {"id": "a", "name": "A", "enabled": false, "headers": [], "filters": []},
                {"id": "p", "name": "P", "enabled": true, "headers": [
                    {"enabled": true, "type": "request", "name": "X-Test", "value": "v"}
                ], "filters": [{"enabled": true, "type": "url", "value": "example.com"}]}
            ]}"#;

        let update = plan_rule_update(parse(stored), JsValue::NULL).expect("plan");
        let update: nh_compiler::RuleUpdate = from_js(&update, "update").expect("round trip");
        assert_eq!(update.add_rules.len(), 1);
        assert_eq!(
            update.add_rules[0].condition.request_domains,
            Some(vec!["example.com".to_string()])
        );

        let url = Some("https://example.com/".to_string());
        assert_eq!(badge_count(parse(stored), url).expect("badge"), 1);
        assert_eq!(
            auto_switch(parse(stored), "https://example.com/").expect("switch").as_deref(),
            Some("p")
        );

        let profiles = r#"[{"id": "p", "name": "P", "enabled": false, "headers": [],
            "filters": [{"enabled": true, "type": "url", "value": "example.com"}]}]"#;
        assert_eq!(
            select_profile_for_url(parse(profiles), "https://example.com/").expect("select").as_deref(),
            Some("p")
        );
    }

    #[wasm_bindgen_test]
    fn import_rejects_non_array() {
        assert!(import_profiles(r#"{"id": "a"}"#).is_err());
    }
}
