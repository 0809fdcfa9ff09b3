//! Rule orchestration
//!
//! Reads the configuration store, compiles the contributing profiles and
//! replaces the network layer's dynamic rule set in one update. Every trigger
//! (store change or explicit request) funnels into [`Orchestrator::recompute`],
//! which is idempotent: the last completed write wins.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use nh_core::types::{GlobalConfig, StorageKey};

use crate::compiler::compile_config;
use crate::rule::CompiledRule;

/// Message action that requests an explicit recompute.
pub const UPDATE_RULES_ACTION: &str = "updateRules";

// =============================================================================
// Errors
// =============================================================================

/// Error type for configuration store access.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read configuration: {0}")]
    Read(String),
    #[error("Failed to write configuration: {0}")]
    Write(String),
    #[error("Malformed configuration: {0}")]
    Malformed(String),
}

/// Error type for network rule layer access.
#[derive(Debug, thiserror::Error)]
pub enum RuleLayerError {
    #[error("Failed to read installed rules: {0}")]
    Read(String),
    #[error("Rule update rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    RuleLayer(#[from] RuleLayerError),
}

// =============================================================================
// Collaborators
// =============================================================================

/// Key-value persistence holding the configuration document.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load(&self) -> Result<GlobalConfig, StoreError>;
    async fn save(&self, config: &GlobalConfig) -> Result<(), StoreError>;
}

/// Declarative header-modification engine holding the dynamic rule set.
#[async_trait]
pub trait RuleLayer: Send + Sync {
    async fn installed_rule_ids(&self) -> Result<Vec<u32>, RuleLayerError>;
    /// Apply removals and additions as one logical operation.
    async fn update_rules(&self, update: &RuleUpdate) -> Result<(), RuleLayerError>;
}

// =============================================================================
// Planning
// =============================================================================

/// Full replacement of the dynamic rule set, in the browser's update shape.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUpdate {
    pub remove_rule_ids: Vec<u32>,
    pub add_rules: Vec<CompiledRule>,
}

/// Plan the update replacing `installed` with the rules for `config`.
pub fn plan_rule_update(config: &GlobalConfig, installed: &[u32]) -> RuleUpdate {
    RuleUpdate {
        remove_rule_ids: installed.to_vec(),
        add_rules: compile_config(config),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecomputeOutcome {
    /// Rules now installed
    pub installed: usize,
    /// Previously installed rules that were removed
    pub removed: usize,
}

/// Why a recompute may be needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// The store reported changes to these keys
    ConfigChanged(Vec<StorageKey>),
    /// Explicit "update rules" request
    UpdateRules,
}

impl Trigger {
    /// Parse a runtime message action.
    pub fn from_message(action: &str) -> Option<Self> {
        match action {
            UPDATE_RULES_ACTION => Some(Self::UpdateRules),
            _ => None,
        }
    }

    /// Build a change trigger from raw store keys, ignoring unrelated keys.
    pub fn from_changed_keys<'a, I>(keys: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::ConfigChanged(keys.into_iter().filter_map(StorageKey::from_key).collect())
    }

    pub fn requires_recompute(&self) -> bool {
        match self {
            Self::ConfigChanged(keys) => !keys.is_empty(),
            Self::UpdateRules => true,
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

pub struct Orchestrator<S, L> {
    store: S,
    layer: L,
}

impl<S: ConfigStore, L: RuleLayer> Orchestrator<S, L> {
    pub fn new(store: S, layer: L) -> Self {
        Self { store, layer }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn layer(&self) -> &L {
        &self.layer
    }

    /// Replace the installed rule set with the one compiled from the store.
    ///
    /// On failure the previous rule set is left as the network layer holds
    /// it; nothing is retried.
    pub async fn recompute(&self) -> Result<RecomputeOutcome, OrchestratorError> {
        let result = self.try_recompute().await;
        match &result {
            Ok(outcome) => log::info!(
                "installed {} rules (removed {})",
                outcome.installed,
                outcome.removed
            ),
            Err(e) => log::warn!("rule recompute failed: {}", e),
        }
        result
    }

    async fn try_recompute(&self) -> Result<RecomputeOutcome, OrchestratorError> {
        let mut config = self.store.load().await?;
        config.normalize();

        let installed = self.layer.installed_rule_ids().await?;
        let update = plan_rule_update(&config, &installed);
        self.layer.update_rules(&update).await?;

        Ok(RecomputeOutcome {
            installed: update.add_rules.len(),
            removed: update.remove_rule_ids.len(),
        })
    }

    /// Route a trigger. Returns `None` when it did not warrant a recompute.
    pub async fn handle(&self, trigger: Trigger) -> Result<Option<RecomputeOutcome>, OrchestratorError> {
        if !trigger.requires_recompute() {
            log::debug!("ignoring trigger {:?}", trigger);
            return Ok(None);
        }
        self.recompute().await.map(Some)
    }

    /// Load, edit and save the configuration.
    ///
    /// Returns the edit's result and the keys that changed; the write is
    /// skipped when nothing changed. Recomputing is left to the store-change
    /// path, see [`Orchestrator::handle`].
    pub async fn modify<T, F>(&self, edit: F) -> Result<(T, Vec<StorageKey>), OrchestratorError>
    where
        F: FnOnce(&mut GlobalConfig) -> T + Send,
        T: Send,
    {
        let before = self.store.load().await?;
        let mut after = before.clone();
        after.normalize();
        let value = edit(&mut after);

        let changed = GlobalConfig::changed_keys(&before, &after);
        if !changed.is_empty() {
            self.store.save(&after).await?;
        }
        Ok((value, changed))
    }

    /// Activate the profile selected for `url`, if it differs from the
    /// current one, and recompute when that changed the store.
    ///
    /// Returns the newly activated profile id.
    pub async fn auto_switch(&self, url: &str) -> Result<Option<String>, OrchestratorError> {
        let (switched, changed) = self
            .modify(|config| nh_core::select::auto_switch(config, url))
            .await?;
        if let Some(id) = &switched {
            log::info!("auto-switched to profile {}", id);
        }
        self.handle(Trigger::ConfigChanged(changed)).await?;
        Ok(switched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use nh_core::types::{Filter, FilterKind, Header, HeaderKind, Profile};

    #[derive(Default)]
    struct MemoryStore {
        config: Mutex<GlobalConfig>,
        saves: Mutex<usize>,
    }

    impl MemoryStore {
        fn with(config: GlobalConfig) -> Self {
            Self {
                config: Mutex::new(config),
                saves: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl ConfigStore for MemoryStore {
        async fn load(&self) -> Result<GlobalConfig, StoreError> {
            Ok(self.config.lock().unwrap().clone())
        }

        async fn save(&self, config: &GlobalConfig) -> Result<(), StoreError> {
            *self.config.lock().unwrap() = config.clone();
            *self.saves.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryLayer {
        rules: Mutex<Vec<CompiledRule>>,
        reject: bool,
    }

    #[async_trait]
    impl RuleLayer for MemoryLayer {
        async fn installed_rule_ids(&self) -> Result<Vec<u32>, RuleLayerError> {
            Ok(self.rules.lock().unwrap().iter().map(|r| r.id).collect())
        }

        async fn update_rules(&self, update: &RuleUpdate) -> Result<(), RuleLayerError> {
            if self.reject {
                return Err(RuleLayerError::Rejected("quota exceeded".to_string()));
            }
            let mut rules = self.rules.lock().unwrap();
            rules.retain(|r| !update.remove_rule_ids.contains(&r.id));
            rules.extend(update.add_rules.iter().cloned());
            Ok(())
        }
    }

    fn config(global_enabled: bool) -> GlobalConfig {
        let mut p1 = Profile::new("p1", "One");
        p1.headers.push(Header::new(HeaderKind::Request, "X-One", "1"));
        let mut p2 = Profile::new("p2", "Two");
        p2.headers.push(Header::new(HeaderKind::Request, "X-Two", "2"));
        p2.filters.push(Filter::new(FilterKind::Domain, "github.com"));
        GlobalConfig {
            global_enabled,
            active_profile_id: Some("p1".to_string()),
            profiles: vec![p1, p2],
        }
    }

    fn installed_headers(layer: &MemoryLayer) -> Vec<String> {
        layer
            .rules
            .lock()
            .unwrap()
            .iter()
            .flat_map(|r| r.action.request_headers.clone().unwrap_or_default())
            .map(|op| op.header)
            .collect()
    }

    #[tokio::test]
    async fn recompute_installs_active_profile() {
        let orchestrator = Orchestrator::new(MemoryStore::with(config(true)), MemoryLayer::default());
        let outcome = orchestrator.recompute().await.expect("recompute");
        assert_eq!(outcome, RecomputeOutcome { installed: 1, removed: 0 });
        assert_eq!(installed_headers(orchestrator.layer()), vec!["X-One"]);
    }

    #[tokio::test]
    async fn recompute_is_idempotent() {
        let orchestrator = Orchestrator::new(MemoryStore::with(config(true)), MemoryLayer::default());
        orchestrator.recompute().await.expect("first");
        let outcome = orchestrator.recompute().await.expect("second");
        assert_eq!(outcome, RecomputeOutcome { installed: 1, removed: 1 });
        assert_eq!(orchestrator.layer().rules.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn global_disable_clears_everything() {
        let store = MemoryStore::with(config(true));
        let orchestrator = Orchestrator::new(store, MemoryLayer::default());
        orchestrator.recompute().await.expect("enable");

        let (_, changed) = orchestrator
            .modify(|c| c.global_enabled = false)
            .await
            .expect("modify");
        assert_eq!(changed, vec![StorageKey::GlobalEnabled]);

        let outcome = orchestrator
            .handle(Trigger::ConfigChanged(changed))
            .await
            .expect("handle")
            .expect("recomputed");
        assert_eq!(outcome.installed, 0);
        assert!(orchestrator.layer().rules.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn enabled_profiles_override_active() {
        let mut cfg = config(true);
        cfg.profiles[1].enabled = true;
        let orchestrator = Orchestrator::new(MemoryStore::with(cfg), MemoryLayer::default());
        orchestrator.recompute().await.expect("recompute");
        assert_eq!(installed_headers(orchestrator.layer()), vec!["X-Two"]);
    }

    #[tokio::test]
    async fn rejected_update_keeps_previous_rules() {
        let layer = MemoryLayer {
            rules: Mutex::new(Vec::new()),
            reject: true,
        };
        let orchestrator = Orchestrator::new(MemoryStore::with(config(true)), layer);
        let result = orchestrator.recompute().await;
        assert!(matches!(result, Err(OrchestratorError::RuleLayer(RuleLayerError::Rejected(_)))));
        assert!(orchestrator.layer().rules.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unrelated_changes_do_not_recompute() {
        let orchestrator = Orchestrator::new(MemoryStore::with(config(true)), MemoryLayer::default());
        let trigger = Trigger::from_changed_keys(["someOtherKey"]);
        assert_eq!(orchestrator.handle(trigger).await.expect("handle"), None);
        assert!(orchestrator.layer().rules.lock().unwrap().is_empty());

        let trigger = Trigger::from_message(UPDATE_RULES_ACTION).expect("known action");
        assert!(orchestrator.handle(trigger).await.expect("handle").is_some());
    }

    #[tokio::test]
    async fn auto_switch_recomputes_on_change() {
        let orchestrator = Orchestrator::new(MemoryStore::with(config(true)), MemoryLayer::default());
        orchestrator.recompute().await.expect("initial");

        let switched = orchestrator.auto_switch("https://example.org/").await.expect("switch");
        assert_eq!(switched, None);
        assert_eq!(*orchestrator.store().saves.lock().unwrap(), 0);

        let switched = orchestrator.auto_switch("https://github.com/x").await.expect("switch");
        assert_eq!(switched.as_deref(), Some("p2"));
        assert_eq!(*orchestrator.store().saves.lock().unwrap(), 1);
        assert_eq!(installed_headers(orchestrator.layer()), vec!["X-Two"]);
    }

    #[tokio::test]
    async fn empty_store_gets_default_profile_on_modify() {
        let orchestrator = Orchestrator::new(MemoryStore::default(), MemoryLayer::default());
        let (_, changed) = orchestrator.modify(|_| ()).await.expect("modify");
        assert!(changed.contains(&StorageKey::Profiles));
        assert_eq!(orchestrator.store().config.lock().unwrap().profiles.len(), 1);
    }

    #[test]
    fn update_serializes_in_browser_shape() {
        let update = plan_rule_update(&config(true), &[4, 5]);
        let value = serde_json::to_value(&update).expect("serialize");
        assert_eq!(value["removeRuleIds"], serde_json::json!([4, 5]));
        assert_eq!(value["addRules"][0]["id"], 1);
    }
}
