//! File-backed configuration store and rule layer
//!
//! The store file holds the same three keys the extension keeps in browser
//! storage. The rules file stands in for the browser's dynamic rule set.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use nh_compiler::{CompiledRule, ConfigStore, RuleLayer, RuleLayerError, RuleUpdate, StoreError};
use nh_core::GlobalConfig;

/// Dynamic rule cap the browser enforces for header-modifying rules.
pub const DYNAMIC_RULE_LIMIT: usize = 5000;

/// Write `contents` next to `path` and rename it into place.
async fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await
}

/// Read a file, treating a missing or blank file as absent.
async fn read_optional(path: &Path) -> std::io::Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) if text.trim().is_empty() => Ok(None),
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

// =============================================================================
// Store
// =============================================================================

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::metadata(&self.path).await.is_ok()
    }
}

#[async_trait]
impl ConfigStore for FileStore {
    /// A missing store reads as an empty configuration.
    async fn load(&self) -> Result<GlobalConfig, StoreError> {
        let text = read_optional(&self.path)
            .await
            .map_err(|e| StoreError::Read(format!("{}: {}", self.path.display(), e)))?;
        match text {
            Some(text) => serde_json::from_str(&text)
                .map_err(|e| StoreError::Malformed(format!("{}: {}", self.path.display(), e))),
            None => Ok(GlobalConfig::default()),
        }
    }

    async fn save(&self, config: &GlobalConfig) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(config).map_err(|e| StoreError::Write(e.to_string()))?;
        write_atomic(&self.path, &text)
            .await
            .map_err(|e| StoreError::Write(format!("{}: {}", self.path.display(), e)))?;
        log::debug!("saved configuration to {}", self.path.display());
        Ok(())
    }
}

// =============================================================================
// Rule Layer
// =============================================================================

pub struct FileRuleLayer {
    path: PathBuf,
    limit: usize,
}

impl FileRuleLayer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            limit: DYNAMIC_RULE_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub async fn installed_rules(&self) -> Result<Vec<CompiledRule>, RuleLayerError> {
        let text = read_optional(&self.path)
            .await
            .map_err(|e| RuleLayerError::Read(format!("{}: {}", self.path.display(), e)))?;
        match text {
            Some(text) => serde_json::from_str(&text)
                .map_err(|e| RuleLayerError::Read(format!("{}: {}", self.path.display(), e))),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl RuleLayer for FileRuleLayer {
    async fn installed_rule_ids(&self) -> Result<Vec<u32>, RuleLayerError> {
        Ok(self.installed_rules().await?.iter().map(|r| r.id).collect())
    }

    /// Validates the whole update before writing, so a rejected update
    /// leaves the file untouched.
    async fn update_rules(&self, update: &RuleUpdate) -> Result<(), RuleLayerError> {
        let mut rules = self.installed_rules().await?;
        rules.retain(|r| !update.remove_rule_ids.contains(&r.id));

        for rule in &update.add_rules {
            if rules.iter().any(|r| r.id == rule.id) {
                return Err(RuleLayerError::Rejected(format!("duplicate rule id {}", rule.id)));
            }
            rules.push(rule.clone());
        }
        if rules.len() > self.limit {
            return Err(RuleLayerError::Rejected(format!(
                "{} rules exceed the limit of {}",
                rules.len(),
                self.limit
            )));
        }

        let text = serde_json::to_string_pretty(&rules).map_err(|e| RuleLayerError::Rejected(e.to_string()))?;
        write_atomic(&self.path, &text)
            .await
            .map_err(|e| RuleLayerError::Rejected(format!("{}: {}", self.path.display(), e)))
    }
}
