//! NoobHeaders Rule Compiler
//!
//! This crate turns header profiles into declarative header-modification
//! rules and keeps the network layer's dynamic rule set in sync with the
//! configuration store.

pub mod rule;
pub mod compiler;
pub mod orchestrator;
pub mod debounce;

pub use compiler::{compile_config, compile_profile};
pub use debounce::{DebouncePolicy, Debouncer};
pub use orchestrator::{
    plan_rule_update, ConfigStore, Orchestrator, OrchestratorError, RecomputeOutcome, RuleLayer,
    RuleLayerError, RuleUpdate, StoreError, Trigger,
};
pub use rule::{CompiledRule, HeaderOp, HeaderOperation, ResourceTypes, RuleAction, RuleCondition};
