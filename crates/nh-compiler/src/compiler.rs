//! Profile to rule compilation
//!
//! Each enabled header becomes one rule per active URL-pattern filter (or a
//! single match-all rule when there are none). Emitting one rule per pattern
//! gives OR semantics across URL filters, since the network layer evaluates
//! rules independently. Domain filters are attached to every rule as a
//! destination-domain restriction.

use nh_core::select::contributing_profiles;
use nh_core::types::{Filter, FilterKind, GlobalConfig, HeaderKind, Profile};

use crate::rule::{
    CompiledRule, HeaderOp, ResourceTypes, RuleAction, RuleCondition, MATCH_ALL_URL_FILTER,
    RULE_PRIORITY,
};

/// First id handed out when compiling a whole configuration.
pub const FIRST_RULE_ID: u32 = 1;

/// Compile one profile into rules with ids starting at `id_offset`.
///
/// Ids are consumed per emitted rule, so a header fanning out over N URL
/// filters takes N ids. Returns nothing when `global_enabled` is false.
/// An offset of 0 starts at [`FIRST_RULE_ID`]; emission stops once the id
/// space is exhausted rather than wrapping.
pub fn compile_profile(profile: &Profile, global_enabled: bool, id_offset: u32) -> Vec<CompiledRule> {
    let mut rules = Vec::new();
    if !global_enabled || profile.headers.is_empty() {
        return rules;
    }

    let (url_filters, domain_filters): (Vec<&Filter>, Vec<&Filter>) = profile
        .active_filters()
        .partition(|f| f.kind == FilterKind::UrlPattern);

    let request_domains: Option<Vec<String>> = if domain_filters.is_empty() {
        None
    } else {
        Some(domain_filters.iter().map(|f| f.value.clone()).collect())
    };

    let url_filters: Vec<&str> = if url_filters.is_empty() {
        vec![MATCH_ALL_URL_FILTER]
    } else {
        url_filters.iter().map(|f| f.value.as_str()).collect()
    };

    let first_id = id_offset.max(FIRST_RULE_ID);
    let mut next_id = Some(first_id);
    'headers: for header in &profile.headers {
        if !header.enabled || header.name.is_empty() {
            continue;
        }

        let op = HeaderOp::for_value(&header.name, &header.value);
        let action = match header.kind {
            HeaderKind::Request => RuleAction::request(op),
            HeaderKind::Response => RuleAction::response(op),
        };

        for url_filter in &url_filters {
            let Some(id) = next_id else {
                log::warn!("rule ids exhausted, profile {} truncated", profile.id);
                break 'headers;
            };
            rules.push(make_rule(id, &action, url_filter, &request_domains));
            next_id = id.checked_add(1);
        }
    }

    log::debug!(
        "compiled profile {} into {} rules starting at id {}",
        profile.id,
        rules.len(),
        first_id
    );

    rules
}

fn make_rule(
    id: u32,
    action: &RuleAction,
    url_filter: &str,
    request_domains: &Option<Vec<String>>,
) -> CompiledRule {
    CompiledRule {
        id,
        priority: RULE_PRIORITY,
        action: action.clone(),
        condition: RuleCondition {
            url_filter: url_filter.to_string(),
            request_domains: request_domains.clone(),
            resource_types: ResourceTypes::ALL,
        },
    }
}

/// Compile every contributing profile of `config` into one batch.
///
/// Each profile starts one past the highest id used before it, so ids never
/// collide across the batch.
pub fn compile_config(config: &GlobalConfig) -> Vec<CompiledRule> {
    if !config.global_enabled {
        return Vec::new();
    }

    let mut rules = Vec::new();
    let mut next_id = FIRST_RULE_ID;
    for profile in contributing_profiles(config) {
        let compiled = compile_profile(profile, true, next_id);
        let exhausted = match compiled.last() {
            Some(last) => match last.id.checked_add(1) {
                Some(id) => {
                    next_id = id;
                    false
                }
                None => true,
            },
            None => false,
        };
        rules.extend(compiled);
        if exhausted {
            break;
        }
    }
    rules
}
