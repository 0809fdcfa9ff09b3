//! Declarative header-modification rule types
//!
//! These types serialize to exactly the JSON shape the browser's dynamic rule
//! API accepts, so a compiled batch can be handed over without translation.

use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Priority shared by every compiled rule.
pub const RULE_PRIORITY: u32 = 1;

/// URL filter used when a rule has no URL-pattern restriction.
pub const MATCH_ALL_URL_FILTER: &str = "*://*/*";

// =============================================================================
// Resource Types
// =============================================================================

bitflags::bitflags! {
    /// Resource kinds a rule condition applies to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceTypes: u16 {
        const MAIN_FRAME = 1 << 0;
        const SUB_FRAME = 1 << 1;
        const STYLESHEET = 1 << 2;
        const SCRIPT = 1 << 3;
        const IMAGE = 1 << 4;
        const FONT = 1 << 5;
        const OBJECT = 1 << 6;
        const XMLHTTPREQUEST = 1 << 7;
        const PING = 1 << 8;
        const CSP_REPORT = 1 << 9;
        const MEDIA = 1 << 10;
        const WEBSOCKET = 1 << 11;
        const OTHER = 1 << 12;

        /// Every kind; filters never narrow by resource type
        const ALL = 0x1FFF;
    }
}

const RESOURCE_TYPE_NAMES: [(ResourceTypes, &str); 13] = [
    (ResourceTypes::MAIN_FRAME, "main_frame"),
    (ResourceTypes::SUB_FRAME, "sub_frame"),
    (ResourceTypes::STYLESHEET, "stylesheet"),
    (ResourceTypes::SCRIPT, "script"),
    (ResourceTypes::IMAGE, "image"),
    (ResourceTypes::FONT, "font"),
    (ResourceTypes::OBJECT, "object"),
    (ResourceTypes::XMLHTTPREQUEST, "xmlhttprequest"),
    (ResourceTypes::PING, "ping"),
    (ResourceTypes::CSP_REPORT, "csp_report"),
    (ResourceTypes::MEDIA, "media"),
    (ResourceTypes::WEBSOCKET, "websocket"),
    (ResourceTypes::OTHER, "other"),
];

impl ResourceTypes {
    /// Parse a browser resource type name.
    pub fn from_browser_name(name: &str) -> Option<Self> {
        RESOURCE_TYPE_NAMES
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(flag, _)| *flag)
    }

    /// Browser names of the set kinds, in canonical order.
    pub fn browser_names(self) -> impl Iterator<Item = &'static str> {
        RESOURCE_TYPE_NAMES
            .iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
    }
}

impl Serialize for ResourceTypes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.bits().count_ones() as usize))?;
        for name in self.browser_names() {
            seq.serialize_element(name)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for ResourceTypes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        let mut mask = ResourceTypes::empty();
        for name in &names {
            mask |= ResourceTypes::from_browser_name(name)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown resource type: {name}")))?;
        }
        Ok(mask)
    }
}

// =============================================================================
// Actions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderOperation {
    Set,
    Remove,
}

/// One header edit inside a rule action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderOp {
    pub header: String,
    pub operation: HeaderOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl HeaderOp {
    /// `Set` for a non-empty value, `Remove` otherwise.
    pub fn for_value(header: &str, value: &str) -> Self {
        if value.is_empty() {
            Self {
                header: header.to_string(),
                operation: HeaderOperation::Remove,
                value: None,
            }
        } else {
            Self {
                header: header.to_string(),
                operation: HeaderOperation::Set,
                value: Some(value.to_string()),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    #[serde(rename = "modifyHeaders")]
    ModifyHeaders,
}

/// Rule action. Exactly one of the two header lists is populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub kind: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_headers: Option<Vec<HeaderOp>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<Vec<HeaderOp>>,
}

impl RuleAction {
    pub fn request(op: HeaderOp) -> Self {
        Self {
            kind: ActionType::ModifyHeaders,
            request_headers: Some(vec![op]),
            response_headers: None,
        }
    }

    pub fn response(op: HeaderOp) -> Self {
        Self {
            kind: ActionType::ModifyHeaders,
            request_headers: None,
            response_headers: Some(vec![op]),
        }
    }
}

// =============================================================================
// Conditions
// =============================================================================

/// Where a rule applies.
///
/// `request_domains` restricts the destination host of the request and is
/// combined with `url_filter` as an AND.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    pub url_filter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_domains: Option<Vec<String>>,
    pub resource_types: ResourceTypes,
}

// =============================================================================
// Rules
// =============================================================================

/// A network-layer-ready rule: one header action plus its condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledRule {
    pub id: u32,
    pub priority: u32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}
