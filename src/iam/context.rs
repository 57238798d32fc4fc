//! Request context passed to `evaluate`
//!
//! A flat JSON object. The keys `action`, `resource` and `principal` are
//! reserved; every other key is a condition-context variable such as
//! `aws:SourceIp` or `aws:PrincipalTag/department`.

use super::policy::StringOrList;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved key holding the requested `service:Verb` action
pub const ACTION_KEY: &str = "action";
/// Reserved key holding the requested resource ARN
pub const RESOURCE_KEY: &str = "resource";
/// Reserved key holding the principal-kind mapping
pub const PRINCIPAL_KEY: &str = "principal";

/// Value stored under a context key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    String(String),
    List(Vec<String>),
    Principal(BTreeMap<String, StringOrList>),
    Null,
}

impl ContextValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ContextValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Present in the sense of the `Null` operator: non-null and non-empty
    pub fn has_content(&self) -> bool {
        match self {
            ContextValue::String(s) => !s.is_empty(),
            ContextValue::List(values) => !values.is_empty(),
            ContextValue::Principal(kinds) => !kinds.is_empty(),
            ContextValue::Null => false,
        }
    }

    /// JavaScript-like truthiness: null and the empty string are falsy
    pub(crate) fn is_truthy(&self) -> bool {
        match self {
            ContextValue::String(s) => !s.is_empty(),
            ContextValue::Null => false,
            ContextValue::List(_) | ContextValue::Principal(_) => true,
        }
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::String(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::String(value)
    }
}

impl From<Vec<&str>> for ContextValue {
    fn from(values: Vec<&str>) -> Self {
        ContextValue::List(values.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for ContextValue {
    fn from(values: Vec<String>) -> Self {
        ContextValue::List(values)
    }
}

/// Simulated request evaluated against a policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestContext {
    entries: BTreeMap<String, ContextValue>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context for `action` on `resource`
    pub fn for_request(action: &str, resource: &str) -> Self {
        Self::new().with_action(action).with_resource(resource)
    }

    pub fn with_action(self, action: &str) -> Self {
        self.with(ACTION_KEY, action)
    }

    pub fn with_resource(self, resource: &str) -> Self {
        self.with(RESOURCE_KEY, resource)
    }

    /// Set the principal of one kind (`AWS`, `Service`, ...)
    pub fn with_principal(mut self, kind: &str, value: impl Into<StringOrList>) -> Self {
        let entry = self
            .entries
            .entry(PRINCIPAL_KEY.to_string())
            .or_insert_with(|| ContextValue::Principal(BTreeMap::new()));
        if !matches!(entry, ContextValue::Principal(_)) {
            *entry = ContextValue::Principal(BTreeMap::new());
        }
        if let ContextValue::Principal(kinds) = entry {
            kinds.insert(kind.to_string(), value.into());
        }
        self
    }

    /// Set an arbitrary context key
    pub fn with(mut self, key: &str, value: impl Into<ContextValue>) -> Self {
        self.entries.insert(key.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ContextValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Requested action; an absent or non-string action reads as empty
    pub fn action(&self) -> &str {
        self.get_str(ACTION_KEY).unwrap_or("")
    }

    /// Requested resource, if a non-empty string was supplied
    pub fn resource(&self) -> Option<&str> {
        self.get_str(RESOURCE_KEY).filter(|r| !r.is_empty())
    }

    pub fn principal(&self) -> Option<&BTreeMap<String, StringOrList>> {
        match self.entries.get(PRINCIPAL_KEY) {
            Some(ContextValue::Principal(kinds)) => Some(kinds),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(ContextValue::as_str)
    }

    /// True when the key is absent, null or an empty string
    pub(crate) fn is_missing(&self, key: &str) -> bool {
        !self.entries.get(key).is_some_and(ContextValue::is_truthy)
    }
}
