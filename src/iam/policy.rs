//! IAM Policy document structure
//!
//! Mirrors the AWS IAM JSON policy grammar. Elements that accept either a
//! single string or a list of strings are modelled as [`StringOrList`].

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Condition block: operator key -> (context key -> comparison values)
pub type ConditionBlock = BTreeMap<String, BTreeMap<String, StringOrList>>;

/// Effect of a policy statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Allow the action
    Allow,
    /// Deny the action (takes precedence over Allow)
    Deny,
}

/// Supported policy language versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyVersion {
    #[serde(rename = "2012-10-17")]
    V2012_10_17,
    #[serde(rename = "2008-10-17")]
    V2008_10_17,
}

impl PolicyVersion {
    /// Wire literals accepted in the `Version` element
    pub const ALLOWED: [&'static str; 2] = ["2012-10-17", "2008-10-17"];

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyVersion::V2012_10_17 => "2012-10-17",
            PolicyVersion::V2008_10_17 => "2008-10-17",
        }
    }
}

/// Kind of policy, deciding which elements a statement must or must not carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PolicyType {
    #[default]
    #[serde(rename = "IDENTITY_POLICY", alias = "identity")]
    Identity,
    #[serde(rename = "RESOURCE_POLICY", alias = "resource")]
    Resource,
    #[serde(rename = "TRUST_POLICY", alias = "trust")]
    Trust,
}

impl PolicyType {
    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            PolicyType::Identity => "Identity Policy",
            PolicyType::Resource => "Resource-based Policy",
            PolicyType::Trust => "Trust Policy",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyType::Identity => "IDENTITY_POLICY",
            PolicyType::Resource => "RESOURCE_POLICY",
            PolicyType::Trust => "TRUST_POLICY",
        }
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for PolicyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "identity" | "identity_policy" | "identity-based" => Ok(PolicyType::Identity),
            "resource" | "resource_policy" | "resource-based" => Ok(PolicyType::Resource),
            "trust" | "trust_policy" => Ok(PolicyType::Trust),
            _ => Err(format!(
                "Invalid policy type '{}'. Valid options: identity, resource, trust",
                s
            )),
        }
    }
}

/// A single string or a list of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    Single(String),
    List(Vec<String>),
}

impl StringOrList {
    /// View as a list; a single value becomes a list of one
    pub fn as_slice(&self) -> &[String] {
        match self {
            StringOrList::Single(value) => std::slice::from_ref(value),
            StringOrList::List(values) => values,
        }
    }

    pub fn as_single(&self) -> Option<&str> {
        match self {
            StringOrList::Single(value) => Some(value),
            StringOrList::List(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            StringOrList::Single(value) => value.is_empty(),
            StringOrList::List(values) => values.is_empty(),
        }
    }
}

impl From<&str> for StringOrList {
    fn from(value: &str) -> Self {
        StringOrList::Single(value.to_string())
    }
}

impl From<String> for StringOrList {
    fn from(value: String) -> Self {
        StringOrList::Single(value)
    }
}

impl From<Vec<String>> for StringOrList {
    fn from(values: Vec<String>) -> Self {
        StringOrList::List(values)
    }
}

impl From<Vec<&str>> for StringOrList {
    fn from(values: Vec<&str>) -> Self {
        StringOrList::List(values.into_iter().map(str::to_string).collect())
    }
}

/// `Principal` / `NotPrincipal` value: the literal `"*"` or a kind -> value mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrincipalSpec {
    /// Any string literal; only `"*"` is meaningful, others fail at evaluation
    Literal(String),
    /// `AWS`, `Service`, `Federated`, `CanonicalUser` or a custom kind
    Mapping(BTreeMap<String, StringOrList>),
}

impl PrincipalSpec {
    pub fn any() -> Self {
        PrincipalSpec::Literal("*".to_string())
    }

    pub fn aws(value: impl Into<StringOrList>) -> Self {
        Self::kind("AWS", value)
    }

    pub fn service(value: impl Into<StringOrList>) -> Self {
        Self::kind("Service", value)
    }

    pub fn kind(kind: &str, value: impl Into<StringOrList>) -> Self {
        let mut mapping = BTreeMap::new();
        mapping.insert(kind.to_string(), value.into());
        PrincipalSpec::Mapping(mapping)
    }
}

/// Condition value as written in a document; bare booleans and numbers are
/// read in their string form
#[derive(Deserialize)]
#[serde(untagged)]
enum RawConditionValue {
    Scalar(RawScalar),
    List(Vec<RawScalar>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScalar {
    String(String),
    Bool(bool),
    Number(serde_json::Number),
}

impl From<RawScalar> for String {
    fn from(scalar: RawScalar) -> Self {
        match scalar {
            RawScalar::String(value) => value,
            RawScalar::Bool(value) => value.to_string(),
            RawScalar::Number(value) => value.to_string(),
        }
    }
}

impl From<RawConditionValue> for StringOrList {
    fn from(raw: RawConditionValue) -> Self {
        match raw {
            RawConditionValue::Scalar(value) => StringOrList::Single(value.into()),
            RawConditionValue::List(values) => {
                StringOrList::List(values.into_iter().map(String::from).collect())
            }
        }
    }
}

fn deserialize_condition<'de, D>(deserializer: D) -> Result<Option<ConditionBlock>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, BTreeMap<String, RawConditionValue>>> =
        Option::deserialize(deserializer)?;

    Ok(raw.map(|block| {
        block
            .into_iter()
            .map(|(operator, entries)| {
                let entries = entries
                    .into_iter()
                    .map(|(key, value)| (key, StringOrList::from(value)))
                    .collect();
                (operator, entries)
            })
            .collect()
    }))
}

/// A single policy statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Statement {
    /// Statement ID (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    /// Effect of this statement
    pub effect: Effect,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<PrincipalSpec>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_principal: Option<PrincipalSpec>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<StringOrList>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_action: Option<StringOrList>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<StringOrList>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_resource: Option<StringOrList>,

    /// Optional conditions for when this statement applies
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_condition"
    )]
    pub condition: Option<ConditionBlock>,
}

impl Statement {
    /// Create a new statement with actions and resources
    pub fn new(
        effect: Effect,
        action: impl Into<StringOrList>,
        resource: impl Into<StringOrList>,
    ) -> Self {
        Statement {
            sid: None,
            effect,
            principal: None,
            not_principal: None,
            action: Some(action.into()),
            not_action: None,
            resource: Some(resource.into()),
            not_resource: None,
            condition: None,
        }
    }

    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn with_principal(mut self, principal: PrincipalSpec) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Add one `operator: { key: values }` entry to the condition block
    pub fn with_condition(
        mut self,
        operator: &str,
        key: &str,
        values: impl Into<StringOrList>,
    ) -> Self {
        self.condition
            .get_or_insert_with(BTreeMap::new)
            .entry(operator.to_string())
            .or_default()
            .insert(key.to_string(), values.into());
        self
    }
}

/// Complete IAM policy document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Policy {
    /// Policy language version
    pub version: PolicyVersion,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// List of policy statements
    pub statement: Vec<Statement>,
}

impl Policy {
    /// Create a new empty policy (invalid until a statement is added)
    pub fn new() -> Self {
        Policy {
            version: PolicyVersion::V2012_10_17,
            id: None,
            statement: Vec::new(),
        }
    }

    /// Add a statement to this policy
    pub fn add_statement(&mut self, statement: Statement) {
        self.statement.push(statement);
    }

    /// Parse policy from JSON string (no validation)
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize policy to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::new()
    }
}
