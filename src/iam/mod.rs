//! Identity and Access Management (IAM) policy evaluation
//!
//! Provides AWS-style access control with:
//! - JSON policy documents validated per policy type (identity, resource, trust)
//! - Allow/Deny statements with explicit deny precedence
//! - Wildcard and ARN matching for actions and resources
//! - Condition evaluation (String, Arn, Numeric, Date, Bool, IP, Null) with
//!   `ForAllValues` / `ForAnyValue` / `IfExists` qualifiers
//! - Principal matching and `${...}` policy variables
//! - LRU caching of compiled patterns

mod arn;
pub(crate) mod cache;
mod condition;
mod context;
mod engine;
mod pattern;
mod policy;
mod principal;
mod validate;
mod variables;

pub use arn::{account_id, arn_match, arn_wildcards, validate_arn};
pub use cache::PatternCache;
pub use condition::{condition_matches, ConditionKey, ConditionOperator, SetQualifier};
pub use context::{ContextValue, RequestContext, ACTION_KEY, PRINCIPAL_KEY, RESOURCE_KEY};
pub use engine::{action_matches, resource_matches, Decision, PolicyEngine};
pub use pattern::{wildcard_match, PatternMatcher};
pub use policy::{
    ConditionBlock, Effect, Policy, PolicyType, PolicyVersion, PrincipalSpec, Statement,
    StringOrList,
};
pub use principal::principal_matches;
pub use validate::{parse_policy, validate_policy};
pub use variables::{apply_variables, get_policy_variables};
