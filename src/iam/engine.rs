//! Policy evaluation engine with deny precedence
//!
//! Evaluates a validated IAM policy against simulated requests.
//! Key features:
//! - Explicit deny takes precedence over allow
//! - No matching statement yields an implicit deny, distinct from explicit deny
//! - Policy variables are resolved per request
//! - Compiled wildcard patterns are cached across evaluations

use super::arn::arn_match_cached;
use super::condition::condition_matches_with;
use super::context::RequestContext;
use super::pattern::PatternMatcher;
use super::policy::{Effect, Policy, PolicyType, Statement, StringOrList};
use super::principal::principal_matches;
use super::validate::parse_policy;
use super::variables::{apply_variables, get_policy_variables};
use crate::config::EngineConfig;
use crate::error::{EvalResult, EvaluationError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{debug, trace};

/// Outcome of evaluating a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    /// At least one Allow statement matched and no Deny did
    Allow,
    /// A Deny statement matched
    Deny,
    /// No statement matched
    ImplicitDeny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "Allow",
            Decision::Deny => "Deny",
            Decision::ImplicitDeny => "ImplicitDeny",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Some(true)` for allow, `Some(false)` for explicit deny, `None` for implicit deny
impl From<Decision> for Option<bool> {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Allow => Some(true),
            Decision::Deny => Some(false),
            Decision::ImplicitDeny => None,
        }
    }
}

/// Validated policy bound to its policy type
///
/// Immutable after construction; `evaluate` takes `&self` and the engine can
/// be shared across threads.
#[derive(Debug)]
pub struct PolicyEngine {
    policy: Policy,
    policy_type: PolicyType,
    matcher: PatternMatcher,
}

impl PolicyEngine {
    /// Validate `document` as a policy of `policy_type`
    ///
    /// # Examples
    ///
    /// ```
    /// use iam_policy_engine::{Decision, PolicyEngine, PolicyType, RequestContext};
    /// use serde_json::json;
    ///
    /// let engine = PolicyEngine::new(
    ///     json!({
    ///         "Version": "2012-10-17",
    ///         "Statement": [{
    ///             "Effect": "Allow",
    ///             "Action": "s3:ListBucket",
    ///             "Resource": "arn:aws:s3:::amzn-s3-demo-bucket"
    ///         }]
    ///     }),
    ///     PolicyType::Identity,
    /// )
    /// .unwrap();
    ///
    /// let ctx = RequestContext::for_request("s3:ListBucket", "arn:aws:s3:::amzn-s3-demo-bucket");
    /// assert_eq!(engine.evaluate(&ctx).unwrap(), Decision::Allow);
    ///
    /// let ctx = RequestContext::for_request("s3:GetObject", "arn:aws:s3:::amzn-s3-demo-bucket");
    /// assert_eq!(engine.evaluate(&ctx).unwrap(), Decision::ImplicitDeny);
    /// ```
    pub fn new(document: Value, policy_type: PolicyType) -> Result<Self> {
        Self::build(&document, policy_type, EngineConfig::default().pattern_cache_capacity)
    }

    /// Validate `document` using the policy type and cache size from `config`
    pub fn with_config(document: Value, config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        Self::build(&document, config.policy_type, config.pattern_cache_capacity)
    }

    pub fn from_json(json: &str, policy_type: PolicyType) -> Result<Self> {
        let document: Value = serde_json::from_str(json)?;
        Self::new(document, policy_type)
    }

    /// Validate an already typed policy
    pub fn from_policy(policy: &Policy, policy_type: PolicyType) -> Result<Self> {
        Self::new(serde_json::to_value(policy)?, policy_type)
    }

    fn build(document: &Value, policy_type: PolicyType, cache_capacity: usize) -> Result<Self> {
        let policy = parse_policy(document, policy_type)?;
        debug!(
            "Loaded {} with {} statement(s)",
            policy_type.display_name(),
            policy.statement.len()
        );

        Ok(PolicyEngine {
            policy,
            policy_type,
            matcher: PatternMatcher::new(cache_capacity),
        })
    }

    /// Evaluate a request against the policy
    ///
    /// Statements are scanned in order; the first fully matching Deny ends the
    /// scan. Any evaluation error aborts the call.
    pub fn evaluate(&self, context: &RequestContext) -> EvalResult<Decision> {
        let statements = apply_variables(&self.policy.statement, context)?;

        let mut allowed = false;
        for (index, statement) in statements.iter().enumerate() {
            if !self.statement_matches(statement, context)? {
                trace!("Statement {} does not apply", index);
                continue;
            }

            match statement.effect {
                Effect::Deny => {
                    debug!("Explicit deny by statement {} for '{}'", index, context.action());
                    return Ok(Decision::Deny);
                }
                Effect::Allow => {
                    trace!("Statement {} allows '{}'", index, context.action());
                    allowed = true;
                }
            }
        }

        let decision = if allowed {
            Decision::Allow
        } else {
            Decision::ImplicitDeny
        };
        debug!("Decision for '{}': {}", context.action(), decision);
        Ok(decision)
    }

    /// Every present element is evaluated before the outcome is combined so
    /// that malformed elements raise even when another element already failed
    fn statement_matches(&self, statement: &Statement, context: &RequestContext) -> EvalResult<bool> {
        let mut outcome = true;

        if let Some(actions) = &statement.action {
            outcome &= actions_match(&self.matcher, context.action(), actions)?;
        }
        if let Some(actions) = &statement.not_action {
            outcome &= !actions_match(&self.matcher, context.action(), actions)?;
        }
        if let Some(resources) = &statement.resource {
            outcome &= context
                .resource()
                .is_some_and(|resource| resources_match(&self.matcher, resource, resources));
        }
        if let Some(resources) = &statement.not_resource {
            outcome &= context
                .resource()
                .is_some_and(|resource| !resources_match(&self.matcher, resource, resources));
        }
        if let Some(principal) = &statement.principal {
            outcome &= principal_matches(context, principal)?;
        }
        if let Some(principal) = &statement.not_principal {
            outcome &= !principal_matches(context, principal)?;
        }

        // conditions only run once everything else matched
        if outcome {
            if let Some(condition) = &statement.condition {
                outcome = condition_matches_with(&self.matcher, context, condition)?;
            }
        }

        Ok(outcome)
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn policy_type(&self) -> PolicyType {
        self.policy_type
    }

    /// Names of the `${...}` variables the policy refers to
    pub fn policy_variables(&self) -> Vec<String> {
        serde_json::to_string(&self.policy.statement)
            .map(|json| get_policy_variables(&json))
            .unwrap_or_default()
    }

    /// Number of compiled patterns currently cached
    pub fn cache_size(&self) -> usize {
        self.matcher.cache().len()
    }

    pub fn clear_cache(&self) {
        self.matcher.cache().clear();
    }
}

/// Match a requested `service:Verb` action against an `Action` element
///
/// ```
/// use iam_policy_engine::iam::{action_matches, StringOrList};
///
/// let actions = StringOrList::from(vec!["s3:Get*", "s3:List*"]);
/// assert!(action_matches("s3:GetObject", &actions).unwrap());
/// assert!(!action_matches("s3:PutObject", &actions).unwrap());
/// ```
pub fn action_matches(action: &str, actions: &StringOrList) -> EvalResult<bool> {
    actions_match(&PatternMatcher::new(16), action, actions)
}

/// Match a requested resource ARN against a `Resource` element
pub fn resource_matches(resource: &str, resources: &StringOrList) -> bool {
    resources_match(&PatternMatcher::new(16), resource, resources)
}

fn actions_match(matcher: &PatternMatcher, requested: &str, actions: &StringOrList) -> EvalResult<bool> {
    for action in actions.as_slice() {
        if action_pattern_matches(matcher, requested, action)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn action_pattern_matches(matcher: &PatternMatcher, requested: &str, pattern: &str) -> EvalResult<bool> {
    if pattern == "*" {
        return Ok(true);
    }

    let Some((service, verb)) = pattern.split_once(':') else {
        return Err(EvaluationError::InvalidAction(pattern.to_string()));
    };

    if service.contains('*') {
        return Err(EvaluationError::InvalidService(service.to_string()));
    }
    if service.is_empty() {
        return Err(EvaluationError::InvalidAction(pattern.to_string()));
    }

    let verb = verb.split(':').next().unwrap_or_default();
    if verb.is_empty() {
        return Err(EvaluationError::InvalidAction(pattern.to_string()));
    }

    Ok(matcher.matches(pattern, requested, false))
}

fn resources_match(matcher: &PatternMatcher, requested: &str, resources: &StringOrList) -> bool {
    resources.as_slice().iter().any(|resource| match resource.as_str() {
        "" => false,
        "*" => true,
        pattern => arn_match_cached(matcher, pattern, requested),
    })
}
