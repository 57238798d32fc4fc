//! # IAM Policy Engine - AWS-style authorization decisions
//!
//! `iam-policy-engine` evaluates AWS IAM JSON policies against simulated
//! requests and returns [`Decision::Allow`], [`Decision::Deny`] or
//! [`Decision::ImplicitDeny`].
//!
//! - **Validation** per policy type (identity, resource, trust) at construction
//! - **Matching** of actions, resource ARNs and principals with `*` / `?` wildcards
//! - **Conditions**: String, Arn, Numeric, Date, Bool, IpAddress and Null
//!   operators with `ForAllValues:`, `ForAnyValue:` and `IfExists`
//! - **Policy variables** such as `${aws:username}` resolved per request
//!
//! ## Quick Start
//!
//! ```rust
//! use iam_policy_engine::{Decision, PolicyEngine, PolicyType, RequestContext, Result};
//! use serde_json::json;
//!
//! # fn main() -> Result<()> {
//! let engine = PolicyEngine::new(
//!     json!({
//!         "Version": "2012-10-17",
//!         "Statement": [
//!             {"Effect": "Allow", "Action": "*", "Resource": "*"},
//!             {
//!                 "Effect": "Deny",
//!                 "Action": ["ec2:*", "s3:*"],
//!                 "Resource": "*",
//!                 "Condition": {"StringEquals": {"aws:PrincipalTag/department": "hr"}}
//!             }
//!         ]
//!     }),
//!     PolicyType::Identity,
//! )?;
//!
//! let request = RequestContext::for_request("s3:GetObject", "arn:aws:s3:::reports/q1.csv")
//!     .with("aws:PrincipalTag/department", "hr");
//! assert_eq!(engine.evaluate(&request)?, Decision::Deny);
//!
//! let request = RequestContext::for_request("s3:GetObject", "arn:aws:s3:::reports/q1.csv")
//!     .with("aws:PrincipalTag/department", "engineering");
//! assert_eq!(engine.evaluate(&request)?, Decision::Allow);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod iam;

pub use config::EngineConfig;
pub use error::{
    ArnError, EvalResult, EvaluationError, IamError, Result, StatementFault, ValidationError,
};
pub use iam::{
    ContextValue, Decision, Effect, Policy, PolicyEngine, PolicyType, PrincipalSpec,
    RequestContext, Statement, StringOrList,
};
