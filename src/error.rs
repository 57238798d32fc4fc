//! Error types for policy validation and evaluation
//!
//! Two tiers:
//! - [`ValidationError`] is raised while constructing a [`crate::PolicyEngine`]
//! - [`EvaluationError`] aborts a single `evaluate` call
//!
//! Neither tier is ever downgraded into an implicit deny.

use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, IamError>;

/// Result type for the individual matchers
pub type EvalResult<T> = std::result::Result<T, EvaluationError>;

/// Top-level error
#[derive(Error, Debug)]
pub enum IamError {
    /// Policy document rejected at construction
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Evaluation of a request failed
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Structural problems found in a policy document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid policy format: '{0}' element is missing")]
    MissingElement(&'static str),

    #[error("Incorrect policy version. Allowed: 2012-10-17, 2008-10-17")]
    UnsupportedVersion(String),

    #[error("Invalid policy format: 'Statement' must be a list of statements")]
    StatementNotList,

    #[error("Policy must have at least one statement")]
    EmptyStatement,

    /// A rule violated by one statement, identified by its index
    #[error("Invalid statement {index} format: {fault}")]
    Statement { index: usize, fault: StatementFault },

    /// The document passed the structural checks but does not fit the typed model
    #[error("Invalid policy format: {0}")]
    Malformed(String),
}

impl ValidationError {
    pub(crate) fn statement(index: usize, fault: StatementFault) -> Self {
        ValidationError::Statement { index, fault }
    }

    /// Index of the offending statement, if the error is statement-specific
    pub fn statement_index(&self) -> Option<usize> {
        match self {
            ValidationError::Statement { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// The specific statement rule that failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatementFault {
    #[error("statement must be a JSON object")]
    NotAnObject,

    #[error("Unsupported statement element '{0}'")]
    UnsupportedElement(String),

    #[error("Effect element is required")]
    MissingEffect,

    #[error("incorrect Effect definition '{0}'")]
    InvalidEffect(String),

    #[error("Missing Action: Add an Action or NotAction element to the policy statement")]
    MissingAction,

    #[error("{0} element is required")]
    Required(&'static str),

    #[error("{0} and {1} elements are not allowed")]
    NotAllowed(&'static str, &'static str),

    #[error("{0} and {1} are mutually exclusive")]
    MutuallyExclusive(&'static str, &'static str),

    #[error("incorrect {0} definition")]
    EmptyValue(&'static str),

    #[error("incorrect {element} definition. {source}")]
    InvalidArn {
        element: &'static str,
        source: ArnError,
    },
}

/// ARN structure problems reported by [`crate::iam::validate_arn`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArnError {
    #[error("Invalid ARN: \"{0}\"")]
    Malformed(String),

    #[error("Invalid ARN partition \"{0}\". Supported values *, aws, aws-cn, aws-us-gov.")]
    Partition(String),

    #[error("Invalid ARN service: \"{0}\"")]
    Service(String),

    #[error("Invalid ARN region: {0}")]
    Region(String),

    #[error("Invalid ARN account ID: \"{0}\"")]
    AccountId(String),

    #[error("Empty ARN resource part")]
    EmptyResource,
}

/// Faults that abort one evaluation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("Unsupported condition: {0}")]
    UnsupportedCondition(String),

    #[error("{0} context key is undefined or contains invalid value")]
    InvalidContextValue(String),

    #[error("{0} context key must be an array of values")]
    ExpectedContextArray(String),

    #[error("Context key {0} is required by the policy")]
    MissingVariable(String),

    #[error("Context key {0} must be a string value as per policy variable requirement")]
    NonStringVariable(String),

    #[error("Invalid Action: The action {0} does not exist.")]
    InvalidAction(String),

    #[error("Invalid Service In Action: The service {0} specified in the action does not exist")]
    InvalidService(String),

    #[error("Unsupported Wildcard In Principal: Wildcards (*, ?) are not supported with the principal key AWS. Replace the wildcard with a valid principal value.")]
    PrincipalWildcard(String),

    #[error("Unsupported Principal: {0}")]
    UnsupportedPrincipal(String),

    #[error("Principal must be an object")]
    PrincipalNotObject,

    #[error("Data Type Mismatch: The text does not match the expected JSON data type String or String Array.")]
    PrincipalDataType,

    #[error("Unsupported array combination")]
    UnsupportedArrayCombination,

    #[error("Invalid ARN: {0}")]
    InvalidPrincipalArn(String),

    #[error("Variable substitution produced an invalid policy: {0}")]
    Substitution(String),
}
