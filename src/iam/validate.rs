//! Structural validation of policy documents
//!
//! Runs on the raw JSON before it is deserialized, so that the first rule a
//! document violates is reported with the statement index and the element
//! involved rather than as a generic parse failure.

use super::arn::validate_arn;
use super::policy::{Policy, PolicyType, PolicyVersion};
use crate::error::{StatementFault, ValidationError};
use serde_json::{Map, Value};
use tracing::debug;

/// Elements a statement may carry
pub const STATEMENT_ELEMENTS: [&str; 9] = [
    "Sid",
    "Effect",
    "Principal",
    "NotPrincipal",
    "Action",
    "NotAction",
    "Resource",
    "NotResource",
    "Condition",
];

const REQUIRED_ELEMENTS: [&str; 2] = ["Version", "Statement"];
const EFFECTS: [&str; 2] = ["Allow", "Deny"];

const MUTUALLY_EXCLUSIVE: [(&str, &str); 3] = [
    ("Principal", "NotPrincipal"),
    ("Resource", "NotResource"),
    ("Action", "NotAction"),
];

const NON_EMPTY_ELEMENTS: [&str; 4] = ["Action", "NotAction", "Resource", "NotResource"];
const ARN_ELEMENTS: [&str; 2] = ["Resource", "NotResource"];

/// Check `document` against the policy grammar and the rules of `policy_type`
///
/// Returns the first violation found.
pub fn validate_policy(document: &Value, policy_type: PolicyType) -> Result<(), ValidationError> {
    let root = document
        .as_object()
        .ok_or_else(|| ValidationError::Malformed("policy must be a JSON object".to_string()))?;

    for element in REQUIRED_ELEMENTS {
        if !root.contains_key(element) {
            return Err(ValidationError::MissingElement(element));
        }
    }

    let version = root.get("Version").and_then(Value::as_str).unwrap_or_default();
    if !PolicyVersion::ALLOWED.contains(&version) {
        return Err(ValidationError::UnsupportedVersion(
            root.get("Version").map(Value::to_string).unwrap_or_default(),
        ));
    }

    let statements = root
        .get("Statement")
        .and_then(Value::as_array)
        .ok_or(ValidationError::StatementNotList)?;

    if statements.is_empty() {
        return Err(ValidationError::EmptyStatement);
    }

    for (index, statement) in statements.iter().enumerate() {
        validate_statement(statement, policy_type)
            .map_err(|fault| ValidationError::statement(index, fault))?;
    }

    debug!(
        "Validated {} with {} statement(s)",
        policy_type.display_name(),
        statements.len()
    );
    Ok(())
}

/// Validate and deserialize in one step
pub fn parse_policy(document: &Value, policy_type: PolicyType) -> Result<Policy, ValidationError> {
    validate_policy(document, policy_type)?;
    serde_json::from_value(document.clone()).map_err(|e| ValidationError::Malformed(e.to_string()))
}

fn validate_statement(statement: &Value, policy_type: PolicyType) -> Result<(), StatementFault> {
    let elements = statement.as_object().ok_or(StatementFault::NotAnObject)?;

    if let Some(unknown) = elements
        .keys()
        .find(|key| !STATEMENT_ELEMENTS.contains(&key.as_str()))
    {
        return Err(StatementFault::UnsupportedElement(unknown.clone()));
    }

    let effect = elements.get("Effect").ok_or(StatementFault::MissingEffect)?;
    if !effect.as_str().is_some_and(|e| EFFECTS.contains(&e)) {
        let shown = effect.as_str().map(str::to_string).unwrap_or_else(|| effect.to_string());
        return Err(StatementFault::InvalidEffect(shown));
    }

    if !has_any(elements, &["Action", "NotAction"]) {
        return Err(StatementFault::MissingAction);
    }

    match policy_type {
        PolicyType::Identity => {
            if !has_any(elements, &["Resource", "NotResource"]) {
                return Err(StatementFault::Required("Resource or NotResource"));
            }
            if has_any(elements, &["Principal", "NotPrincipal"]) {
                return Err(StatementFault::NotAllowed("Principal", "NotPrincipal"));
            }
        }
        PolicyType::Resource => {
            if !has_any(elements, &["Principal", "NotPrincipal"]) {
                return Err(StatementFault::Required("Principal or NotPrincipal"));
            }
        }
        PolicyType::Trust => {
            if !elements.contains_key("Principal") {
                return Err(StatementFault::Required("Principal"));
            }
            if has_any(elements, &["Resource", "NotResource"]) {
                return Err(StatementFault::NotAllowed("Resource", "NotResource"));
            }
        }
    }

    for (first, second) in MUTUALLY_EXCLUSIVE {
        if elements.contains_key(first) && elements.contains_key(second) {
            return Err(StatementFault::MutuallyExclusive(first, second));
        }
    }

    for element in NON_EMPTY_ELEMENTS {
        if let Some(value) = elements.get(element) {
            if !is_valid_value(value) {
                return Err(StatementFault::EmptyValue(element));
            }
        }
    }

    for element in ARN_ELEMENTS {
        let Some(value) = elements.get(element) else {
            continue;
        };
        let arns: Vec<&str> = match value {
            Value::String(arn) => vec![arn.as_str()],
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        for arn in arns {
            validate_arn(arn).map_err(|source| StatementFault::InvalidArn { element, source })?;
        }
    }

    Ok(())
}

fn has_any(elements: &Map<String, Value>, names: &[&str]) -> bool {
    names.iter().any(|name| elements.contains_key(*name))
}

/// Strings must be non-empty; arrays and objects must hold only valid values
fn is_valid_value(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => items.iter().all(is_valid_value),
        Value::Object(map) => map.values().all(is_valid_value),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArnError;
    use serde_json::json;

    fn identity(document: Value) -> Result<(), ValidationError> {
        validate_policy(&document, PolicyType::Identity)
    }

    fn statement_fault(document: Value, policy_type: PolicyType) -> StatementFault {
        match validate_policy(&document, policy_type) {
            Err(ValidationError::Statement { fault, .. }) => fault,
            other => panic!("expected statement error, got {:?}", other),
        }
    }

    fn with_statement(statement: Value) -> Value {
        json!({"Version": "2012-10-17", "Statement": [statement]})
    }

    #[test]
    fn test_valid_identity_policy() {
        let doc = with_statement(json!({
            "Sid": "Read",
            "Effect": "Allow",
            "Action": ["s3:GetObject"],
            "Resource": "arn:aws:s3:::bucket/*",
            "Condition": {"Bool": {"aws:SecureTransport": "true"}}
        }));
        assert!(identity(doc.clone()).is_ok());

        let policy = parse_policy(&doc, PolicyType::Identity).unwrap();
        assert_eq!(policy.statement.len(), 1);
    }

    #[test]
    fn test_missing_top_level_elements() {
        assert_eq!(
            identity(json!({"Statement": []})),
            Err(ValidationError::MissingElement("Version"))
        );
        assert_eq!(
            identity(json!({"Version": "2012-10-17"})),
            Err(ValidationError::MissingElement("Statement"))
        );
        assert_eq!(
            identity(json!({"Version": "2012-10-17"})).unwrap_err().to_string(),
            "Invalid policy format: 'Statement' element is missing"
        );
    }

    #[test]
    fn test_version() {
        let err = identity(json!({"Version": "2024-01-01", "Statement": []})).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedVersion(_)));
        assert_eq!(
            err.to_string(),
            "Incorrect policy version. Allowed: 2012-10-17, 2008-10-17"
        );

        let doc = json!({"Version": "2008-10-17", "Statement": [
            {"Effect": "Allow", "Action": "s3:*", "Resource": "*"}
        ]});
        assert!(identity(doc).is_ok());
    }

    #[test]
    fn test_statement_shape() {
        assert_eq!(
            identity(json!({"Version": "2012-10-17", "Statement": []})),
            Err(ValidationError::EmptyStatement)
        );
        assert_eq!(
            identity(json!({"Version": "2012-10-17", "Statement": {"Effect": "Allow"}})),
            Err(ValidationError::StatementNotList)
        );
        assert_eq!(
            statement_fault(with_statement(json!("Allow")), PolicyType::Identity),
            StatementFault::NotAnObject
        );
    }

    #[test]
    fn test_unsupported_element() {
        let err = identity(with_statement(json!({
            "Effect": "Allow", "Action": "s3:*", "Resource": "*", "Actions": "s3:*"
        })))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid statement 0 format: Unsupported statement element 'Actions'"
        );
    }

    #[test]
    fn test_effect() {
        assert_eq!(
            statement_fault(with_statement(json!({"Action": "s3:*", "Resource": "*"})), PolicyType::Identity),
            StatementFault::MissingEffect
        );
        assert_eq!(
            statement_fault(
                with_statement(json!({"Effect": "Permit", "Action": "s3:*", "Resource": "*"})),
                PolicyType::Identity
            ),
            StatementFault::InvalidEffect("Permit".into())
        );
    }

    #[test]
    fn test_missing_action() {
        let err = identity(with_statement(json!({"Effect": "Allow", "Resource": "*"}))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid statement 0 format: Missing Action: Add an Action or NotAction element to the policy statement"
        );
    }

    #[test]
    fn test_identity_rules() {
        assert_eq!(
            statement_fault(with_statement(json!({"Effect": "Allow", "Action": "s3:*"})), PolicyType::Identity),
            StatementFault::Required("Resource or NotResource")
        );

        let err = identity(with_statement(json!({
            "Effect": "Allow",
            "Principal": {"AWS": "arn:aws:iam::111122223333:root"},
            "Action": "kms:*",
            "Resource": "*"
        })))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid statement 0 format: Principal and NotPrincipal elements are not allowed"
        );
    }

    #[test]
    fn test_resource_rules() {
        let doc = with_statement(json!({"Effect": "Allow", "Action": "s3:*", "Resource": "*"}));
        assert_eq!(
            statement_fault(doc, PolicyType::Resource),
            StatementFault::Required("Principal or NotPrincipal")
        );

        let doc = with_statement(json!({
            "Effect": "Deny", "NotPrincipal": {"AWS": "111122223333"}, "Action": "s3:*", "Resource": "*"
        }));
        assert!(validate_policy(&doc, PolicyType::Resource).is_ok());
    }

    #[test]
    fn test_trust_rules() {
        let doc = with_statement(json!({
            "Effect": "Allow", "NotPrincipal": {"Service": "ec2.amazonaws.com"}, "Action": "sts:AssumeRole"
        }));
        assert_eq!(statement_fault(doc, PolicyType::Trust), StatementFault::Required("Principal"));

        let doc = with_statement(json!({
            "Effect": "Allow", "Principal": {"Service": "ec2.amazonaws.com"},
            "Action": "sts:AssumeRole", "Resource": "*"
        }));
        assert_eq!(
            statement_fault(doc, PolicyType::Trust),
            StatementFault::NotAllowed("Resource", "NotResource")
        );

        let doc = with_statement(json!({
            "Effect": "Allow", "Principal": {"Service": "ec2.amazonaws.com"}, "Action": "sts:AssumeRole"
        }));
        assert!(validate_policy(&doc, PolicyType::Trust).is_ok());
    }

    #[test]
    fn test_mutually_exclusive() {
        let err = identity(with_statement(json!({
            "Effect": "Allow", "Action": "s3:*", "NotAction": "iam:*", "Resource": "*"
        })))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid statement 0 format: Action and NotAction are mutually exclusive"
        );

        let doc = with_statement(json!({
            "Effect": "Allow", "Action": "s3:*", "Resource": "*", "NotResource": "arn:aws:s3:::b/*"
        }));
        assert_eq!(
            statement_fault(doc, PolicyType::Identity),
            StatementFault::MutuallyExclusive("Resource", "NotResource")
        );
    }

    #[test]
    fn test_empty_values() {
        let doc = with_statement(json!({"Effect": "Allow", "Action": ["s3:*", ""], "Resource": "*"}));
        let err = identity(doc).unwrap_err();
        assert_eq!(err.to_string(), "Invalid statement 0 format: incorrect Action definition");

        let doc = with_statement(json!({"Effect": "Allow", "Action": "s3:*", "Resource": []}));
        assert!(identity(doc).is_ok());

        let doc = with_statement(json!({"Effect": "Allow", "Action": "s3:*", "Resource": 5}));
        assert_eq!(
            statement_fault(doc, PolicyType::Identity),
            StatementFault::EmptyValue("Resource")
        );
    }

    #[test]
    fn test_invalid_arn_reports_statement_and_element() {
        let doc = json!({"Version": "2012-10-17", "Statement": [
            {"Effect": "Allow", "Action": "s3:*", "Resource": "*"},
            {"Effect": "Deny", "Action": "s3:*", "NotResource": ["arn:aws:s3:::ok", "arn:aws:s3"]}
        ]});
        let err = identity(doc).unwrap_err();
        assert_eq!(err.statement_index(), Some(1));
        assert_eq!(
            err,
            ValidationError::statement(
                1,
                StatementFault::InvalidArn {
                    element: "NotResource",
                    source: ArnError::Malformed("arn:aws:s3".into()),
                }
            )
        );
    }

    #[test]
    fn test_first_failure_wins() {
        // unsupported element is reported before the missing effect
        let doc = with_statement(json!({"Bogus": 1}));
        assert_eq!(
            statement_fault(doc, PolicyType::Identity),
            StatementFault::UnsupportedElement("Bogus".into())
        );
    }

    #[test]
    fn test_malformed_after_structure_checks() {
        let doc = with_statement(json!({
            "Effect": "Allow", "Action": "s3:*", "Resource": "*", "Condition": "yes"
        }));
        assert!(identity(doc.clone()).is_ok());
        assert!(matches!(
            parse_policy(&doc, PolicyType::Identity),
            Err(ValidationError::Malformed(_))
        ));
    }
}
