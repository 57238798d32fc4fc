//! Principal matching
//!
//! `AWS` principals are compared by account ID, unique identity ID, root
//! account ARN or full user/role ARN. Every other kind (`Service`,
//! `Federated`, `CanonicalUser`, custom kinds) is compared by exact string.

use super::arn::{account_id, is_account_id};
use super::context::RequestContext;
use super::policy::{PrincipalSpec, StringOrList};
use crate::error::{EvalResult, EvaluationError};
use tracing::trace;

/// Principal kind compared with the AWS comparator
pub const AWS_KIND: &str = "AWS";

/// Unique IAM identity ID such as `AIDACKCEVSQ6C2EXAMPLE`
fn is_identity_id(value: &str) -> bool {
    (16..=128).contains(&value.len())
        && value.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// `arn:<anything>:<account-id>:root`
fn is_root_account(value: &str) -> bool {
    value
        .strip_prefix("arn:")
        .and_then(|rest| rest.strip_suffix(":root"))
        .and_then(|rest| rest.rsplit_once(':'))
        .is_some_and(|(_, account)| is_account_id(account))
}

/// Check the request principal against a `Principal` element
///
/// Every kind named in the mapping must match. A request without a principal
/// never matches.
pub fn principal_matches(context: &RequestContext, spec: &PrincipalSpec) -> EvalResult<bool> {
    let Some(request) = context.principal() else {
        return Ok(false);
    };

    let kinds = match spec {
        PrincipalSpec::Literal(value) if value == "*" => return Ok(true),
        PrincipalSpec::Literal(_) => return Err(EvaluationError::PrincipalNotObject),
        PrincipalSpec::Mapping(kinds) => kinds,
    };

    let mut holds = true;
    for (kind, allowed) in kinds {
        let matched = if kind == AWS_KIND {
            match request.get(kind) {
                None => false,
                Some(StringOrList::Single(principal)) if principal.is_empty() => false,
                Some(_) if is_wildcard(allowed) => true,
                Some(StringOrList::Single(principal)) => aws_principal_matches(allowed, principal)?,
                Some(StringOrList::List(_)) => return Err(EvaluationError::PrincipalDataType),
            }
        } else {
            match request.get(kind) {
                None => false,
                Some(actual) if actual.is_empty() || allowed.is_empty() => false,
                Some(actual) => strict_strings_match(allowed, actual)?,
            }
        };

        trace!("Principal kind '{}' matched: {}", kind, matched);
        holds &= matched;
    }

    Ok(holds)
}

/// `"*"` or `["*"]`; a `"*"` next to other entries is not a wildcard
fn is_wildcard(allowed: &StringOrList) -> bool {
    matches!(allowed.as_slice(), [only] if only == "*")
}

/// AWS principal comparator; a list matches when any entry matches
fn aws_principal_matches(allowed: &StringOrList, request: &str) -> EvalResult<bool> {
    let mut matched = false;
    for candidate in allowed.as_slice() {
        matched |= aws_candidate_matches(candidate, request)?;
    }
    Ok(matched)
}

fn aws_candidate_matches(candidate: &str, request: &str) -> EvalResult<bool> {
    if candidate.len() > 1 && candidate.contains(['*', '?']) {
        return Err(EvaluationError::PrincipalWildcard(candidate.to_string()));
    }

    if is_account_id(candidate) {
        return Ok(candidate == request_account_id(request)?);
    }

    if is_identity_id(candidate) {
        return Ok(candidate == request);
    }

    if is_root_account(candidate) {
        return Ok(account_id(candidate) == Some(request_account_id(request)?));
    }

    // IAM user and role ARNs
    if candidate.contains(':') && candidate.contains('/') {
        return Ok(candidate == request);
    }

    Err(EvaluationError::UnsupportedPrincipal(candidate.to_string()))
}

fn request_account_id(request: &str) -> EvalResult<&str> {
    account_id(request).ok_or_else(|| EvaluationError::InvalidPrincipalArn(request.to_string()))
}

/// A policy list matches a request string by membership; a policy string
/// only matches an equal request string
fn strict_strings_match(allowed: &StringOrList, actual: &StringOrList) -> EvalResult<bool> {
    match (allowed, actual) {
        (StringOrList::Single(allowed), actual) => Ok(actual.as_single() == Some(allowed.as_str())),
        (StringOrList::List(allowed), StringOrList::Single(actual)) => Ok(allowed.contains(actual)),
        (StringOrList::List(_), StringOrList::List(_)) => {
            Err(EvaluationError::UnsupportedArrayCombination)
        }
    }
}
