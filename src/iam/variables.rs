//! Policy variable substitution
//!
//! `${name}` placeholders anywhere in the statements are replaced with the
//! string value of context key `name` before a request is evaluated. The
//! resolved copy lives only for one evaluation.

use super::context::{ContextValue, RequestContext};
use super::policy::Statement;
use crate::error::{EvalResult, EvaluationError};
use std::borrow::Cow;
use std::ops::Range;
use tracing::trace;

const OPEN: &str = "${";
const CLOSE: char = '}';

/// Byte range and name of every `${name}` placeholder in `text`
///
/// The name runs up to the first `}` and must not be empty.
fn placeholders(text: &str) -> Vec<(Range<usize>, &str)> {
    let mut found = Vec::new();
    let mut offset = 0;

    while let Some(start) = text[offset..].find(OPEN).map(|i| offset + i) {
        let name_start = start + OPEN.len();
        let Some(len) = text[name_start..].find(CLOSE) else {
            break;
        };
        if len == 0 {
            offset = name_start;
            continue;
        }
        let end = name_start + len + CLOSE.len_utf8();
        found.push((start..end, &text[name_start..name_start + len]));
        offset = end;
    }

    found
}

/// Replace every placeholder in `text` with `replacement`
pub(crate) fn mask_variables<'a>(text: &'a str, replacement: &str) -> Cow<'a, str> {
    let spans = placeholders(text);
    if spans.is_empty() {
        return Cow::Borrowed(text);
    }

    let mut masked = String::with_capacity(text.len());
    let mut last = 0;
    for (range, _) in spans {
        masked.push_str(&text[last..range.start]);
        masked.push_str(replacement);
        last = range.end;
    }
    masked.push_str(&text[last..]);
    Cow::Owned(masked)
}

/// Names of all `${...}` placeholders in `text`, in order, duplicates kept
///
/// ```
/// use iam_policy_engine::iam::get_policy_variables;
///
/// let names = get_policy_variables("arn:aws:s3:::bucket/${aws:username}/${aws:username}");
/// assert_eq!(names, vec!["aws:username", "aws:username"]);
/// ```
pub fn get_policy_variables(text: &str) -> Vec<String> {
    placeholders(text)
        .into_iter()
        .map(|(_, name)| name.to_string())
        .collect()
}

/// Resolve every placeholder in `statements` against `context`
///
/// Statements without any `${` are returned borrowed.
pub fn apply_variables<'a>(
    statements: &'a [Statement],
    context: &RequestContext,
) -> EvalResult<Cow<'a, [Statement]>> {
    let mut json = serde_json::to_string(statements)
        .map_err(|e| EvaluationError::Substitution(e.to_string()))?;

    if !json.contains("${") {
        return Ok(Cow::Borrowed(statements));
    }

    for name in get_policy_variables(&json) {
        let value = match context.get(&name) {
            None | Some(ContextValue::Null) => {
                return Err(EvaluationError::MissingVariable(name));
            }
            Some(ContextValue::String(value)) => value,
            Some(_) => return Err(EvaluationError::NonStringVariable(name)),
        };

        trace!("Substituting policy variable '{}' with '{}'", name, value);
        json = json.replace(&format!("${{{}}}", name), &escape_json_fragment(value));
    }

    let resolved: Vec<Statement> =
        serde_json::from_str(&json).map_err(|e| EvaluationError::Substitution(e.to_string()))?;

    Ok(Cow::Owned(resolved))
}

/// Escape `value` so it can be spliced inside a JSON string literal
fn escape_json_fragment(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iam::policy::{Effect, StringOrList};

    #[test]
    fn test_extract_variables() {
        let text = "aaa ${test} arn:aws:sqs:us-east-2::${aws:PrincipalTag/team}-queue ${demo}} ";
        assert_eq!(
            get_policy_variables(text),
            vec!["test", "aws:PrincipalTag/team", "demo"]
        );
        assert!(get_policy_variables("no variables here").is_empty());
    }

    #[test]
    fn test_placeholder_edge_cases() {
        assert!(get_policy_variables("${} and ${unterminated").is_empty());
        assert_eq!(get_policy_variables("$${a}"), vec!["a"]);
        assert_eq!(get_policy_variables("${a${b}"), vec!["a${b"]);
        assert_eq!(get_policy_variables("${ü/ß}"), vec!["ü/ß"]);
    }

    #[test]
    fn test_mask_variables() {
        assert_eq!(
            mask_variables("arn:aws:sqs:us-east-2::${aws:PrincipalTag/team}-queue", "X"),
            "arn:aws:sqs:us-east-2::X-queue"
        );
        assert!(matches!(mask_variables("plain", "X"), Cow::Borrowed("plain")));
    }

    #[test]
    fn test_use_policy_variables() {
        let statements = vec![Statement::new(
            Effect::Allow,
            vec!["s3:ListBucket"],
            vec!["arn:aws:s3:::amzn-s3-demo-bucket/${aws:username}"],
        )
        .with_condition("StringLike", "s3:prefix", vec!["${aws:PrincipalTag/team}/*"])];

        let ctx = RequestContext::new()
            .with("aws:username", "admin")
            .with("aws:PrincipalTag/team", "developers");

        let resolved = apply_variables(&statements, &ctx).unwrap();
        assert!(matches!(resolved, Cow::Owned(_)));

        let stmt = &resolved[0];
        assert_eq!(
            stmt.resource,
            Some(StringOrList::from(vec!["arn:aws:s3:::amzn-s3-demo-bucket/admin"]))
        );
        assert_eq!(
            stmt.condition.as_ref().unwrap()["StringLike"]["s3:prefix"],
            StringOrList::from(vec!["developers/*"])
        );
    }

    #[test]
    fn test_no_variables_borrows() {
        let statements = vec![Statement::new(Effect::Allow, "s3:*", "*")];
        let resolved = apply_variables(&statements, &RequestContext::new()).unwrap();
        assert!(matches!(resolved, Cow::Borrowed(_)));
    }

    #[test]
    fn test_missing_variable_is_error() {
        let statements = vec![Statement::new(
            Effect::Allow,
            "s3:*",
            "arn:aws:s3:::bucket/${aws:username}",
        )];

        let err = apply_variables(&statements, &RequestContext::new()).unwrap_err();
        assert_eq!(err, EvaluationError::MissingVariable("aws:username".into()));
        assert_eq!(
            err.to_string(),
            "Context key aws:username is required by the policy"
        );
    }

    #[test]
    fn test_non_string_variable_is_error() {
        let statements = vec![Statement::new(
            Effect::Allow,
            "s3:*",
            "arn:aws:s3:::bucket/${aws:username}",
        )];
        let ctx = RequestContext::new().with("aws:username", vec!["a", "b"]);

        let err = apply_variables(&statements, &ctx).unwrap_err();
        assert_eq!(err, EvaluationError::NonStringVariable("aws:username".into()));
    }

    #[test]
    fn test_substituted_value_is_escaped() {
        let statements = vec![Statement::new(
            Effect::Allow,
            "s3:*",
            "arn:aws:s3:::bucket/${aws:username}",
        )];
        let ctx = RequestContext::new().with("aws:username", "we\"ird\\name");

        let resolved = apply_variables(&statements, &ctx).unwrap();
        assert_eq!(
            resolved[0].resource,
            Some(StringOrList::from("arn:aws:s3:::bucket/we\"ird\\name"))
        );
    }
}
