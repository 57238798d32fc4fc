//! Condition evaluation for IAM policies
//!
//! An operator key such as `ForAnyValue:StringLikeIfExists` is parsed once
//! into a [`ConditionKey`]: an optional set qualifier, the operator itself
//! and the `IfExists` flag. Operators fall into families:
//! - String operations (Equals, EqualsIgnoreCase, Like and their negations)
//! - ARN operations (Like / Equals and their negations)
//! - IP operations (IpAddress, NotIpAddress)
//! - Numeric, Date and Bool comparisons
//! - `Null` presence checks
//!
//! All keys inside one operator block must hold, and all operator blocks
//! inside one condition must hold.

use super::arn::arn_match_cached;
use super::context::{ContextValue, RequestContext};
use super::pattern::PatternMatcher;
use super::policy::{ConditionBlock, StringOrList};
use crate::error::{EvalResult, EvaluationError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use ipnetwork::IpNetwork;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// `ForAllValues:` / `ForAnyValue:` prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetQualifier {
    /// Single-valued context key
    #[default]
    None,
    /// Every context value must satisfy the operator
    ForAllValues,
    /// At least one context value must satisfy the operator
    ForAnyValue,
}

/// Condition operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionOperator {
    StringEquals,
    StringNotEquals,
    StringEqualsIgnoreCase,
    StringNotEqualsIgnoreCase,
    /// String matches pattern (supports `*` and `?`)
    StringLike,
    StringNotLike,
    ArnLike,
    ArnEquals,
    ArnNotLike,
    ArnNotEquals,
    NumericEquals,
    NumericNotEquals,
    NumericLessThan,
    NumericLessThanEquals,
    NumericGreaterThan,
    NumericGreaterThanEquals,
    Bool,
    DateEquals,
    DateNotEquals,
    DateLessThan,
    DateLessThanEquals,
    DateGreaterThan,
    DateGreaterThanEquals,
    /// Context value inside a CIDR range or equal to an address
    IpAddress,
    NotIpAddress,
    /// `"true"`: key must be absent, `"false"`: key must be present
    Null,
}

impl ConditionOperator {
    pub const ALL: [ConditionOperator; 26] = [
        ConditionOperator::StringEquals,
        ConditionOperator::StringNotEquals,
        ConditionOperator::StringEqualsIgnoreCase,
        ConditionOperator::StringNotEqualsIgnoreCase,
        ConditionOperator::StringLike,
        ConditionOperator::StringNotLike,
        ConditionOperator::ArnLike,
        ConditionOperator::ArnEquals,
        ConditionOperator::ArnNotLike,
        ConditionOperator::ArnNotEquals,
        ConditionOperator::NumericEquals,
        ConditionOperator::NumericNotEquals,
        ConditionOperator::NumericLessThan,
        ConditionOperator::NumericLessThanEquals,
        ConditionOperator::NumericGreaterThan,
        ConditionOperator::NumericGreaterThanEquals,
        ConditionOperator::Bool,
        ConditionOperator::DateEquals,
        ConditionOperator::DateNotEquals,
        ConditionOperator::DateLessThan,
        ConditionOperator::DateLessThanEquals,
        ConditionOperator::DateGreaterThan,
        ConditionOperator::DateGreaterThanEquals,
        ConditionOperator::IpAddress,
        ConditionOperator::NotIpAddress,
        ConditionOperator::Null,
    ];

    pub fn as_str(&self) -> &'static str {
        use ConditionOperator::*;
        match self {
            StringEquals => "StringEquals",
            StringNotEquals => "StringNotEquals",
            StringEqualsIgnoreCase => "StringEqualsIgnoreCase",
            StringNotEqualsIgnoreCase => "StringNotEqualsIgnoreCase",
            StringLike => "StringLike",
            StringNotLike => "StringNotLike",
            ArnLike => "ArnLike",
            ArnEquals => "ArnEquals",
            ArnNotLike => "ArnNotLike",
            ArnNotEquals => "ArnNotEquals",
            NumericEquals => "NumericEquals",
            NumericNotEquals => "NumericNotEquals",
            NumericLessThan => "NumericLessThan",
            NumericLessThanEquals => "NumericLessThanEquals",
            NumericGreaterThan => "NumericGreaterThan",
            NumericGreaterThanEquals => "NumericGreaterThanEquals",
            Bool => "Bool",
            DateEquals => "DateEquals",
            DateNotEquals => "DateNotEquals",
            DateLessThan => "DateLessThan",
            DateLessThanEquals => "DateLessThanEquals",
            DateGreaterThan => "DateGreaterThan",
            DateGreaterThanEquals => "DateGreaterThanEquals",
            IpAddress => "IpAddress",
            NotIpAddress => "NotIpAddress",
            Null => "Null",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.as_str() == name)
    }

    /// Negated string-shaped operators flip the any/all semantics over value sets
    pub fn is_negated(&self) -> bool {
        matches!(
            self,
            ConditionOperator::StringNotEquals
                | ConditionOperator::StringNotEqualsIgnoreCase
                | ConditionOperator::StringNotLike
                | ConditionOperator::ArnNotLike
                | ConditionOperator::ArnNotEquals
                | ConditionOperator::NotIpAddress
        )
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed operator key of a condition block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionKey {
    pub qualifier: SetQualifier,
    pub operator: ConditionOperator,
    pub if_exists: bool,
}

impl FromStr for ConditionKey {
    type Err = EvaluationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (qualifier, rest) = if let Some(rest) = raw.strip_prefix("ForAllValues:") {
            (SetQualifier::ForAllValues, rest)
        } else if let Some(rest) = raw.strip_prefix("ForAnyValue:") {
            (SetQualifier::ForAnyValue, rest)
        } else {
            (SetQualifier::None, raw)
        };

        let (if_exists, name) = match rest.strip_suffix("IfExists") {
            Some(name) => (true, name),
            None => (false, rest),
        };

        let operator = ConditionOperator::from_name(name)
            .ok_or_else(|| EvaluationError::UnsupportedCondition(raw.to_string()))?;

        Ok(ConditionKey {
            qualifier,
            operator,
            if_exists,
        })
    }
}

/// Evaluate a condition block against a request context
///
/// Compiles wildcard patterns on the fly; the engine uses a cached matcher.
pub fn condition_matches(context: &RequestContext, condition: &ConditionBlock) -> EvalResult<bool> {
    condition_matches_with(&PatternMatcher::new(16), context, condition)
}

pub(crate) fn condition_matches_with(
    matcher: &PatternMatcher,
    context: &RequestContext,
    condition: &ConditionBlock,
) -> EvalResult<bool> {
    let mut holds = true;
    for (raw_key, entries) in condition {
        let key: ConditionKey = raw_key.parse()?;
        holds &= evaluate_operator(matcher, &key, entries, context)?;
    }
    Ok(holds)
}

fn evaluate_operator(
    matcher: &PatternMatcher,
    key: &ConditionKey,
    entries: &BTreeMap<String, StringOrList>,
    context: &RequestContext,
) -> EvalResult<bool> {
    use ConditionOperator::*;

    let op = key.operator;
    match op {
        StringEquals | StringNotEquals | StringEqualsIgnoreCase | StringNotEqualsIgnoreCase
        | StringLike | StringNotLike | ArnLike | ArnEquals | ArnNotLike | ArnNotEquals
        | IpAddress | NotIpAddress => check_string_condition(
            entries,
            context,
            |expected, actual| compare_strings(matcher, op, expected, actual),
            key.qualifier,
            key.if_exists,
            op.is_negated(),
        ),
        NumericEquals => check_numeric_condition(entries, context, key.if_exists, is_equal),
        NumericNotEquals => check_numeric_condition(entries, context, key.if_exists, is_not_equal),
        NumericLessThan => check_numeric_condition(entries, context, key.if_exists, is_less),
        NumericLessThanEquals => {
            check_numeric_condition(entries, context, key.if_exists, is_less_or_equal)
        }
        NumericGreaterThan => check_numeric_condition(entries, context, key.if_exists, is_greater),
        NumericGreaterThanEquals => {
            check_numeric_condition(entries, context, key.if_exists, is_greater_or_equal)
        }
        Bool => check_bool_condition(entries, context, key.if_exists),
        DateEquals => check_date_condition(entries, context, key.if_exists, is_equal),
        DateNotEquals => check_date_condition(entries, context, key.if_exists, is_not_equal),
        DateLessThan => check_date_condition(entries, context, key.if_exists, is_less),
        DateLessThanEquals => check_date_condition(entries, context, key.if_exists, is_less_or_equal),
        DateGreaterThan => check_date_condition(entries, context, key.if_exists, is_greater),
        DateGreaterThanEquals => {
            check_date_condition(entries, context, key.if_exists, is_greater_or_equal)
        }
        Null => check_null_condition(entries, context),
    }
}

/// Binary comparator of the string-shaped families
fn compare_strings(
    matcher: &PatternMatcher,
    op: ConditionOperator,
    expected: &str,
    actual: &str,
) -> bool {
    use ConditionOperator::*;

    match op {
        StringEquals => actual == expected,
        StringNotEquals => actual != expected,
        StringEqualsIgnoreCase => actual.to_lowercase() == expected.to_lowercase(),
        StringNotEqualsIgnoreCase => actual.to_lowercase() != expected.to_lowercase(),
        StringLike => matcher.matches(expected, actual, false),
        StringNotLike => !matcher.matches(expected, actual, false),
        ArnLike | ArnEquals => arn_match_cached(matcher, expected, actual),
        ArnNotLike | ArnNotEquals => !arn_match_cached(matcher, expected, actual),
        IpAddress => ip_matches(actual, expected),
        NotIpAddress => !ip_matches(actual, expected),
        _ => false,
    }
}

/// Evaluate every entry and AND the results; errors in any entry surface
fn all_entries<F>(entries: &BTreeMap<String, StringOrList>, mut check: F) -> EvalResult<bool>
where
    F: FnMut(&str, &StringOrList) -> EvalResult<bool>,
{
    let mut holds = true;
    for (context_key, values) in entries {
        holds &= check(context_key, values)?;
    }
    Ok(holds)
}

fn check_string_condition<F>(
    entries: &BTreeMap<String, StringOrList>,
    context: &RequestContext,
    comparator: F,
    qualifier: SetQualifier,
    if_exists: bool,
    negated: bool,
) -> EvalResult<bool>
where
    F: Fn(&str, &str) -> bool,
{
    all_entries(entries, |context_key, expected| {
        if if_exists && context.is_missing(context_key) {
            return Ok(true);
        }

        let expected = expected.as_slice();

        if qualifier == SetQualifier::None {
            let actual = context
                .get_str(context_key)
                .ok_or_else(|| EvaluationError::InvalidContextValue(context_key.to_string()))?;

            let mut results = expected.iter().map(|value| comparator(value, actual));
            return Ok(if negated {
                results.all(|matched| matched)
            } else {
                results.any(|matched| matched)
            });
        }

        let actual = match context.get(context_key) {
            None | Some(ContextValue::Null) => return Ok(true),
            Some(ContextValue::String(s)) if s.is_empty() => return Ok(true),
            Some(ContextValue::List(values)) if values.is_empty() => return Ok(true),
            Some(ContextValue::List(values)) => values,
            Some(_) => {
                return Err(EvaluationError::ExpectedContextArray(context_key.to_string()))
            }
        };

        // One verdict per context element: does it match any of the policy values
        // (for negated operators: fail the negated comparator for any value)
        let results: Vec<bool> = actual
            .iter()
            .map(|item| {
                expected.iter().any(|value| {
                    let valid = comparator(value, item);
                    if negated {
                        !valid
                    } else {
                        valid
                    }
                })
            })
            .collect();

        let for_all = qualifier == SetQualifier::ForAllValues;
        Ok(match (for_all, negated) {
            (true, false) => results.iter().all(|r| *r),
            (true, true) => results.iter().all(|r| !*r),
            (false, false) => results.iter().any(|r| *r),
            (false, true) => results.iter().any(|r| !*r),
        })
    })
}

/// Ordering of the context value relative to the policy value, `None` when
/// either side does not parse
type Comparison = Option<Ordering>;

fn is_equal(cmp: Comparison) -> bool {
    cmp == Some(Ordering::Equal)
}

/// Unparseable operands are never equal, so `NotEquals` holds for them
fn is_not_equal(cmp: Comparison) -> bool {
    cmp != Some(Ordering::Equal)
}

fn is_less(cmp: Comparison) -> bool {
    cmp == Some(Ordering::Less)
}

fn is_less_or_equal(cmp: Comparison) -> bool {
    matches!(cmp, Some(Ordering::Less | Ordering::Equal))
}

fn is_greater(cmp: Comparison) -> bool {
    cmp == Some(Ordering::Greater)
}

fn is_greater_or_equal(cmp: Comparison) -> bool {
    matches!(cmp, Some(Ordering::Greater | Ordering::Equal))
}

fn check_numeric_condition(
    entries: &BTreeMap<String, StringOrList>,
    context: &RequestContext,
    if_exists: bool,
    holds: fn(Comparison) -> bool,
) -> EvalResult<bool> {
    check_ordered_condition(entries, context, if_exists, parse_int, holds)
}

fn check_date_condition(
    entries: &BTreeMap<String, StringOrList>,
    context: &RequestContext,
    if_exists: bool,
    holds: fn(Comparison) -> bool,
) -> EvalResult<bool> {
    check_ordered_condition(entries, context, if_exists, parse_date, holds)
}

/// Parse both sides with `parse` and hand their ordering to `holds`; a
/// missing context key reads as an unparseable value
fn check_ordered_condition<T: PartialOrd>(
    entries: &BTreeMap<String, StringOrList>,
    context: &RequestContext,
    if_exists: bool,
    parse: fn(&str) -> Option<T>,
    holds: fn(Comparison) -> bool,
) -> EvalResult<bool> {
    all_entries(entries, |context_key, expected| {
        if if_exists && context.is_missing(context_key) {
            return Ok(true);
        }

        let expected = first_value(expected).and_then(parse);
        let actual = context.get(context_key).and_then(first_context_value).and_then(parse);

        let cmp = match (actual, expected) {
            (Some(actual), Some(expected)) => actual.partial_cmp(&expected),
            _ => None,
        };
        Ok(holds(cmp))
    })
}

fn check_bool_condition(
    entries: &BTreeMap<String, StringOrList>,
    context: &RequestContext,
    if_exists: bool,
) -> EvalResult<bool> {
    all_entries(entries, |context_key, expected| {
        if if_exists && context.is_missing(context_key) {
            return Ok(true);
        }

        let actual = match context.get(context_key) {
            None | Some(ContextValue::Null) => false,
            Some(ContextValue::String(s)) => parse_bool(s),
            Some(_) => true,
        };

        Ok(policy_bool(expected) == actual)
    })
}

fn check_null_condition(
    entries: &BTreeMap<String, StringOrList>,
    context: &RequestContext,
) -> EvalResult<bool> {
    all_entries(entries, |context_key, expected| {
        let must_be_absent = policy_bool(expected);
        let is_defined = context
            .get(context_key)
            .is_some_and(ContextValue::has_content);

        Ok(must_be_absent != is_defined)
    })
}

fn first_value(values: &StringOrList) -> Option<&str> {
    values.as_slice().first().map(String::as_str)
}

fn first_context_value(value: &ContextValue) -> Option<&str> {
    match value {
        ContextValue::String(s) => Some(s),
        ContextValue::List(values) => values.first().map(String::as_str),
        _ => None,
    }
}

fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

/// A list value counts as true
fn policy_bool(values: &StringOrList) -> bool {
    match values {
        StringOrList::Single(value) => parse_bool(value),
        StringOrList::List(_) => true,
    }
}

/// Leading integer of `raw` (`"10.5"` -> 10, `"12abc"` -> 12)
fn parse_int(raw: &str) -> Option<i64> {
    let raw = raw.trim_start();
    let (sign, digits) = match raw.as_bytes().first() {
        Some(b'-') => (-1, &raw[1..]),
        Some(b'+') => (1, &raw[1..]),
        _ => (1, raw),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// RFC 3339, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD` (UTC) or epoch seconds
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

/// `address` equals `range`, or lies inside it when `range` is a CIDR block
fn ip_matches(address: &str, range: &str) -> bool {
    let Ok(address) = address.trim().parse::<IpAddr>() else {
        return false;
    };

    if range.contains('/') {
        return match range.trim().parse::<IpNetwork>() {
            Ok(network) => network.contains(address),
            Err(_) => false,
        };
    }

    range
        .trim()
        .parse::<IpAddr>()
        .map(|exact| exact == address)
        .unwrap_or(false)
}
