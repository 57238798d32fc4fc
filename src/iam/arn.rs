//! ARN matching and validation
//!
//! An ARN has exactly six colon-delimited fields:
//! `arn:partition:service:region:account:resource`.

use super::pattern::{wildcard_match, PatternMatcher};
use super::variables::mask_variables;
use crate::error::ArnError;

/// Number of colon-delimited fields in an ARN
pub const ARN_FIELDS: usize = 6;

/// Partitions accepted by [`validate_arn`]
pub const VALID_PARTITIONS: [&str; 4] = ["*", "aws", "aws-cn", "aws-us-gov"];

const REGION_INDEX: usize = 3;
const ACCOUNT_INDEX: usize = 4;

/// Match an ARN `value` against an ARN `pattern`
///
/// # Examples
/// ```
/// use iam_policy_engine::iam::arn_match;
///
/// assert!(arn_match("arn:aws:s3:::bucket/*", "arn:aws:s3:us-east-1:123456789012:bucket/key"));
/// assert!(!arn_match("arn:aws:s3:::bucket/*", "arn:aws:s3:::other/key"));
/// ```
pub fn arn_match(pattern: &str, value: &str) -> bool {
    arn_match_with(pattern, value, |p, v| wildcard_match(p, v, true))
}

/// ARN matching through a caching [`PatternMatcher`]
pub(crate) fn arn_match_cached(matcher: &PatternMatcher, pattern: &str, value: &str) -> bool {
    arn_match_with(pattern, value, |p, v| matcher.matches(p, v, true))
}

fn arn_match_with<F>(pattern: &str, value: &str, field_matches: F) -> bool
where
    F: Fn(&str, &str) -> bool,
{
    if pattern == "*" {
        return true;
    }

    let pattern_fields: Vec<&str> = pattern.split(':').collect();
    let value_fields: Vec<&str> = value.split(':').collect();

    if pattern_fields.len() != ARN_FIELDS || value_fields.len() != ARN_FIELDS {
        return false;
    }

    pattern_fields
        .iter()
        .zip(value_fields.iter())
        .enumerate()
        .all(|(index, (pattern_field, value_field))| {
            // region and account may be omitted in the pattern
            if pattern_field.is_empty() && (index == REGION_INDEX || index == ACCOUNT_INDEX) {
                return true;
            }
            if *pattern_field == "*" && !value_field.is_empty() {
                return true;
            }
            field_matches(pattern_field, value_field)
        })
}

/// Rewrite empty ARN fields to `*`
///
/// ```
/// use iam_policy_engine::iam::arn_wildcards;
///
/// assert_eq!(arn_wildcards("arn:aws:s3:::bucket"), "arn:aws:s3:*:*:bucket");
/// ```
pub fn arn_wildcards(arn: &str) -> String {
    arn.split(':')
        .map(|field| if field.is_empty() { "*" } else { field })
        .collect::<Vec<_>>()
        .join(":")
}

/// Account-ID segment (fifth field) of an ARN, if it has one
pub fn account_id(arn: &str) -> Option<&str> {
    arn.split(':').nth(ACCOUNT_INDEX)
}

/// Exactly twelve ASCII digits
pub(crate) fn is_account_id(value: &str) -> bool {
    value.len() == 12 && value.bytes().all(|b| b.is_ascii_digit())
}

/// Validate the structure of a `Resource` / `NotResource` ARN
///
/// Policy variables are replaced by a placeholder first so colons inside
/// `${...}` do not split fields.
pub fn validate_arn(arn: &str) -> Result<(), ArnError> {
    if arn == "*" {
        return Ok(());
    }

    let arn = mask_variables(arn, "${variable-placeholder}");
    let fields: Vec<&str> = arn.split(':').collect();

    if fields.len() != ARN_FIELDS {
        return Err(ArnError::Malformed(arn.to_string()));
    }

    let (prefix, partition, service, region, account, resource) =
        (fields[0], fields[1], fields[2], fields[3], fields[4], fields[5]);

    if prefix != "arn" {
        return Err(ArnError::Malformed(arn.to_string()));
    }

    if !VALID_PARTITIONS.contains(&partition) {
        return Err(ArnError::Partition(partition.to_string()));
    }

    if service.is_empty() || service != service.to_lowercase() {
        return Err(ArnError::Service(service.to_string()));
    }

    if region != region.to_lowercase() {
        return Err(ArnError::Region(region.to_string()));
    }

    if !account.is_empty() && account != "*" && !is_account_id(account) {
        return Err(ArnError::AccountId(account.to_string()));
    }

    if resource.is_empty() {
        return Err(ArnError::EmptyResource);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROD_OBJECT: &str = "arn:aws:s3:::amzn-s3-demo-bucket-production/test.jpg";

    #[test]
    fn test_global_wildcard() {
        assert!(arn_match("*", PROD_OBJECT));
        assert!(arn_match("*", "not-an-arn"));
    }

    #[test]
    fn test_resource_wildcards() {
        assert!(arn_match("arn:aws:s3:::amzn-s3-demo-bucket-production/*", PROD_OBJECT));
        assert!(arn_match(
            "arn:aws:s3:::amzn-s3-demo-bucket-production/*/*.jpg",
            "arn:aws:s3:::amzn-s3-demo-bucket-production/test/account.jpg"
        ));
        assert!(!arn_match("arn:aws:s3:::amzn-s3-demo-bucket-test/*", PROD_OBJECT));
    }

    #[test]
    fn test_empty_region_and_account_match_anything() {
        assert!(arn_match(
            "arn:aws:s3:::amzn-s3-demo-bucket-production/*",
            "arn:aws:s3:us-east-1::amzn-s3-demo-bucket-production/test.jpg"
        ));
        assert!(arn_match(
            "arn:aws:s3:::amzn-s3-demo-bucket-production/*",
            "arn:aws:s3:us-east-1:123456789012:amzn-s3-demo-bucket-production/test.jpg"
        ));
        assert!(arn_match(
            "arn:aws:cloudtrail:::trail/*",
            "arn:aws:cloudtrail:us-west-2:111122223333:trail/finance"
        ));
    }

    #[test]
    fn test_field_wildcards() {
        assert!(arn_match(
            "arn:aws:cloudtrail:*:111122223333:trail/*",
            "arn:aws:cloudtrail:us-west-2:111122223333:trail/finance"
        ));
        assert!(!arn_match(
            "arn:aws:cloudtrail:*:111122223333:trail/*",
            "arn:aws:cloudtrail:us-west-2:123456789012:trail/finance"
        ));
    }

    #[test]
    fn test_field_count_mismatch() {
        assert!(!arn_match(
            "arn:aws:cloudtrail:*:111122223333:trail/*",
            "arn:aws:cloudtrail:us-east-2:444455556666:user/111122223333:trail/finance"
        ));
        assert!(!arn_match(
            "arn:aws:cloudtrail:::",
            "arn:aws:cloudtrail:us-east-2:444455556666:user/111122223333:trail/finance"
        ));
        assert!(!arn_match("arn:aws:s3", "arn:aws:s3"));
    }

    #[test]
    fn test_fields_are_case_sensitive() {
        assert!(!arn_match("arn:aws:s3:::Bucket/*", "arn:aws:s3:::bucket/key"));
        assert!(!arn_match("arn:aws:S3:::bucket/*", "arn:aws:s3:::bucket/key"));
    }

    #[test]
    fn test_cached_matches_uncached() {
        let matcher = PatternMatcher::new(16);
        let pattern = "arn:aws:s3:::amzn-s3-demo-bucket-production/*";
        assert_eq!(
            arn_match_cached(&matcher, pattern, PROD_OBJECT),
            arn_match(pattern, PROD_OBJECT)
        );
    }

    #[test]
    fn test_arn_wildcards() {
        assert_eq!(arn_wildcards("arn:aws:s3:::bucket/*"), "arn:aws:s3:*:*:bucket/*");
        assert_eq!(
            arn_wildcards("arn:aws:sqs:us-east-2:111122223333:queue"),
            "arn:aws:sqs:us-east-2:111122223333:queue"
        );
    }

    #[test]
    fn test_account_id() {
        assert_eq!(account_id("arn:aws:iam::111122223333:user/alice"), Some("111122223333"));
        assert_eq!(account_id("arn:aws:iam"), None);
    }

    #[test]
    fn test_is_account_id() {
        assert!(is_account_id("111122223333"));
        assert!(!is_account_id("11112222333"));
        assert!(!is_account_id("1111222233334"));
        assert!(!is_account_id("11112222333a"));
        assert!(!is_account_id("١١١١٢٢٢٢٣٣٣٣"));
    }

    #[test]
    fn test_validate_arn_accepts() {
        assert!(validate_arn("*").is_ok());
        assert!(validate_arn("arn:aws:s3:::bucket/*").is_ok());
        assert!(validate_arn("arn:aws-cn:sqs:cn-north-1:111122223333:queue").is_ok());
        assert!(validate_arn("arn:*:ec2:*:*:instance/*").is_ok());
        assert!(validate_arn("arn:aws:s3:::bucket/${aws:username}").is_ok());
        assert!(validate_arn("arn:aws:sqs:us-east-2::${aws:PrincipalTag/team}-queue").is_ok());
    }

    #[test]
    fn test_validate_arn_rejects() {
        assert_eq!(
            validate_arn("arn:aws:s3"),
            Err(ArnError::Malformed("arn:aws:s3".to_string()))
        );
        assert_eq!(
            validate_arn("urn:aws:s3:::bucket"),
            Err(ArnError::Malformed("urn:aws:s3:::bucket".to_string()))
        );
        assert_eq!(
            validate_arn("arn:azure:s3:::bucket"),
            Err(ArnError::Partition("azure".to_string()))
        );
        assert_eq!(
            validate_arn("arn:aws:S3:::bucket"),
            Err(ArnError::Service("S3".to_string()))
        );
        assert_eq!(
            validate_arn("arn:aws::::bucket"),
            Err(ArnError::Service(String::new()))
        );
        assert_eq!(
            validate_arn("arn:aws:sqs:US-EAST-1::queue"),
            Err(ArnError::Region("US-EAST-1".to_string()))
        );
        assert_eq!(
            validate_arn("arn:aws:sqs:us-east-1:1234:queue"),
            Err(ArnError::AccountId("1234".to_string()))
        );
        assert_eq!(validate_arn("arn:aws:s3:::"), Err(ArnError::EmptyResource));
    }

    #[test]
    fn test_validate_arn_error_message() {
        let err = validate_arn("arn:azure:s3:::bucket").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid ARN partition \"azure\". Supported values *, aws, aws-cn, aws-us-gov."
        );
    }
}
