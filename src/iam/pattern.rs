//! Wildcard pattern matching for actions, resources and `StringLike`
//!
//! Supports wildcards:
//! - `*` - Matches zero or more characters (non-greedy)
//! - `?` - Matches exactly one character
//!
//! Every other character is matched literally. Matching is anchored at both
//! ends and case-insensitive unless requested otherwise.

use super::cache::PatternCache;
use regex::{Regex, RegexBuilder};
use tracing::{trace, warn};

/// Match `value` against a wildcard `pattern`, compiling it on the fly
///
/// # Examples
/// ```
/// use iam_policy_engine::iam::wildcard_match;
///
/// assert!(wildcard_match("iam:Get*", "iam:GetAccessKeyId", false));
/// assert!(wildcard_match("s3:getobject", "s3:GetObject", false));
/// assert!(!wildcard_match("s3:getobject", "s3:GetObject", true));
/// ```
pub fn wildcard_match(pattern: &str, value: &str, case_sensitive: bool) -> bool {
    match compile(pattern, case_sensitive) {
        Some(regex) => regex.is_match(value),
        None => pattern == value,
    }
}

/// Translate a wildcard pattern into an anchored regular expression source
pub(crate) fn to_regex_source(pattern: &str) -> String {
    let mut source = String::with_capacity(pattern.len() + 8);
    let mut literal = String::new();

    source.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' | '?' => {
                source.push_str(&regex::escape(&literal));
                literal.clear();
                source.push_str(if ch == '*' { ".*?" } else { "." });
            }
            _ => literal.push(ch),
        }
    }
    source.push_str(&regex::escape(&literal));
    source.push('$');

    source
}

fn compile(pattern: &str, case_sensitive: bool) -> Option<Regex> {
    let source = to_regex_source(pattern);
    match RegexBuilder::new(&source)
        .case_insensitive(!case_sensitive)
        .build()
    {
        Ok(regex) => Some(regex),
        Err(err) => {
            warn!("Wildcard pattern '{}' could not be compiled: {}", pattern, err);
            None
        }
    }
}

/// Wildcard matcher that memoizes compiled patterns
#[derive(Debug, Default)]
pub struct PatternMatcher {
    cache: PatternCache,
}

impl PatternMatcher {
    pub fn new(cache_capacity: usize) -> Self {
        PatternMatcher {
            cache: PatternCache::new(cache_capacity),
        }
    }

    /// Same semantics as [`wildcard_match`], reusing compiled patterns
    pub fn matches(&self, pattern: &str, value: &str, case_sensitive: bool) -> bool {
        if let Some(regex) = self.cache.get(pattern, case_sensitive) {
            return regex.is_match(value);
        }

        trace!("Compiling wildcard pattern '{}'", pattern);
        match compile(pattern, case_sensitive) {
            Some(regex) => {
                let matched = regex.is_match(value);
                self.cache.put(pattern, case_sensitive, regex);
                matched
            }
            None => pattern == value,
        }
    }

    pub fn cache(&self) -> &PatternCache {
        &self.cache
    }
}
