//! Glob-style key patterns for `get_all_items`.
//!
//! `*` matches any run of characters, `?` exactly one; everything else is
//! literal. The pattern must cover the whole key.

use regex::Regex;

use poolcheck_contracts::error::{HarnessError, HarnessResult};

/// A compiled key pattern.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    source: String,
    regex: Regex,
}

impl KeyPattern {
    pub fn compile(pattern: &str) -> HarnessResult<Self> {
        if pattern.is_empty() {
            return Err(HarnessError::InvalidArgument {
                reason: "key pattern must not be empty".to_string(),
            });
        }

        let mut expr = String::with_capacity(pattern.len() + 8);
        expr.push('^');
        for c in pattern.chars() {
            match c {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|e| HarnessError::InvalidArgument {
            reason: format!("invalid key pattern '{pattern}': {e}"),
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_any_run() {
        let p = KeyPattern::compile("*test1*").unwrap();
        assert!(p.is_match("cache-test1"));
        assert!(p.is_match("test1"));
        assert!(!p.is_match("cache-test2"));
    }

    #[test]
    fn question_mark_matches_one_char() {
        let p = KeyPattern::compile("cache-test?").unwrap();
        assert!(p.is_match("cache-test3"));
        assert!(!p.is_match("cache-test10"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let p = KeyPattern::compile("a.b+c").unwrap();
        assert!(p.is_match("a.b+c"));
        assert!(!p.is_match("axbbc"));
    }

    #[test]
    fn empty_pattern_is_rejected() {
        assert!(matches!(
            KeyPattern::compile(""),
            Err(HarnessError::InvalidArgument { .. })
        ));
    }
}
