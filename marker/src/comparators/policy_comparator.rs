//! A comparator driven by the assignment's [`OutputPolicy`].
//!
//! Both sides go through the same normalisation before an exact string comparison:
//!
//! 1. `\r\n` becomes `\n`, so output written on Windows matches.
//! 2. `collapse_internal_whitespace`: every run of whitespace (newlines included)
//!    becomes one space.
//! 3. `trim_whitespace`: leading and trailing whitespace is removed.
//! 4. Unless `case_sensitive`, both sides are lower-cased.

use std::borrow::Cow;

use crate::traits::comparator::OutputComparator;
use util::execution_config::OutputPolicy;

/// Default comparator for grading runs.
pub struct PolicyComparator;

impl OutputComparator for PolicyComparator {
    fn compare(&self, actual: &str, expected: &str, policy: &OutputPolicy) -> bool {
        normalize(actual, policy) == normalize(expected, policy)
    }
}

/// Applies `policy` to `text`. Borrowing where nothing changes.
pub fn normalize<'a>(text: &'a str, policy: &OutputPolicy) -> Cow<'a, str> {
    let mut out: Cow<'a, str> = if text.contains("\r\n") {
        Cow::Owned(text.replace("\r\n", "\n"))
    } else {
        Cow::Borrowed(text)
    };

    if policy.collapse_internal_whitespace {
        let collapsed = collapse_whitespace(&out);
        out = Cow::Owned(collapsed);
    }

    if policy.trim_whitespace {
        out = match out {
            Cow::Borrowed(s) => Cow::Borrowed(s.trim()),
            Cow::Owned(s) => Cow::Owned(s.trim().to_string()),
        };
    }

    if !policy.case_sensitive {
        out = Cow::Owned(out.to_lowercase());
    }
    out
}

fn collapse_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                result.push(' ');
                in_space = true;
            }
        } else {
            result.push(c);
            in_space = false;
        }
    }
    result
}
