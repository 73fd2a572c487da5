//! A comparator that requires the output to match exactly, **line order and whitespace included**.
//!
//! Only line endings are normalised. Useful for assignments where formatting is
//! itself being assessed.

use crate::traits::comparator::OutputComparator;
use util::execution_config::OutputPolicy;

/// Full marks only for an exact match. The assignment's policy is ignored.
pub struct ExactComparator;

impl OutputComparator for ExactComparator {
    fn compare(&self, actual: &str, expected: &str, _policy: &OutputPolicy) -> bool {
        actual.replace("\r\n", "\n") == expected.replace("\r\n", "\n")
    }
}
