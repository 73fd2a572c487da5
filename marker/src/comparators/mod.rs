//! # Comparators
//!
//! Implementations of [`crate::traits::comparator::OutputComparator`].
//!
//! - [`policy_comparator`]: Normalises both sides according to an [`util::execution_config::OutputPolicy`]
//!   and compares the results. This is the default.
//! - [`exact_comparator`]: Byte-for-byte after line-ending normalisation; ignores the policy.

pub mod exact_comparator;
pub mod policy_comparator;
