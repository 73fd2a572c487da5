//!
//! Traits Module
//!
//! Core traits used by the grading engine for extensibility and abstraction.
//!
//! - [`comparator`]: Decides whether actual program output matches the expected output.
//! - [`executor`]: Runs one program in a sandbox. Implemented by the container manager,
//!   and by scripted fakes in tests.

pub mod comparator;
pub mod executor;
