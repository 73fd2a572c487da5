//! Shared configuration and lookup tables for the grading workspace.
//!
//! - [`config`]: process-level settings loaded from the environment.
//! - [`languages`]: the Language Registry (language id → sandbox recipe).
//! - [`execution_config`]: sandbox ceilings and per-assignment marking options.

pub mod config;
pub mod execution_config;
pub mod languages;
