//! Shared configuration and tooling for the beneficiary risk portal.
//!
//! - YAML configuration with environment overrides
//! - `!include` merging for per-environment config files
//! - Test errors, assertion macros and request builders

pub mod config;
pub mod yaml_include;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

#[cfg(any(test, feature = "test-helpers"))]
pub use test_helpers::{generate_unique_id, test_config_yaml, TestError, TestResult};
