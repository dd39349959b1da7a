//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::application`,
//! `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod error;
pub mod execution;
pub mod filter;
pub mod poll;
pub mod task_definition;
pub mod teardown;

#[allow(unused_imports)]
pub use error::{CloudError, ExecutionError, SettingsError, TeardownError};
#[allow(unused_imports)]
pub use execution::{ExecutionResult, aggregate_exit_code, execution_tags, validate_settings};
#[allow(unused_imports)]
pub use filter::{FilterChain, FilterRule, PatternSet};
#[allow(unused_imports)]
pub use poll::PollState;
#[allow(unused_imports)]
pub use teardown::{LogStream, TeardownAction, TeardownQueue};
