//! Execution context for stackfab runs.
//!
//! This module holds the explicit, run-wide context (environment values,
//! parameter overrides, AWS selection, mode flags) and the placeholder
//! substitution used for stack names and template locations.

mod execution;
mod template;

pub use execution::{AwsSelection, ExecutionContext};
pub use template::{interpolate, placeholders};
