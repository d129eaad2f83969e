//! Stack lifecycle orchestration.
//!
//! This module provides:
//! - `StackController` for create, update and delete
//! - The confirmation gate in front of update and delete
//! - Structured lifecycle outcomes for reporting

mod confirm;
mod controller;
mod outcome;

pub use confirm::confirm_mutation;
pub use controller::{PREVIEW_NAME_PREFIX, StackController, preview_name};
pub use outcome::LifecycleOutcome;
