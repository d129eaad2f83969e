// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![warn(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// Test modules assert with unwrap and panic.
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Stackfab
//!
//! Task-style lifecycle management for groups of CloudFormation stacks.
//!
//! ## Overview
//!
//! A stack group is declared once in `stackfab.yaml`. Each stack gets
//! `create_<alias>`, `update_<alias>` and `delete_<alias>` tasks, and the
//! group gets tasks to switch environment and AWS selection, list stacks,
//! resources and exports, describe a stack, validate templates and publish
//! them to S3.
//!
//! Tasks run in order, sharing one [`context::ExecutionContext`]:
//!
//! ```text
//! stackfab run set_env:EnvName=production enable_dryrun update_foo
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`context`]: Execution context and `%(key)s` placeholders
//! - [`gateway`]: Provisioning API abstraction and CloudFormation client
//! - [`resolver`]: Layered template parameter resolution
//! - [`lifecycle`]: Create, update and delete with dry-run and confirmation
//! - [`group`]: Stack group registry and aggregate listings
//! - [`publish`]: Template sync to S3
//! - [`tasks`]: Task registration, invocation parsing and dispatch
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! templates:
//!   bucket: my-templates
//!   prefix: "example/%(EnvName)s"
//! context:
//!   EnvName: dev
//! stacks:
//!   - alias: foo
//!     stack_name: "stackfab-%(EnvName)s-foo"
//!     template: foo.yaml
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod group;
pub mod lifecycle;
pub mod prompt;
pub mod publish;
pub mod resolver;
pub mod tasks;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, StackfabConfig};
pub use context::ExecutionContext;
pub use error::{Result, StackfabError};
pub use gateway::{CloudFormationGateway, ProvisioningGateway};
pub use group::{StackDefinition, StackGroup};
pub use lifecycle::{LifecycleOutcome, StackController};
pub use publish::{ArtifactPublisher, S3TemplatePublisher};
pub use resolver::ParameterResolver;
pub use tasks::{TaskInvocation, TaskReport, TaskRunner, TaskTable};
