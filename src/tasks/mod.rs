//! Task registry and dispatch.
//!
//! This module provides:
//! - Task specifications built once from a stack group
//! - A registry receiving them in a single call
//! - Invocation parsing (`name[:arg,key=value]`) and dispatch

mod invocation;
mod provider;
mod registry;
mod runner;
mod spec;

pub use invocation::TaskInvocation;
pub use provider::{AwsClientProvider, ClientProvider};
pub use registry::{TaskRegistry, TaskTable};
pub use runner::{TaskReport, TaskRunner, console_url};
pub use spec::{TaskAction, TaskSpec, build_task_specs};
