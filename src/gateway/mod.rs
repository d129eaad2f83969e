//! Remote provisioning gateway.
//!
//! This module provides:
//! - The `ProvisioningGateway` trait the rest of the crate talks to
//! - SDK-independent request and response types
//! - A CloudFormation implementation and a lazily built session cache

mod api;
mod cloudformation;
mod session;
mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use api::ProvisioningGateway;
pub use cloudformation::{CloudFormationGateway, WaitState};
pub use session::{AwsSession, SessionCache};
pub use types::{
    ChangeDetail, ChangePreview, DeleteArgs, Export, LISTED_STACK_STATUSES, Page,
    ParameterDefinition, PreviewKind, PreviewRequest, ResolvedParameter, ResourceChange,
    StackArgs, StackDetail, StackEvent, StackOutput, StackRequest, StackResource, StackSummary,
    TemplateValidation, WaitTarget,
};

#[cfg(test)]
pub use api::MockProvisioningGateway;
