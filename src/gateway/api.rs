//! Provisioning gateway trait definition.
//!
//! This module defines the interface to the remote infrastructure API. The
//! lifecycle controller and the stack group only talk to this trait.

use async_trait::async_trait;

use crate::error::Result;

use super::types::{
    ChangePreview, DeleteArgs, Export, Page, ParameterDefinition, PreviewRequest, StackDetail,
    StackEvent, StackRequest, StackResource, StackSummary, TemplateValidation, WaitTarget,
};

/// Trait for the remote provisioning API.
///
/// Client errors are reported as `GatewayError::Client` carrying the API
/// message verbatim so callers can recognize specific conditions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProvisioningGateway: Send + Sync {
    /// Starts creating a stack.
    async fn create_stack(&self, request: &StackRequest) -> Result<()>;

    /// Starts updating a stack.
    async fn update_stack(&self, request: &StackRequest) -> Result<()>;

    /// Starts deleting a stack.
    async fn delete_stack(&self, stack_name: &str, args: &DeleteArgs) -> Result<()>;

    /// Describes a stack.
    ///
    /// Returns `None` if the stack does not exist.
    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDetail>>;

    /// Lists stacks whose status is in `statuses`.
    async fn list_stacks(
        &self,
        statuses: &[&'static str],
        next_token: Option<String>,
    ) -> Result<Page<StackSummary>>;

    /// Lists the resources of a stack.
    async fn list_stack_resources(
        &self,
        stack_name: &str,
        next_token: Option<String>,
    ) -> Result<Page<StackResource>>;

    /// Lists stack events, newest first.
    async fn list_stack_events(
        &self,
        stack_name: &str,
        next_token: Option<String>,
    ) -> Result<Page<StackEvent>>;

    /// Lists exported values across the account.
    async fn list_exports(&self, next_token: Option<String>) -> Result<Page<Export>>;

    /// Reads the parameters a template declares.
    async fn get_template_parameters(&self, template_url: &str) -> Result<Vec<ParameterDefinition>>;

    /// Validates a template.
    async fn validate_template(&self, template_url: &str) -> Result<TemplateValidation>;

    /// Starts computing a change preview; returns its id.
    async fn create_change_preview(&self, request: &PreviewRequest) -> Result<String>;

    /// Fetches a computed change preview.
    async fn describe_change_preview(
        &self,
        stack_name: &str,
        preview_name: &str,
    ) -> Result<ChangePreview>;

    /// Blocks until the resource reaches `target`.
    ///
    /// There is no timeout. A failure status ends the wait with
    /// `GatewayError::WaitFailed`.
    async fn wait_until(&self, stack_name: &str, target: &WaitTarget) -> Result<()>;
}
