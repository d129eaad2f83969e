//! CloudFormation implementation of the provisioning gateway.
//!
//! Change previews map to change sets. Waits poll the describe calls until
//! a terminal status; there is no overall timeout.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_cloudformation::Client;
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudformation::primitives::DateTime as AwsDateTime;
use aws_sdk_cloudformation::types::{
    Capability, ChangeSetType, OnFailure, Parameter, StackStatus, Tag,
};
use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::error::{GatewayError, Result, StackfabError};

use super::api::ProvisioningGateway;
use super::types::{
    ChangeDetail, ChangePreview, DeleteArgs, Export, Page, ParameterDefinition, PreviewRequest,
    ResolvedParameter, ResourceChange, StackArgs, StackDetail, StackEvent, StackOutput,
    StackRequest, StackResource, StackSummary, TemplateValidation, WaitTarget,
};

/// Delay between status polls in seconds.
const POLL_INTERVAL_SECS: u64 = 5;

/// Fragment of the error message returned for unknown stacks.
const DOES_NOT_EXIST: &str = "does not exist";

/// CloudFormation-backed gateway.
#[derive(Debug, Clone)]
pub struct CloudFormationGateway {
    /// SDK client.
    client: Client,
    /// Delay between status polls.
    poll_interval: Duration,
}

/// Progress of a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    /// Target status reached.
    Done,
    /// Still in progress.
    Pending,
    /// A failure status was reached.
    Failed,
}

impl CloudFormationGateway {
    /// Creates a gateway from an SDK client.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self {
            client,
            poll_interval: Duration::from_secs(POLL_INTERVAL_SECS),
        }
    }

    /// Overrides the delay between status polls.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Classifies a stack status against a wait target.
    #[must_use]
    pub fn classify_stack_status(target: &WaitTarget, status: &str) -> WaitState {
        let (done, failed): (&[&str], &[&str]) = match target {
            WaitTarget::StackCreateComplete => (
                &["CREATE_COMPLETE"],
                &[
                    "CREATE_FAILED",
                    "DELETE_COMPLETE",
                    "DELETE_FAILED",
                    "ROLLBACK_FAILED",
                    "ROLLBACK_COMPLETE",
                ],
            ),
            WaitTarget::StackUpdateComplete => (
                &["UPDATE_COMPLETE"],
                &[
                    "UPDATE_FAILED",
                    "UPDATE_ROLLBACK_FAILED",
                    "UPDATE_ROLLBACK_COMPLETE",
                ],
            ),
            WaitTarget::StackDeleteComplete => (
                &["DELETE_COMPLETE"],
                &[
                    "DELETE_FAILED",
                    "CREATE_FAILED",
                    "ROLLBACK_FAILED",
                    "UPDATE_ROLLBACK_FAILED",
                ],
            ),
            WaitTarget::PreviewComplete { .. } => (
                &["CREATE_COMPLETE"],
                &["FAILED", "DELETE_COMPLETE", "DELETE_FAILED"],
            ),
        };

        if done.contains(&status) {
            WaitState::Done
        } else if failed.contains(&status) {
            WaitState::Failed
        } else {
            WaitState::Pending
        }
    }

    /// Polls the stack status once.
    async fn stack_status(&self, stack_name: &str) -> Result<Option<(String, Option<String>)>> {
        Ok(self
            .describe_stack(stack_name)
            .await?
            .map(|detail| (detail.status, detail.status_reason)))
    }

    /// Polls the change set status once.
    async fn preview_status(
        &self,
        stack_name: &str,
        preview_name: &str,
    ) -> Result<(String, Option<String>)> {
        let output = self
            .client
            .describe_change_set()
            .stack_name(stack_name)
            .change_set_name(preview_name)
            .send()
            .await
            .map_err(sdk_error)?;

        Ok((output.status().text(), output.status_reason().opt_text()))
    }
}

#[async_trait]
impl ProvisioningGateway for CloudFormationGateway {
    async fn create_stack(&self, request: &StackRequest) -> Result<()> {
        debug!("CreateStack {}", request.stack_name);
        let args = &request.args;

        self.client
            .create_stack()
            .stack_name(&request.stack_name)
            .template_url(&request.template_url)
            .set_parameters(Some(to_parameters(&request.parameters)))
            .set_capabilities(to_capabilities(args))
            .set_role_arn(args.role_arn.clone())
            .set_tags(to_tags(args))
            .set_notification_arns(args.notification_arns.clone())
            .set_timeout_in_minutes(args.timeout_in_minutes)
            .set_disable_rollback(args.disable_rollback)
            .set_on_failure(args.on_failure.as_deref().map(OnFailure::from))
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(())
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<()> {
        debug!("UpdateStack {}", request.stack_name);
        let args = &request.args;

        self.client
            .update_stack()
            .stack_name(&request.stack_name)
            .template_url(&request.template_url)
            .set_parameters(Some(to_parameters(&request.parameters)))
            .set_capabilities(to_capabilities(args))
            .set_role_arn(args.role_arn.clone())
            .set_tags(to_tags(args))
            .set_notification_arns(args.notification_arns.clone())
            .set_disable_rollback(args.disable_rollback)
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(())
    }

    async fn delete_stack(&self, stack_name: &str, args: &DeleteArgs) -> Result<()> {
        debug!("DeleteStack {stack_name}");

        self.client
            .delete_stack()
            .stack_name(stack_name)
            .set_retain_resources(args.retain_resources.clone())
            .set_role_arn(args.role_arn.clone())
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(())
    }

    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDetail>> {
        trace!("DescribeStacks {stack_name}");

        let output = match self.client.describe_stacks().stack_name(stack_name).send().await {
            Ok(output) => output,
            Err(e) => {
                let err = sdk_error(e);
                if is_missing_stack(&err) {
                    return Ok(None);
                }
                return Err(err);
            }
        };

        let Some(stack) = output.stacks().first() else {
            return Ok(None);
        };

        Ok(Some(StackDetail {
            id: stack.stack_id().opt_text(),
            name: stack.stack_name().text(),
            status: stack.stack_status().text(),
            status_reason: stack.stack_status_reason().opt_text(),
            description: stack.description().opt_text(),
            created_at: stack.creation_time().utc(),
            updated_at: stack.last_updated_time().utc(),
            parameters: stack
                .parameters()
                .iter()
                .map(|p| {
                    ResolvedParameter::new(p.parameter_key().text(), p.parameter_value().text())
                })
                .collect(),
            outputs: stack
                .outputs()
                .iter()
                .map(|o| StackOutput {
                    key: o.output_key().text(),
                    value: o.output_value().text(),
                    export_name: o.export_name().opt_text(),
                    description: o.description().opt_text(),
                })
                .collect(),
        }))
    }

    async fn list_stacks(
        &self,
        statuses: &[&'static str],
        next_token: Option<String>,
    ) -> Result<Page<StackSummary>> {
        let output = self
            .client
            .list_stacks()
            .set_stack_status_filter(Some(
                statuses.iter().map(|s| StackStatus::from(*s)).collect(),
            ))
            .set_next_token(next_token)
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(Page {
            items: output
                .stack_summaries()
                .iter()
                .map(|s| StackSummary {
                    name: s.stack_name().text(),
                    status: s.stack_status().text(),
                    created_at: s.creation_time().utc(),
                    updated_at: s.last_updated_time().utc(),
                    description: s.template_description().opt_text(),
                })
                .collect(),
            next_token: output.next_token().opt_text(),
        })
    }

    async fn list_stack_resources(
        &self,
        stack_name: &str,
        next_token: Option<String>,
    ) -> Result<Page<StackResource>> {
        let output = self
            .client
            .list_stack_resources()
            .stack_name(stack_name)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(Page {
            items: output
                .stack_resource_summaries()
                .iter()
                .map(|r| StackResource {
                    logical_id: r.logical_resource_id().text(),
                    physical_id: r.physical_resource_id().opt_text(),
                    resource_type: r.resource_type().text(),
                    status: r.resource_status().text(),
                    updated_at: r.last_updated_timestamp().utc(),
                })
                .collect(),
            next_token: output.next_token().opt_text(),
        })
    }

    async fn list_stack_events(
        &self,
        stack_name: &str,
        next_token: Option<String>,
    ) -> Result<Page<StackEvent>> {
        let output = self
            .client
            .describe_stack_events()
            .stack_name(stack_name)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(Page {
            items: output
                .stack_events()
                .iter()
                .map(|e| StackEvent {
                    timestamp: e.timestamp().utc(),
                    logical_id: e.logical_resource_id().text(),
                    resource_type: e.resource_type().text(),
                    status: e.resource_status().text(),
                    reason: e.resource_status_reason().opt_text(),
                })
                .collect(),
            next_token: output.next_token().opt_text(),
        })
    }

    async fn list_exports(&self, next_token: Option<String>) -> Result<Page<Export>> {
        let output = self
            .client
            .list_exports()
            .set_next_token(next_token)
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(Page {
            items: output
                .exports()
                .iter()
                .map(|e| Export {
                    exporting_stack_id: e.exporting_stack_id().text(),
                    name: e.name().text(),
                    value: e.value().text(),
                })
                .collect(),
            next_token: output.next_token().opt_text(),
        })
    }

    async fn get_template_parameters(&self, template_url: &str) -> Result<Vec<ParameterDefinition>> {
        debug!("GetTemplateSummary {template_url}");

        let output = self
            .client
            .get_template_summary()
            .template_url(template_url)
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(output
            .parameters()
            .iter()
            .map(|p| ParameterDefinition {
                key: p.parameter_key().text(),
                default_value: p.default_value().opt_text(),
                description: p.description().opt_text(),
                no_echo: p.no_echo().flag(),
            })
            .collect())
    }

    async fn validate_template(&self, template_url: &str) -> Result<TemplateValidation> {
        debug!("ValidateTemplate {template_url}");

        let output = self
            .client
            .validate_template()
            .template_url(template_url)
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(TemplateValidation {
            description: output.description().opt_text(),
            parameters: output
                .parameters()
                .iter()
                .map(|p| ParameterDefinition {
                    key: p.parameter_key().text(),
                    default_value: p.default_value().opt_text(),
                    description: p.description().opt_text(),
                    no_echo: p.no_echo().flag(),
                })
                .collect(),
            capabilities: output.capabilities().iter().map(|c| c.as_str().to_string()).collect(),
        })
    }

    async fn create_change_preview(&self, request: &PreviewRequest) -> Result<String> {
        let stack = &request.stack;
        let args = &stack.args;
        debug!(
            "CreateChangeSet {} ({}) for {}",
            request.preview_name,
            request.kind.as_str(),
            stack.stack_name
        );

        let output = self
            .client
            .create_change_set()
            .stack_name(&stack.stack_name)
            .change_set_name(&request.preview_name)
            .change_set_type(ChangeSetType::from(request.kind.as_str()))
            .template_url(&stack.template_url)
            .set_parameters(Some(to_parameters(&stack.parameters)))
            .set_capabilities(to_capabilities(args))
            .set_role_arn(args.role_arn.clone())
            .set_tags(to_tags(args))
            .set_notification_arns(args.notification_arns.clone())
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(output.id().text())
    }

    async fn describe_change_preview(
        &self,
        stack_name: &str,
        preview_name: &str,
    ) -> Result<ChangePreview> {
        let mut preview: Option<ChangePreview> = None;
        let mut next_token = None;

        loop {
            let output = self
                .client
                .describe_change_set()
                .stack_name(stack_name)
                .change_set_name(preview_name)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(sdk_error)?;

            let changes = output
                .changes()
                .iter()
                .filter_map(|c| c.resource_change())
                .map(|rc| ResourceChange {
                    action: rc.action().text(),
                    logical_id: rc.logical_resource_id().text(),
                    physical_id: rc.physical_resource_id().opt_text(),
                    resource_type: rc.resource_type().text(),
                    replacement: rc.replacement().opt_text(),
                    details: rc
                        .details()
                        .iter()
                        .map(|d| ChangeDetail {
                            attribute: d.target().and_then(|t| t.attribute().opt_text()),
                            name: d.target().and_then(|t| t.name().opt_text()),
                            requires_recreation: d
                                .target()
                                .and_then(|t| t.requires_recreation().opt_text()),
                            evaluation: d.evaluation().opt_text(),
                            change_source: d.change_source().opt_text(),
                            causing_entity: d.causing_entity().opt_text(),
                        })
                        .collect(),
                });

            match preview.as_mut() {
                Some(existing) => existing.changes.extend(changes),
                None => {
                    preview = Some(ChangePreview {
                        stack_name: output
                            .stack_name()
                            .opt_text()
                            .unwrap_or_else(|| stack_name.to_string()),
                        id: output.change_set_id().opt_text(),
                        name: preview_name.to_string(),
                        status: output.status().text(),
                        status_reason: output.status_reason().opt_text(),
                        parameters: output
                            .parameters()
                            .iter()
                            .map(|p| {
                                ResolvedParameter::new(
                                    p.parameter_key().text(),
                                    p.parameter_value().text(),
                                )
                            })
                            .collect(),
                        changes: changes.collect(),
                    });
                }
            }

            next_token = output.next_token().opt_text();
            if next_token.is_none() {
                break;
            }
        }

        preview.ok_or_else(|| GatewayError::invalid_response("Empty change set description").into())
    }

    async fn wait_until(&self, stack_name: &str, target: &WaitTarget) -> Result<()> {
        debug!("Waiting for {target} on {stack_name}");

        loop {
            let (status, reason) = match target {
                WaitTarget::PreviewComplete { preview_name } => {
                    self.preview_status(stack_name, preview_name).await?
                }
                WaitTarget::StackDeleteComplete => match self.stack_status(stack_name).await? {
                    Some(status) => status,
                    None => return Ok(()),
                },
                _ => self.stack_status(stack_name).await?.ok_or_else(|| {
                    GatewayError::client(
                        Some("ValidationError"),
                        format!("Stack with id {stack_name} {DOES_NOT_EXIST}"),
                    )
                })?,
            };

            match Self::classify_stack_status(target, &status) {
                WaitState::Done => return Ok(()),
                WaitState::Failed => {
                    return Err(GatewayError::WaitFailed {
                        resource: stack_name.to_string(),
                        status,
                        reason: reason.unwrap_or_default(),
                    }
                    .into());
                }
                WaitState::Pending => {
                    trace!("{stack_name} is {status}");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

/// Maps an SDK error to a gateway error.
///
/// Service errors become client errors carrying the API message verbatim.
fn sdk_error<E, R>(err: SdkError<E, R>) -> StackfabError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    if matches!(err, SdkError::ServiceError(_)) {
        let message = err
            .message()
            .map_or_else(|| DisplayErrorContext(&err).to_string(), String::from);
        GatewayError::client(err.code(), message).into()
    } else {
        GatewayError::Connection {
            message: DisplayErrorContext(&err).to_string(),
        }
        .into()
    }
}

fn is_missing_stack(err: &StackfabError) -> bool {
    matches!(
        err,
        StackfabError::Gateway(GatewayError::Client { message, .. }) if message.contains(DOES_NOT_EXIST)
    )
}

fn to_parameters(parameters: &[ResolvedParameter]) -> Vec<Parameter> {
    parameters
        .iter()
        .map(|p| {
            Parameter::builder()
                .parameter_key(&p.key)
                .parameter_value(&p.value)
                .build()
        })
        .collect()
}

fn to_capabilities(args: &StackArgs) -> Option<Vec<Capability>> {
    args.capabilities
        .as_ref()
        .map(|caps| caps.iter().map(|c| Capability::from(c.as_str())).collect())
}

fn to_tags(args: &StackArgs) -> Option<Vec<Tag>> {
    args.tags.as_ref().map(|tags| {
        tags.iter()
            .map(|(key, value)| Tag::builder().key(key).value(value).build())
            .collect()
    })
}

/// Normalizes SDK string-ish accessors (plain or optional, str or enum).
trait Text {
    fn opt_text(self) -> Option<String>;

    fn text(self) -> String
    where
        Self: Sized,
    {
        self.opt_text().unwrap_or_default()
    }
}

impl<T: AsRef<str> + ?Sized> Text for &T {
    fn opt_text(self) -> Option<String> {
        Some(self.as_ref().to_string())
    }
}

impl<T: AsRef<str> + ?Sized> Text for Option<&T> {
    fn opt_text(self) -> Option<String> {
        self.map(|v| v.as_ref().to_string())
    }
}

/// Normalizes SDK timestamp accessors.
trait Timestamp {
    fn utc(self) -> Option<DateTime<Utc>>;
}

impl Timestamp for &AwsDateTime {
    fn utc(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.secs(), self.subsec_nanos())
    }
}

impl Timestamp for Option<&AwsDateTime> {
    fn utc(self) -> Option<DateTime<Utc>> {
        self.and_then(Timestamp::utc)
    }
}

/// Normalizes SDK boolean accessors.
trait Flag {
    fn flag(self) -> bool;
}

impl Flag for bool {
    fn flag(self) -> bool {
        self
    }
}

impl Flag for Option<bool> {
    fn flag(self) -> bool {
        self.unwrap_or(false)
    }
}
