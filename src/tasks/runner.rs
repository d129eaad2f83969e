//! Task dispatch.

use serde::Serialize;
use tracing::info;

use crate::config::ConfirmationConfig;
use crate::context::ExecutionContext;
use crate::error::{ConfigError, Result};
use crate::group::{
    ExportRow, StackDescription, StackGroup, StackResources, StackRow, TemplateCheck,
};
use crate::lifecycle::{LifecycleOutcome, StackController};
use crate::prompt::Prompter;
use crate::publish::SyncReport;

use super::invocation::TaskInvocation;
use super::provider::ClientProvider;
use super::registry::TaskTable;
use super::spec::TaskAction;

/// Region used for console links when none is configured.
const FALLBACK_REGION: &str = "us-east-1";

/// What a task produced, for the reporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "report", content = "data", rename_all = "snake_case")]
pub enum TaskReport {
    /// The execution context changed.
    Context(String),
    /// A lifecycle operation finished.
    Lifecycle(LifecycleOutcome),
    /// `list_stacks` rows.
    Stacks(Vec<StackRow>),
    /// `describe_stack` result.
    Description(StackDescription),
    /// `list_resources` result.
    Resources(Vec<StackResources>),
    /// `list_exports` rows.
    Exports(Vec<ExportRow>),
    /// `validate_template` results.
    Templates(Vec<TemplateCheck>),
    /// `sync_templates` result.
    Synced(SyncReport),
    /// Console URL.
    Console(String),
}

/// Runs task invocations against a group.
pub struct TaskRunner<'a, P> {
    group: &'a StackGroup,
    tasks: &'a TaskTable,
    confirmation: Option<&'a ConfirmationConfig>,
    prompter: &'a dyn Prompter,
    clients: P,
}

impl<'a, P: ClientProvider> TaskRunner<'a, P> {
    /// Creates a runner.
    pub const fn new(
        group: &'a StackGroup,
        tasks: &'a TaskTable,
        prompter: &'a dyn Prompter,
        clients: P,
    ) -> Self {
        Self {
            group,
            tasks,
            confirmation: None,
            prompter,
            clients,
        }
    }

    /// Sets the rule that turns on confirmation after `set_env`.
    #[must_use]
    pub const fn with_confirmation(mut self, confirmation: Option<&'a ConfirmationConfig>) -> Self {
        self.confirmation = confirmation;
        self
    }

    /// Runs one invocation.
    ///
    /// # Errors
    ///
    /// Returns an error if the task is unknown, its arguments are invalid, or
    /// the operation fails.
    pub async fn run(
        &mut self,
        ctx: &mut ExecutionContext,
        invocation: &TaskInvocation,
    ) -> Result<TaskReport> {
        let action = self.tasks.get(&invocation.name)?.action.clone();
        info!("Running task {invocation}");

        match action {
            TaskAction::Create(alias) => {
                let overrides = invocation.expect_kwargs()?;
                let gateway = self.clients.gateway(ctx).await?;
                let controller = StackController::new(self.group, gateway.as_ref(), self.prompter);
                Ok(TaskReport::Lifecycle(controller.create(ctx, &alias, overrides).await?))
            }
            TaskAction::Update(alias) => {
                let overrides = invocation.expect_kwargs()?;
                let gateway = self.clients.gateway(ctx).await?;
                let controller = StackController::new(self.group, gateway.as_ref(), self.prompter);
                Ok(TaskReport::Lifecycle(controller.update(ctx, &alias, overrides).await?))
            }
            TaskAction::Delete(alias) => {
                invocation.expect_no_args()?;
                let gateway = self.clients.gateway(ctx).await?;
                let controller = StackController::new(self.group, gateway.as_ref(), self.prompter);
                Ok(TaskReport::Lifecycle(controller.delete(ctx, &alias).await?))
            }
            TaskAction::SetEnv => self.set_env(ctx, invocation),
            TaskAction::SetProfile => {
                let profile = invocation.required_arg("profile")?;
                ctx.set_profile(profile);
                Ok(TaskReport::Context(format!("AWS profile: {profile}")))
            }
            TaskAction::SetRegion => {
                let region = invocation.required_arg("region")?;
                ctx.set_region(region);
                Ok(TaskReport::Context(format!("AWS region: {region}")))
            }
            TaskAction::SetAccount => {
                let (key_id, secret) =
                    invocation.required_pair("access_key_id", "secret_access_key")?;
                ctx.set_account(key_id, secret);
                Ok(TaskReport::Context(format!("AWS access key: {key_id}")))
            }
            TaskAction::Force => {
                invocation.expect_no_args()?;
                ctx.force();
                Ok(TaskReport::Context(String::from("Confirmation disabled")))
            }
            TaskAction::SetParams => {
                let params = invocation.expect_kwargs()?;
                if params.is_empty() {
                    return Err(ConfigError::task_args(&invocation.name, "expects Key=Value").into());
                }
                ctx.set_params(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
                Ok(TaskReport::Context(format!(
                    "Parameters: {}",
                    params.keys().cloned().collect::<Vec<_>>().join(", ")
                )))
            }
            TaskAction::OpenConsole => self.open_console(ctx, invocation).await,
            TaskAction::ValidateTemplate => {
                let alias = invocation.optional_arg()?;
                let gateway = self.clients.gateway(ctx).await?;
                Ok(TaskReport::Templates(
                    self.group
                        .validate_templates(gateway.as_ref(), ctx, alias)
                        .await?,
                ))
            }
            TaskAction::SyncTemplates => {
                invocation.expect_no_args()?;
                let bucket = self.group.bucket(ctx)?;
                let prefix = self.group.prefix(ctx)?;
                let publisher = self.clients.publisher(ctx).await?;
                Ok(TaskReport::Synced(
                    publisher
                        .sync(&self.group.storage().local_dir, &bucket, &prefix)
                        .await?,
                ))
            }
            TaskAction::ListStacks => {
                invocation.expect_no_args()?;
                let gateway = self.clients.gateway(ctx).await?;
                Ok(TaskReport::Stacks(
                    self.group.list_stacks(gateway.as_ref(), ctx).await?,
                ))
            }
            TaskAction::DescribeStack => {
                let target = invocation.required_arg("stack")?;
                let gateway = self.clients.gateway(ctx).await?;
                Ok(TaskReport::Description(
                    self.group.describe_stack(gateway.as_ref(), ctx, target).await?,
                ))
            }
            TaskAction::ListResources => {
                invocation.expect_no_args()?;
                let gateway = self.clients.gateway(ctx).await?;
                Ok(TaskReport::Resources(
                    self.group.list_resources(gateway.as_ref(), ctx).await?,
                ))
            }
            TaskAction::ListExports => {
                invocation.expect_no_args()?;
                let gateway = self.clients.gateway(ctx).await?;
                Ok(TaskReport::Exports(
                    self.group.list_exports(gateway.as_ref(), ctx).await?,
                ))
            }
            TaskAction::EnableDryRun => {
                let detail = dry_run_detail(invocation)?;
                ctx.enable_dry_run(detail);
                Ok(TaskReport::Context(String::from(if detail {
                    "Dry-run enabled (detail)"
                } else {
                    "Dry-run enabled"
                })))
            }
        }
    }

    fn set_env(&self, ctx: &mut ExecutionContext, invocation: &TaskInvocation) -> Result<TaskReport> {
        let values = invocation.expect_kwargs()?;
        if values.is_empty() {
            return Err(ConfigError::task_args(&invocation.name, "expects Key=Value").into());
        }

        for (key, value) in values {
            ctx.set_var(key.as_str(), value.as_str());
        }

        if let Some(rule) = self.confirmation {
            rule.apply(ctx);
        }

        Ok(TaskReport::Context(
            values
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(", "),
        ))
    }

    async fn open_console(
        &mut self,
        ctx: &ExecutionContext,
        invocation: &TaskInvocation,
    ) -> Result<TaskReport> {
        let target = invocation.optional_arg()?;

        let region = match &ctx.aws().region {
            Some(region) => Some(region.clone()),
            None => self.clients.region(ctx).await?,
        };

        let stack_name = target
            .map(|t| self.group.resolve_name(t, ctx))
            .transpose()?;

        Ok(TaskReport::Console(console_url(
            region.as_deref().unwrap_or(FALLBACK_REGION),
            stack_name.as_deref(),
        )))
    }
}

/// CloudFormation console URL, optionally filtered to one stack.
#[must_use]
pub fn console_url(region: &str, stack_name: Option<&str>) -> String {
    let base = format!("https://console.aws.amazon.com/cloudformation/home?region={region}#/stacks");
    match stack_name {
        Some(name) => format!("{base}?filteringText={name}"),
        None => base,
    }
}

fn dry_run_detail(invocation: &TaskInvocation) -> Result<bool> {
    let value = match (invocation.args.as_slice(), invocation.kwargs.get("detail")) {
        ([], None) if invocation.kwargs.is_empty() => return Ok(false),
        ([value], None) if invocation.kwargs.is_empty() => value.as_str(),
        ([], Some(value)) if invocation.kwargs.len() == 1 => value.as_str(),
        _ => return Err(ConfigError::task_args(&invocation.name, "expects [detail]").into()),
    };

    match value.to_ascii_lowercase().as_str() {
        "detail" | "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => Err(ConfigError::task_args(
            &invocation.name,
            format!("unrecognized detail flag '{other}'"),
        )
        .into()),
    }
}
