//! Create, update and delete of a single stack definition.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::{info, warn};

use crate::context::ExecutionContext;
use crate::error::{GatewayError, Result};
use crate::gateway::{
    ParameterDefinition, PreviewKind, PreviewRequest, ProvisioningGateway, StackArgs,
    StackRequest, WaitTarget,
};
use crate::group::{StackDefinition, StackGroup};
use crate::prompt::Prompter;
use crate::resolver::{Operation, ParameterResolver};

use super::confirm::confirm_mutation;
use super::outcome::LifecycleOutcome;

/// Prefix of change preview names.
pub const PREVIEW_NAME_PREFIX: &str = "stackfab-preview-";

/// Builds a unique change preview name from a timestamp.
#[must_use]
pub fn preview_name(now: DateTime<Utc>) -> String {
    format!("{PREVIEW_NAME_PREFIX}{}", now.format("%Y%m%d%H%M%S%3f"))
}

/// Stack-independent part of a create or update.
struct Prepared<'d> {
    definition: &'d StackDefinition,
    stack_name: String,
    template_url: String,
    args: StackArgs,
}

/// Drives lifecycle operations for the stacks of one group.
pub struct StackController<'a> {
    group: &'a StackGroup,
    gateway: &'a dyn ProvisioningGateway,
    prompter: &'a dyn Prompter,
}

impl<'a> StackController<'a> {
    /// Creates a controller.
    #[must_use]
    pub const fn new(
        group: &'a StackGroup,
        gateway: &'a dyn ProvisioningGateway,
        prompter: &'a dyn Prompter,
    ) -> Self {
        Self {
            group,
            gateway,
            prompter,
        }
    }

    /// Creates the stack, or previews its creation in dry-run.
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter has no value or a gateway call fails.
    pub async fn create(
        &self,
        ctx: &mut ExecutionContext,
        alias: &str,
        overrides: &IndexMap<String, String>,
    ) -> Result<LifecycleOutcome> {
        let prepared = self.prepare(ctx, alias, overrides)?;
        let declared = self.declared_parameters(&prepared).await?;
        let parameters = ParameterResolver::new(self.prompter).resolve(
            &declared,
            ctx,
            None,
            Operation::Create,
        )?;

        let request = StackRequest {
            stack_name: prepared.stack_name.clone(),
            template_url: prepared.template_url,
            parameters,
            args: prepared.args,
        };

        if ctx.is_dry_run() {
            return self.preview(ctx, PreviewKind::Create, request).await;
        }

        info!("Creating stack {} ({})", request.stack_name, prepared.definition.alias);
        self.gateway.create_stack(&request).await?;
        self.gateway
            .wait_until(&request.stack_name, &WaitTarget::StackCreateComplete)
            .await?;

        info!("Stack {} created", request.stack_name);
        Ok(LifecycleOutcome::Created {
            stack_name: request.stack_name,
        })
    }

    /// Updates the stack, or previews the update in dry-run.
    ///
    /// An update with nothing to change is reported as `NoChanges`.
    ///
    /// # Errors
    ///
    /// Returns an error if the operator declines, the stack does not exist,
    /// or a gateway call fails for another reason than a no-op.
    pub async fn update(
        &self,
        ctx: &mut ExecutionContext,
        alias: &str,
        overrides: &IndexMap<String, String>,
    ) -> Result<LifecycleOutcome> {
        let prepared = self.prepare(ctx, alias, overrides)?;
        confirm_mutation(ctx, self.prompter)?;

        let deployed = self
            .gateway
            .describe_stack(&prepared.stack_name)
            .await?
            .ok_or_else(|| {
                GatewayError::client(
                    Some("ValidationError"),
                    format!("Stack with id {} does not exist", prepared.stack_name),
                )
            })?;
        let previous = deployed.parameter_map();

        let declared = self.declared_parameters(&prepared).await?;
        let parameters = ParameterResolver::new(self.prompter).resolve(
            &declared,
            ctx,
            Some(&previous),
            Operation::Update,
        )?;

        let request = StackRequest {
            stack_name: prepared.stack_name.clone(),
            template_url: prepared.template_url,
            parameters,
            args: prepared.args,
        };

        if ctx.is_dry_run() {
            return self.preview(ctx, PreviewKind::Update, request).await;
        }

        info!("Updating stack {} ({})", request.stack_name, prepared.definition.alias);
        match self.gateway.update_stack(&request).await {
            Ok(()) => {}
            Err(e) if e.is_no_updates() => {
                info!("No changes for stack {}", request.stack_name);
                return Ok(LifecycleOutcome::NoChanges {
                    stack_name: request.stack_name,
                });
            }
            Err(e) => return Err(e),
        }

        self.gateway
            .wait_until(&request.stack_name, &WaitTarget::StackUpdateComplete)
            .await?;

        info!("Stack {} updated", request.stack_name);
        Ok(LifecycleOutcome::Updated {
            stack_name: request.stack_name,
        })
    }

    /// Deletes the stack.
    ///
    /// Only `retain_resources` and `role_arn` are passed on. There is no
    /// preview for deletion, so dry-run does not apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the operator declines or a gateway call fails.
    pub async fn delete(&self, ctx: &mut ExecutionContext, alias: &str) -> Result<LifecycleOutcome> {
        let definition = self.group.get(alias)?;
        let stack_name = definition.actual_name(ctx)?;

        confirm_mutation(ctx, self.prompter)?;

        if ctx.is_dry_run() {
            warn!("Dry-run has no effect on delete; deleting {stack_name}");
        }

        let args = self.group.effective_args(definition).delete_subset();

        info!("Deleting stack {stack_name} ({alias})");
        self.gateway.delete_stack(&stack_name, &args).await?;
        self.gateway
            .wait_until(&stack_name, &WaitTarget::StackDeleteComplete)
            .await?;

        info!("Stack {stack_name} deleted");
        Ok(LifecycleOutcome::Deleted { stack_name })
    }

    fn prepare(
        &self,
        ctx: &mut ExecutionContext,
        alias: &str,
        overrides: &IndexMap<String, String>,
    ) -> Result<Prepared<'a>> {
        let definition = self.group.get(alias)?;
        ctx.set_params(overrides.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        Ok(Prepared {
            definition,
            stack_name: definition.actual_name(ctx)?,
            template_url: self.group.template_url(definition, ctx)?,
            args: self.group.effective_args(definition),
        })
    }

    async fn declared_parameters(&self, prepared: &Prepared<'_>) -> Result<Vec<ParameterDefinition>> {
        self.gateway
            .get_template_parameters(&prepared.template_url)
            .await
    }

    async fn preview(
        &self,
        ctx: &ExecutionContext,
        kind: PreviewKind,
        stack: StackRequest,
    ) -> Result<LifecycleOutcome> {
        let request = PreviewRequest {
            preview_name: preview_name(Utc::now()),
            kind,
            stack,
        };
        let stack_name = request.stack.stack_name.clone();

        info!(
            "Creating {} change preview {} for {stack_name}",
            kind.as_str(),
            request.preview_name
        );
        self.gateway.create_change_preview(&request).await?;

        let target = WaitTarget::PreviewComplete {
            preview_name: request.preview_name.clone(),
        };
        match self.gateway.wait_until(&stack_name, &target).await {
            Ok(()) => {}
            Err(e) if e.is_no_changes() => {
                info!("Change preview for {stack_name} has no changes");
                return Ok(LifecycleOutcome::NoChanges { stack_name });
            }
            Err(e) => return Err(e),
        }

        let preview = self
            .gateway
            .describe_change_preview(&stack_name, &request.preview_name)
            .await?;

        Ok(LifecycleOutcome::Previewed {
            preview,
            detail: ctx.dry_run_detail(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ResolveError, StackfabError};
    use crate::gateway::fake::{Call, FakeGateway};
    use crate::gateway::{
        DeleteArgs, MockProvisioningGateway, ResolvedParameter, ResourceChange,
    };
    use crate::group::TemplateStorage;
    use crate::prompt::ScriptedPrompter;
    use chrono::TimeZone;

    const FOO_URL: &str = "https://s3.amazonaws.com/bucket/dev/foo.yaml";

    fn group() -> StackGroup {
        let mut group = StackGroup::new(
            TemplateStorage::new("bucket", "%(EnvName)s", "templates"),
            StackArgs {
                capabilities: Some(vec![String::from("CAPABILITY_IAM")]),
                role_arn: Some(String::from("arn:aws:iam::1:role/cfn")),
                ..StackArgs::default()
            },
        );
        group
            .define_stack(
                StackDefinition::new("foo", "app-%(EnvName)s-foo", "foo.yaml").with_args(
                    StackArgs {
                        tags: Some(IndexMap::from([(
                            String::from("example"),
                            String::from("EXAMPLE"),
                        )])),
                        retain_resources: Some(vec![String::from("Bucket")]),
                        ..StackArgs::default()
                    },
                ),
            )
            .unwrap();
        group
    }

    fn ctx() -> ExecutionContext {
        let mut ctx = ExecutionContext::new();
        ctx.set_var("EnvName", "dev");
        ctx
    }

    fn no_overrides() -> IndexMap<String, String> {
        IndexMap::new()
    }

    #[test]
    fn test_preview_name_has_millisecond_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).single().unwrap()
            + chrono::Duration::milliseconds(42);
        assert_eq!(preview_name(now), "stackfab-preview-20240305070809042");
    }

    #[tokio::test]
    async fn test_create_with_context_override() {
        let group = group();
        let gateway = FakeGateway::new()
            .with_template_parameters(FOO_URL, vec![ParameterDefinition::new("AppEnv")]);
        let prompter = ScriptedPrompter::new();
        let mut ctx = ctx();
        ctx.set_params([("AppEnv", "prod")]);

        let outcome = StackController::new(&group, &gateway, &prompter)
            .create(&mut ctx, "foo", &no_overrides())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            LifecycleOutcome::Created {
                stack_name: String::from("app-dev-foo")
            }
        );
        assert!(prompter.asked().is_empty());

        let calls = gateway.calls();
        let Call::Create(request) = &calls[0] else {
            panic!("expected create, got {calls:?}");
        };
        assert_eq!(request.parameters, vec![ResolvedParameter::new("AppEnv", "prod")]);
        assert_eq!(request.template_url, FOO_URL);
        assert_eq!(request.args.capabilities, Some(vec![String::from("CAPABILITY_IAM")]));
        assert_eq!(
            calls[1],
            Call::Wait(String::from("app-dev-foo"), WaitTarget::StackCreateComplete)
        );
    }

    #[tokio::test]
    async fn test_inline_overrides_apply_to_context() {
        let group = group();
        let gateway = FakeGateway::new()
            .with_template_parameters(FOO_URL, vec![ParameterDefinition::new("AppEnv")]);
        let prompter = ScriptedPrompter::new();
        let mut ctx = ctx();
        let overrides = IndexMap::from([(String::from("AppEnv"), String::from("qa"))]);

        StackController::new(&group, &gateway, &prompter)
            .create(&mut ctx, "foo", &overrides)
            .await
            .unwrap();

        assert_eq!(ctx.parameter_override("AppEnv"), Some("qa"));
    }

    #[tokio::test]
    async fn test_create_missing_parameter_makes_no_call() {
        let group = group();
        let gateway = FakeGateway::new()
            .with_template_parameters(FOO_URL, vec![ParameterDefinition::new("KeyName")]);
        let prompter = ScriptedPrompter::new().answer("");
        let mut ctx = ctx();

        let err = StackController::new(&group, &gateway, &prompter)
            .create(&mut ctx, "foo", &no_overrides())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StackfabError::Resolve(ResolveError::MissingParameter { ref key }) if key == "KeyName"
        ));
        assert!(gateway.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_create_client_error_propagates() {
        let group = group();
        let gateway = FakeGateway::new().with_stack("app-dev-foo", "CREATE_COMPLETE", &[]);
        let prompter = ScriptedPrompter::new();
        let mut ctx = ctx();

        let err = StackController::new(&group, &gateway, &prompter)
            .create(&mut ctx, "foo", &no_overrides())
            .await
            .unwrap_err();

        assert!(err.is_client_error());
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_create_dry_run_previews_without_creating() {
        let group = group();
        let change = ResourceChange {
            action: String::from("Add"),
            logical_id: String::from("Bucket"),
            physical_id: None,
            resource_type: String::from("AWS::S3::Bucket"),
            replacement: None,
            details: Vec::new(),
        };
        let gateway = FakeGateway::new().with_changes(vec![change.clone()]);
        let prompter = ScriptedPrompter::new();
        let mut ctx = ctx();
        ctx.enable_dry_run(true);

        let outcome = StackController::new(&group, &gateway, &prompter)
            .create(&mut ctx, "foo", &no_overrides())
            .await
            .unwrap();

        let LifecycleOutcome::Previewed { preview, detail } = outcome else {
            panic!("expected a preview");
        };
        assert!(detail);
        assert_eq!(preview.changes, vec![change]);
        assert!(preview.name.starts_with(PREVIEW_NAME_PREFIX));
        assert!(gateway.mutations().is_empty());
        assert!(!gateway.stack_exists("app-dev-foo"));
        assert!(gateway.calls().iter().any(
            |c| matches!(c, Call::Preview(p) if p.kind == PreviewKind::Create)
        ));
    }

    #[tokio::test]
    async fn test_update_prompts_with_previous_value() {
        let group = group();
        let gateway = FakeGateway::new()
            .with_stack("app-dev-foo", "CREATE_COMPLETE", &[("InstanceType", "t2.micro")])
            .with_template_parameters(
                FOO_URL,
                vec![ParameterDefinition::new("InstanceType").with_default("t3.nano")],
            );
        let prompter = ScriptedPrompter::new().answer("");
        let mut ctx = ctx();

        let outcome = StackController::new(&group, &gateway, &prompter)
            .update(&mut ctx, "foo", &no_overrides())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            LifecycleOutcome::Updated {
                stack_name: String::from("app-dev-foo")
            }
        );
        assert_eq!(prompter.asked()[0].1.as_deref(), Some("t2.micro"));
        let Call::Update(request) = &gateway.calls()[0] else {
            panic!("expected update");
        };
        assert_eq!(
            request.parameters,
            vec![ResolvedParameter::new("InstanceType", "t2.micro")]
        );
    }

    #[tokio::test]
    async fn test_update_no_updates_is_no_changes() {
        let group = group();
        let gateway = FakeGateway::new()
            .with_stack("app-dev-foo", "CREATE_COMPLETE", &[])
            .with_update_error("No updates are to be performed.");
        let prompter = ScriptedPrompter::new();
        let mut ctx = ctx();

        let outcome = StackController::new(&group, &gateway, &prompter)
            .update(&mut ctx, "foo", &no_overrides())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            LifecycleOutcome::NoChanges {
                stack_name: String::from("app-dev-foo")
            }
        );
        assert!(!gateway
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Wait(..))));
    }

    #[tokio::test]
    async fn test_update_other_error_is_fatal() {
        let group = group();
        let gateway = FakeGateway::new()
            .with_stack("app-dev-foo", "CREATE_COMPLETE", &[])
            .with_update_error("Stack is in UPDATE_IN_PROGRESS state and can not be updated.");
        let prompter = ScriptedPrompter::new();
        let mut ctx = ctx();

        let err = StackController::new(&group, &gateway, &prompter)
            .update(&mut ctx, "foo", &no_overrides())
            .await
            .unwrap_err();

        assert!(err.is_client_error());
        assert!(!err.is_no_updates());
    }

    #[tokio::test]
    async fn test_update_missing_stack_fails_before_prompting() {
        let group = group();
        let gateway = FakeGateway::new()
            .with_template_parameters(FOO_URL, vec![ParameterDefinition::new("AppEnv")]);
        let prompter = ScriptedPrompter::new();
        let mut ctx = ctx();

        let err = StackController::new(&group, &gateway, &prompter)
            .update(&mut ctx, "foo", &no_overrides())
            .await
            .unwrap_err();

        assert!(err.is_client_error());
        assert!(err.to_string().contains("does not exist"));
        assert!(prompter.asked().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_update_without_changes() {
        let group = group();
        let gateway = FakeGateway::new()
            .with_stack("app-dev-foo", "CREATE_COMPLETE", &[])
            .with_preview_failure(
                "The submitted information didn't contain changes. Submit different information to create a change set.",
            );
        let prompter = ScriptedPrompter::new();
        let mut ctx = ctx();
        ctx.enable_dry_run(false);

        let outcome = StackController::new(&group, &gateway, &prompter)
            .update(&mut ctx, "foo", &no_overrides())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            LifecycleOutcome::NoChanges {
                stack_name: String::from("app-dev-foo")
            }
        );
        assert!(gateway.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_preview_failure_propagates() {
        let group = group();
        let gateway = FakeGateway::new()
            .with_stack("app-dev-foo", "CREATE_COMPLETE", &[])
            .with_preview_failure("Template error: unresolved resource dependencies");
        let prompter = ScriptedPrompter::new();
        let mut ctx = ctx();
        ctx.enable_dry_run(false);

        let err = StackController::new(&group, &gateway, &prompter)
            .update(&mut ctx, "foo", &no_overrides())
            .await
            .unwrap_err();

        assert!(!err.is_no_changes());
    }

    #[tokio::test]
    async fn test_delete_passes_only_accepted_args() {
        let group = group();
        let mut gateway = MockProvisioningGateway::new();
        gateway
            .expect_delete_stack()
            .withf(|name, args| {
                name == "app-dev-foo"
                    && *args
                        == DeleteArgs {
                            retain_resources: Some(vec![String::from("Bucket")]),
                            role_arn: Some(String::from("arn:aws:iam::1:role/cfn")),
                        }
            })
            .times(1)
            .returning(|_, _| Ok(()));
        gateway
            .expect_wait_until()
            .withf(|name, target| {
                name == "app-dev-foo" && *target == WaitTarget::StackDeleteComplete
            })
            .times(1)
            .returning(|_, _| Ok(()));
        let prompter = ScriptedPrompter::new();
        let mut ctx = ctx();

        let outcome = StackController::new(&group, &gateway, &prompter)
            .delete(&mut ctx, "foo")
            .await
            .unwrap();

        assert_eq!(
            outcome,
            LifecycleOutcome::Deleted {
                stack_name: String::from("app-dev-foo")
            }
        );
    }

    #[tokio::test]
    async fn test_confirmation_asked_once_per_run() {
        let group = group();
        let gateway = FakeGateway::new().with_stack("app-dev-foo", "CREATE_COMPLETE", &[]);
        let prompter = ScriptedPrompter::new().confirm_with(true);
        let mut ctx = ctx();
        ctx.require_confirmation("Execute task on production?");
        let controller = StackController::new(&group, &gateway, &prompter);

        controller.update(&mut ctx, "foo", &no_overrides()).await.unwrap();
        controller.delete(&mut ctx, "foo").await.unwrap();

        assert_eq!(prompter.confirms_asked().len(), 1);
        assert_eq!(gateway.mutations().len(), 2);
    }

    #[tokio::test]
    async fn test_declined_confirmation_cancels_without_mutation() {
        let group = group();
        let gateway = FakeGateway::new().with_stack("app-dev-foo", "CREATE_COMPLETE", &[]);
        let prompter = ScriptedPrompter::new().confirm_with(false);
        let mut ctx = ctx();
        ctx.require_confirmation("Execute task on production?");

        let err = StackController::new(&group, &gateway, &prompter)
            .delete(&mut ctx, "foo")
            .await
            .unwrap_err();

        assert!(err.is_canceled());
        assert!(gateway.mutations().is_empty());
        assert!(gateway.stack_exists("app-dev-foo"));
    }

    #[tokio::test]
    async fn test_create_is_not_gated() {
        let group = group();
        let gateway = FakeGateway::new();
        let prompter = ScriptedPrompter::new();
        let mut ctx = ctx();
        ctx.require_confirmation("Execute task on production?");

        StackController::new(&group, &gateway, &prompter)
            .create(&mut ctx, "foo", &no_overrides())
            .await
            .unwrap();

        assert!(prompter.confirms_asked().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_alias() {
        let group = group();
        let gateway = FakeGateway::new();
        let prompter = ScriptedPrompter::new();
        let mut ctx = ctx();

        let result = StackController::new(&group, &gateway, &prompter)
            .delete(&mut ctx, "nope")
            .await;
        assert!(result.is_err());
    }
}
