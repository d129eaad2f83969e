//! Task specifications derived from a stack group.

use serde::Serialize;

use crate::group::StackGroup;

/// What a task does when run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "alias", rename_all = "snake_case")]
pub enum TaskAction {
    /// Create the aliased stack.
    Create(String),
    /// Update the aliased stack.
    Update(String),
    /// Delete the aliased stack.
    Delete(String),
    /// Set environment values.
    SetEnv,
    /// Select an AWS profile.
    SetProfile,
    /// Select an AWS region.
    SetRegion,
    /// Select static AWS credentials.
    SetAccount,
    /// Bypass confirmation.
    Force,
    /// Set template parameter overrides.
    SetParams,
    /// Print the console URL.
    OpenConsole,
    /// Validate templates remotely.
    ValidateTemplate,
    /// Publish local templates.
    SyncTemplates,
    /// List the group's stacks.
    ListStacks,
    /// Describe one stack.
    DescribeStack,
    /// List resources of the group's stacks.
    ListResources,
    /// List exports of the group's stacks.
    ListExports,
    /// Replace mutations by change previews.
    EnableDryRun,
}

/// A named task with its usage and description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSpec {
    /// Task name as typed on the command line.
    pub name: String,
    /// Argument synopsis.
    pub usage: String,
    /// One-line description.
    pub description: String,
    /// Handler.
    pub action: TaskAction,
}

impl TaskSpec {
    fn new(name: &str, usage: &str, description: &str, action: TaskAction) -> Self {
        Self {
            name: name.to_string(),
            usage: usage.to_string(),
            description: description.to_string(),
            action,
        }
    }
}

/// Builds the full task list of a group: three lifecycle tasks per alias,
/// followed by the group-level tasks.
#[must_use]
pub fn build_task_specs(group: &StackGroup) -> Vec<TaskSpec> {
    let mut specs = Vec::with_capacity(group.len() * 3 + 14);

    for definition in group.stacks() {
        let alias = definition.alias.as_str();
        let template = definition.template.as_str();
        specs.push(TaskSpec::new(
            &format!("create_{alias}"),
            "[Key=Value,...]",
            &format!("Create stack {alias} from {template}"),
            TaskAction::Create(alias.to_string()),
        ));
        specs.push(TaskSpec::new(
            &format!("update_{alias}"),
            "[Key=Value,...]",
            &format!("Update stack {alias} from {template}"),
            TaskAction::Update(alias.to_string()),
        ));
        specs.push(TaskSpec::new(
            &format!("delete_{alias}"),
            "",
            &format!("Delete stack {alias}"),
            TaskAction::Delete(alias.to_string()),
        ));
    }

    specs.extend([
        TaskSpec::new("set_env", "Key=Value[,...]", "Set environment values", TaskAction::SetEnv),
        TaskSpec::new("set_profile", "profile", "Select an AWS profile", TaskAction::SetProfile),
        TaskSpec::new("set_region", "region", "Select an AWS region", TaskAction::SetRegion),
        TaskSpec::new(
            "set_account",
            "access_key_id,secret_access_key",
            "Use static AWS credentials",
            TaskAction::SetAccount,
        ),
        TaskSpec::new("force", "", "Skip confirmation prompts", TaskAction::Force),
        TaskSpec::new(
            "set_params",
            "Key=Value[,...]",
            "Set template parameter overrides",
            TaskAction::SetParams,
        ),
        TaskSpec::new(
            "open_console",
            "[alias|stack_name]",
            "Print the CloudFormation console URL",
            TaskAction::OpenConsole,
        ),
        TaskSpec::new(
            "validate_template",
            "[alias]",
            "Validate templates remotely",
            TaskAction::ValidateTemplate,
        ),
        TaskSpec::new(
            "sync_templates",
            "",
            "Upload local templates to the template bucket",
            TaskAction::SyncTemplates,
        ),
        TaskSpec::new("list_stacks", "", "List stacks of this group", TaskAction::ListStacks),
        TaskSpec::new(
            "describe_stack",
            "alias|stack_name",
            "Describe a stack",
            TaskAction::DescribeStack,
        ),
        TaskSpec::new(
            "list_resources",
            "",
            "List resources of this group's stacks",
            TaskAction::ListResources,
        ),
        TaskSpec::new(
            "list_exports",
            "",
            "List exports of this group's stacks",
            TaskAction::ListExports,
        ),
        TaskSpec::new(
            "enable_dryrun",
            "[detail]",
            "Preview changes instead of applying them",
            TaskAction::EnableDryRun,
        ),
    ]);

    specs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::StackArgs;
    use crate::group::{StackDefinition, TemplateStorage};

    #[test]
    fn test_lifecycle_tasks_per_alias_in_order() {
        let mut group = StackGroup::new(TemplateStorage::new("b", "", "t"), StackArgs::default());
        group.define_stack(StackDefinition::new("foo", "foo", "foo.yaml")).unwrap();
        group.define_stack(StackDefinition::new("bar", "bar", "bar.yaml")).unwrap();

        let specs = build_task_specs(&group);
        let names: Vec<_> = specs.iter().take(6).map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["create_foo", "update_foo", "delete_foo", "create_bar", "update_bar", "delete_bar"]
        );
        assert_eq!(specs[3].action, TaskAction::Create(String::from("bar")));
        assert!(specs.iter().any(|s| s.name == "enable_dryrun"));
        assert_eq!(specs.len(), 6 + 14);
    }
}
