//! Stack group and stack definitions.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::ExecutionContext;
use crate::error::{ConfigError, Result};
use crate::gateway::StackArgs;

/// Base URL of path-style template locations.
const TEMPLATE_URL_BASE: &str = "https://s3.amazonaws.com";

/// Where a group's templates are published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateStorage {
    /// Bucket name; may contain placeholders.
    pub bucket: String,
    /// Key prefix; may contain placeholders.
    #[serde(default)]
    pub prefix: String,
    /// Local directory holding the template sources.
    #[serde(default = "default_local_dir")]
    pub local_dir: PathBuf,
}

fn default_local_dir() -> PathBuf {
    PathBuf::from("templates")
}

impl TemplateStorage {
    /// Creates a storage location.
    #[must_use]
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>, local_dir: impl AsRef<Path>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
            local_dir: local_dir.as_ref().to_path_buf(),
        }
    }
}

/// One declared stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackDefinition {
    /// Short local name.
    pub alias: String,
    /// Stack name; may contain placeholders.
    pub stack_name: String,
    /// Template path relative to the storage prefix.
    pub template: String,
    /// Overrides merged over the group defaults.
    #[serde(default)]
    pub args: StackArgs,
}

impl StackDefinition {
    /// Creates a definition without argument overrides.
    #[must_use]
    pub fn new(
        alias: impl Into<String>,
        stack_name: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            alias: alias.into(),
            stack_name: stack_name.into(),
            template: template.into(),
            args: StackArgs::default(),
        }
    }

    /// Sets the argument overrides.
    #[must_use]
    pub fn with_args(mut self, args: StackArgs) -> Self {
        self.args = args;
        self
    }

    /// Actual stack name for the current context.
    ///
    /// # Errors
    ///
    /// Returns an error if the name template cannot be rendered.
    pub fn actual_name(&self, ctx: &ExecutionContext) -> Result<String> {
        ctx.render(&self.stack_name)
    }
}

/// An ordered collection of stack definitions sharing template storage and
/// default arguments.
#[derive(Debug, Clone)]
pub struct StackGroup {
    storage: TemplateStorage,
    defaults: StackArgs,
    stacks: IndexMap<String, StackDefinition>,
}

impl StackGroup {
    /// Creates an empty group.
    #[must_use]
    pub fn new(storage: TemplateStorage, defaults: StackArgs) -> Self {
        Self {
            storage,
            defaults,
            stacks: IndexMap::new(),
        }
    }

    /// Adds a definition.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateName` if the alias is taken.
    pub fn define_stack(&mut self, definition: StackDefinition) -> Result<()> {
        if self.stacks.contains_key(&definition.alias) {
            return Err(ConfigError::DuplicateName {
                resource_type: String::from("stack alias"),
                name: definition.alias,
            }
            .into());
        }
        debug!("Defined stack {} -> {}", definition.alias, definition.stack_name);
        self.stacks.insert(definition.alias.clone(), definition);
        Ok(())
    }

    /// Looks up a definition by alias.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownStack` if no definition has the alias.
    pub fn get(&self, alias: &str) -> Result<&StackDefinition> {
        self.stacks.get(alias).ok_or_else(|| {
            ConfigError::UnknownStack {
                alias: alias.to_string(),
            }
            .into()
        })
    }

    /// Definitions in declaration order.
    pub fn stacks(&self) -> impl Iterator<Item = &StackDefinition> {
        self.stacks.values()
    }

    /// Aliases in declaration order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.stacks.keys().map(String::as_str)
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    /// Whether the group has no definitions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Template storage location.
    #[must_use]
    pub const fn storage(&self) -> &TemplateStorage {
        &self.storage
    }

    /// Group default arguments.
    #[must_use]
    pub const fn defaults(&self) -> &StackArgs {
        &self.defaults
    }

    /// Resolves an alias to its actual name, or returns the input as a
    /// literal stack name.
    ///
    /// # Errors
    ///
    /// Returns an error if the alias' name template cannot be rendered.
    pub fn resolve_name(&self, alias_or_name: &str, ctx: &ExecutionContext) -> Result<String> {
        match self.stacks.get(alias_or_name) {
            Some(definition) => definition.actual_name(ctx),
            None => Ok(alias_or_name.to_string()),
        }
    }

    /// Rendered bucket name.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket template cannot be rendered.
    pub fn bucket(&self, ctx: &ExecutionContext) -> Result<String> {
        ctx.render(&self.storage.bucket)
    }

    /// Rendered key prefix without surrounding slashes.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix template cannot be rendered.
    pub fn prefix(&self, ctx: &ExecutionContext) -> Result<String> {
        Ok(ctx.render(&self.storage.prefix)?.trim_matches('/').to_string())
    }

    /// Object key of a template under the rendered prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix cannot be rendered.
    pub fn template_key(&self, definition: &StackDefinition, ctx: &ExecutionContext) -> Result<String> {
        Ok(join_key(&self.prefix(ctx)?, &definition.template))
    }

    /// Template URL of a definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket or prefix cannot be rendered.
    pub fn template_url(&self, definition: &StackDefinition, ctx: &ExecutionContext) -> Result<String> {
        Ok(format!(
            "{TEMPLATE_URL_BASE}/{}/{}",
            self.bucket(ctx)?,
            self.template_key(definition, ctx)?
        ))
    }

    /// Group defaults merged with the definition's overrides.
    #[must_use]
    pub fn effective_args(&self, definition: &StackDefinition) -> StackArgs {
        self.defaults.merged_with(&definition.args)
    }
}

/// Joins a prefix and a relative path into an object key.
pub(crate) fn join_key(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let path = path.trim_start_matches('/');
    if prefix.is_empty() {
        path.to_string()
    } else {
        format!("{prefix}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(env: &str) -> ExecutionContext {
        let mut ctx = ExecutionContext::new();
        ctx.set_var("EnvName", env);
        ctx
    }

    fn group() -> StackGroup {
        let mut group = StackGroup::new(
            TemplateStorage::new("templates-%(EnvName)s", "example/%(EnvName)s", "templates"),
            StackArgs {
                capabilities: Some(vec![String::from("CAPABILITY_IAM")]),
                ..StackArgs::default()
            },
        );
        group
            .define_stack(StackDefinition::new("foo", "sample-%(EnvName)s-foo", "foo.yaml"))
            .unwrap();
        group
            .define_stack(
                StackDefinition::new("bar", "sample-%(EnvName)s-bar", "subdir/bar.yaml").with_args(
                    StackArgs {
                        capabilities: Some(vec![String::from("CAPABILITY_NAMED_IAM")]),
                        ..StackArgs::default()
                    },
                ),
            )
            .unwrap();
        group
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let mut group = group();
        let err = group
            .define_stack(StackDefinition::new("foo", "other", "other.yaml"))
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate stack alias name: foo"));
        assert_eq!(group.len(), 2);
    }

    #[test]
    fn test_aliases_keep_declaration_order() {
        let aliases: Vec<_> = group().aliases().map(String::from).collect();
        assert_eq!(aliases, vec!["foo", "bar"]);
    }

    #[test]
    fn test_actual_name_follows_context() {
        let group = group();
        let foo = group.get("foo").unwrap();
        assert_eq!(foo.actual_name(&ctx("dev")).unwrap(), "sample-dev-foo");
        assert_eq!(foo.actual_name(&ctx("production")).unwrap(), "sample-production-foo");
    }

    #[test]
    fn test_template_url() {
        let group = group();
        let bar = group.get("bar").unwrap();
        assert_eq!(
            group.template_url(bar, &ctx("dev")).unwrap(),
            "https://s3.amazonaws.com/templates-dev/example/dev/subdir/bar.yaml"
        );
    }

    #[test]
    fn test_empty_prefix_collapses() {
        assert_eq!(join_key("", "foo.yaml"), "foo.yaml");
        assert_eq!(join_key("/a/b/", "/foo.yaml"), "a/b/foo.yaml");
    }

    #[test]
    fn test_effective_args_override_wins() {
        let group = group();
        let foo = group.effective_args(group.get("foo").unwrap());
        let bar = group.effective_args(group.get("bar").unwrap());
        assert_eq!(foo.capabilities, Some(vec![String::from("CAPABILITY_IAM")]));
        assert_eq!(bar.capabilities, Some(vec![String::from("CAPABILITY_NAMED_IAM")]));
    }

    #[test]
    fn test_resolve_name_falls_back_to_literal() {
        let group = group();
        let ctx = ctx("dev");
        assert_eq!(group.resolve_name("foo", &ctx).unwrap(), "sample-dev-foo");
        assert_eq!(group.resolve_name("unrelated", &ctx).unwrap(), "unrelated");
    }

    #[test]
    fn test_unknown_alias() {
        assert!(group().get("baz").is_err());
    }
}
