//! Configuration specification types.
//!
//! This module defines the structs that map to the `stackfab.yaml` file.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::{AwsSelection, ExecutionContext};
use crate::error::Result;
use crate::gateway::StackArgs;
use crate::group::{StackDefinition, StackGroup, TemplateStorage};

/// The root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StackfabConfig {
    /// Where templates are published.
    pub templates: TemplateStorage,
    /// Arguments applied to every stack.
    #[serde(default)]
    pub defaults: StackArgs,
    /// Initial environment values (e.g. `EnvName`).
    #[serde(default)]
    pub context: IndexMap<String, String>,
    /// AWS selection.
    #[serde(default)]
    pub aws: AwsConfig,
    /// Confirmation rule for update and delete.
    #[serde(default)]
    pub confirmation: Option<ConfirmationConfig>,
    /// Stack definitions, in task order.
    #[serde(default)]
    pub stacks: Vec<StackDefinition>,
}

/// AWS selection from the file and the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AwsConfig {
    /// Named profile.
    #[serde(default)]
    pub profile: Option<String>,
    /// Region.
    #[serde(default)]
    pub region: Option<String>,
    /// Static access key id, only ever taken from the environment.
    #[serde(skip)]
    pub access_key_id: Option<String>,
    /// Static secret access key, only ever taken from the environment.
    #[serde(skip)]
    pub secret_access_key: Option<String>,
}

impl AwsConfig {
    /// Converts to the context's AWS selection.
    #[must_use]
    pub fn selection(&self) -> AwsSelection {
        AwsSelection {
            profile: self.profile.clone(),
            region: self.region.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
        }
    }
}

/// When and how to ask before update and delete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfirmationConfig {
    /// Question shown to the operator.
    #[serde(default = "default_confirmation_message")]
    pub message: String,
    /// Environment values that must all match; empty means always.
    #[serde(default)]
    pub when: IndexMap<String, String>,
}

fn default_confirmation_message() -> String {
    String::from("Execute task?")
}

impl ConfirmationConfig {
    /// Whether the rule applies to the context's current values.
    #[must_use]
    pub fn matches(&self, ctx: &ExecutionContext) -> bool {
        self.when
            .iter()
            .all(|(key, expected)| ctx.var(key) == Some(expected.as_str()))
    }

    /// Requires confirmation if the rule matches and none is required yet.
    pub fn apply(&self, ctx: &mut ExecutionContext) {
        if self.matches(ctx) && ctx.confirmation_message().is_none() {
            debug!("Confirmation rule matched");
            ctx.require_confirmation(self.message.clone());
        }
    }
}

impl StackfabConfig {
    /// Builds the stack group.
    ///
    /// A relative template directory is resolved against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if two stacks share an alias.
    pub fn build_group(&self, base_dir: Option<&Path>) -> Result<StackGroup> {
        let mut storage = self.templates.clone();
        if let Some(base) = base_dir {
            if storage.local_dir.is_relative() {
                storage.local_dir = base.join(&storage.local_dir);
            }
        }

        let mut group = StackGroup::new(storage, self.defaults.clone());
        for definition in &self.stacks {
            group.define_stack(definition.clone())?;
        }
        Ok(group)
    }

    /// Creates the initial execution context.
    ///
    /// Confirmation is required up front when the rule already matches.
    #[must_use]
    pub fn initial_context(&self) -> ExecutionContext {
        let mut ctx = ExecutionContext::with_values(self.context.clone(), self.aws.selection());
        self.apply_confirmation_rule(&mut ctx);
        ctx
    }

    /// Requires confirmation if the rule matches the context.
    pub fn apply_confirmation_rule(&self, ctx: &mut ExecutionContext) {
        if let Some(rule) = &self.confirmation {
            rule.apply(ctx);
        }
    }
}
