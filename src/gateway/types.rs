//! Types exchanged with the provisioning gateway.
//!
//! These types are SDK-independent so that lifecycle and listing logic can be
//! exercised without a live API.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Stack statuses listed by `list_stacks` (everything but `DELETE_COMPLETE`).
pub const LISTED_STACK_STATUSES: &[&str] = &[
    "CREATE_IN_PROGRESS",
    "CREATE_FAILED",
    "CREATE_COMPLETE",
    "ROLLBACK_IN_PROGRESS",
    "ROLLBACK_FAILED",
    "ROLLBACK_COMPLETE",
    "DELETE_IN_PROGRESS",
    "DELETE_FAILED",
    "UPDATE_IN_PROGRESS",
    "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
    "UPDATE_COMPLETE",
    "UPDATE_FAILED",
    "UPDATE_ROLLBACK_IN_PROGRESS",
    "UPDATE_ROLLBACK_FAILED",
    "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS",
    "UPDATE_ROLLBACK_COMPLETE",
    "REVIEW_IN_PROGRESS",
    "IMPORT_IN_PROGRESS",
    "IMPORT_COMPLETE",
    "IMPORT_ROLLBACK_IN_PROGRESS",
    "IMPORT_ROLLBACK_FAILED",
    "IMPORT_ROLLBACK_COMPLETE",
];

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Continuation token for the next page, if any.
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// Creates the last page of a listing.
    #[must_use]
    pub const fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }
}

/// A parameter declared by a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    /// Parameter key.
    pub key: String,
    /// Declared default value.
    pub default_value: Option<String>,
    /// Human-readable description.
    pub description: Option<String>,
    /// Whether the value must be masked in output.
    #[serde(default)]
    pub no_echo: bool,
}

impl ParameterDefinition {
    /// Creates a parameter definition with only a key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            default_value: None,
            description: None,
            no_echo: false,
        }
    }

    /// Sets the declared default.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the parameter as masked.
    #[must_use]
    pub const fn with_no_echo(mut self) -> Self {
        self.no_echo = true;
        self
    }
}

/// A parameter with its final value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedParameter {
    /// Parameter key.
    pub key: String,
    /// Resolved value.
    pub value: String,
}

impl ResolvedParameter {
    /// Creates a resolved parameter.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Arguments passed through to create, update and delete calls.
///
/// Every field is optional; merging is per field with the override winning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackArgs {
    /// Acknowledged capabilities (e.g. `CAPABILITY_IAM`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<String>>,
    /// Service role assumed by the provisioning service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    /// Stack tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<IndexMap<String, String>>,
    /// Notification topic ARNs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_arns: Option<Vec<String>>,
    /// Creation timeout (create only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_in_minutes: Option<i32>,
    /// Failure action (create only): `DO_NOTHING`, `ROLLBACK` or `DELETE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<String>,
    /// Disables rollback on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_rollback: Option<bool>,
    /// Logical ids to keep when deleting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retain_resources: Option<Vec<String>>,
}

impl StackArgs {
    /// Merges `overrides` over `self`; a field set in `overrides` wins.
    #[must_use]
    pub fn merged_with(&self, overrides: &Self) -> Self {
        Self {
            capabilities: overrides.capabilities.clone().or_else(|| self.capabilities.clone()),
            role_arn: overrides.role_arn.clone().or_else(|| self.role_arn.clone()),
            tags: overrides.tags.clone().or_else(|| self.tags.clone()),
            notification_arns: overrides
                .notification_arns
                .clone()
                .or_else(|| self.notification_arns.clone()),
            timeout_in_minutes: overrides.timeout_in_minutes.or(self.timeout_in_minutes),
            on_failure: overrides.on_failure.clone().or_else(|| self.on_failure.clone()),
            disable_rollback: overrides.disable_rollback.or(self.disable_rollback),
            retain_resources: overrides
                .retain_resources
                .clone()
                .or_else(|| self.retain_resources.clone()),
        }
    }

    /// The subset accepted by delete.
    #[must_use]
    pub fn delete_subset(&self) -> DeleteArgs {
        DeleteArgs {
            retain_resources: self.retain_resources.clone(),
            role_arn: self.role_arn.clone(),
        }
    }
}

/// Arguments accepted by delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteArgs {
    /// Logical ids to keep.
    pub retain_resources: Option<Vec<String>>,
    /// Service role.
    pub role_arn: Option<String>,
}

/// A create or update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackRequest {
    /// Actual stack name.
    pub stack_name: String,
    /// Template URL.
    pub template_url: String,
    /// Resolved parameters.
    pub parameters: Vec<ResolvedParameter>,
    /// Effective arguments.
    pub args: StackArgs,
}

/// Kind of change preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PreviewKind {
    /// Preview of a stack that does not exist yet.
    Create,
    /// Preview of changes to an existing stack.
    Update,
}

impl PreviewKind {
    /// API name of the preview kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
        }
    }
}

/// A change preview request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRequest {
    /// Preview name.
    pub preview_name: String,
    /// Preview kind.
    pub kind: PreviewKind,
    /// The stack request being previewed.
    pub stack: StackRequest,
}

/// A terminal status to wait for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitTarget {
    /// Stack reached `CREATE_COMPLETE`.
    StackCreateComplete,
    /// Stack reached `UPDATE_COMPLETE`.
    StackUpdateComplete,
    /// Stack reached `DELETE_COMPLETE` or vanished.
    StackDeleteComplete,
    /// Change preview reached `CREATE_COMPLETE`.
    PreviewComplete {
        /// Preview name.
        preview_name: String,
    },
}

impl std::fmt::Display for WaitTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StackCreateComplete => write!(f, "stack create complete"),
            Self::StackUpdateComplete => write!(f, "stack update complete"),
            Self::StackDeleteComplete => write!(f, "stack delete complete"),
            Self::PreviewComplete { preview_name } => {
                write!(f, "change preview {preview_name} complete")
            }
        }
    }
}

/// Summary entry from `list_stacks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackSummary {
    /// Stack name.
    pub name: String,
    /// Stack status.
    pub status: String,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    pub updated_at: Option<DateTime<Utc>>,
    /// Template description.
    pub description: Option<String>,
}

/// A stack output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackOutput {
    /// Output key.
    pub key: String,
    /// Output value.
    pub value: String,
    /// Export name, if exported.
    pub export_name: Option<String>,
    /// Description.
    pub description: Option<String>,
}

/// Full description of a deployed stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackDetail {
    /// Stack id.
    pub id: Option<String>,
    /// Stack name.
    pub name: String,
    /// Stack status.
    pub status: String,
    /// Status reason.
    pub status_reason: Option<String>,
    /// Template description.
    pub description: Option<String>,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    pub updated_at: Option<DateTime<Utc>>,
    /// Deployed parameter values.
    pub parameters: Vec<ResolvedParameter>,
    /// Stack outputs.
    pub outputs: Vec<StackOutput>,
}

impl StackDetail {
    /// Deployed parameter values keyed by parameter key.
    #[must_use]
    pub fn parameter_map(&self) -> IndexMap<String, String> {
        self.parameters
            .iter()
            .map(|p| (p.key.clone(), p.value.clone()))
            .collect()
    }
}

/// A lifecycle event of a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackEvent {
    /// Event time.
    pub timestamp: Option<DateTime<Utc>>,
    /// Logical resource id.
    pub logical_id: String,
    /// Resource type.
    pub resource_type: String,
    /// Resource status.
    pub status: String,
    /// Status reason.
    pub reason: Option<String>,
}

/// A resource belonging to a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackResource {
    /// Logical resource id.
    pub logical_id: String,
    /// Physical resource id.
    pub physical_id: Option<String>,
    /// Resource type.
    pub resource_type: String,
    /// Resource status.
    pub status: String,
    /// Last update time.
    pub updated_at: Option<DateTime<Utc>>,
}

/// An exported output value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Export {
    /// Id of the stack that exports the value.
    pub exporting_stack_id: String,
    /// Export name.
    pub name: String,
    /// Export value.
    pub value: String,
}

/// Result of remote template validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateValidation {
    /// Template description.
    pub description: Option<String>,
    /// Declared parameters.
    pub parameters: Vec<ParameterDefinition>,
    /// Capabilities the template requires.
    pub capabilities: Vec<String>,
}

/// One detail of a proposed resource change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeDetail {
    /// Changed attribute (e.g. `Properties`).
    pub attribute: Option<String>,
    /// Changed property name.
    pub name: Option<String>,
    /// Whether the change recreates the resource.
    pub requires_recreation: Option<String>,
    /// Evaluation (`Static` or `Dynamic`).
    pub evaluation: Option<String>,
    /// Source of the change.
    pub change_source: Option<String>,
    /// Entity causing the change.
    pub causing_entity: Option<String>,
}

/// A proposed resource change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceChange {
    /// Action (`Add`, `Modify`, `Remove`, ...).
    pub action: String,
    /// Logical resource id.
    pub logical_id: String,
    /// Physical resource id, when known.
    pub physical_id: Option<String>,
    /// Resource type.
    pub resource_type: String,
    /// Replacement flag (`True`, `False`, `Conditional`).
    pub replacement: Option<String>,
    /// Per-attribute details.
    pub details: Vec<ChangeDetail>,
}

/// A computed change preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangePreview {
    /// Stack name.
    pub stack_name: String,
    /// Preview id.
    pub id: Option<String>,
    /// Preview name.
    pub name: String,
    /// Preview status.
    pub status: String,
    /// Status reason.
    pub status_reason: Option<String>,
    /// Parameters the preview was computed with.
    pub parameters: Vec<ResolvedParameter>,
    /// Proposed resource changes.
    pub changes: Vec<ResourceChange>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_override_wins_per_key() {
        let defaults = StackArgs {
            capabilities: Some(vec![String::from("CAPABILITY_IAM")]),
            role_arn: Some(String::from("arn:aws:iam::1:role/default")),
            timeout_in_minutes: Some(30),
            ..StackArgs::default()
        };
        let overrides = StackArgs {
            role_arn: Some(String::from("arn:aws:iam::1:role/stack")),
            disable_rollback: Some(true),
            ..StackArgs::default()
        };

        let merged = defaults.merged_with(&overrides);
        assert_eq!(merged.capabilities, defaults.capabilities);
        assert_eq!(merged.role_arn.as_deref(), Some("arn:aws:iam::1:role/stack"));
        assert_eq!(merged.timeout_in_minutes, Some(30));
        assert_eq!(merged.disable_rollback, Some(true));
    }

    #[test]
    fn test_delete_subset_drops_other_keys() {
        let args = StackArgs {
            capabilities: Some(vec![String::from("CAPABILITY_IAM")]),
            role_arn: Some(String::from("arn:aws:iam::1:role/x")),
            tags: Some(IndexMap::from([(String::from("k"), String::from("v"))])),
            retain_resources: Some(vec![String::from("Bucket")]),
            ..StackArgs::default()
        };

        let subset = args.delete_subset();
        assert_eq!(
            subset,
            DeleteArgs {
                retain_resources: Some(vec![String::from("Bucket")]),
                role_arn: Some(String::from("arn:aws:iam::1:role/x")),
            }
        );
    }

    #[test]
    fn test_stack_args_reject_unknown_keys() {
        let parsed: std::result::Result<StackArgs, _> =
            serde_yaml::from_str("capabilities: [CAPABILITY_IAM]\nbogus: 1\n");
        assert!(parsed.is_err());
    }
}
