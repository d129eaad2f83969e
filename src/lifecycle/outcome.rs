//! Structured results of lifecycle operations.

use serde::Serialize;

use crate::gateway::ChangePreview;

/// Result of a create, update or delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LifecycleOutcome {
    /// The stack reached `CREATE_COMPLETE`.
    Created {
        /// Actual stack name.
        stack_name: String,
    },
    /// The stack reached `UPDATE_COMPLETE`.
    Updated {
        /// Actual stack name.
        stack_name: String,
    },
    /// The stack is gone.
    Deleted {
        /// Actual stack name.
        stack_name: String,
    },
    /// The update or preview had nothing to change.
    NoChanges {
        /// Actual stack name.
        stack_name: String,
    },
    /// A dry-run produced a change preview.
    Previewed {
        /// The computed preview.
        preview: ChangePreview,
        /// Whether per-resource detail should be reported.
        detail: bool,
    },
}

impl LifecycleOutcome {
    /// Actual stack name the outcome is about.
    #[must_use]
    pub fn stack_name(&self) -> &str {
        match self {
            Self::Created { stack_name }
            | Self::Updated { stack_name }
            | Self::Deleted { stack_name }
            | Self::NoChanges { stack_name } => stack_name,
            Self::Previewed { preview, .. } => &preview.stack_name,
        }
    }

    /// Whether the remote stack was changed.
    #[must_use]
    pub const fn mutated(&self) -> bool {
        matches!(
            self,
            Self::Created { .. } | Self::Updated { .. } | Self::Deleted { .. }
        )
    }
}
