//! Error types for stackfab.
//!
//! This module provides the error hierarchy for every stage of a stack
//! operation: configuration, template placeholder resolution, parameter
//! resolution, remote gateway calls, lifecycle gating, and template publishing.

use std::path::PathBuf;
use thiserror::Error;

/// Message fragment returned by the gateway when an update has nothing to do.
pub const NO_UPDATES_MESSAGE: &str = "No updates are to be performed";

/// Status reason fragment returned when a change preview has no changes.
pub const NO_CHANGES_REASON: &str = "didn't contain changes";

/// The main error type for stackfab.
#[derive(Debug, Error)]
pub enum StackfabError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote provisioning gateway errors.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Parameter resolution errors.
    #[error("Parameter error: {0}")]
    Resolve(#[from] ResolveError),

    /// Lifecycle gating errors.
    #[error("{0}")]
    Lifecycle(#[from] LifecycleError),

    /// Template publishing errors.
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Duplicate definition.
    #[error("Duplicate {resource_type} name: {name}")]
    DuplicateName {
        /// Type of resource (stack alias, task).
        resource_type: String,
        /// The duplicated name.
        name: String,
    },

    /// A placeholder names a key the context does not hold.
    #[error("Unresolved placeholder '%({key})s' in '{template}'")]
    UnresolvedPlaceholder {
        /// The missing context key.
        key: String,
        /// The template being interpolated.
        template: String,
    },

    /// A placeholder is malformed.
    #[error("Invalid placeholder in '{template}': {message}")]
    InvalidTemplate {
        /// The template being interpolated.
        template: String,
        /// What is wrong with it.
        message: String,
    },

    /// No stack is defined under the alias.
    #[error("Unknown stack alias: {alias}")]
    UnknownStack {
        /// The alias that was looked up.
        alias: String,
    },

    /// No task is registered under the name.
    #[error("Unknown task: {name}")]
    UnknownTask {
        /// The task name that was looked up.
        name: String,
    },

    /// Task arguments could not be interpreted.
    #[error("Invalid arguments for task '{task}': {message}")]
    InvalidTaskArgs {
        /// Task name.
        task: String,
        /// Description of the problem.
        message: String,
    },
}

/// Remote provisioning gateway errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The API rejected a request.
    #[error("{}{message}", code_prefix(.code))]
    Client {
        /// Service error code, when the API returned one.
        code: Option<String>,
        /// Error message from the API.
        message: String,
    },

    /// A wait ended in a failure state instead of the target state.
    #[error("Waiting for {resource} ended in {status}: {reason}")]
    WaitFailed {
        /// Stack or change preview being waited on.
        resource: String,
        /// Terminal status observed.
        status: String,
        /// Status reason reported by the API.
        reason: String,
    },

    /// The client session could not be established.
    #[error("Failed to connect: {message}")]
    Connection {
        /// Description of the connection issue.
        message: String,
    },

    /// The API response lacked expected data.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Parameter resolution errors.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A create-time parameter received no value.
    #[error("Missing required parameter: {key}")]
    MissingParameter {
        /// The parameter key.
        key: String,
    },
}

/// Lifecycle gating errors.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The operator declined the confirmation prompt.
    #[error("Canceled: {message}")]
    Canceled {
        /// The confirmation message that was declined.
        message: String,
    },
}

/// Template publishing errors.
#[derive(Debug, Error)]
pub enum PublishError {
    /// A local template file could not be read.
    #[error("Failed to read {path}: {message}")]
    LocalRead {
        /// Path of the local file.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// The storage service rejected a request.
    #[error("S3 {operation} error: {message}")]
    Remote {
        /// Operation that failed (list, put, delete, head).
        operation: String,
        /// Description of the failure.
        message: String,
    },
}

fn code_prefix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!("{c}: ")).unwrap_or_default()
}

/// Result type alias for stackfab operations.
pub type Result<T> = std::result::Result<T, StackfabError>;

impl StackfabError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this is an API client error.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Gateway(GatewayError::Client { .. }))
    }

    /// Returns true if the gateway refused an update because nothing changed.
    #[must_use]
    pub fn is_no_updates(&self) -> bool {
        matches!(
            self,
            Self::Gateway(GatewayError::Client { message, .. }) if message.contains(NO_UPDATES_MESSAGE)
        )
    }

    /// Returns true if a change preview failed because it had no changes.
    #[must_use]
    pub fn is_no_changes(&self) -> bool {
        matches!(
            self,
            Self::Gateway(GatewayError::WaitFailed { reason, .. }) if reason.contains(NO_CHANGES_REASON)
        )
    }

    /// Returns true if the operator declined a confirmation prompt.
    #[must_use]
    pub const fn is_canceled(&self) -> bool {
        matches!(self, Self::Lifecycle(LifecycleError::Canceled { .. }))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates an invalid task arguments error.
    #[must_use]
    pub fn task_args(task: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTaskArgs {
            task: task.into(),
            message: message.into(),
        }
    }
}

impl GatewayError {
    /// Creates a client error.
    #[must_use]
    pub fn client(code: Option<&str>, message: impl Into<String>) -> Self {
        Self::Client {
            code: code.map(String::from),
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}

impl PublishError {
    /// Creates a remote storage error.
    #[must_use]
    pub fn remote(operation: &str, message: impl Into<String>) -> Self {
        Self::Remote {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_updates_detected_by_substring() {
        let err = StackfabError::from(GatewayError::client(
            Some("ValidationError"),
            "No updates are to be performed.",
        ));
        assert!(err.is_no_updates());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_other_client_error_is_not_no_updates() {
        let err = StackfabError::from(GatewayError::client(
            Some("ValidationError"),
            "Template format error",
        ));
        assert!(!err.is_no_updates());
    }

    #[test]
    fn test_no_changes_detected_on_wait_failure() {
        let err = StackfabError::from(GatewayError::WaitFailed {
            resource: String::from("preview"),
            status: String::from("FAILED"),
            reason: String::from(
                "The submitted information didn't contain changes. Submit different information to create a change set.",
            ),
        });
        assert!(err.is_no_changes());
        assert!(!err.is_no_updates());
    }

    #[test]
    fn test_client_error_display_includes_code() {
        let err = GatewayError::client(Some("AccessDenied"), "not allowed");
        assert_eq!(err.to_string(), "AccessDenied: not allowed");

        let err = GatewayError::client(None, "boom");
        assert_eq!(err.to_string(), "boom");
    }
}
