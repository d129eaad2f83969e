//! Configuration validation.
//!
//! This module checks a parsed configuration before any task runs, ensuring
//! aliases produce usable task names, pass-through arguments are values the
//! provisioning API accepts, and placeholders are well formed.

use crate::context::{ExecutionContext, placeholders};
use crate::error::{ConfigError, Result, StackfabError};
use crate::gateway::StackArgs;
use std::collections::HashSet;
use tracing::debug;

use super::spec::StackfabConfig;

/// Capabilities the provisioning API recognizes.
const KNOWN_CAPABILITIES: &[&str] = &[
    "CAPABILITY_IAM",
    "CAPABILITY_NAMED_IAM",
    "CAPABILITY_AUTO_EXPAND",
];

/// Accepted `on_failure` values.
const ON_FAILURE_VALUES: &[&str] = &["DO_NOTHING", "ROLLBACK", "DELETE"];

/// Validator for stackfab configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a configuration.
    ///
    /// # Errors
    ///
    /// Returns the first error if validation fails.
    pub fn validate(&self, config: &StackfabConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_templates(config, &mut result);
        Self::validate_args(&config.defaults, "defaults", &mut result);
        Self::validate_stacks(config, &mut result);
        Self::validate_confirmation(config, &mut result);

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(StackfabError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    /// Validates the template storage section.
    fn validate_templates(config: &StackfabConfig, result: &mut ValidationResult) {
        if config.templates.bucket.trim().is_empty() {
            result.errors.push(ValidationError {
                field: String::from("templates.bucket"),
                message: String::from("Template bucket cannot be empty"),
            });
        }

        check_placeholders(&config.templates.bucket, "templates.bucket", config, result);
        check_placeholders(&config.templates.prefix, "templates.prefix", config, result);
    }

    /// Validates pass-through arguments.
    fn validate_args(args: &StackArgs, field: &str, result: &mut ValidationResult) {
        for capability in args.capabilities.iter().flatten() {
            if !KNOWN_CAPABILITIES.contains(&capability.as_str()) {
                result.errors.push(ValidationError {
                    field: format!("{field}.capabilities"),
                    message: format!("Unknown capability '{capability}'"),
                });
            }
        }

        if let Some(on_failure) = &args.on_failure {
            if !ON_FAILURE_VALUES.contains(&on_failure.as_str()) {
                result.errors.push(ValidationError {
                    field: format!("{field}.on_failure"),
                    message: format!(
                        "on_failure must be one of {}, got '{on_failure}'",
                        ON_FAILURE_VALUES.join(", ")
                    ),
                });
            }
        }

        if let Some(minutes) = args.timeout_in_minutes {
            if minutes <= 0 {
                result.errors.push(ValidationError {
                    field: format!("{field}.timeout_in_minutes"),
                    message: String::from("Timeout must be at least 1 minute"),
                });
            }
        }
    }

    /// Validates stack definitions.
    fn validate_stacks(config: &StackfabConfig, result: &mut ValidationResult) {
        if config.stacks.is_empty() {
            result.warnings.push(String::from("No stacks defined in configuration"));
            return;
        }

        let mut seen_aliases = HashSet::new();

        for (i, stack) in config.stacks.iter().enumerate() {
            let prefix = format!("stacks[{i}]");

            if !seen_aliases.insert(stack.alias.as_str()) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.alias"),
                    message: format!("Duplicate stack alias: {}", stack.alias),
                });
            }

            if !is_valid_alias(&stack.alias) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.alias"),
                    message: format!(
                        "Alias '{}' is invalid. Must be alphanumeric with underscores.",
                        stack.alias
                    ),
                });
            }

            if stack.stack_name.trim().is_empty() {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.stack_name"),
                    message: String::from("Stack name cannot be empty"),
                });
            }

            if stack.template.trim().is_empty() {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.template"),
                    message: String::from("Template path cannot be empty"),
                });
            } else if stack.template.starts_with('/') {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.template"),
                    message: format!(
                        "Template path must be relative to the template directory: {}",
                        stack.template
                    ),
                });
            }

            check_placeholders(
                &stack.stack_name,
                &format!("{prefix}.stack_name"),
                config,
                result,
            );
            Self::validate_args(&stack.args, &format!("{prefix}.args"), result);
        }

        Self::warn_chained_names(config, result);
    }

    /// Warns about names that would be attributed as chained stacks of
    /// another definition.
    fn warn_chained_names(config: &StackfabConfig, result: &mut ValidationResult) {
        let ctx = ExecutionContext::with_values(config.context.clone(), config.aws.selection());
        let names: Vec<(&str, String)> = config
            .stacks
            .iter()
            .filter_map(|s| s.actual_name(&ctx).ok().map(|n| (s.alias.as_str(), n)))
            .collect();

        for (alias, name) in &names {
            for (other_alias, other_name) in &names {
                if alias != other_alias && other_name.starts_with(&format!("{name}-")) {
                    result.warnings.push(format!(
                        "Stack '{other_name}' ({other_alias}) shares the prefix of '{name}' ({alias}) and may be listed as its chained stack"
                    ));
                }
            }
        }
    }

    /// Validates the confirmation rule.
    fn validate_confirmation(config: &StackfabConfig, result: &mut ValidationResult) {
        let Some(confirmation) = &config.confirmation else {
            return;
        };

        if confirmation.message.trim().is_empty() {
            result.errors.push(ValidationError {
                field: String::from("confirmation.message"),
                message: String::from("Confirmation message cannot be empty"),
            });
        }

        if confirmation.when.is_empty() {
            result.warnings.push(String::from(
                "confirmation.when is empty: every update and delete asks for confirmation",
            ));
        }
    }
}

/// Records malformed placeholders as errors and unknown keys as warnings.
///
/// Unknown keys may still be provided at run time through `set_env`.
fn check_placeholders(
    template: &str,
    field: &str,
    config: &StackfabConfig,
    result: &mut ValidationResult,
) {
    match placeholders(template) {
        Ok(keys) => {
            for key in keys {
                if !config.context.contains_key(&key) {
                    result.warnings.push(format!(
                        "{field}: placeholder '%({key})s' has no value in context"
                    ));
                }
            }
        }
        Err(e) => result.errors.push(ValidationError {
            field: field.to_string(),
            message: e.to_string(),
        }),
    }
}

/// Aliases become part of task names, so they are limited to ASCII
/// alphanumerics and underscores and must start with a letter.
fn is_valid_alias(alias: &str) -> bool {
    let mut chars = alias.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;

    fn parse(yaml: &str) -> StackfabConfig {
        ConfigParser::new().parse_yaml(yaml, None).unwrap()
    }

    #[test]
    fn test_valid_alias() {
        assert!(is_valid_alias("foo"));
        assert!(is_valid_alias("web_tier2"));
        assert!(!is_valid_alias(""));
        assert!(!is_valid_alias("2fast"));
        assert!(!is_valid_alias("foo-bar"));
    }

    #[test]
    fn test_valid_config_passes() {
        let config = parse(
            "templates: {bucket: b, prefix: '%(EnvName)s'}\ncontext: {EnvName: dev}\nstacks:\n  - {alias: foo, stack_name: 'app-%(EnvName)s-foo', template: foo.yaml}\n",
        );
        let result = ConfigValidator::new().validate(&config).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 0);
    }

    #[test]
    fn test_duplicate_alias_is_error() {
        let config = parse(
            "templates: {bucket: b}\nstacks:\n  - {alias: foo, stack_name: a, template: a.yaml}\n  - {alias: foo, stack_name: b, template: b.yaml}\n",
        );
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert!(err.to_string().contains("Duplicate stack alias: foo"));
    }

    #[test]
    fn test_unknown_capability_is_error() {
        let config = parse(
            "templates: {bucket: b}\ndefaults: {capabilities: [CAPABILITY_EVERYTHING]}\nstacks:\n  - {alias: foo, stack_name: a, template: a.yaml}\n",
        );
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        match err {
            StackfabError::Config(ConfigError::ValidationError { field, .. }) => {
                assert_eq!(field.as_deref(), Some("defaults.capabilities"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_placeholder_is_error() {
        let config = parse(
            "templates: {bucket: b}\nstacks:\n  - {alias: foo, stack_name: 'app-%(EnvName', template: a.yaml}\n",
        );
        assert!(ConfigValidator::new().validate(&config).is_err());
    }

    #[test]
    fn test_unknown_placeholder_is_warning() {
        let config = parse(
            "templates: {bucket: b}\nstacks:\n  - {alias: foo, stack_name: 'app-%(Stage)s', template: a.yaml}\n",
        );
        let result = ConfigValidator::new().validate(&config).unwrap();
        assert!(result.warnings.iter().any(|w| w.contains("%(Stage)s")));
    }

    #[test]
    fn test_chained_prefix_warning() {
        let config = parse(
            "templates: {bucket: b}\nstacks:\n  - {alias: app, stack_name: app, template: a.yaml}\n  - {alias: app_db, stack_name: app-db, template: b.yaml}\n",
        );
        let result = ConfigValidator::new().validate(&config).unwrap();
        assert!(result.warnings.iter().any(|w| w.contains("app-db")));
    }

    #[test]
    fn test_no_stacks_is_warning() {
        let config = parse("templates: {bucket: b}\n");
        let result = ConfigValidator::new().validate(&config).unwrap();
        assert_eq!(result.warning_count(), 1);
    }
}
