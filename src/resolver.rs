//! Template parameter resolution.
//!
//! Each declared parameter is resolved from, in order: an explicit override
//! in the context, the previously deployed value (update only), the declared
//! default, and finally an interactive prompt.

use indexmap::IndexMap;
use tracing::debug;

use crate::context::ExecutionContext;
use crate::error::{ResolveError, Result};
use crate::gateway::{ParameterDefinition, ResolvedParameter};
use crate::prompt::Prompter;

/// Value the service reports in place of a deployed NoEcho parameter.
pub const NO_ECHO_MASK: &str = "****";

/// Lifecycle operation a resolution is performed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Creating a new stack.
    Create,
    /// Updating an existing stack.
    Update,
}

/// Resolves declared parameters into concrete values.
pub struct ParameterResolver<'a> {
    prompter: &'a dyn Prompter,
}

impl<'a> ParameterResolver<'a> {
    /// Creates a resolver prompting through `prompter`.
    #[must_use]
    pub const fn new(prompter: &'a dyn Prompter) -> Self {
        Self { prompter }
    }

    /// Resolves every declared parameter, preserving declaration order.
    ///
    /// `previous` holds the deployed values and is only consulted on update.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::MissingParameter` when a create-time parameter
    /// ends up without a value, or an error if prompting fails.
    pub fn resolve(
        &self,
        declared: &[ParameterDefinition],
        ctx: &ExecutionContext,
        previous: Option<&IndexMap<String, String>>,
        operation: Operation,
    ) -> Result<Vec<ResolvedParameter>> {
        declared
            .iter()
            .map(|definition| self.resolve_one(definition, ctx, previous, operation))
            .collect()
    }

    fn resolve_one(
        &self,
        definition: &ParameterDefinition,
        ctx: &ExecutionContext,
        previous: Option<&IndexMap<String, String>>,
        operation: Operation,
    ) -> Result<ResolvedParameter> {
        let key = &definition.key;

        if let Some(value) = ctx.parameter_override(key) {
            debug!("Parameter {key} taken from context override");
            return Ok(ResolvedParameter::new(key.as_str(), value));
        }

        // The service masks deployed NoEcho values, so they never make a default.
        let previous_value = match operation {
            Operation::Update => previous
                .and_then(|p| p.get(key))
                .map(String::as_str)
                .filter(|v| !(definition.no_echo && *v == NO_ECHO_MASK)),
            Operation::Create => None,
        };
        let default = previous_value.or(definition.default_value.as_deref());

        let message = match &definition.description {
            Some(description) => format!("{key} ({description})"),
            None => key.clone(),
        };

        let answer = self.prompter.prompt(&message, default)?;

        match (answer, operation) {
            (Some(value), _) if !value.is_empty() => Ok(ResolvedParameter::new(key.as_str(), value)),
            (_, Operation::Create) => Err(ResolveError::MissingParameter { key: key.clone() }.into()),
            (_, Operation::Update) => Ok(ResolvedParameter::new(key.as_str(), String::new())),
        }
    }
}
