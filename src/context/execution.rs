//! The execution context shared by every task in a run.
//!
//! The context is the one piece of mutable state in a run. It is created once
//! at startup, passed explicitly to every operation, and changed only through
//! the setters below.

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::error::Result;

use super::template::interpolate;

/// AWS credential, profile and region selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwsSelection {
    /// Named profile from the shared config files.
    pub profile: Option<String>,
    /// Region override.
    pub region: Option<String>,
    /// Static access key id.
    pub access_key_id: Option<String>,
    /// Static secret access key.
    pub secret_access_key: Option<String>,
}

/// Process-wide execution context.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Environment-style values used for placeholders (e.g. `EnvName`).
    vars: IndexMap<String, String>,
    /// Explicit template parameter overrides.
    params: IndexMap<String, String>,
    /// AWS selection.
    aws: AwsSelection,
    /// Bumped on every AWS selection change.
    session_generation: u64,
    /// Whether mutations are replaced by change previews.
    dry_run: bool,
    /// Whether previews include full per-resource detail.
    dry_run_detail: bool,
    /// Confirmation message, present when confirmation is required.
    confirm_message: Option<String>,
    /// Whether confirmation was granted in this run.
    confirmed: bool,
    /// Whether the confirmation gate is bypassed.
    force: bool,
}

impl ExecutionContext {
    /// Creates an empty context with dry-run and confirmation off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context seeded with environment values and an AWS selection.
    #[must_use]
    pub fn with_values(vars: IndexMap<String, String>, aws: AwsSelection) -> Self {
        Self {
            vars,
            aws,
            ..Self::default()
        }
    }

    // ------------------------------------------------------------------
    // Environment values and parameter overrides
    // ------------------------------------------------------------------

    /// Sets an environment value.
    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        info!("Setting {key}={value}");
        self.vars.insert(key, value);
    }

    /// Gets an environment value.
    #[must_use]
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Environment values, in insertion order.
    #[must_use]
    pub const fn vars(&self) -> &IndexMap<String, String> {
        &self.vars
    }

    /// Adds explicit parameter overrides; later values win per key.
    pub fn set_params<I, K, V>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in overrides {
            let key = key.into();
            debug!("Parameter override: {key}");
            self.params.insert(key, value.into());
        }
    }

    /// Looks up an override for a template parameter.
    ///
    /// Explicit parameter overrides take precedence over environment values.
    #[must_use]
    pub fn parameter_override(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .or_else(|| self.vars.get(key))
            .map(String::as_str)
    }

    /// Interpolates `%(key)s` placeholders against the environment values.
    ///
    /// # Errors
    ///
    /// Returns an error if a placeholder is malformed or unknown.
    pub fn render(&self, template: &str) -> Result<String> {
        interpolate(template, &self.vars)
    }

    // ------------------------------------------------------------------
    // AWS selection
    // ------------------------------------------------------------------

    /// Current AWS selection.
    #[must_use]
    pub const fn aws(&self) -> &AwsSelection {
        &self.aws
    }

    /// Generation counter of the AWS selection.
    ///
    /// Any cached client built for an older generation is stale.
    #[must_use]
    pub const fn session_generation(&self) -> u64 {
        self.session_generation
    }

    /// Selects a named profile.
    pub fn set_profile(&mut self, profile: impl Into<String>) {
        self.aws.profile = Some(profile.into());
        self.invalidate_session();
    }

    /// Selects a region.
    pub fn set_region(&mut self, region: impl Into<String>) {
        self.aws.region = Some(region.into());
        self.invalidate_session();
    }

    /// Selects static credentials.
    pub fn set_account(
        &mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) {
        self.aws.access_key_id = Some(access_key_id.into());
        self.aws.secret_access_key = Some(secret_access_key.into());
        self.invalidate_session();
    }

    fn invalidate_session(&mut self) {
        self.session_generation += 1;
        debug!("AWS selection changed (generation {})", self.session_generation);
    }

    // ------------------------------------------------------------------
    // Mode flags
    // ------------------------------------------------------------------

    /// Turns dry-run on, optionally with full preview detail.
    pub fn enable_dry_run(&mut self, detail: bool) {
        info!("Dry-run enabled{}", if detail { " (detail)" } else { "" });
        self.dry_run = true;
        self.dry_run_detail = detail;
    }

    /// Whether dry-run is on.
    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Whether previews include full per-resource detail.
    #[must_use]
    pub const fn dry_run_detail(&self) -> bool {
        self.dry_run_detail
    }

    /// Requires confirmation before update and delete.
    pub fn require_confirmation(&mut self, message: impl Into<String>) {
        self.confirm_message = Some(message.into());
    }

    /// The confirmation message, when confirmation is required.
    #[must_use]
    pub fn confirmation_message(&self) -> Option<&str> {
        self.confirm_message.as_deref()
    }

    /// Records that the operator confirmed.
    pub const fn mark_confirmed(&mut self) {
        self.confirmed = true;
    }

    /// Whether the operator already confirmed in this run.
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// Bypasses the confirmation gate for the rest of the run.
    pub fn force(&mut self) {
        info!("Confirmation bypassed (force)");
        self.force = true;
    }

    /// Whether the confirmation gate is bypassed.
    #[must_use]
    pub const fn is_forced(&self) -> bool {
        self.force
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ctx = ExecutionContext::new();
        assert!(!ctx.is_dry_run());
        assert!(!ctx.is_forced());
        assert!(!ctx.is_confirmed());
        assert!(ctx.confirmation_message().is_none());
        assert_eq!(ctx.session_generation(), 0);
    }

    #[test]
    fn test_params_win_over_vars() {
        let mut ctx = ExecutionContext::new();
        ctx.set_var("EnvName", "dev");
        assert_eq!(ctx.parameter_override("EnvName"), Some("dev"));

        ctx.set_params([("EnvName", "prod")]);
        assert_eq!(ctx.parameter_override("EnvName"), Some("prod"));
        assert_eq!(ctx.parameter_override("Other"), None);
    }

    #[test]
    fn test_aws_changes_bump_generation() {
        let mut ctx = ExecutionContext::new();
        ctx.set_profile("ops");
        ctx.set_region("eu-west-1");
        ctx.set_account("AKIA", "secret");
        assert_eq!(ctx.session_generation(), 3);
        assert_eq!(ctx.aws().profile.as_deref(), Some("ops"));
        assert_eq!(ctx.aws().region.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn test_render_uses_vars() {
        let mut ctx = ExecutionContext::new();
        ctx.set_var("EnvName", "qa");
        assert_eq!(ctx.render("app-%(EnvName)s").unwrap(), "app-qa");
    }
}
