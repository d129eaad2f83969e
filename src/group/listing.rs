//! Aggregate read operations across a stack group.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::gateway::{
    Export, LISTED_STACK_STATUSES, Page, ProvisioningGateway, StackDetail, StackEvent,
    StackResource, StackSummary, TemplateValidation,
};

use super::stack_group::StackGroup;

/// Number of events shown by `describe_stack`.
pub const RECENT_EVENT_COUNT: usize = 20;

/// Separator between a stack name and the names of stacks chained to it.
const CHAIN_SEPARATOR: char = '-';

/// One row of `list_stacks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackRow {
    /// Stack alias.
    pub alias: String,
    /// Remote stack name if attributed, else the defined name.
    pub stack_name: String,
    /// Remote status; `None` when the stack is not created.
    pub status: Option<String>,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    pub updated_at: Option<DateTime<Utc>>,
    /// Template description.
    pub description: Option<String>,
    /// Attributed by name prefix rather than an exact match.
    pub chained: bool,
}

impl StackRow {
    fn not_created(alias: &str, stack_name: String) -> Self {
        Self {
            alias: alias.to_string(),
            stack_name,
            status: None,
            created_at: None,
            updated_at: None,
            description: None,
            chained: false,
        }
    }

    fn attributed(alias: &str, summary: &StackSummary, chained: bool) -> Self {
        Self {
            alias: alias.to_string(),
            stack_name: summary.name.clone(),
            status: Some(summary.status.clone()),
            created_at: summary.created_at,
            updated_at: summary.updated_at,
            description: summary.description.clone(),
            chained,
        }
    }
}

/// Result of `describe_stack`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StackDescription {
    /// The stack does not exist.
    NotFound {
        /// Looked-up stack name.
        stack_name: String,
    },
    /// The stack exists.
    Found {
        /// Stack summary, parameters and outputs.
        detail: StackDetail,
        /// Most recent events, newest first.
        events: Vec<StackEvent>,
    },
}

/// Resources of one defined stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackResources {
    /// Stack alias.
    pub alias: String,
    /// Actual stack name.
    pub stack_name: String,
    /// Resources in listing order.
    pub resources: Vec<StackResource>,
}

/// An export attributed to a defined stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    /// Stack alias.
    pub alias: String,
    /// Actual stack name.
    pub stack_name: String,
    /// Export name.
    pub name: String,
    /// Export value.
    pub value: String,
}

/// Remote validation result of one template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateCheck {
    /// Stack alias.
    pub alias: String,
    /// Template URL.
    pub template_url: String,
    /// Validation result.
    pub validation: TemplateValidation,
}

/// Fetches every page of a listing.
async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut token = None;

    loop {
        let page = fetch(token).await?;
        items.extend(page.items);
        match page.next_token {
            Some(next) if !next.is_empty() => token = Some(next),
            _ => return Ok(items),
        }
    }
}

impl StackGroup {
    /// Lists the group's stacks, one row per definition.
    ///
    /// In declaration order, each alias takes the first unclaimed remote stack
    /// named exactly like it or starting with `<name>-` (chained stacks).
    /// Each remote stack goes to at most one alias. A prefix match can claim
    /// a stack that another alias defines exactly; such rows are flagged as
    /// chained.
    ///
    /// # Errors
    ///
    /// Returns an error if a name cannot be rendered or the listing fails.
    pub async fn list_stacks(
        &self,
        gateway: &dyn ProvisioningGateway,
        ctx: &ExecutionContext,
    ) -> Result<Vec<StackRow>> {
        let remote =
            collect_pages(|token| gateway.list_stacks(LISTED_STACK_STATUSES, token)).await?;
        debug!("Listed {} remote stacks", remote.len());

        let names = self
            .stacks()
            .map(|d| d.actual_name(ctx).map(|name| (d.alias.as_str(), name)))
            .collect::<Result<Vec<_>>>()?;

        let mut claimed = vec![false; remote.len()];
        let mut matches: Vec<Option<(usize, bool)>> = Vec::with_capacity(names.len());

        for (_, name) in &names {
            let prefix = format!("{name}{CHAIN_SEPARATOR}");
            let found = unclaimed(&remote, &claimed, |s| {
                s.name == *name || s.name.starts_with(&prefix)
            });
            if let Some(i) = found {
                claimed[i] = true;
            }
            matches.push(found.map(|i| (i, remote[i].name != *name)));
        }

        Ok(names
            .into_iter()
            .zip(matches)
            .map(|((alias, name), matched)| match matched {
                Some((i, chained)) => StackRow::attributed(alias, &remote[i], chained),
                None => StackRow::not_created(alias, name),
            })
            .collect())
    }

    /// Describes a stack by alias or literal name.
    ///
    /// # Errors
    ///
    /// Returns an error if a gateway call fails.
    pub async fn describe_stack(
        &self,
        gateway: &dyn ProvisioningGateway,
        ctx: &ExecutionContext,
        alias_or_name: &str,
    ) -> Result<StackDescription> {
        let stack_name = self.resolve_name(alias_or_name, ctx)?;

        let Some(detail) = gateway.describe_stack(&stack_name).await? else {
            info!("Stack {stack_name} does not exist");
            return Ok(StackDescription::NotFound { stack_name });
        };

        let mut events = Vec::new();
        let mut token = None;
        loop {
            let page = gateway.list_stack_events(&stack_name, token).await?;
            events.extend(page.items);
            match page.next_token {
                Some(next) if events.len() < RECENT_EVENT_COUNT => token = Some(next),
                _ => break,
            }
        }

        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events.truncate(RECENT_EVENT_COUNT);

        Ok(StackDescription::Found { detail, events })
    }

    /// Lists the resources of every defined stack.
    ///
    /// Stacks whose listing fails with a client error (typically because
    /// they do not exist) are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error on any other gateway failure.
    pub async fn list_resources(
        &self,
        gateway: &dyn ProvisioningGateway,
        ctx: &ExecutionContext,
    ) -> Result<Vec<StackResources>> {
        let mut listed = Vec::new();

        for definition in self.stacks() {
            let stack_name = definition.actual_name(ctx)?;
            let result =
                collect_pages(|token| gateway.list_stack_resources(&stack_name, token)).await;

            match result {
                Ok(resources) => listed.push(StackResources {
                    alias: definition.alias.clone(),
                    stack_name,
                    resources,
                }),
                Err(e) if e.is_client_error() => {
                    debug!("Skipping resources of {stack_name}: {e}");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(listed)
    }

    /// Lists exports produced by the group's stacks.
    ///
    /// An export belongs to the first stack whose actual name occurs in the
    /// exporting stack id. Other exports are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if a name cannot be rendered or the listing fails.
    pub async fn list_exports(
        &self,
        gateway: &dyn ProvisioningGateway,
        ctx: &ExecutionContext,
    ) -> Result<Vec<ExportRow>> {
        let exports: Vec<Export> = collect_pages(|token| gateway.list_exports(token)).await?;

        let names = self
            .stacks()
            .map(|d| d.actual_name(ctx).map(|name| (d.alias.as_str(), name)))
            .collect::<Result<Vec<_>>>()?;

        Ok(exports
            .into_iter()
            .filter_map(|export| {
                let (alias, stack_name) = names
                    .iter()
                    .find(|(_, name)| export.exporting_stack_id.contains(name.as_str()))?;
                Some(ExportRow {
                    alias: (*alias).to_string(),
                    stack_name: stack_name.clone(),
                    name: export.name,
                    value: export.value,
                })
            })
            .collect())
    }

    /// Validates one template, or all of them when `alias` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the alias is unknown or a validation call fails.
    pub async fn validate_templates(
        &self,
        gateway: &dyn ProvisioningGateway,
        ctx: &ExecutionContext,
        alias: Option<&str>,
    ) -> Result<Vec<TemplateCheck>> {
        let definitions = match alias {
            Some(alias) => vec![self.get(alias)?],
            None => self.stacks().collect(),
        };

        let mut checks = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let template_url = self.template_url(definition, ctx)?;
            info!("Validating {template_url}");
            let validation = gateway.validate_template(&template_url).await?;
            checks.push(TemplateCheck {
                alias: definition.alias.clone(),
                template_url,
                validation,
            });
        }

        Ok(checks)
    }
}

fn unclaimed(
    remote: &[StackSummary],
    claimed: &[bool],
    predicate: impl Fn(&StackSummary) -> bool,
) -> Option<usize> {
    remote
        .iter()
        .enumerate()
        .find(|(i, s)| !claimed[*i] && predicate(s))
        .map(|(i, _)| i)
}
