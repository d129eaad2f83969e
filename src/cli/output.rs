//! Output formatting for CLI commands.
//!
//! This module renders task reports as tables and colored text, or as JSON
//! for scripting.

use chrono::{DateTime, Utc};
use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::gateway::{ChangePreview, StackDetail, StackEvent};
use crate::group::{ExportRow, StackDescription, StackResources, StackRow, TemplateCheck};
use crate::lifecycle::LifecycleOutcome;
use crate::publish::SyncReport;
use crate::tasks::{TaskReport, TaskTable};

use super::commands::OutputFormat;

/// Placeholder for empty cells.
const EMPTY_CELL: &str = "-";

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Stack row for table display.
#[derive(Tabled)]
struct StackTableRow {
    #[tabled(rename = "Alias")]
    alias: String,
    #[tabled(rename = "Stack")]
    stack_name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Created")]
    created_at: String,
    #[tabled(rename = "Updated")]
    updated_at: String,
    #[tabled(rename = "Description")]
    description: String,
}

/// Resource row for table display.
#[derive(Tabled)]
struct ResourceTableRow {
    #[tabled(rename = "Logical ID")]
    logical_id: String,
    #[tabled(rename = "Physical ID")]
    physical_id: String,
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Updated")]
    updated_at: String,
}

/// Event row for table display.
#[derive(Tabled)]
struct EventTableRow {
    #[tabled(rename = "Time")]
    timestamp: String,
    #[tabled(rename = "Logical ID")]
    logical_id: String,
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

/// Key/value row for parameters and outputs.
#[derive(Tabled)]
struct KeyValueRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Export row for table display.
#[derive(Tabled)]
struct ExportTableRow {
    #[tabled(rename = "Alias")]
    alias: String,
    #[tabled(rename = "Stack")]
    stack_name: String,
    #[tabled(rename = "Export")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Proposed change row for table display.
#[derive(Tabled)]
struct ChangeTableRow {
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Logical ID")]
    logical_id: String,
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "Replacement")]
    replacement: String,
}

/// Template check row for table display.
#[derive(Tabled)]
struct TemplateTableRow {
    #[tabled(rename = "Alias")]
    alias: String,
    #[tabled(rename = "Template")]
    template_url: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Parameters")]
    parameters: usize,
}

/// Task row for table display.
#[derive(Tabled)]
struct TaskTableRow {
    #[tabled(rename = "Task")]
    name: String,
    #[tabled(rename = "Arguments")]
    usage: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a task report for display.
    #[must_use]
    pub fn format_report(&self, report: &TaskReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => match report {
                TaskReport::Context(message) => format!("{} {message}\n", "✓".green()),
                TaskReport::Lifecycle(outcome) => Self::format_outcome(outcome),
                TaskReport::Stacks(rows) => Self::format_stacks(rows),
                TaskReport::Description(description) => Self::format_description(description),
                TaskReport::Resources(stacks) => Self::format_resources(stacks),
                TaskReport::Exports(rows) => Self::format_exports(rows),
                TaskReport::Templates(checks) => Self::format_templates(checks),
                TaskReport::Synced(report) => Self::format_sync(report),
                TaskReport::Console(url) => format!("{url}\n"),
            },
        }
    }

    /// Formats the registered tasks.
    #[must_use]
    pub fn format_tasks(&self, tasks: &TaskTable) -> String {
        match self.format {
            OutputFormat::Json => {
                let specs: Vec<_> = tasks.iter().collect();
                serde_json::to_string_pretty(&specs).unwrap_or_default()
            }
            OutputFormat::Text => {
                let rows: Vec<TaskTableRow> = tasks
                    .iter()
                    .map(|t| TaskTableRow {
                        name: t.name.clone(),
                        usage: t.usage.clone(),
                        description: t.description.clone(),
                    })
                    .collect();
                format!("{}\n", Table::new(rows))
            }
        }
    }

    /// Formats an error for display.
    #[must_use]
    pub fn format_error(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": "error", "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{} {message}", "✗".red()),
        }
    }

    /// Formats a lifecycle outcome.
    fn format_outcome(outcome: &LifecycleOutcome) -> String {
        match outcome {
            LifecycleOutcome::Created { stack_name } => {
                format!("{} Stack {stack_name} created\n", "✓".green())
            }
            LifecycleOutcome::Updated { stack_name } => {
                format!("{} Stack {stack_name} updated\n", "✓".green())
            }
            LifecycleOutcome::Deleted { stack_name } => {
                format!("{} Stack {stack_name} deleted\n", "✓".green())
            }
            LifecycleOutcome::NoChanges { .. } => String::from("No changes\n"),
            LifecycleOutcome::Previewed { preview, detail } => {
                Self::format_preview(preview, *detail)
            }
        }
    }

    /// Formats a change preview, with per-resource JSON when `detail` is set.
    fn format_preview(preview: &ChangePreview, detail: bool) -> String {
        let mut output = String::new();

        let _ = writeln!(
            output,
            "\nChange preview {} for {} ({})\n",
            preview.name.bold(),
            preview.stack_name,
            preview.status
        );

        if !preview.parameters.is_empty() {
            let rows: Vec<KeyValueRow> = preview
                .parameters
                .iter()
                .map(|p| KeyValueRow {
                    key: p.key.clone(),
                    value: p.value.clone(),
                })
                .collect();
            let _ = writeln!(output, "{}\n", Table::new(rows));
        }

        let rows: Vec<ChangeTableRow> = preview
            .changes
            .iter()
            .map(|c| ChangeTableRow {
                action: Self::format_action(&c.action),
                logical_id: c.logical_id.clone(),
                resource_type: c.resource_type.clone(),
                replacement: c.replacement.clone().unwrap_or_else(|| EMPTY_CELL.to_string()),
            })
            .collect();
        let _ = writeln!(output, "{}", Table::new(rows));

        if detail {
            let _ = writeln!(
                output,
                "\n{}",
                serde_json::to_string_pretty(&preview.changes).unwrap_or_default()
            );
        }

        let _ = writeln!(output, "\n{} resource change(s)", preview.changes.len());
        output
    }

    /// Formats `list_stacks` rows.
    fn format_stacks(rows: &[StackRow]) -> String {
        if rows.is_empty() {
            return String::from("   No stacks defined.\n");
        }

        let table_rows: Vec<StackTableRow> = rows
            .iter()
            .map(|row| StackTableRow {
                alias: row.alias.clone(),
                stack_name: if row.chained {
                    format!("{} *", row.stack_name)
                } else {
                    row.stack_name.clone()
                },
                status: row.status.as_deref().map_or_else(
                    || "Not created".dimmed().to_string(),
                    Self::format_status,
                ),
                created_at: Self::format_time(row.created_at),
                updated_at: Self::format_time(row.updated_at),
                description: row
                    .description
                    .as_deref()
                    .map_or_else(|| EMPTY_CELL.to_string(), |d| Self::truncate(d, 40)),
            })
            .collect();

        let mut output = format!("{}\n", Table::new(table_rows));
        if rows.iter().any(|r| r.chained) {
            let _ = writeln!(
                output,
                "\n{} * matched by name prefix; may belong to another stack",
                "⚠".yellow()
            );
        }
        output
    }

    /// Formats a `describe_stack` result.
    fn format_description(description: &StackDescription) -> String {
        match description {
            StackDescription::NotFound { stack_name } => {
                format!("Stack {stack_name} does not exist\n")
            }
            StackDescription::Found { detail, events } => Self::format_detail(detail, events),
        }
    }

    fn format_detail(detail: &StackDetail, events: &[StackEvent]) -> String {
        let mut output = String::new();

        let _ = write!(output, "\n📦 Stack: {}\n\n", detail.name.bold());
        let _ = writeln!(output, "   Status: {}", Self::format_status(&detail.status));
        if let Some(reason) = &detail.status_reason {
            let _ = writeln!(output, "   Reason: {reason}");
        }
        if let Some(description) = &detail.description {
            let _ = writeln!(output, "   Description: {description}");
        }
        let _ = writeln!(output, "   Created: {}", Self::format_time(detail.created_at));
        let _ = writeln!(output, "   Updated: {}", Self::format_time(detail.updated_at));
        if let Some(id) = &detail.id {
            let _ = writeln!(output, "   ID: {id}");
        }

        if !detail.parameters.is_empty() {
            output.push_str("\nParameters:\n");
            let rows: Vec<KeyValueRow> = detail
                .parameters
                .iter()
                .map(|p| KeyValueRow {
                    key: p.key.clone(),
                    value: p.value.clone(),
                })
                .collect();
            let _ = writeln!(output, "{}", Table::new(rows));
        }

        if !detail.outputs.is_empty() {
            output.push_str("\nOutputs:\n");
            let rows: Vec<KeyValueRow> = detail
                .outputs
                .iter()
                .map(|o| KeyValueRow {
                    key: o.export_name.as_ref().map_or_else(
                        || o.key.clone(),
                        |export| format!("{} (export: {export})", o.key),
                    ),
                    value: o.value.clone(),
                })
                .collect();
            let _ = writeln!(output, "{}", Table::new(rows));
        }

        if !events.is_empty() {
            let _ = writeln!(output, "\nRecent events ({}):", events.len());
            let rows: Vec<EventTableRow> = events
                .iter()
                .map(|e| EventTableRow {
                    timestamp: Self::format_time(e.timestamp),
                    logical_id: e.logical_id.clone(),
                    resource_type: e.resource_type.clone(),
                    status: Self::format_status(&e.status),
                    reason: e
                        .reason
                        .as_deref()
                        .map_or_else(|| EMPTY_CELL.to_string(), |r| Self::truncate(r, 50)),
                })
                .collect();
            let _ = writeln!(output, "{}", Table::new(rows));
        }

        output
    }

    /// Formats `list_resources` results.
    fn format_resources(stacks: &[StackResources]) -> String {
        if stacks.is_empty() {
            return String::from("   No deployed stacks.\n");
        }

        let mut output = String::new();
        for stack in stacks {
            let _ = write!(output, "\n📦 {} ({})\n", stack.stack_name.bold(), stack.alias);
            if stack.resources.is_empty() {
                output.push_str("   No resources.\n");
                continue;
            }
            let rows: Vec<ResourceTableRow> = stack
                .resources
                .iter()
                .map(|r| ResourceTableRow {
                    logical_id: r.logical_id.clone(),
                    physical_id: r
                        .physical_id
                        .as_deref()
                        .map_or_else(|| EMPTY_CELL.to_string(), |id| Self::truncate(id, 40)),
                    resource_type: r.resource_type.clone(),
                    status: Self::format_status(&r.status),
                    updated_at: Self::format_time(r.updated_at),
                })
                .collect();
            let _ = writeln!(output, "{}", Table::new(rows));
        }
        output
    }

    /// Formats `list_exports` rows.
    fn format_exports(rows: &[ExportRow]) -> String {
        if rows.is_empty() {
            return String::from("   No exports.\n");
        }

        let rows: Vec<ExportTableRow> = rows
            .iter()
            .map(|r| ExportTableRow {
                alias: r.alias.clone(),
                stack_name: r.stack_name.clone(),
                name: r.name.clone(),
                value: r.value.clone(),
            })
            .collect();
        format!("{}\n", Table::new(rows))
    }

    /// Formats template validation results.
    fn format_templates(checks: &[TemplateCheck]) -> String {
        let rows: Vec<TemplateTableRow> = checks
            .iter()
            .map(|c| TemplateTableRow {
                alias: c.alias.clone(),
                template_url: c.template_url.clone(),
                description: c
                    .validation
                    .description
                    .clone()
                    .unwrap_or_else(|| EMPTY_CELL.to_string()),
                parameters: c.validation.parameters.len(),
            })
            .collect();
        format!(
            "{}\n\n{} {} template(s) valid\n",
            Table::new(rows),
            "✓".green(),
            checks.len()
        )
    }

    /// Formats a sync report.
    fn format_sync(report: &SyncReport) -> String {
        let mut output = String::new();
        for key in &report.uploaded {
            let _ = writeln!(output, "   {} {key}", "+".green());
        }
        for key in &report.deleted {
            let _ = writeln!(output, "   {} {key}", "-".red());
        }
        let _ = writeln!(
            output,
            "\n{} Synced to s3://{}: {} uploaded, {} unchanged, {} deleted",
            "✓".green(),
            report.bucket,
            report.uploaded.len().to_string().green(),
            report.unchanged.len(),
            report.deleted.len().to_string().red()
        );
        output
    }

    /// Formats a change action with color.
    fn format_action(action: &str) -> String {
        match action {
            "Add" => "+add".green().to_string(),
            "Modify" => "~modify".yellow().to_string(),
            "Remove" => "-remove".red().to_string(),
            other => other.to_string(),
        }
    }

    /// Formats a stack or resource status with color.
    fn format_status(status: &str) -> String {
        if status.ends_with("_FAILED") || status.contains("ROLLBACK") {
            status.red().to_string()
        } else if status.ends_with("_IN_PROGRESS") {
            status.yellow().to_string()
        } else if status.ends_with("_COMPLETE") {
            status.green().to_string()
        } else {
            status.to_string()
        }
    }

    fn format_time(time: Option<DateTime<Utc>>) -> String {
        time.map_or_else(
            || EMPTY_CELL.to_string(),
            |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
        )
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ResourceChange;

    fn text() -> OutputFormatter {
        OutputFormatter::new(OutputFormat::Text)
    }

    fn row(alias: &str, stack_name: &str, status: Option<&str>, chained: bool) -> StackRow {
        StackRow {
            alias: alias.to_string(),
            stack_name: stack_name.to_string(),
            status: status.map(String::from),
            created_at: None,
            updated_at: None,
            description: None,
            chained,
        }
    }

    #[test]
    fn test_no_changes_text() {
        let report = TaskReport::Lifecycle(LifecycleOutcome::NoChanges {
            stack_name: String::from("app-dev-foo"),
        });
        assert_eq!(text().format_report(&report), "No changes\n");
    }

    #[test]
    fn test_missing_stack_text() {
        let report = TaskReport::Description(StackDescription::NotFound {
            stack_name: String::from("app-dev-foo"),
        });
        assert_eq!(
            text().format_report(&report),
            "Stack app-dev-foo does not exist\n"
        );
    }

    #[test]
    fn test_stacks_text_marks_missing_and_chained() {
        let report = TaskReport::Stacks(vec![
            row("foo", "app-foo", None, false),
            row("bar", "app-bar-nested", Some("CREATE_COMPLETE"), true),
        ]);
        let output = text().format_report(&report);

        assert!(output.contains("Not created"));
        assert!(output.contains("app-bar-nested *"));
        assert!(output.contains("matched by name prefix"));
    }

    #[test]
    fn test_preview_detail_includes_json() {
        let preview = ChangePreview {
            stack_name: String::from("app-dev-foo"),
            id: None,
            name: String::from("stackfab-preview-1"),
            status: String::from("CREATE_COMPLETE"),
            status_reason: None,
            parameters: Vec::new(),
            changes: vec![ResourceChange {
                action: String::from("Add"),
                logical_id: String::from("Bucket"),
                physical_id: None,
                resource_type: String::from("AWS::S3::Bucket"),
                replacement: None,
                details: Vec::new(),
            }],
        };

        let summary = text().format_report(&TaskReport::Lifecycle(LifecycleOutcome::Previewed {
            preview: preview.clone(),
            detail: false,
        }));
        let detailed = text().format_report(&TaskReport::Lifecycle(LifecycleOutcome::Previewed {
            preview,
            detail: true,
        }));

        assert!(summary.contains("AWS::S3::Bucket"));
        assert!(!summary.contains("\"logical_id\""));
        assert!(detailed.contains("\"logical_id\": \"Bucket\""));
    }

    #[test]
    fn test_json_report() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let output = formatter.format_report(&TaskReport::Lifecycle(LifecycleOutcome::Deleted {
            stack_name: String::from("app-dev-foo"),
        }));
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["report"], "lifecycle");
        assert_eq!(value["data"]["outcome"], "deleted");
        assert_eq!(value["data"]["stack_name"], "app-dev-foo");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        assert_eq!(OutputFormatter::truncate("a long description", 10), "a long ...");
    }
}
