//! Stackfab CLI entrypoint.
//!
//! This is the main entrypoint for the stackfab command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use stackfab::cli::{Cli, Commands, OutputFormat, OutputFormatter};
use stackfab::config::{ConfigParser, ConfigValidator, StackfabConfig, find_config_file};
use stackfab::error::Result;
use stackfab::group::StackGroup;
use stackfab::prompt::TerminalPrompter;
use stackfab::tasks::{
    AwsClientProvider, TaskInvocation, TaskRegistry, TaskRunner, TaskTable, build_task_specs,
};

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let formatter = OutputFormatter::new(cli.output);
    match runtime.block_on(run(cli, &formatter)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", formatter.format_error(&format!("Error: {e}")));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli, formatter: &OutputFormatter) -> Result<()> {
    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::Tasks => cmd_tasks(cli.config.as_ref(), formatter),
        Commands::Run { tasks } => cmd_run(cli.config.as_ref(), &tasks, cli.output, formatter).await,
    }
}

/// Initialize a new project.
fn cmd_init(path: &Path, force: bool) -> Result<()> {
    info!("Initializing new stackfab project in: {}", path.display());

    let config_path = path.join("stackfab.yaml");
    let env_path = path.join(".env.example");
    let gitignore_path = path.join(".gitignore");
    let templates_dir = path.join("templates");

    // Check if files exist
    if !force && config_path.exists() {
        eprintln!("Configuration file already exists: {}", config_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(());
    }

    std::fs::create_dir_all(&templates_dir)?;

    std::fs::write(&config_path, include_str!("../templates/stackfab.yaml"))?;
    eprintln!("Created: {}", config_path.display());

    std::fs::write(&env_path, include_str!("../templates/.env.example"))?;
    eprintln!("Created: {}", env_path.display());

    // Write/update .gitignore
    if gitignore_path.exists() {
        let existing = std::fs::read_to_string(&gitignore_path)?;
        if !existing.lines().any(|l| l.trim() == ".env") {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&gitignore_path)?;
            writeln!(file, "\n# stackfab\n.env")?;
            eprintln!("Updated: {}", gitignore_path.display());
        }
    } else {
        std::fs::write(&gitignore_path, ".env\n")?;
        eprintln!("Created: {}", gitignore_path.display());
    }

    eprintln!("\nProject initialized successfully!");
    eprintln!("Next steps:");
    eprintln!("  1. Edit stackfab.yaml with your bucket and stacks");
    eprintln!("  2. Put your templates under {}", templates_dir.display());
    eprintln!("  3. Run 'stackfab tasks' to see the generated tasks");
    eprintln!("  4. Run 'stackfab run sync_templates create_foo'");

    Ok(())
}

/// List generated tasks.
fn cmd_tasks(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let (_config, group) = load_config(config_path)?;
    let table = register_tasks(&group)?;

    print!("{}", formatter.format_tasks(&table));
    Ok(())
}

/// Run a task chain.
async fn cmd_run(
    config_path: Option<&PathBuf>,
    tasks: &[String],
    output: OutputFormat,
    formatter: &OutputFormatter,
) -> Result<()> {
    // Syntax errors abort before anything runs
    let invocations = tasks
        .iter()
        .map(|t| TaskInvocation::parse(t))
        .collect::<Result<Vec<_>>>()?;

    let (config, group) = load_config(config_path)?;
    let table = register_tasks(&group)?;
    for invocation in &invocations {
        table.get(&invocation.name)?;
    }

    let mut ctx = config.initial_context();
    let prompter = TerminalPrompter::stdio();
    let mut runner = TaskRunner::new(&group, &table, &prompter, AwsClientProvider::new())
        .with_confirmation(config.confirmation.as_ref());

    for invocation in &invocations {
        let report = runner.run(&mut ctx, invocation).await?;
        let rendered = formatter.format_report(&report);
        match output {
            OutputFormat::Json => println!("{rendered}"),
            OutputFormat::Text => print!("{rendered}"),
        }
        std::io::stdout().flush()?;
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Loads and validates the configuration, then builds the stack group.
fn load_config(config_path: Option<&PathBuf>) -> Result<(StackfabConfig, StackGroup)> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let base_dir = config_file.parent().unwrap_or_else(|| Path::new("."));
    let parser = ConfigParser::new().with_base_path(base_dir);
    parser.load_dotenv()?;

    let config = parser.load_with_env(&config_file)?;

    let validation = ConfigValidator::new().validate(&config)?;
    for warning in &validation.warnings {
        warn!("{warning}");
    }

    let group = config.build_group(parser.base_path())?;
    Ok((config, group))
}

/// Builds the task table for a group.
fn register_tasks(group: &StackGroup) -> Result<TaskTable> {
    let mut table = TaskTable::new();
    table.register_all(build_task_specs(group))?;
    debug!("Registered {} tasks", table.len());
    Ok(table)
}
