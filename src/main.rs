//! redline — AI-assisted git diff review CLI.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! ergonomic error propagation and user-facing messages.

mod cli;

use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use redline::config::{self, AppConfig};
use redline::constants;
use redline::env::Env;
use redline::git;
use redline::providers::ProviderRegistry;
use redline::store::CacheStore;
use redline::workflow::{WorkflowConfig, WorkflowExecutor, WorkflowOutcome};

use cli::args::{AnalyzeArgs, Cli, Command, HistoryAction};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    let code = tokio::select! {
        result = run(cli) => match result {
            Ok(()) => 0,
            Err(err) => {
                eprintln!("{} {err:#}", "Error:".red().bold());
                1
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\n{}", "Interrupted by user".yellow());
            130
        }
    };
    process::exit(code);
}

/// Initialise tracing to stderr. `--debug` raises the default level;
/// `RUST_LOG` overrides everything.
fn init_tracing(cli: &Cli) {
    let debug = match &cli.command {
        Command::Analyze(args) | Command::Explain(args) => args.debug,
        _ => false,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Analyze(args) => run_analyze(*args, None).await,
        Command::Explain(args) => run_analyze(*args, Some("explain_diff")).await,
        Command::Repos => run_repos(),
        Command::Providers => run_providers().await,
        Command::History { action } => run_history(action),
        Command::Doctor => run_doctor().await,
        Command::Version => run_version(),
    }
}

/// Print version information.
fn run_version() -> Result<()> {
    println!("{} {}", constants::APP_NAME.bold(), constants::VERSION.green().bold());
    Ok(())
}

/// Execute an analysis workflow.
async fn run_analyze(args: AnalyzeArgs, forced_workflow: Option<&str>) -> Result<()> {
    let app = AppConfig::load(&Env::real()).context("failed to load configuration")?;

    let request = WorkflowConfig {
        workflow: forced_workflow.map(String::from).or(args.workflow),
        target_ref: args.target,
        source_ref: args.source,
        commit: args.commit,
        dry_run: args.dry_run,
        output_format: args.output_format,
        language: args.language,
        debug: args.debug,
        provider: args.provider,
        model: args.model,
        ..WorkflowConfig::new(args.repo)
    };

    let executor = WorkflowExecutor::new(app);
    let outcome = executor.run(request).await?;

    match outcome {
        WorkflowOutcome::NoChanges => {
            println!("{} No changes detected.", "✔".green().bold());
        }
        WorkflowOutcome::DryRun {
            output_dir,
            estimated_tokens,
        } => {
            println!("{} Dry run: prompt rendered successfully", "✔".green().bold());
            println!("  {} ~{estimated_tokens}", "Estimated tokens:".dimmed());
            println!("  {} {}", "Prompt saved to:".dimmed(), output_dir.display());
            println!("\nReview the prompt and run without --dry-run to execute.");
        }
        WorkflowOutcome::Completed {
            output_dir,
            cached,
            manual,
            ..
        } => {
            println!("{} Workflow completed successfully", "✔".green().bold());
            if cached {
                println!("  {}", "Result served from cache".cyan());
            }
            if manual {
                println!(
                    "  {}",
                    "Manual mode: prompt copied to clipboard, no stored response".yellow()
                );
            }
            println!("  {} {}", "Artifacts:".dimmed(), output_dir.display());
        }
    }
    Ok(())
}

/// List configured repositories.
fn run_repos() -> Result<()> {
    let app = AppConfig::load(&Env::real()).context("failed to load configuration")?;
    let repos_dir = app.repos_dir();
    let repos = config::list_repositories(&repos_dir);

    if repos.is_empty() {
        println!("No repositories configured.");
        println!("\nAdd repository setup files to: {}", repos_dir.display());
        return Ok(());
    }

    println!("Configured repositories:\n");
    for name in repos {
        match config::load_repo_setup(&repos_dir, &name) {
            Ok(setup) => {
                println!("  {}", name.bold());
                println!("    {}  {}", "path:".cyan(), setup.path.display());
                if let Some(default) = &setup.default_workflow {
                    println!("    {}  {default}", "default workflow:".cyan());
                }
                let workflows: Vec<&str> = setup.workflows.keys().map(String::as_str).collect();
                println!("    {}  {}", "workflows:".cyan(), workflows.join(", "));
            }
            Err(e) => println!("  {}  {}", name.bold(), format!("(invalid: {e})").red()),
        }
        println!();
    }
    Ok(())
}

/// List providers with availability and models.
async fn run_providers() -> Result<()> {
    let registry = ProviderRegistry::with_builtins();

    println!("Available providers:\n");
    for provider in registry.iter() {
        let status = if provider.is_available().await {
            "available".green()
        } else {
            "unavailable".red()
        };
        println!("  {}  [{status}]", provider.name().bold());
        println!("    {}  {}", "default model:".cyan(), provider.default_model());

        let models = provider.list_models().await;
        println!("    {}  {}", "models:".cyan(), models.join(", "));
        println!();
    }
    Ok(())
}

/// Query and curate the history store.
fn run_history(action: HistoryAction) -> Result<()> {
    let app = AppConfig::load(&Env::real()).context("failed to load configuration")?;
    let db_path = match &app.db_path {
        Some(path) => path.clone(),
        None => CacheStore::default_path(&Env::real())?,
    };
    let store = CacheStore::open(&db_path).context("failed to open history store")?;

    match action {
        HistoryAction::List { repo, limit, search } => {
            match (&repo, &search) {
                (Some(repo), Some(query)) => {
                    let entries = store.get_context(repo, limit, Some(query.as_str()))?;
                    if entries.len() == 1 && entries[0].is_sentinel() {
                        println!("No matching history for '{repo}'.");
                        return Ok(());
                    }
                    for entry in entries {
                        println!(
                            "  {}  {}  {}",
                            format!("#{}", entry.id).bold(),
                            entry.timestamp.dimmed(),
                            entry.summary,
                        );
                        if !entry.tags.is_empty() {
                            println!("       {}  {}", "tags:".cyan(), entry.tags.join(", "));
                        }
                    }
                }
                _ => {
                    let entries = store.recent(repo.as_deref(), limit)?;
                    if entries.is_empty() {
                        println!("No history entries.");
                        return Ok(());
                    }
                    for entry in entries {
                        println!(
                            "  {}  {}  {}  {}  {}",
                            format!("#{}", entry.id).bold(),
                            entry.timestamp.dimmed(),
                            entry.repo_name,
                            entry.model.dimmed(),
                            entry.summary,
                        );
                        if !entry.tags.is_empty() {
                            println!("       {}  {}", "tags:".cyan(), entry.tags);
                        }
                    }
                }
            }
        }
        HistoryAction::Tag { id, add, remove } => {
            let tags = store.update_tags(id, &add, &remove)?;
            println!("  {} tags for #{id}: {tags}", "✔".green().bold());
        }
    }
    Ok(())
}

/// Check installation and configuration status.
async fn run_doctor() -> Result<()> {
    println!("{} — setup check\n", constants::APP_NAME.bold());
    let mut all_ok = true;

    // Git
    match git::run_git(std::path::Path::new("."), &["--version"]).await {
        Ok(version) => println!("  {} git: {}", "✔".green().bold(), version.trim()),
        Err(_) => {
            println!("  {} git: not installed or not in PATH", "✖".red().bold());
            all_ok = false;
        }
    }

    // Providers
    let registry = ProviderRegistry::with_builtins();
    for provider in registry.iter() {
        if provider.is_available().await {
            println!("  {} provider '{}' available", "✔".green().bold(), provider.name());
        } else {
            println!(
                "  {} provider '{}' unavailable (optional)",
                "⚠".yellow().bold(),
                provider.name()
            );
        }
    }

    // History store
    let app = AppConfig::load(&Env::real()).context("failed to load configuration")?;
    let db_path = match &app.db_path {
        Some(path) => path.clone(),
        None => CacheStore::default_path(&Env::real())?,
    };
    match CacheStore::open(&db_path) {
        Ok(store) => {
            let search = if store.fts_enabled() {
                "full-text search"
            } else {
                "substring search"
            };
            println!(
                "  {} history store: {} ({search})",
                "✔".green().bold(),
                db_path.display()
            );
        }
        Err(e) => {
            println!("  {} history store: {e}", "✖".red().bold());
            all_ok = false;
        }
    }

    println!();
    if all_ok {
        println!("{} All required components are configured.", "✔".green().bold());
        Ok(())
    } else {
        anyhow::bail!("some required components need attention (see above)");
    }
}
