//! Clap argument types for the redline CLI.

use clap::Parser;

use redline::workflow::OutputFormat;

/// AI-assisted git diff review.
#[derive(Parser, Debug)]
#[command(name = "redline", version = redline::constants::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Analyze a git diff with an LLM workflow.
    Analyze(Box<AnalyzeArgs>),

    /// Explain changes in plain language (runs the explain_diff workflow).
    Explain(Box<AnalyzeArgs>),

    /// List configured repositories.
    Repos,

    /// List LLM providers, their availability, and their models.
    Providers,

    /// Query and curate the analysis history store.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Verify installation and configuration.
    Doctor,

    /// Print version information.
    Version,
}

/// Arguments for the `analyze` and `explain` subcommands.
#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    /// Repository name (as configured in the repos directory).
    #[arg(long)]
    pub repo: String,

    /// Workflow to execute (default comes from the repository setup).
    #[arg(long)]
    pub workflow: Option<String>,

    /// Target ref for the diff (base).
    #[arg(long)]
    pub target: Option<String>,

    /// Source ref for the diff (tip).
    #[arg(long)]
    pub source: Option<String>,

    /// Analyze a single commit (diffs against its parent).
    #[arg(long, conflicts_with_all = ["target", "source"])]
    pub commit: Option<String>,

    /// Force a specific language context instead of detecting from the diff.
    #[arg(long)]
    pub language: Option<String>,

    /// Render and persist the prompt without calling the LLM.
    #[arg(long, short = 'n', default_value_t = false)]
    pub dry_run: bool,

    /// Output format for the persisted result.
    #[arg(long, short = 'o', default_value = "markdown")]
    pub output_format: OutputFormat,

    /// LLM provider override.
    #[arg(long)]
    pub provider: Option<String>,

    /// Model override.
    #[arg(long)]
    pub model: Option<String>,

    /// Enable debug logging.
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

/// History store subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum HistoryAction {
    /// List recent analysis entries.
    List {
        /// Restrict to one repository.
        #[arg(long)]
        repo: Option<String>,

        /// Maximum entries to show.
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Full-text search over summaries and tags (requires --repo).
        #[arg(long, requires = "repo")]
        search: Option<String>,
    },

    /// Edit an entry's tags.
    Tag {
        /// Entry id (see `history list`).
        id: i64,

        /// Tags to add.
        #[arg(long, value_delimiter = ',')]
        add: Vec<String>,

        /// Tags to remove.
        #[arg(long, value_delimiter = ',')]
        remove: Vec<String>,
    },
}
