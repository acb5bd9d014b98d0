use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,                 // global --quiet
    pub no_color: bool,              // global --no-color
    pub json: bool,                  // global --json
    pub config_path: Option<PathBuf>, // global --config
}

#[derive(Parser)]
#[command(name = "civic")]
#[command(
    about = "Match civic complaints against resolved issues, open tickets and escalate them on a fixed timeline"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress banners and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Print structured JSON instead of chat text
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Read configuration from this file instead of ./civic.toml
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Answer a single query, then simulate a follow-up cycle
    Ask(AskArgs),

    /// Interactive chat loop (type `exit` or `quit` to stop)
    Chat(SessionArgs),

    /// Run the three sample queries and a 5-day follow-up cycle
    Demo(SessionArgs),

    /// Show the topic inferred for a query
    Topic(TopicArgs),

    /// List corpus posts related to a query
    Related(RelatedArgs),

    /// Handle the given queries, then report complaint and ticket totals
    Stats(StatsArgs),

    /// Initialize a civic.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Who is talking and from where
#[derive(Debug, Clone, Args)]
pub struct SessionArgs {
    /// User id recorded on complaints
    #[arg(long)]
    pub user: Option<String>,

    /// Ward the complaints are filed for
    #[arg(long)]
    pub ward: Option<String>,
}

#[derive(Debug, Parser)]
pub struct AskArgs {
    /// Free-text query (complaint, status check or question)
    pub query: String,

    #[command(flatten)]
    pub session: SessionArgs,

    /// Days ahead for the simulated follow-up cycle
    #[arg(long)]
    pub follow_up_days: Option<i64>,
}

#[derive(Debug, Parser)]
pub struct TopicArgs {
    /// Query to classify
    pub query: String,
}

#[derive(Debug, Parser)]
pub struct RelatedArgs {
    /// Query to match against the corpus
    pub query: String,

    /// Maximum posts to return
    #[arg(short, long, default_value = "3")]
    pub limit: usize,
}

#[derive(Debug, Parser)]
pub struct StatsArgs {
    /// Queries to handle before reporting (none reports the datasets only)
    pub queries: Vec<String>,

    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(Debug, Parser)]
pub struct InitArgs {
    /// Directory to write civic.toml into
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: Shell,

    /// Write to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,

    /// Output directory for the completion file
    #[arg(long, required_unless_present = "stdout")]
    pub out_dir: Option<PathBuf>,
}
