use anyhow::Result;
use clap::Parser;
use civictriage::cli::{AppContext, Cli, Commands};
use civictriage::cli_ext::session_cmd;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so chat/JSON output on stdout stays clean
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        json: cli.json,
        config_path: cli.config,
    };

    match cli.command {
        Commands::Ask(args) => session_cmd::ask(args, &ctx),
        Commands::Chat(args) => session_cmd::chat(args, &ctx),
        Commands::Demo(args) => session_cmd::demo(args, &ctx),
        Commands::Topic(args) => session_cmd::topic(args, &ctx),
        Commands::Related(args) => session_cmd::related(args, &ctx),
        Commands::Stats(args) => session_cmd::stats(args, &ctx),
        Commands::Init(args) => civictriage::infra::config::init(args, &ctx),
        Commands::Completions(args) => civictriage::completion::run(args, &ctx),
    }
}
