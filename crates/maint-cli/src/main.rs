mod cmd;
mod output;
mod repl;
mod root;

use clap::Parser;
use cmd::Commands;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

/// Handle for changing the log level of a running process.
pub type LogHandle = reload::Handle<EnvFilter, Registry>;

#[derive(Parser)]
#[command(
    name = "maint",
    about = "Maintenance releases: track patches, cherry-pick fixes into release branches, deploy",
    version,
    propagate_version = true
)]
struct Cli {
    /// Maintenance root holding .maintenance.json and the repo checkouts
    #[arg(long, global = true, env = "MAINT_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Only log warnings and errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log debug output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

pub fn env_filter(level: tracing::Level) -> EnvFilter {
    EnvFilter::from_default_env().add_directive(level.into())
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.quiet {
        tracing::Level::WARN
    } else if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let (filter, log_handle) = reload::Layer::new(env_filter(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Repl => repl::run(&root, log_handle, cli.json),
        command => cmd::open_engine(&root).and_then(|mut engine| cmd::run(&mut engine, command, cli.json)),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
