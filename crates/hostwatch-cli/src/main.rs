//! CLI for hostwatch: live resource dashboard for a remote host.

mod commands;
mod logging;
mod tui;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hostwatch")]
#[command(about = "hostwatch — live resource dashboard for a remote host")]
#[command(version = hostwatch_core::VERSION)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(flatten)]
    log: LogArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConnectionArgs {
    /// Metrics server address (http://host:port, ws://host:port or host:port)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// TOML config file; flags given on the command line take precedence
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Refresh request interval in milliseconds
    #[arg(long, global = true)]
    refresh_ms: Option<u64>,
}

#[derive(Args)]
struct LogArgs {
    /// Write log output to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Log status transitions and server notices (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Live interactive dashboard (TUI)
    Monitor,

    /// Print one line per received update until interrupted
    Watch {
        /// Emit each frame as a JSON object instead of a summary line
        #[arg(long)]
        json: bool,
    },

    /// Wait for the first update, print it as JSON and exit
    Snapshot {
        /// Give up after this many seconds without an update
        #[arg(long, default_value = "10")]
        timeout: f64,
    },
}

fn main() {
    let cli = Cli::parse();

    // The dashboard owns the terminal; it only logs when sent to a file.
    let stderr_allowed = !matches!(cli.command, Commands::Monitor);
    if let Err(e) = logging::init(cli.log.verbose, cli.log.log_file.as_deref(), stderr_allowed) {
        eprintln!("error: cannot open log file: {e}");
        std::process::exit(1);
    }

    let config = commands::load_config_or_exit(&commands::ConfigOverrides {
        endpoint: cli.connection.endpoint.as_deref(),
        config_path: cli.connection.config.as_deref(),
        refresh_ms: cli.connection.refresh_ms,
    });

    match cli.command {
        Commands::Monitor => commands::monitor::run(config),
        Commands::Watch { json } => commands::watch::run(config, json),
        Commands::Snapshot { timeout } => commands::snapshot::run(config, timeout),
    }
}
