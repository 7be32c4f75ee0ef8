use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod config;
mod file_store;
mod notify;
mod scan_cmd;
mod state;
mod tasks_cmd;

use tasks_cmd::{TaskCommand, UserCommand};

#[derive(Parser, Debug)]
#[command(
    name = "tickler",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("TICKLER_BUILD_SHA"), ")"),
    about = "Personal task tracker with deadline reminders"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write ~/.tickler/config.toml with defaults
    InitConfig,

    /// Show resolved config and whether the notification channel is usable
    ConfigCheck,

    /// Manage task owners
    User {
        #[command(subcommand)]
        command: UserCommand,
    },

    /// Manage tasks
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },

    /// Run one deadline scan now and print the summary
    Scan {
        /// Scan as of this RFC3339 instant instead of the current time
        #[arg(long)]
        now: Option<String>,

        /// Print the report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Scan on a fixed interval until interrupted
    Serve,
}

fn init_logging() {
    let level = config::load_config()
        .map(|c| c.log.level)
        .unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_env("TICKLER_LOG").unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Command::InitConfig => config::init_config()?,
        Command::ConfigCheck => config::config_check()?,
        Command::User { command } => tasks_cmd::run_user(command)?,
        Command::Task { command } => tasks_cmd::run_task(command)?,
        Command::Scan { now, json } => scan_cmd::scan(now, json).await?,
        Command::Serve => scan_cmd::serve().await?,
    }

    Ok(())
}
