mod cmd_config;
mod cmd_history;
mod cmd_init;
mod cmd_rates;
mod cmd_report;
mod cmd_summary;
mod cmd_watch;
mod render;
mod workspace;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use workspace::{Overrides, Workspace};

#[derive(Parser)]
#[command(name = "meterline", version, about = "Metered compute accounting ledger")]
struct Cli {
    /// Job source (JSONL); defaults to config jobs_path or .meterline/jobs.jsonl
    #[arg(long, global = true)]
    jobs: Option<PathBuf>,
    /// Rate table (JSON or YAML); defaults to .meterline/rates.json
    #[arg(long, global = true)]
    rates: Option<PathBuf>,
    /// Debug logging on stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize a new .meterline/ workspace
    Init,
    /// Show totals from the latest snapshot
    Summary {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Recompute from all job records and persist a snapshot
    Report {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compute the total as it stood at a given instant (not persisted)
    AsOf {
        /// Horizon timestamp (RFC 3339, e.g. 2026-02-18T10:00:00Z)
        timestamp: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the effective rate table
    Rates,
    /// List persisted snapshots
    History {
        /// Maximum number of snapshots to show (0 = unlimited)
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Read or write workspace config (.meterline/config.json)
    Config {
        #[command(subcommand)]
        cmd: cmd_config::ConfigCmd,
    },
    /// Recompute and persist on a fixed interval
    Watch {
        /// Seconds between cycles
        #[arg(long, default_value_t = 60)]
        interval: u64,
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let cwd = std::env::current_dir()?;
    let overrides = Overrides {
        jobs: cli.jobs,
        rates: cli.rates,
    };

    let open = || Workspace::open(&cwd, overrides.clone());

    match cli.cmd {
        Command::Init => cmd_init::execute(&cwd),
        Command::Config { cmd } => cmd_config::run(cmd, &cwd),
        Command::Summary { json } => cmd_summary::execute(&open()?, json),
        Command::Report { json } => cmd_report::execute(&open()?, json),
        Command::AsOf { timestamp, json } => cmd_report::as_of(&open()?, &timestamp, json),
        Command::Rates => cmd_rates::execute(&open()?),
        Command::History { limit } => cmd_history::execute(&open()?, limit),
        Command::Watch { interval, cycles } => cmd_watch::execute(&open()?, interval, cycles),
    }
}
