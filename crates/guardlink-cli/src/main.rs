mod cmd;
mod output;
mod settings;

use clap::{Parser, Subcommand};
use cmd::fleet::FleetSubcommand;
use settings::SettingsArgs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "guardlink",
    about = "Keep member accounts enrolled under one security-monitoring administrator",
    version,
    propagate_version = true
)]
struct Cli {
    /// Fleet state file backing the simulated provider
    #[arg(long, global = true, env = "GUARDLINK_FLEET", default_value = "fleet.yaml")]
    fleet: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation pass and persist the resulting fleet state
    Run {
        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Derive every region's plan without performing any mutation
    Plan {
        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Remove accounts from the fleet in every region
    Teardown {
        /// Account identifiers to remove
        #[arg(required = true)]
        accounts: Vec<String>,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Manage the fleet state file
    Fleet {
        #[command(subcommand)]
        subcommand: FleetSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Run { settings } => cmd::run::run(&cli.fleet, &settings, cli.json),
        Commands::Plan { settings } => cmd::plan::run(&cli.fleet, &settings, cli.json),
        Commands::Teardown { accounts, settings } => {
            cmd::teardown::run(&cli.fleet, &accounts, &settings, cli.json)
        }
        Commands::Fleet { subcommand } => cmd::fleet::run(&cli.fleet, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
