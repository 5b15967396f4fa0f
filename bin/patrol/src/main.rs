mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "patrol")]
#[command(about = "Rotates credentialed accounts through scheduled site visits", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter configuration
    Onboard {
        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Show configuration and the current schedule plan
    Status,

    /// Start the visit rotation (long-running)
    Run {
        /// Seconds each simulated page interaction takes
        #[arg(long, default_value = "2")]
        interaction_secs: u64,
    },

    /// Inspect or repair the visit ledger
    Ledger {
        #[command(subcommand)]
        command: LedgerCommands,
    },

    /// Manage the security cooldown sentinel
    Cooldown {
        #[command(subcommand)]
        command: CooldownCommands,
    },
}

#[derive(Subcommand)]
enum LedgerCommands {
    /// List visit records
    List,
    /// Drop an account's record (clears a stuck in-progress visit)
    Reset {
        /// Account identifier
        account: String,
    },
}

#[derive(Subcommand)]
enum CooldownCommands {
    /// Create the sentinel, pausing the rotation for the configured delay
    Set {
        /// Reason recorded in the sentinel
        #[arg(default_value = "manual")]
        reason: String,
    },
    /// Remove the sentinel
    Clear,
    /// Show the remaining pause, if any
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Onboard { force } => {
            commands::onboard::run(force).await?;
        }
        Commands::Status => {
            commands::status::run().await?;
        }
        Commands::Run { interaction_secs } => {
            commands::run::run(interaction_secs).await?;
        }
        Commands::Ledger { command } => match command {
            LedgerCommands::List => {
                commands::ledger_cmd::list().await?;
            }
            LedgerCommands::Reset { account } => {
                commands::ledger_cmd::reset(&account).await?;
            }
        },
        Commands::Cooldown { command } => match command {
            CooldownCommands::Set { reason } => {
                commands::cooldown_cmd::set(&reason)?;
            }
            CooldownCommands::Clear => {
                commands::cooldown_cmd::clear()?;
            }
            CooldownCommands::Status => {
                commands::cooldown_cmd::status()?;
            }
        },
    }

    Ok(())
}
