//! tollpass CLI
//!
//! Command-line front end for the toll-pass ledger.
//!
//! # Commands
//!
//! - `create` / `update` - Register or edit a pass
//! - `debit` - Debit a passage
//! - `show` / `list` - Inspect passes
//! - `push` / `push-unlinked` - Push passes to the remote peer
//! - `sync` - Run one sync cycle
//! - `watch` - Run sync cycles periodically until interrupted

mod commands;

use clap::{Parser, Subcommand};
use commands::{Context, OutputFormat};
use std::path::PathBuf;
use std::time::Duration;
use tollpass_store::VehicleClass;
use tracing_subscriber::EnvFilter;

/// Toll-pass ledger with remote synchronization.
#[derive(Parser, Debug)]
#[command(name = "tollpass")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long, default_value = "tollpass-data")]
    store: PathBuf,

    /// Path to the remote connection settings (JSON)
    #[arg(global = true, short, long, default_value = "tollpass-remote.json")]
    config: PathBuf,

    /// Remote call timeout in seconds
    #[arg(global = true, long, default_value_t = 10)]
    timeout: u64,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register a new pass and push it
    Create {
        /// Vehicle plate
        plate: String,

        /// Name of the subscriber
        #[arg(long)]
        holder: String,

        /// Vehicle class (car, suv, bus, truck, other)
        #[arg(long, default_value = "car")]
        class: VehicleClass,

        /// Opening balance in minor units
        #[arg(long, default_value_t = 0)]
        balance: i64,

        /// Cost per passage in minor units
        #[arg(long)]
        cost: Option<i64>,
    },

    /// Edit a pass
    Update {
        /// Current plate
        plate: String,

        /// New plate
        #[arg(long)]
        new_plate: Option<String>,

        /// New holder name
        #[arg(long)]
        holder: Option<String>,

        /// New vehicle class
        #[arg(long)]
        class: Option<VehicleClass>,

        /// New cost per passage
        #[arg(long)]
        cost: Option<i64>,
    },

    /// Debit one passage, or an explicit amount
    Debit {
        /// Vehicle plate
        plate: String,

        /// Amount in minor units (defaults to the pass's cost per passage)
        #[arg(short, long)]
        amount: Option<i64>,
    },

    /// Show one pass
    Show {
        /// Vehicle plate
        plate: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List passes
    List {
        /// Only passes with unacknowledged local changes
        #[arg(long)]
        pending: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Push one pass to the remote peer
    Push {
        /// Vehicle plate
        plate: String,
    },

    /// Push every local pass that has no remote counterpart yet
    PushUnlinked,

    /// Run one sync cycle: push stale passes, then pull
    Sync,

    /// Run sync cycles periodically until interrupted
    Watch {
        /// Seconds between cycles
        #[arg(short, long, default_value_t = 300)]
        interval: u64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let ctx = Context::open(&cli.store, &cli.config, Duration::from_secs(cli.timeout))?;

    match cli.command {
        Commands::Create {
            plate,
            holder,
            class,
            balance,
            cost,
        } => commands::pass::create(&ctx, plate, holder, class, balance, cost)?,
        Commands::Update {
            plate,
            new_plate,
            holder,
            class,
            cost,
        } => commands::pass::update(&ctx, &plate, new_plate, holder, class, cost)?,
        Commands::Debit { plate, amount } => commands::pass::debit(&ctx, &plate, amount)?,
        Commands::Show { plate, format } => commands::pass::show(&ctx, &plate, format)?,
        Commands::List { pending, format } => commands::pass::list(&ctx, pending, format)?,
        Commands::Push { plate } => commands::sync::push(&ctx, &plate)?,
        Commands::PushUnlinked => commands::sync::push_unlinked(&ctx)?,
        Commands::Sync => commands::sync::run_once(&ctx)?,
        Commands::Watch { interval } => commands::sync::watch(&ctx, interval)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_debit_with_amount() {
        let cli = Cli::try_parse_from([
            "tollpass", "--store", "/tmp/s", "debit", "GA-1", "-a", "250",
        ])
        .unwrap();
        assert_eq!(cli.store, PathBuf::from("/tmp/s"));
        assert!(matches!(
            cli.command,
            Commands::Debit { ref plate, amount: Some(250) } if plate == "GA-1"
        ));
    }

    #[test]
    fn parses_vehicle_class_codes() {
        let cli = Cli::try_parse_from([
            "tollpass", "create", "GA-1", "--holder", "Awa", "--class", "4x4",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Create { class: VehicleClass::Suv, balance: 0, cost: None, .. }
        ));
        assert!(Cli::try_parse_from([
            "tollpass", "create", "GA-1", "--holder", "Awa", "--class", "tank",
        ])
        .is_err());
    }

    #[test]
    fn watch_defaults_to_five_minutes() {
        let cli = Cli::try_parse_from(["tollpass", "watch"]).unwrap();
        assert!(matches!(cli.command, Commands::Watch { interval: 300 }));
    }
}
