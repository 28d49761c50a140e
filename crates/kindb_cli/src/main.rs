//! kindb CLI
//!
//! Command-line maintenance tools for kindb stores.
//!
//! # Commands
//!
//! - `summary` - Display record counts and store settings
//! - `check` - Compare the reference map with the records
//! - `rebuild` - Recompute the reference map and secondary indices
//! - `upgrade` - Migrate an older store to the current schema
//! - `list` - List the handles of one record kind
//! - `export` - Write the records of one kind as JSON lines

mod commands;
mod error;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::error::CliError;

/// kindb command-line store tools.
#[derive(Parser)]
#[command(name = "kindb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Print JSON instead of text
    #[arg(global = true, long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display record counts and store settings
    Summary,

    /// Compare the reference map with the records
    Check,

    /// Recompute derived indices
    Rebuild {
        /// Only rebuild the reference map
        #[arg(long, conflicts_with = "secondary")]
        references: bool,

        /// Only rebuild secondary indices
        #[arg(long)]
        secondary: bool,
    },

    /// Migrate an older store to the current schema
    Upgrade {
        /// Confirm the upgrade; without it pending steps are only listed
        #[arg(long)]
        yes: bool,
    },

    /// List the handles of one record kind
    List {
        /// Record kind (person, family, event, ...)
        kind: String,

        /// Sort by the kind's display key
        #[arg(short, long)]
        sorted: bool,

        /// Locale for sorting, e.g. sv_SE
        #[arg(short, long)]
        locale: Option<String>,
    },

    /// Write the records of one kind as JSON lines
    Export {
        /// Record kind (person, family, event, ...)
        kind: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let json = cli.json;
    let path = || cli.path.clone().ok_or(CliError::MissingPath);

    match cli.command {
        Commands::Summary => commands::summary::run(&path()?, json)?,
        Commands::Check => commands::check::run(&path()?, json)?,
        Commands::Rebuild {
            references,
            secondary,
        } => {
            let both = !references && !secondary;
            commands::rebuild::run(&path()?, references || both, secondary || both, json)?;
        }
        Commands::Upgrade { yes } => commands::upgrade::run(&path()?, yes, json)?,
        Commands::List {
            kind,
            sorted,
            locale,
        } => commands::list::run(&path()?, &kind, sorted, locale.as_deref(), json)?,
        Commands::Export { kind } => commands::export::run(&path()?, &kind)?,
        Commands::Version => {
            println!("kindb CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("kindb schema v{}", kindb_core::SCHEMA_VERSION);
        }
    }

    Ok(())
}
