//! Routelog CLI
//!
//! Maintenance tools for a Routelog data file.
//!
//! # Commands
//!
//! - `export` - Write the whole store as one JSON document
//! - `backup` - Write today's backup object
//! - `soft-delete` - Snapshot and tombstone an account
//! - `restore` - Copy an account back from a snapshot
//! - `snapshots` - List snapshot keys
//! - `users` - List accounts
//! - `serve-backups` - Run the daily backup loop until interrupted

mod commands;
mod error;

use clap::{Parser, Subcommand};
use commands::Context;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Routelog data lifecycle tools.
#[derive(Parser)]
#[command(name = "routelog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the key-value data file
    #[arg(global = true, short, long, env = "ROUTELOG_DATA", default_value = "routelog.json")]
    data: PathBuf,

    /// Directory backups are written to
    #[arg(global = true, short, long, env = "ROUTELOG_BACKUP_DIR")]
    backup_dir: Option<PathBuf>,

    /// Keys requested per listing call
    #[arg(global = true, long)]
    page_size: Option<usize>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the whole store as one JSON document
    Export {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Leave out keys that cannot be read instead of failing
        #[arg(long)]
        skip_unreadable: bool,
    },

    /// Write today's backup object to the backup directory
    Backup,

    /// Snapshot an account and its logs, then mark it deleted
    SoftDelete {
        /// Account username
        username: String,
    },

    /// Restore an account from a snapshot
    Restore {
        /// Account username
        username: String,

        /// Snapshot key to restore (latest if omitted)
        #[arg(short, long)]
        snapshot: Option<String>,
    },

    /// List snapshot keys
    Snapshots {
        /// Only list snapshots of this account
        #[arg(short, long)]
        user: Option<String>,
    },

    /// List account usernames
    Users,

    /// Write a backup every day at the given UTC time until interrupted
    ServeBackups {
        /// Hour of day (UTC)
        #[arg(long, default_value = "3")]
        hour: u32,

        /// Minute of hour
        #[arg(long, default_value = "0")]
        minute: u32,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let ctx = Context::new(cli.data, cli.backup_dir, cli.page_size);
    let mut stdout = io::stdout();
    let out: &mut (dyn io::Write + Send) = &mut stdout;

    match cli.command {
        Commands::Export {
            output,
            skip_unreadable,
        } => {
            commands::export::run(&ctx, output.as_deref(), skip_unreadable, out).await?;
        }
        Commands::Backup => {
            commands::backup::run(&ctx, out).await?;
        }
        Commands::SoftDelete { username } => {
            commands::snapshot::soft_delete(&ctx, &username, out).await?;
        }
        Commands::Restore { username, snapshot } => {
            commands::snapshot::restore(&ctx, &username, snapshot.as_deref(), out).await?;
        }
        Commands::Snapshots { user } => {
            commands::snapshot::list(&ctx, user.as_deref(), out).await?;
        }
        Commands::Users => {
            commands::users::run(&ctx, out).await?;
        }
        Commands::ServeBackups { hour, minute } => {
            commands::serve::run(&ctx, hour, minute).await?;
        }
        Commands::Version => {
            println!("Routelog CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Routelog Core v{}", routelog_core::VERSION);
        }
    }

    Ok(())
}
