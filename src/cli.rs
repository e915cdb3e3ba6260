use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use invoice_migrator::config::Config;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "invoice_migrator")]
#[command(about = "Copy a client's invoice documents into its own bucket", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $INVOICE_MIGRATOR_CONFIG, then config/invoice_migrator.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Copy the invoices of one client deposited in a date range
    Migrate(MigrateArgs),
    /// Empty and delete a client bucket
    Cleanup(CleanupArgs),
}

#[derive(clap::Args, Debug, Default)]
pub struct MigrateArgs {
    /// Client whose invoices are migrated
    #[arg(long)]
    pub client_id: Option<Uuid>,

    /// First deposit day, inclusive (yyyy-MM-dd)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last deposit day, exclusive (yyyy-MM-dd)
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Simulate storage calls instead of copying
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum number of copies in flight
    #[arg(long)]
    pub concurrency: Option<usize>,
}

impl MigrateArgs {
    /// Override configured run parameters with the ones given on the command line
    pub fn apply(&self, config: &mut Config) {
        if let Some(client_id) = self.client_id {
            config.params.client_id = Some(client_id);
        }
        if let Some(start) = self.start {
            config.params.deposit_start_date_incl = Some(start);
        }
        if let Some(end) = self.end {
            config.params.deposit_end_date_excl = Some(end);
        }
        if self.dry_run {
            config.storage.dry_run = true;
        }
        if let Some(concurrency) = self.concurrency {
            config.copy.concurrency = concurrency;
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct CleanupArgs {
    /// Bucket to empty and delete
    #[arg(long)]
    pub bucket: String,
}
