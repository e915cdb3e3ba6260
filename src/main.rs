mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use cli::{CleanupArgs, Cli, Commands, MigrateArgs};
use invoice_migrator::config::Config;
use invoice_migrator::migration::{self, MigrationError, MigrationPlan, Migrator};
use invoice_migrator::repository::{InvoiceQuery, PostgresInvoiceSource};
use invoice_migrator::storage;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "invoice_migrator=info,aws=warn";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate(args) => migrate(cli.config, args).await,
        Commands::Cleanup(args) => cleanup(cli.config, args).await,
    }
}

async fn migrate(path: Option<std::path::PathBuf>, args: MigrateArgs) -> ExitCode {
    let config = match Config::load_with(path, |config| args.apply(config)) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let params = match config.run_params() {
        Ok(params) => params,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let source =
        match PostgresInvoiceSource::connect(&params.database_url, config.database.max_connections)
            .await
        {
            Ok(source) => Arc::new(source),
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        };
    let store = storage::connect(&config.storage).await;

    let plan = MigrationPlan {
        documents_bucket: config.storage.documents_bucket.clone(),
        bucket_prefix: config.storage.bucket_prefix.clone(),
        environment: config.environment.clone(),
        query: InvoiceQuery::from_dates(params.client_id, params.start, params.end),
    };
    let migrator = Migrator::new(store, source, config.copy_settings());

    match migrator.run(&plan).await {
        Ok(summary) => {
            info!(
                bucket = %summary.destination_bucket,
                invoices = summary.invoices,
                copied = summary.copied,
                "Migration complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => exit_with(&e),
    }
}

async fn cleanup(path: Option<std::path::PathBuf>, args: CleanupArgs) -> ExitCode {
    let config = match Config::load(path) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let store = storage::connect(&config.storage).await;

    match migration::cleanup(store.as_ref(), &args.bucket).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => exit_with(&e),
    }
}

fn exit_with(err: &MigrationError) -> ExitCode {
    migration::log_failure(err);
    ExitCode::from(err.exit_code())
}
