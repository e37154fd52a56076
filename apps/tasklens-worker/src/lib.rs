pub mod worker;

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre;
use tracing_subscriber::EnvFilter;

use tasklens_service::TaskLensService;
use tasklens_storage::{db::Db, postgres::PgStore};

#[derive(Debug, Parser)]
#[command(
	version = tasklens_cli::VERSION,
	rename_all = "kebab",
	styles = tasklens_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = tasklens_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.try_init()
		.map_err(|err| eyre::eyre!("Failed to initialize tracing: {err}."))?;

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema(config.providers.embedding.dimensions).await?;

	let service = TaskLensService::new(config, PgStore::new(db.clone()))?;

	tracing::info!(model_version = %service.model_version(), "Reconciliation worker started.");

	let result = tokio::select! {
		result = worker::run_worker(&service) => result,
		signal = tokio::signal::ctrl_c() => signal.map_err(Into::into),
	};

	db.close().await;

	tracing::info!("Reconciliation worker stopped.");

	result
}
