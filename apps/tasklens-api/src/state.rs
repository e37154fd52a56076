use std::sync::Arc;

use tasklens_service::TaskLensService;
use tasklens_storage::{db::Db, postgres::PgStore};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<TaskLensService>,
	db: Option<Db>,
}
impl AppState {
	/// Connects to Postgres, ensures the schema for the configured dimension, and wires the
	/// HTTP embedding provider.
	pub async fn new(config: tasklens_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema(config.providers.embedding.dimensions).await?;

		let service = TaskLensService::new(config, PgStore::new(db.clone()))?;

		Ok(Self { service: Arc::new(service), db: Some(db) })
	}

	pub fn from_service(service: TaskLensService) -> Self {
		Self { service: Arc::new(service), db: None }
	}

	pub async fn close(&self) {
		if let Some(db) = &self.db {
			db.close().await;
		}
	}
}
