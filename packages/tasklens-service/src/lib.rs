pub mod embedder;
pub mod index;
pub mod reconcile;
pub mod search;

mod cache;
mod error;

pub use embedder::{EmbeddedText, Embedder, EmbeddingError};
pub use error::{Error, Result};
pub use index::{IndexResponse, RemoveResponse};
pub use reconcile::ReconcileReport;
pub use search::{SearchItem, SearchRequest, SearchResponse, SearchStage};
pub use tasklens_storage::BoxFuture;

use std::sync::Arc;

use reqwest::Client;

use tasklens_config::{Config, EmbeddingProviderConfig};
use tasklens_domain::ModelVersion;
use tasklens_providers::embedding;
use tasklens_storage::{TaskDirectory, VectorStore};

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, tasklens_providers::Result<Vec<Vec<f32>>>>;
}

/// OpenAI-compatible provider over one shared HTTP client.
pub struct HttpEmbeddingProvider {
	client: Client,
}
impl HttpEmbeddingProvider {
	pub fn new(cfg: &EmbeddingProviderConfig) -> tasklens_providers::Result<Self> {
		Ok(Self { client: tasklens_providers::build_client(cfg)? })
	}
}

impl EmbeddingProvider for HttpEmbeddingProvider {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, tasklens_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(&self.client, cfg, texts))
	}
}

pub struct TaskLensService {
	pub cfg: Config,
	vectors: Arc<dyn VectorStore>,
	tasks: Arc<dyn TaskDirectory>,
	embedder: Embedder,
}
impl TaskLensService {
	/// Wires a store that serves both the embedding and task contracts to the HTTP provider.
	pub fn new<S>(cfg: Config, store: S) -> Result<Self>
	where
		S: VectorStore + TaskDirectory + 'static,
	{
		let provider = HttpEmbeddingProvider::new(&cfg.providers.embedding).map_err(|err| {
			Error::Internal { message: format!("Failed to build embedding client: {err}") }
		})?;

		Ok(Self::with_provider(cfg, store, Arc::new(provider)))
	}

	pub fn with_provider<S>(cfg: Config, store: S, provider: Arc<dyn EmbeddingProvider>) -> Self
	where
		S: VectorStore + TaskDirectory + 'static,
	{
		let store = Arc::new(store);

		Self::with_parts(cfg, store.clone(), store, provider)
	}

	pub fn with_parts(
		cfg: Config,
		vectors: Arc<dyn VectorStore>,
		tasks: Arc<dyn TaskDirectory>,
		provider: Arc<dyn EmbeddingProvider>,
	) -> Self {
		let embedder = Embedder::new(&cfg, provider);

		Self { cfg, vectors, tasks, embedder }
	}

	pub fn model_version(&self) -> &ModelVersion {
		self.embedder.model_version()
	}
}
