use std::{sync::Arc, time::Duration};

use tasklens_config::{Config, EmbeddingProviderConfig};
use tasklens_domain::{ModelVersion, TextRejection};

use crate::{
	EmbeddingProvider,
	cache::{self, EmbeddingCache},
};

const REJECTED_MESSAGE: &str = "Embedding provider rejected the text.";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EmbeddingError {
	/// Retryable: the provider could not produce a usable vector right now.
	#[error("Embedding provider unavailable: {message}")]
	Unavailable { message: String },
	#[error("Embedding input rejected: {message}")]
	InvalidInput { message: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddedText {
	pub vector: Vec<f32>,
	pub model_version: ModelVersion,
}

/// Turns one piece of text into a vector tagged with the model version that produced it.
pub struct Embedder {
	cfg: EmbeddingProviderConfig,
	max_input_chars: u32,
	model_version: ModelVersion,
	provider: Arc<dyn EmbeddingProvider>,
	cache: Option<EmbeddingCache>,
}
impl Embedder {
	pub fn new(cfg: &Config, provider: Arc<dyn EmbeddingProvider>) -> Self {
		let cache = cfg.search.cache.enabled.then(|| {
			EmbeddingCache::new(
				Duration::from_secs(cfg.search.cache.ttl_seconds),
				cfg.search.cache.max_entries as usize,
			)
		});

		Self {
			cfg: cfg.providers.embedding.clone(),
			max_input_chars: cfg.search.max_input_chars,
			model_version: ModelVersion::for_provider(&cfg.providers.embedding),
			provider,
			cache,
		}
	}

	pub fn model_version(&self) -> &ModelVersion {
		&self.model_version
	}

	pub async fn embed(&self, text: &str) -> Result<EmbeddedText, EmbeddingError> {
		let text = tasklens_domain::normalize_text(text, self.max_input_chars).map_err(|rejection| {
			let message = match rejection {
				TextRejection::Empty => "Text is empty.".to_string(),
				TextRejection::TooLong { max_chars } =>
					format!("Text exceeds {max_chars} characters."),
			};

			EmbeddingError::InvalidInput { message }
		})?;
		let key = self.cache.as_ref().map(|_| cache::cache_key(&self.model_version, text));

		if let (Some(cache), Some(key)) = (self.cache.as_ref(), key.as_ref())
			&& let Some(vector) = cache.get(key)
		{
			tracing::debug!(model_version = %self.model_version, "Embedding cache hit.");

			return Ok(EmbeddedText { vector, model_version: self.model_version.clone() });
		}

		let vector = self.call_provider(text).await?;

		if let (Some(cache), Some(key)) = (self.cache.as_ref(), key) {
			cache.insert(key, vector.clone());
		}

		Ok(EmbeddedText { vector, model_version: self.model_version.clone() })
	}

	async fn call_provider(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
		let texts = [text.to_string()];
		let deadline = Duration::from_millis(self.cfg.timeout_ms);
		let vectors = tokio::time::timeout(deadline, self.provider.embed(&self.cfg, &texts))
			.await
			.map_err(|_| EmbeddingError::Unavailable {
				message: format!("Embedding provider timed out after {} ms.", self.cfg.timeout_ms),
			})?
			.map_err(|err| match err {
				tasklens_providers::Error::Rejected { status, message } => {
					// The provider's reply may carry account detail; it stays in server logs.
					tracing::warn!(status, body = %message, "Embedding provider rejected the text.");

					EmbeddingError::InvalidInput { message: REJECTED_MESSAGE.to_string() }
				},
				other => {
					tracing::warn!(
						error = %other,
						retryable = other.is_retryable(),
						"Embedding provider call failed."
					);

					EmbeddingError::Unavailable { message: other.to_string() }
				},
			})?;
		let Some(vector) = vectors.into_iter().next() else {
			return Err(EmbeddingError::Unavailable {
				message: "Embedding provider returned no vectors.".to_string(),
			});
		};

		if vector.len() != self.cfg.dimensions as usize {
			return Err(EmbeddingError::Unavailable {
				message: format!(
					"Embedding provider returned {} dimensions, expected {}.",
					vector.len(),
					self.cfg.dimensions
				),
			});
		}

		Ok(vector)
	}
}
