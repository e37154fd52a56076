use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies the vector space an embedding lives in. Vectors with different tags are never
/// compared.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelVersion(String);
impl ModelVersion {
	pub fn new(raw: impl Into<String>) -> Self {
		Self(raw.into())
	}

	pub fn for_provider(cfg: &tasklens_config::EmbeddingProviderConfig) -> Self {
		Self(format!("{}:{}:{}", cfg.provider_id, cfg.model, cfg.dimensions))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl fmt::Display for ModelVersion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Hex blake3 digest of the exact text that was embedded.
pub fn content_hash(text: &str) -> String {
	blake3::hash(text.as_bytes()).to_hex().to_string()
}
