use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub search: Search,
	#[serde(default)]
	pub worker: Worker,
	pub security: Security,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
	/// Deadline for one whole HTTP request. Must exceed the embedding provider timeout.
	#[serde(default = "default_request_timeout_ms")]
	pub request_timeout_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Search {
	pub top_k: u32,
	/// Longest text, in characters, the embedder accepts.
	#[serde(default = "default_max_input_chars")]
	pub max_input_chars: u32,
	#[serde(default)]
	pub cache: SearchCache,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SearchCache {
	pub enabled: bool,
	pub ttl_seconds: u64,
	pub max_entries: u32,
}
impl Default for SearchCache {
	fn default() -> Self {
		Self { enabled: true, ttl_seconds: 300, max_entries: 1_024 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Worker {
	pub poll_interval_ms: u64,
	pub batch_size: u32,
	pub base_backoff_ms: u64,
	pub max_backoff_ms: u64,
}
impl Default for Worker {
	fn default() -> Self {
		Self { poll_interval_ms: 1_000, batch_size: 64, base_backoff_ms: 500, max_backoff_ms: 30_000 }
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Security {
	pub bind_localhost_only: bool,
	/// Shared secret the auth gateway presents as a bearer token.
	pub api_auth_token: Option<String>,
}

fn default_request_timeout_ms() -> u64 {
	10_000
}

fn default_max_input_chars() -> u32 {
	8_000
}
