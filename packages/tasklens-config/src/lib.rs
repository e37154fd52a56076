mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, Postgres, Providers, Search, SearchCache, Security, Service,
	Storage, Worker,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	parse(&raw).map_err(|err| match err {
		Error::ParseConfig { source, .. } =>
			Error::ParseConfig { path: path.to_path_buf(), source },
		other => other,
	})
}

/// Parses, normalizes, and validates a config held in memory.
pub fn parse(raw: &str) -> Result<Config> {
	let mut cfg: Config = toml::from_str(raw)
		.map_err(|err| Error::ParseConfig { path: Default::default(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::invalid("service.http_bind", "must be non-empty."));
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::invalid("storage.postgres.pool_max_conns", "must be greater than zero."));
	}

	let embedding = &cfg.providers.embedding;

	if embedding.dimensions == 0 {
		return Err(Error::invalid("providers.embedding.dimensions", "must be greater than zero."));
	}
	if embedding.api_key.trim().is_empty() {
		return Err(Error::invalid("providers.embedding.api_key", "must be non-empty."));
	}
	if embedding.model.trim().is_empty() || embedding.provider_id.trim().is_empty() {
		return Err(Error::invalid(
			"providers.embedding",
			"provider_id and model must be non-empty.",
		));
	}
	if embedding.timeout_ms == 0 {
		return Err(Error::invalid("providers.embedding.timeout_ms", "must be greater than zero."));
	}
	if cfg.service.request_timeout_ms <= embedding.timeout_ms {
		return Err(Error::invalid(
			"service.request_timeout_ms",
			"must be greater than providers.embedding.timeout_ms.",
		));
	}

	for (key, value) in &embedding.default_headers {
		if !value.is_string() {
			return Err(Error::invalid(
				"providers.embedding.default_headers",
				format!("value for {key:?} must be a string."),
			));
		}
	}

	if cfg.search.top_k == 0 {
		return Err(Error::invalid("search.top_k", "must be greater than zero."));
	}
	if cfg.search.max_input_chars == 0 {
		return Err(Error::invalid("search.max_input_chars", "must be greater than zero."));
	}
	if cfg.search.cache.enabled {
		if cfg.search.cache.ttl_seconds == 0 {
			return Err(Error::invalid(
				"search.cache.ttl_seconds",
				"must be greater than zero when the cache is enabled.",
			));
		}
		if cfg.search.cache.max_entries == 0 {
			return Err(Error::invalid(
				"search.cache.max_entries",
				"must be greater than zero when the cache is enabled.",
			));
		}
	}

	// Off loopback, the gateway token is the only proof that the user id header was forwarded
	// by the auth gateway.
	if !cfg.security.bind_localhost_only && cfg.security.api_auth_token.is_none() {
		return Err(Error::invalid(
			"security.api_auth_token",
			"must be set when bind_localhost_only is false.",
		));
	}

	if cfg.worker.batch_size == 0 {
		return Err(Error::invalid("worker.batch_size", "must be greater than zero."));
	}
	if cfg.worker.base_backoff_ms == 0 {
		return Err(Error::invalid("worker.base_backoff_ms", "must be greater than zero."));
	}
	if cfg.worker.max_backoff_ms < cfg.worker.base_backoff_ms {
		return Err(Error::invalid(
			"worker.max_backoff_ms",
			"must be greater than or equal to worker.base_backoff_ms.",
		));
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.security.api_auth_token.as_deref().map(|token| token.trim().is_empty()).unwrap_or(false)
	{
		cfg.security.api_auth_token = None;
	}

	cfg.providers.embedding.api_base =
		cfg.providers.embedding.api_base.trim_end_matches('/').to_string();
}
