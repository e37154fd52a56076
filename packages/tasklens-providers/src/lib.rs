pub mod embedding;

mod error;

pub use error::{Error, Result};

use std::time::Duration;

use reqwest::{
	Client,
	header::{AUTHORIZATION, HeaderMap, HeaderName},
};
use serde_json::{Map, Value};

pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: format!("Default header {key:?} must be a string."),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

/// Builds the one HTTP client a process shares for provider calls.
pub fn build_client(cfg: &tasklens_config::EmbeddingProviderConfig) -> Result<Client> {
	let client = Client::builder()
		.timeout(Duration::from_millis(cfg.timeout_ms))
		.default_headers(auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.build()?;

	Ok(client)
}
