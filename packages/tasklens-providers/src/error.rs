pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
	/// The provider refused the input itself (HTTP 400, 413, or 422).
	#[error("Provider rejected the input with status {status}: {message}")]
	Rejected { status: u16, message: String },
}
impl Error {
	/// Whether retrying the same request later may succeed.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Reqwest(_) | Self::SerdeJson(_) | Self::InvalidResponse { .. } => true,
			Self::InvalidHeaderName(_)
			| Self::InvalidHeaderValue(_)
			| Self::InvalidConfig { .. }
			| Self::Rejected { .. } => false,
		}
	}
}
