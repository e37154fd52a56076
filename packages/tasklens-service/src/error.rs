pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures as callers of the service see them. Lower-level errors are folded into these before
/// they leave the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Caller identity is missing or unverified.")]
	Unauthenticated,
	#[error("Query is empty.")]
	EmptyQuery,
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Upstream unavailable: {message}")]
	Upstream { message: String },
	#[error("Internal error: {message}")]
	Internal { message: String },
}
impl Error {
	pub(crate) fn internal(err: impl std::fmt::Display) -> Self {
		Self::Internal { message: err.to_string() }
	}
}

impl From<tasklens_storage::Error> for Error {
	fn from(err: tasklens_storage::Error) -> Self {
		match err {
			tasklens_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			tasklens_storage::Error::Conflict(message) => Self::NotFound { message },
			other @ (tasklens_storage::Error::Sqlx(_) | tasklens_storage::Error::InvalidRow(_)) =>
				Self::internal(other),
		}
	}
}
