pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{context}: {source}.")]
	Postgres {
		context: &'static str,
		#[source]
		source: sqlx::Error,
	},

	#[error("Invalid TASKLENS_PG_DSN: {0}.")]
	InvalidDsn(String),

	#[error("No admin database accepted a connection: {0}.")]
	NoAdminDatabase(String),
}
impl Error {
	pub(crate) fn postgres(context: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
		move |source| Self::Postgres { context, source }
	}
}
