pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Change detection failed: {message}")]
	Detect { message: String },
	#[error("Match time lookup failed: {message}")]
	MatchTime { message: String },
	#[error("Persisted {inserted} notifications before failing: {message}")]
	Persist { inserted: usize, message: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<milestone_storage::Error> for Error {
	fn from(err: milestone_storage::Error) -> Self {
		match err {
			milestone_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			milestone_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			milestone_storage::Error::NotFound(message) => Self::NotFound { message },
			milestone_storage::Error::Conflict(message) => Self::Conflict { message },
		}
	}
}

impl From<milestone_storage::PartialInsert> for Error {
	fn from(err: milestone_storage::PartialInsert) -> Self {
		Self::Persist { inserted: err.inserted, message: err.source.to_string() }
	}
}

impl From<milestone_providers::Error> for Error {
	fn from(err: milestone_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
