#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Conflict: {0}")]
	Conflict(String),
}

/// A bulk insert that stopped at its first failed row.
#[derive(Debug, thiserror::Error)]
#[error("Inserted {inserted} rows before failing: {source}")]
pub struct PartialInsert {
	pub inserted: usize,
	#[source]
	pub source: Error,
}
