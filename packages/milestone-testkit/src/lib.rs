mod error;

pub use error::{Error, Result};

use std::{env, future::Future, str::FromStr, thread};

use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::runtime::Builder;
use uuid::Uuid;

use milestone_config::Postgres;

const DSN_VAR: &str = "MILESTONE_PG_DSN";
const NAME_PREFIX: &str = "milestone_test_";
/// Tried in order when creating or dropping a test database.
const MAINTENANCE_DATABASES: [&str; 2] = ["postgres", "template1"];

/// A throwaway database on the server named by `MILESTONE_PG_DSN`. It is dropped by `cleanup`, or
/// when the value goes out of scope.
pub struct TestDatabase {
	name: String,
	dsn: String,
	maintenance: PgConnectOptions,
	dropped: bool,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let base = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::Message(format!("Invalid {DSN_VAR}: {err}.")))?;
		let (maintenance, mut conn) = open_maintenance(&base).await?;
		let name = format!("{NAME_PREFIX}{}", Uuid::new_v4().simple());

		conn.execute(format!(r#"CREATE DATABASE "{name}""#).as_str())
			.await
			.map_err(|err| Error::Message(format!("Failed to create {name}: {err}.")))?;
		conn.close().await?;

		let dsn = base.database(&name).to_url_lossy().to_string();

		Ok(Self { name, dsn, maintenance, dropped: false })
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Pool settings pointing at this database.
	pub fn postgres(&self, pool_max_conns: u32) -> Postgres {
		Postgres { dsn: self.dsn.clone(), pool_max_conns }
	}

	pub async fn cleanup(mut self) -> Result<()> {
		self.drop_database().await
	}

	async fn drop_database(&mut self) -> Result<()> {
		if !self.dropped {
			drop_database(&self.name, &self.maintenance).await?;

			self.dropped = true;
		}

		Ok(())
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.dropped {
			return;
		}

		let name = self.name.clone();
		let maintenance = self.maintenance.clone();
		// `drop` may run on a runtime worker, which cannot block on itself.
		let outcome = thread::spawn(move || {
			let runtime = Builder::new_current_thread()
				.enable_all()
				.build()
				.map_err(|err| Error::Message(format!("Failed to start cleanup runtime: {err}.")))?;

			runtime.block_on(drop_database(&name, &maintenance))
		})
		.join();

		match outcome {
			Ok(Ok(())) => {},
			Ok(Err(err)) => eprintln!("Test database cleanup failed: {err}."),
			Err(_) => eprintln!("Test database cleanup thread panicked."),
		}
	}
}

pub fn env_dsn() -> Option<String> {
	env::var(DSN_VAR).ok()
}

/// Runs `f` against a fresh database and drops it afterwards. An error from `f` wins over a
/// cleanup error.
pub async fn with_test_db<F, Fut, T>(base_dsn: &str, f: F) -> Result<T>
where
	F: FnOnce(&TestDatabase) -> Fut,
	Fut: Future<Output = Result<T>>,
{
	let mut db = TestDatabase::new(base_dsn).await?;
	let outcome = f(&db).await;
	let cleanup = db.drop_database().await;

	match (outcome, cleanup) {
		(Ok(value), Ok(())) => Ok(value),
		(Ok(_), Err(err)) => Err(err),
		(Err(err), cleanup) => {
			if let Err(cleanup_err) = cleanup {
				eprintln!("Test database cleanup warning: {cleanup_err}.");
			}

			Err(err)
		},
	}
}

/// Creates the tables this service reads but does not own, so queries against them can run in a
/// throwaway database.
pub async fn install_reference_tables(dsn: &str) -> Result<()> {
	let mut conn = PgConnection::connect(dsn).await?;

	for statement in [
		"CREATE TABLE IF NOT EXISTS players (id bigint PRIMARY KEY, name text NOT NULL)",
		"CREATE TABLE IF NOT EXISTS teams (id bigint PRIMARY KEY, name text NOT NULL)",
		"CREATE TABLE IF NOT EXISTS fixtures (id bigint PRIMARY KEY, start_time timestamptz NOT NULL)",
		"\
CREATE TABLE IF NOT EXISTS stat_definitions (
	sport text NOT NULL,
	stat_key text NOT NULL,
	display_name text NOT NULL,
	PRIMARY KEY (sport, stat_key)
)",
		"\
CREATE TABLE IF NOT EXISTS percentile_changes (
	fixture_id bigint NOT NULL,
	entity_type text NOT NULL,
	entity_id bigint NOT NULL,
	sport text NOT NULL,
	season int NOT NULL,
	league_id bigint NOT NULL,
	stat_key text NOT NULL,
	old_pct double precision NOT NULL,
	new_pct double precision NOT NULL,
	sample_size int NOT NULL
)",
		"\
CREATE OR REPLACE FUNCTION fixture_percentile_changes(p_fixture_id bigint)
RETURNS TABLE (
	entity_type text,
	entity_id bigint,
	sport text,
	season int,
	league_id bigint,
	stat_key text,
	old_pct double precision,
	new_pct double precision,
	sample_size int
)
LANGUAGE sql STABLE AS $$
	SELECT entity_type, entity_id, sport, season, league_id, stat_key, old_pct, new_pct, sample_size
	FROM percentile_changes
	WHERE fixture_id = p_fixture_id
$$",
	] {
		conn.execute(statement).await?;
	}

	Ok(())
}

async fn open_maintenance(base: &PgConnectOptions) -> Result<(PgConnectOptions, PgConnection)> {
	let mut failures = Vec::new();

	for database in MAINTENANCE_DATABASES {
		let options = base.clone().database(database);

		match PgConnection::connect_with(&options).await {
			Ok(conn) => return Ok((options, conn)),
			Err(err) => failures.push(format!("{database}: {err}")),
		}
	}

	Err(Error::Message(format!("No maintenance database reachable ({}).", failures.join("; "))))
}

async fn drop_database(name: &str, maintenance: &PgConnectOptions) -> Result<()> {
	let mut conn = PgConnection::connect_with(maintenance).await?;

	// FORCE also ends sessions a test left open, such as an unclosed pool.
	conn.execute(format!(r#"DROP DATABASE IF EXISTS "{name}" WITH (FORCE)"#).as_str())
		.await
		.map_err(|err| Error::Message(format!("Failed to drop {name}: {err}.")))?;
	conn.close().await?;

	Ok(())
}
