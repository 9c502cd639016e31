pub mod detect;
pub mod dispatch;
pub mod pipeline;
pub mod postgres;
pub mod push;
pub mod realtime;

mod error;

pub use dispatch::{DispatchReport, run_dispatcher};
pub use error::{Error, Result};
pub use pipeline::RunReport;
pub use postgres::{PgEventSource, PgStore};
pub use push::{HttpPush, NoopPush};
pub use realtime::{HandlerReport, ListenerState, run_listener};

use std::{collections::BTreeMap, future::Future, pin::Pin, sync::Arc};

use rand::{SeedableRng, rngs::StdRng};
use time::OffsetDateTime;
use uuid::Uuid;

use milestone_config::{Config, DEFAULT_PUSH_TITLE};
use milestone_domain::{EntityType, message};
use milestone_storage::{
	PartialInsert,
	db::Db,
	models::{Follower, NewNotification, Notification, PercentileDelta},
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Old and new percentiles computed by the ranking engine after a fixture is ingested.
pub trait PercentileSource
where
	Self: Send + Sync,
{
	fn fixture_deltas<'a>(
		&'a self,
		fixture_id: i64,
	) -> BoxFuture<'a, Result<Vec<PercentileDelta>>>;
}

/// Read-only reference data: who follows what, display names, match times, devices.
pub trait Directory
where
	Self: Send + Sync,
{
	fn followers<'a>(
		&'a self,
		entity_type: EntityType,
		entity_id: i64,
		sport: &'a str,
	) -> BoxFuture<'a, Result<Vec<Follower>>>;

	fn entity_name<'a>(
		&'a self,
		entity_type: EntityType,
		entity_id: i64,
	) -> BoxFuture<'a, Result<String>>;

	fn stat_display_name<'a>(
		&'a self,
		sport: &'a str,
		stat_key: &'a str,
	) -> BoxFuture<'a, Result<String>>;

	fn match_time<'a>(&'a self, fixture_id: i64) -> BoxFuture<'a, Result<OffsetDateTime>>;

	fn device_tokens<'a>(&'a self, user_id: Uuid) -> BoxFuture<'a, Result<Vec<String>>>;
}

pub trait NotificationQueue
where
	Self: Send + Sync,
{
	fn insert_scheduled<'a>(
		&'a self,
		rows: &'a [NewNotification],
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<usize, PartialInsert>>;

	fn claim_due<'a>(
		&'a self,
		limit: u32,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Vec<Notification>>>;

	fn mark_sent<'a>(&'a self, id: Uuid, now: OffsetDateTime) -> BoxFuture<'a, Result<()>>;

	fn mark_failed<'a>(
		&'a self,
		id: Uuid,
		reason: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>>;
}

pub trait PushSender
where
	Self: Send + Sync,
{
	fn send_multi<'a>(
		&'a self,
		tokens: &'a [String],
		title: &'a str,
		body: &'a str,
		data: &'a BTreeMap<String, String>,
	) -> BoxFuture<'a, Result<()>>;
}

/// Opens a dedicated subscription to a notification channel.
pub trait EventSource
where
	Self: Send + Sync,
{
	fn connect<'a>(&'a self, channel: &'a str) -> BoxFuture<'a, Result<Box<dyn EventStream>>>;
}

pub trait EventStream
where
	Self: Send,
{
	/// Waits for the next payload. `Ok(None)` means the connection was lost.
	fn recv(&mut self) -> BoxFuture<'_, Result<Option<String>>>;
}

#[derive(Clone)]
pub struct Collaborators {
	pub percentiles: Arc<dyn PercentileSource>,
	pub directory: Arc<dyn Directory>,
	pub queue: Arc<dyn NotificationQueue>,
	pub push: Arc<dyn PushSender>,
	pub events: Arc<dyn EventSource>,
}
impl Collaborators {
	/// Postgres-backed collaborators sharing one pool. The listener connects outside the pool.
	pub fn postgres(db: Db, push: Arc<dyn PushSender>) -> Self {
		let events = Arc::new(PgEventSource::new(db.dsn()));
		let store = Arc::new(PgStore::new(db));

		Self {
			percentiles: store.clone(),
			directory: store.clone(),
			queue: store,
			push,
			events,
		}
	}
}

pub struct MilestoneService {
	pub cfg: Config,
	pub collaborators: Collaborators,
	seed: Option<u64>,
}
impl MilestoneService {
	pub fn new(cfg: Config, collaborators: Collaborators) -> Self {
		Self { cfg, collaborators, seed: None }
	}

	/// Makes delivery scheduling reproducible.
	pub fn with_seed(mut self, seed: u64) -> Self {
		self.seed = Some(seed);

		self
	}

	pub(crate) fn rng(&self) -> StdRng {
		match self.seed {
			Some(seed) => StdRng::seed_from_u64(seed),
			None => StdRng::from_entropy(),
		}
	}

	pub(crate) fn push_title(&self) -> &str {
		self.cfg.push.as_ref().map(|push| push.title.as_str()).unwrap_or(DEFAULT_PUSH_TITLE)
	}

	/// Renders the message both delivery paths send. Name lookups are best effort and fall back to
	/// the raw identifiers.
	pub(crate) async fn compose_message(
		&self,
		entity_type: EntityType,
		entity_id: i64,
		sport: &str,
		stat_key: &str,
		percentile: f64,
	) -> String {
		let directory = &self.collaborators.directory;
		let entity_name = match directory.entity_name(entity_type, entity_id).await {
			Ok(name) => name,
			Err(err) => {
				tracing::debug!(
					error = %err,
					entity_type = %entity_type,
					entity_id,
					"Entity name lookup failed. Using the raw id."
				);

				entity_id.to_string()
			},
		};
		let stat_name = match directory.stat_display_name(sport, stat_key).await {
			Ok(name) => name,
			Err(err) => {
				tracing::debug!(
					error = %err,
					sport,
					stat_key,
					"Stat name lookup failed. Using the raw key."
				);

				stat_key.to_string()
			},
		};

		message::build_message(&entity_name, &stat_name, percentile)
	}
}

pub(crate) fn push_data(
	entity_type: &str,
	entity_id: i64,
	sport: &str,
	stat_key: &str,
	percentile: f64,
) -> BTreeMap<String, String> {
	BTreeMap::from([
		("entity_type".to_string(), entity_type.to_string()),
		("entity_id".to_string(), entity_id.to_string()),
		("sport".to_string(), sport.to_string()),
		("stat_key".to_string(), stat_key.to_string()),
		("percentile".to_string(), percentile.to_string()),
	])
}
