//! Collaborators backed by the shared Postgres pool.

use sqlx::postgres::PgListener;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	BoxFuture, Directory, EventSource, EventStream, NotificationQueue, PercentileSource, Result,
};
use milestone_domain::EntityType;
use milestone_storage::{
	PartialInsert,
	db::Db,
	directory,
	models::{Follower, NewNotification, Notification, PercentileDelta},
	notifications, percentiles,
};

#[derive(Clone)]
pub struct PgStore {
	db: Db,
}
impl PgStore {
	pub fn new(db: Db) -> Self {
		Self { db }
	}
}

impl PercentileSource for PgStore {
	fn fixture_deltas<'a>(
		&'a self,
		fixture_id: i64,
	) -> BoxFuture<'a, Result<Vec<PercentileDelta>>> {
		Box::pin(async move { Ok(percentiles::fixture_deltas(&self.db, fixture_id).await?) })
	}
}

impl Directory for PgStore {
	fn followers<'a>(
		&'a self,
		entity_type: EntityType,
		entity_id: i64,
		sport: &'a str,
	) -> BoxFuture<'a, Result<Vec<Follower>>> {
		Box::pin(async move {
			Ok(directory::followers(&self.db, entity_type.as_str(), entity_id, sport).await?)
		})
	}

	fn entity_name<'a>(
		&'a self,
		entity_type: EntityType,
		entity_id: i64,
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			Ok(directory::entity_name(&self.db, entity_type.as_str(), entity_id).await?)
		})
	}

	fn stat_display_name<'a>(
		&'a self,
		sport: &'a str,
		stat_key: &'a str,
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move { Ok(directory::stat_display_name(&self.db, sport, stat_key).await?) })
	}

	fn match_time<'a>(&'a self, fixture_id: i64) -> BoxFuture<'a, Result<OffsetDateTime>> {
		Box::pin(async move { Ok(directory::match_time(&self.db, fixture_id).await?) })
	}

	fn device_tokens<'a>(&'a self, user_id: Uuid) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(async move { Ok(directory::device_tokens(&self.db, user_id).await?) })
	}
}

impl NotificationQueue for PgStore {
	fn insert_scheduled<'a>(
		&'a self,
		rows: &'a [NewNotification],
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<usize, PartialInsert>> {
		Box::pin(notifications::insert_scheduled(&self.db, rows, now))
	}

	fn claim_due<'a>(
		&'a self,
		limit: u32,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Vec<Notification>>> {
		Box::pin(async move { Ok(notifications::claim_due(&self.db, limit, now).await?) })
	}

	fn mark_sent<'a>(&'a self, id: Uuid, now: OffsetDateTime) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(notifications::mark_sent(&self.db, id, now).await?) })
	}

	fn mark_failed<'a>(
		&'a self,
		id: Uuid,
		reason: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(notifications::mark_failed(&self.db, id, reason, now).await?) })
	}
}

/// Subscribes to NOTIFY channels. Each subscription opens its own connection so the listener
/// never holds a slot of the shared pool.
#[derive(Clone)]
pub struct PgEventSource {
	dsn: String,
}
impl PgEventSource {
	pub fn new(dsn: impl Into<String>) -> Self {
		Self { dsn: dsn.into() }
	}
}

impl EventSource for PgEventSource {
	fn connect<'a>(&'a self, channel: &'a str) -> BoxFuture<'a, Result<Box<dyn EventStream>>> {
		Box::pin(async move {
			let mut listener = PgListener::connect(&self.dsn).await?;

			listener.listen(channel).await?;

			Ok(Box::new(PgEventStream { listener }) as Box<dyn EventStream>)
		})
	}
}

struct PgEventStream {
	listener: PgListener,
}

impl EventStream for PgEventStream {
	fn recv(&mut self) -> BoxFuture<'_, Result<Option<String>>> {
		Box::pin(async move {
			// `None` marks a dropped connection. `recv` would reconnect behind our back.
			let notification = self.listener.try_recv().await?;

			Ok(notification.map(|notification| notification.payload().to_string()))
		})
	}
}
