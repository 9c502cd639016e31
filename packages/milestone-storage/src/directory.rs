//! Read-only lookups against reference data owned by other services.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, Result, db::Db, models::Follower};

pub async fn followers(
	db: &Db,
	entity_type: &str,
	entity_id: i64,
	sport: &str,
) -> Result<Vec<Follower>> {
	let rows: Vec<Follower> = sqlx::query_as(
		"\
SELECT
	f.user_id,
	COALESCE(NULLIF(btrim(u.timezone), ''), 'UTC') AS timezone
FROM user_follows f
JOIN users u ON u.id = f.user_id
WHERE f.entity_type = $1 AND f.entity_id = $2 AND f.sport = $3
ORDER BY f.user_id",
	)
	.bind(entity_type)
	.bind(entity_id)
	.bind(sport)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn entity_name(db: &Db, entity_type: &str, entity_id: i64) -> Result<String> {
	let sql = match entity_type {
		"player" => "SELECT name FROM players WHERE id = $1",
		"team" => "SELECT name FROM teams WHERE id = $1",
		other => return Err(Error::InvalidArgument(format!("Unknown entity type {other:?}."))),
	};
	let name: Option<String> =
		sqlx::query_scalar(sql).bind(entity_id).fetch_optional(&db.pool).await?;

	name.ok_or_else(|| Error::NotFound(format!("{entity_type} {entity_id}")))
}

pub async fn stat_display_name(db: &Db, sport: &str, stat_key: &str) -> Result<String> {
	let name: Option<String> = sqlx::query_scalar(
		"SELECT display_name FROM stat_definitions WHERE sport = $1 AND stat_key = $2",
	)
	.bind(sport)
	.bind(stat_key)
	.fetch_optional(&db.pool)
	.await?;

	name.ok_or_else(|| Error::NotFound(format!("stat {sport}/{stat_key}")))
}

pub async fn match_time(db: &Db, fixture_id: i64) -> Result<OffsetDateTime> {
	let start: Option<OffsetDateTime> =
		sqlx::query_scalar("SELECT start_time FROM fixtures WHERE id = $1")
			.bind(fixture_id)
			.fetch_optional(&db.pool)
			.await?;

	start.ok_or_else(|| Error::NotFound(format!("fixture {fixture_id}")))
}

pub async fn device_tokens(db: &Db, user_id: Uuid) -> Result<Vec<String>> {
	let tokens: Vec<String> = sqlx::query_scalar(
		"\
SELECT token
FROM user_devices
WHERE user_id = $1 AND is_active
ORDER BY created_at ASC, token ASC",
	)
	.bind(user_id)
	.fetch_all(&db.pool)
	.await?;

	Ok(tokens)
}
