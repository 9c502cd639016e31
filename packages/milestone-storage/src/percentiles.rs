use crate::{Result, db::Db, models::PercentileDelta};

/// Old and new percentile for every stat of every participant in a fixture, as computed by the
/// ranking engine's `fixture_percentile_changes` function.
pub async fn fixture_deltas(db: &Db, fixture_id: i64) -> Result<Vec<PercentileDelta>> {
	let rows: Vec<PercentileDelta> = sqlx::query_as(
		"\
SELECT
	entity_type::text AS entity_type,
	entity_id::int8 AS entity_id,
	sport::text AS sport,
	season::int4 AS season,
	league_id::int8 AS league_id,
	stat_key::text AS stat_key,
	old_pct::float8 AS old_pct,
	new_pct::float8 AS new_pct,
	sample_size::int4 AS sample_size
FROM fixture_percentile_changes($1)",
	)
	.bind(fixture_id)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}
