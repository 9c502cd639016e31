use std::time::Duration;

use time::OffsetDateTime;

use milestone_service::{EventSource, NotificationQueue, PgEventSource, PgStore};
use milestone_storage::db::Db;
use milestone_testkit::TestDatabase;

#[tokio::test]
#[ignore = "Requires external Postgres. Set MILESTONE_PG_DSN to run."]
async fn listener_leaves_the_pool_free() {
	let Some(base_dsn) = milestone_testkit::env_dsn() else {
		eprintln!("Skipping listener_leaves_the_pool_free; set MILESTONE_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = Db::connect(&test_db.postgres(1)).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	let events = PgEventSource::new(db.dsn());
	let mut stream =
		events.connect("percentile_milestones").await.expect("Failed to subscribe to channel.");
	let store = PgStore::new(db.clone());
	let claimed = tokio::time::timeout(
		Duration::from_secs(5),
		store.claim_due(10, OffsetDateTime::now_utc()),
	)
	.await
	.expect("Claiming blocked while the listener was subscribed.")
	.expect("Claim failed.");

	assert!(claimed.is_empty());

	sqlx::query("SELECT pg_notify($1, $2)")
		.bind("percentile_milestones")
		.bind("ping")
		.execute(&db.pool)
		.await
		.expect("Failed to publish notification.");

	let payload = tokio::time::timeout(Duration::from_secs(5), stream.recv())
		.await
		.expect("No notification arrived.")
		.expect("Receive failed.");

	assert_eq!(payload.as_deref(), Some("ping"));

	drop(stream);
	db.pool.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
