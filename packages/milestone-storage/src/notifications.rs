use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Error, PartialInsert, Result,
	db::Db,
	models::{NewNotification, Notification, NotificationStatus},
};

pub const MAX_ERROR_CHARS: usize = 1_024;

const REDACTED: &str = "[REDACTED]";
const SECRET_NAMES: [&str; 5] = ["key", "token", "secret", "password", "signature"];

/// Inserts rows one at a time in `scheduled` state. The first failure stops the batch; rows
/// already written stay written.
pub async fn insert_scheduled(
	db: &Db,
	rows: &[NewNotification],
	now: OffsetDateTime,
) -> Result<usize, PartialInsert> {
	let mut inserted = 0;

	for row in rows {
		let result = sqlx::query(
			"\
INSERT INTO notifications (
	id,
	user_id,
	entity_type,
	entity_id,
	sport,
	fixture_id,
	stat_key,
	percentile,
	message,
	status,
	scheduled_for,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)",
		)
		.bind(row.id)
		.bind(row.user_id)
		.bind(row.entity_type.as_str())
		.bind(row.entity_id)
		.bind(row.sport.as_str())
		.bind(row.fixture_id)
		.bind(row.stat_key.as_str())
		.bind(row.percentile)
		.bind(row.message.as_str())
		.bind(NotificationStatus::Scheduled.as_str())
		.bind(row.scheduled_for)
		.bind(now)
		.execute(&db.pool)
		.await;

		if let Err(err) = result {
			return Err(PartialInsert { inserted, source: err.into() });
		}

		inserted += 1;
	}

	Ok(inserted)
}

/// Claims up to `limit` due rows and moves them to `sending` in one statement.
///
/// `FOR UPDATE SKIP LOCKED` lets concurrent claimers partition the due set without waiting on
/// each other.
pub async fn claim_due(db: &Db, limit: u32, now: OffsetDateTime) -> Result<Vec<Notification>> {
	let mut claimed: Vec<Notification> = sqlx::query_as(
		"\
UPDATE notifications AS n
SET status = 'sending', updated_at = $2
FROM (
	SELECT id
	FROM notifications
	WHERE status = 'scheduled' AND scheduled_for <= $2
	ORDER BY scheduled_for ASC
	LIMIT $1
	FOR UPDATE SKIP LOCKED
) AS due
WHERE n.id = due.id
RETURNING n.*",
	)
	.bind(i64::from(limit))
	.bind(now)
	.fetch_all(&db.pool)
	.await?;

	claimed.sort_by(|a, b| a.scheduled_for.cmp(&b.scheduled_for).then(a.id.cmp(&b.id)));

	Ok(claimed)
}

pub async fn mark_sent(db: &Db, id: Uuid, now: OffsetDateTime) -> Result<()> {
	let result = sqlx::query(
		"\
UPDATE notifications
SET status = 'sent', sent_at = $1, updated_at = $1
WHERE id = $2 AND status = 'sending'",
	)
	.bind(now)
	.bind(id)
	.execute(&db.pool)
	.await?;

	if result.rows_affected() == 0 {
		return Err(Error::Conflict(format!("Notification {id} is not in sending state.")));
	}

	Ok(())
}

pub async fn mark_failed(db: &Db, id: Uuid, reason: &str, now: OffsetDateTime) -> Result<()> {
	let reason = sanitize_error(reason);
	let result = sqlx::query(
		"\
UPDATE notifications
SET status = 'failed', last_error = $1, updated_at = $2
WHERE id = $3 AND status = 'sending'",
	)
	.bind(reason)
	.bind(now)
	.bind(id)
	.execute(&db.pool)
	.await?;

	if result.rows_affected() == 0 {
		return Err(Error::Conflict(format!("Notification {id} is not in sending state.")));
	}

	Ok(())
}

pub async fn fetch_notification(db: &Db, id: Uuid) -> Result<Option<Notification>> {
	let row: Option<Notification> =
		sqlx::query_as("SELECT * FROM notifications WHERE id = $1")
			.bind(id)
			.fetch_optional(&db.pool)
			.await?;

	Ok(row)
}

pub async fn list_for_fixture(db: &Db, fixture_id: i64) -> Result<Vec<Notification>> {
	let rows: Vec<Notification> = sqlx::query_as(
		"\
SELECT *
FROM notifications
WHERE fixture_id = $1
ORDER BY scheduled_for ASC, id ASC",
	)
	.bind(fixture_id)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

/// Redacts credentials and caps the length of an error stored in `last_error`.
///
/// Failure reasons come from the push gateway client. They can carry an `Authorization` header
/// echo or the request URL, so bearer values and credential-like pairs (`api_key=...`,
/// `token:...`, `?key=...`) are masked.
pub fn sanitize_error(text: &str) -> String {
	let mut words = text.split_whitespace();
	let mut kept = Vec::new();

	while let Some(word) = words.next() {
		kept.push(redact_pairs(word));

		if word.eq_ignore_ascii_case("bearer") && words.next().is_some() {
			kept.push(REDACTED.to_string());
		}
	}

	truncate_error(kept.join(" "))
}

fn redact_pairs(word: &str) -> String {
	word.split_inclusive(['?', '&'])
		.map(|segment| {
			let Some(at) = segment.find(['=', ':']) else {
				return segment.to_string();
			};
			let name = segment[..at].to_ascii_lowercase();

			if !SECRET_NAMES.iter().any(|secret| name.ends_with(secret)) {
				return segment.to_string();
			}

			let tail =
				if segment.ends_with(['?', '&']) { &segment[segment.len() - 1..] } else { "" };

			format!("{}{REDACTED}{tail}", &segment[..=at])
		})
		.collect()
}

fn truncate_error(mut text: String) -> String {
	const ELLIPSIS: &str = "...";

	if let Some((cut, _)) = text.char_indices().nth(MAX_ERROR_CHARS) {
		let keep =
			text[..cut].char_indices().nth_back(ELLIPSIS.len() - 1).map_or(0, |(at, _)| at);

		text.truncate(keep);
		text.push_str(ELLIPSIS);
	}

	text
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn redacts_bearer_and_key_values() {
		let sanitized = sanitize_error("401 from gateway: Bearer abc123 api_key=xyz token:foo");

		assert_eq!(
			sanitized,
			"401 from gateway: Bearer [REDACTED] api_key=[REDACTED] token:[REDACTED]"
		);
	}

	#[test]
	fn plain_reasons_pass_through() {
		assert_eq!(sanitize_error("no device tokens"), "no device tokens");
	}

	#[test]
	fn long_errors_are_truncated() {
		let sanitized = sanitize_error(&"é".repeat(MAX_ERROR_CHARS * 2));

		assert_eq!(sanitized.chars().count(), MAX_ERROR_CHARS);
		assert!(sanitized.ends_with("..."));
		assert_eq!(sanitize_error(&"x".repeat(MAX_ERROR_CHARS)).chars().count(), MAX_ERROR_CHARS);
	}

	#[test]
	fn redacts_keys_in_gateway_urls() {
		let sanitized = sanitize_error(
			"error sending request for url (https://push.example/v1/send?key=abc&region=eu)",
		);

		assert_eq!(
			sanitized,
			"error sending request for url (https://push.example/v1/send?key=[REDACTED]&region=eu)"
		);
	}
}
