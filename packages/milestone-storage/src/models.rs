use std::{fmt, str::FromStr};

use time::OffsetDateTime;
use uuid::Uuid;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStatus {
	Scheduled,
	Sending,
	Sent,
	Failed,
}
impl NotificationStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Scheduled => "scheduled",
			Self::Sending => "sending",
			Self::Sent => "sent",
			Self::Failed => "failed",
		}
	}

	/// Statuses only move forward: `scheduled -> sending -> sent | failed`.
	pub fn can_transition_to(&self, next: Self) -> bool {
		matches!(
			(self, next),
			(Self::Scheduled, Self::Sending) | (Self::Sending, Self::Sent) | (Self::Sending, Self::Failed)
		)
	}
}
impl fmt::Display for NotificationStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for NotificationStatus {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw {
			"scheduled" => Ok(Self::Scheduled),
			"sending" => Ok(Self::Sending),
			"sent" => Ok(Self::Sent),
			"failed" => Ok(Self::Failed),
			other => Err(Error::InvalidArgument(format!("Unknown notification status {other:?}."))),
		}
	}
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Notification {
	pub id: Uuid,
	pub user_id: Uuid,
	pub entity_type: String,
	pub entity_id: i64,
	pub sport: String,
	pub fixture_id: i64,
	pub stat_key: String,
	pub percentile: f64,
	pub message: String,
	pub status: String,
	pub scheduled_for: OffsetDateTime,
	pub sent_at: Option<OffsetDateTime>,
	pub last_error: Option<String>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
impl Notification {
	pub fn status(&self) -> Result<NotificationStatus, Error> {
		self.status.parse()
	}
}

/// A notification ready to be persisted in the `scheduled` state.
#[derive(Debug, Clone)]
pub struct NewNotification {
	pub id: Uuid,
	pub user_id: Uuid,
	pub entity_type: String,
	pub entity_id: i64,
	pub sport: String,
	pub fixture_id: i64,
	pub stat_key: String,
	pub percentile: f64,
	pub message: String,
	pub scheduled_for: OffsetDateTime,
}
impl NewNotification {
	pub fn into_scheduled(self, now: OffsetDateTime) -> Notification {
		Notification {
			id: self.id,
			user_id: self.user_id,
			entity_type: self.entity_type,
			entity_id: self.entity_id,
			sport: self.sport,
			fixture_id: self.fixture_id,
			stat_key: self.stat_key,
			percentile: self.percentile,
			message: self.message,
			status: NotificationStatus::Scheduled.as_str().to_string(),
			scheduled_for: self.scheduled_for,
			sent_at: None,
			last_error: None,
			created_at: now,
			updated_at: now,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Follower {
	pub user_id: Uuid,
	pub timezone: String,
}

/// One row of the external percentile comparison for a fixture participant.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PercentileDelta {
	pub entity_type: String,
	pub entity_id: i64,
	pub sport: String,
	pub season: i32,
	pub league_id: i64,
	pub stat_key: String,
	pub old_pct: f64,
	pub new_pct: f64,
	pub sample_size: i32,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn statuses_only_move_forward() {
		use NotificationStatus::*;

		assert!(Scheduled.can_transition_to(Sending));
		assert!(Sending.can_transition_to(Sent));
		assert!(Sending.can_transition_to(Failed));
		assert!(!Scheduled.can_transition_to(Sent));
		assert!(!Sent.can_transition_to(Sending));
		assert!(!Failed.can_transition_to(Scheduled));
	}

	#[test]
	fn statuses_round_trip_through_text() {
		for status in [
			NotificationStatus::Scheduled,
			NotificationStatus::Sending,
			NotificationStatus::Sent,
			NotificationStatus::Failed,
		] {
			assert_eq!(status.as_str().parse::<NotificationStatus>().ok(), Some(status));
		}

		assert!("pending".parse::<NotificationStatus>().is_err());
	}
}
