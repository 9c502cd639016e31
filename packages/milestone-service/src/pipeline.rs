use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, MilestoneService, Result};
use milestone_domain::schedule;
use milestone_storage::models::NewNotification;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
	/// Significant changes detected for the fixture.
	pub changes: usize,
	/// Notifications persisted in `scheduled` state.
	pub notifications: usize,
}

impl MilestoneService {
	/// Turns one ingested fixture into scheduled notifications.
	///
	/// Detection, match time, and persistence failures abort the run. A follower lookup failure
	/// only skips that change. Inserts are not transactional: on failure the error carries how
	/// many rows were already written.
	pub async fn run_fixture(&self, fixture_id: i64) -> Result<RunReport> {
		let changes = self.detect_changes(fixture_id).await?;

		if changes.is_empty() {
			tracing::info!(fixture_id, "No milestone changes for fixture.");

			return Ok(RunReport::default());
		}

		let match_time = self
			.collaborators
			.directory
			.match_time(fixture_id)
			.await
			.map_err(|err| Error::MatchTime { message: err.to_string() })?;
		let mut rng = self.rng();
		let mut rows = Vec::new();

		for change in &changes {
			let followers = match self
				.collaborators
				.directory
				.followers(change.entity_type, change.entity_id, &change.sport)
				.await
			{
				Ok(followers) => followers,
				Err(err) => {
					tracing::warn!(
						error = %err,
						fixture_id,
						entity_type = %change.entity_type,
						entity_id = change.entity_id,
						"Follower lookup failed. Skipping change."
					);

					continue;
				},
			};

			if followers.is_empty() {
				continue;
			}

			let message = self
				.compose_message(
					change.entity_type,
					change.entity_id,
					&change.sport,
					&change.stat_key,
					change.new_pct,
				)
				.await;

			for follower in followers {
				let scheduled_for = schedule::schedule_delivery(
					match_time,
					&follower.timezone,
					&self.cfg.schedule,
					&mut rng,
				);

				rows.push(NewNotification {
					id: Uuid::new_v4(),
					user_id: follower.user_id,
					entity_type: change.entity_type.as_str().to_string(),
					entity_id: change.entity_id,
					sport: change.sport.clone(),
					fixture_id,
					stat_key: change.stat_key.clone(),
					percentile: change.new_pct,
					message: message.clone(),
					scheduled_for,
				});
			}
		}

		let inserted =
			self.collaborators.queue.insert_scheduled(&rows, OffsetDateTime::now_utc()).await?;

		tracing::info!(
			fixture_id,
			changes = changes.len(),
			notifications = inserted,
			"Scheduled milestone notifications."
		);

		Ok(RunReport { changes: changes.len(), notifications: inserted })
	}
}
