use milestone_config::Milestones;
use milestone_domain::{Change, EntityType};
use milestone_storage::models::PercentileDelta;

use crate::{Error, MilestoneService, Result};

impl MilestoneService {
	/// Percentile movements worth telling followers about. An empty result is not an error.
	pub async fn detect_changes(&self, fixture_id: i64) -> Result<Vec<Change>> {
		let deltas = self
			.collaborators
			.percentiles
			.fixture_deltas(fixture_id)
			.await
			.map_err(|err| Error::Detect { message: err.to_string() })?;

		Ok(significant_changes(fixture_id, deltas, &self.cfg.milestones))
	}
}

pub fn significant_changes(
	fixture_id: i64,
	deltas: Vec<PercentileDelta>,
	cfg: &Milestones,
) -> Vec<Change> {
	let mut changes = Vec::new();

	for delta in deltas {
		let Some(entity_type) = EntityType::parse(&delta.entity_type) else {
			tracing::warn!(
				fixture_id,
				entity_type = delta.entity_type.as_str(),
				entity_id = delta.entity_id,
				"Skipping percentile change with unknown entity type."
			);

			continue;
		};
		let change = Change {
			fixture_id,
			entity_type,
			entity_id: delta.entity_id,
			sport: delta.sport,
			season: delta.season,
			league_id: delta.league_id,
			stat_key: delta.stat_key,
			old_pct: delta.old_pct,
			new_pct: delta.new_pct,
			sample_size: delta.sample_size,
		};

		if change.is_significant(cfg) {
			changes.push(change);
		}
	}

	changes
}

#[cfg(test)]
mod tests {
	use super::*;

	fn delta(entity_type: &str, old_pct: f64, new_pct: f64) -> PercentileDelta {
		PercentileDelta {
			entity_type: entity_type.to_string(),
			entity_id: 7,
			sport: "football".to_string(),
			season: 2024,
			league_id: 39,
			stat_key: "goals".to_string(),
			old_pct,
			new_pct,
			sample_size: 20,
		}
	}

	#[test]
	fn keeps_only_significant_known_entities() {
		let deltas = vec![
			delta("team", 88.0, 91.0),
			delta("team", 50.0, 59.0),
			delta("player", 50.0, 60.0),
			delta("coach", 10.0, 99.0),
		];
		let changes = significant_changes(3, deltas, &Milestones::default());

		assert_eq!(changes.len(), 2);
		assert_eq!(changes[0].entity_type, EntityType::Team);
		assert_eq!(changes[0].fixture_id, 3);
		assert_eq!(changes[1].entity_type, EntityType::Player);
	}

	#[test]
	fn empty_input_is_empty_output() {
		assert!(significant_changes(3, Vec::new(), &Milestones::default()).is_empty());
	}
}
