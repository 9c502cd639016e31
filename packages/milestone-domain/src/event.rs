use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::change::EntityType;

/// Payload published on the milestone channel whenever a single stat crosses a milestone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneEvent {
	pub entity_type: EntityType,
	pub entity_id: i64,
	pub sport: String,
	pub season: i32,
	pub stat_key: String,
	pub percentile: f64,
	#[serde(with = "crate::time_serde")]
	pub ts: OffsetDateTime,
}
impl MilestoneEvent {
	pub fn parse(payload: &str) -> serde_json::Result<Self> {
		serde_json::from_str(payload)
	}
}
