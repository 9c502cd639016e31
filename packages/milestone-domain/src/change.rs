use std::fmt;

use serde::{Deserialize, Serialize};

use milestone_config::Milestones;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
	Player,
	Team,
}
impl EntityType {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Player => "player",
			Self::Team => "team",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim() {
			"player" => Some(Self::Player),
			"team" => Some(Self::Team),
			_ => None,
		}
	}
}
impl fmt::Display for EntityType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One notable percentile movement for a fixture participant.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
	pub fixture_id: i64,
	pub entity_type: EntityType,
	pub entity_id: i64,
	pub sport: String,
	pub season: i32,
	pub league_id: i64,
	pub stat_key: String,
	pub old_pct: f64,
	pub new_pct: f64,
	pub sample_size: i32,
}
impl Change {
	pub fn is_significant(&self, cfg: &Milestones) -> bool {
		is_significant(self.old_pct, self.new_pct, cfg)
	}
}

/// A movement is notable when it crosses a milestone in either direction or moves at least
/// `min_delta` points.
pub fn is_significant(old_pct: f64, new_pct: f64, cfg: &Milestones) -> bool {
	if crossed_milestone(old_pct, new_pct, &cfg.thresholds).is_some() {
		return true;
	}

	(new_pct - old_pct).abs() >= cfg.min_delta
}

/// Returns the first milestone crossed moving from `old_pct` to `new_pct`.
///
/// Upward crossings satisfy `old < m <= new`; downward crossings satisfy `old >= m > new`.
pub fn crossed_milestone(old_pct: f64, new_pct: f64, thresholds: &[f64]) -> Option<f64> {
	thresholds.iter().copied().find(|&milestone| {
		let rising = old_pct < milestone && milestone <= new_pct;
		let falling = old_pct >= milestone && milestone > new_pct;

		rising || falling
	})
}
