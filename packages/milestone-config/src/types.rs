use serde::Deserialize;
use serde_json::{Map, Value};

pub const DEFAULT_PUSH_TITLE: &str = "New percentile milestone";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	#[serde(default)]
	pub milestones: Milestones,
	#[serde(default)]
	pub schedule: Schedule,
	#[serde(default)]
	pub dispatch: Dispatch,
	#[serde(default)]
	pub realtime: Realtime,
	/// Optional. Without it every push is a successful no-op.
	pub push: Option<PushProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Milestones {
	/// Percentile values whose crossing in either direction is always notable.
	#[serde(default = "default_thresholds")]
	pub thresholds: Vec<f64>,
	/// Absolute movement, in percentile points, that is notable on its own.
	#[serde(default = "default_min_delta")]
	pub min_delta: f64,
}
impl Default for Milestones {
	fn default() -> Self {
		Self { thresholds: default_thresholds(), min_delta: default_min_delta() }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Schedule {
	#[serde(default = "default_window_hours")]
	pub window_hours: u32,
	/// First local hour (inclusive) at which delivery is allowed.
	#[serde(default = "default_waking_start_hour")]
	pub waking_start_hour: u8,
	/// Local hour (exclusive) at which quiet hours begin.
	#[serde(default = "default_waking_end_hour")]
	pub waking_end_hour: u8,
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
}
impl Default for Schedule {
	fn default() -> Self {
		Self {
			window_hours: default_window_hours(),
			waking_start_hour: default_waking_start_hour(),
			waking_end_hour: default_waking_end_hour(),
			max_attempts: default_max_attempts(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Dispatch {
	#[serde(default = "default_true")]
	pub enabled: bool,
	#[serde(default = "default_interval_secs")]
	pub interval_secs: u64,
	#[serde(default = "default_batch_size")]
	pub batch_size: u32,
}
impl Default for Dispatch {
	fn default() -> Self {
		Self {
			enabled: true,
			interval_secs: default_interval_secs(),
			batch_size: default_batch_size(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Realtime {
	#[serde(default = "default_true")]
	pub enabled: bool,
	#[serde(default = "default_channel")]
	pub channel: String,
	#[serde(default = "default_initial_backoff_ms")]
	pub initial_backoff_ms: u64,
	#[serde(default = "default_max_backoff_ms")]
	pub max_backoff_ms: u64,
	#[serde(default = "default_max_concurrent_handlers")]
	pub max_concurrent_handlers: u32,
}
impl Default for Realtime {
	fn default() -> Self {
		Self {
			enabled: true,
			channel: default_channel(),
			initial_backoff_ms: default_initial_backoff_ms(),
			max_backoff_ms: default_max_backoff_ms(),
			max_concurrent_handlers: default_max_concurrent_handlers(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushProviderConfig {
	/// Label attached to push logs. Defaults to `push-gateway`.
	#[serde(default = "default_provider_id")]
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	#[serde(default = "default_push_title")]
	pub title: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

fn default_thresholds() -> Vec<f64> {
	vec![90.0, 95.0, 99.0]
}

fn default_min_delta() -> f64 {
	10.0
}

fn default_window_hours() -> u32 {
	12
}

fn default_waking_start_hour() -> u8 {
	9
}

fn default_waking_end_hour() -> u8 {
	22
}

fn default_max_attempts() -> u32 {
	20
}

fn default_true() -> bool {
	true
}

fn default_interval_secs() -> u64 {
	30
}

fn default_batch_size() -> u32 {
	100
}

fn default_channel() -> String {
	"percentile_milestones".to_string()
}

fn default_initial_backoff_ms() -> u64 {
	5_000
}

fn default_max_backoff_ms() -> u64 {
	30_000
}

fn default_max_concurrent_handlers() -> u32 {
	32
}

fn default_provider_id() -> String {
	"push-gateway".to_string()
}

fn default_push_title() -> String {
	DEFAULT_PUSH_TITLE.to_string()
}
