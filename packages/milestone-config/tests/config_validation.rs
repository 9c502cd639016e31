use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use milestone_config::{Config, Error};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_toml_with(section: &str, key: &str, value: Value) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let table = root
		.as_table_mut()
		.expect("Template config must be a table.")
		.get_mut(section)
		.and_then(Value::as_table_mut)
		.expect("Template config must include the requested section.");

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render template config.")
}

fn sample_toml_without(section: &str, key: &str) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");

	root.as_table_mut()
		.expect("Template config must be a table.")
		.get_mut(section)
		.and_then(Value::as_table_mut)
		.expect("Template config must include the requested section.")
		.remove(key);

	toml::to_string(&root).expect("Failed to render template config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("milestone_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_payload(payload: String) -> milestone_config::Result<Config> {
	let path = write_temp_config(payload);
	let result = milestone_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

fn expect_validation(payload: String, expected: &str) {
	let err = load_payload(payload).expect_err("Expected validation error.");
	let message = err.to_string();

	assert!(matches!(err, Error::Validation { .. }), "Unexpected error kind: {err:?}");
	assert!(message.contains(expected), "Unexpected error message: {message}");
}

#[test]
fn sample_config_loads() {
	let cfg = load_payload(SAMPLE_CONFIG_TEMPLATE_TOML.to_string())
		.expect("Sample config should be valid.");

	assert_eq!(cfg.milestones.thresholds, vec![90.0, 95.0, 99.0]);
	assert_eq!(cfg.schedule.window_hours, 12);
	assert_eq!(cfg.dispatch.batch_size, 100);
	assert_eq!(cfg.realtime.channel, "percentile_milestones");

	let push = cfg.push.expect("Push provider should be configured.");

	assert_eq!(push.path, "/v1/send");
	assert_eq!(push.default_headers.get("X-Client").and_then(|v| v.as_str()), Some("milestone"));
}

#[test]
fn omitted_sections_use_defaults() {
	let payload = r#"
[service]
log_level = "debug"

[storage.postgres]
dsn            = "postgres://localhost/milestone"
pool_max_conns = 2
"#;
	let cfg = load_payload(payload.to_string()).expect("Minimal config should be valid.");

	assert_eq!(cfg.milestones.min_delta, 10.0);
	assert_eq!(cfg.schedule.waking_start_hour, 9);
	assert_eq!(cfg.schedule.waking_end_hour, 22);
	assert_eq!(cfg.schedule.max_attempts, 20);
	assert_eq!(cfg.dispatch.interval_secs, 30);
	assert_eq!(cfg.realtime.initial_backoff_ms, 5_000);
	assert_eq!(cfg.realtime.max_backoff_ms, 30_000);
	assert!(cfg.dispatch.enabled);
	assert!(cfg.realtime.enabled);
	assert!(cfg.push.is_none());
}

#[test]
fn blank_push_api_base_disables_push() {
	let payload = sample_toml_with("push", "api_base", Value::String("  ".to_string()));
	let cfg = load_payload(payload).expect("Blank push base should normalize away.");

	assert!(cfg.push.is_none());
}

#[test]
fn push_provider_id_is_optional() {
	let cfg = load_payload(sample_toml_without("push", "provider_id"))
		.expect("Push config without provider_id should be valid.");
	let push = cfg.push.expect("Push provider should be configured.");

	assert_eq!(push.provider_id, "push-gateway");
	assert_eq!(push.api_base, "https://push.example.com");
}

#[test]
fn waking_window_must_be_ordered() {
	let payload = sample_toml_with("schedule", "waking_start_hour", Value::Integer(22));

	expect_validation(
		payload,
		"schedule.waking_start_hour must be less than schedule.waking_end_hour.",
	);
}

#[test]
fn thresholds_must_be_percentiles() {
	let payload = sample_toml_with(
		"milestones",
		"thresholds",
		Value::Array(vec![Value::Float(90.0), Value::Float(140.0)]),
	);

	expect_validation(payload, "milestones.thresholds must be finite numbers in the range 0-100.");
}

#[test]
fn max_backoff_cannot_undercut_initial_backoff() {
	let payload = sample_toml_with("realtime", "max_backoff_ms", Value::Integer(1_000));

	expect_validation(
		payload,
		"realtime.max_backoff_ms must be at least realtime.initial_backoff_ms.",
	);
}

#[test]
fn dispatch_batch_size_must_be_positive() {
	let payload = sample_toml_with("dispatch", "batch_size", Value::Integer(0));

	expect_validation(payload, "dispatch.batch_size must be greater than zero.");
}

#[test]
fn push_api_key_must_be_non_empty() {
	let payload = sample_toml_with("push", "api_key", Value::String(String::new()));

	expect_validation(payload, "push.api_key must be non-empty.");
}

#[test]
fn missing_file_reports_read_error() {
	let path = env::temp_dir().join("milestone_config_test_missing.toml");
	let err = milestone_config::load(&path).expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }));
}
