mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, DEFAULT_PUSH_TITLE, Dispatch, Milestones, Postgres, PushProviderConfig, Realtime,
	Schedule, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.milestones.thresholds.is_empty() {
		return Err(Error::Validation {
			message: "milestones.thresholds must be non-empty.".to_string(),
		});
	}

	for threshold in &cfg.milestones.thresholds {
		if !threshold.is_finite() || !(0.0..=100.0).contains(threshold) {
			return Err(Error::Validation {
				message: "milestones.thresholds must be finite numbers in the range 0-100."
					.to_string(),
			});
		}
	}

	if !cfg.milestones.min_delta.is_finite() || cfg.milestones.min_delta <= 0.0 {
		return Err(Error::Validation {
			message: "milestones.min_delta must be a finite number greater than zero.".to_string(),
		});
	}
	if cfg.schedule.window_hours == 0 {
		return Err(Error::Validation {
			message: "schedule.window_hours must be greater than zero.".to_string(),
		});
	}
	if cfg.schedule.waking_end_hour > 24 {
		return Err(Error::Validation {
			message: "schedule.waking_end_hour must be 24 or less.".to_string(),
		});
	}
	if cfg.schedule.waking_start_hour >= cfg.schedule.waking_end_hour {
		return Err(Error::Validation {
			message: "schedule.waking_start_hour must be less than schedule.waking_end_hour."
				.to_string(),
		});
	}
	if cfg.schedule.max_attempts == 0 {
		return Err(Error::Validation {
			message: "schedule.max_attempts must be greater than zero.".to_string(),
		});
	}
	if cfg.dispatch.interval_secs == 0 {
		return Err(Error::Validation {
			message: "dispatch.interval_secs must be greater than zero.".to_string(),
		});
	}
	if cfg.dispatch.batch_size == 0 {
		return Err(Error::Validation {
			message: "dispatch.batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.realtime.enabled && cfg.realtime.channel.trim().is_empty() {
		return Err(Error::Validation {
			message: "realtime.channel must be non-empty when realtime is enabled.".to_string(),
		});
	}
	if cfg.realtime.initial_backoff_ms == 0 {
		return Err(Error::Validation {
			message: "realtime.initial_backoff_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.realtime.max_backoff_ms < cfg.realtime.initial_backoff_ms {
		return Err(Error::Validation {
			message: "realtime.max_backoff_ms must be at least realtime.initial_backoff_ms."
				.to_string(),
		});
	}
	if cfg.realtime.max_concurrent_handlers == 0 {
		return Err(Error::Validation {
			message: "realtime.max_concurrent_handlers must be greater than zero.".to_string(),
		});
	}

	if let Some(push) = cfg.push.as_ref() {
		if push.api_key.trim().is_empty() {
			return Err(Error::Validation {
				message: "push.api_key must be non-empty.".to_string(),
			});
		}
		if push.timeout_ms == 0 {
			return Err(Error::Validation {
				message: "push.timeout_ms must be greater than zero.".to_string(),
			});
		}
		if push.default_headers.values().any(|value| !value.is_string()) {
			return Err(Error::Validation {
				message: "push.default_headers values must be strings.".to_string(),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.realtime.channel = cfg.realtime.channel.trim().to_string();

	if cfg.push.as_ref().map(|push| push.api_base.trim().is_empty()).unwrap_or(false) {
		cfg.push = None;
	}
}
