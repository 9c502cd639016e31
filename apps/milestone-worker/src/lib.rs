use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use tokio::{sync::watch, task::JoinHandle};
use tracing_subscriber::EnvFilter;

use milestone_service::{Collaborators, MilestoneService, push};
use milestone_storage::db::Db;

#[derive(Debug, Parser)]
#[command(version, rename_all = "kebab", about = "Delivers percentile milestone notifications.")]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = milestone_config::load(&args.config)?;
	let filter = EnvFilter::try_new(&config.service.log_level)
		.unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema().await?;

	let sender = push::sender_for(config.push.as_ref())?;

	if config.push.is_none() {
		tracing::warn!("No push gateway configured. Notifications will be dropped.");
	}

	let service = Arc::new(MilestoneService::new(config, Collaborators::postgres(db, sender)));
	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	let mut tasks: Vec<(&str, JoinHandle<()>)> = Vec::new();

	if service.cfg.dispatch.enabled {
		tasks.push((
			"dispatcher",
			tokio::spawn(milestone_service::run_dispatcher(service.clone(), shutdown_rx.clone())),
		));
	}
	if service.cfg.realtime.enabled {
		tasks.push((
			"listener",
			tokio::spawn(milestone_service::run_listener(service.clone(), shutdown_rx.clone())),
		));
	}
	if tasks.is_empty() {
		tracing::warn!("Both dispatch and realtime are disabled. Nothing to do.");

		return Ok(());
	}

	tracing::info!(tasks = tasks.len(), "Milestone worker started.");

	tokio::signal::ctrl_c().await?;

	tracing::info!("Shutdown requested.");

	let _ = shutdown_tx.send(true);

	for (name, task) in tasks {
		if let Err(err) = task.await {
			tracing::error!(task = name, error = %err, "Background task ended abnormally.");
		}
	}

	tracing::info!("Milestone worker stopped.");

	Ok(())
}

#[cfg(test)]
mod tests {
	use clap::CommandFactory;

	use super::*;

	#[test]
	fn cli_definition_is_valid() {
		Args::command().debug_assert();
	}

	#[test]
	fn config_flag_is_required() {
		let args = Args::try_parse_from(["milestone-worker", "-c", "worker.toml"])
			.expect("Short flag should parse.");

		assert_eq!(args.config, PathBuf::from("worker.toml"));
		assert!(Args::try_parse_from(["milestone-worker"]).is_err());
	}
}
