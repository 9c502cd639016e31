use std::{sync::Arc, time::Duration};

use time::OffsetDateTime;
use tokio::{
	sync::watch,
	time::{self as tokio_time, MissedTickBehavior},
};

use crate::{MilestoneService, Result};
use milestone_storage::models::Notification;

pub const NO_DEVICE_TOKENS: &str = "no device tokens";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
	pub claimed: usize,
	pub sent: usize,
	pub failed: usize,
}

impl MilestoneService {
	/// Claims one batch of due notifications and tries each exactly once.
	pub async fn dispatch_once(&self, now: OffsetDateTime) -> Result<DispatchReport> {
		let queue = &self.collaborators.queue;
		let rows = queue.claim_due(self.cfg.dispatch.batch_size, now).await?;
		let mut report = DispatchReport { claimed: rows.len(), ..Default::default() };

		for row in &rows {
			let finished_at = OffsetDateTime::now_utc();

			match self.deliver(row).await {
				Ok(()) => {
					report.sent += 1;

					if let Err(err) = queue.mark_sent(row.id, finished_at).await {
						tracing::error!(
							error = %err,
							notification_id = %row.id,
							"Failed to mark notification as sent."
						);
					}
				},
				Err(reason) => {
					report.failed += 1;

					tracing::debug!(
						notification_id = %row.id,
						reason = reason.as_str(),
						"Notification delivery failed."
					);

					if let Err(err) = queue.mark_failed(row.id, &reason, finished_at).await {
						tracing::error!(
							error = %err,
							notification_id = %row.id,
							"Failed to mark notification as failed."
						);
					}
				},
			}
		}

		if report.claimed > 0 {
			tracing::info!(
				claimed = report.claimed,
				sent = report.sent,
				failed = report.failed,
				"Dispatched notification batch."
			);
		}

		Ok(report)
	}

	/// Returns the failure reason to record when the row could not be delivered.
	async fn deliver(&self, row: &Notification) -> Result<(), String> {
		let tokens = self
			.collaborators
			.directory
			.device_tokens(row.user_id)
			.await
			.map_err(|err| err.to_string())?;

		if tokens.is_empty() {
			return Err(NO_DEVICE_TOKENS.to_string());
		}

		let mut data = crate::push_data(
			&row.entity_type,
			row.entity_id,
			&row.sport,
			&row.stat_key,
			row.percentile,
		);

		data.insert("notification_id".to_string(), row.id.to_string());

		self.collaborators
			.push
			.send_multi(&tokens, self.push_title(), &row.message, &data)
			.await
			.map_err(|err| err.to_string())
	}
}

/// Ticks `dispatch_once` every `dispatch.interval_secs` until `shutdown` flips to `true`.
/// A batch in flight when shutdown arrives runs to completion.
pub async fn run_dispatcher(service: Arc<MilestoneService>, mut shutdown: watch::Receiver<bool>) {
	let period = Duration::from_secs(service.cfg.dispatch.interval_secs.max(1));
	let mut ticker = tokio_time::interval(period);

	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

	tracing::info!(interval_secs = period.as_secs(), "Dispatch worker started.");

	loop {
		if *shutdown.borrow() {
			break;
		}

		tokio::select! {
			changed = shutdown.changed() => {
				if changed.is_err() {
					break;
				}

				continue;
			}
			_ = ticker.tick() => {}
		}

		if let Err(err) = service.dispatch_once(OffsetDateTime::now_utc()).await {
			tracing::error!(error = %err, "Notification dispatch failed.");
		}
	}

	tracing::info!("Dispatch worker stopped.");
}
