//! Ad hoc delivery of milestone events published on a NOTIFY channel.
//!
//! The listener moves through `Disconnected -> Connecting -> Listening` and back to
//! `Disconnected` whenever the connection drops. Reconnects back off exponentially and retry
//! forever until shutdown is requested. Events skip the persisted queue and quiet hours.

use std::{fmt, sync::Arc, time::Duration};

use tokio::{
	sync::{OwnedSemaphorePermit, Semaphore, watch},
	time as tokio_time,
};

use crate::{EventStream, MilestoneService, Result};
use milestone_domain::MilestoneEvent;

const MAX_BACKOFF_DOUBLINGS: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
	Disconnected,
	Connecting,
	Listening,
}
impl fmt::Display for ListenerState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Disconnected => "disconnected",
			Self::Connecting => "connecting",
			Self::Listening => "listening",
		})
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerReport {
	pub sent: usize,
	pub failed: usize,
	/// Followers without an active device token.
	pub skipped: usize,
}

enum Disconnect {
	Shutdown,
	Lost(String),
}

impl MilestoneService {
	/// Fans one event out to every follower of the entity, one send per follower.
	pub async fn handle_event(&self, event: &MilestoneEvent) -> Result<HandlerReport> {
		let directory = &self.collaborators.directory;
		let followers =
			directory.followers(event.entity_type, event.entity_id, &event.sport).await?;
		let mut report = HandlerReport::default();

		if followers.is_empty() {
			return Ok(report);
		}

		let message = self
			.compose_message(
				event.entity_type,
				event.entity_id,
				&event.sport,
				&event.stat_key,
				event.percentile,
			)
			.await;
		let data = crate::push_data(
			event.entity_type.as_str(),
			event.entity_id,
			&event.sport,
			&event.stat_key,
			event.percentile,
		);

		for follower in followers {
			let tokens = match directory.device_tokens(follower.user_id).await {
				Ok(tokens) => tokens,
				Err(err) => {
					tracing::warn!(
						error = %err,
						user_id = %follower.user_id,
						"Device token lookup failed."
					);

					report.failed += 1;

					continue;
				},
			};

			if tokens.is_empty() {
				report.skipped += 1;

				continue;
			}

			let sent = self
				.collaborators
				.push
				.send_multi(&tokens, self.push_title(), &message, &data)
				.await;

			match sent {
				Ok(()) => report.sent += 1,
				Err(err) => {
					tracing::warn!(
						error = %err,
						user_id = %follower.user_id,
						"Real-time push failed."
					);

					report.failed += 1;
				},
			}
		}

		Ok(report)
	}
}

/// Delay before reconnect attempt `attempt` (1-based): `initial`, doubling each time, capped at
/// `max`.
pub fn backoff_for_attempt(attempt: u32, initial_ms: u64, max_ms: u64) -> Duration {
	let exp = attempt.max(1).saturating_sub(1).min(MAX_BACKOFF_DOUBLINGS);
	let base = initial_ms.saturating_mul(1_u64 << exp);

	Duration::from_millis(base.min(max_ms))
}

/// Runs the listener until `shutdown` flips to `true`. Handlers already running finish on their
/// own.
pub async fn run_listener(service: Arc<MilestoneService>, mut shutdown: watch::Receiver<bool>) {
	let cfg = service.cfg.realtime.clone();
	let handlers = Arc::new(Semaphore::new(cfg.max_concurrent_handlers.max(1) as usize));
	let mut state = ListenerState::Disconnected;
	let mut failures: u32 = 0;

	loop {
		if *shutdown.borrow() {
			break;
		}

		transition(&mut state, ListenerState::Connecting);

		match service.collaborators.events.connect(&cfg.channel).await {
			Ok(mut stream) => {
				transition(&mut state, ListenerState::Listening);

				failures = 0;

				tracing::info!(channel = cfg.channel.as_str(), "Listening for milestone events.");

				let disconnect = listen(&service, &mut *stream, &handlers, &mut shutdown).await;

				transition(&mut state, ListenerState::Disconnected);

				match disconnect {
					Disconnect::Shutdown => break,
					Disconnect::Lost(reason) => {
						tracing::warn!(
							reason = reason.as_str(),
							"Milestone listener disconnected."
						);
					},
				}
			},
			Err(err) => {
				transition(&mut state, ListenerState::Disconnected);

				tracing::warn!(error = %err, "Milestone listener failed to connect.");
			},
		}

		if *shutdown.borrow() {
			break;
		}

		failures = failures.saturating_add(1);

		let delay = backoff_for_attempt(failures, cfg.initial_backoff_ms, cfg.max_backoff_ms);

		tracing::info!(
			delay_ms = delay.as_millis() as u64,
			attempt = failures,
			"Reconnecting milestone listener."
		);

		tokio::select! {
			changed = shutdown.changed() => {
				if changed.is_err() {
					break;
				}
			}
			_ = tokio_time::sleep(delay) => {}
		}
	}

	tracing::info!("Milestone listener stopped.");
}

async fn listen(
	service: &Arc<MilestoneService>,
	stream: &mut dyn EventStream,
	handlers: &Arc<Semaphore>,
	shutdown: &mut watch::Receiver<bool>,
) -> Disconnect {
	loop {
		if *shutdown.borrow() {
			return Disconnect::Shutdown;
		}

		let received = tokio::select! {
			changed = shutdown.changed() => {
				if changed.is_err() {
					return Disconnect::Shutdown;
				}

				continue;
			}
			received = stream.recv() => received,
		};

		let payload = match received {
			Ok(Some(payload)) => payload,
			Ok(None) => return Disconnect::Lost("connection closed".to_string()),
			Err(err) => return Disconnect::Lost(err.to_string()),
		};
		let event = match MilestoneEvent::parse(&payload) {
			Ok(event) => event,
			Err(err) => {
				tracing::warn!(
					error = %err,
					payload = payload.as_str(),
					"Ignoring malformed milestone payload."
				);

				continue;
			},
		};
		let Some(permit) = acquire_handler(handlers, shutdown).await else {
			return Disconnect::Shutdown;
		};

		spawn_handler(Arc::clone(service), event, permit);
	}
}

/// Waits for a free handler slot. Returns `None` once shutdown is requested, so a saturated pool
/// never holds the listener open.
async fn acquire_handler(
	handlers: &Arc<Semaphore>,
	shutdown: &mut watch::Receiver<bool>,
) -> Option<OwnedSemaphorePermit> {
	loop {
		if *shutdown.borrow() {
			return None;
		}

		tokio::select! {
			changed = shutdown.changed() => {
				if changed.is_err() {
					return None;
				}
			}
			permit = Arc::clone(handlers).acquire_owned() => return permit.ok(),
		}
	}
}

fn spawn_handler(
	service: Arc<MilestoneService>,
	event: MilestoneEvent,
	permit: OwnedSemaphorePermit,
) {
	tokio::spawn(async move {
		let _permit = permit;

		match service.handle_event(&event).await {
			Ok(report) => tracing::info!(
				entity_type = %event.entity_type,
				entity_id = event.entity_id,
				stat_key = event.stat_key.as_str(),
				sent = report.sent,
				failed = report.failed,
				skipped = report.skipped,
				"Handled milestone event."
			),
			Err(err) => tracing::warn!(
				error = %err,
				entity_type = %event.entity_type,
				entity_id = event.entity_id,
				"Milestone event handling failed."
			),
		}
	});
}

fn transition(state: &mut ListenerState, next: ListenerState) {
	tracing::debug!(from = %state, to = %next, "Listener state changed.");

	*state = next;
}
