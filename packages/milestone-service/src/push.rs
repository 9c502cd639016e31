use std::{collections::BTreeMap, sync::Arc};

use crate::{BoxFuture, PushSender, Result};
use milestone_config::PushProviderConfig;
use milestone_providers::push::PushClient;

/// Accepts every send without delivering anything. Used when no `[push]` gateway is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPush;

impl PushSender for NoopPush {
	fn send_multi<'a>(
		&'a self,
		tokens: &'a [String],
		_title: &'a str,
		_body: &'a str,
		_data: &'a BTreeMap<String, String>,
	) -> BoxFuture<'a, Result<()>> {
		tracing::debug!(tokens = tokens.len(), "Push gateway is not configured. Dropping send.");

		Box::pin(async { Ok(()) })
	}
}

#[derive(Clone, Debug)]
pub struct HttpPush {
	client: PushClient,
}
impl HttpPush {
	pub fn new(cfg: &PushProviderConfig) -> Result<Self> {
		Ok(Self { client: PushClient::new(cfg)? })
	}
}

impl PushSender for HttpPush {
	fn send_multi<'a>(
		&'a self,
		tokens: &'a [String],
		title: &'a str,
		body: &'a str,
		data: &'a BTreeMap<String, String>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let receipt = self.client.send_multi(tokens, title, body, data).await?;

			if receipt.failure_count > 0 {
				tracing::warn!(
					provider_id = self.client.provider_id(),
					success_count = receipt.success_count,
					failure_count = receipt.failure_count,
					"Push gateway rejected some device tokens."
				);
			}

			Ok(())
		})
	}
}

/// The HTTP gateway when one is configured, otherwise a no-op sender.
pub fn sender_for(cfg: Option<&PushProviderConfig>) -> Result<Arc<dyn PushSender>> {
	match cfg {
		Some(cfg) => Ok(Arc::new(HttpPush::new(cfg)?)),
		None => Ok(Arc::new(NoopPush)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn noop_sender_always_succeeds() {
		let sender = sender_for(None).expect("No-op sender should build.");
		let result = sender.send_multi(&["tok".to_string()], "title", "body", &BTreeMap::new()).await;

		assert!(result.is_ok());
	}
}
