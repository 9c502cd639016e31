//! Multicast client for an HTTP push gateway.
//!
//! The gateway receives every token for one recipient in a single request and answers with a
//! per-batch tally. A batch counts as delivered when the gateway accepted at least one token.

use std::{collections::BTreeMap, time::Duration};

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};
use milestone_config::PushProviderConfig;

#[derive(Debug, Serialize)]
struct MulticastRequest<'a> {
	tokens: &'a [String],
	notification: NotificationBody<'a>,
	data: &'a BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct NotificationBody<'a> {
	title: &'a str,
	body: &'a str,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct MulticastReceipt {
	#[serde(default)]
	pub success_count: u32,
	#[serde(default)]
	pub failure_count: u32,
}

/// Reusable gateway client. Building one validates the configured headers up front.
#[derive(Clone, Debug)]
pub struct PushClient {
	client: Client,
	url: String,
	provider_id: String,
}
impl PushClient {
	pub fn new(cfg: &PushProviderConfig) -> Result<Self> {
		let headers = crate::auth_headers(&cfg.api_key, &cfg.default_headers)?;
		let client = Client::builder()
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.default_headers(headers)
			.build()?;
		let url = format!("{}{}", cfg.api_base.trim_end_matches('/'), cfg.path);

		Ok(Self { client, url, provider_id: cfg.provider_id.clone() })
	}

	pub fn provider_id(&self) -> &str {
		&self.provider_id
	}

	pub async fn send_multi(
		&self,
		tokens: &[String],
		title: &str,
		body: &str,
		data: &BTreeMap<String, String>,
	) -> Result<MulticastReceipt> {
		if tokens.is_empty() {
			return Err(Error::InvalidConfig { message: "No device tokens to send to.".to_string() });
		}

		let request = MulticastRequest { tokens, notification: NotificationBody { title, body }, data };
		let res = self.client.post(&self.url).json(&request).send().await?;
		let bytes = res.error_for_status()?.bytes().await?;

		parse_receipt(&bytes, tokens.len())
	}
}

fn parse_receipt(bytes: &[u8], token_count: usize) -> Result<MulticastReceipt> {
	// Gateways that return an empty 2xx body accepted the whole batch.
	if bytes.iter().all(u8::is_ascii_whitespace) {
		return Ok(MulticastReceipt {
			success_count: token_count as u32,
			failure_count: 0,
		});
	}

	let receipt: MulticastReceipt = serde_json::from_slice(bytes)?;

	if receipt.success_count == 0 && receipt.failure_count > 0 {
		return Err(Error::InvalidResponse {
			message: format!(
				"Push gateway rejected all {} device tokens.",
				receipt.failure_count
			),
		});
	}

	Ok(receipt)
}
