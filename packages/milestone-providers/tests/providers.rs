use std::collections::BTreeMap;

use httpmock::prelude::*;
use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value, json};

use milestone_config::PushProviderConfig;
use milestone_providers::push::PushClient;

fn config(api_base: String) -> PushProviderConfig {
	let mut default_headers = Map::new();

	default_headers.insert("X-Tenant".to_string(), Value::String("sports".to_string()));

	PushProviderConfig {
		provider_id: "gateway".to_string(),
		api_base,
		api_key: "secret".to_string(),
		path: "/v1/push/multicast".to_string(),
		title: "New percentile milestone".to_string(),
		timeout_ms: 2_000,
		default_headers,
	}
}

fn data() -> BTreeMap<String, String> {
	BTreeMap::from([
		("entity_type".to_string(), "team".to_string()),
		("entity_id".to_string(), "42".to_string()),
	])
}

#[test]
fn builds_bearer_auth_header() {
	let headers =
		milestone_providers::auth_headers("secret", &Map::new()).expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn rejects_non_string_default_headers() {
	let mut headers = Map::new();

	headers.insert("X-Retries".to_string(), json!(3));

	assert!(milestone_providers::auth_headers("secret", &headers).is_err());
}

#[tokio::test]
async fn sends_tokens_title_body_and_data() {
	let server = MockServer::start();
	let mock = server.mock(|when, then| {
		when.method(POST)
			.path("/v1/push/multicast")
			.header("authorization", "Bearer secret")
			.header("x-tenant", "sports")
			.json_body(json!({
				"tokens": ["tok-a", "tok-b"],
				"notification": {
					"title": "New percentile milestone",
					"body": "Rovers is now 91st percentile in Goals"
				},
				"data": { "entity_id": "42", "entity_type": "team" }
			}));
		then.status(200)
			.header("content-type", "application/json")
			.json_body(json!({ "success_count": 2, "failure_count": 0 }));
	});
	let client = PushClient::new(&config(server.base_url())).expect("Failed to build client.");
	let receipt = client
		.send_multi(
			&["tok-a".to_string(), "tok-b".to_string()],
			"New percentile milestone",
			"Rovers is now 91st percentile in Goals",
			&data(),
		)
		.await
		.expect("Send failed.");

	mock.assert();
	assert_eq!(receipt.success_count, 2);
}

#[tokio::test]
async fn gateway_errors_are_reported() {
	let server = MockServer::start();
	let mock = server.mock(|when, then| {
		when.method(POST).path("/v1/push/multicast");
		then.status(503);
	});
	let client = PushClient::new(&config(server.base_url())).expect("Failed to build client.");
	let result = client.send_multi(&["tok-a".to_string()], "title", "body", &data()).await;

	mock.assert();
	assert!(result.is_err());
}

#[tokio::test]
async fn empty_token_lists_are_not_sent() {
	let server = MockServer::start();
	let mock = server.mock(|when, then| {
		when.method(POST);
		then.status(200);
	});
	let client = PushClient::new(&config(server.base_url())).expect("Failed to build client.");
	let result = client.send_multi(&[], "title", "body", &data()).await;

	assert!(result.is_err());
	mock.assert_hits(0);
}
