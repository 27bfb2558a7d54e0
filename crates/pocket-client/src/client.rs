//! HTTP client for the retrieval endpoint using reqwest

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::error::{ClientError, Result};
use crate::types::{Credentials, FetchWindow, RawRecord};

/// Production host of the service
pub const DEFAULT_BASE_URL: &str = "https://getpocket.com";

const GET_PATH: &str = "/v3/get";

/// Transport settings for the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Scheme + host; requests go to `{base_url}/v3/get`
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: concat!("pocket-connector/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
        }
    }
}

pub struct PocketClient {
    client: Client,
    endpoint: Url,
}

impl PocketClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ClientError::Network(format!("build client: {}", e)))?;

        let endpoint = Url::parse(config.base_url.trim_end_matches('/'))
            .and_then(|base| base.join(GET_PATH))
            .map_err(|e| ClientError::Protocol(format!("invalid base url {}: {}", config.base_url, e)))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Retrieve every record in `window`.
    ///
    /// A `Since` window asks the service for its own incremental semantics and
    /// sends no count; a `Newest` window sends only the count.
    pub async fn fetch_items(
        &self,
        credentials: &Credentials,
        window: &FetchWindow,
    ) -> Result<Vec<RawRecord>> {
        let body = request_body(credentials, window);
        tracing::debug!(endpoint = %self.endpoint, ?window, "requesting records");

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("X-Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let reason = response
                .headers()
                .get("X-Error")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Err(ClientError::from_status(status.as_u16(), reason));
        }

        let text = response.text().await?;
        let records = parse_get_response(&text)?;
        tracing::debug!(count = records.len(), "received records");
        Ok(records)
    }
}

fn request_body(credentials: &Credentials, window: &FetchWindow) -> Value {
    let mut body = json!({
        "consumer_key": credentials.consumer_key,
        "access_token": credentials.access_token,
        "state": "all",
        "detailType": "complete",
        "sort": "newest",
    });
    match window {
        FetchWindow::Newest { count } => body["count"] = json!(count),
        FetchWindow::Since(ts) => body["since"] = json!(ts),
    }
    body
}

/// Response envelope; only `list` matters to us.
#[derive(Debug, Deserialize)]
struct GetResponse {
    list: Option<Value>,
}

/// Decode a `/v3/get` body into records, in the order the service listed them.
///
/// `list` is an object keyed by item id. When nothing matches, the service sends
/// an empty array instead.
pub fn parse_get_response(body: &str) -> Result<Vec<RawRecord>> {
    let response: GetResponse = serde_json::from_str(body)
        .map_err(|e| ClientError::Protocol(format!("invalid response JSON: {}", e)))?;

    match response.list {
        Some(Value::Object(entries)) => entries
            .into_iter()
            .map(|(id, entry)| {
                serde_json::from_value::<RawRecord>(entry)
                    .map_err(|e| ClientError::Protocol(format!("record {}: {}", id, e)))
            })
            .collect(),
        Some(Value::Array(entries)) if entries.is_empty() => Ok(Vec::new()),
        Some(other) => Err(ClientError::Protocol(format!(
            "unexpected `list` value: {}",
            type_name(&other)
        ))),
        None => Err(ClientError::Protocol("response has no `list` field".to_string())),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "non-empty array",
        Value::Object(_) => "object",
    }
}
