use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{JsonRpcError, JsonRpcRequest, ValidatorSnapshot};
use crate::monitor::SnapshotSource;

const REQUEST_ID: &str = "dontcare";

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("undecodable response: {0}")]
    Decode(String),

    #[error("response has no result")]
    MissingResult,

    #[error("node returned error {code}: {message}")]
    Node { code: i64, message: String },

    #[error("result is not a validator snapshot: {0}")]
    Snapshot(String),
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        RpcError::Transport(err.to_string())
    }
}

/// JSON-RPC 2.0 over plain HTTP POST. Idle connections are never kept, so
/// every call dials the node afresh.
pub struct RpcClient {
    url: String,
    http: Client,
}

impl RpcClient {
    pub fn new(host: &str, port: u16) -> Result<Self, RpcError> {
        let http = reqwest::ClientBuilder::new()
            .http1_only()
            .pool_max_idle_per_host(0)
            .no_proxy()
            .user_agent("validator-monitor/0.1")
            .build()?;

        Ok(Self {
            url: format!("http://{}:{}/", host, port),
            http,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the decoded response body as-is, `error` member included.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: REQUEST_ID.to_string(),
            method: method.to_string(),
            params: params.unwrap_or_else(|| json!({})),
        };
        let request_body =
            serde_json::to_string(&request).map_err(|e| RpcError::Decode(e.to_string()))?;

        debug!(url = %self.url, method, "sending rpc request");
        let response = self
            .http
            .post(&self.url)
            .header("Content-Type", "application/json")
            .body(request_body)
            .send()
            .await?;

        let response_text = response.text().await?;
        serde_json::from_str(&response_text).map_err(|e| RpcError::Decode(e.to_string()))
    }
}

pub async fn fetch_validator_snapshot(client: &RpcClient) -> Result<ValidatorSnapshot, RpcError> {
    let mut response = client.call("validators", Some(json!([null]))).await?;

    let result = response.get_mut("result").map(Value::take);
    let result = match result {
        Some(Value::Null) | None => {
            return Err(match response.get("error") {
                Some(error) => {
                    let error: JsonRpcError = serde_json::from_value(error.clone())
                        .unwrap_or(JsonRpcError {
                            code: 0,
                            message: error.to_string(),
                        });
                    RpcError::Node {
                        code: error.code,
                        message: error.message,
                    }
                }
                None => RpcError::MissingResult,
            });
        }
        Some(Value::Object(fields)) if fields.is_empty() => return Err(RpcError::MissingResult),
        Some(result) => result,
    };

    serde_json::from_value(result).map_err(|e| RpcError::Snapshot(e.to_string()))
}

#[async_trait]
impl SnapshotSource for RpcClient {
    async fn fetch_snapshot(&self) -> Result<ValidatorSnapshot, RpcError> {
        fetch_validator_snapshot(self).await.map_err(|e| {
            warn!(url = %self.url, error = %e, "validators call failed");
            e
        })
    }
}
