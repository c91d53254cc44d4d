// JSON-RPC transport - hex-encoded payloads over HTTP

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::trace;

use super::{Method, Transport};
use crate::error::TransportError;

/// JSON-RPC request
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: [String; 1],
    id: u64,
}

/// JSON-RPC response
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<String>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

/// Default transport: one JSON-RPC 2.0 call per request, bytes as 0x-hex
pub struct JsonRpcTransport {
    client: Client,
    request_id: AtomicU64,
}

impl JsonRpcTransport {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_connect_timeout(Duration::from_secs(10))
    }

    pub fn with_connect_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            request_id: AtomicU64::new(1),
        })
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for JsonRpcTransport {
    async fn send(
        &self,
        endpoint: &str,
        method: Method,
        request: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError> {
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            method: method.rpc_name(),
            params: [format!("0x{}", hex::encode(&request))],
            id: self.next_id(),
        };
        trace!("{} -> {} ({} bytes)", method.rpc_name(), endpoint, request.len());

        let response = self
            .client
            .post(endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Connection(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(TransportError::Http(response.status().as_u16()));
        }

        let parsed: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(TransportError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        let result = parsed
            .result
            .ok_or_else(|| TransportError::MalformedResponse("empty result".to_string()))?;
        decode_hex(&result)
    }
}

fn decode_hex(text: &str) -> Result<Vec<u8>, TransportError> {
    let text = text.strip_prefix("0x").unwrap_or(text);
    hex::decode(text).map_err(|e| TransportError::MalformedResponse(format!("invalid hex: {}", e)))
}
