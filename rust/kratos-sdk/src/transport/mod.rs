//! Transport boundary
//!
//! The engine hands encoded bytes to a [`Transport`] keyed by node endpoint
//! and gets encoded bytes back. Connection pooling and TLS belong to the
//! implementation.

mod rpc;

pub use rpc::JsonRpcTransport;

use async_trait::async_trait;

use crate::error::TransportError;

/// Remote procedure a request is sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// State-changing operation; answered by a `SubmitResponse`
    SubmitTransaction,
    /// Read; answered by a `QueryResponse`
    Query,
}

impl Method {
    pub fn rpc_name(&self) -> &'static str {
        match self {
            Method::SubmitTransaction => "author_submitTransaction",
            Method::Query => "state_query",
        }
    }
}

/// Request/response channel to consensus nodes
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        endpoint: &str,
        method: Method,
        request: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError>;
}
