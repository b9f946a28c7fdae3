//! Client for the upstream tool-resource server.
//!
//! The upstream speaks a JSON-RPC-style protocol over HTTP: `tools/list`
//! enumerates the tool descriptors, `tools/call` invokes one by name.
//! Every tool, known or newly introduced upstream, is addressed through
//! the same two methods; there is deliberately no routing table keyed by
//! tool name, so the upstream can add, remove, or rename tools without
//! this crate changing.

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::{Client, header};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::catalog::{CatalogCache, CatalogStatus, ToolDescriptor};
use crate::retry::{FetchError, FetchErrorKind, RetryPolicy, send_with_retry};

/// Errors from the upstream tool-resource server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpstreamError {
    /// The network layer could not complete the exchange, after retries.
    Connection {
        /// Transport-level failure description.
        message: String,
    },
    /// The upstream returned an error reply.
    Response {
        /// HTTP status of the reply.
        status: u16,
        /// The upstream `error.message`, or the raw body when the
        /// envelope could not be read.
        message: String,
    },
    /// The reply could not be decoded as the expected envelope.
    Protocol {
        /// Decoding failure description.
        message: String,
    },
}

impl Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamError::Connection { message } => {
                write!(f, "upstream connection failed: {message}")
            }
            UpstreamError::Response { status, message } => {
                write!(f, "upstream returned {status}: {message}")
            }
            UpstreamError::Protocol { message } => {
                write!(f, "unexpected upstream reply: {message}")
            }
        }
    }
}

impl StdError for UpstreamError {}

/// Raw reply from one upstream exchange: HTTP status plus decoded body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportReply {
    /// HTTP status code.
    pub status: u16,
    /// The reply body. Bodies that are not valid JSON are carried as a
    /// JSON string so the error path can still show them.
    pub body: Value,
}

/// The wire seam between the catalog client and the network.
///
/// Production uses [`HttpTransport`]; tests substitute an in-memory
/// stub.
pub trait RpcTransport: Send + Sync {
    /// Posts one JSON-RPC request body and returns the decoded reply.
    fn post(
        &self,
        body: Value,
    ) -> Pin<Box<dyn Future<Output = Result<TransportReply, FetchError>> + Send + '_>>;
}

/// [`RpcTransport`] over HTTP, with the resilient retry policy applied
/// to every exchange.
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    policy: RetryPolicy,
}

impl HttpTransport {
    /// Creates a transport posting to `endpoint` under `policy`.
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            policy,
        }
    }
}

impl RpcTransport for HttpTransport {
    fn post(
        &self,
        body: Value,
    ) -> Pin<Box<dyn Future<Output = Result<TransportReply, FetchError>> + Send + '_>>
    {
        Box::pin(async move {
            let resp = send_with_retry(&self.policy, || {
                self.client
                    .post(&self.endpoint)
                    .header(header::CONTENT_TYPE, "application/json")
                    .json(&body)
            })
            .await?;

            let status = resp.status().as_u16();
            let text = resp.text().await.map_err(|err| {
                FetchError::new(
                    FetchErrorKind::Connection,
                    format!("failed to read reply body: {err}"),
                )
            })?;
            let body = serde_json::from_str(&text)
                .unwrap_or(Value::String(text));
            Ok(TransportReply { status, body })
        })
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ToolList {
    #[serde(default)]
    tools: Vec<ToolDescriptor>,
}

/// Client for the upstream `tools/list` / `tools/call` operations.
///
/// The catalog is fetched lazily on first need and cached; `invoke_tool`
/// returns the raw result payload without inspecting its shape; that is
/// the translator's and the capability filter's job.
pub struct UpstreamClient {
    transport: Arc<dyn RpcTransport>,
    cache: CatalogCache,
    next_id: AtomicU64,
}

impl UpstreamClient {
    /// Creates a client over the given transport.
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            transport,
            cache: CatalogCache::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the current tool catalog, fetching it on first use.
    pub async fn list_tools(
        &self,
    ) -> Result<Arc<Vec<ToolDescriptor>>, UpstreamError> {
        if let Some(tools) = self.cache.get().await {
            return Ok(tools);
        }

        let result = self.call("tools/list", None).await?;
        let listed: ToolList =
            serde_json::from_value(result).map_err(|err| {
                UpstreamError::Protocol {
                    message: format!("malformed tool list: {err}"),
                }
            })?;
        debug!(tools = listed.tools.len(), "fetched tool catalog");
        Ok(self.cache.populate(listed.tools).await)
    }

    /// Invokes a tool by name and returns the raw result payload.
    pub async fn invoke_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<Value, UpstreamError> {
        let params = json!({ "name": name, "arguments": arguments });
        self.call("tools/call", Some(params)).await
    }

    /// Drops the cached catalog so the next use refetches it.
    pub async fn invalidate_catalog(&self) {
        self.cache.invalidate().await;
    }

    /// Reports the catalog cache state.
    pub async fn catalog_status(&self) -> CatalogStatus {
        self.cache.status().await
    }

    async fn call(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, UpstreamError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
        });
        if let Some(params) = params {
            body["params"] = params;
        }

        trace!(id, method, "upstream request");
        let reply =
            self.transport.post(body).await.map_err(|err| {
                UpstreamError::Connection {
                    message: err.to_string(),
                }
            })?;

        if !(200..300).contains(&reply.status) {
            let message = reply
                .body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| reply.body.to_string());
            return Err(UpstreamError::Response {
                status: reply.status,
                message,
            });
        }

        let envelope: RpcEnvelope = serde_json::from_value(reply.body)
            .map_err(|err| UpstreamError::Protocol {
                message: format!("malformed envelope: {err}"),
            })?;
        if let Some(error) = envelope.error {
            // Some upstreams report errors in the envelope with a 2xx
            // status; treat them the same as a status-bearing error.
            return Err(UpstreamError::Response {
                status: reply.status,
                message: error.message,
            });
        }
        envelope.result.ok_or_else(|| UpstreamError::Protocol {
            message: "reply carries neither result nor error".to_owned(),
        })
    }
}
