//! The line-oriented stdio protocol surface.
//!
//! One JSON-RPC request per line on stdin, one reply per line on
//! stdout. This surface exposes the upstream primitives directly,
//! without the agent loop: `tools/list` answers with the restricted
//! catalog, `tools/call` invokes one tool (capability checks and
//! forced arguments still apply) and replies with the rendered text
//! form of the result.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use verse_relay_core::capability::{
    self, CapabilityPolicy, is_broad_annotation, suppress_annotations,
};
use verse_relay_core::upstream::UpstreamClient;

use crate::render;

/// Serves the stdio protocol.
pub struct StdioServer {
    upstream: Arc<UpstreamClient>,
    policy: CapabilityPolicy,
    overrides: Map<String, Value>,
}

impl StdioServer {
    /// Creates a server over the given upstream client.
    pub fn new(
        upstream: Arc<UpstreamClient>,
        policy: CapabilityPolicy,
        overrides: Map<String, Value>,
    ) -> Self {
        Self {
            upstream,
            policy,
            overrides,
        }
    }

    /// Reads requests from stdin until it closes.
    pub async fn run(&self) -> io::Result<()> {
        let mut stdin = BufReader::new(io::stdin());
        let mut stdout = io::stdout();
        let mut line = String::new();

        loop {
            line.clear();
            let count = stdin.read_line(&mut line).await?;
            if count == 0 {
                return Ok(());
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let reply = self.handle_line(trimmed).await;
            let mut encoded = reply.to_string();
            encoded.push('\n');
            stdout.write_all(encoded.as_bytes()).await?;
            stdout.flush().await?;
        }
    }

    /// Handles one request line and returns the reply object.
    pub async fn handle_line(&self, line: &str) -> Value {
        let Ok(request) = serde_json::from_str::<Value>(line) else {
            return error_reply(Value::Null, -32700, "Parse error");
        };
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let method = request
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default();

        debug!(method, "stdio request");
        match method {
            "tools/list" => self.handle_list(id).await,
            "tools/call" => self.handle_call(id, request.get("params")).await,
            _ => error_reply(id, -32601, "Method not found"),
        }
    }

    async fn handle_list(&self, id: Value) -> Value {
        let catalog = match self.upstream.list_tools().await {
            Ok(catalog) => catalog,
            Err(err) => return error_reply(id, -32000, &err.to_string()),
        };
        let restricted = capability::restrict(&catalog, &self.policy);
        match serde_json::to_value(&restricted) {
            Ok(tools) => ok_reply(id, json!({ "tools": tools })),
            Err(_) => error_reply(id, -32603, "Internal error"),
        }
    }

    async fn handle_call(&self, id: Value, params: Option<&Value>) -> Value {
        let Some(params) = params else {
            return error_reply(id, -32602, "Missing params");
        };
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return error_reply(id, -32602, "Missing tool name");
        };
        if !self.policy.is_allowed(name) {
            return error_reply(
                id,
                -32601,
                &format!("tool '{name}' is not enabled for this caller"),
            );
        }

        let mut arguments = match params.get("arguments") {
            None => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return error_reply(
                    id,
                    -32602,
                    "arguments must be an object",
                );
            }
        };
        for (field, value) in &self.overrides {
            arguments.insert(field.clone(), value.clone());
        }

        match self
            .upstream
            .invoke_tool(name, Value::Object(arguments))
            .await
        {
            Ok(raw) => {
                let raw = if self.policy.suppress_broad_annotations {
                    suppress_annotations(raw, is_broad_annotation)
                } else {
                    raw
                };
                let text = render::render_text(&raw);
                ok_reply(
                    id,
                    json!({
                        "content": [{ "type": "text", "text": text }],
                    }),
                )
            }
            Err(err) => error_reply(id, -32000, &err.to_string()),
        }
    }
}

fn ok_reply(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn error_reply(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    })
}
