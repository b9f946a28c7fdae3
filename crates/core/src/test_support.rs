//! In-memory stand-ins for the upstream server, shared by unit tests.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Mutex;

use serde_json::{Value, json};

use crate::retry::FetchError;
use crate::upstream::{RpcTransport, TransportReply};

/// An in-memory [`RpcTransport`] with canned replies.
///
/// `tools/list` always answers with the configured catalog; `tools/call`
/// pops from the queued replies, falling back to a plain text result.
/// Every posted request body is recorded for assertions.
pub(crate) struct StubTransport {
    tools: Value,
    list_override: Mutex<Option<Result<TransportReply, FetchError>>>,
    call_replies: Mutex<VecDeque<Result<TransportReply, FetchError>>>,
    requests: Mutex<Vec<Value>>,
}

impl StubTransport {
    /// Creates a stub whose `tools/list` result is `{"tools": tools}`.
    pub(crate) fn with_tools(tools: Value) -> Self {
        Self {
            tools,
            list_override: Mutex::new(None),
            call_replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Makes every `tools/list` request answer with `reply` instead of
    /// the configured catalog.
    pub(crate) fn set_list_reply(
        &self,
        reply: Result<TransportReply, FetchError>,
    ) {
        *self.list_override.lock().unwrap() = Some(reply);
    }

    /// Queues the reply for the next `tools/call` request.
    pub(crate) fn push_call_reply(
        &self,
        reply: Result<TransportReply, FetchError>,
    ) {
        self.call_replies.lock().unwrap().push_back(reply);
    }

    /// Queues a 200 reply whose result is one text content block.
    pub(crate) fn push_text_result(&self, text: &str) {
        self.push_call_reply(Ok(TransportReply {
            status: 200,
            body: json!({
                "result": {
                    "content": [{ "type": "text", "text": text }],
                },
            }),
        }));
    }

    /// Queues a 200 reply with an arbitrary raw result payload.
    pub(crate) fn push_raw_result(&self, result: Value) {
        self.push_call_reply(Ok(TransportReply {
            status: 200,
            body: json!({ "result": result }),
        }));
    }

    /// Every request body posted so far.
    pub(crate) fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    /// The `(name, arguments)` pairs of every `tools/call` posted.
    pub(crate) fn calls(&self) -> Vec<(String, Value)> {
        self.requests()
            .iter()
            .filter(|req| req["method"] == "tools/call")
            .map(|req| {
                let name = req["params"]["name"]
                    .as_str()
                    .unwrap_or_default()
                    .to_owned();
                (name, req["params"]["arguments"].clone())
            })
            .collect()
    }
}

impl RpcTransport for StubTransport {
    fn post(
        &self,
        body: Value,
    ) -> Pin<Box<dyn Future<Output = Result<TransportReply, FetchError>> + Send + '_>>
    {
        let method = body["method"].as_str().unwrap_or_default().to_owned();
        self.requests.lock().unwrap().push(body);

        let reply = match method.as_str() {
            "tools/list" => match &*self.list_override.lock().unwrap() {
                Some(reply) => reply.clone(),
                None => Ok(TransportReply {
                    status: 200,
                    body: json!({ "result": { "tools": self.tools } }),
                }),
            },
            "tools/call" => self
                .call_replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Ok(TransportReply {
                        status: 200,
                        body: json!({
                            "result": {
                                "content": [
                                    { "type": "text", "text": "ok" },
                                ],
                            },
                        }),
                    })
                }),
            other => Ok(TransportReply {
                status: 404,
                body: json!({
                    "error": { "message": format!("unknown method {other}") },
                }),
            }),
        };
        Box::pin(std::future::ready(reply))
    }
}
