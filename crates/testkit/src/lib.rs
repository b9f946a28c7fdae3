//! A local scripted chat backend for testing purpose.
//!
//! Before sending requests, you need to set up the script, which is the
//! sequence of responses the backend should produce. Each `complete`
//! call consumes the next scripted entry; if the script runs dry, an
//! error is returned. Every received request is recorded for
//! assertions.
//!
//! # Note
//!
//! This type is not optimized for production use, there are heavy
//! memory copies involved. You should only use it for testing.

#![deny(missing_docs)]

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::sync::{Arc, Mutex};

use verse_relay_model::{
    BackendError, ChatBackend, ChatMessage, ChatRequest, ChatResponse,
    Choice, ErrorKind, FunctionCall, ToolCall, Usage,
};

/// The error produced by a scripted failure, or by running off the end
/// of the script.
#[derive(Clone, Debug)]
pub struct ScriptedError {
    message: String,
    kind: ErrorKind,
    status: Option<u16>,
}

impl Display for ScriptedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for ScriptedError {}

impl BackendError for ScriptedError {
    fn kind(&self) -> ErrorKind {
        self.kind
    }

    fn status(&self) -> Option<u16> {
        self.status
    }
}

#[derive(Debug, Default)]
struct Inner {
    script: Mutex<VecDeque<Result<ChatResponse, ScriptedError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

/// A chat backend that replays a preset script.
///
/// Clones share the same script and request log, so a test can keep a
/// handle while the orchestrator owns another.
#[derive(Clone, Debug, Default)]
pub struct ScriptedBackend {
    inner: Arc<Inner>,
}

impl ScriptedBackend {
    /// Creates a backend with an empty script.
    pub fn new() -> Self {
        Default::default()
    }

    /// Appends a response step to the script.
    pub fn push_response(&self, response: ChatResponse) {
        self.inner
            .script
            .lock()
            .unwrap()
            .push_back(Ok(response));
    }

    /// Appends a failure step to the script.
    pub fn push_error(
        &self,
        kind: ErrorKind,
        status: Option<u16>,
        message: impl Into<String>,
    ) {
        self.inner.script.lock().unwrap().push_back(Err(
            ScriptedError {
                message: message.into(),
                kind,
                status,
            },
        ));
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.inner.requests.lock().unwrap().clone()
    }
}

impl ChatBackend for ScriptedBackend {
    type Error = ScriptedError;

    fn complete(
        &self,
        req: &ChatRequest,
    ) -> impl Future<Output = Result<ChatResponse, Self::Error>> + Send + 'static
    {
        self.inner.requests.lock().unwrap().push(req.clone());
        let result = self
            .inner
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(ScriptedError {
                    message: "script ran dry".to_owned(),
                    kind: ErrorKind::Other,
                    status: None,
                })
            });
        ready(result)
    }
}

/// Builds a response with the given choices and a non-zero usage.
pub fn response(choices: Vec<Choice>) -> ChatResponse {
    ChatResponse {
        id: Some("resp:scripted".to_owned()),
        choices,
        usage: Some(Usage {
            prompt_tokens: 20,
            completion_tokens: 12,
            total_tokens: 32,
        }),
        extra: Default::default(),
    }
}

/// A plain assistant text candidate.
pub fn text_choice(index: u32, content: &str) -> Choice {
    Choice {
        index,
        message: ChatMessage::Assistant {
            content: Some(content.to_owned()),
            tool_calls: None,
        },
        finish_reason: Some("stop".to_owned()),
    }
}

/// A candidate requesting the given tool calls.
pub fn tool_call_choice(index: u32, calls: Vec<ToolCall>) -> Choice {
    Choice {
        index,
        message: ChatMessage::Assistant {
            content: None,
            tool_calls: Some(calls),
        },
        finish_reason: Some("tool_calls".to_owned()),
    }
}

/// A single tool call with a serialized argument payload.
pub fn call(id: &str, name: &str, arguments: &str) -> ToolCall {
    ToolCall {
        id: id.to_owned(),
        r#type: "function".to_owned(),
        function: FunctionCall {
            name: name.to_owned(),
            arguments: arguments.to_owned(),
        },
    }
}
