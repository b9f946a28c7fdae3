use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single message in a conversation transcript.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    /// The system instructions.
    System {
        /// The instruction text.
        content: String,
    },
    /// A user input text.
    User {
        /// The input text.
        content: String,
    },
    /// An assistant turn, possibly carrying tool call requests.
    Assistant {
        /// The assistant text, absent when the turn is tool calls only.
        #[serde(default)]
        content: Option<String>,
        /// Tool calls requested by this turn.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,
    },
    /// A tool call result.
    Tool {
        /// The `id` of the [`ToolCall`] this message answers.
        tool_call_id: String,
        /// The flattened result text.
        content: String,
    },
}

impl ChatMessage {
    /// Returns the tool calls requested by this message.
    ///
    /// Only assistant messages can carry tool calls; every other role
    /// yields an empty slice.
    #[inline]
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            ChatMessage::Assistant {
                tool_calls: Some(calls),
                ..
            } => calls,
            _ => &[],
        }
    }
}

/// A tool call requested by the model.
///
/// The `id` is opaque and assigned by the endpoint; it only has to be
/// echoed back in the matching tool-role message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// The unique identifier for this call.
    pub id: String,
    /// The call type, `"function"` for every tool this relay handles.
    pub r#type: String,
    /// The function being called.
    pub function: FunctionCall,
}

/// The function half of a [`ToolCall`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// The name of the tool to call.
    pub name: String,
    /// The arguments as a serialized JSON string, exactly as the model
    /// emitted them. Parsing is deferred to the protocol translator so
    /// that a malformed payload can be reported back to the model.
    pub arguments: String,
}

/// Declares a tool to the endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDecl {
    /// The declaration type, always `"function"`.
    pub r#type: String,
    /// The declared function.
    pub function: FunctionDecl,
}

impl ToolDecl {
    /// Wraps a function declaration in the `"function"` envelope.
    #[inline]
    pub fn function(function: FunctionDecl) -> Self {
        Self {
            r#type: "function".to_owned(),
            function,
        }
    }
}

/// Describes a callable function to the endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDecl {
    /// Name of the function.
    pub name: String,
    /// Description of the function.
    pub description: String,
    /// Parameters definition as a [JSON schema](https://json-schema.org/).
    pub parameters: Value,
}

/// A chat-completion request.
///
/// `messages` and `tools` are owned by the orchestrator; everything the
/// caller supplied beyond the named fields is carried in `extra` and
/// passed through to the endpoint unmodified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model to use.
    pub model: String,
    /// The conversation so far.
    pub messages: Vec<ChatMessage>,
    /// Tools available to the model. Omitted entirely when empty, which
    /// forces a plain text answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDecl>>,
    /// The caller's tool-choice directive, passed through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    /// Number of candidate completions to request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    /// Any other caller-supplied parameters (temperature, stop sequences,
    /// response format directives, ...), passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatRequest {
    /// Creates a request with the given model and messages and no other
    /// parameters.
    pub fn new<S: Into<String>>(model: S, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: None,
            tool_choice: None,
            n: None,
            extra: Map::new(),
        }
    }
}

/// A chat-completion response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The endpoint-assigned response id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The candidate completions, one per requested `n`.
    pub choices: Vec<Choice>,
    /// Token accounting, when the endpoint reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Any other endpoint-reported fields, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One candidate completion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Position of this candidate in the response.
    pub index: u32,
    /// The completion message, an assistant turn.
    pub message: ChatMessage,
    /// Why the endpoint stopped generating this candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl Choice {
    /// Whether this candidate requests any tool calls.
    #[inline]
    pub fn has_tool_calls(&self) -> bool {
        !self.message.tool_calls().is_empty()
    }
}

/// Token accounting for one request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt.
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Tokens generated by the completion.
    #[serde(default)]
    pub completion_tokens: u32,
    /// Total tokens billed.
    #[serde(default)]
    pub total_tokens: u32,
}
