//! Error types shared across the orchestration engine.

use std::error::Error as StdError;
use std::fmt::{self, Display};

use verse_relay_model::BackendError;

use crate::upstream::UpstreamError;

/// A failure executing one tool call.
///
/// These never abort the agent loop: the orchestrator renders them into
/// tool-result messages so the model can see the failure and react on
/// its next turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolCallError {
    /// The tool is outside the caller's allow-list.
    Disabled {
        /// The requested tool.
        tool: String,
    },
    /// The tool is not present in the current catalog.
    NotFound {
        /// The requested tool.
        tool: String,
    },
    /// The model emitted an argument payload that is not a JSON object.
    MalformedArguments {
        /// The requested tool.
        tool: String,
        /// Parser diagnostics, quoted back to the model.
        reason: String,
    },
    /// The arguments decode fine but required fields are missing.
    InvalidArguments {
        /// The requested tool.
        tool: String,
        /// The missing required field names.
        missing: Vec<String>,
    },
    /// The upstream call itself failed.
    Upstream {
        /// The requested tool.
        tool: String,
        /// The upstream failure.
        source: UpstreamError,
    },
}

impl Display for ToolCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolCallError::Disabled { tool } => {
                write!(f, "tool '{tool}' is not enabled for this caller")
            }
            ToolCallError::NotFound { tool } => {
                write!(f, "tool '{tool}' does not exist in the catalog")
            }
            ToolCallError::MalformedArguments { tool, reason } => {
                write!(
                    f,
                    "arguments for tool '{tool}' are not a valid JSON \
                     object: {reason}"
                )
            }
            ToolCallError::InvalidArguments { tool, missing } => {
                write!(
                    f,
                    "tool '{tool}' call is missing required arguments: {}",
                    missing.join(", ")
                )
            }
            ToolCallError::Upstream { tool, source } => {
                write!(f, "tool '{tool}' failed: {source}")
            }
        }
    }
}

impl StdError for ToolCallError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ToolCallError::Upstream { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// A terminal failure for one whole chat-completion request.
///
/// Partial progress (the transcript built so far) is discarded; there
/// is no partial-response delivery.
#[derive(Debug)]
pub enum OrchestrateError {
    /// The chat endpoint failed. The provider's status and message are
    /// preserved for the caller.
    Backend(Box<dyn BackendError>),
    /// The tool catalog could not be fetched before the first
    /// iteration.
    Upstream(UpstreamError),
}

impl Display for OrchestrateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestrateError::Backend(err) => {
                write!(f, "chat endpoint failed: {err}")
            }
            OrchestrateError::Upstream(err) => write!(f, "{err}"),
        }
    }
}

impl StdError for OrchestrateError {}
