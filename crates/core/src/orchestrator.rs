//! The tool-calling agent loop.
//!
//! The loop is an explicit state machine over a bounded counter: ask the
//! model with tools attached; if the selected candidate requests tool
//! calls, execute them all concurrently and feed the results back;
//! otherwise the response is final. Once the iteration budget is spent,
//! one last request with the tool catalog omitted forces a plain answer,
//! so the loop terminates even against an adversarial model or an
//! unproductive tool set.


use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::{Map, Value};
use verse_relay_model::{
    ChatBackend, ChatMessage, ChatRequest, ChatResponse, ToolCall,
};

use crate::capability::{self, CapabilityPolicy};
use crate::catalog::ToolDescriptor;
use crate::error::{OrchestrateError, ToolCallError};
use crate::translate;
use crate::upstream::UpstreamClient;

/// Knobs for one orchestrator instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Maximum tool-executing round-trips before forcing a plain
    /// answer.
    pub max_iterations: u32,
    /// Argument fields set unconditionally on every invocation,
    /// overwriting whatever the model supplied. Used to pin values the
    /// caller must not influence, such as a fixed locale.
    pub argument_overrides: Map<String, Value>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            argument_overrides: Map::new(),
        }
    }
}

/// Drives the agent loop against one chat backend and one upstream
/// tool-resource server.
///
/// One orchestrator serves one request at a time end to end; the only
/// state shared across requests is the upstream client's catalog cache,
/// which is read-only after population.
pub struct Orchestrator<B> {
    backend: B,
    upstream: Arc<UpstreamClient>,
    policy: CapabilityPolicy,
    config: OrchestratorConfig,
}

impl<B: ChatBackend> Orchestrator<B> {
    /// Creates an orchestrator.
    pub fn new(
        backend: B,
        upstream: Arc<UpstreamClient>,
        policy: CapabilityPolicy,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            backend,
            upstream,
            policy,
            config,
        }
    }

    /// Runs one chat-completion request to a final response.
    ///
    /// The caller's request passes through unmodified except for
    /// `messages` and `tools`, which the orchestrator owns: the
    /// transcript grows by appending assistant and tool messages, and
    /// `tools` is replaced with the restricted catalog.
    pub async fn run(
        &self,
        request: ChatRequest,
    ) -> Result<ChatResponse, OrchestrateError> {
        let catalog = self
            .upstream
            .list_tools()
            .await
            .map_err(OrchestrateError::Upstream)?;
        let restricted = capability::restrict(&catalog, &self.policy);
        let declarations: Vec<_> =
            restricted.iter().map(translate::tool_declaration).collect();

        let mut req = request;
        req.tools = if declarations.is_empty() {
            None
        } else {
            Some(declarations)
        };

        for round in 0..self.config.max_iterations {
            let resp = self.complete(&req).await?;

            // Tie-break for `n > 1`: the first candidate that requests
            // tool calls drives execution. When no candidate does, the
            // response is final and every candidate is returned
            // untouched.
            let Some(choice) =
                resp.choices.iter().find(|choice| choice.has_tool_calls())
            else {
                return Ok(resp);
            };

            let assistant = choice.message.clone();
            let calls: Vec<ToolCall> = assistant.tool_calls().to_vec();
            debug!(round, calls = calls.len(), "executing tool calls");

            // The assistant message must precede its tool results in
            // the transcript; appending it first keeps every
            // `tool_call_id` anchored to the request that produced it.
            req.messages.push(assistant);
            let results = join_all(
                calls
                    .iter()
                    .map(|call| self.execute_call(call, &restricted)),
            )
            .await;
            req.messages.extend(results);
        }

        // Budget exhausted while the model still wants tools: one final
        // request without any catalog forces a best-effort plain
        // answer.
        warn!(
            max_iterations = self.config.max_iterations,
            "iteration budget exhausted, forcing a final answer"
        );
        req.tools = None;
        req.tool_choice = None;
        self.complete(&req).await
    }

    async fn complete(
        &self,
        req: &ChatRequest,
    ) -> Result<ChatResponse, OrchestrateError> {
        self.backend.complete(req).await.map_err(|err| {
            error!("chat endpoint failed: {err}");
            OrchestrateError::Backend(Box::new(err))
        })
    }

    /// Executes one requested call, yielding the tool-role message to
    /// append.
    ///
    /// Failures are contained: they render as error text in the message
    /// instead of aborting sibling calls or the loop, so the model can
    /// react to them on its next turn.
    async fn execute_call(
        &self,
        call: &ToolCall,
        catalog: &[ToolDescriptor],
    ) -> ChatMessage {
        match self.try_execute(call, catalog).await {
            Ok(raw) => translate::result_message(&call.id, &raw),
            Err(err) => {
                warn!(tool = %call.function.name, "tool call failed: {err}");
                ChatMessage::Tool {
                    tool_call_id: call.id.clone(),
                    content: format!("Error: {err}"),
                }
            }
        }
    }

    async fn try_execute(
        &self,
        call: &ToolCall,
        catalog: &[ToolDescriptor],
    ) -> Result<Value, ToolCallError> {
        let mut invocation = translate::parse_tool_call(call)?;

        if !self.policy.is_allowed(&invocation.tool_name) {
            return Err(ToolCallError::Disabled {
                tool: invocation.tool_name,
            });
        }
        let Some(descriptor) =
            catalog.iter().find(|d| d.name == invocation.tool_name)
        else {
            return Err(ToolCallError::NotFound {
                tool: invocation.tool_name,
            });
        };

        // Overrides win over whatever the model supplied.
        for (field, value) in &self.config.argument_overrides {
            invocation.arguments.insert(field.clone(), value.clone());
        }
        check_required(descriptor, &invocation.arguments)?;

        let raw = self
            .upstream
            .invoke_tool(
                &invocation.tool_name,
                Value::Object(invocation.arguments),
            )
            .await
            .map_err(|source| ToolCallError::Upstream {
                tool: invocation.tool_name.clone(),
                source,
            })?;

        Ok(if self.policy.suppress_broad_annotations {
            capability::suppress_annotations(
                raw,
                capability::is_broad_annotation,
            )
        } else {
            raw
        })
    }
}

fn check_required(
    descriptor: &ToolDescriptor,
    arguments: &Map<String, Value>,
) -> Result<(), ToolCallError> {
    let missing: Vec<String> = descriptor
        .input_schema
        .get("required")
        .and_then(Value::as_array)
        .map(|required| {
            required
                .iter()
                .filter_map(Value::as_str)
                .filter(|name| !arguments.contains_key(*name))
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ToolCallError::InvalidArguments {
            tool: descriptor.name.clone(),
            missing,
        })
    }
}
