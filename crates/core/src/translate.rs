//! Stateless translation between the upstream descriptor/call/result
//! shapes and the chat endpoint's function-calling shapes.

use serde_json::{Map, Value};
use verse_relay_model::{ChatMessage, FunctionDecl, ToolCall, ToolDecl};

use crate::catalog::ToolDescriptor;
use crate::error::ToolCallError;

/// Maps an upstream descriptor to a function declaration.
///
/// The descriptor's JSON schema is passed through verbatim as the
/// parameter schema.
pub fn tool_declaration(descriptor: &ToolDescriptor) -> ToolDecl {
    ToolDecl::function(FunctionDecl {
        name: descriptor.name.clone(),
        description: descriptor.description.clone(),
        parameters: descriptor.input_schema.clone(),
    })
}

/// A parsed tool invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    /// The tool to invoke.
    pub tool_name: String,
    /// The decoded argument object.
    pub arguments: Map<String, Value>,
}

/// Parses the serialized argument payload of one tool call.
///
/// A payload that is not valid JSON, or decodes to something other than
/// an object, is a recoverable [`ToolCallError`]: the caller reports it
/// back to the model as a tool result so the model can correct itself on
/// the next turn. An empty payload means no arguments.
pub fn parse_tool_call(call: &ToolCall) -> Result<Invocation, ToolCallError> {
    let tool_name = call.function.name.clone();
    let raw = call.function.arguments.trim();
    if raw.is_empty() {
        return Ok(Invocation {
            tool_name,
            arguments: Map::new(),
        });
    }

    let value: Value = serde_json::from_str(raw).map_err(|err| {
        ToolCallError::MalformedArguments {
            tool: tool_name.clone(),
            reason: err.to_string(),
        }
    })?;
    let Value::Object(arguments) = value else {
        return Err(ToolCallError::MalformedArguments {
            tool: tool_name,
            reason: "payload is not a JSON object".to_owned(),
        });
    };
    Ok(Invocation {
        tool_name,
        arguments,
    })
}

/// Builds the tool-role message answering `call_id` from a raw upstream
/// result.
pub fn result_message(call_id: &str, raw: &Value) -> ChatMessage {
    ChatMessage::Tool {
        tool_call_id: call_id.to_owned(),
        content: flatten_content(raw),
    }
}

/// Flattens an upstream result into plain text.
///
/// The upstream convention is a `content` array of typed blocks; the
/// text blocks are joined with a blank line. A result without
/// recognizable text blocks is embedded as compact JSON so nothing is
/// silently dropped.
pub fn flatten_content(raw: &Value) -> String {
    if let Some(blocks) = raw.get("content").and_then(Value::as_array) {
        let texts: Vec<&str> = blocks
            .iter()
            .filter(|block| {
                block.get("type").and_then(Value::as_str) == Some("text")
            })
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect();
        if !texts.is_empty() {
            return texts.join("\n\n");
        }
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use verse_relay_model::FunctionCall;

    use super::*;

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_owned(),
            r#type: "function".to_owned(),
            function: FunctionCall {
                name: name.to_owned(),
                arguments: arguments.to_owned(),
            },
        }
    }

    #[test]
    fn test_tool_declaration_passes_schema_verbatim() {
        let schema = json!({
            "type": "object",
            "properties": { "reference": { "type": "string" } },
            "required": ["reference"],
        });
        let descriptor = ToolDescriptor {
            name: "fetch_scripture".to_owned(),
            description: "Fetches a passage".to_owned(),
            input_schema: schema.clone(),
        };

        let decl = tool_declaration(&descriptor);
        assert_eq!(decl.r#type, "function");
        assert_eq!(decl.function.name, "fetch_scripture");
        assert_eq!(decl.function.parameters, schema);
    }

    #[test]
    fn test_parse_tool_call() {
        let invocation =
            parse_tool_call(&call("fetch_scripture", r#"{"reference":"JHN.3.16"}"#))
                .unwrap();
        assert_eq!(invocation.tool_name, "fetch_scripture");
        assert_eq!(invocation.arguments["reference"], json!("JHN.3.16"));
    }

    #[test]
    fn test_parse_tool_call_empty_payload() {
        let invocation = parse_tool_call(&call("list_bibles", "")).unwrap();
        assert!(invocation.arguments.is_empty());
    }

    #[test]
    fn test_parse_tool_call_malformed() {
        let err = parse_tool_call(&call("fetch_scripture", "{not json"))
            .unwrap_err();
        assert!(matches!(
            err,
            ToolCallError::MalformedArguments { ref tool, .. }
                if tool == "fetch_scripture"
        ));

        let err =
            parse_tool_call(&call("fetch_scripture", "[1, 2]")).unwrap_err();
        assert!(matches!(err, ToolCallError::MalformedArguments { .. }));
    }

    #[test]
    fn test_result_message_flattens_text_blocks() {
        let raw = json!({
            "content": [
                { "type": "text", "text": "John 3:16" },
                { "type": "image", "url": "ignored" },
                { "type": "text", "text": "For God so loved the world..." },
            ],
        });
        let msg = result_message("call_1", &raw);
        assert_eq!(
            msg,
            ChatMessage::Tool {
                tool_call_id: "call_1".to_owned(),
                content: "John 3:16\n\nFor God so loved the world..."
                    .to_owned(),
            }
        );
    }

    #[test]
    fn test_result_message_raw_fallback() {
        let raw = json!({ "items": [], "total": 0 });
        let msg = result_message("call_2", &raw);
        let ChatMessage::Tool { content, .. } = msg else {
            panic!("not a tool message");
        };
        assert_eq!(
            serde_json::from_str::<Value>(&content).unwrap(),
            raw
        );
    }
}
