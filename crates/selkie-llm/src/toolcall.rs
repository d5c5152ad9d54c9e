//! Prompted tool-call extraction
//!
//! Providers without native function calling are instructed to emit
//! `<tool_call>{…json…}</tool_call>` blocks. This scanner walks the model
//! output once, pulls out every well-formed block and preserves everything
//! else as ordinary content. A block whose payload is not valid JSON is left
//! in the text untouched; malformed model output must never raise.

use crate::types::ToolCallRequest;
use serde_json::Value;

const OPEN_TAG: &str = "<tool_call>";
const CLOSE_TAG: &str = "</tool_call>";

/// Result of scanning model output for prompted tool calls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedCalls {
    /// Content with well-formed call blocks removed
    pub content: String,
    /// Parsed calls in order of appearance
    pub calls: Vec<ToolCallRequest>,
}

/// Scan `text` for `<tool_call>` blocks
pub fn extract_tool_calls(text: &str) -> ExtractedCalls {
    let mut content = String::with_capacity(text.len());
    let mut calls = Vec::new();
    let mut rest = text;

    loop {
        let Some(open) = rest.find(OPEN_TAG) else {
            content.push_str(rest);
            break;
        };

        let after_open = &rest[open + OPEN_TAG.len()..];
        let Some(close) = after_open.find(CLOSE_TAG) else {
            // Unterminated block: treat the remainder as text
            content.push_str(rest);
            break;
        };

        let payload = after_open[..close].trim();
        let after_close = &after_open[close + CLOSE_TAG.len()..];

        match parse_call(payload, calls.len()) {
            Some(call) => {
                content.push_str(&rest[..open]);
                calls.push(call);
            }
            None => {
                // Malformed JSON inside the block: keep the block as text
                content.push_str(&rest[..open + OPEN_TAG.len() + close + CLOSE_TAG.len()]);
            }
        }

        rest = after_close;
    }

    ExtractedCalls {
        content: content.trim().to_string(),
        calls,
    }
}

/// Parse one block payload into a call
///
/// Accepts `{"name": …, "arguments": {…}}` and the `{"tool": …, "params":
/// {…}}` variant some models produce.
fn parse_call(payload: &str, index: usize) -> Option<ToolCallRequest> {
    let value: Value = serde_json::from_str(payload).ok()?;

    let name = value
        .get("name")
        .or_else(|| value.get("tool"))
        .and_then(|v| v.as_str())?
        .to_string();
    let arguments = value
        .get("arguments")
        .or_else(|| value.get("params"))
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default()));

    Some(ToolCallRequest {
        id: format!("call_{}", index),
        name,
        arguments,
    })
}

/// Render tool definitions into the prompt preamble for the prompted
/// protocol
pub fn render_tool_prompt(tools: &[crate::types::ToolDefinition]) -> String {
    let mut lines = vec![
        "You can call tools. To call one, reply with exactly:".to_string(),
        "<tool_call>{\"name\": \"tool_name\", \"arguments\": {…}}</tool_call>".to_string(),
        "If no tool is needed, reply normally.".to_string(),
        String::new(),
        "Available tools:".to_string(),
    ];

    for tool in tools {
        lines.push(format!("- {}: {}", tool.name, tool.description));
        if let Some(properties) = tool.parameters.get("properties").and_then(|p| p.as_object()) {
            for (name, prop) in properties {
                let description = prop
                    .get("description")
                    .and_then(|d| d.as_str())
                    .unwrap_or("");
                lines.push(format!("    {}: {}", name, description));
            }
        }
    }

    lines.join("\n")
}
