//! Renders issued calls and their results back into protocol text.

use crate::call::{CALL_CLOSE, CALL_OPEN, ToolCall, ToolResult};
use crate::json::to_spaced_string;
use serde::Serialize;

/// Opening tag of a response block.
pub const RESPONSE_OPEN: &str = "<tool_response>";

/// Closing tag of a response block.
pub const RESPONSE_CLOSE: &str = "</tool_response>";

/// Renders each call as a `<tool_call>` block, one block per line group.
pub fn format_calls(calls: &[ToolCall]) -> Result<String, serde_json::Error> {
    format_blocks(calls, CALL_OPEN, CALL_CLOSE)
}

/// Renders each result as a `<tool_response>` block carrying name, arguments and return value.
pub fn format_responses(results: &[ToolResult]) -> Result<String, serde_json::Error> {
    format_blocks(results, RESPONSE_OPEN, RESPONSE_CLOSE)
}

/// Renders the call blocks followed by the response blocks.
///
/// Empty input renders as empty text.
pub fn format_exchange(
    calls: &[ToolCall],
    results: &[ToolResult],
) -> Result<String, serde_json::Error> {
    let request = format_calls(calls)?;
    let response = format_responses(results)?;
    Ok(match (request.is_empty(), response.is_empty()) {
        (true, _) => response,
        (_, true) => request,
        _ => format!("{request}\n{response}"),
    })
}

fn format_blocks<T: Serialize>(
    items: &[T],
    open: &str,
    close: &str,
) -> Result<String, serde_json::Error> {
    let mut blocks = Vec::with_capacity(items.len());
    for item in items {
        let body = to_spaced_string(item)?;
        blocks.push(format!("{open}\n{body}\n{close}"));
    }
    Ok(blocks.join("\n"))
}
