//! Tool calls, their results, and the extractor and validator working on them.

use crate::{JsonValue, Map};
use serde::{Deserialize, Deserializer, Serialize};

mod extract;
mod validate;

pub use extract::{CALL_CLOSE, CALL_OPEN, Extraction, MalformedBlock, extract_calls};
pub use validate::{CallValidator, Diagnostic, DiagnosticKind, ValueKind};

/// A `{name, arguments}` request embedded in generated text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the called function, or the reply sentinel.
    pub name: String,
    /// Arguments keyed by parameter name.
    #[serde(
        default,
        alias = "parameters",
        alias = "args",
        deserialize_with = "nullable_map"
    )]
    pub arguments: Map,
}

impl ToolCall {
    /// Creates a new call.
    pub fn new(name: impl Into<String>, arguments: Map) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Returns `true` if the call names the given sentinel.
    #[inline]
    pub fn is_sentinel(&self, sentinel: &str) -> bool {
        self.name == sentinel
    }
}

/// Outcome of executing one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Name of the executed function.
    pub name: String,
    /// Arguments the function was executed with.
    #[serde(default, alias = "parameters", deserialize_with = "nullable_map")]
    pub arguments: Map,
    /// Returned value.
    #[serde(rename = "return", default)]
    pub output: JsonValue,
    /// Whether the function mutates state. Never rendered into protocol text.
    #[serde(default, alias = "isAction", skip_serializing)]
    pub is_action: bool,
}

impl ToolResult {
    /// Creates a result for a read-only tool.
    pub fn new(name: impl Into<String>, arguments: Map, output: JsonValue) -> Self {
        Self {
            name: name.into(),
            arguments,
            output,
            is_action: false,
        }
    }

    /// Marks the result as coming from a state-mutating action.
    #[inline]
    pub fn into_action(mut self) -> Self {
        self.is_action = true;
        self
    }

    /// Returns the call that produced this result.
    pub fn call(&self) -> ToolCall {
        ToolCall::new(self.name.clone(), self.arguments.clone())
    }
}

fn nullable_map<'de, D>(deserializer: D) -> Result<Map, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Map>::deserialize(deserializer).map(Option::unwrap_or_default)
}
