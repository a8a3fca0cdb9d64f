use super::ToolCall;
use crate::JsonValue;
use crate::registry::SchemaSet;
use crate::schema::JsonType;
use std::fmt;

/// Runtime kind of a JSON value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `null`
    Null,
    /// `true` or `false`
    Boolean,
    /// Integer or floating point number.
    Number,
    /// String.
    String,
    /// Array.
    Array,
    /// Object.
    Object,
}

impl ValueKind {
    /// Returns the kind of `value`.
    pub fn of(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => ValueKind::Null,
            JsonValue::Bool(_) => ValueKind::Boolean,
            JsonValue::Number(_) => ValueKind::Number,
            JsonValue::String(_) => ValueKind::String,
            JsonValue::Array(_) => ValueKind::Array,
            JsonValue::Object(_) => ValueKind::Object,
        }
    }

    /// Returns the runtime kind a declared type is checked against.
    ///
    /// Only `string`, `number`, `boolean`, `object` and `array` are checked;
    /// `integer` and unknown declarations are accepted as-is.
    pub fn expected_for(declared: &JsonType) -> Option<Self> {
        match declared {
            JsonType::String => Some(ValueKind::String),
            JsonType::Number => Some(ValueKind::Number),
            JsonType::Boolean => Some(ValueKind::Boolean),
            JsonType::Object => Some(ValueKind::Object),
            JsonType::Array => Some(ValueKind::Array),
            JsonType::Integer | JsonType::Other(_) => None,
        }
    }

    /// Returns the kind name.
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What is wrong with a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// The called function is not in the schema set.
    UnknownFunction,
    /// An argument is not declared by the schema.
    UnexpectedArgument {
        /// Argument name.
        argument: String,
    },
    /// An argument value does not have the declared type.
    TypeMismatch {
        /// Argument name.
        argument: String,
        /// Declared type.
        expected: JsonType,
        /// Kind of the supplied value.
        actual: ValueKind,
    },
}

/// A non-fatal schema anomaly found in one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Identifier of the dataset entry, for corpus validation.
    pub entry_id: Option<String>,
    /// Zero-based position of the call.
    pub call_index: usize,
    /// Name of the called function.
    pub function: String,
    /// The anomaly.
    pub kind: DiagnosticKind,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(entry_id) = &self.entry_id {
            write!(f, "[entry {entry_id}] ")?;
        }
        let position = self.call_index + 1;
        let function = &self.function;
        match &self.kind {
            DiagnosticKind::UnknownFunction => {
                write!(f, "call #{position}: unknown function `{function}`")
            }
            DiagnosticKind::UnexpectedArgument { argument } => {
                write!(
                    f,
                    "call #{position} to `{function}`: unexpected argument `{argument}`"
                )
            }
            DiagnosticKind::TypeMismatch {
                argument,
                expected,
                actual,
            } => write!(
                f,
                "call #{position} to `{function}`: argument `{argument}` expects {expected} but got {actual}"
            ),
        }
    }
}

/// Checks calls against a schema set.
///
/// The validator never drops or alters calls; it only reports [`Diagnostic`]s.
#[derive(Debug, Clone, Copy)]
pub struct CallValidator<'a> {
    schemas: &'a SchemaSet,
    sentinel: Option<&'a str>,
}

impl<'a> CallValidator<'a> {
    /// Creates a validator over `schemas`.
    #[inline]
    pub fn new(schemas: &'a SchemaSet) -> Self {
        Self {
            schemas,
            sentinel: None,
        }
    }

    /// Accepts calls to the reply sentinel without a schema.
    #[inline]
    pub fn with_sentinel(mut self, sentinel: &'a str) -> Self {
        self.sentinel = Some(sentinel);
        self
    }

    /// Validates every call, correlating diagnostics with `entry_id`.
    pub fn validate(&self, calls: &[ToolCall], entry_id: Option<&str>) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for (call_index, call) in calls.iter().enumerate() {
            let mut report = |kind| {
                diagnostics.push(Diagnostic {
                    entry_id: entry_id.map(ToOwned::to_owned),
                    call_index,
                    function: call.name.clone(),
                    kind,
                })
            };
            if self.sentinel.is_some_and(|sentinel| call.is_sentinel(sentinel)) {
                continue;
            }
            let Some(schema) = self.schemas.get(&call.name) else {
                report(DiagnosticKind::UnknownFunction);
                continue;
            };
            for (argument, value) in &call.arguments {
                let Some(parameter) = schema.parameters.get(argument) else {
                    report(DiagnosticKind::UnexpectedArgument {
                        argument: argument.clone(),
                    });
                    continue;
                };
                let actual = ValueKind::of(value);
                if ValueKind::expected_for(&parameter.kind).is_some_and(|expected| expected != actual)
                {
                    report(DiagnosticKind::TypeMismatch {
                        argument: argument.clone(),
                        expected: parameter.kind.clone(),
                        actual,
                    });
                }
            }
        }
        for diagnostic in &diagnostics {
            tracing::warn!(
                entry_id = diagnostic.entry_id.as_deref(),
                call_index = diagnostic.call_index,
                function = %diagnostic.function,
                "{diagnostic}"
            );
        }
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FunctionSchema, ParameterSchema, Parameters};
    use indexmap::IndexMap;
    use serde_json::json;

    fn schemas() -> SchemaSet {
        let mut properties = IndexMap::new();
        properties.insert(
            "lesson_name".to_owned(),
            ParameterSchema::of(JsonType::String).with_description("The lesson name."),
        );
        properties.insert("seats".to_owned(), ParameterSchema::of(JsonType::Integer));
        properties.insert(
            "tags".to_owned(),
            ParameterSchema::array_of(ParameterSchema::of(JsonType::String)),
        );
        let select = FunctionSchema::new("select", "Select a lesson.", Parameters::new(properties));
        SchemaSet::untagged([select])
    }

    fn call(value: JsonValue) -> ToolCall {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn reports_unexpected_argument_only() {
        let schemas = schemas();
        let calls = [call(json!({"name": "select", "arguments": {"lesson_name": "x", "extra": 1}}))];
        let diagnostics = CallValidator::new(&schemas).validate(&calls, Some("7"));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].kind,
            DiagnosticKind::UnexpectedArgument {
                argument: "extra".to_owned()
            }
        );
        assert_eq!(diagnostics[0].entry_id.as_deref(), Some("7"));
        assert_eq!(
            diagnostics[0].to_string(),
            "[entry 7] call #1 to `select`: unexpected argument `extra`"
        );
    }

    #[test]
    fn reports_type_mismatch_and_unknown_function() {
        let schemas = schemas();
        let calls = [
            call(json!({"name": "dance", "arguments": {}})),
            call(json!({"name": "select", "arguments": {"lesson_name": 3, "seats": "two", "tags": "a"}})),
        ];
        let diagnostics = CallValidator::new(&schemas).validate(&calls, None);
        assert_eq!(diagnostics.len(), 3);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::UnknownFunction);
        assert_eq!(diagnostics[0].call_index, 0);
        assert!(diagnostics[1..].iter().all(|d| d.call_index == 1));
        assert!(diagnostics.iter().all(|d| !matches!(
            &d.kind,
            DiagnosticKind::TypeMismatch { argument, .. } if argument == "seats"
        )));
        assert_eq!(
            diagnostics[2].kind,
            DiagnosticKind::TypeMismatch {
                argument: "tags".to_owned(),
                expected: JsonType::Array,
                actual: ValueKind::String,
            }
        );
    }

    #[test]
    fn sentinel_is_accepted_when_configured() {
        let schemas = schemas();
        let calls = [call(json!({"name": "reply", "arguments": {}}))];
        assert_eq!(CallValidator::new(&schemas).validate(&calls, None).len(), 1);
        assert!(
            CallValidator::new(&schemas)
                .with_sentinel("reply")
                .validate(&calls, None)
                .is_empty()
        );
    }
}
