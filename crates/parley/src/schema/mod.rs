//! Function schemas and the docstring compiler producing them.
//!
//! A [`FunctionSchema`] is the JSON shape listed to the model inside `<tools>`:
//!
//! ```json
//! {"name": "select", "description": "...", "parameters": {"type": "object", "properties": {...}}}
//! ```
//!
//! Schemas without parameters serialize `parameters` as `{}`.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

mod compiler;

pub use compiler::{compile, resolve_type};

/// JSON types a parameter may declare.
///
/// Types outside the six protocol types only show up in stored datasets;
/// they are kept verbatim as [`JsonType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JsonType {
    /// `string`
    String,
    /// `integer`
    Integer,
    /// `number`
    Number,
    /// `boolean`
    Boolean,
    /// `object`
    Object,
    /// `array`
    Array,
    /// Any other declared type name.
    Other(String),
}

impl JsonType {
    /// Returns the type name as written in the schema.
    pub fn as_str(&self) -> &str {
        match self {
            JsonType::String => "string",
            JsonType::Integer => "integer",
            JsonType::Number => "number",
            JsonType::Boolean => "boolean",
            JsonType::Object => "object",
            JsonType::Array => "array",
            JsonType::Other(name) => name,
        }
    }
}

impl From<String> for JsonType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "string" => JsonType::String,
            "integer" => JsonType::Integer,
            "number" => JsonType::Number,
            "boolean" => JsonType::Boolean,
            "object" => JsonType::Object,
            "array" => JsonType::Array,
            _ => JsonType::Other(name),
        }
    }
}

impl From<JsonType> for String {
    fn from(json_type: JsonType) -> Self {
        match json_type {
            JsonType::Other(name) => name,
            _ => json_type.as_str().to_owned(),
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema of one parameter, or of the element type of an array parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Declared JSON type.
    #[serde(rename = "type")]
    pub kind: JsonType,
    /// Element schema when `kind` is [`JsonType::Array`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ParameterSchema>>,
    /// Parameter description; absent on array element schemas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParameterSchema {
    /// Creates a schema of the given type without description.
    #[inline]
    pub fn of(kind: JsonType) -> Self {
        Self {
            kind,
            items: None,
            description: None,
        }
    }

    /// Creates an array schema with the given element schema.
    #[inline]
    pub fn array_of(items: ParameterSchema) -> Self {
        Self {
            kind: JsonType::Array,
            items: Some(Box::new(items)),
            description: None,
        }
    }

    /// Attaches a description.
    #[inline]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The `parameters` member of a function schema.
///
/// Serialized as `{"type": "object", "properties": {...}}`, or `{}` when empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawParameters", into = "RawParameters")]
pub struct Parameters {
    properties: IndexMap<String, ParameterSchema>,
}

impl Parameters {
    /// Creates parameters from an ordered property list.
    pub fn new(properties: IndexMap<String, ParameterSchema>) -> Self {
        Self { properties }
    }

    /// Returns the parameter schema for `name`.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&ParameterSchema> {
        self.properties.get(name)
    }

    /// Returns `true` if a parameter called `name` is declared.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Iterates over parameters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterSchema)> {
        self.properties.iter().map(|(name, schema)| (name.as_str(), schema))
    }

    /// Returns the number of parameters.
    #[inline]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Returns `true` if no parameter is declared.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

#[derive(Serialize, Deserialize)]
struct RawParameters {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    properties: IndexMap<String, ParameterSchema>,
}

impl From<RawParameters> for Parameters {
    fn from(raw: RawParameters) -> Self {
        Self::new(raw.properties)
    }
}

impl From<Parameters> for RawParameters {
    fn from(parameters: Parameters) -> Self {
        let kind = (!parameters.is_empty()).then(|| "object".to_owned());
        Self {
            kind,
            properties: parameters.properties,
        }
    }
}

/// Structured call schema of one function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSchema {
    /// Function name, unique within a registry.
    pub name: String,
    /// One-line description.
    #[serde(default)]
    pub description: String,
    /// Declared parameters.
    #[serde(default, deserialize_with = "nullable_parameters")]
    pub parameters: Parameters,
}

impl FunctionSchema {
    /// Creates a schema, collapsing the description onto one line.
    pub fn new(name: impl Into<String>, description: &str, parameters: Parameters) -> Self {
        Self {
            name: name.into(),
            description: crate::json::squash_whitespace(description),
            parameters,
        }
    }

    /// Compiles a schema from a function docstring.
    #[inline]
    pub fn from_docstring(name: &str, docstring: &str) -> Self {
        compile(name, docstring)
    }

    /// Returns the `{name, description}` summary listed after a call was made.
    pub fn summary(&self) -> FunctionSummary<'_> {
        FunctionSummary {
            name: &self.name,
            description: &self.description,
        }
    }
}

/// Name and description of a function, without parameters.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FunctionSummary<'a> {
    /// Function name.
    pub name: &'a str,
    /// One-line description.
    pub description: &'a str,
}

fn nullable_parameters<'de, D>(deserializer: D) -> Result<Parameters, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Parameters>::deserialize(deserializer).map(Option::unwrap_or_default)
}
