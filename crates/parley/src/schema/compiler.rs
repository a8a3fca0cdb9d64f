//! Docstring to schema compiler.
//!
//! Compilation runs in two passes. The section splitter cuts the docstring into
//! a description, a `Parameters` block and an ignored `Returns` block. The
//! parameter scanner then classifies every line of the block as either a
//! declaration (`name : type`) or continuation text of the open declaration.
//!
//! Compilation never fails: unknown types resolve to `string` and missing
//! sections yield an empty description or no parameters.

use super::{FunctionSchema, JsonType, ParameterSchema, Parameters};
use crate::json::squash_whitespace;
use indexmap::IndexMap;

/// Compiles the docstring of the function `name` into a [`FunctionSchema`].
pub fn compile(name: &str, docstring: &str) -> FunctionSchema {
    let sections = Sections::split(docstring);
    let description = sections.description.join("\n");
    let properties = scan_parameters(&sections.parameters);
    if properties.is_empty() {
        tracing::trace!(function = name, "docstring declares no parameters");
    }
    FunctionSchema::new(name, &description, Parameters::new(properties))
}

/// Resolves the type text of a declaration into a parameter schema.
///
/// Handles `optional[X]`, `list[X]`/`sequence[X]`/`array[X]`,
/// `list of X`/`sequence of X`/`array of X` and the primitive type names.
pub fn resolve_type(type_text: &str) -> ParameterSchema {
    let cleaned = clean_type(type_text);
    let mut text = cleaned.as_str();
    if text.is_empty() {
        return ParameterSchema::of(JsonType::String);
    }
    if let Some(inner) = text
        .strip_prefix("optional[")
        .and_then(|rest| rest.strip_suffix(']'))
        .filter(|inner| !inner.is_empty())
    {
        text = inner;
    }
    for container in ["list", "sequence", "array"] {
        let Some(rest) = text.strip_prefix(container) else {
            continue;
        };
        if let Some(inner) = rest.strip_prefix('[') {
            let inner = inner.strip_suffix(']').unwrap_or(inner);
            return ParameterSchema::array_of(resolve_type(inner));
        }
        if let Some(inner) = rest.strip_prefix(" of ") {
            return ParameterSchema::array_of(resolve_type(inner.trim()));
        }
    }
    let primitive = text
        .split_whitespace()
        .next()
        .and_then(primitive_type)
        .unwrap_or(JsonType::String);
    ParameterSchema::of(primitive)
}

/// Maps a primitive type token to its JSON type.
fn primitive_type(token: &str) -> Option<JsonType> {
    let json_type = match token {
        "str" | "string" => JsonType::String,
        "int" | "integer" => JsonType::Integer,
        "float" | "double" | "number" => JsonType::Number,
        "bool" | "boolean" => JsonType::Boolean,
        "dict" | "mapping" | "object" => JsonType::Object,
        "list" | "array" | "sequence" => JsonType::Array,
        _ => return None,
    };
    Some(json_type)
}

fn clean_type(type_text: &str) -> String {
    type_text
        .trim()
        .to_lowercase()
        .trim_end_matches(['.', ',', ';'])
        .to_owned()
}

/// Docstring sections.
#[derive(Debug, Default)]
struct Sections<'a> {
    description: Vec<&'a str>,
    parameters: Vec<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Description,
    Parameters,
    Returns,
}

impl<'a> Sections<'a> {
    fn split(docstring: &'a str) -> Self {
        let mut sections = Sections::default();
        let mut section = Section::Description;
        let mut lines = docstring.lines().peekable();
        while let Some(line) = lines.next() {
            let next_section = match section {
                Section::Description if is_header(line, "parameter") => Some(Section::Parameters),
                Section::Parameters if is_header(line, "return") => Some(Section::Returns),
                _ => None,
            };
            if let Some(next_section) = next_section {
                section = next_section;
                if lines.peek().is_some_and(|line| is_underline(line)) {
                    lines.next();
                }
                continue;
            }
            match section {
                Section::Description => sections.description.push(line),
                Section::Parameters => sections.parameters.push(line),
                Section::Returns => break,
            }
        }
        sections
    }
}

/// Returns `true` if the line is `word` or `word` + `s`, optionally followed by a colon.
fn is_header(line: &str, word: &str) -> bool {
    let line = line.trim();
    let line = line.strip_suffix(':').unwrap_or(line).trim_end();
    let Some(suffix) = line
        .get(..word.len())
        .filter(|head| head.eq_ignore_ascii_case(word))
        .and_then(|_| line.get(word.len()..))
    else {
        return false;
    };
    suffix.is_empty() || suffix.eq_ignore_ascii_case("s")
}

fn is_underline(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && line.chars().all(|c| c == '-')
}

/// Parameter declaration being scanned.
#[derive(Debug)]
struct OpenParameter<'a> {
    name: &'a str,
    type_text: &'a str,
    description: Vec<&'a str>,
}

impl OpenParameter<'_> {
    fn flush(self, properties: &mut IndexMap<String, ParameterSchema>) {
        let description = squash_whitespace(&self.description.join(" "));
        let schema = resolve_type(self.type_text).with_description(description);
        properties.insert(self.name.to_owned(), schema);
    }
}

fn scan_parameters(lines: &[&str]) -> IndexMap<String, ParameterSchema> {
    let mut properties = IndexMap::new();
    let mut open: Option<OpenParameter<'_>> = None;
    for line in lines {
        if let Some((name, type_text)) = parse_declaration(line) {
            if let Some(parameter) = open.take() {
                parameter.flush(&mut properties);
            }
            open = Some(OpenParameter {
                name,
                type_text,
                description: Vec::new(),
            });
        } else if let Some(parameter) = open.as_mut() {
            let line = line.trim();
            if !line.is_empty() {
                parameter.description.push(line);
            }
        }
    }
    if let Some(parameter) = open {
        parameter.flush(&mut properties);
    }
    properties
}

/// Parses `<identifier> : <type-text>` at the start of a line.
fn parse_declaration(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start();
    let end = line
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(line.len());
    if end == 0 {
        return None;
    }
    let (name, rest) = line.split_at(end);
    let type_text = rest.trim_start().strip_prefix(':')?;
    if type_text.is_empty() {
        return None;
    }
    Some((name, type_text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SELECT_DOCSTRING: &str = "
    Select the specified lesson (e.g. Figure Drawing, Still Life Sketching,
    Color Theory Basics, etc.).

    Parameters:
    ----------
    lesson_name: str
        Specified lesson name (e.g. Figure Drawing, Still Life Sketching, Color Theory Basics, etc.).
        Uses the lesson name mentioned in the conversation.

    Returns:
    -------
    None
    ";

    #[test]
    fn compiles_parameters_only_docstring() {
        let schema = compile(
            "select",
            "Parameters\n----------\nlesson_name: str\n    The lesson name.",
        );
        assert_eq!(
            serde_json::to_value(&schema).unwrap(),
            json!({
                "name": "select",
                "description": "",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "lesson_name": {"type": "string", "description": "The lesson name."}
                    }
                }
            })
        );
    }

    #[test]
    fn compiles_numpy_style_docstring() {
        let schema = compile("select", SELECT_DOCSTRING);
        assert_eq!(
            schema.description,
            "Select the specified lesson (e.g. Figure Drawing, Still Life Sketching, Color Theory Basics, etc.)."
        );
        let lesson = schema.parameters.get("lesson_name").unwrap();
        assert_eq!(lesson.kind, JsonType::String);
        assert_eq!(
            lesson.description.as_deref(),
            Some(
                "Specified lesson name (e.g. Figure Drawing, Still Life Sketching, Color Theory Basics, etc.). Uses the lesson name mentioned in the conversation."
            )
        );
        assert_eq!(schema.parameters.len(), 1);
    }

    #[test]
    fn docstring_without_parameters_section() {
        let schema = compile("wave", "Wave at the player.\n\nReturns\n-------\nNone");
        assert!(schema.parameters.is_empty());
        assert_eq!(schema.description, "Wave at the player. Returns ------- None");
        assert_eq!(serde_json::to_value(&schema).unwrap()["parameters"], json!({}));
    }

    #[test]
    fn parameter_block_runs_to_end_without_returns() {
        let schema = compile(
            "buy",
            "Buy an item.\nParameters:\n  item_name: str\n    Item to buy.\n  amount : int\n    How many.",
        );
        let names = schema.parameters.iter().map(|(name, _)| name).collect::<Vec<_>>();
        assert_eq!(names, ["item_name", "amount"]);
        assert_eq!(schema.parameters.get("amount").unwrap().kind, JsonType::Integer);
    }

    #[test]
    fn resolves_nested_arrays() {
        let expected = json!({"type": "array", "items": {"type": "array", "items": {"type": "integer"}}});
        for text in ["list[list[int]]", "list of list of int", "Sequence[array of int]."] {
            assert_eq!(serde_json::to_value(resolve_type(text)).unwrap(), expected, "{text}");
        }
    }

    #[test]
    fn resolves_primitives_and_wrappers() {
        assert_eq!(resolve_type("Optional[float]").kind, JsonType::Number);
        assert_eq!(resolve_type("Boolean.").kind, JsonType::Boolean);
        assert_eq!(resolve_type("bool, optional").kind, JsonType::String);
        assert_eq!(resolve_type("Dict").kind, JsonType::Object);
        assert_eq!(resolve_type("list").kind, JsonType::Array);
        assert_eq!(resolve_type("Item").kind, JsonType::String);
        assert_eq!(resolve_type("").kind, JsonType::String);
        assert_eq!(resolve_type("optional[ ]").kind, JsonType::String);
    }
}
