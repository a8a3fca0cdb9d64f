//! Function registries and compiled schema sets.

use crate::error::{Error, Result};
use crate::schema::FunctionSchema;
use crate::JsonValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Whether a function only reads state or mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Read-only informational function.
    Tool,
    /// State-mutating function.
    Action,
}

impl Provenance {
    /// Returns `true` for [`Provenance::Action`].
    #[inline]
    pub fn is_action(self) -> bool {
        matches!(self, Provenance::Action)
    }
}

/// A registered function: its name and the docstring describing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionEntry {
    /// Function name.
    pub name: String,
    /// Raw docstring, compiled into the schema.
    #[serde(default)]
    pub description: String,
    /// Argument metadata carried along by some registries; not interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<JsonValue>,
}

impl FunctionEntry {
    /// Creates a new entry.
    pub fn new(name: impl Into<String>, docstring: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: docstring.into(),
            args: None,
        }
    }
}

/// Tool and action registries with disjoint names.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tools: IndexMap<String, FunctionEntry>,
    actions: IndexMap<String, FunctionEntry>,
}

impl Registry {
    /// Creates a registry, failing if a name is both a tool and an action.
    pub fn new(
        tools: IndexMap<String, FunctionEntry>,
        actions: IndexMap<String, FunctionEntry>,
    ) -> Result<Self> {
        if let Some(name) = tools.keys().find(|name| actions.contains_key(*name)) {
            return Err(Error::ConflictingProvenance(name.clone()));
        }
        Ok(Self { tools, actions })
    }

    /// Builds a registry from two JSON documents.
    ///
    /// Each document is either the bare `name -> entry` mapping or that mapping
    /// wrapped as `{"function_registry": {...}}`.
    pub fn from_json(tools: &JsonValue, actions: &JsonValue) -> Result<Self> {
        Self::new(parse_entries(tools)?, parse_entries(actions)?)
    }

    /// Registers a tool.
    pub fn register_tool(&mut self, entry: FunctionEntry) -> Result<()> {
        self.register(entry, Provenance::Tool)
    }

    /// Registers an action.
    pub fn register_action(&mut self, entry: FunctionEntry) -> Result<()> {
        self.register(entry, Provenance::Action)
    }

    fn register(&mut self, entry: FunctionEntry, provenance: Provenance) -> Result<()> {
        let name = entry.name.as_str();
        if self.tools.contains_key(name) || self.actions.contains_key(name) {
            let existing = if self.tools.contains_key(name) {
                Provenance::Tool
            } else {
                Provenance::Action
            };
            return Err(if existing == provenance {
                Error::DuplicateFunction(entry.name)
            } else {
                Error::ConflictingProvenance(entry.name)
            });
        }
        let registry = match provenance {
            Provenance::Tool => &mut self.tools,
            Provenance::Action => &mut self.actions,
        };
        registry.insert(entry.name.clone(), entry);
        Ok(())
    }

    /// Returns the provenance of a registered function.
    pub fn provenance(&self, name: &str) -> Option<Provenance> {
        if self.tools.contains_key(name) {
            Some(Provenance::Tool)
        } else if self.actions.contains_key(name) {
            Some(Provenance::Action)
        } else {
            None
        }
    }

    /// Returns the number of registered functions.
    #[inline]
    pub fn len(&self) -> usize {
        self.tools.len() + self.actions.len()
    }

    /// Returns `true` if nothing is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty() && self.actions.is_empty()
    }

    /// Compiles every docstring and merges tools and actions into one schema set.
    pub fn compile(&self) -> SchemaSet {
        let tools = self
            .tools
            .values()
            .map(|entry| (entry, Provenance::Tool));
        let actions = self
            .actions
            .values()
            .map(|entry| (entry, Provenance::Action));
        let mut schemas = SchemaSet::default();
        for (entry, provenance) in tools.chain(actions) {
            let schema = FunctionSchema::from_docstring(&entry.name, &entry.description);
            schemas.push(schema, Some(provenance));
        }
        tracing::debug!(functions = schemas.len(), "compiled function registry");
        schemas
    }
}

fn parse_entries(document: &JsonValue) -> Result<IndexMap<String, FunctionEntry>> {
    let mapping = document.get("function_registry").unwrap_or(document);
    let JsonValue::Object(map) = mapping else {
        return Err(Error::InvalidRegistry(
            "expected an object mapping function names to entries".to_owned(),
        ));
    };
    let mut entries = IndexMap::with_capacity(map.len());
    for (key, value) in map {
        let mut entry = FunctionEntry::deserialize(value)
            .map_err(|err| Error::InvalidRegistry(format!("entry `{key}`: {err}")))?;
        if entry.name.is_empty() {
            entry.name = key.clone();
        }
        if entries.contains_key(&entry.name) {
            return Err(Error::DuplicateFunction(entry.name));
        }
        entries.insert(entry.name.clone(), entry);
    }
    Ok(entries)
}

/// A compiled schema together with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaEntry {
    /// The compiled schema.
    pub schema: FunctionSchema,
    /// Tool or action; unknown for schemas read back from stored datasets.
    pub provenance: Option<Provenance>,
}

/// Ordered set of function schemas indexed by name.
#[derive(Clone, Default)]
pub struct SchemaSet {
    entries: Vec<SchemaEntry>,
    index: HashMap<String, usize>,
}

impl SchemaSet {
    /// Builds a set without provenance, as read from a stored function list.
    ///
    /// The first schema wins on a repeated name.
    pub fn untagged(schemas: impl IntoIterator<Item = FunctionSchema>) -> Self {
        let mut set = Self::default();
        for schema in schemas {
            set.push(schema, None);
        }
        set
    }

    fn push(&mut self, schema: FunctionSchema, provenance: Option<Provenance>) {
        if self.index.contains_key(&schema.name) {
            tracing::warn!(function = %schema.name, "ignoring repeated function schema");
            return;
        }
        self.index.insert(schema.name.clone(), self.entries.len());
        self.entries.push(SchemaEntry { schema, provenance });
    }

    /// Returns the schema named `name`.
    pub fn get(&self, name: &str) -> Option<&FunctionSchema> {
        self.entry(name).map(|entry| &entry.schema)
    }

    /// Returns the entry named `name`.
    pub fn entry(&self, name: &str) -> Option<&SchemaEntry> {
        self.index.get(name).map(|&position| &self.entries[position])
    }

    /// Returns the provenance of `name`, if known.
    pub fn provenance(&self, name: &str) -> Option<Provenance> {
        self.entry(name).and_then(|entry| entry.provenance)
    }

    /// Returns `true` if `name` is known.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Iterates over schemas in listing order.
    pub fn schemas(&self) -> impl Iterator<Item = &FunctionSchema> {
        self.entries.iter().map(|entry| &entry.schema)
    }

    /// Returns the number of schemas.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for SchemaSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaSet")
            .field("function_count", &self.entries.len())
            .field(
                "function_names",
                &self.schemas().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lesson_registry() -> Registry {
        let tools = json!({"function_registry": {
            "check_lessons": {"name": "check_lessons", "description": "List the lessons on offer."}
        }});
        let actions = json!({
            "select": {
                "name": "select",
                "description": "Select a lesson.\n\nParameters\n----------\nlesson_name: str\n    The lesson name.",
                "args": {"lesson_name": "str"}
            }
        });
        Registry::from_json(&tools, &actions).unwrap()
    }

    #[test]
    fn compiles_tools_before_actions() {
        let schemas = lesson_registry().compile();
        let names = schemas.schemas().map(|s| s.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["check_lessons", "select"]);
        assert_eq!(schemas.provenance("check_lessons"), Some(Provenance::Tool));
        assert_eq!(schemas.provenance("select"), Some(Provenance::Action));
        assert!(schemas.get("select").unwrap().parameters.contains("lesson_name"));
    }

    #[test]
    fn provenance_is_exclusive() {
        let mut registry = lesson_registry();
        let err = registry
            .register_tool(FunctionEntry::new("select", "Select again."))
            .unwrap_err();
        assert!(matches!(err, Error::ConflictingProvenance(name) if name == "select"));
        let err = registry
            .register_action(FunctionEntry::new("select", "Select again."))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateFunction(_)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn rejects_non_object_registry() {
        let err = Registry::from_json(&json!([]), &json!({})).unwrap_err();
        assert!(matches!(err, Error::InvalidRegistry(_)));
    }

    #[test]
    fn rejects_repeated_names_in_one_document() {
        let tools = json!({
            "a": {"name": "buy", "description": "First."},
            "b": {"name": "buy", "description": "Second."}
        });
        let err = Registry::from_json(&tools, &json!({})).unwrap_err();
        assert!(matches!(err, Error::DuplicateFunction(name) if name == "buy"));
    }

    #[test]
    fn untagged_set_keeps_first_schema() {
        let first = FunctionSchema::new("buy", "First.", Default::default());
        let second = FunctionSchema::new("buy", "Second.", Default::default());
        let set = SchemaSet::untagged([first, second]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("buy").unwrap().description, "First.");
        assert_eq!(set.provenance("buy"), None);
    }
}
