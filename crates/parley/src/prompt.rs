//! System prompts for the three generation profiles.
//!
//! Rendering is a pure function of the role, the serialized metadata block and
//! the schema set: the same inputs always produce byte-identical prompts.

use crate::error::Result;
use crate::json::to_spaced_string;
use crate::registry::SchemaSet;
use crate::schema::{FunctionSchema, Parameters};
use minijinja::{AutoEscape, Environment, context};
use std::fmt;

/// Prompt for the tool-invocation profile: full schemas plus the reply sentinel.
const TOOL_INVOCATION_TEMPLATE: &str = r#"{{ role }}

# Metadata

{{ metadata }}

# Tools

You should call one or more functions to assist with the player query.

You are provided with function signatures within <tools></tools> XML tags:
<tools>
{% for item in functions %}
{{- item }}
{% endfor %}</tools>

For each function call, return a json object with function name and arguments within <tool_call></tool_call> XML tags:
<tool_call>
{"name":"<function-name>","arguments":<args-json-object>}
</tool_call>"#;

/// Prompt for the reply-after-call profile: names and descriptions only.
const REPLY_AFTER_CALL_TEMPLATE: &str = r#"{{ role }}

# Metadata

{{ metadata }}

# Tools

You are provided with function signatures within <tools></tools> XML tags:
<tools>
{% for item in functions %}
{{- item }}
{% endfor %}</tools>

# Important

- Reply in 1-4 sentences
- Sound natural
- Respect your persona
- Show genuine curiosity
- Ask follow-up questions"#;

/// Prompt for turns answered without any call.
const NO_TOOL_REPLY_TEMPLATE: &str = r#"{{ role }}
    
# Metadata

{{ metadata }}

# Important

- Reply in 1-3 sentences
- Sound natural
- Show genuine curiosity
- Ask follow-up questions"#;

/// Renders the system prompts.
pub struct PromptAssembler {
    env: Environment<'static>,
    sentinel: FunctionSchema,
}

impl PromptAssembler {
    /// Creates an assembler listing `sentinel` as the zero-argument reply function.
    pub fn new(sentinel: &str) -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_name| AutoEscape::None);
        Self {
            env,
            sentinel: FunctionSchema::new(sentinel, "Reply to the player", Parameters::default()),
        }
    }

    /// Renders the tool-invocation prompt.
    pub fn tool_invocation(&self, role: &str, metadata: &str, schemas: &SchemaSet) -> Result<String> {
        let functions = schemas
            .schemas()
            .chain([&self.sentinel])
            .map(to_spaced_string)
            .collect::<Result<Vec<_>, _>>()?;
        self.render(TOOL_INVOCATION_TEMPLATE, role, metadata, &functions)
    }

    /// Renders the reply-after-call prompt.
    pub fn reply_after_call(&self, role: &str, metadata: &str, schemas: &SchemaSet) -> Result<String> {
        let functions = schemas
            .schemas()
            .map(|schema| to_spaced_string(&schema.summary()))
            .collect::<Result<Vec<_>, _>>()?;
        self.render(REPLY_AFTER_CALL_TEMPLATE, role, metadata, &functions)
    }

    /// Renders the prompt for a reply without any call.
    pub fn no_tool_reply(&self, role: &str, metadata: &str) -> Result<String> {
        self.render(NO_TOOL_REPLY_TEMPLATE, role, metadata, &[])
    }

    fn render(
        &self,
        template: &'static str,
        role: &str,
        metadata: &str,
        functions: &[String],
    ) -> Result<String> {
        let template = self.env.template_from_str(template)?;
        let prompt = template.render(context! { role, metadata, functions })?;
        Ok(prompt)
    }
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new("reply")
    }
}

impl fmt::Debug for PromptAssembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptAssembler")
            .field("sentinel", &self.sentinel.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FunctionEntry, Registry};

    fn schemas() -> SchemaSet {
        let mut registry = Registry::default();
        registry
            .register_action(FunctionEntry::new(
                "select",
                "Select a lesson.\n\nParameters\n----------\nlesson_name: str\n    The lesson name.",
            ))
            .unwrap();
        registry.compile()
    }

    #[test]
    fn tool_invocation_lists_schemas_and_sentinel() {
        let prompt = PromptAssembler::default()
            .tool_invocation("You are Mira, an art teacher.", "{}", &schemas())
            .unwrap();
        assert!(prompt.starts_with("You are Mira, an art teacher.\n\n# Metadata\n\n{}\n\n# Tools"));
        assert!(prompt.contains(concat!(
            "<tools>\n",
            "{\"name\": \"select\", \"description\": \"Select a lesson.\", \"parameters\": {\"type\": \"object\", \"properties\": {\"lesson_name\": {\"type\": \"string\", \"description\": \"The lesson name.\"}}}}\n",
            "{\"name\": \"reply\", \"description\": \"Reply to the player\", \"parameters\": {}}\n",
            "</tools>\n"
        )));
        assert!(prompt.ends_with("{\"name\":\"<function-name>\",\"arguments\":<args-json-object>}\n</tool_call>"));
    }

    #[test]
    fn reply_after_call_lists_summaries_only() {
        let prompt = PromptAssembler::default()
            .reply_after_call("role", "{}", &schemas())
            .unwrap();
        assert!(prompt.contains(
            "<tools>\n{\"name\": \"select\", \"description\": \"Select a lesson.\"}\n</tools>"
        ));
        assert!(!prompt.contains("properties"));
        assert!(!prompt.contains("\"reply\""));
        assert!(prompt.ends_with("- Ask follow-up questions"));
    }

    #[test]
    fn no_tool_reply_has_no_listing() {
        let assembler = PromptAssembler::default();
        let prompt = assembler.no_tool_reply("role", "{\"state\": null}").unwrap();
        assert!(prompt.starts_with("role\n    \n# Metadata\n\n{\"state\": null}\n\n# Important"));
        assert!(!prompt.contains("<tools>"));
        assert!(prompt.contains("- Reply in 1-3 sentences"));
        assert_eq!(prompt, assembler.no_tool_reply("role", "{\"state\": null}").unwrap());
    }
}
