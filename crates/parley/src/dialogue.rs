//! Dialogue history, conversation metadata and chat messages.

use crate::JsonValue;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Who spoke a dialogue turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The player talking to the character.
    #[serde(alias = "player")]
    User,
    /// The character played by the agent.
    #[serde(alias = "npc")]
    Assistant,
}

/// An item a turn talks about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetItem {
    /// Item name.
    pub name: String,
}

/// One turn of the dialogue history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueTurn {
    /// Who spoke.
    pub speaker: Speaker,
    /// What was said.
    pub text: String,
    /// Items the turn refers to.
    #[serde(
        default,
        alias = "target_item",
        deserialize_with = "nullable_items",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub target_items: Vec<TargetItem>,
}

fn nullable_items<'de, D>(deserializer: D) -> Result<Vec<TargetItem>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<TargetItem>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl DialogueTurn {
    /// Creates a user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
            target_items: Vec::new(),
        }
    }

    /// Creates an assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
            target_items: Vec::new(),
        }
    }

    /// Adds a referenced item.
    pub fn with_target(mut self, name: impl Into<String>) -> Self {
        self.target_items.push(TargetItem { name: name.into() });
        self
    }

    /// Converts the turn into a chat message, annotating referenced items.
    pub fn to_message(&self) -> ChatMessage {
        let role = match self.speaker {
            Speaker::User => Role::User,
            Speaker::Assistant => Role::Assistant,
        };
        let mut content = self.text.clone();
        if !self.target_items.is_empty() {
            let names = self
                .target_items
                .iter()
                .map(|item| item.name.as_str())
                .collect::<Vec<_>>();
            content.push_str(" (Talking about ");
            content.push_str(&names.join(", "));
            content.push(')');
        }
        ChatMessage::new(role, content)
    }
}

/// Converts a dialogue history into chat messages.
///
/// Consecutive turns by the same speaker are passed through but logged.
pub fn to_messages(turns: &[DialogueTurn]) -> Vec<ChatMessage> {
    if let Some(position) = turns
        .windows(2)
        .position(|pair| pair[0].speaker == pair[1].speaker)
    {
        tracing::warn!(turn = position + 1, "dialogue history repeats a speaker");
    }
    turns.iter().map(DialogueTurn::to_message).collect()
}

/// Opaque structured context about the conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationMetadata {
    /// Setting of the story.
    #[serde(default)]
    pub worldview: JsonValue,
    /// Persona of the character.
    #[serde(default)]
    pub persona: JsonValue,
    /// Knowledge about items, quests and the like.
    #[serde(default)]
    pub knowledge: JsonValue,
    /// Time, location and other state of the conversation.
    #[serde(default)]
    pub state: JsonValue,
}

impl ConversationMetadata {
    /// Serializes the metadata block shown in every system prompt.
    pub fn render(&self) -> Result<String, serde_json::Error> {
        crate::json::to_spaced_string(self)
    }
}

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt.
    System,
    /// User message.
    User,
    /// Assistant message.
    Assistant,
}

impl Role {
    /// Returns the role name.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generic chat message handed to the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role.
    pub role: Role,
    /// Message content.
    pub content: String,
}

impl ChatMessage {
    /// Creates a new message.
    #[inline]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a system message.
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Creates a user message.
    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant message.
    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn annotates_target_items() {
        let turn = DialogueTurn::user("How much are these?")
            .with_target("Iron Sword")
            .with_target("Oak Shield");
        assert_eq!(
            turn.to_message(),
            ChatMessage::user("How much are these? (Talking about Iron Sword, Oak Shield)")
        );
        assert_eq!(DialogueTurn::assistant("Hi!").to_message().content, "Hi!");
    }

    #[test]
    fn reads_stored_turns() {
        let turns: Vec<DialogueTurn> = serde_json::from_value(json!([
            {"speaker": "player", "text": "Hello", "target_item": [{"name": "Map"}]},
            {"speaker": "npc", "text": "Welcome", "target_item": []},
            {"speaker": "player", "text": "Bye", "target_item": null}
        ]))
        .unwrap();
        let messages = to_messages(&turns);
        assert_eq!(messages[0], ChatMessage::user("Hello (Talking about Map)"));
        assert_eq!(messages[1].role, Role::Assistant);
        assert!(turns[2].target_items.is_empty());
        assert_eq!(messages[2], ChatMessage::user("Bye"));
    }

    #[test]
    fn metadata_keeps_characters_unescaped() {
        let metadata = ConversationMetadata {
            worldview: json!("Ville enchantée"),
            ..Default::default()
        };
        let rendered = metadata.render().unwrap();
        assert!(rendered.starts_with(r#"{"worldview": "Ville enchantée", "persona": null"#));
    }
}
