use crate::JsonValue;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Identity of a record within a corpus.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordRef {
    /// File the record was read from.
    pub source: Arc<str>,
    /// One-based position within the file.
    pub index: usize,
    /// The record's own `id` field, if any.
    pub id: Option<String>,
}

impl RecordRef {
    /// Returns the `id` if present, else the position.
    pub fn entry_id(&self) -> String {
        self.id.clone().unwrap_or_else(|| self.index.to_string())
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: record #{}", self.source, self.index)?;
        if let Some(id) = &self.id {
            write!(f, " (id {id})")?;
        }
        Ok(())
    }
}

/// A stored chat message with an unchecked role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Role as written in the record.
    #[serde(default)]
    pub role: String,
    /// Message text.
    #[serde(default)]
    pub content: Option<String>,
}

impl StoredMessage {
    /// Creates a message.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
        }
    }

    /// Returns the content, or empty text when absent.
    #[inline]
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// One stored conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRecord {
    reference: RecordRef,
    messages: Vec<StoredMessage>,
    raw: JsonValue,
}

impl DatasetRecord {
    /// Reads a record from its JSON form.
    pub fn from_value(raw: JsonValue, source: Arc<str>, index: usize) -> Result<Self> {
        let id = match raw.get("id") {
            Some(JsonValue::String(id)) => Some(id.clone()),
            Some(JsonValue::Null) | None => None,
            Some(id) => Some(id.to_string()),
        };
        let messages = match raw.get("messages") {
            Some(JsonValue::Null) | None => Vec::new(),
            Some(messages) => {
                Vec::<StoredMessage>::deserialize(messages).map_err(|err| Error::InvalidDataset {
                    path: source.to_string(),
                    reason: format!("record #{index} has invalid messages: {err}"),
                })?
            }
        };
        Ok(Self {
            reference: RecordRef { source, index, id },
            messages,
            raw,
        })
    }

    /// Returns the identity of the record.
    #[inline]
    pub fn reference(&self) -> &RecordRef {
        &self.reference
    }

    /// Returns the messages.
    #[inline]
    pub fn messages(&self) -> &[StoredMessage] {
        &self.messages
    }

    /// Returns the stored function list, or `None` when the field is absent.
    #[inline]
    pub fn functions(&self) -> Option<&JsonValue> {
        self.raw.get("functions").filter(|functions| !functions.is_null())
    }

    /// Returns the record as stored.
    #[inline]
    pub fn raw(&self) -> &JsonValue {
        &self.raw
    }
}

/// Parses a JSON array of records.
pub fn parse_dataset(source: &str, text: &str) -> Result<Vec<DatasetRecord>> {
    let invalid = |reason: String| Error::InvalidDataset {
        path: source.to_owned(),
        reason,
    };
    let value = serde_json::from_str::<JsonValue>(text).map_err(|err| invalid(err.to_string()))?;
    let JsonValue::Array(records) = value else {
        return Err(invalid("expected a JSON array of records".to_owned()));
    };
    let source = Arc::<str>::from(source);
    records
        .into_iter()
        .enumerate()
        .map(|(index, raw)| DatasetRecord::from_value(raw, source.clone(), index + 1))
        .collect()
}

/// Reads a dataset file.
pub fn load_dataset(path: impl AsRef<Path>) -> Result<Vec<DatasetRecord>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let records = parse_dataset(&path.display().to_string(), &text)?;
    tracing::debug!(path = %path.display(), records = records.len(), "dataset loaded");
    Ok(records)
}
