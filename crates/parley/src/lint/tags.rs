use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Tags of the wire protocol.
pub const PROTOCOL_TAGS: [&str; 6] = [
    "<tool_call>",
    "</tool_call>",
    "<tool_response>",
    "</tool_response>",
    "<tools>",
    "</tools>",
];

/// Placeholders that look like tags but only appear in the prompt's format example.
pub const PLACEHOLDER_TAGS: [&str; 6] = [
    "<function-name>",
    "</function-name>",
    "<function-args>",
    "</function-args>",
    "<args-json-object>",
    "</args-json-object>",
];

/// Why a sequence of messages is not properly tagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagError {
    /// A tag that is neither a protocol tag nor a placeholder.
    Unknown {
        /// The tag.
        tag: String,
        /// Zero-based message index.
        message: usize,
    },
    /// A closing tag that does not close the innermost open tag.
    Mismatched {
        /// The closing tag.
        tag: String,
        /// The innermost open tag, if any.
        open: Option<String>,
        /// Zero-based message index.
        message: usize,
    },
    /// Tags left open at the end.
    Unclosed(Vec<String>),
}

impl fmt::Display for TagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagError::Unknown { tag, message } => {
                write!(f, "unknown tag `{tag}` in message #{}", message + 1)
            }
            TagError::Mismatched { tag, open, message } => match open {
                Some(open) => write!(
                    f,
                    "`{tag}` closes `{open}` in message #{}",
                    message + 1
                ),
                None => write!(f, "`{tag}` has no opening tag in message #{}", message + 1),
            },
            TagError::Unclosed(tags) => write!(f, "unclosed tags: {}", tags.join(", ")),
        }
    }
}

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[\w-]+>").expect("fail to create the tag pattern"));

/// Checks that protocol tags across all `contents` nest properly and are all closed.
///
/// One stack spans every message, so a block may not be opened in one message
/// and closed in another without that being visible.
pub fn check_balance<'a, I>(contents: I) -> Result<(), TagError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut stack: Vec<&str> = Vec::new();
    for (message, content) in contents.into_iter().enumerate() {
        for tag in TAG_PATTERN.find_iter(content).map(|m| m.as_str()) {
            if PLACEHOLDER_TAGS.contains(&tag) {
                continue;
            }
            if !PROTOCOL_TAGS.contains(&tag) {
                return Err(TagError::Unknown {
                    tag: tag.to_owned(),
                    message,
                });
            }
            if let Some(name) = tag.strip_prefix("</") {
                match stack.last() {
                    Some(open) if open.strip_prefix('<') == Some(name) => {
                        stack.pop();
                    }
                    open => {
                        return Err(TagError::Mismatched {
                            tag: tag.to_owned(),
                            open: open.map(|open| (*open).to_owned()),
                            message,
                        });
                    }
                }
            } else {
                stack.push(tag);
            }
        }
    }
    if stack.is_empty() {
        Ok(())
    } else {
        Err(TagError::Unclosed(
            stack.into_iter().map(ToOwned::to_owned).collect(),
        ))
    }
}
