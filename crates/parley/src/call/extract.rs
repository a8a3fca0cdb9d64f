use super::ToolCall;
use std::fmt;

/// Opening tag of a call block.
pub const CALL_OPEN: &str = "<tool_call>";

/// Closing tag of a call block.
pub const CALL_CLOSE: &str = "</tool_call>";

/// A call block whose interior is not a valid call object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedBlock {
    /// Byte offset of the opening tag in the scanned text.
    pub offset: usize,
    /// The whole block, tags included, as it appeared in the text.
    pub raw: String,
    /// Parser message.
    pub reason: String,
}

impl MalformedBlock {
    /// Returns the raw block with newlines, quotes and non-ASCII characters escaped,
    /// fit for a one-line log message.
    pub fn escaped(&self) -> String {
        self.raw.escape_default().to_string()
    }
}

impl fmt::Display for MalformedBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to parse call block at offset {}: {} ({})",
            self.offset,
            self.escaped(),
            self.reason
        )
    }
}

/// Calls found in a piece of text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Parsed calls in order of appearance.
    pub calls: Vec<ToolCall>,
    /// Blocks that could not be parsed.
    pub failures: Vec<MalformedBlock>,
}

impl Extraction {
    /// Returns `true` if no block failed to parse.
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Extracts every `<tool_call>...</tool_call>` block from `text`.
///
/// Blocks are matched left to right without overlap; an opening tag without a
/// closing tag ends the scan. When several opening tags precede one closing
/// tag, the last of them starts the block. A block whose interior is not a JSON
/// object with a `name` is reported in [`Extraction::failures`] and skipped.
pub fn extract_calls(text: &str) -> Extraction {
    let mut extraction = Extraction::default();
    let mut cursor = 0;
    while let Some(found) = text[cursor..].find(CALL_OPEN) {
        let open = cursor + found;
        let Some(found) = text[open..].find(CALL_CLOSE) else {
            tracing::debug!(offset = open, "unterminated call block");
            break;
        };
        let close = open + found;
        let open = text[open..close]
            .rfind(CALL_OPEN)
            .map_or(open, |last| open + last);
        let end = close + CALL_CLOSE.len();
        let interior = text[open + CALL_OPEN.len()..close].trim();
        match serde_json::from_str::<ToolCall>(interior) {
            Ok(call) => extraction.calls.push(call),
            Err(err) => {
                let block = MalformedBlock {
                    offset: open,
                    raw: text[open..end].to_owned(),
                    reason: err.to_string(),
                };
                tracing::warn!("{block}");
                extraction.failures.push(block);
            }
        }
        cursor = end;
    }
    extraction
}
