//! JSON helpers for the textual protocol.
//!
//! Call blocks, response blocks and function listings are rendered the way the
//! model saw them during fine-tuning: `", "` between entries, `": "` between keys
//! and values, and non-ASCII characters written as-is.

use serde::Serialize;
use serde_json::ser::Formatter;
use std::io;

/// A [`Formatter`] writing compact JSON with a space after every separator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    #[inline]
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    #[inline]
    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    #[inline]
    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

/// Serializes `value` with the [`SpacedFormatter`].
pub fn to_spaced_string<T>(value: &T) -> Result<String, serde_json::Error>
where
    T: Serialize + ?Sized,
{
    let mut buf = Vec::with_capacity(128);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut serializer)?;
    String::from_utf8(buf).map_err(serde::ser::Error::custom)
}

/// Collapses every whitespace run (newlines included) into one space and trims both ends.
pub fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn spaced_output_matches_protocol_form() {
        let value = json!({"name": "select", "arguments": {"lesson_name": "Figure Drawing", "tags": [1, 2]}});
        let text = to_spaced_string(&value).unwrap();
        assert!(text.contains(r#""lesson_name": "Figure Drawing""#));
        assert!(text.contains("[1, 2]"));
    }

    #[test]
    fn non_ascii_is_not_escaped() {
        let text = to_spaced_string(&json!("Café ☕")).unwrap();
        assert_eq!(text, "\"Café ☕\"");
    }

    #[test]
    fn squash_is_idempotent() {
        let once = squash_whitespace("  Select the\n\tspecified   lesson.\n");
        assert_eq!(once, "Select the specified lesson.");
        assert_eq!(squash_whitespace(&once), once);
    }
}
