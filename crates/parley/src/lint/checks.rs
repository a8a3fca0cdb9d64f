use super::record::DatasetRecord;
use super::tags::check_balance;
use crate::call::{CallValidator, extract_calls};
use crate::dialogue::Role;
use crate::registry::SchemaSet;
use crate::schema::FunctionSchema;
use serde::Deserialize;
use std::collections::HashSet;

pub(super) type Verdict = Result<(), String>;

pub(super) fn role_alternation(record: &DatasetRecord) -> Verdict {
    match record
        .messages()
        .windows(2)
        .position(|pair| pair[0].role == pair[1].role)
    {
        Some(position) => Err(format!(
            "messages #{} and #{} are both from `{}`",
            position + 1,
            position + 2,
            record.messages()[position].role
        )),
        None => Ok(()),
    }
}

pub(super) fn role_names(record: &DatasetRecord) -> Verdict {
    let valid = [Role::User.as_str(), Role::Assistant.as_str()];
    match record
        .messages()
        .iter()
        .position(|message| !valid.contains(&message.role.as_str()))
    {
        Some(position) => Err(format!(
            "message #{} has invalid role `{}`",
            position + 1,
            record.messages()[position].role
        )),
        None => Ok(()),
    }
}

pub(super) fn tag_balance(record: &DatasetRecord) -> Verdict {
    check_balance(record.messages().iter().map(|message| message.text()))
        .map_err(|err| err.to_string())
}

/// Returns `true` if the record's protocol tags nest properly.
pub(super) fn has_balanced_tags(record: &DatasetRecord) -> bool {
    tag_balance(record).is_ok()
}

pub(super) fn argument_schema(record: &DatasetRecord) -> Verdict {
    let schemas = SchemaSet::untagged(
        record
            .functions()
            .and_then(|functions| functions.as_array())
            .into_iter()
            .flatten()
            .filter_map(|function| FunctionSchema::deserialize(function).ok()),
    );
    let assistant = Role::Assistant.as_str();
    let mut calls = Vec::new();
    for message in record.messages().iter().filter(|message| message.role == assistant) {
        let extraction = extract_calls(message.text());
        if let Some(block) = extraction.failures.first() {
            return Err(block.to_string());
        }
        calls.extend(extraction.calls);
    }

    let entry_id = record.reference().entry_id();
    let diagnostics = CallValidator::new(&schemas).validate(&calls, Some(entry_id.as_str()));
    if diagnostics.is_empty() {
        Ok(())
    } else {
        let reasons = diagnostics
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        Err(reasons.join("; "))
    }
}

pub(super) fn function_format(record: &DatasetRecord) -> Verdict {
    let Some(functions) = record.functions() else {
        return Ok(());
    };
    let Some(functions) = functions.as_array() else {
        return Err("`functions` is not a list".to_owned());
    };
    for (position, function) in functions.iter().enumerate() {
        let Some(function) = function.as_object() else {
            return Err(format!("function #{} is not an object", position + 1));
        };
        if let Some(key) = ["name", "description", "parameters"]
            .into_iter()
            .find(|key| !function.contains_key(*key))
        {
            return Err(format!("function #{} has no `{key}`", position + 1));
        }
    }
    Ok(())
}

pub(super) fn duplicate_content(record: &DatasetRecord, seen: &mut HashSet<String>) -> Verdict {
    let content = record
        .messages()
        .iter()
        .filter_map(|message| message.content.as_deref())
        .collect::<Vec<_>>()
        .join(" ");
    if seen.insert(content) {
        Ok(())
    } else {
        Err("the conversation repeats an earlier record".to_owned())
    }
}

pub(super) fn escaped_text(record: &DatasetRecord) -> Verdict {
    let serialized = serde_json::to_string(record.raw()).map_err(|err| err.to_string())?;
    match serialized.find("\\u") {
        Some(offset) => {
            let excerpt = serialized[offset..].chars().take(12).collect::<String>();
            Err(format!("unresolved escape sequence `{excerpt}`"))
        }
        None => Ok(()),
    }
}
