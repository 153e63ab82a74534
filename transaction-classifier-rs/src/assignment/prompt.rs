//! Prompt construction and label extraction

use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use super::LabelSpace;
use crate::core::{ClassifyRequest, FunctionSpec, PromptMessage};
use crate::models::{ClassificationRecord, Vocabulary};

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").expect("static pattern is valid"));

/// Build the request for one record
pub fn build_request(
    space: LabelSpace,
    record: &ClassificationRecord,
    vocabulary: &Vocabulary,
    context: Option<&str>,
) -> ClassifyRequest {
    ClassifyRequest::new(vec![
        PromptMessage::system(system_prompt(space, vocabulary)),
        PromptMessage::user(describe_record(record, context)),
    ])
    .with_function(function_spec(space, vocabulary))
}

fn system_prompt(space: LabelSpace, vocabulary: &Vocabulary) -> String {
    let mut prompt = format!(
        "You assign a {name} to personal-finance transactions. \
         Call {function} with exactly one {name} from this list: {labels}.",
        name = space.name(),
        function = space.function_name(),
        labels = vocabulary.as_slice().join(", "),
    );

    if space == LabelSpace::Budget {
        prompt.push_str(" Use an empty string when no budget fits the transaction.");
    }

    prompt
}

/// Render a date as `YYYY-MM-DD` when it parses, otherwise verbatim
fn render_date(date: &str) -> String {
    let date = date.trim();
    if let Ok(parsed) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        return parsed.format("%Y-%m-%d").to_string();
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
        return parsed.format("%Y-%m-%d").to_string();
    }
    date.to_string()
}

fn describe_record(record: &ClassificationRecord, context: Option<&str>) -> String {
    let mut lines = vec![
        format!("Description: {}", record.description),
        format!("Amount: {}", record.amount),
        format!("Date: {}", render_date(&record.date)),
    ];

    if let Some(ref account) = record.source_account {
        lines.push(format!("Source account: {}", account));
    }
    if let Some(ref account) = record.destination_account {
        lines.push(format!("Destination account: {}", account));
    }
    if let Some(ref notes) = record.notes {
        lines.push(format!("Notes: {}", notes));
    }
    if let Some(category) = context.filter(|c| !c.is_empty()) {
        lines.push(format!("Category: {}", category));
    }

    lines.join("\n")
}

/// Function schema with the label constrained to the vocabulary
pub fn function_spec(space: LabelSpace, vocabulary: &Vocabulary) -> FunctionSpec {
    let mut allowed: Vec<&str> = vocabulary.iter().map(String::as_str).collect();
    if space == LabelSpace::Budget {
        allowed.push("");
    }

    FunctionSpec {
        name: space.function_name().to_string(),
        description: format!("Assign a {} to the transaction", space.name()),
        parameters: json!({
            "type": "object",
            "properties": {
                space.property_name(): {
                    "type": "string",
                    "enum": allowed,
                }
            },
            "required": [space.property_name()],
        }),
    }
}

/// Pull the label out of a raw model response.
///
/// Accepts function-call arguments (`{"category": "Food"}`), a bare JSON
/// string, or plain text, optionally wrapped in a code fence or quotes.
pub fn extract_label(raw: &str, property: &str) -> String {
    let text = match CODE_FENCE.captures(raw) {
        Some(captures) => captures.get(1).map_or("", |m| m.as_str()),
        None => raw,
    }
    .trim();

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => map
            .get(property)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string(),
        Ok(Value::String(label)) => label.trim().to_string(),
        _ => text
            .trim_matches(|c| c == '"' || c == '\'' || c == '`')
            .trim()
            .to_string(),
    }
}
