//! Tolerant extraction of text, usage and request id from response documents.
//!
//! Each extractor is a pure function returning `None` when its shape is
//! absent; the public functions try them in order and fall back to an empty
//! string or zero usage. Nothing here returns an error.

use serde_json::Value;

use chatbot_types::llm::Usage;

type TextExtractor = fn(&Value) -> Option<String>;
type UsageExtractor = fn(&Value) -> Option<Usage>;

const TEXT_EXTRACTORS: &[TextExtractor] = &[output_text_field, output_items_text, chat_choice_text];

const USAGE_EXTRACTORS: &[UsageExtractor] = &[responses_usage, chat_usage, legacy_nested_usage];

/// Assistant text from a Responses or Chat Completions document; empty if absent.
pub fn extract_text(response: &Value) -> String {
    TEXT_EXTRACTORS
        .iter()
        .find_map(|extract| extract(response))
        .unwrap_or_default()
}

/// Usage triple from any known representation; zeros if absent.
pub fn extract_usage(response: &Value) -> Usage {
    USAGE_EXTRACTORS
        .iter()
        .find_map(|extract| extract(response))
        .unwrap_or_default()
}

/// Provider-assigned request identifier (`id`), if present.
pub fn extract_request_id(response: &Value) -> Option<String> {
    response
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Convenience `output_text` field.
fn output_text_field(response: &Value) -> Option<String> {
    response
        .get("output_text")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `output[].content[].text`, where `text` may be a string or `{ "value": ... }`.
///
/// Items without content (e.g. reasoning items) are skipped; text parts are
/// concatenated in order.
fn output_items_text(response: &Value) -> Option<String> {
    let items = response.get("output")?.as_array()?;
    let text: String = items
        .iter()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter_map(|part| match part.get("text")? {
            Value::String(s) => Some(s.as_str()),
            other => other.get("value").and_then(Value::as_str),
        })
        .collect();
    (!text.is_empty()).then_some(text)
}

/// Chat Completions `choices[0].message.content`.
fn chat_choice_text(response: &Value) -> Option<String> {
    response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Non-negative token count from a number or numeric string; 0 otherwise.
fn token_count(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Responses-style usage: `input_tokens`, `output_tokens`, cached tokens.
fn responses_fields(usage: &Value) -> Option<Usage> {
    let map = usage.as_object()?;
    if !map.contains_key("input_tokens") && !map.contains_key("output_tokens") {
        return None;
    }
    let cached = usage
        .pointer("/input_tokens_details/cached_tokens")
        .or_else(|| map.get("cache_creation_input_tokens"));
    Some(Usage::new(
        token_count(map.get("input_tokens")),
        token_count(map.get("output_tokens")),
        token_count(cached),
    ))
}

/// Chat-style usage: `prompt_tokens`, `completion_tokens`.
fn chat_fields(usage: &Value) -> Option<Usage> {
    let map = usage.as_object()?;
    if !map.contains_key("prompt_tokens") && !map.contains_key("completion_tokens") {
        return None;
    }
    Some(Usage::new(
        token_count(map.get("prompt_tokens")),
        token_count(map.get("completion_tokens")),
        token_count(usage.pointer("/prompt_tokens_details/cached_tokens")),
    ))
}

fn responses_usage(response: &Value) -> Option<Usage> {
    responses_fields(response.get("usage")?)
}

fn chat_usage(response: &Value) -> Option<Usage> {
    chat_fields(response.get("usage")?)
}

/// Older documents that wrap the payload: `{"response": {"usage": {...}}}`.
fn legacy_nested_usage(response: &Value) -> Option<Usage> {
    let usage = response.pointer("/response/usage")?;
    responses_fields(usage).or_else(|| chat_fields(usage))
}
