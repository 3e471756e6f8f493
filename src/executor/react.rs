//! The ReAct line-oriented parse protocol (§4.4): scan free-form model
//! output for `THOUGHT:` / `ACTION:` / `ACTION_INPUT:` tokens.
//!
//! This is a pragmatic text scan, not a strict grammar — per §9's design
//! note, a stricter implementation might prefer a tagged-variant parsed by
//! a small lexer, but the protocol is intentionally forgiving: it accepts
//! extra text before, between, and after the recognised tokens, and missing
//! tokens simply yield empty strings rather than a parse error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// One parsed model response. `action.is_empty() && thought.is_empty()`
/// signals free-form text with no ReAct tokens at all — the executor
/// treats that as a final-answer synthesis trigger, not a parse failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub thought: String,
    pub action: String,
    pub action_input: Map<String, Value>,
}

// Multiline-anchored so a tag must start a line (the first line of the
// response counts), compiled once and reused across every parse call.
static THOUGHT_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^THOUGHT:").unwrap());
static ACTION_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^ACTION:").unwrap());
static ACTION_INPUT_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^ACTION_INPUT:").unwrap());

/// Parse `response` per the ReAct protocol described in §4.4.
pub fn parse_react_response(response: &str) -> ParsedResponse {
    let thought = extract_between(response, &THOUGHT_TAG, &[&ACTION_TAG]);
    let action = extract_between(response, &ACTION_TAG, &[&ACTION_INPUT_TAG]);
    let raw_input = extract_after(response, &ACTION_INPUT_TAG);

    ParsedResponse {
        thought,
        action,
        action_input: decode_action_input(&raw_input),
    }
}

/// Text from the first match of `tag` up to the next line matching any of
/// `stop_tags` (or end of string), trimmed. Empty string if `tag` has no
/// match.
fn extract_between(response: &str, tag: &Regex, stop_tags: &[&Regex]) -> String {
    let Some(m) = tag.find(response) else {
        return String::new();
    };

    let after_tag = &response[m.end()..];
    let end = stop_tags
        .iter()
        .filter_map(|stop| stop.find(after_tag))
        .map(|m| m.start())
        .min()
        .unwrap_or(after_tag.len());

    after_tag[..end].trim().to_string()
}

/// Everything after the first match of `tag`, trimmed. Empty string if
/// `tag` has no match.
fn extract_after(response: &str, tag: &Regex) -> String {
    tag.find(response).map(|m| response[m.end()..].trim().to_string()).unwrap_or_default()
}

/// Decode the trimmed `ACTION_INPUT` body: a JSON object if it parses as
/// one, else the whole trimmed string wrapped as `{"input": <string>}`.
fn decode_action_input(raw: &str) -> Map<String, Value> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw) {
        return map;
    }
    let mut wrapped = Map::new();
    wrapped.insert("input".to_string(), Value::String(raw.to_string()));
    wrapped
}
