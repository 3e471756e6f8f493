//! Canonical agent text and its content hash — the exact input fed to the
//! embedding function, and the cache key used to avoid recomputing it.

use serde_json::Value;

use crate::descriptor::AgentDescriptor;

/// Offset beyond which a sentence/line boundary is accepted when truncating
/// the prompt essence.
const MIN_BREAK_OFFSET: usize = 100;
/// Maximum length, in characters, of the prompt essence.
const MAX_ESSENCE_LEN: usize = 500;

/// Build the canonical text fed to the embedding function for `descriptor`.
pub fn canonical_agent_text(descriptor: &AgentDescriptor) -> String {
    let mut lines = vec![format!("Agent-Name: {}", descriptor.name)];

    if !descriptor.description.trim().is_empty() {
        lines.push(format!("Beschreibung: {}", descriptor.description));
    }

    if !descriptor.tools.is_empty() {
        let names: Vec<&str> = descriptor.tools.iter().map(|t| t.name.as_str()).collect();
        lines.push(format!("Verfügbare Tools: {}", names.join(", ")));
    }

    if let Some(tags) = descriptor.metadata.get("tags") {
        lines.push(format!("Schlüsselwörter: {}", value_to_text(tags)));
    }

    if let Some(category) = descriptor.metadata.get("category") {
        lines.push(format!("Kategorie: {}", value_to_text(category)));
    }

    lines.push(format!(
        "Spezialisierung: {}",
        truncate_prompt_essence(&descriptor.system_prompt)
    ));

    lines.join("\n")
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(value_to_text).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

/// Truncate `prompt` to at most 500 characters, ending at the last period
/// found beyond offset 100, else the last newline found beyond offset 100,
/// else hard-truncated at 500 with an ellipsis.
fn truncate_prompt_essence(prompt: &str) -> String {
    let chars: Vec<char> = prompt.chars().collect();
    if chars.len() <= MAX_ESSENCE_LEN {
        return prompt.to_string();
    }

    let window = &chars[..MAX_ESSENCE_LEN];

    if let Some(idx) = rfind_after(window, '.', MIN_BREAK_OFFSET) {
        return window[..=idx].iter().collect();
    }

    if let Some(idx) = rfind_after(window, '\n', MIN_BREAK_OFFSET) {
        return window[..idx].iter().collect::<String>().trim_end().to_string();
    }

    let mut truncated: String = window.iter().collect();
    truncated.push('…');
    truncated
}

fn rfind_after(chars: &[char], target: char, min_index: usize) -> Option<usize> {
    chars
        .iter()
        .enumerate()
        .rev()
        .find(|&(i, &c)| c == target && i > min_index)
        .map(|(i, _)| i)
}

/// Non-cryptographic 64-bit FNV-1a hash of `input`, rendered as lowercase hex.
pub fn fnv1a_hex(input: &str) -> String {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET_BASIS;
    for byte in input.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    format!("{hash:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ToolConfig;
    use std::collections::HashMap;
    use std::time::Duration;

    fn descriptor_with_prompt(prompt: &str) -> AgentDescriptor {
        AgentDescriptor {
            id: "a".to_string(),
            name: "Researcher".to_string(),
            description: "Finds things out".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            max_steps: 10,
            timeout: Duration::from_secs(120),
            system_prompt: prompt.to_string(),
            tools: vec![ToolConfig {
                name: "search".to_string(),
                enabled: true,
                config: Default::default(),
            }],
            evaluation: None,
            embedding: Vec::new(),
            embedding_hash: String::new(),
            metadata: HashMap::new(),
            source_path: None,
            loaded_at: None,
        }
    }

    #[test]
    fn canonical_text_includes_expected_sections() {
        let descriptor = descriptor_with_prompt("Be precise.");
        let text = canonical_agent_text(&descriptor);
        assert!(text.contains("Agent-Name: Researcher"));
        assert!(text.contains("Beschreibung: Finds things out"));
        assert!(text.contains("Verfügbare Tools: search"));
        assert!(text.contains("Spezialisierung: Be precise."));
    }

    #[test]
    fn hash_is_deterministic() {
        let descriptor = descriptor_with_prompt("Be precise.");
        let text = canonical_agent_text(&descriptor);
        assert_eq!(fnv1a_hex(&text), fnv1a_hex(&text));
    }

    #[test]
    fn truncates_at_period_past_offset() {
        let mut prompt = "x".repeat(150);
        prompt.push('.');
        prompt.push_str(&"y".repeat(400));
        let text = truncate_prompt_essence(&prompt);
        assert!(text.ends_with('.'));
        assert!(text.len() < prompt.len());
    }
}
