//! Recovers a JSON object from a free-form evaluator response, per §4.5
//! step 4's fixed recovery order: fenced `json` block, then fenced generic
//! block, then brace-depth matching from the first `{`, then the whole
//! response as a last resort.

/// Try, in order, to pull a JSON object substring out of `response`.
/// Always returns *some* string to attempt to decode — callers treat a
/// decode failure on the final fallback as "no usable JSON found".
pub fn extract_json_object(response: &str) -> String {
    if let Some(fenced) = extract_fenced(response, "```json") {
        return fenced;
    }
    if let Some(fenced) = extract_fenced(response, "```") {
        return fenced;
    }
    if let Some(braced) = extract_first_braced(response) {
        return braced;
    }
    response.to_string()
}

fn extract_fenced(response: &str, open_tag: &str) -> Option<String> {
    let start = response.find(open_tag)? + open_tag.len();
    let rest = &response[start..];
    // Skip an immediate newline right after the opening fence.
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    let end = rest.find("```")?;
    Some(rest[..end].trim().to_string())
}

/// The first `{` and its matching `}`, tracking nesting depth so embedded
/// braces (nested objects/arrays) don't terminate the match early.
fn extract_first_braced(response: &str) -> Option<String> {
    let bytes = response.as_bytes();
    let start = response.find('{')?;

    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        let ch = byte as char;
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + 1;
                    return Some(response[start..end].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_fenced_json_block() {
        let response = "Here you go:\n```json\n{\"passed\": true}\n```\nDone.";
        assert_eq!(extract_json_object(response), "{\"passed\": true}");
    }

    #[test]
    fn falls_back_to_generic_fence() {
        let response = "```\n{\"passed\": false}\n```";
        assert_eq!(extract_json_object(response), "{\"passed\": false}");
    }

    #[test]
    fn falls_back_to_brace_matching_with_nested_objects() {
        let response = "blah {\"a\": {\"b\": 1}, \"c\": [1,2]} trailing text";
        assert_eq!(extract_json_object(response), "{\"a\": {\"b\": 1}, \"c\": [1,2]}");
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_depth_counting() {
        let response = "{\"feedback\": \"looks like a {stray brace}\"}";
        assert_eq!(
            extract_json_object(response),
            "{\"feedback\": \"looks like a {stray brace}\"}"
        );
    }

    #[test]
    fn returns_whole_response_as_last_resort() {
        assert_eq!(extract_json_object("no json here"), "no json here");
    }
}
