//! Structured-output parsing for model responses
//!
//! Models are instructed to return bare JSON but routinely wrap it in
//! markdown fences or surround it with prose. These helpers strip the
//! fencing, locate the first balanced-brace object, and decode it strictly
//! into a typed value, so callers always receive either a value or an
//! enumerated failure, never a raw untyped blob.

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Why a model response could not be decoded.
#[derive(Error, Debug)]
pub enum ParseFailure {
    #[error("Empty response text")]
    Empty,

    #[error("No JSON object found in response ({length} chars)")]
    NoObject { length: usize },

    #[error("Unbalanced JSON object in response (depth {depth})")]
    Unbalanced { depth: i32 },

    #[error("JSON decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Extract the first balanced-brace JSON object from raw model output.
pub fn extract_json_object(text: &str) -> Result<&str, ParseFailure> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParseFailure::Empty);
    }

    let open = trimmed.find('{').ok_or(ParseFailure::NoObject {
        length: trimmed.len(),
    })?;

    // Walk to the matching close brace, ignoring braces inside strings.
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in trimmed[open..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&trimmed[open..open + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    Err(ParseFailure::Unbalanced { depth })
}

/// Extract and strictly decode a typed value from raw model output.
pub fn decode_json<T: DeserializeOwned>(text: &str) -> Result<T, ParseFailure> {
    let object = extract_json_object(text)?;
    Ok(serde_json::from_str(object)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Decision {
        conclude: bool,
        reason: String,
    }

    #[test]
    fn extracts_bare_object() {
        let text = r#"{"conclude": true, "reason": "done"}"#;
        let decision: Decision = decode_json(text).unwrap();
        assert!(decision.conclude);
    }

    #[test]
    fn strips_markdown_fencing_and_prose() {
        let text = "Here is the result:\n```json\n{\"conclude\": false, \"reason\": \"more to discuss\"}\n```\nLet me know.";
        let decision: Decision = decode_json(text).unwrap();
        assert_eq!(decision.reason, "more to discuss");
    }

    #[test]
    fn takes_first_balanced_object() {
        let text = r#"{"conclude": true, "reason": "a"} {"conclude": false, "reason": "b"}"#;
        let decision: Decision = decode_json(text).unwrap();
        assert_eq!(decision.reason, "a");
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_the_scanner() {
        let text = r#"{"conclude": true, "reason": "see {section 2}"}"#;
        let decision: Decision = decode_json(text).unwrap();
        assert_eq!(decision.reason, "see {section 2}");
    }

    #[test]
    fn nested_objects_balance() {
        #[derive(Deserialize)]
        struct Outer {
            inner: serde_json::Value,
        }
        let text = r#"prefix {"inner": {"a": {"b": 1}}} suffix"#;
        let outer: Outer = decode_json(text).unwrap();
        assert_eq!(outer.inner["a"]["b"], 1);
    }

    #[test]
    fn empty_text_is_rejected() {
        assert!(matches!(
            extract_json_object("   "),
            Err(ParseFailure::Empty)
        ));
    }

    #[test]
    fn missing_object_is_rejected() {
        assert!(matches!(
            extract_json_object("no json here"),
            Err(ParseFailure::NoObject { .. })
        ));
    }

    #[test]
    fn truncated_object_is_rejected() {
        assert!(matches!(
            extract_json_object(r#"{"conclude": true, "reason": "cut of"#),
            Err(ParseFailure::Unbalanced { .. })
        ));
    }

    #[test]
    fn missing_field_is_a_decode_error() {
        let result: Result<Decision, _> = decode_json(r#"{"conclude": true}"#);
        assert!(matches!(result, Err(ParseFailure::Decode(_))));
    }
}
