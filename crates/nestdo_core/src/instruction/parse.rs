//! Extraction of operation lists from free-form processor output.
//!
//! Text models wrap JSON in markdown fences or prose. A fenced block is
//! tried first, then balanced `[...]` or `{...}` spans left to right.

use super::InstructionError;
use crate::batch::BatchOperation;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::ops::Range;

static JSON_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n?(.*?)```").expect("valid fence regex"));

/// Parses processor output into batch operations.
///
/// Accepts a bare array, `{"operations": [...]}` or a single operation
/// object. A fenced block is tried first, then every balanced `[...]` or
/// `{...}` in order until one describes operations.
///
/// # Errors
/// - `EmptyResponse` for blank output.
/// - `Malformed` when no JSON is found or none of it describes operations.
///   The reason is taken from the first candidate tried.
pub fn parse_operations(raw: &str) -> Result<Vec<BatchOperation>, InstructionError> {
    if raw.trim().is_empty() {
        return Err(InstructionError::EmptyResponse);
    }

    let mut first_error = None;
    for candidate in json_candidates(raw) {
        match operations_from_json(candidate) {
            Ok(operations) => return Ok(operations),
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }
    Err(first_error
        .unwrap_or_else(|| InstructionError::Malformed("no JSON payload found".to_string())))
}

fn operations_from_json(candidate: &str) -> Result<Vec<BatchOperation>, InstructionError> {
    let value: Value = serde_json::from_str(candidate)
        .map_err(|err| InstructionError::Malformed(format!("invalid JSON: {err}")))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("operations") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(InstructionError::Malformed(
                    "`operations` must be an array".to_string(),
                ))
            }
            None => vec![Value::Object(object)],
        },
        _ => {
            return Err(InstructionError::Malformed(
                "expected an array of operations".to_string(),
            ))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item).map_err(|err| {
                InstructionError::Malformed(format!("operation #{}: {err}", index + 1))
            })
        })
        .collect()
}

/// Fenced body (if any), then each top-level balanced span left to right.
fn json_candidates(raw: &str) -> impl Iterator<Item = &str> + '_ {
    let fenced = JSON_FENCE_RE
        .captures(raw)
        .and_then(|captures| captures.get(1))
        .map(|body| body.as_str().trim())
        .filter(|body| !body.is_empty());

    let mut cursor = 0;
    let spans = std::iter::from_fn(move || {
        let span = balanced_span(&raw[cursor..])?;
        let found = &raw[cursor + span.start..cursor + span.end];
        cursor += span.end;
        Some(found)
    });
    fenced.into_iter().chain(spans)
}

/// Byte range of the first balanced JSON array/object, skipping brackets
/// inside strings.
fn balanced_span(raw: &str) -> Option<Range<usize>> {
    let start = raw.find(&['[', '{'][..])?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(start..start + offset + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::{balanced_span, parse_operations};
    use crate::batch::BatchOperation;
    use crate::instruction::InstructionError;

    #[test]
    fn parses_fenced_block_with_surrounding_prose() {
        let raw = "Sure! Here is the plan:\n```json\n[{\"op\":\"done\",\"taskId\":\"abc\"}]\n```\nLet me know.";
        let ops = parse_operations(raw).unwrap();
        assert_eq!(
            ops,
            vec![BatchOperation::Done {
                task_id: "abc".to_string()
            }]
        );
    }

    #[test]
    fn falls_back_to_brace_matching() {
        let raw = r#"Result: {"operations": [{"op": "add", "title": "Use [brackets] }"}]} done"#;
        let ops = parse_operations(raw).unwrap();
        assert_eq!(
            ops,
            vec![BatchOperation::Add {
                id: None,
                title: "Use [brackets] }".to_string(),
                parent_id: None,
            }]
        );
    }

    #[test]
    fn empty_array_is_not_an_error() {
        assert_eq!(parse_operations("[]").unwrap(), Vec::new());
    }

    #[test]
    fn blank_and_garbage_output_are_errors() {
        assert_eq!(
            parse_operations("   \n").unwrap_err(),
            InstructionError::EmptyResponse
        );
        assert!(matches!(
            parse_operations("I could not understand that."),
            Err(InstructionError::Malformed(_))
        ));
        assert!(matches!(
            parse_operations(r#"[{"op": "explode"}]"#),
            Err(InstructionError::Malformed(_))
        ));
    }

    #[test]
    fn skips_bracketed_prose_before_the_operation_list() {
        let raw = r#"Plan [draft]: [{"op": "done", "taskId": "abc"}]"#;
        assert_eq!(
            parse_operations(raw).unwrap(),
            vec![BatchOperation::Done {
                task_id: "abc".to_string()
            }]
        );
    }

    #[test]
    fn reports_first_candidate_when_nothing_parses() {
        let err = parse_operations("see [notes] and {draft}").unwrap_err();
        assert!(matches!(err, InstructionError::Malformed(reason) if reason.starts_with("invalid JSON")));
    }

    #[test]
    fn balanced_span_ignores_escaped_quotes() {
        let raw = r#"x ["a \"]\" b"] y"#;
        assert_eq!(balanced_span(raw).map(|range| &raw[range]), Some(r#"["a \"]\" b"]"#));
    }
}
