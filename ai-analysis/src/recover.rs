//! Recovery of a JSON result array from imperfect model output.
//!
//! Truncation is the dominant failure mode: the model runs out of tokens
//! mid-object. The ladder below is applied only when the raw text does not
//! parse as-is, and each rung salvages strictly less than the one before it.

use log::{debug, warn};
use serde::Deserialize;

use crate::error::AnalysisError;

/// One model verdict as it appears on the wire, before reconciliation.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAiItem {
    pub correction_index: usize,
    pub selected_value: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub is_exception_processed: bool,
    #[serde(default)]
    pub is_original_kept: bool,
}

fn default_confidence() -> f64 {
    50.0
}

/// Parses the model's raw text into result items, recovering from fenced,
/// truncated, or trailing-comma output. Individual objects that are
/// well-formed JSON but miss required fields are skipped with a warning.
pub fn parse_items(raw: &str) -> Result<Vec<RawAiItem>, AnalysisError> {
    for candidate in candidates(raw) {
        if let Some(values) = try_parse(&candidate) {
            return Ok(convert(values));
        }
    }
    Err(AnalysisError::ResponseParse(format!(
        "unrecoverable model output ({} chars)",
        raw.chars().count()
    )))
}

/// The recovery ladder, lazily evaluated in order.
fn candidates(raw: &str) -> Vec<String> {
    let mut out = vec![raw.to_string()];

    // 1. Strip a surrounding fenced code block.
    let unfenced = strip_code_fence(raw);
    out.push(unfenced.to_string());

    // 2. First balanced-looking [...] span.
    let Some(start) = unfenced.find('[') else {
        return out;
    };
    let span = match unfenced.rfind(']') {
        Some(close) if close > start => &unfenced[start..=close],
        _ => &unfenced[start..],
    };
    out.push(span.to_string());

    // 3. Truncated array: close after the last syntactically complete
    //    object, or after the last '}' if none completed.
    if !span.trim_end().ends_with(']') {
        if let Some(cut) = last_complete_object_end(span) {
            out.push(format!("{}]", &span[..cut]));
        } else if let Some(brace) = span.rfind('}') {
            out.push(format!("{}]", &span[..=brace]));
        }
    }

    // 4. Trailing comma before the close.
    let body = span.trim_end().trim_end_matches(']').trim_end();
    if let Some(stripped) = body.strip_suffix(',') {
        out.push(format!("{stripped}]"));
    }

    // 5. Cut at the last top-level comma and close.
    if let Some(comma) = last_top_level_comma(span) {
        out.push(format!("{}]", &span[..comma]));
    }

    out
}

fn try_parse(candidate: &str) -> Option<Vec<serde_json::Value>> {
    serde_json::from_str::<Vec<serde_json::Value>>(candidate).ok()
}

fn convert(values: Vec<serde_json::Value>) -> Vec<RawAiItem> {
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<RawAiItem>(value) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("skipping malformed result item: {e}");
                None
            }
        })
        .collect()
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json" etc.) on the opening fence line
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().trim_end_matches("```").trim()
}

/// Byte offset just past the `}` of the last complete top-level object in a
/// `[...` span. Tracks string and escape state so braces inside string
/// values do not confuse the scan.
fn last_complete_object_end(span: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut last_end = None;
    for (i, c) in span.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => depth += 1,
            '}' | ']' if !in_string => {
                depth = depth.saturating_sub(1);
                // depth 1 means we are back at array level
                if c == '}' && depth == 1 {
                    last_end = Some(i + 1);
                }
            }
            _ => {}
        }
    }
    if let Some(end) = last_end {
        debug!("recovered truncated array at byte {end}");
    }
    last_end
}

/// Byte offset of the last comma at array depth, outside strings.
fn last_top_level_comma(span: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut last = None;
    for (i, c) in span.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => depth += 1,
            '}' | ']' if !in_string => depth = depth.saturating_sub(1),
            ',' if !in_string && depth == 1 => last = Some(i),
            _ => {}
        }
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITEM: &str = r#"{"correctionIndex": 0, "selectedValue": "먹었다", "confidence": 95, "reasoning": "past tense spelling"}"#;

    #[test]
    fn test_clean_array_parses() {
        let raw = format!("[{ITEM}]");
        let items = parse_items(&raw).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].selected_value, "먹었다");
        assert_eq!(items[0].confidence, 95.0);
    }

    #[test]
    fn test_fenced_block() {
        let raw = format!("```json\n[{ITEM}]\n```");
        assert_eq!(parse_items(&raw).unwrap().len(), 1);
    }

    #[test]
    fn test_surrounding_prose() {
        let raw = format!("Here is my analysis:\n[{ITEM}]\nLet me know!");
        assert_eq!(parse_items(&raw).unwrap().len(), 1);
    }

    #[test]
    fn test_truncated_mid_object() {
        // Second object is cut off mid-string; the first must survive
        let raw = format!(r#"[{ITEM}, {{"correctionIndex": 1, "selectedValue": "않 got cu"#);
        let items = parse_items(&raw).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].correction_index, 0);
    }

    #[test]
    fn test_truncated_with_brace_in_string() {
        // A '}' inside a string value must not count as an object end
        let tricky =
            r#"{"correctionIndex": 0, "selectedValue": "ا}", "confidence": 90, "reasoning": "has } inside"}"#;
        let raw = format!(r#"[{tricky}, {{"correctionIndex": 1, "sele"#);
        let items = parse_items(&raw).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].selected_value, "ا}");
    }

    #[test]
    fn test_trailing_comma() {
        let raw = format!("[{ITEM},]");
        assert_eq!(parse_items(&raw).unwrap().len(), 1);
    }

    #[test]
    fn test_item_missing_required_fields_is_skipped() {
        let raw = format!(r#"[{ITEM}, {{"confidence": 10}}]"#);
        let items = parse_items(&raw).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_defaults_for_optional_fields() {
        let raw = r#"[{"correctionIndex": 2, "selectedValue": "않"}]"#;
        let items = parse_items(raw).unwrap();
        assert_eq!(items[0].confidence, 50.0);
        assert!(!items[0].is_exception_processed);
        assert!(items[0].reasoning.is_empty());
    }

    #[test]
    fn test_unrecoverable_output_is_an_error() {
        assert!(matches!(
            parse_items("I could not produce JSON, sorry."),
            Err(AnalysisError::ResponseParse(_))
        ));
    }
}
