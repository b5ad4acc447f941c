//! Turns raw generated text into a record carrying an `insights` list.
//!
//! The model is asked for bare JSON but routinely wraps it in markdown
//! fences or surrounds it with prose. Extraction strips the fences, takes the
//! first `{` through the last `}` as the payload and parses it once. Anything
//! that still fails to parse is replaced by a fixed two-item fallback record.
//! The span is not brace-balanced, so stray braces in surrounding prose make
//! the parse fail.

use regex::Regex;
use serde_json::{Value, json};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static JSON_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```json\s*").expect("valid regex"));
static ANY_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```\s*").expect("valid regex"));

pub const FALLBACK_CONFIDENCES: [f64; 2] = [0.6, 0.5];

/// Outcome of extraction; every branch carries a record with `insights`.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// The payload parsed as JSON and is returned untouched.
    Parsed(Value),
    /// Text was present but unparseable; the fixed fallback record.
    Fallback(Value),
    /// Generation produced no text; `{"insights": []}`.
    Unavailable(Value),
}

impl Extraction {
    pub fn branch(&self) -> &'static str {
        match self {
            Self::Parsed(_) => "parsed",
            Self::Fallback(_) => "fallback",
            Self::Unavailable(_) => "unavailable",
        }
    }

    pub fn is_degraded(&self) -> bool {
        !matches!(self, Self::Parsed(_))
    }

    pub fn into_record(self) -> Value {
        match self {
            Self::Parsed(v) | Self::Fallback(v) | Self::Unavailable(v) => v,
        }
    }
}

pub fn extract(raw: Option<&str>, query: &str) -> Extraction {
    let Some(raw) = raw else {
        info!(branch = "unavailable", "No generated text to extract");
        return Extraction::Unavailable(json!({ "insights": [] }));
    };

    let stripped = strip_code_fences(raw);
    let candidate = json_span(&stripped);
    debug!(raw_chars = raw.len(), candidate_chars = candidate.len(), "Isolated JSON candidate");

    match serde_json::from_str::<Value>(candidate) {
        Ok(parsed) => {
            let count = parsed.get("insights").and_then(Value::as_array).map(Vec::len);
            info!(branch = "parsed", insights = ?count, "Generated text parsed");
            Extraction::Parsed(parsed)
        }
        Err(e) => {
            warn!(
                branch = "fallback",
                error = %e,
                near = %problem_area(candidate, e.line(), e.column()),
                "Generated text is not valid JSON, using fallback insights"
            );
            Extraction::Fallback(fallback_record(query))
        }
    }
}

/// Removes "```json" openers and any remaining "```" markers, each with the
/// whitespace that follows it.
pub fn strip_code_fences(text: &str) -> String {
    let text = JSON_FENCE.replace_all(text, "");
    ANY_FENCE.replace_all(&text, "").into_owned()
}

/// First `{` through last `}`, or the whole text when there is no such span.
pub fn json_span(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    }
}

pub fn fallback_record(query: &str) -> Value {
    json!({
        "insights": [
            {
                "title": "Manual Fallback Insight 1",
                "detail": "The generated response could not be parsed into structured insights. Review the cited sources directly for details.",
                "confidence": FALLBACK_CONFIDENCES[0],
                "category": "General"
            },
            {
                "title": "Manual Fallback Insight 2",
                "detail": format!(
                    "This is a fallback insight. The search found relevant sources about: {query}. Consider researching this topic further with the sources provided."
                ),
                "confidence": FALLBACK_CONFIDENCES[1],
                "category": "General"
            }
        ]
    })
}

/// Up to 50 chars either side of a parse error. `column` is serde_json's
/// one-based column, which counts bytes.
fn problem_area(text: &str, line: usize, column: usize) -> String {
    let Some(line) = text.lines().nth(line.saturating_sub(1)) else { return String::new() };
    let byte_col = column.saturating_sub(1);
    let at = line.char_indices().take_while(|(i, _)| *i < byte_col).count();
    let chars: Vec<char> = line.chars().collect();
    chars[at.saturating_sub(50)..(at + 50).min(chars.len())].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insights(extraction: &Extraction) -> &Vec<Value> {
        match extraction {
            Extraction::Parsed(v) | Extraction::Fallback(v) | Extraction::Unavailable(v) => {
                v["insights"].as_array().expect("insights array")
            }
        }
    }

    #[test]
    fn fenced_json_yields_items_in_order() {
        let raw = "```json\n{\"insights\": [{\"title\": \"A\"}, {\"title\": \"B\"}, {\"title\": \"C\"}]}\n```";
        let out = extract(Some(raw), "q");

        assert_eq!(out.branch(), "parsed");
        let titles: Vec<_> = insights(&out).iter().map(|i| i["title"].as_str().unwrap()).collect();
        assert_eq!(titles, ["A", "B", "C"]);
    }

    #[test]
    fn bare_fence_and_prose_are_ignored() {
        let raw = "Here are your insights:\n```\n{\"insights\": [{\"title\": \"Only\"}]}\n```\nHope this helps.";
        let out = extract(Some(raw), "q");
        assert!(!out.is_degraded());
        assert_eq!(insights(&out).len(), 1);
    }

    #[test]
    fn parsed_record_is_returned_as_is() {
        let raw = r#"{"insights": [{"title": "T", "confidence": 7}], "extra": true}"#;
        let record = extract(Some(raw), "q").into_record();
        assert_eq!(record, serde_json::from_str::<Value>(raw).unwrap());
    }

    #[test]
    fn invalid_json_yields_fallback() {
        let out = extract(Some("I cannot help with that request."), "email marketing for dentists");

        assert_eq!(out.branch(), "fallback");
        assert!(out.is_degraded());
        let items = insights(&out);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i["category"] == "General"));
        assert_eq!(items[0]["confidence"], 0.6);
        assert_eq!(items[1]["confidence"], 0.5);
        assert!(items[1]["detail"].as_str().unwrap().contains("email marketing for dentists"));
    }

    #[test]
    fn trailing_comma_is_not_repaired() {
        let raw = r#"{"insights": [{"title": "A"},]}"#;
        assert_eq!(extract(Some(raw), "q").branch(), "fallback");
    }

    #[test]
    fn stray_braces_in_prose_are_not_balanced() {
        let raw = "Use {brand} voice.\n{\"insights\": [{\"title\": \"A\"}]}";
        assert_eq!(extract(Some(raw), "q").branch(), "fallback");
    }

    #[test]
    fn absent_text_yields_empty_insights() {
        let out = extract(None, "q");
        assert_eq!(out, Extraction::Unavailable(json!({ "insights": [] })));
        assert!(out.is_degraded());
    }

    #[test]
    fn empty_text_is_malformed_not_absent() {
        assert_eq!(extract(Some(""), "q").branch(), "fallback");
    }

    #[test]
    fn span_falls_back_to_whole_text() {
        assert_eq!(json_span("no braces here"), "no braces here");
        assert_eq!(json_span("} backwards {"), "} backwards {");
        assert_eq!(json_span("a {x} b {y} c"), "{x} b {y}");
    }

    #[test]
    fn fences_are_stripped_with_following_whitespace() {
        assert_eq!(strip_code_fences("```json\n  {}\n```  "), "{}\n");
        assert_eq!(strip_code_fences("```\n[1]```"), "[1]");
    }

    #[test]
    fn problem_area_handles_multibyte_text() {
        let area = problem_area("ünïcödé {broken", 1, 9);
        assert!(area.contains("broken"));
        assert_eq!(problem_area("x", 5, 0), "");
    }

    #[test]
    fn problem_area_centers_on_byte_column() {
        let line = format!("{}!{}", "é".repeat(100), "a".repeat(10));
        // '!' starts at byte 200, so serde_json reports column 201.
        let area = problem_area(&line, 1, 201);
        assert_eq!(area, format!("{}!{}", "é".repeat(50), "a".repeat(10)));
    }

    #[test]
    fn problem_area_uses_reported_error_position() {
        let text = format!("{{\"title\": \"{}\", oops}}", "ü".repeat(80));
        let err = serde_json::from_str::<Value>(&text).unwrap_err();
        let area = problem_area(&text, err.line(), err.column());
        assert!(area.contains("oops"), "{area}");
        assert!(area.starts_with('ü'), "{area}");
    }
}
