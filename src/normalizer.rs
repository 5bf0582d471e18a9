//! Turns free-form model replies into a [`CabinetAnalysisResult`].
//!
//! Replies are parsed as JSON first. When that fails, the span from the first `{` to the
//! last `}` is parsed instead. The span is not brace-balanced, so replies containing several
//! JSON-looking fragments may extract the wrong text and fail to parse.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_TOTAL_SLOTS: i64 = 60;
pub const DEFAULT_CONFIDENCE: &str = "unknown";

/// Maximum number of characters of the reply kept in a [`ParseFailure`].
pub const SNIPPET_CHARS: usize = 200;

static EMBEDDED_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[\s\S]*\}").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CabinetAnalysisResult {
    pub empty_slots: Vec<i64>,
    pub total_slots_visible: i64,
    pub confidence: String,
}

impl Default for CabinetAnalysisResult {
    fn default() -> Self {
        Self {
            empty_slots: Vec::new(),
            total_slots_visible: DEFAULT_TOTAL_SLOTS,
            confidence: DEFAULT_CONFIDENCE.to_string(),
        }
    }
}

impl CabinetAnalysisResult {
    /// Coerces any JSON value into a result, substituting defaults for missing or
    /// wrongly typed fields. Non-object values yield all defaults.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        let empty_slots = object
            .get("emptySlots")
            .and_then(Value::as_array)
            .map(|slots| slots.iter().filter_map(as_integer).collect())
            .unwrap_or_default();

        let total_slots_visible = object
            .get("totalSlotsVisible")
            .and_then(as_integer)
            .unwrap_or(DEFAULT_TOTAL_SLOTS);

        let confidence = object
            .get("confidence")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_CONFIDENCE.to_string());

        Self {
            empty_slots,
            total_slots_visible,
            confidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Could not parse model JSON: {snippet}")]
pub struct ParseFailure {
    pub snippet: String,
}

impl ParseFailure {
    pub fn from_text(text: &str) -> Self {
        Self {
            snippet: text.chars().take(SNIPPET_CHARS).collect(),
        }
    }
}

pub fn normalize(raw_text: &str) -> Result<CabinetAnalysisResult, ParseFailure> {
    let parsed = parse_reply(raw_text).ok_or_else(|| ParseFailure::from_text(raw_text))?;
    Ok(CabinetAnalysisResult::from_value(&parsed))
}

fn parse_reply(raw_text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(raw_text) {
        return Some(value);
    }

    let embedded = EMBEDDED_OBJECT.find(raw_text)?;
    serde_json::from_str(embedded.as_str()).ok()
}

// Fractional numbers truncate toward zero; values outside i64 are rejected.
fn as_integer(value: &Value) -> Option<i64> {
    if let Some(integer) = value.as_i64() {
        return Some(integer);
    }

    let float = value.as_f64()?;
    if float.is_finite() && float >= i64::MIN as f64 && float < i64::MAX as f64 {
        Some(float.trunc() as i64)
    } else {
        None
    }
}
