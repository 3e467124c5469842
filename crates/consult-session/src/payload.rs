//! Lenient parsing of model replies.
//!
//! Replies are free text that usually, but not always, contain one JSON
//! object. The outermost `{...}` block is taken and everything around it
//! (prose, code fences) is ignored.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use consult_core::types::Diagnosis;

use crate::ports::ExtractedSymptoms;

/// Shown when a resolver gives a disease but leaves the other fields empty.
pub const NOT_AVAILABLE: &str = "Not available";

fn json_block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{[\s\S]*\}").expect("valid regex literal"))
}

/// The outermost brace-delimited block of `text`, if any.
pub fn json_block(text: &str) -> Option<&str> {
    json_block_pattern().find(text).map(|m| m.as_str())
}

/// Interpret an extraction reply.
///
/// - A JSON object with a `symptoms` array becomes [`ExtractedSymptoms::Structured`];
///   non-string elements are skipped.
/// - A JSON object without one is malformed and yields no symptoms.
/// - Text with no JSON object is treated as a delimited list.
pub fn parse_extraction_reply(text: &str) -> ExtractedSymptoms {
    let Some(block) = json_block(text) else {
        debug!("Extraction reply has no JSON object, treating as delimited text");
        return ExtractedSymptoms::Delimited(text.to_string());
    };

    let value: Value = match serde_json::from_str(block) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "Extraction reply JSON did not parse");
            return ExtractedSymptoms::empty();
        }
    };

    match value.get("symptoms").and_then(Value::as_array) {
        Some(items) => ExtractedSymptoms::Structured(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        ),
        None => {
            warn!("Extraction reply has no `symptoms` array");
            ExtractedSymptoms::empty()
        }
    }
}

/// Interpret a diagnosis reply. `None` when no usable diagnosis is present.
pub fn parse_diagnosis_reply(text: &str) -> Option<Diagnosis> {
    let block = json_block(text)?;
    let value: Value = serde_json::from_str(block).ok()?;
    let diagnosis = Diagnosis {
        disease: text_field(&value, "disease")?,
        description: text_field(&value, "description")?,
        precautions: text_field(&value, "precautions")?,
    };
    let diagnosis = sanitize_diagnosis(diagnosis);
    if diagnosis.is_unknown() {
        None
    } else {
        Some(diagnosis)
    }
}

/// A string field, or a list of strings joined with `", "`.
fn text_field(value: &Value, name: &str) -> Option<String> {
    match value.get(name)? {
        Value::String(text) => Some(text.clone()),
        Value::Array(items) => items
            .iter()
            .map(Value::as_str)
            .collect::<Option<Vec<_>>>()
            .map(|parts| parts.join(", ")),
        _ => None,
    }
}

/// Like [`parse_diagnosis_reply`] but falls back to [`Diagnosis::unknown`].
pub fn diagnosis_or_unknown(text: &str) -> Diagnosis {
    parse_diagnosis_reply(text).unwrap_or_else(|| {
        debug!("Diagnosis reply unusable, using Unknown");
        Diagnosis::unknown()
    })
}

/// Trim every field. An empty disease becomes the `Unknown` sentinel; empty
/// description or precautions become [`NOT_AVAILABLE`].
pub fn sanitize_diagnosis(diagnosis: Diagnosis) -> Diagnosis {
    let disease = diagnosis.disease.trim();
    if disease.is_empty() || disease.eq_ignore_ascii_case(Diagnosis::UNKNOWN_DISEASE) {
        return Diagnosis::unknown();
    }
    let or_na = |s: &str| {
        let s = s.trim();
        if s.is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            s.to_string()
        }
    };
    Diagnosis {
        disease: disease.to_string(),
        description: or_na(&diagnosis.description),
        precautions: or_na(&diagnosis.precautions),
    }
}
