//! Final-answer extraction.

use crate::models::Verdict;

/// Marker preceding the label, matched without regard to ASCII case.
pub const FINAL_ANSWER_MARKER: &str = "final answer:";

const NO_ANSWER: &str =
    "Could not determine if the package is malware; no clear final answer provided.";

/// Extract a verdict from the backend's final text.
///
/// Only `malware` and `not malware` (any case, surrounding whitespace
/// ignored) are accepted after the first marker. Anything else is
/// indeterminate; the parser never falls back to a benign label.
pub fn parse_verdict(text: &str) -> Verdict {
    // ASCII lowering keeps byte offsets aligned with `text`
    let Some(start) = text.to_ascii_lowercase().find(FINAL_ANSWER_MARKER) else {
        return Verdict::indeterminate(NO_ANSWER);
    };

    let answer = text[start + FINAL_ANSWER_MARKER.len()..].trim();
    match answer.to_lowercase().as_str() {
        "malware" => Verdict::malware(),
        "not malware" => Verdict::not_malware(),
        _ => Verdict::indeterminate(format!("Invalid final answer received: {}", answer)),
    }
}

/// Whether `text` contains a final-answer marker at all.
pub fn has_final_answer(text: &str) -> bool {
    text.to_ascii_lowercase().contains(FINAL_ANSWER_MARKER)
}
