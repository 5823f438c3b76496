//! Error-tolerant parsing of the vision model's prescription response.
//!
//! The model is asked for `{ "medications": [...], "rawText": "..." }` but
//! its output is free text and routinely malformed. Parsing is a sequence of
//! fallback strategies tried in order, each returning either a complete
//! result or insufficient (`None`):
//!
//! 1. Strict JSON — trimmed output is a JSON object with a `medications`
//!    field (items parsed leniently, bad items skipped).
//! 2. Field families — tolerant regex extraction of names, doses, durations
//!    and quantities from pseudo-JSON or free text, with name backfill and
//!    placeholder padding.
//!
//! Recovery never fails: when both strategies come up empty the result is an
//! empty medication list and the caller displays the raw response.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::models::{placeholder_name, Medication, NOT_SPECIFIED};

use super::annotate::COMMON_MEDICINES;

/// Structured content recovered from a model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPrescription {
    pub medications: Vec<Medication>,
    /// The `rawText` field when the response carried one.
    pub raw_text: Option<String>,
}

impl ParsedPrescription {
    fn empty() -> Self {
        Self {
            medications: Vec::new(),
            raw_text: None,
        }
    }
}

/// Parse a model response into medications, degrading gracefully.
pub fn parse_prescription_response(response: &str) -> ParsedPrescription {
    if let Some(parsed) = strict_json(response) {
        tracing::debug!(
            medications = parsed.medications.len(),
            "Response parsed as strict JSON"
        );
        return parsed;
    }
    if let Some(parsed) = field_families(response) {
        tracing::debug!(
            medications = parsed.medications.len(),
            "Response recovered via field-family extraction"
        );
        return parsed;
    }
    tracing::warn!(
        response_len = response.len(),
        "No medication data recoverable from response"
    );
    ParsedPrescription::empty()
}

// ──────────────────────────────────────────────
// Strategy 1: strict JSON
// ──────────────────────────────────────────────

fn strict_json(response: &str) -> Option<ParsedPrescription> {
    let trimmed = response.trim();
    if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
        return None;
    }

    let value: Value = serde_json::from_str(trimmed).ok()?;
    let obj = value.as_object()?;
    // A response without the medications field is insufficient even when it
    // is valid JSON; the regex strategy may still find embedded arrays.
    let items = obj.get("medications")?.as_array()?;

    let medications = items
        .iter()
        .filter_map(|item| {
            let med = item.as_object()?;
            let name = coerce_string(med.get("name")?)?;
            Some(Medication::from_recovered(
                name,
                field_or_default(med, "dosesPerDay"),
                field_or_default(med, "duration"),
                field_or_default(med, "totalQuantity"),
            ))
        })
        .collect();

    let raw_text = obj.get("rawText").and_then(coerce_string);

    Some(ParsedPrescription {
        medications,
        raw_text,
    })
}

fn field_or_default(obj: &serde_json::Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(coerce_string)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| NOT_SPECIFIED.to_string())
}

/// Accept strings and bare numbers; models frequently emit `"dosesPerDay": 2`.
fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ──────────────────────────────────────────────
// Strategy 2: field-family extraction
// ──────────────────────────────────────────────

static NAME_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(?:medicineNames|names)"\s*:\s*\[([^\]]*)\]"#).unwrap());
static DOSE_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""doses"\s*:\s*\[([^\]]*)\]"#).unwrap());
static DURATION_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""durations"\s*:\s*\[([^\]]*)\]"#).unwrap());
static QUANTITY_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""quantities"\s*:\s*\[([^\]]*)\]"#).unwrap());

static NAME_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""name"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap());
static DOSE_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""dosesPerDay"\s*:\s*"?([^",}\n]+)"?"#).unwrap());
static DURATION_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""duration"\s*:\s*"?([^",}\n]+)"?"#).unwrap());
static QUANTITY_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""totalQuantity"\s*:\s*"?([^",}\n]+)"?"#).unwrap());

static RAW_TEXT_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""rawText"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap());

/// Capitalized word sequences that plausibly start a medicine name.
static CAPITALIZED_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][a-z]{3,}(?:\s+[A-Z][a-z]+)*").unwrap());

/// Words a capitalized-run scan must never mistake for a medicine.
const NAME_STOPWORDS: &[&str] = &[
    "Take", "Give", "Apply", "Patient", "Doctor", "Daily", "Morning", "Evening", "Night",
    "Tablet", "Tablets", "Capsule", "Capsules", "Medication", "Medications", "Prescription",
    "Quantity", "Duration", "Doses", "After", "Before", "With", "Food", "Water", "Specified",
];

fn field_families(response: &str) -> Option<ParsedPrescription> {
    let mut names = extract_array(&NAME_ARRAY, response)
        .unwrap_or_else(|| extract_repeated(&NAME_FIELD, response));
    let doses = extract_array(&DOSE_ARRAY, response)
        .unwrap_or_else(|| extract_repeated(&DOSE_FIELD, response));
    let durations = extract_array(&DURATION_ARRAY, response)
        .unwrap_or_else(|| extract_repeated(&DURATION_FIELD, response));
    let quantities = extract_array(&QUANTITY_ARRAY, response)
        .unwrap_or_else(|| extract_repeated(&QUANTITY_FIELD, response));

    let max_len = names
        .len()
        .max(doses.len())
        .max(durations.len())
        .max(quantities.len());
    if max_len == 0 {
        return None;
    }

    // Dosage data without names: backfill from text before resorting to
    // placeholders.
    if names.is_empty() {
        names = backfill_names(response, max_len);
    }

    let medications = (0..max_len)
        .map(|i| {
            let name = names
                .get(i)
                .cloned()
                .unwrap_or_else(|| placeholder_name(i));
            Medication::from_recovered(
                name,
                padded(&doses, i),
                padded(&durations, i),
                padded(&quantities, i),
            )
        })
        .collect();

    let raw_text = RAW_TEXT_FIELD
        .captures(response)
        .map(|c| unescape(&c[1]));

    Some(ParsedPrescription {
        medications,
        raw_text,
    })
}

fn padded(family: &[String], index: usize) -> String {
    family
        .get(index)
        .cloned()
        .unwrap_or_else(|| NOT_SPECIFIED.to_string())
}

/// Pull items out of a bracketed array body, tolerating stray quote and
/// escape artifacts.
fn extract_array(pattern: &Regex, response: &str) -> Option<Vec<String>> {
    let body = pattern.captures(response)?.get(1)?.as_str();
    let items: Vec<String> = body
        .split(',')
        .map(clean_item)
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

/// Collect every match of a repeated per-object field.
fn extract_repeated(pattern: &Regex, response: &str) -> Vec<String> {
    pattern
        .captures_iter(response)
        .map(|c| clean_item(&c[1]))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Strip surrounding quotes, stray backslashes, and escape artifacts.
fn clean_item(raw: &str) -> String {
    let unescaped = unescape(raw.trim());
    unescaped
        .trim_matches(|c| c == '"' || c == '\'' || c == '\\')
        .trim()
        .to_string()
}

fn unescape(raw: &str) -> String {
    raw.replace("\\\"", "\"")
        .replace("\\n", "\n")
        .replace("\\\\", "\\")
}

/// Last-resort name recovery: known medicine names appearing in the text,
/// then capitalized word runs. Returns at most `needed` names; the caller
/// fills the rest with placeholders.
fn backfill_names(response: &str, needed: usize) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let lower = response.to_lowercase();

    // Known medicines, ordered by first appearance.
    let mut known: Vec<(usize, &str)> = COMMON_MEDICINES
        .iter()
        .filter_map(|name| lower.find(name).map(|pos| (pos, *name)))
        .collect();
    known.sort_by_key(|(pos, _)| *pos);
    for (_, name) in known {
        if names.len() == needed {
            return names;
        }
        let display = capitalize(name);
        if !names.contains(&display) {
            names.push(display);
        }
    }

    // Capitalized runs, with obvious non-name words trimmed off. A run like
    // "Give Zyloprim" keeps "Zyloprim"; a run that is all stopwords yields
    // nothing.
    for m in CAPITALIZED_RUN.find_iter(response) {
        if names.len() == needed {
            break;
        }
        let Some(candidate) = trim_stopwords(m.as_str()) else {
            continue;
        };
        if !names.contains(&candidate) {
            names.push(candidate);
        }
    }

    names
}

/// Strip leading and trailing stopwords from a capitalized run. None when
/// nothing is left.
fn trim_stopwords(run: &str) -> Option<String> {
    let words: Vec<&str> = run.split_whitespace().collect();
    let start = words.iter().position(|w| !NAME_STOPWORDS.contains(w))?;
    let end = words.iter().rposition(|w| !NAME_STOPWORDS.contains(w))?;
    Some(words[start..=end].join(" "))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
