//! Medical terminology annotation: abbreviation detection, correction of
//! known OCR misreads, dosage-unit extraction, and conservative fuzzy
//! correction of drug names. Idempotent — re-running on corrected text
//! yields the same term set.

use std::sync::LazyLock;

use regex::Regex;

/// Dosage abbreviations worth surfacing to the user. The value is the
/// normalized display form.
const MEDICAL_DICT: &[(&str, &str)] = &[
    ("mg", "mg"),
    ("ml", "ml"),
    ("mcg", "mcg"),
    ("tsp", "teaspoon"),
    ("tbsp", "tablespoon"),
    // Full forms are detected too so a term found via misread correction is
    // still found when the annotator re-runs on corrected text.
    ("teaspoon", "teaspoon"),
    ("tablespoon", "tablespoon"),
    ("bid", "twice daily"),
    ("tid", "three times daily"),
    ("qid", "four times daily"),
    ("qd", "once daily"),
    ("po", "by mouth"),
    ("prn", "as needed"),
];

/// Lookalike substrings OCR engines commonly produce for dosage units.
/// Replaced literally (case-insensitive) before detection.
const OCR_MISREADS: &[(&str, &str)] = &[
    ("rng", "mg"),
    ("rncg", "mcg"),
    ("rnl", "ml"),
    ("tablespaan", "tablespoon"),
    ("teaspoan", "teaspoon"),
];

/// Medicine names used for fuzzy drug-name correction and for backfilling
/// names during response recovery. Lowercase and sorted for binary search.
pub(crate) const COMMON_MEDICINES: &[&str] = &[
    "amlodipine",
    "amoxicillin",
    "atorvastatin",
    "azithromycin",
    "cetirizine",
    "ciprofloxacin",
    "diclofenac",
    "escitalopram",
    "ibuprofen",
    "levothyroxine",
    "losartan",
    "metformin",
    "metoprolol",
    "metronidazole",
    "montelukast",
    "omeprazole",
    "pantoprazole",
    "paracetamol",
    "prednisolone",
    "sertraline",
];

static DOSAGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*(mg|ml|mcg|g|unit|tablet|capsule|dose|pill)s?\b").unwrap()
});

/// Word-boundary matcher per dictionary entry, compiled once.
static DICT_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    MEDICAL_DICT
        .iter()
        .map(|(abbrev, _full)| {
            (
                Regex::new(&format!(r"(?i)\b{abbrev}\b")).unwrap(),
                *abbrev,
            )
        })
        .collect()
});

/// Substitution matcher per known misread, compiled once.
static MISREAD_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    OCR_MISREADS
        .iter()
        .map(|(misread, replacement)| {
            (
                Regex::new(&format!("(?i){}", regex::escape(misread))).unwrap(),
                *replacement,
            )
        })
        .collect()
});

/// Text plus the deduplicated medical terms found in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotated {
    pub text: String,
    pub terms: Vec<String>,
}

/// Detect and normalize medical terms in recognized text.
///
/// Pass order: dictionary detection on the input, misread substitution,
/// fuzzy drug-name correction, dosage-unit extraction on the corrected text.
/// Each term appears at most once, in detection order.
pub fn annotate_medical_terms(text: &str) -> Annotated {
    let mut terms: Vec<String> = Vec::new();
    let mut push_term = |terms: &mut Vec<String>, term: &str| {
        if !terms.iter().any(|t| t == term) {
            terms.push(term.to_string());
        }
    };

    for (pattern, abbrev) in DICT_PATTERNS.iter() {
        if pattern.is_match(text) {
            push_term(&mut terms, abbrev);
        }
    }

    let mut corrected = text.to_string();
    for (pattern, replacement) in MISREAD_PATTERNS.iter() {
        if pattern.is_match(&corrected) {
            corrected = pattern.replace_all(&corrected, *replacement).into_owned();
            push_term(&mut terms, replacement);
        }
    }

    corrected = correct_drug_names(&corrected);

    for capture in DOSAGE_PATTERN.captures_iter(&corrected) {
        let unit = capture[2].to_lowercase();
        push_term(&mut terms, &unit);
    }

    Annotated {
        text: corrected,
        terms,
    }
}

/// Correct words that are close misspellings of known medicine names.
/// Conservative: only words of 5+ characters with an unambiguous match at
/// edit distance <= 2 are touched, and the original case pattern survives.
pub fn correct_drug_names(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut word = String::new();

    for ch in text.chars() {
        if ch.is_alphanumeric() {
            word.push(ch);
        } else {
            if !word.is_empty() {
                result.push_str(&correct_word(&word));
                word.clear();
            }
            result.push(ch);
        }
    }
    if !word.is_empty() {
        result.push_str(&correct_word(&word));
    }

    result
}

fn correct_word(word: &str) -> String {
    if word.len() < 5 {
        return word.to_string();
    }

    let lower = word.to_lowercase();
    if COMMON_MEDICINES.binary_search(&lower.as_str()).is_ok() {
        return word.to_string();
    }

    let mut best: Option<&str> = None;
    let mut best_distance = 3u32;
    let mut ambiguous = false;

    for &name in COMMON_MEDICINES {
        let len_diff = (word.len() as i32 - name.len() as i32).unsigned_abs();
        if len_diff > 2 {
            continue;
        }
        let dist = edit_distance(&lower, name);
        if dist < best_distance {
            best_distance = dist;
            best = Some(name);
            ambiguous = false;
        } else if dist == best_distance && best.is_some() {
            ambiguous = true;
        }
    }

    match best {
        Some(name) if !ambiguous => preserve_case(word, name),
        _ => word.to_string(),
    }
}

/// Apply the original word's capitalization pattern to the correction.
fn preserve_case(original: &str, correction: &str) -> String {
    if original.chars().all(|c| c.is_uppercase() || !c.is_alphabetic()) {
        return correction.to_uppercase();
    }
    if original.chars().next().is_some_and(|c| c.is_uppercase()) {
        let mut chars = correction.chars();
        match chars.next() {
            Some(c) => {
                let mut s = c.to_uppercase().to_string();
                s.extend(chars);
                s
            }
            None => correction.to_string(),
        }
    } else {
        correction.to_string()
    }
}

/// Levenshtein distance, two-row implementation.
fn edit_distance(a: &str, b: &str) -> u32 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (m, n) = (a_chars.len(), b_chars.len());

    if m == 0 {
        return n as u32;
    }
    if n == 0 {
        return m as u32;
    }

    let mut prev: Vec<u32> = (0..=n as u32).collect();
    let mut curr = vec![0u32; n + 1];

    for (i, &a_ch) in a_chars.iter().enumerate() {
        curr[0] = (i + 1) as u32;
        for (j, &b_ch) in b_chars.iter().enumerate() {
            let cost = if a_ch == b_ch { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}
