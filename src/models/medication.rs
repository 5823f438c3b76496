use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Value used for any medication field the response did not specify.
pub const NOT_SPECIFIED: &str = "Not specified";

/// Synthetic names follow the pattern "Medication N".
static PLACEHOLDER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Medication \d+$").unwrap());

/// One medication entry recovered from a prescription.
///
/// Field names serialize in camelCase to match the wire shape the vision
/// model is asked to produce (`dosesPerDay`, `totalQuantity`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub name: String,
    pub doses_per_day: String,
    pub duration: String,
    pub total_quantity: String,
    /// False when the name was synthesized as a placeholder because the
    /// response carried dosage data but no usable name. Placeholder entries
    /// are not eligible for catalog lookup or cart actions.
    #[serde(default = "default_confirmed")]
    pub is_confirmed_name: bool,
}

fn default_confirmed() -> bool {
    true
}

impl Medication {
    /// Build a medication from recovered fields, deriving the confirmed flag
    /// from the name.
    pub fn from_recovered(
        name: String,
        doses_per_day: String,
        duration: String,
        total_quantity: String,
    ) -> Self {
        let is_confirmed_name = !is_placeholder_name(&name);
        Self {
            name,
            doses_per_day,
            duration,
            total_quantity,
            is_confirmed_name,
        }
    }

    /// Whether the prescription actually specified a total quantity.
    pub fn has_quantity(&self) -> bool {
        !self.total_quantity.is_empty() && self.total_quantity != NOT_SPECIFIED
    }
}

/// Synthetic name for the medication at `index` (zero-based).
pub fn placeholder_name(index: usize) -> String {
    format!("Medication {}", index + 1)
}

/// True for names matching the synthetic "Medication N" pattern.
pub fn is_placeholder_name(name: &str) -> bool {
    PLACEHOLDER_NAME.is_match(name)
}
