use serde::{Deserialize, Serialize};

use super::medication::Medication;

/// A catalog entry produced by the mock medicine lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicineInfo {
    /// Stable id derived from the name hash, e.g. "MED96354".
    pub id: String,
    pub name: String,
    pub brand: String,
    pub price: f64,
    pub dosage_form: String,
    pub quantity: String,
    /// Deterministic placeholder image URL.
    pub image: String,
    /// The prescription medication that triggered this lookup, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_medication: Option<Medication>,
}
