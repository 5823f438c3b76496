//! Mock medicine lookup. Stands in for a real pharmacy search backend: a
//! deterministic hash of the medicine name picks brand, form, and price from
//! fixed tables, and roughly one name in twenty is reported as not found so
//! the UI paths for misses stay honest.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::models::{Medication, MedicineInfo};

const BRANDS: &[&str] = &[
    "Sun Pharma",
    "Cipla",
    "Dr. Reddy's",
    "Lupin",
    "Zydus",
    "Intas",
    "Mankind",
    "Alkem",
    "Torrent",
];

const DOSAGE_FORMS: &[&str] = &[
    "Tablet",
    "Capsule",
    "Syrup",
    "Injection",
    "Cream",
    "Ointment",
    "Gel",
    "Drops",
    "Suspension",
];

static QUANTITY_IN_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\d+\s*(tablets?|capsules?|ml|mg|g)").unwrap());

/// 31x rolling hash over UTF-16 code units with 32-bit wrapping, absolute
/// value taken at the end. Matches the Java/JavaScript string hash so ids
/// stay stable across the stack.
pub fn name_hash(name: &str) -> u32 {
    let mut hash: i32 = 0;
    for unit in name.encode_utf16() {
        hash = hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(unit as i32);
    }
    hash.unsigned_abs()
}

/// Deterministic pseudo-search over a synthetic catalog.
pub struct MedicineCatalog {
    /// Simulated per-search latency; off by default so tests run instantly.
    latency: Option<Duration>,
}

impl MedicineCatalog {
    pub fn new() -> Self {
        Self { latency: None }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Look a medicine up by name. Deterministic: the same name always
    /// yields the same entry, and names whose hash is a multiple of 20 are
    /// always "not found".
    pub fn search(&self, name: &str) -> Option<MedicineInfo> {
        tracing::debug!(medicine = name, "Searching catalog");
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }

        let hash = name_hash(name);
        if hash % 20 == 0 {
            return None;
        }

        let quantity = QUANTITY_IN_NAME
            .find(name)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "1 Pack".to_string());

        Some(MedicineInfo {
            id: format!("MED{hash}"),
            name: name.to_string(),
            brand: BRANDS[hash as usize % BRANDS.len()].to_string(),
            price: f64::from(10 + hash % 990) / 10.0,
            dosage_form: DOSAGE_FORMS[hash as usize % DOSAGE_FORMS.len()].to_string(),
            quantity,
            image: format!("https://picsum.photos/seed/{hash}/200/200"),
            original_medication: None,
        })
    }

    /// Resolve each confirmed medication against the catalog, dropping
    /// misses. Placeholder-named medications are skipped — there is nothing
    /// meaningful to search for.
    pub fn search_all(&self, medications: &[Medication]) -> Vec<MedicineInfo> {
        self.scrape_with_progress(medications, |_, _, _| {})
    }

    /// Sequential search with progress reporting: the callback receives
    /// `(searched_count, total_count, current_name)` before each search and
    /// a final `(total, total, "")` once every medication is done.
    pub fn scrape_with_progress<F>(
        &self,
        medications: &[Medication],
        mut on_progress: F,
    ) -> Vec<MedicineInfo>
    where
        F: FnMut(usize, usize, &str),
    {
        let eligible: Vec<&Medication> = medications
            .iter()
            .filter(|m| m.is_confirmed_name)
            .collect();
        let total = eligible.len();
        let mut results = Vec::new();

        for (searched, medication) in eligible.iter().enumerate() {
            on_progress(searched, total, &medication.name);

            if let Some(mut info) = self.search(&medication.name) {
                // Prefer the quantity the prescription actually specified.
                if medication.has_quantity() {
                    info.quantity = medication.total_quantity.clone();
                }
                info.original_medication = Some((*medication).clone());
                results.push(info);
            }
        }

        if total > 0 {
            on_progress(total, total, "");
        }

        tracing::info!(
            requested = medications.len(),
            eligible = total,
            found = results.len(),
            "Catalog search complete"
        );
        results
    }
}

impl Default for MedicineCatalog {
    fn default() -> Self {
        Self::new()
    }
}
