use serde::{Deserialize, Serialize};

use super::medication::Medication;

/// Provenance of an OCR result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Local recognition engine.
    Local,
    /// Remote generative vision API.
    Remote,
}

/// Bounding box for a recognized word, in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

/// A single recognized word with its confidence.
///
/// Real geometry comes only from the local engine; the remote adapter
/// synthesizes words by whitespace-splitting the text with a flat confidence
/// and no bounding box.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizedWord {
    pub text: String,
    /// 0–100.
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

/// Result of one OCR invocation. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedText {
    pub text: String,
    /// Provider-reported or provider-default quality score, 0–100.
    /// Not independently verified.
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<RecognizedWord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_medical_terms: Option<Vec<String>>,
    /// Wall-clock seconds spent producing this result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
    pub provider: Provider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medications: Option<Vec<Medication>>,
}

impl RecognizedText {
    /// Synthetic result standing in for a failed image in a batch.
    pub fn error_placeholder(message: String) -> Self {
        Self {
            text: message,
            confidence: 0.0,
            words: None,
            source_language: None,
            detected_medical_terms: None,
            processing_time: None,
            provider: Provider::Local,
            medications: None,
        }
    }
}

/// Outcome of an orchestrated scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub recognized: RecognizedText,
    /// True only when the remote path was attempted, failed, and the local
    /// engine produced this result instead.
    pub using_fallback: bool,
    /// Monotonic request id; callers drop results superseded by a newer scan.
    pub seq: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Provider::Local).unwrap(), "\"local\"");
        assert_eq!(
            serde_json::to_string(&Provider::Remote).unwrap(),
            "\"remote\""
        );
    }

    #[test]
    fn error_placeholder_has_zero_confidence() {
        let r = RecognizedText::error_placeholder("Error processing scan.png".into());
        assert_eq!(r.confidence, 0.0);
        assert_eq!(r.provider, Provider::Local);
        assert!(r.words.is_none());
        assert!(r.medications.is_none());
    }

    #[test]
    fn optional_fields_omitted_from_json() {
        let r = RecognizedText::error_placeholder("err".into());
        let json = serde_json::to_string(&r).unwrap();
        assert!(!json.contains("words"));
        assert!(!json.contains("processingTime"));
        assert!(json.contains("\"provider\":\"local\""));
    }
}
