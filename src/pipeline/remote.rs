//! Remote OCR via a generative vision API (Gemini-shaped wire format).
//!
//! The adapter base64-encodes the image, asks the model for a structured
//! JSON payload, and runs the recovery cascade over whatever text comes
//! back. Transport and configuration problems are errors (they trigger the
//! orchestrator's fallback); malformed model output never is.

use std::sync::Arc;
use std::time::Instant;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::config::RemoteOcrConfig;
use crate::models::{Provider, RecognizedText, RecognizedWord};

use super::annotate::annotate_medical_terms;
use super::recovery::parse_prescription_response;
use super::OcrError;

/// The API reports no quality score; this default mirrors the confidence a
/// clean vision extraction deserves without ever claiming certainty.
pub const REMOTE_DEFAULT_CONFIDENCE: f32 = 95.0;

const EXTRACTION_PROMPT: &str = "\
Extract all text from this prescription or medical document. Respond with a \
single JSON object of the shape {\"medications\": [{\"name\": string, \
\"dosesPerDay\": string, \"duration\": string, \"totalQuantity\": string}], \
\"rawText\": string} where rawText is the full text content. Use \"Not \
specified\" for any field the document does not state. Return only the JSON \
object without comments, markdown or analysis.";

/// Seam for the generative vision API; lets tests swap the HTTP client out.
pub trait GenerativeVision: Send + Sync {
    fn generate(
        &self,
        prompt: &str,
        mime_type: &str,
        base64_image: &str,
    ) -> Result<String, OcrError>;
}

// ──────────────────────────────────────────────
// Wire format
// ──────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Inline { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    top_p: f32,
    top_k: u32,
}

#[derive(Serialize)]
struct SafetySetting<'a> {
    category: &'a str,
    threshold: &'a str,
}

const SAFETY_CATEGORIES: &[&str] = &[
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

// ──────────────────────────────────────────────
// GeminiClient
// ──────────────────────────────────────────────

/// HTTP client for the generateContent endpoint.
pub struct GeminiClient {
    config: RemoteOcrConfig,
    client: reqwest::blocking::Client,
}

impl GeminiClient {
    pub fn new(config: RemoteOcrConfig) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");
        Self { config, client }
    }

    pub fn from_env() -> Self {
        Self::new(RemoteOcrConfig::from_env())
    }
}

impl GenerativeVision for GeminiClient {
    fn generate(
        &self,
        prompt: &str,
        mime_type: &str,
        base64_image: &str,
    ) -> Result<String, OcrError> {
        if !self.config.has_api_key() {
            return Err(OcrError::MissingApiKey);
        }

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: prompt },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type,
                            data: base64_image,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                max_output_tokens: 800,
                top_p: 0.8,
                top_k: 40,
            },
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|category| SafetySetting {
                    category,
                    threshold: "BLOCK_NONE",
                })
                .collect(),
        };

        let response = self
            .client
            .post(self.config.endpoint())
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    OcrError::Http(format!("Connection failed: {e}"))
                } else if e.is_timeout() {
                    OcrError::Http(format!(
                        "Request timed out after {}s",
                        self.config.timeout_secs
                    ))
                } else {
                    OcrError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(OcrError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| OcrError::ResponseParsing(e.to_string()))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap_or_default();

        Ok(text)
    }
}

/// Mock vision API for tests: a canned response or a canned error.
pub struct MockVision {
    response: Result<String, fn() -> OcrError>,
}

impl MockVision {
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
        }
    }

    pub fn failing(make_error: fn() -> OcrError) -> Self {
        Self {
            response: Err(make_error),
        }
    }
}

impl GenerativeVision for MockVision {
    fn generate(&self, _: &str, _: &str, _: &str) -> Result<String, OcrError> {
        match &self.response {
            Ok(text) => Ok(text.clone()),
            Err(make_error) => Err(make_error()),
        }
    }
}

// ──────────────────────────────────────────────
// RemoteOcr adapter
// ──────────────────────────────────────────────

/// Adapter over a [`GenerativeVision`] client. Tags `Provider::Remote` and
/// either returns a complete [`RecognizedText`] or an error — never a
/// partial result.
pub struct RemoteOcr {
    vision: Arc<dyn GenerativeVision>,
}

impl RemoteOcr {
    pub fn new(vision: Arc<dyn GenerativeVision>) -> Self {
        Self { vision }
    }

    pub fn recognize(&self, image_bytes: &[u8]) -> Result<RecognizedText, OcrError> {
        let _span = tracing::info_span!("remote_ocr", image_size = image_bytes.len()).entered();
        let start = Instant::now();

        let mime_type = sniff_mime_type(image_bytes);
        let base64_image = base64::engine::general_purpose::STANDARD.encode(image_bytes);

        let response = self
            .vision
            .generate(EXTRACTION_PROMPT, mime_type, &base64_image)?;

        let parsed = parse_prescription_response(&response);
        let text = parsed
            .raw_text
            .unwrap_or_else(|| response.trim().to_string());

        let annotated = annotate_medical_terms(&text);
        let words: Vec<RecognizedWord> = annotated
            .text
            .split_whitespace()
            .map(|w| RecognizedWord {
                text: w.to_string(),
                confidence: REMOTE_DEFAULT_CONFIDENCE,
                bounding_box: None,
            })
            .collect();

        let elapsed = start.elapsed().as_secs_f64();
        tracing::info!(
            medications = parsed.medications.len(),
            text_len = annotated.text.len(),
            elapsed_s = elapsed,
            "Remote OCR complete"
        );

        Ok(RecognizedText {
            text: annotated.text,
            confidence: REMOTE_DEFAULT_CONFIDENCE,
            words: Some(words),
            source_language: Some("eng".to_string()),
            detected_medical_terms: Some(annotated.terms),
            processing_time: Some(elapsed),
            provider: Provider::Remote,
            medications: if parsed.medications.is_empty() {
                None
            } else {
                Some(parsed.medications)
            },
        })
    }
}

/// Best-effort MIME detection from magic bytes; the API only needs a hint.
fn sniff_mime_type(image_bytes: &[u8]) -> &'static str {
    match image::guess_format(image_bytes) {
        Ok(image::ImageFormat::Jpeg) => "image/jpeg",
        Ok(image::ImageFormat::Png) => "image/png",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_response_yields_medications() {
        let response = r#"{"medications": [{"name": "Metformin", "dosesPerDay": "2", "duration": "30 days", "totalQuantity": "60 tablets"}], "rawText": "Metformin 500mg twice daily"}"#;
        let remote = RemoteOcr::new(Arc::new(MockVision::new(response)));

        let result = remote.recognize(b"fake-image").unwrap();
        assert_eq!(result.provider, Provider::Remote);
        assert_eq!(result.confidence, REMOTE_DEFAULT_CONFIDENCE);
        assert_eq!(result.text, "Metformin 500mg twice daily");
        let meds = result.medications.unwrap();
        assert_eq!(meds.len(), 1);
        assert_eq!(meds[0].name, "Metformin");
    }

    #[test]
    fn free_text_response_still_succeeds() {
        let remote = RemoteOcr::new(Arc::new(MockVision::new(
            "Rx\nParacetamol 500mg\nTake twice daily",
        )));
        let result = remote.recognize(b"img").unwrap();
        assert!(result.medications.is_none());
        assert!(result.text.contains("Paracetamol"));
        assert_eq!(result.provider, Provider::Remote);
    }

    #[test]
    fn words_synthesized_with_flat_confidence() {
        let remote = RemoteOcr::new(Arc::new(MockVision::new("one two three")));
        let result = remote.recognize(b"img").unwrap();
        let words = result.words.unwrap();
        assert_eq!(words.len(), 3);
        assert!(words
            .iter()
            .all(|w| w.confidence == REMOTE_DEFAULT_CONFIDENCE && w.bounding_box.is_none()));
    }

    #[test]
    fn detected_terms_populated() {
        let remote = RemoteOcr::new(Arc::new(MockVision::new("Amoxicillin 500 mg tid")));
        let result = remote.recognize(b"img").unwrap();
        let terms = result.detected_medical_terms.unwrap();
        assert!(terms.iter().any(|t| t == "mg"));
        assert!(terms.iter().any(|t| t == "tid"));
    }

    #[test]
    fn vision_error_propagates() {
        let remote = RemoteOcr::new(Arc::new(MockVision::failing(|| OcrError::Api {
            status: 503,
            body: "overloaded".into(),
        })));
        let err = remote.recognize(b"img").unwrap_err();
        assert!(matches!(err, OcrError::Api { status: 503, .. }));
    }

    #[test]
    fn missing_key_rejected_before_any_network_call() {
        let client = GeminiClient::new(RemoteOcrConfig::new("", "model", "http://localhost:9"));
        let err = client.generate("p", "image/png", "aGk=").unwrap_err();
        assert!(matches!(err, OcrError::MissingApiKey));
    }

    #[test]
    fn mime_sniffing_recognizes_png_and_jpeg() {
        assert_eq!(sniff_mime_type(b"\x89PNG\r\n\x1a\n        "), "image/png");
        assert_eq!(sniff_mime_type(b"\xff\xd8\xff\xe0 JFIF    "), "image/jpeg");
        assert_eq!(sniff_mime_type(b"unknown bytes"), "image/png");
    }

    #[test]
    fn request_body_serializes_expected_shape() {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: "prompt" },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: "image/png",
                            data: "QUJD",
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                max_output_tokens: 800,
                top_p: 0.8,
                top_k: 40,
            },
            safety_settings: vec![SafetySetting {
                category: "HARM_CATEGORY_HARASSMENT",
                threshold: "BLOCK_NONE",
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "prompt");
        assert_eq!(
            json["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "image/png"
        );
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 800);
        assert_eq!(json["safetySettings"][0]["threshold"], "BLOCK_NONE");
    }

    #[test]
    fn response_envelope_parses() {
        let raw = r#"{"candidates": [{"content": {"parts": [{"text": "extracted"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.candidates[0].content.parts[0].text, "extracted");
    }
}
