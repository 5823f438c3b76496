//! Local OCR: engine abstraction, the bundled Tesseract implementation, and
//! the adapter that turns raw engine output into a [`RecognizedText`].

use std::sync::Arc;
use std::time::Instant;

use crate::models::{BoundingBox, Provider, RecognizedText, RecognizedWord};

use super::annotate::annotate_medical_terms;
use super::preprocess::binarize;
use super::OcrError;

/// Options for an OCR run. Mirrors the in-UI toggles.
#[derive(Debug, Clone)]
pub struct OcrOptions {
    /// Language codes, tried one recognition pass each; the best pass wins.
    pub languages: Vec<String>,
    /// Binarize the image before recognition.
    pub preprocess: bool,
    /// Run medical-term detection/correction on the recognized text.
    pub medical_terms: bool,
    /// Prefer the remote vision API when the network allows it.
    pub prefer_online: bool,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            languages: vec!["eng".to_string()],
            preprocess: true,
            medical_terms: true,
            prefer_online: true,
        }
    }
}

/// Raw output of one engine pass.
#[derive(Debug)]
pub struct OcrPageOutput {
    pub text: String,
    /// 0–100.
    pub confidence: f32,
    pub words: Vec<RecognizedWord>,
}

/// OCR engine abstraction. Implementations create and release their worker
/// resources per call; a failed pass must not leak them (RAII).
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image_bytes: &[u8], lang: &str) -> Result<OcrPageOutput, OcrError>;
}

// ──────────────────────────────────────────────
// Bundled Tesseract (feature "ocr")
// ──────────────────────────────────────────────

/// Bundled Tesseract engine. Page segmentation and engine mode are fixed to
/// automatic layout + LSTM, matching what works best on printed prescriptions.
#[cfg(feature = "ocr")]
pub struct TesseractEngine {
    tessdata_dir: std::path::PathBuf,
}

#[cfg(feature = "ocr")]
impl TesseractEngine {
    pub fn new(tessdata_dir: &std::path::Path) -> Result<Self, OcrError> {
        if !tessdata_dir.join("eng.traineddata").exists() {
            return Err(OcrError::TessdataNotFound(tessdata_dir.to_path_buf()));
        }
        Ok(Self {
            tessdata_dir: tessdata_dir.to_path_buf(),
        })
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for TesseractEngine {
    fn recognize(&self, image_bytes: &[u8], lang: &str) -> Result<OcrPageOutput, OcrError> {
        let tessdata = self
            .tessdata_dir
            .to_str()
            .ok_or_else(|| OcrError::OcrInit("Invalid tessdata path".into()))?;

        // The engine value is dropped on every exit path, releasing the
        // worker before any error propagates.
        let tess = tesseract::Tesseract::new(Some(tessdata), Some(lang))
            .map_err(|e| OcrError::OcrInit(format!("{e:?}")))?;

        let tess = tess
            .set_variable("tessedit_pageseg_mode", "3")
            .and_then(|t| t.set_variable("tessedit_ocr_engine_mode", "1"))
            .and_then(|t| t.set_variable("preserve_interword_spaces", "1"))
            .map_err(|e| OcrError::OcrConfig(format!("{e:?}")))?;

        let mut tess = tess
            .set_image_from_mem(image_bytes)
            .map_err(|e| OcrError::OcrProcessing(format!("{e:?}")))?;

        let text = tess
            .get_text()
            .map_err(|e| OcrError::OcrProcessing(format!("{e:?}")))?;

        let confidence = tess.mean_text_conf().max(0) as f32;

        let words = match tess.get_tsv_text(0) {
            Ok(tsv) => parse_tsv_words(&tsv),
            // Degrade to whitespace-split words at page confidence.
            Err(_) => text
                .split_whitespace()
                .map(|w| RecognizedWord {
                    text: w.to_string(),
                    confidence,
                    bounding_box: None,
                })
                .collect(),
        };

        Ok(OcrPageOutput {
            text,
            confidence,
            words,
        })
    }
}

/// Parse Tesseract TSV output into words with confidence and geometry.
/// Columns: level page_num block_num par_num line_num word_num left top
/// width height conf text. Level 5 rows are words; confidence -1 means the
/// engine could not score the word and clamps to 0.
pub fn parse_tsv_words(tsv: &str) -> Vec<RecognizedWord> {
    let mut words = Vec::new();

    for line in tsv.lines().skip(1) {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        let level: i32 = match fields[0].parse() {
            Ok(l) => l,
            Err(_) => continue,
        };
        if level != 5 {
            continue;
        }

        let conf: i32 = match fields[10].parse() {
            Ok(c) => c,
            Err(_) => continue,
        };

        let text = fields[11].trim();
        if text.is_empty() {
            continue;
        }

        words.push(RecognizedWord {
            text: text.to_string(),
            confidence: conf.max(0) as f32,
            bounding_box: parse_box(fields[6], fields[7], fields[8], fields[9]),
        });
    }

    words
}

/// Convert TSV left/top/width/height into corner coordinates.
/// None when any field fails to parse.
fn parse_box(left: &str, top: &str, width: &str, height: &str) -> Option<BoundingBox> {
    let x0: u32 = left.parse().ok()?;
    let y0: u32 = top.parse().ok()?;
    let w: u32 = width.parse().ok()?;
    let h: u32 = height.parse().ok()?;
    Some(BoundingBox {
        x0,
        y0,
        x1: x0 + w,
        y1: y0 + h,
    })
}

// ──────────────────────────────────────────────
// Mock engine
// ──────────────────────────────────────────────

/// Mock OCR engine for tests. Returns configured text/confidence, or fails
/// when the input matches a configured trigger.
pub struct MockOcrEngine {
    text: String,
    confidence: f32,
    fail_on: Option<Vec<u8>>,
}

impl MockOcrEngine {
    pub fn new(text: &str, confidence: f32) -> Self {
        Self {
            text: text.to_string(),
            confidence,
            fail_on: None,
        }
    }

    /// Fail recognition for this exact input.
    pub fn with_failure_on(mut self, image_bytes: &[u8]) -> Self {
        self.fail_on = Some(image_bytes.to_vec());
        self
    }
}

impl OcrEngine for MockOcrEngine {
    fn recognize(&self, image_bytes: &[u8], _lang: &str) -> Result<OcrPageOutput, OcrError> {
        if self.fail_on.as_deref() == Some(image_bytes) {
            return Err(OcrError::OcrProcessing("simulated engine failure".into()));
        }
        let words = self
            .text
            .split_whitespace()
            .map(|w| RecognizedWord {
                text: w.to_string(),
                confidence: self.confidence,
                bounding_box: None,
            })
            .collect();
        Ok(OcrPageOutput {
            text: self.text.clone(),
            confidence: self.confidence,
            words,
        })
    }
}

// ──────────────────────────────────────────────
// LocalOcr adapter
// ──────────────────────────────────────────────

/// Adapter over an [`OcrEngine`]: optional preprocessing, one pass per
/// configured language with the best-confidence pass winning, optional
/// medical-term annotation. Always tags `Provider::Local`.
pub struct LocalOcr {
    engine: Arc<dyn OcrEngine>,
}

impl LocalOcr {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self { engine }
    }

    pub fn recognize(
        &self,
        image_bytes: &[u8],
        options: &OcrOptions,
    ) -> Result<RecognizedText, OcrError> {
        let _span = tracing::info_span!(
            "local_ocr",
            languages = ?options.languages,
            preprocess = options.preprocess,
            image_size = image_bytes.len(),
        )
        .entered();
        let start = Instant::now();

        let processed;
        let input: &[u8] = if options.preprocess {
            processed = binarize(image_bytes)?;
            &processed
        } else {
            image_bytes
        };

        let default_lang = ["eng".to_string()];
        let languages: &[String] = if options.languages.is_empty() {
            &default_lang
        } else {
            &options.languages
        };

        // One pass per language; keep the pass the engine scored highest.
        let mut best: Option<OcrPageOutput> = None;
        for lang in languages {
            let pass = self.engine.recognize(input, lang)?;
            let better = best
                .as_ref()
                .map_or(true, |current| pass.confidence > current.confidence);
            if better {
                best = Some(pass);
            }
        }
        let page = best.ok_or_else(|| OcrError::OcrProcessing("No recognition pass ran".into()))?;

        let (text, detected_terms) = if options.medical_terms {
            let annotated = annotate_medical_terms(&page.text);
            (annotated.text, Some(annotated.terms))
        } else {
            (page.text, None)
        };

        let elapsed = start.elapsed().as_secs_f64();
        tracing::info!(
            confidence = page.confidence,
            words = page.words.len(),
            elapsed_s = elapsed,
            "Local OCR complete"
        );

        Ok(RecognizedText {
            text,
            confidence: page.confidence.clamp(0.0, 100.0),
            words: Some(page.words),
            source_language: languages.first().cloned(),
            detected_medical_terms: detected_terms,
            processing_time: Some(elapsed),
            provider: Provider::Local,
            medications: None,
        })
    }
}
