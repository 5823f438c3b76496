pub mod annotate;
pub mod network;
pub mod ocr;
pub mod orchestrator;
pub mod preprocess;
pub mod recovery;
pub mod remote;

pub use annotate::*;
pub use network::*;
pub use ocr::*;
pub use orchestrator::*;
pub use preprocess::*;
pub use recovery::*;
pub use remote::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("OCR initialization failed: {0}")]
    OcrInit(String),

    #[error("OCR configuration error: {0}")]
    OcrConfig(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("Tessdata not found at: {0}")]
    TessdataNotFound(PathBuf),

    #[error("Remote OCR API key is not configured")]
    MissingApiKey,

    #[error("HTTP transport error: {0}")]
    Http(String),

    #[error("Remote OCR API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("Response parsing failed: {0}")]
    ResponseParsing(String),
}
