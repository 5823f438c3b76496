//! RxScan: prescription digitization.
//!
//! Turns a photographed prescription into a structured medication list:
//! image preprocessing, OCR through a remote generative vision API with a
//! local engine fallback, recovery of structured data from malformed model
//! output, medical term annotation, a mock medicine catalog, an in-memory
//! cart with checkout, and PDF export.

pub mod cart;
pub mod catalog;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod report;

use tracing_subscriber::EnvFilter;

/// Initializes tracing with RUST_LOG, falling back to the default filter.
/// Call once at startup; calling again is an error from the subscriber.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
}
