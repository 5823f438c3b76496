use std::env;

/// Application-level constants
pub const APP_NAME: &str = "RxScan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    "rxscan=info".to_string()
}

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models";

/// Endpoint used by the connectivity probe. Returns 204 with an empty body.
pub const DEFAULT_PROBE_URL: &str = "https://www.google.com/generate_204";

/// Seconds before the connectivity probe gives up.
pub const PROBE_TIMEOUT_SECS: u64 = 5;

/// Remote OCR configuration, sourced from the environment.
///
/// An empty API key is representable on purpose: the remote adapter reports
/// it as a configuration error at call time, which is what triggers the
/// local fallback.
#[derive(Debug, Clone)]
pub struct RemoteOcrConfig {
    pub api_key: String,
    pub model: String,
    pub api_url: String,
    pub timeout_secs: u64,
}

impl RemoteOcrConfig {
    pub fn new(api_key: &str, model: &str, api_url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            timeout_secs: 60,
        }
    }

    /// Read GEMINI_API_KEY, GEMINI_MODEL, and GEMINI_API_URL, falling back
    /// to defaults for everything but the key.
    pub fn from_env() -> Self {
        Self::new(
            &env::var("GEMINI_API_KEY").unwrap_or_default(),
            &env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string()),
            &env::var("GEMINI_API_URL").unwrap_or_else(|_| DEFAULT_GEMINI_API_URL.to_string()),
        )
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Full generateContent URL for this model.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}:generateContent?key={}",
            self.api_url, self.model, self.api_key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_combines_url_model_and_key() {
        let config =
            RemoteOcrConfig::new("secret", "gemini-2.0-flash", "https://api.example.com/models/");
        assert_eq!(
            config.endpoint(),
            "https://api.example.com/models/gemini-2.0-flash:generateContent?key=secret"
        );
    }

    #[test]
    fn empty_key_is_detectable() {
        let config = RemoteOcrConfig::new("", DEFAULT_GEMINI_MODEL, DEFAULT_GEMINI_API_URL);
        assert!(!config.has_api_key());
        let config = RemoteOcrConfig::new("k", DEFAULT_GEMINI_MODEL, DEFAULT_GEMINI_API_URL);
        assert!(config.has_api_key());
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
