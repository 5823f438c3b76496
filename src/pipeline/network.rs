//! Network reachability: a cheap last-known status plus a real connectivity
//! probe. The orchestrator consults both before attempting the remote path.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::{DEFAULT_PROBE_URL, PROBE_TIMEOUT_SECS};

pub trait NetworkProbe: Send + Sync {
    /// Cheap check: last-known status, optimistic before the first probe.
    fn is_online(&self) -> bool;

    /// Real connectivity check. Updates the cached status.
    fn verify_connectivity(&self) -> bool;
}

/// Probe backed by a HEAD request to a lightweight endpoint.
pub struct HttpNetworkProbe {
    client: reqwest::blocking::Client,
    probe_url: String,
    last_known_online: AtomicBool,
}

impl HttpNetworkProbe {
    pub fn new(probe_url: &str) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(PROBE_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            probe_url: probe_url.to_string(),
            last_known_online: AtomicBool::new(true),
        }
    }
}

impl Default for HttpNetworkProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_URL)
    }
}

impl NetworkProbe for HttpNetworkProbe {
    fn is_online(&self) -> bool {
        self.last_known_online.load(Ordering::Relaxed)
    }

    fn verify_connectivity(&self) -> bool {
        let reachable = match self.client.head(&self.probe_url).send() {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!(probe_url = %self.probe_url, error = %e, "Connectivity probe failed");
                false
            }
        };
        self.last_known_online.store(reachable, Ordering::Relaxed);
        reachable
    }
}

/// Probe with fixed answers for tests.
pub struct MockNetworkProbe {
    online: bool,
    reachable: bool,
}

impl MockNetworkProbe {
    /// Cheap check passes and the real probe succeeds.
    pub fn online() -> Self {
        Self {
            online: true,
            reachable: true,
        }
    }

    /// Cheap check already reports offline.
    pub fn offline() -> Self {
        Self {
            online: false,
            reachable: false,
        }
    }

    /// Cheap check passes but the real probe fails (captive portal style).
    pub fn unreachable() -> Self {
        Self {
            online: true,
            reachable: false,
        }
    }
}

impl NetworkProbe for MockNetworkProbe {
    fn is_online(&self) -> bool {
        self.online
    }

    fn verify_connectivity(&self) -> bool {
        self.reachable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_probe_starts_optimistic() {
        let probe = HttpNetworkProbe::new("http://localhost:1/probe");
        assert!(probe.is_online());
    }

    #[test]
    fn failed_probe_updates_cached_status() {
        // Port 1 refuses connections immediately.
        let probe = HttpNetworkProbe::new("http://127.0.0.1:1/probe");
        assert!(!probe.verify_connectivity());
        assert!(!probe.is_online());
    }

    #[test]
    fn mock_probe_variants() {
        assert!(MockNetworkProbe::online().verify_connectivity());
        assert!(!MockNetworkProbe::offline().is_online());
        let captive = MockNetworkProbe::unreachable();
        assert!(captive.is_online());
        assert!(!captive.verify_connectivity());
    }
}
