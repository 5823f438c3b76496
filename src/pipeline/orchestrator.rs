//! OCR orchestration: remote-vs-local routing, single-step fallback, and
//! sequential batch processing with per-image failure isolation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::models::{RecognizedText, ScanResult};

use super::network::NetworkProbe;
use super::ocr::{LocalOcr, OcrOptions};
use super::remote::RemoteOcr;
use super::OcrError;

/// Routes each scan to the remote vision API or the local engine.
///
/// Policy: the remote path is attempted only when the caller prefers it,
/// the cheap network status agrees, and a real connectivity probe succeeds.
/// A remote failure of any kind falls back to the local engine exactly
/// once; a local failure is fatal for that image.
pub struct OcrOrchestrator {
    remote: RemoteOcr,
    local: LocalOcr,
    probe: Arc<dyn NetworkProbe>,
    /// Monotonic scan counter; lets callers discard superseded results.
    next_seq: AtomicU64,
}

impl OcrOrchestrator {
    pub fn new(remote: RemoteOcr, local: LocalOcr, probe: Arc<dyn NetworkProbe>) -> Self {
        Self {
            remote,
            local,
            probe,
            next_seq: AtomicU64::new(0),
        }
    }

    /// Sequence id of the most recently issued scan. A result whose `seq`
    /// is lower is stale: a newer scan was submitted after it started.
    pub fn latest_seq(&self) -> u64 {
        self.next_seq.load(Ordering::SeqCst)
    }

    /// Whether a result with this sequence id is still the newest.
    pub fn is_current(&self, seq: u64) -> bool {
        seq == self.latest_seq()
    }

    /// Run OCR on one image per the routing policy.
    pub fn scan(&self, image_bytes: &[u8], options: &OcrOptions) -> Result<ScanResult, OcrError> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;

        if options.prefer_online && self.probe.is_online() && self.probe.verify_connectivity() {
            match self.remote.recognize(image_bytes) {
                Ok(recognized) => {
                    return Ok(ScanResult {
                        recognized,
                        using_fallback: false,
                        seq,
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Remote OCR failed, falling back to local engine");
                    let recognized = self.local.recognize(image_bytes, options)?;
                    return Ok(ScanResult {
                        recognized,
                        using_fallback: true,
                        seq,
                    });
                }
            }
        }

        // Offline or online not preferred: local is the primary path here,
        // not a fallback.
        let recognized = self.local.recognize(image_bytes, options)?;
        Ok(ScanResult {
            recognized,
            using_fallback: false,
            seq,
        })
    }

    /// Process a batch strictly one image at a time. A failed image becomes
    /// a synthetic zero-confidence error result in its slot; the batch
    /// never aborts.
    pub fn scan_batch(&self, images: &[Vec<u8>], options: &OcrOptions) -> Vec<ScanResult> {
        let mut results = Vec::with_capacity(images.len());

        for (index, image) in images.iter().enumerate() {
            match self.scan(image, options) {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::error!(image_index = index, error = %e, "Batch image failed");
                    results.push(ScanResult {
                        recognized: RecognizedText::error_placeholder(format!(
                            "Error processing image {}: {e}",
                            index + 1
                        )),
                        using_fallback: false,
                        seq: self.latest_seq(),
                    });
                }
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provider;
    use crate::pipeline::network::MockNetworkProbe;
    use crate::pipeline::ocr::MockOcrEngine;
    use crate::pipeline::remote::{MockVision, RemoteOcr, REMOTE_DEFAULT_CONFIDENCE};

    fn options() -> OcrOptions {
        OcrOptions {
            preprocess: false,
            ..OcrOptions::default()
        }
    }

    fn orchestrator_with(
        vision: MockVision,
        engine: MockOcrEngine,
        probe: MockNetworkProbe,
    ) -> OcrOrchestrator {
        OcrOrchestrator::new(
            RemoteOcr::new(Arc::new(vision)),
            LocalOcr::new(Arc::new(engine)),
            Arc::new(probe),
        )
    }

    #[test]
    fn online_preferred_uses_remote() {
        let orch = orchestrator_with(
            MockVision::new("Remote text"),
            MockOcrEngine::new("Local text", 80.0),
            MockNetworkProbe::online(),
        );
        let result = orch.scan(b"img", &options()).unwrap();
        assert_eq!(result.recognized.provider, Provider::Remote);
        assert!(!result.using_fallback);
        assert_eq!(result.recognized.confidence, REMOTE_DEFAULT_CONFIDENCE);
    }

    #[test]
    fn remote_failure_falls_back_to_local() {
        let orch = orchestrator_with(
            MockVision::failing(|| OcrError::MissingApiKey),
            MockOcrEngine::new("Local text", 80.0),
            MockNetworkProbe::online(),
        );
        let result = orch.scan(b"img", &options()).unwrap();
        assert_eq!(result.recognized.provider, Provider::Local);
        assert!(result.using_fallback);
    }

    #[test]
    fn offline_goes_straight_to_local_without_fallback_flag() {
        let orch = orchestrator_with(
            MockVision::new("never used"),
            MockOcrEngine::new("Local text", 75.0),
            MockNetworkProbe::offline(),
        );
        let result = orch.scan(b"img", &options()).unwrap();
        assert_eq!(result.recognized.provider, Provider::Local);
        assert!(!result.using_fallback, "Primary local path is not a fallback");
    }

    #[test]
    fn captive_portal_skips_remote() {
        // Cheap status says online, the real probe disagrees.
        let orch = orchestrator_with(
            MockVision::new("never used"),
            MockOcrEngine::new("Local text", 75.0),
            MockNetworkProbe::unreachable(),
        );
        let result = orch.scan(b"img", &options()).unwrap();
        assert_eq!(result.recognized.provider, Provider::Local);
        assert!(!result.using_fallback);
    }

    #[test]
    fn prefer_online_false_skips_remote() {
        let orch = orchestrator_with(
            MockVision::new("never used"),
            MockOcrEngine::new("Local text", 75.0),
            MockNetworkProbe::online(),
        );
        let opts = OcrOptions {
            prefer_online: false,
            ..options()
        };
        let result = orch.scan(b"img", &opts).unwrap();
        assert_eq!(result.recognized.provider, Provider::Local);
        assert!(!result.using_fallback);
    }

    #[test]
    fn both_paths_failing_is_fatal() {
        let orch = orchestrator_with(
            MockVision::failing(|| OcrError::Http("down".into())),
            MockOcrEngine::new("unused", 80.0).with_failure_on(b"img"),
            MockNetworkProbe::online(),
        );
        assert!(orch.scan(b"img", &options()).is_err());
    }

    #[test]
    fn confidence_always_within_bounds() {
        let orch = orchestrator_with(
            MockVision::new("text"),
            MockOcrEngine::new("text", 80.0),
            MockNetworkProbe::online(),
        );
        let result = orch.scan(b"img", &options()).unwrap();
        assert!((0.0..=100.0).contains(&result.recognized.confidence));
    }

    #[test]
    fn batch_isolates_failing_image() {
        let orch = orchestrator_with(
            MockVision::failing(|| OcrError::Http("down".into())),
            MockOcrEngine::new("Local text", 80.0).with_failure_on(b"image-2"),
            MockNetworkProbe::online(),
        );
        let images = vec![b"image-1".to_vec(), b"image-2".to_vec(), b"image-3".to_vec()];
        let results = orch.scan_batch(&images, &options());

        assert_eq!(results.len(), 3);
        assert_eq!(results[1].recognized.confidence, 0.0);
        assert!(results[1].recognized.text.starts_with("Error processing image 2"));
        for i in [0, 2] {
            assert!(results[i].recognized.confidence > 0.0);
            assert_eq!(results[i].recognized.provider, Provider::Local);
            assert!(results[i].using_fallback);
        }
    }

    #[test]
    fn sequence_ids_are_monotonic_and_stale_detectable() {
        let orch = orchestrator_with(
            MockVision::new("text"),
            MockOcrEngine::new("text", 80.0),
            MockNetworkProbe::online(),
        );
        let first = orch.scan(b"a", &options()).unwrap();
        assert!(orch.is_current(first.seq));

        let second = orch.scan(b"b", &options()).unwrap();
        assert!(second.seq > first.seq);
        assert!(!orch.is_current(first.seq), "Superseded scan must be stale");
        assert!(orch.is_current(second.seq));
    }
}
