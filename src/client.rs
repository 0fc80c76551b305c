use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{is_empty_value, Result, TransportError, VisionError};
use crate::request::build_request;
use crate::retry::with_retry;
use crate::stats::{DetectionStats, StatsSnapshot};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{DetectionFeature, VisionConfig};

/// Reads image bytes for the client. The client never persists them.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn read(&self, path: &Path) -> std::io::Result<Vec<u8>>;
}

/// [`ImageSource`] reading from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsImageSource;

#[async_trait]
impl ImageSource for FsImageSource {
    async fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }
}

/// Async client for the Cloud Vision `images:annotate` endpoint.
///
/// Every detection is one fresh round-trip; nothing is cached. The client is
/// immutable after construction and cheap to clone, so one instance can be
/// shared across concurrent requests.
///
/// Two flavours of each call exist:
/// - `try_*` returns a [`VisionError`] that says what went wrong.
/// - the plain methods return `Option`, collapsing every failure into `None`.
///
/// Both record the outcome in [`DetectionStats`].
///
/// # Example
/// ```no_run
/// use google_vision::{VisionClient, VisionConfig};
///
/// # async fn example() {
/// let client = VisionClient::new(VisionConfig::with_api_key("my-key"));
/// if let Some(doc) = client.label_detection("photo.jpg").await {
///     println!("{}", doc["responses"][0]["labelAnnotations"]);
/// }
/// # }
/// ```
#[derive(Clone)]
pub struct VisionClient {
    config: Arc<VisionConfig>,
    transport: Arc<dyn Transport>,
    images: Arc<dyn ImageSource>,
    stats: Arc<DetectionStats>,
}

impl fmt::Debug for VisionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionClient")
            .field("config", &self.config)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

impl VisionClient {
    /// Create a client using `reqwest` and the local filesystem.
    pub fn new(config: VisionConfig) -> Self {
        let transport = ReqwestTransport::new(config.timeout);
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a client over a custom [`Transport`].
    pub fn with_transport(config: VisionConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            images: Arc::new(FsImageSource),
            stats: Arc::new(DetectionStats::new()),
        }
    }

    /// Replace the file-access capability used by the path-based calls.
    pub fn with_image_source(mut self, images: Arc<dyn ImageSource>) -> Self {
        self.images = images;
        self
    }

    /// Share an existing stats sink (e.g. one per process).
    pub fn with_stats(mut self, stats: Arc<DetectionStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Outcome counters since construction.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    // ── Typed API ───────────────────────────────────────────────────

    /// Run `feature` against the image at `path`.
    pub async fn try_detect(&self, feature: DetectionFeature, path: impl AsRef<Path>) -> Result<Value> {
        let outcome = self.detect_path(feature, path.as_ref()).await;
        self.observe(feature, outcome)
    }

    /// Run `feature` against in-memory image bytes.
    pub async fn try_detect_bytes(&self, feature: DetectionFeature, image: &[u8]) -> Result<Value> {
        let outcome = self.annotate(feature, image).await;
        self.observe(feature, outcome)
    }

    // ── Option API ──────────────────────────────────────────────────

    /// Run `feature` against the image at `path`. `None` on any failure.
    pub async fn detect(&self, feature: DetectionFeature, path: impl AsRef<Path>) -> Option<Value> {
        self.try_detect(feature, path).await.ok()
    }

    /// Run `feature` against in-memory image bytes. `None` on any failure.
    pub async fn detect_bytes(&self, feature: DetectionFeature, image: &[u8]) -> Option<Value> {
        self.try_detect_bytes(feature, image).await.ok()
    }

    pub async fn label_detection(&self, path: impl AsRef<Path>) -> Option<Value> {
        self.detect(DetectionFeature::Label, path).await
    }

    pub async fn landmark_detection(&self, path: impl AsRef<Path>) -> Option<Value> {
        self.detect(DetectionFeature::Landmark, path).await
    }

    /// Logos of well-known brands.
    pub async fn logo_detection(&self, path: impl AsRef<Path>) -> Option<Value> {
        self.detect(DetectionFeature::Logo, path).await
    }

    /// Explicit-content likelihoods (`safeSearchAnnotation`).
    pub async fn safe_search_detection(&self, path: impl AsRef<Path>) -> Option<Value> {
        self.detect(DetectionFeature::SafeSearch, path).await
    }

    pub async fn optical_character_recognition(&self, path: impl AsRef<Path>) -> Option<Value> {
        self.detect(DetectionFeature::Text, path).await
    }

    pub async fn face_detection(&self, path: impl AsRef<Path>) -> Option<Value> {
        self.detect(DetectionFeature::Face, path).await
    }

    /// Dominant colors and other image properties.
    pub async fn image_attributes_detection(&self, path: impl AsRef<Path>) -> Option<Value> {
        self.detect(DetectionFeature::ImageProperties, path).await
    }

    // ── Internals ───────────────────────────────────────────────────

    async fn detect_path(&self, feature: DetectionFeature, path: &Path) -> Result<Value> {
        // Checked before touching the file so an unconfigured site does no I/O.
        if !self.config.is_configured() {
            return Err(VisionError::ConfigurationMissing);
        }

        let image = self
            .images
            .read(path)
            .await
            .map_err(|source| VisionError::ImageRead {
                path: path.to_path_buf(),
                source,
            })?;

        self.annotate(feature, &image).await
    }

    async fn annotate(&self, feature: DetectionFeature, image: &[u8]) -> Result<Value> {
        let credential = self
            .config
            .api_key
            .as_ref()
            .ok_or(VisionError::ConfigurationMissing)?;

        let body = build_request(feature, image).to_bytes()?;
        let url = self.config.request_url(credential)?;

        let doc = with_retry(&self.config.retry, TransportError::is_transient, || {
            self.transport.post(&url, &body)
        })
        .await
        .map_err(|e| match e.api_rejection() {
            Some(error) => VisionError::from_api_error(error, e.status()),
            None => VisionError::Transport(e),
        })?;

        if let Some(error) = doc.get("error").filter(|e| !is_empty_value(e)) {
            return Err(VisionError::from_api_error(error, None));
        }

        Ok(doc)
    }

    fn observe(&self, feature: DetectionFeature, outcome: Result<Value>) -> Result<Value> {
        match &outcome {
            Ok(_) => self.stats.record_success(feature),
            Err(e) => self.stats.record_failure(feature, e.kind(), &e.to_string()),
        }
        outcome
    }
}
