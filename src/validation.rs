//! Field validation hooks.
//!
//! The host calls a [`FieldValidator`] synchronously for each image-bearing
//! field being saved. Validators fail open: if the API cannot answer, the
//! content goes through. Only a likelihood inside the configured set produces
//! a message.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::alt_text::AltTextSource;
use crate::annotations::{self, SafeSearchCategory};
use crate::client::VisionClient;
use crate::types::{DetectionFeature, LikelihoodSet};

pub const SAFE_SEARCH_MESSAGE: &str = "This image contains explicit content and will not be saved.";
pub const USER_EMOTION_MESSAGE: &str = "Please upload a photo where the people in it look happy.";

/// Per-field flags stored by the host alongside the field definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSettings {
    /// Reject explicit content.
    pub safe_search: bool,
    /// Warn when faces do not look happy.
    pub emotion_detect: bool,
    /// Where to take generated alt text from.
    pub alt_auto_filling: AltTextSource,
}

/// The image value of a field being validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageItem {
    /// Referenced file id; `None` when nothing is attached.
    pub target_id: Option<u64>,
    /// Stored file reference, e.g. `public://2024/cat.jpg`.
    pub file_uri: Option<String>,
}

impl ImageItem {
    pub fn new(target_id: u64, file_uri: impl Into<String>) -> Self {
        Self {
            target_id: Some(target_id),
            file_uri: Some(file_uri.into()),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Maps a stored file reference to a readable filesystem path.
pub trait PathResolver: Send + Sync {
    fn realpath(&self, uri: &str) -> Option<PathBuf>;
}

/// Resolves `scheme://relative/path` against per-scheme base directories.
/// Plain paths are returned as-is.
#[derive(Debug, Clone, Default)]
pub struct LocalPathResolver {
    schemes: HashMap<String, PathBuf>,
}

impl LocalPathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>, base: impl Into<PathBuf>) -> Self {
        self.schemes.insert(scheme.into(), base.into());
        self
    }
}

impl PathResolver for LocalPathResolver {
    fn realpath(&self, uri: &str) -> Option<PathBuf> {
        let Some((scheme, rest)) = uri.split_once("://") else {
            return (!uri.is_empty()).then(|| PathBuf::from(uri));
        };

        let base = self.schemes.get(scheme)?;
        let rel = Path::new(rest);
        // Stay under the base directory.
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        Some(base.join(rel))
    }
}

/// Messages collected while validating one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationContext {
    violations: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A rejection: the host must refuse the save.
    pub fn add_violation(&mut self, message: impl Into<String>) {
        self.violations.push(message.into());
    }

    /// Shown to the user; does not block the save.
    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A validation hook for one image field.
///
/// Implementations only append to `ctx`; they never error and never stop
/// other validators from running.
#[async_trait]
pub trait FieldValidator: Send + Sync {
    async fn validate(&self, item: &ImageItem, settings: &FieldSettings, ctx: &mut ValidationContext);
}

/// Run every validator against `item` in order.
pub async fn validate_field(
    validators: &[&dyn FieldValidator],
    item: &ImageItem,
    settings: &FieldSettings,
    ctx: &mut ValidationContext,
) {
    for validator in validators {
        validator.validate(item, settings, ctx).await;
    }
}

fn attached_path(item: &ImageItem, resolver: &dyn PathResolver) -> Option<PathBuf> {
    item.target_id.filter(|id| *id != 0)?;
    let uri = item.file_uri.as_deref()?;
    let path = resolver.realpath(uri);
    if path.is_none() {
        tracing::debug!(uri, "Could not resolve file reference; skipping vision check");
    }
    path
}

/// Which safe-search categories reject an image, and at what likelihood.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafeSearchPolicy {
    pub categories: Vec<SafeSearchCategory>,
    pub thresholds: LikelihoodSet,
    pub message: String,
}

impl Default for SafeSearchPolicy {
    fn default() -> Self {
        Self {
            categories: vec![SafeSearchCategory::Adult],
            thresholds: LikelihoodSet::explicit_content(),
            message: SAFE_SEARCH_MESSAGE.to_string(),
        }
    }
}

impl SafeSearchPolicy {
    pub fn with_thresholds(mut self, thresholds: LikelihoodSet) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_categories(mut self, categories: Vec<SafeSearchCategory>) -> Self {
        self.categories = categories;
        self
    }
}

/// Rejects images the API rates as explicit.
#[derive(Clone)]
pub struct SafeSearchValidator {
    client: VisionClient,
    resolver: Arc<dyn PathResolver>,
    policy: SafeSearchPolicy,
}

impl SafeSearchValidator {
    pub fn new(client: VisionClient, resolver: Arc<dyn PathResolver>) -> Self {
        Self {
            client,
            resolver,
            policy: SafeSearchPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SafeSearchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &SafeSearchPolicy {
        &self.policy
    }
}

#[async_trait]
impl FieldValidator for SafeSearchValidator {
    async fn validate(&self, item: &ImageItem, settings: &FieldSettings, ctx: &mut ValidationContext) {
        if !settings.safe_search {
            return;
        }
        let Some(path) = attached_path(item, self.resolver.as_ref()) else {
            return;
        };
        let Some(doc) = self.client.detect(DetectionFeature::SafeSearch, &path).await else {
            return;
        };
        let Some(annotation) = annotations::safe_search(&doc) else {
            return;
        };

        let flagged = self
            .policy
            .categories
            .iter()
            .find(|c| self.policy.thresholds.contains(annotation.likelihood(**c)));

        if let Some(category) = flagged {
            tracing::info!(
                ?category,
                likelihood = %annotation.likelihood(*category),
                file_id = ?item.target_id,
                "Image rejected by safe search"
            );
            ctx.add_violation(self.policy.message.clone());
        }
    }
}

/// Warns when the first detected face does not look joyful.
#[derive(Clone)]
pub struct UserEmotionValidator {
    client: VisionClient,
    resolver: Arc<dyn PathResolver>,
    thresholds: LikelihoodSet,
    message: String,
}

impl UserEmotionValidator {
    pub fn new(client: VisionClient, resolver: Arc<dyn PathResolver>) -> Self {
        Self {
            client,
            resolver,
            thresholds: LikelihoodSet::not_joyful(),
            message: USER_EMOTION_MESSAGE.to_string(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: LikelihoodSet) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

#[async_trait]
impl FieldValidator for UserEmotionValidator {
    async fn validate(&self, item: &ImageItem, settings: &FieldSettings, ctx: &mut ValidationContext) {
        if !settings.emotion_detect {
            return;
        }
        let Some(path) = attached_path(item, self.resolver.as_ref()) else {
            return;
        };
        let Some(doc) = self.client.detect(DetectionFeature::Face, &path).await else {
            return;
        };

        if let Some(face) = annotations::faces(&doc).first() {
            if self.thresholds.contains(face.joy_likelihood) {
                ctx.add_warning(self.message.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ImageSource;
    use crate::error::TransportError;
    use crate::retry::RetryConfig;
    use crate::transport::MockTransport;
    use crate::types::{Likelihood, VisionConfig};
    use serde_json::{json, Value};

    struct StaticImage;

    #[async_trait]
    impl ImageSource for StaticImage {
        async fn read(&self, _path: &Path) -> std::io::Result<Vec<u8>> {
            Ok(b"jpeg".to_vec())
        }
    }

    fn client_returning(doc: Value, calls: usize) -> VisionClient {
        let mut mock = MockTransport::new();
        mock.expect_post().times(calls).returning(move |_, _| Ok(doc.clone()));
        VisionClient::with_transport(
            VisionConfig::with_api_key("test-key").retry(RetryConfig::disabled()),
            Arc::new(mock),
        )
        .with_image_source(Arc::new(StaticImage))
    }

    fn resolver() -> Arc<dyn PathResolver> {
        Arc::new(LocalPathResolver::new().with_scheme("public", "/srv/files"))
    }

    fn safe_search_doc(adult: &str) -> Value {
        json!({"responses": [{"safeSearchAnnotation": {"adult": adult}}]})
    }

    fn enabled() -> FieldSettings {
        FieldSettings {
            safe_search: true,
            emotion_detect: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn likely_adult_content_is_rejected_once() {
        let validator = SafeSearchValidator::new(client_returning(safe_search_doc("LIKELY"), 1), resolver());
        let mut ctx = ValidationContext::new();

        validator
            .validate(&ImageItem::new(1, "public://a.jpg"), &enabled(), &mut ctx)
            .await;

        assert_eq!(ctx.violations(), &[SAFE_SEARCH_MESSAGE.to_string()]);
        assert!(!ctx.is_valid());
    }

    #[tokio::test]
    async fn very_unlikely_adult_content_passes() {
        let validator =
            SafeSearchValidator::new(client_returning(safe_search_doc("VERY_UNLIKELY"), 1), resolver());
        let mut ctx = ValidationContext::new();

        validator
            .validate(&ImageItem::new(1, "public://a.jpg"), &enabled(), &mut ctx)
            .await;

        assert!(ctx.is_valid());
    }

    #[tokio::test]
    async fn possible_passes_with_default_policy_but_not_with_wider_one() {
        let item = ImageItem::new(1, "public://a.jpg");

        let default = SafeSearchValidator::new(client_returning(safe_search_doc("POSSIBLE"), 1), resolver());
        let mut ctx = ValidationContext::new();
        default.validate(&item, &enabled(), &mut ctx).await;
        assert!(ctx.is_valid());

        let strict = SafeSearchValidator::new(client_returning(safe_search_doc("POSSIBLE"), 1), resolver())
            .with_policy(SafeSearchPolicy::default().with_thresholds(LikelihoodSet::new([
                Likelihood::Possible,
                Likelihood::Likely,
                Likelihood::VeryLikely,
            ])));
        let mut ctx = ValidationContext::new();
        strict.validate(&item, &enabled(), &mut ctx).await;
        assert_eq!(ctx.violations().len(), 1);
    }

    #[tokio::test]
    async fn several_flagged_categories_still_give_one_violation() {
        let doc = json!({"responses": [{"safeSearchAnnotation": {"adult": "VERY_LIKELY", "violence": "LIKELY"}}]});
        let validator = SafeSearchValidator::new(client_returning(doc, 1), resolver()).with_policy(
            SafeSearchPolicy::default()
                .with_categories(vec![SafeSearchCategory::Adult, SafeSearchCategory::Violence]),
        );
        let mut ctx = ValidationContext::new();
        validator
            .validate(&ImageItem::new(1, "public://a.jpg"), &enabled(), &mut ctx)
            .await;
        assert_eq!(ctx.violations().len(), 1);
    }

    #[tokio::test]
    async fn disabled_flag_skips_the_api() {
        let validator = SafeSearchValidator::new(client_returning(safe_search_doc("VERY_LIKELY"), 0), resolver());
        let mut ctx = ValidationContext::new();
        validator
            .validate(&ImageItem::new(1, "public://a.jpg"), &FieldSettings::default(), &mut ctx)
            .await;
        assert!(ctx.is_valid());
    }

    #[tokio::test]
    async fn missing_image_skips_the_api() {
        let validator = SafeSearchValidator::new(client_returning(safe_search_doc("VERY_LIKELY"), 0), resolver());
        let mut ctx = ValidationContext::new();
        validator.validate(&ImageItem::empty(), &enabled(), &mut ctx).await;
        validator
            .validate(&ImageItem::new(1, "private://a.jpg"), &enabled(), &mut ctx)
            .await;
        assert!(ctx.is_valid());
    }

    #[tokio::test]
    async fn timeout_fails_open_and_is_recorded() {
        let mut mock = MockTransport::new();
        mock.expect_post().times(1).returning(|url, _| {
            Err(TransportError::Timeout {
                url: url.to_string(),
            })
        });
        let client = VisionClient::with_transport(
            VisionConfig::with_api_key("test-key").retry(RetryConfig::disabled()),
            Arc::new(mock),
        )
        .with_image_source(Arc::new(StaticImage));

        let validator = SafeSearchValidator::new(client.clone(), resolver());
        let mut ctx = ValidationContext::new();
        validator
            .validate(&ImageItem::new(1, "public://a.jpg"), &enabled(), &mut ctx)
            .await;

        assert!(ctx.violations().is_empty());
        assert_eq!(client.stats().transport_failures, 1);
    }

    #[tokio::test]
    async fn unhappy_face_produces_warning_only() {
        let doc = json!({"responses": [{"faceAnnotations": [{"joyLikelihood": "VERY_UNLIKELY"}]}]});
        let validator = UserEmotionValidator::new(client_returning(doc, 1), resolver());
        let mut ctx = ValidationContext::new();
        validator
            .validate(&ImageItem::new(3, "public://team.jpg"), &enabled(), &mut ctx)
            .await;

        assert!(ctx.is_valid());
        assert_eq!(ctx.warnings(), &[USER_EMOTION_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn happy_face_is_silent() {
        let doc = json!({"responses": [{"faceAnnotations": [{"joyLikelihood": "VERY_LIKELY"}]}]});
        let validator = UserEmotionValidator::new(client_returning(doc, 1), resolver());
        let mut ctx = ValidationContext::new();
        validator
            .validate(&ImageItem::new(3, "public://team.jpg"), &enabled(), &mut ctx)
            .await;
        assert!(ctx.warnings().is_empty());
    }

    #[tokio::test]
    async fn validate_field_runs_every_validator() {
        let doc = json!({"responses": [{
            "safeSearchAnnotation": {"adult": "VERY_LIKELY"},
            "faceAnnotations": [{"joyLikelihood": "UNLIKELY"}]
        }]});
        let safe = SafeSearchValidator::new(client_returning(doc.clone(), 1), resolver());
        let emotion = UserEmotionValidator::new(client_returning(doc, 1), resolver());

        let validators: [&dyn FieldValidator; 2] = [&safe, &emotion];
        let mut ctx = ValidationContext::new();
        validate_field(
            &validators,
            &ImageItem::new(9, "public://x.png"),
            &enabled(),
            &mut ctx,
        )
        .await;

        assert_eq!(ctx.violations().len(), 1);
        assert_eq!(ctx.warnings().len(), 1);
    }

    #[test]
    fn resolver_maps_schemes_and_refuses_escapes() {
        let r = LocalPathResolver::new().with_scheme("public", "/srv/files");
        assert_eq!(r.realpath("public://2024/a.jpg"), Some(PathBuf::from("/srv/files/2024/a.jpg")));
        assert_eq!(r.realpath("public://../etc/passwd"), None);
        assert_eq!(r.realpath("s3://bucket/a.jpg"), None);
        assert_eq!(r.realpath("/tmp/a.jpg"), Some(PathBuf::from("/tmp/a.jpg")));
        assert_eq!(r.realpath(""), None);
    }

    #[test]
    fn field_settings_from_host_json() {
        let settings: FieldSettings =
            serde_json::from_value(json!({"safe_search": true, "alt_auto_filling": "labels"})).unwrap();
        assert!(settings.safe_search);
        assert!(!settings.emotion_detect);
        assert_eq!(settings.alt_auto_filling, AltTextSource::Labels);
    }
}
