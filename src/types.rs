use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::TransportError;
use crate::retry::RetryConfig;

/// Default Cloud Vision annotate endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A Cloud Vision API key.
///
/// The secret is never printed: `Debug` and `Display` are redacted so a
/// credential can sit inside configs that get logged.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredential(String);

impl ApiCredential {
    /// Wrap a key. Returns `None` for empty or whitespace-only input, which
    /// the client treats the same as "not configured".
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The raw secret, for building the request URL only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiCredential(***)")
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// One analysis capability of the annotate endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectionFeature {
    Label,
    Landmark,
    Logo,
    SafeSearch,
    Text,
    Face,
    ImageProperties,
}

impl DetectionFeature {
    pub const ALL: [DetectionFeature; 7] = [
        DetectionFeature::Label,
        DetectionFeature::Landmark,
        DetectionFeature::Logo,
        DetectionFeature::SafeSearch,
        DetectionFeature::Text,
        DetectionFeature::Face,
        DetectionFeature::ImageProperties,
    ];

    /// The `features[].type` value sent on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            DetectionFeature::Label => "LABEL_DETECTION",
            DetectionFeature::Landmark => "LANDMARK_DETECTION",
            DetectionFeature::Logo => "LOGO_DETECTION",
            DetectionFeature::SafeSearch => "SAFE_SEARCH_DETECTION",
            DetectionFeature::Text => "TEXT_DETECTION",
            DetectionFeature::Face => "FACE_DETECTION",
            DetectionFeature::ImageProperties => "IMAGE_PROPERTIES",
        }
    }

    /// Fixed `maxResults` cap. Not caller-configurable.
    pub fn max_results(self) -> u32 {
        match self {
            DetectionFeature::Label => 5,
            DetectionFeature::Landmark => 2,
            DetectionFeature::Logo => 2,
            DetectionFeature::SafeSearch => 1,
            DetectionFeature::Text => 10,
            DetectionFeature::Face => 25,
            DetectionFeature::ImageProperties => 5,
        }
    }
}

impl fmt::Display for DetectionFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Ordinal confidence label returned by the API.
///
/// Unrecognised values deserialize as [`Likelihood::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Likelihood {
    #[default]
    Unknown,
    VeryUnlikely,
    Unlikely,
    Possible,
    Likely,
    VeryLikely,
}

impl Likelihood {
    pub fn as_str(self) -> &'static str {
        match self {
            Likelihood::Unknown => "UNKNOWN",
            Likelihood::VeryUnlikely => "VERY_UNLIKELY",
            Likelihood::Unlikely => "UNLIKELY",
            Likelihood::Possible => "POSSIBLE",
            Likelihood::Likely => "LIKELY",
            Likelihood::VeryLikely => "VERY_LIKELY",
        }
    }
}

impl fmt::Display for Likelihood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Likelihood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UNKNOWN" => Ok(Likelihood::Unknown),
            "VERY_UNLIKELY" => Ok(Likelihood::VeryUnlikely),
            "UNLIKELY" => Ok(Likelihood::Unlikely),
            "POSSIBLE" => Ok(Likelihood::Possible),
            "LIKELY" => Ok(Likelihood::Likely),
            "VERY_LIKELY" => Ok(Likelihood::VeryLikely),
            other => Err(format!("Unknown likelihood: {other}")),
        }
    }
}

impl<'de> Deserialize<'de> for Likelihood {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(s.parse().unwrap_or(Likelihood::Unknown))
    }
}

/// Explicit allow-list of likelihoods that trigger a validation rule.
///
/// This is policy data. Each rule owns its own set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LikelihoodSet(BTreeSet<Likelihood>);

impl LikelihoodSet {
    pub fn new(values: impl IntoIterator<Item = Likelihood>) -> Self {
        Self(values.into_iter().collect())
    }

    /// `{LIKELY, VERY_LIKELY}`: rejects explicit content.
    pub fn explicit_content() -> Self {
        Self::new([Likelihood::Likely, Likelihood::VeryLikely])
    }

    /// `{UNLIKELY, VERY_UNLIKELY}`: a face that is probably not joyful.
    pub fn not_joyful() -> Self {
        Self::new([Likelihood::Unlikely, Likelihood::VeryUnlikely])
    }

    pub fn contains(&self, likelihood: Likelihood) -> bool {
        self.0.contains(&likelihood)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Likelihood> + '_ {
        self.0.iter().copied()
    }
}

impl Default for LikelihoodSet {
    fn default() -> Self {
        Self::explicit_content()
    }
}

/// Configuration for [`VisionClient`](crate::VisionClient).
#[derive(Debug, Clone)]
pub struct VisionConfig {
    /// API key. `None` disables every detection call.
    pub api_key: Option<ApiCredential>,
    /// Annotate endpoint, without the `key` query parameter.
    pub endpoint: String,
    /// Per-request timeout (default: 10s)
    pub timeout: Duration,
    /// Retry policy for transient transport failures.
    pub retry: RetryConfig,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
        }
    }
}

impl VisionConfig {
    /// Create a config holding the given API key. An empty key leaves the
    /// client unconfigured.
    pub fn with_api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: ApiCredential::new(key),
            ..Default::default()
        }
    }

    /// Set the annotate endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Full request URL with the key appended as an encoded query parameter.
    pub(crate) fn request_url(&self, credential: &ApiCredential) -> Result<String, TransportError> {
        let mut url = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;
        url.query_pairs_mut().append_pair("key", credential.expose());
        Ok(url.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_rejects_blank_keys() {
        assert!(ApiCredential::new("").is_none());
        assert!(ApiCredential::new("   ").is_none());
        assert_eq!(ApiCredential::new(" abc ").unwrap().expose(), "abc");
    }

    #[test]
    fn credential_debug_is_redacted() {
        let key = ApiCredential::new("super-secret").unwrap();
        assert!(!format!("{key:?}").contains("super-secret"));
        assert!(!format!("{key}").contains("super-secret"));

        let config = VisionConfig::with_api_key("super-secret");
        assert!(!format!("{config:?}").contains("super-secret"));
    }

    #[test]
    fn feature_caps_are_fixed() {
        let caps: Vec<u32> = DetectionFeature::ALL.iter().map(|f| f.max_results()).collect();
        assert_eq!(caps, vec![5, 2, 2, 1, 10, 25, 5]);
    }

    #[test]
    fn likelihood_ordering() {
        assert!(Likelihood::Unknown < Likelihood::VeryUnlikely);
        assert!(Likelihood::Possible < Likelihood::Likely);
        assert!(Likelihood::Likely < Likelihood::VeryLikely);
    }

    #[test]
    fn likelihood_deserializes_unknown_values() {
        let l: Likelihood = serde_json::from_str(r#""VERY_LIKELY""#).unwrap();
        assert_eq!(l, Likelihood::VeryLikely);
        let l: Likelihood = serde_json::from_str(r#""UNKNOWN""#).unwrap();
        assert_eq!(l, Likelihood::Unknown);
        let l: Likelihood = serde_json::from_str(r#""SOMETHING_NEW""#).unwrap();
        assert_eq!(l, Likelihood::Unknown);

        let set: LikelihoodSet = serde_json::from_str(r#"["LIKELY", "NEW_VALUE"]"#).unwrap();
        assert!(set.contains(Likelihood::Likely));
        assert!(set.contains(Likelihood::Unknown));
        assert!(serde_json::from_str::<Likelihood>("3").is_err());
    }

    #[test]
    fn likelihood_from_str() {
        assert_eq!("likely".parse::<Likelihood>().unwrap(), Likelihood::Likely);
        assert!("maybe".parse::<Likelihood>().is_err());
    }

    #[test]
    fn likelihood_set_presets() {
        let explicit = LikelihoodSet::explicit_content();
        assert!(explicit.contains(Likelihood::Likely));
        assert!(explicit.contains(Likelihood::VeryLikely));
        assert!(!explicit.contains(Likelihood::Possible));

        let sad = LikelihoodSet::not_joyful();
        assert!(sad.contains(Likelihood::VeryUnlikely));
        assert!(!sad.contains(Likelihood::Likely));
    }

    #[test]
    fn request_url_appends_key() {
        let config = VisionConfig::with_api_key("k1");
        let key = config.api_key.clone().unwrap();
        assert_eq!(
            config.request_url(&key).unwrap(),
            "https://vision.googleapis.com/v1/images:annotate?key=k1"
        );

        let config = config.endpoint("http://localhost:9000/annotate?alt=json");
        assert_eq!(
            config.request_url(&key).unwrap(),
            "http://localhost:9000/annotate?alt=json&key=k1"
        );
    }

    #[test]
    fn request_url_encodes_key() {
        let config = VisionConfig::with_api_key("a&b c=d");
        let key = config.api_key.clone().unwrap();
        assert_eq!(
            config.request_url(&key).unwrap(),
            "https://vision.googleapis.com/v1/images:annotate?key=a%26b+c%3Dd"
        );
    }

    #[test]
    fn request_url_rejects_bad_endpoint() {
        let config = VisionConfig::with_api_key("k1").endpoint("not a url");
        let key = config.api_key.clone().unwrap();
        let err = config.request_url(&key).unwrap_err();
        assert!(matches!(err, TransportError::InvalidEndpoint(_)));
        assert!(!err.is_transient());
    }
}
