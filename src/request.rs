//! Annotate request payloads.

use base64::Engine;
use serde::Serialize;

use crate::types::DetectionFeature;

/// Body of `POST images:annotate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotateRequest {
    pub requests: Vec<AnnotateImageRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotateImageRequest {
    pub image: ImageContent,
    pub features: Vec<FeatureRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageContent {
    /// Base64-encoded image bytes.
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRequest {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub max_results: u32,
}

impl AnnotateRequest {
    /// Serialize to the JSON bytes sent on the wire.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Build the single-image request for `feature`.
///
/// Pure: no validation of the image bytes is done, so an empty buffer still
/// yields a well-formed request.
pub fn build_request(feature: DetectionFeature, image: &[u8]) -> AnnotateRequest {
    AnnotateRequest {
        requests: vec![AnnotateImageRequest {
            image: ImageContent {
                content: base64::engine::general_purpose::STANDARD.encode(image),
            },
            features: vec![FeatureRequest {
                kind: feature.wire_name(),
                max_results: feature.max_results(),
            }],
        }],
    }
}
