//! Generated alt text for uploaded images.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::annotations;
use crate::client::VisionClient;
use crate::types::DetectionFeature;
use crate::validation::{ImageItem, PathResolver};

/// Which detection feeds the alt text field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AltTextSource {
    /// Leave alt text alone.
    #[default]
    None,
    Labels,
    Landmark,
    Logo,
    Ocr,
}

impl AltTextSource {
    /// The detection to run, if any.
    pub fn feature(self) -> Option<DetectionFeature> {
        match self {
            AltTextSource::None => None,
            AltTextSource::Labels => Some(DetectionFeature::Label),
            AltTextSource::Landmark => Some(DetectionFeature::Landmark),
            AltTextSource::Logo => Some(DetectionFeature::Logo),
            AltTextSource::Ocr => Some(DetectionFeature::Text),
        }
    }

    /// Turn a detection result into alt text.
    ///
    /// Labels are joined with `", "`; landmarks and logos use the top hit;
    /// OCR uses the full detected text.
    pub fn extract(self, doc: &serde_json::Value) -> Option<String> {
        let text = match self {
            AltTextSource::None => return None,
            AltTextSource::Labels => annotations::label_descriptions(doc).join(", "),
            AltTextSource::Landmark => annotations::landmark_descriptions(doc).into_iter().next()?,
            AltTextSource::Logo => annotations::logo_descriptions(doc).into_iter().next()?,
            AltTextSource::Ocr => annotations::detected_text(doc)?,
        };
        (!text.is_empty()).then_some(text)
    }
}

/// Fills alt text from a configured [`AltTextSource`].
#[derive(Clone)]
pub struct AltTextFiller {
    client: VisionClient,
    resolver: Arc<dyn PathResolver>,
}

impl AltTextFiller {
    pub fn new(client: VisionClient, resolver: Arc<dyn PathResolver>) -> Self {
        Self { client, resolver }
    }

    /// Alt text for the image at `path`. `None` when the source is `None`,
    /// the API gave no usable answer, or the call failed.
    pub async fn fill_path(&self, source: AltTextSource, path: impl AsRef<Path>) -> Option<String> {
        let feature = source.feature()?;
        let doc = self.client.detect(feature, path).await?;
        source.extract(&doc)
    }

    /// Alt text for an attached field item.
    pub async fn fill(&self, source: AltTextSource, item: &ImageItem) -> Option<String> {
        source.feature()?;
        item.target_id.filter(|id| *id != 0)?;
        let path = self.resolver.realpath(item.file_uri.as_deref()?)?;
        self.fill_path(source, path).await
    }
}
