//! Typed views over an annotate response.
//!
//! The client hands back the raw document untouched; these helpers pull the
//! few fields the validators and alt-text filler need out of
//! `responses[0]`. Anything missing or malformed reads as absent.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Likelihood;

/// `safeSearchAnnotation` of the first response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafeSearchAnnotation {
    pub adult: Likelihood,
    pub spoof: Likelihood,
    pub medical: Likelihood,
    pub violence: Likelihood,
    pub racy: Likelihood,
}

/// A safe-search category a policy can look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafeSearchCategory {
    Adult,
    Spoof,
    Medical,
    Violence,
    Racy,
}

impl SafeSearchAnnotation {
    pub fn likelihood(&self, category: SafeSearchCategory) -> Likelihood {
        match category {
            SafeSearchCategory::Adult => self.adult,
            SafeSearchCategory::Spoof => self.spoof,
            SafeSearchCategory::Medical => self.medical,
            SafeSearchCategory::Violence => self.violence,
            SafeSearchCategory::Racy => self.racy,
        }
    }
}

/// Emotion likelihoods of one entry in `faceAnnotations`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FaceAnnotation {
    pub joy_likelihood: Likelihood,
    pub sorrow_likelihood: Likelihood,
    pub anger_likelihood: Likelihood,
    pub surprise_likelihood: Likelihood,
    pub detection_confidence: Option<f64>,
}

/// An RGB color with its share of the image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DominantColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub score: f64,
    pub pixel_fraction: f64,
}

impl DominantColor {
    /// `#rrggbb`
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }
}

fn first_response(doc: &Value) -> Option<&Value> {
    doc.get("responses")?.get(0)
}

/// Non-empty `safeSearchAnnotation`, if present.
pub fn safe_search(doc: &Value) -> Option<SafeSearchAnnotation> {
    let annotation = first_response(doc)?.get("safeSearchAnnotation")?;
    if annotation.as_object().map_or(true, |o| o.is_empty()) {
        return None;
    }
    serde_json::from_value(annotation.clone()).ok()
}

/// Every face, in response order.
pub fn faces(doc: &Value) -> Vec<FaceAnnotation> {
    first_response(doc)
        .and_then(|r| r.get("faceAnnotations"))
        .and_then(|f| f.as_array())
        .map(|faces| {
            faces
                .iter()
                .filter_map(|f| serde_json::from_value(f.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn descriptions(doc: &Value, key: &str) -> Vec<String> {
    first_response(doc)
        .and_then(|r| r.get(key))
        .and_then(|a| a.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.get("description").and_then(|d| d.as_str()))
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

pub fn label_descriptions(doc: &Value) -> Vec<String> {
    descriptions(doc, "labelAnnotations")
}

pub fn landmark_descriptions(doc: &Value) -> Vec<String> {
    descriptions(doc, "landmarkAnnotations")
}

pub fn logo_descriptions(doc: &Value) -> Vec<String> {
    descriptions(doc, "logoAnnotations")
}

/// Full OCR text: the first `textAnnotations` entry holds the whole block.
pub fn detected_text(doc: &Value) -> Option<String> {
    let first = first_response(doc)?;
    first
        .pointer("/fullTextAnnotation/text")
        .and_then(|t| t.as_str())
        .or_else(|| first.pointer("/textAnnotations/0/description").and_then(|t| t.as_str()))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// `imagePropertiesAnnotation.dominantColors`, highest score first.
pub fn dominant_colors(doc: &Value) -> Vec<DominantColor> {
    let Some(colors) = first_response(doc)
        .and_then(|r| r.pointer("/imagePropertiesAnnotation/dominantColors/colors"))
        .and_then(|c| c.as_array())
    else {
        return Vec::new();
    };

    let channel = |c: &Value, name: &str| {
        c.pointer(&format!("/color/{name}"))
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
            .clamp(0.0, 255.0) as u8
    };

    let mut out: Vec<DominantColor> = colors
        .iter()
        .map(|c| DominantColor {
            red: channel(c, "red"),
            green: channel(c, "green"),
            blue: channel(c, "blue"),
            score: c.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0),
            pixel_fraction: c.get("pixelFraction").and_then(|s| s.as_f64()).unwrap_or(0.0),
        })
        .collect();
    out.sort_by(|a, b| b.score.total_cmp(&a.score));
    out
}
