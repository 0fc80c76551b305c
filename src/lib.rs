//! # google-vision
//!
//! Async client for the Google Cloud Vision `images:annotate` endpoint, plus
//! the field-validation hooks a content system runs on image uploads.
//!
//! ## Features
//!
//! - **One call per detection feature**: labels, landmarks, logos, safe
//!   search, text (OCR), faces and image properties, each with a fixed
//!   `maxResults` cap
//! - **Fail-closed on configuration**: with no API key, nothing is sent
//! - **Fail-open on errors**: transport and API failures become `None`, while
//!   a `try_*` API and [`DetectionStats`] keep the cause visible
//! - **Bounded retry** with exponential backoff for transient failures only
//! - **Validators** for explicit content (rejects) and unhappy faces (warns)
//! - **Alt text** generation and **similar-file** lookup by shared terms
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use google_vision::{annotations, VisionClient, VisionConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = VisionClient::new(VisionConfig::with_api_key("my-key"));
//!
//!     if let Some(doc) = client.safe_search_detection("upload.jpg").await {
//!         if let Some(ss) = annotations::safe_search(&doc) {
//!             println!("adult: {}", ss.adult);
//!         }
//!     }
//!
//!     println!("{:?}", client.stats());
//! }
//! ```
//!
//! ## Validating an upload
//!
//! ```rust,no_run
//! use google_vision::{
//!     FieldSettings, FieldValidator, ImageItem, LocalPathResolver, SafeSearchValidator,
//!     ValidationContext, VisionClient, VisionConfig,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let client = VisionClient::new(VisionConfig::with_api_key("my-key"));
//! let resolver = Arc::new(LocalPathResolver::new().with_scheme("public", "/srv/files"));
//! let validator = SafeSearchValidator::new(client, resolver);
//!
//! let settings = FieldSettings { safe_search: true, ..Default::default() };
//! let mut ctx = ValidationContext::new();
//! validator.validate(&ImageItem::new(7, "public://cat.jpg"), &settings, &mut ctx).await;
//! for message in ctx.violations() {
//!     eprintln!("rejected: {message}");
//! }
//! # }
//! ```

pub mod alt_text;
pub mod annotations;
pub mod client;
pub mod error;
pub mod request;
pub mod retry;
pub mod settings;
pub mod similar;
pub mod stats;
pub mod transport;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use alt_text::{AltTextFiller, AltTextSource};
pub use annotations::{FaceAnnotation, SafeSearchAnnotation, SafeSearchCategory};
pub use client::{FsImageSource, ImageSource, VisionClient};
pub use error::{Result, TransportError, VisionError};
pub use request::{build_request, AnnotateRequest};
pub use retry::RetryConfig;
pub use settings::VisionSettings;
pub use similar::{similar_files, InMemoryLabelStore, LabelStore, SimilarFile};
pub use stats::{DetectionStats, FailureKind, StatsSnapshot};
pub use transport::{ReqwestTransport, Transport};
pub use types::{ApiCredential, DetectionFeature, Likelihood, LikelihoodSet, VisionConfig};
pub use validation::{
    validate_field, FieldSettings, FieldValidator, ImageItem, LocalPathResolver, PathResolver,
    SafeSearchPolicy, SafeSearchValidator, UserEmotionValidator, ValidationContext,
};
