//! Upload moderation abstractions.
//!
//! `ContentClassifier` and `FaceDetector` decouple the validator from any
//! specific moderation backend (bundled heuristics, an on-device model, a
//! remote service). `&mut self` expresses that backends may be stateful —
//! lazily loaded models, warmed caches — and all mutation is serialised
//! through the handles' `parking_lot::Mutex`.

pub mod stub;
pub mod validator;

pub use validator::{UploadValidator, ValidatorConfig};

use std::sync::Arc;

use image::DynamicImage;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Content classes a safety classifier can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    Explicit,
    Suggestive,
    Neutral,
    Drawing,
}

impl ContentCategory {
    /// Categories that can flag an upload as unsafe.
    pub fn is_flagged(self) -> bool {
        matches!(self, ContentCategory::Explicit | ContentCategory::Suggestive)
    }
}

/// One classifier prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentScore {
    pub category: ContentCategory,
    /// Confidence in [0.0, 1.0].
    pub probability: f32,
}

/// Contract for content-safety backends.
pub trait ContentClassifier: Send + 'static {
    /// Classify a decoded image.
    ///
    /// # Errors
    /// Returns an error when the backend is unavailable or inference fails;
    /// the validator decides whether that fails open or closed.
    fn classify(&mut self, image: &DynamicImage) -> Result<Vec<ContentScore>>;
}

/// Contract for face-presence backends.
pub trait FaceDetector: Send + 'static {
    /// Count the faces visible in a decoded image.
    fn count_faces(&mut self, image: &DynamicImage) -> Result<usize>;
}

/// Thread-safe reference-counted handle to any `ContentClassifier`.
#[derive(Clone)]
pub struct ClassifierHandle(pub Arc<Mutex<dyn ContentClassifier>>);

impl ClassifierHandle {
    pub fn new<C: ContentClassifier>(classifier: C) -> Self {
        Self(Arc::new(Mutex::new(classifier)))
    }
}

impl std::fmt::Debug for ClassifierHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierHandle").finish_non_exhaustive()
    }
}

/// Thread-safe reference-counted handle to any `FaceDetector`.
#[derive(Clone)]
pub struct DetectorHandle(pub Arc<Mutex<dyn FaceDetector>>);

impl DetectorHandle {
    pub fn new<D: FaceDetector>(detector: D) -> Self {
        Self(Arc::new(Mutex::new(detector)))
    }
}

impl std::fmt::Debug for DetectorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorHandle").finish_non_exhaustive()
    }
}
