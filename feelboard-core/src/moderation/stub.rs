//! Placeholder moderation backends.
//!
//! These let the full upload → personalization flow run end-to-end without
//! a real model. Swap them out at the `ContentClassifier` / `FaceDetector`
//! seams without touching the validator.

use image::{DynamicImage, GenericImageView};
use tracing::debug;

use crate::error::Result;
use crate::moderation::{ContentCategory, ContentClassifier, ContentScore, FaceDetector};

/// Classifier that reports every image as neutral.
///
/// Stands in for an on-device safety model during development; under the
/// default fail-open policy its behavior is indistinguishable from an
/// unavailable real model, but it exercises the classify path.
#[derive(Debug, Default)]
pub struct NeutralClassifier;

impl ContentClassifier for NeutralClassifier {
    fn classify(&mut self, _image: &DynamicImage) -> Result<Vec<ContentScore>> {
        debug!("NeutralClassifier::classify — reporting neutral");
        Ok(vec![ContentScore {
            category: ContentCategory::Neutral,
            probability: 0.99,
        }])
    }
}

/// Placeholder face heuristic: any non-transparent pixel counts as one face.
///
/// This is NOT face detection. The exactly-one-face policy enforced by the
/// validator is contractual; this backend merely confirms the image has
/// visible content. A real detector implements `FaceDetector` and returns
/// a true count.
#[derive(Debug, Default)]
pub struct PixelContentDetector;

impl FaceDetector for PixelContentDetector {
    fn count_faces(&mut self, image: &DynamicImage) -> Result<usize> {
        let has_content = image.pixels().any(|(_, _, pixel)| pixel.0[3] > 0);
        debug!(has_content, "PixelContentDetector::count_faces");
        Ok(if has_content { 1 } else { 0 })
    }
}
