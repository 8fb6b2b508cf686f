//! Upload validation pipeline.
//!
//! ## Stages (sequential, short-circuit on first failure)
//!
//! ```text
//! 1. Declared media type must be image/*
//! 2. Byte size within the configured ceiling
//! 3. Decode, then content-safety classification (configurable fail-open)
//! 4. Face presence — exactly one face required
//! 5. Sanitize: re-encode pixels to PNG, dropping embedded metadata
//! ```
//!
//! Each upload attempt produces exactly one outcome: an accepted
//! `SanitizedPhoto` or a user-facing `RejectReason`. Nothing is retried.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};
use tracing::{debug, info, warn};

use crate::error::RejectReason;
use crate::moderation::{ClassifierHandle, DetectorHandle};
use crate::photo::{SanitizedPhoto, UploadCandidate};

/// Validator configuration.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Upload size ceiling in bytes. Default: 5 MiB.
    pub max_bytes: u64,
    /// A flagged category above this confidence rejects the upload.
    /// Default: 0.5.
    pub unsafe_threshold: f32,
    /// When the classifier is unavailable or errors, `true` treats the image
    /// as safe (fail-open; logged), `false` rejects. Default: `true` —
    /// acceptable for a demo deployment only.
    pub open_on_unavailable: bool,
}

pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_bytes: MAX_UPLOAD_BYTES,
            unsafe_threshold: 0.5,
            open_on_unavailable: true,
        }
    }
}

/// Validates uploaded photos against type, size, safety and face policies.
pub struct UploadValidator {
    config: ValidatorConfig,
    classifier: ClassifierHandle,
    faces: DetectorHandle,
}

impl UploadValidator {
    pub fn new(config: ValidatorConfig, classifier: ClassifierHandle, faces: DetectorHandle) -> Self {
        Self {
            config,
            classifier,
            faces,
        }
    }

    /// Run the full validation pipeline over one upload attempt.
    pub fn validate(&self, candidate: &UploadCandidate) -> Result<SanitizedPhoto, RejectReason> {
        debug!(
            file = %candidate.file_name,
            media_type = %candidate.media_type,
            bytes = candidate.byte_len(),
            "validating upload"
        );

        // ── 1. Declared type ──────────────────────────────────────────────
        if !candidate.declares_image() {
            info!(media_type = %candidate.media_type, "upload rejected: not an image type");
            return Err(RejectReason::UnsupportedType);
        }

        // ── 2. Size ceiling ───────────────────────────────────────────────
        if candidate.byte_len() > self.config.max_bytes {
            info!(
                bytes = candidate.byte_len(),
                limit = self.config.max_bytes,
                "upload rejected: over size limit"
            );
            return Err(RejectReason::TooLarge {
                limit_mib: self.config.max_bytes / (1024 * 1024),
            });
        }

        // ── 3. Decode + safety ────────────────────────────────────────────
        let decoded = image::load_from_memory(&candidate.bytes).map_err(|e| {
            info!(error = %e, "upload rejected: undecodable image");
            RejectReason::Unreadable
        })?;

        self.check_safety(&decoded)?;

        // ── 4. Face presence ──────────────────────────────────────────────
        let faces = {
            let mut detector = self.faces.0.lock();
            detector.count_faces(&decoded)
        };
        match faces {
            Ok(1) => {}
            Ok(found) => {
                info!(found, "upload rejected: face count is not exactly one");
                return Err(RejectReason::FaceCount { found });
            }
            Err(e) => {
                warn!(error = %e, "face detection failed");
                return Err(RejectReason::ProcessingFailed);
            }
        }

        // ── 5. Sanitize ───────────────────────────────────────────────────
        let photo = sanitize(&decoded)?;
        debug!(
            width = photo.width,
            height = photo.height,
            bytes = photo.byte_len(),
            "upload accepted"
        );
        Ok(photo)
    }

    fn check_safety(&self, decoded: &DynamicImage) -> Result<(), RejectReason> {
        let scores = {
            let mut classifier = self.classifier.0.lock();
            classifier.classify(decoded)
        };

        let scores = match scores {
            Ok(scores) => scores,
            Err(e) if self.config.open_on_unavailable => {
                // Documented demo tradeoff: an unreachable classifier does
                // not block uploads. Every pass through here is logged.
                warn!(error = %e, "content classifier unavailable — failing open");
                return Ok(());
            }
            Err(e) => {
                warn!(error = %e, "content classifier unavailable — failing closed");
                return Err(RejectReason::ProcessingFailed);
            }
        };

        let flagged = scores
            .iter()
            .find(|s| s.category.is_flagged() && s.probability > self.config.unsafe_threshold);
        if let Some(score) = flagged {
            info!(
                category = ?score.category,
                probability = score.probability,
                "upload rejected: flagged by content classifier"
            );
            return Err(RejectReason::UnsafeContent);
        }
        Ok(())
    }
}

/// Re-encode decoded pixels to PNG, dropping all container metadata.
fn sanitize(decoded: &DynamicImage) -> Result<SanitizedPhoto, RejectReason> {
    let mut bytes = Vec::new();
    decoded
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| {
            warn!(error = %e, "sanitization re-encode failed");
            RejectReason::ProcessingFailed
        })?;
    Ok(SanitizedPhoto {
        bytes,
        width: decoded.width(),
        height: decoded.height(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use image::{Rgba, RgbaImage};

    use crate::error::BoardError;
    use crate::moderation::{ContentCategory, ContentClassifier, ContentScore, FaceDetector};

    struct ScriptedClassifier {
        scores: Vec<ContentScore>,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    impl ContentClassifier for ScriptedClassifier {
        fn classify(&mut self, _image: &DynamicImage) -> crate::error::Result<Vec<ContentScore>> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                return Err(BoardError::Other(anyhow::anyhow!("model not loaded")));
            }
            Ok(self.scores.clone())
        }
    }

    struct FixedFaces {
        count: usize,
        calls: Arc<AtomicUsize>,
    }

    impl FaceDetector for FixedFaces {
        fn count_faces(&mut self, _image: &DynamicImage) -> crate::error::Result<usize> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(self.count)
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([120, 90, 60, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn validator(
        config: ValidatorConfig,
        classifier: ScriptedClassifier,
        faces: FixedFaces,
    ) -> UploadValidator {
        UploadValidator::new(
            config,
            ClassifierHandle::new(classifier),
            DetectorHandle::new(faces),
        )
    }

    fn neutral(probability: f32) -> Vec<ContentScore> {
        vec![ContentScore {
            category: ContentCategory::Neutral,
            probability,
        }]
    }

    #[test]
    fn non_image_type_is_rejected_before_any_downstream_check() {
        let classifier_calls = Arc::new(AtomicUsize::new(0));
        let face_calls = Arc::new(AtomicUsize::new(0));
        let v = validator(
            ValidatorConfig::default(),
            ScriptedClassifier {
                scores: neutral(0.9),
                fail: false,
                calls: Arc::clone(&classifier_calls),
            },
            FixedFaces {
                count: 1,
                calls: Arc::clone(&face_calls),
            },
        );

        let candidate = UploadCandidate::new("notes.pdf", "application/pdf", png_bytes(4, 4));
        assert_eq!(v.validate(&candidate), Err(RejectReason::UnsupportedType));
        assert_eq!(classifier_calls.load(Ordering::Relaxed), 0);
        assert_eq!(face_calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn oversize_upload_is_rejected_with_limit_in_message() {
        let classifier_calls = Arc::new(AtomicUsize::new(0));
        let face_calls = Arc::new(AtomicUsize::new(0));
        let v = validator(
            ValidatorConfig::default(),
            ScriptedClassifier {
                scores: neutral(0.9),
                fail: false,
                calls: Arc::clone(&classifier_calls),
            },
            FixedFaces {
                count: 1,
                calls: Arc::clone(&face_calls),
            },
        );

        // 6 MiB of zeroes with an image media type: size check fires before decode.
        let candidate =
            UploadCandidate::new("big.png", "image/png", vec![0u8; 6 * 1024 * 1024]);
        let reason = v.validate(&candidate).unwrap_err();
        assert_eq!(reason, RejectReason::TooLarge { limit_mib: 5 });
        assert!(reason.to_string().contains("5 MB"), "{reason}");
        assert_eq!(classifier_calls.load(Ordering::Relaxed), 0);
        assert_eq!(face_calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn undecodable_bytes_are_rejected_as_unreadable() {
        let v = validator(
            ValidatorConfig::default(),
            ScriptedClassifier {
                scores: neutral(0.9),
                fail: false,
                calls: Arc::new(AtomicUsize::new(0)),
            },
            FixedFaces {
                count: 1,
                calls: Arc::new(AtomicUsize::new(0)),
            },
        );

        let candidate = UploadCandidate::new("junk.jpg", "image/jpeg", vec![1, 2, 3, 4]);
        assert_eq!(v.validate(&candidate), Err(RejectReason::Unreadable));
    }

    #[test]
    fn accepted_photo_is_reencoded_with_dimensions_preserved() {
        let v = validator(
            ValidatorConfig::default(),
            ScriptedClassifier {
                scores: neutral(0.9),
                fail: false,
                calls: Arc::new(AtomicUsize::new(0)),
            },
            FixedFaces {
                count: 1,
                calls: Arc::new(AtomicUsize::new(0)),
            },
        );

        let candidate = UploadCandidate::new("me.png", "image/png", png_bytes(12, 7));
        let photo = v.validate(&candidate).expect("valid upload accepted");
        assert_eq!(photo.width, 12);
        assert_eq!(photo.height, 7);
        // Output is decodable PNG.
        let round = image::load_from_memory(&photo.bytes).unwrap();
        assert_eq!(round.width(), 12);
    }

    #[test]
    fn flagged_category_over_threshold_rejects() {
        let v = validator(
            ValidatorConfig::default(),
            ScriptedClassifier {
                scores: vec![ContentScore {
                    category: ContentCategory::Explicit,
                    probability: 0.72,
                }],
                fail: false,
                calls: Arc::new(AtomicUsize::new(0)),
            },
            FixedFaces {
                count: 1,
                calls: Arc::new(AtomicUsize::new(0)),
            },
        );

        let candidate = UploadCandidate::new("me.png", "image/png", png_bytes(8, 8));
        assert_eq!(v.validate(&candidate), Err(RejectReason::UnsafeContent));
    }

    #[test]
    fn flagged_category_at_or_below_threshold_passes() {
        let v = validator(
            ValidatorConfig::default(),
            ScriptedClassifier {
                scores: vec![ContentScore {
                    category: ContentCategory::Suggestive,
                    probability: 0.5,
                }],
                fail: false,
                calls: Arc::new(AtomicUsize::new(0)),
            },
            FixedFaces {
                count: 1,
                calls: Arc::new(AtomicUsize::new(0)),
            },
        );

        let candidate = UploadCandidate::new("me.png", "image/png", png_bytes(8, 8));
        assert!(v.validate(&candidate).is_ok());
    }

    #[test]
    fn classifier_failure_fails_open_by_default() {
        let v = validator(
            ValidatorConfig::default(),
            ScriptedClassifier {
                scores: vec![],
                fail: true,
                calls: Arc::new(AtomicUsize::new(0)),
            },
            FixedFaces {
                count: 1,
                calls: Arc::new(AtomicUsize::new(0)),
            },
        );

        let candidate = UploadCandidate::new("me.png", "image/png", png_bytes(8, 8));
        assert!(v.validate(&candidate).is_ok());
    }

    #[test]
    fn classifier_failure_rejects_when_configured_fail_closed() {
        let config = ValidatorConfig {
            open_on_unavailable: false,
            ..ValidatorConfig::default()
        };
        let v = validator(
            config,
            ScriptedClassifier {
                scores: vec![],
                fail: true,
                calls: Arc::new(AtomicUsize::new(0)),
            },
            FixedFaces {
                count: 1,
                calls: Arc::new(AtomicUsize::new(0)),
            },
        );

        let candidate = UploadCandidate::new("me.png", "image/png", png_bytes(8, 8));
        assert_eq!(v.validate(&candidate), Err(RejectReason::ProcessingFailed));
    }

    #[test]
    fn face_count_other_than_one_rejects() {
        for count in [0usize, 2] {
            let v = validator(
                ValidatorConfig::default(),
                ScriptedClassifier {
                    scores: neutral(0.9),
                    fail: false,
                    calls: Arc::new(AtomicUsize::new(0)),
                },
                FixedFaces {
                    count,
                    calls: Arc::new(AtomicUsize::new(0)),
                },
            );

            let candidate = UploadCandidate::new("group.png", "image/png", png_bytes(8, 8));
            assert_eq!(
                v.validate(&candidate),
                Err(RejectReason::FaceCount { found: count })
            );
        }
    }
}
