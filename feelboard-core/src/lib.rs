//! # feelboard-core
//!
//! Reusable AAC feelings-board engine SDK.
//!
//! ## Architecture
//!
//! ```text
//! UploadCandidate → UploadValidator ──valid──► SanitizedPhoto
//!        │                │                        │
//!   SessionGate       RejectReason        FeelingsEngine::start_personalization
//!   (cooldown)        (user-facing)               │  spawn_blocking
//!                                        per-tile TileComposer::compose
//!                                                 │
//!                                  broadcast<PipelineProgressEvent>
//!
//! tile tap → SpeechDriver::speak → SpeechSynthesizer backend
//! ```
//!
//! Everything external — safety classifier, face detector, image composer,
//! speech facility, session storage — sits behind a trait with a shipped
//! placeholder, so hosts swap in real collaborators without touching the
//! orchestration.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod catalog;
pub mod compose;
pub mod engine;
pub mod error;
pub mod events;
pub mod moderation;
pub mod photo;
pub mod session;
pub mod speech;

// Convenience re-exports for downstream crates
pub use catalog::{Catalog, Category, Lang, LocalizedLabel, TileSpec};
pub use compose::{ComposedImage, ComposerHandle, TileComposer};
pub use engine::{EngineConfig, FeelingsEngine, TileImage};
pub use error::{BoardError, RejectReason};
pub use events::{PipelineProgressEvent, PipelineStatus, PipelineStatusEvent, TileOutcome};
pub use moderation::{ClassifierHandle, DetectorHandle, UploadValidator, ValidatorConfig};
pub use photo::{SanitizedPhoto, UploadCandidate};
pub use session::{GenerationGate, SessionGate, SessionState, SessionStore};
pub use speech::{SpeechDriver, SpeechOutcome, SpeechSynthesizer, SynthesizerHandle, VoiceInfo};
