//! Tile composition abstraction.
//!
//! The `TileComposer` trait decouples the personalization pipeline from the
//! image-generation collaborator that merges the user's photo with a
//! reference feeling illustration (local placeholder, remote model service,
//! etc.). `&mut self` expresses that composers may be stateful — warmed
//! HTTP clients, loaded models — serialised through `ComposerHandle`'s
//! `parking_lot::Mutex`.

pub mod stub;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::catalog::TileSpec;
use crate::error::Result;
use crate::photo::SanitizedPhoto;

/// A personalized image produced for one tile.
#[derive(Debug, Clone)]
pub struct ComposedImage {
    /// Tile this image belongs to. Consumers key by this, never by position.
    pub tile_key: String,
    /// Media type of `bytes` (e.g. "image/png").
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl ComposedImage {
    pub fn byte_len(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Contract for image-composition backends.
pub trait TileComposer: Send + 'static {
    /// Merge the user's sanitized photo with `tile`'s reference image into a
    /// personalized illustration.
    ///
    /// Calls are independent per tile; a failure here skips only that tile.
    fn compose(&mut self, photo: &SanitizedPhoto, tile: &TileSpec) -> Result<ComposedImage>;
}

/// Thread-safe reference-counted handle to any `TileComposer` implementor.
#[derive(Clone)]
pub struct ComposerHandle(pub Arc<Mutex<dyn TileComposer>>);

impl ComposerHandle {
    pub fn new<C: TileComposer>(composer: C) -> Self {
        Self(Arc::new(Mutex::new(composer)))
    }
}

impl std::fmt::Debug for ComposerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposerHandle").finish_non_exhaustive()
    }
}
