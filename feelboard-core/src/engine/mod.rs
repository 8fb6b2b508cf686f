//! `FeelingsEngine` — top-level personalization lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! FeelingsEngine::new()
//!     └─► start_personalization(photo) → prior set superseded, run spawned,
//!         │                              status = Composing
//!         ├─► (per tile) progress event, image installed on success
//!         └─► terminal status = Completed | Failed | Cancelled
//! ```
//!
//! Exactly one upload-to-personalization cycle is active at a time. Starting
//! a new run supersedes the previous one: its set is released wholesale and
//! any still-running loop stops installing (a generation check guards every
//! install). `cancel()` is best-effort — the loop observes the flag between
//! tiles.
//!
//! ## Threading
//!
//! The per-tile compose loop is blocking work (model/network calls behind
//! `TileComposer`) and runs under `tokio::task::spawn_blocking`, keeping the
//! async executor free for event consumers.

pub mod pipeline;

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::{
    catalog::{Catalog, TileSpec},
    compose::{ComposedImage, ComposerHandle},
    error::{BoardError, Result},
    events::{PipelineProgressEvent, PipelineStatus, PipelineStatusEvent},
};

/// Broadcast channel capacity; ample for one event per tile plus status.
const BROADCAST_CAP: usize = 64;

/// Configuration for `FeelingsEngine`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cap on tiles attempted per run (`None` = the whole catalog). Useful
    /// for smoke-testing against a slow or metered compose service.
    pub max_tiles: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_tiles: None }
    }
}

/// The current personalized-image set, keyed by tile key.
///
/// Partial by design: a tile with no entry renders its reference image.
/// Owned by the run that created it and superseded wholesale — entries from
/// an old upload never mix with a new one.
#[derive(Debug, Default)]
pub struct PersonalizedSet {
    generation: u64,
    images: HashMap<String, ComposedImage>,
}

impl PersonalizedSet {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, tile_key: &str) -> Option<&ComposedImage> {
        self.images.get(tile_key)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Drop all entries and adopt a new generation. Returns how many images
    /// were released.
    fn supersede(&mut self, generation: u64) -> usize {
        let released = self.images.len();
        self.images.clear();
        self.generation = generation;
        released
    }

    fn install(&mut self, image: ComposedImage) {
        self.images.insert(image.tile_key.clone(), image);
    }
}

/// Image resolved for a tile: personalized when available, reference
/// otherwise. The two-tier lookup is always by key, never by position.
#[derive(Debug, Clone)]
pub enum TileImage {
    Personalized(ComposedImage),
    Reference(String),
}

/// The top-level engine handle.
///
/// `FeelingsEngine` is `Send + Sync` — all fields use interior mutability.
/// Wrap in `Arc<FeelingsEngine>` to share with event-consuming tasks.
pub struct FeelingsEngine {
    config: EngineConfig,
    composer: ComposerHandle,
    catalog: Arc<Catalog>,
    /// `true` while a run is walking the catalog.
    running: Arc<AtomicBool>,
    /// Current run generation; bumped on every `start_personalization`.
    generation: Arc<AtomicU64>,
    /// The active personalized set.
    set: Arc<Mutex<PersonalizedSet>>,
    /// Canonical status (written by the run loop and `cancel`).
    status: Arc<Mutex<PipelineStatus>>,
    progress_tx: broadcast::Sender<PipelineProgressEvent>,
    status_tx: broadcast::Sender<PipelineStatusEvent>,
    /// Monotonically increasing event sequence counter.
    seq: Arc<AtomicU64>,
    diagnostics: Arc<pipeline::PipelineDiagnostics>,
}

impl FeelingsEngine {
    pub fn new(config: EngineConfig, composer: ComposerHandle, catalog: Arc<Catalog>) -> Self {
        let (progress_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);

        Self {
            config,
            composer,
            catalog,
            running: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            set: Arc::new(Mutex::new(PersonalizedSet::default())),
            status: Arc::new(Mutex::new(PipelineStatus::Idle)),
            progress_tx,
            status_tx,
            seq: Arc::new(AtomicU64::new(0)),
            diagnostics: Arc::new(pipeline::PipelineDiagnostics::default()),
        }
    }

    /// Start a personalization run for a validated photo.
    ///
    /// Any in-flight run is superseded: its images are released here and its
    /// loop stops installing. Returns the new run's generation id.
    ///
    /// The caller is responsible for having recorded the generation with the
    /// session gate *before* calling this, so the cooldown is measured from
    /// request time, not completion time.
    pub fn start_personalization(&self, photo: crate::photo::SanitizedPhoto) -> u64 {
        let my_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let released = {
            let mut set = self.set.lock();
            set.supersede(my_generation)
        };
        if released > 0 {
            self.diagnostics
                .images_released
                .fetch_add(released, Ordering::Relaxed);
            debug!(released, "superseded previous personalized set");
        }
        if self.running.swap(true, Ordering::SeqCst) {
            self.diagnostics
                .runs_superseded
                .fetch_add(1, Ordering::Relaxed);
            info!(generation = my_generation, "superseding in-flight personalization run");
        }
        self.diagnostics
            .runs_started
            .fetch_add(1, Ordering::Relaxed);

        self.set_status(PipelineStatus::Composing, None);

        let ctx = pipeline::PipelineContext {
            config: self.config.clone(),
            composer: self.composer.clone(),
            catalog: Arc::clone(&self.catalog),
            photo,
            my_generation,
            current_generation: Arc::clone(&self.generation),
            running: Arc::clone(&self.running),
            set: Arc::clone(&self.set),
            status: Arc::clone(&self.status),
            progress_tx: self.progress_tx.clone(),
            status_tx: self.status_tx.clone(),
            seq: Arc::clone(&self.seq),
            diagnostics: Arc::clone(&self.diagnostics),
        };

        tokio::task::spawn_blocking(move || pipeline::run(ctx));
        my_generation
    }

    /// Request cancellation of the in-flight run.
    ///
    /// Best-effort: the loop observes the flag between tiles. The terminal
    /// `Cancelled` status is emitted by the loop itself.
    ///
    /// # Errors
    /// - `BoardError::NotRunning` if no run is in flight.
    pub fn cancel(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(BoardError::NotRunning);
        }
        info!("personalization cancel requested");
        Ok(())
    }

    /// Current status (snapshot).
    pub fn status(&self) -> PipelineStatus {
        *self.status.lock()
    }

    /// Two-tier lookup: personalized image when present, reference otherwise.
    pub fn tile_image(&self, tile: &TileSpec) -> TileImage {
        let set = self.set.lock();
        match set.get(&tile.key) {
            Some(image) => TileImage::Personalized(image.clone()),
            None => TileImage::Reference(tile.reference_image.clone()),
        }
    }

    /// Clone of one personalized image, if that tile has one.
    pub fn personalized_image(&self, tile_key: &str) -> Option<ComposedImage> {
        self.set.lock().get(tile_key).cloned()
    }

    /// Snapshot of the whole personalized set (for export/printing).
    pub fn snapshot(&self) -> HashMap<String, ComposedImage> {
        self.set.lock().images.clone()
    }

    /// Number of personalized tiles currently installed.
    pub fn personalized_count(&self) -> usize {
        self.set.lock().len()
    }

    /// Subscribe to per-tile progress events.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<PipelineProgressEvent> {
        self.progress_tx.subscribe()
    }

    /// Subscribe to status change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<PipelineStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Snapshot of pipeline counters for observability.
    pub fn diagnostics_snapshot(&self) -> pipeline::DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn set_status(&self, new_status: PipelineStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        let _ = self.status_tx.send(PipelineStatusEvent {
            status: new_status,
            detail,
        });
    }
}
