//! Blocking personalization loop.
//!
//! ## Stages (per tile, in catalog order)
//!
//! ```text
//! 1. Check cancellation / supersession
//! 2. TileComposer::compose(photo, tile)
//! 3. On success: install into the set iff this run is still current
//! 4. Broadcast a PipelineProgressEvent (keyed by tile key)
//! ```
//!
//! One tile's failure is logged and skipped; the loop continues. The run is
//! reported complete regardless of individual failures — only the
//! everything-failed case surfaces as `Failed`.
//!
//! The whole loop runs in `spawn_blocking`, keeping the Tokio executor free
//! for event consumers.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{
    catalog::Catalog,
    compose::ComposerHandle,
    engine::{EngineConfig, PersonalizedSet},
    events::{PipelineProgressEvent, PipelineStatus, PipelineStatusEvent, TileOutcome},
    photo::SanitizedPhoto,
};

pub struct PipelineDiagnostics {
    pub tiles_attempted: AtomicUsize,
    pub tiles_composed: AtomicUsize,
    pub compose_errors: AtomicUsize,
    pub runs_started: AtomicUsize,
    pub runs_superseded: AtomicUsize,
    pub images_released: AtomicUsize,
}

impl Default for PipelineDiagnostics {
    fn default() -> Self {
        Self {
            tiles_attempted: AtomicUsize::new(0),
            tiles_composed: AtomicUsize::new(0),
            compose_errors: AtomicUsize::new(0),
            runs_started: AtomicUsize::new(0),
            runs_superseded: AtomicUsize::new(0),
            images_released: AtomicUsize::new(0),
        }
    }
}

impl PipelineDiagnostics {
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            tiles_attempted: self.tiles_attempted.load(Ordering::Relaxed),
            tiles_composed: self.tiles_composed.load(Ordering::Relaxed),
            compose_errors: self.compose_errors.load(Ordering::Relaxed),
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_superseded: self.runs_superseded.load(Ordering::Relaxed),
            images_released: self.images_released.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiagnosticsSnapshot {
    pub tiles_attempted: usize,
    pub tiles_composed: usize,
    pub compose_errors: usize,
    pub runs_started: usize,
    pub runs_superseded: usize,
    pub images_released: usize,
}

/// All context one run needs, passed as one struct so the closure stays tidy.
pub struct PipelineContext {
    pub config: EngineConfig,
    pub composer: ComposerHandle,
    pub catalog: Arc<Catalog>,
    pub photo: SanitizedPhoto,
    /// Generation this run was started with.
    pub my_generation: u64,
    /// Live generation counter; a later run bumps it past `my_generation`.
    pub current_generation: Arc<AtomicU64>,
    pub running: Arc<AtomicBool>,
    pub set: Arc<Mutex<PersonalizedSet>>,
    pub status: Arc<Mutex<PipelineStatus>>,
    pub progress_tx: broadcast::Sender<PipelineProgressEvent>,
    pub status_tx: broadcast::Sender<PipelineStatusEvent>,
    pub seq: Arc<AtomicU64>,
    pub diagnostics: Arc<PipelineDiagnostics>,
}

impl PipelineContext {
    fn is_current(&self) -> bool {
        self.current_generation.load(Ordering::SeqCst) == self.my_generation
    }
}

/// Walk the catalog and compose every tile, until done or interrupted.
pub fn run(ctx: PipelineContext) {
    let tile_keys: Vec<String> = {
        let all = ctx.catalog.tiles().map(|(_, t)| t.key.clone());
        match ctx.config.max_tiles {
            Some(cap) => all.take(cap).collect(),
            None => all.collect(),
        }
    };
    let total = tile_keys.len();
    if let Some(cap) = ctx.config.max_tiles {
        if total < ctx.catalog.tile_count() {
            info!(cap, total, "tile cap active — not all catalog tiles will be attempted");
        }
    }

    info!(
        generation = ctx.my_generation,
        total,
        photo_bytes = ctx.photo.byte_len(),
        "personalization run started"
    );

    let mut attempted = 0usize;
    let mut composed = 0usize;
    let mut interrupted = false;

    for key in &tile_keys {
        // ── 1. Cancellation / supersession check ──────────────────────────
        if !ctx.running.load(Ordering::SeqCst) || !ctx.is_current() {
            interrupted = true;
            break;
        }

        let Some(tile) = ctx.catalog.find_tile(key) else {
            // Catalog is immutable; a missing key here is a programming error.
            error!(tile = %key, "tile vanished from catalog mid-run");
            continue;
        };

        attempted += 1;
        ctx.diagnostics
            .tiles_attempted
            .fetch_add(1, Ordering::Relaxed);

        // ── 2. Compose ────────────────────────────────────────────────────
        let result = {
            let mut composer = ctx.composer.0.lock();
            composer.compose(&ctx.photo, tile)
        };

        // ── 3. Install (only while still current) ─────────────────────────
        let outcome = match result {
            Ok(image) => {
                let mut set = ctx.set.lock();
                if set.generation() == ctx.my_generation && ctx.running.load(Ordering::SeqCst) {
                    set.install(image);
                    composed += 1;
                    ctx.diagnostics
                        .tiles_composed
                        .fetch_add(1, Ordering::Relaxed);
                    TileOutcome::Composed
                } else {
                    debug!(tile = %key, "composition finished after supersession — discarded");
                    TileOutcome::Discarded
                }
            }
            Err(e) => {
                warn!(tile = %key, error = %e, "tile compose failed — continuing with reference image");
                ctx.diagnostics
                    .compose_errors
                    .fetch_add(1, Ordering::Relaxed);
                TileOutcome::Failed
            }
        };

        // ── 4. Progress event ─────────────────────────────────────────────
        let seq = ctx.seq.fetch_add(1, Ordering::Relaxed);
        let _ = ctx.progress_tx.send(PipelineProgressEvent {
            seq,
            generation: ctx.my_generation,
            tile_key: key.clone(),
            outcome,
            completed: attempted,
            composed,
            total,
        });
    }

    finish(&ctx, attempted, composed, interrupted);
}

fn finish(ctx: &PipelineContext, attempted: usize, composed: usize, interrupted: bool) {
    if !ctx.is_current() {
        // A newer run owns the status now; leave quietly.
        info!(
            generation = ctx.my_generation,
            attempted, composed, "personalization run superseded"
        );
        return;
    }

    if interrupted {
        set_status(ctx, PipelineStatus::Cancelled, None);
        info!(
            generation = ctx.my_generation,
            attempted, composed, "personalization run cancelled"
        );
        return;
    }

    ctx.running.store(false, Ordering::SeqCst);

    if composed == 0 && attempted > 0 {
        set_status(
            ctx,
            PipelineStatus::Failed,
            Some("personalization failed for every tile".into()),
        );
    } else {
        set_status(ctx, PipelineStatus::Completed, None);
    }

    let snap = ctx.diagnostics.snapshot();
    info!(
        generation = ctx.my_generation,
        attempted,
        composed,
        failed = attempted - composed,
        total_tiles_attempted = snap.tiles_attempted,
        total_compose_errors = snap.compose_errors,
        "personalization run finished"
    );
}

fn set_status(ctx: &PipelineContext, status: PipelineStatus, detail: Option<String>) {
    *ctx.status.lock() = status;
    let _ = ctx.status_tx.send(PipelineStatusEvent { status, detail });
}
