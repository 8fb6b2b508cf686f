use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use feelboard_core::catalog::Catalog;
use feelboard_core::compose::{ComposedImage, TileComposer};
use feelboard_core::events::{PipelineStatus, PipelineStatusEvent};
use feelboard_core::photo::SanitizedPhoto;
use feelboard_core::{BoardError, ComposerHandle, EngineConfig, FeelingsEngine, TileImage};
use tokio::sync::broadcast;
use tokio::time::timeout;

struct ScriptedComposer {
    fail_keys: HashSet<String>,
    delay: Duration,
}

impl ScriptedComposer {
    fn new(fail_keys: &[&str]) -> Self {
        Self {
            fail_keys: fail_keys.iter().map(|k| k.to_string()).collect(),
            delay: Duration::ZERO,
        }
    }
}

impl TileComposer for ScriptedComposer {
    fn compose(
        &mut self,
        _photo: &SanitizedPhoto,
        tile: &feelboard_core::TileSpec,
    ) -> feelboard_core::error::Result<ComposedImage> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.fail_keys.contains(&tile.key) {
            return Err(BoardError::Compose("scripted failure".into()));
        }
        Ok(ComposedImage {
            tile_key: tile.key.clone(),
            media_type: "image/png".into(),
            bytes: tile.key.as_bytes().to_vec(),
        })
    }
}

fn photo() -> SanitizedPhoto {
    SanitizedPhoto {
        bytes: vec![0u8; 32],
        width: 8,
        height: 8,
    }
}

async fn wait_terminal(rx: &mut broadcast::Receiver<PipelineStatusEvent>) -> PipelineStatusEvent {
    loop {
        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for status event")
            .expect("status channel closed unexpectedly");
        if event.status != PipelineStatus::Composing {
            return event;
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn one_failed_tile_leaves_the_rest_personalized() {
    let catalog = Arc::new(Catalog::builtin().clone());
    let engine = FeelingsEngine::new(
        EngineConfig::default(),
        ComposerHandle::new(ScriptedComposer::new(&["worried"])),
        Arc::clone(&catalog),
    );

    let mut status_rx = engine.subscribe_status();
    engine.start_personalization(photo());

    let terminal = wait_terminal(&mut status_rx).await;
    assert_eq!(terminal.status, PipelineStatus::Completed);

    // 24 tiles in the builtin catalog; exactly one failed.
    assert_eq!(engine.personalized_count(), catalog.tile_count() - 1);
    assert!(engine.personalized_image("worried").is_none());
    assert!(engine.personalized_image("happy").is_some());

    // The failed tile resolves to its reference image.
    let worried = catalog.find_tile("worried").unwrap();
    match engine.tile_image(worried) {
        TileImage::Reference(path) => assert_eq!(path, worried.reference_image),
        TileImage::Personalized(_) => panic!("worried should not be personalized"),
    }

    let snap = engine.diagnostics_snapshot();
    assert_eq!(snap.tiles_attempted, catalog.tile_count());
    assert_eq!(snap.compose_errors, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn every_tile_failing_is_reported_as_total_failure() {
    let catalog = Arc::new(Catalog::builtin().clone());
    let fail_all: Vec<&str> = catalog.tiles().map(|(_, t)| t.key.as_str()).collect();
    let engine = FeelingsEngine::new(
        EngineConfig::default(),
        ComposerHandle::new(ScriptedComposer::new(&fail_all)),
        Arc::clone(&catalog),
    );

    let mut status_rx = engine.subscribe_status();
    engine.start_personalization(photo());

    let terminal = wait_terminal(&mut status_rx).await;
    assert_eq!(terminal.status, PipelineStatus::Failed);
    assert!(terminal.detail.is_some());
    assert_eq!(engine.personalized_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn progress_events_count_up_to_the_catalog_total() {
    let catalog = Arc::new(Catalog::builtin().clone());
    let engine = FeelingsEngine::new(
        EngineConfig::default(),
        ComposerHandle::new(ScriptedComposer::new(&[])),
        Arc::clone(&catalog),
    );

    let mut progress_rx = engine.subscribe_progress();
    let mut status_rx = engine.subscribe_status();
    engine.start_personalization(photo());
    wait_terminal(&mut status_rx).await;

    let mut events = Vec::new();
    while let Ok(event) = progress_rx.try_recv() {
        events.push(event);
    }
    assert_eq!(events.len(), catalog.tile_count());
    assert!(events.iter().all(|e| e.total == catalog.tile_count()));
    let last = events.last().unwrap();
    assert_eq!(last.completed, catalog.tile_count());
    assert_eq!(last.composed, catalog.tile_count());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn a_new_upload_supersedes_the_previous_set_wholesale() {
    let catalog = Arc::new(Catalog::builtin().clone());
    let slow = ScriptedComposer {
        fail_keys: HashSet::new(),
        delay: Duration::from_millis(20),
    };
    let engine = Arc::new(FeelingsEngine::new(
        EngineConfig::default(),
        ComposerHandle::new(slow),
        Arc::clone(&catalog),
    ));

    let mut status_rx = engine.subscribe_status();

    let first = engine.start_personalization(photo());
    // Let the first run install a few tiles, then supersede it.
    tokio::time::sleep(Duration::from_millis(60)).await;
    let second = engine.start_personalization(photo());
    assert_eq!(second, first + 1);

    // Drain status events until the second run's terminal state.
    let mut terminal = wait_terminal(&mut status_rx).await;
    while terminal.status == PipelineStatus::Cancelled {
        terminal = wait_terminal(&mut status_rx).await;
    }
    assert_eq!(terminal.status, PipelineStatus::Completed);

    // Give the superseded run time to fully unwind, then check hygiene.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(engine.personalized_count(), catalog.tile_count());

    let snap = engine.diagnostics_snapshot();
    assert_eq!(snap.runs_started, 2);
    assert_eq!(snap.runs_superseded, 1);
    // Whatever the first run installed was released exactly once, at
    // supersession time.
    assert!(snap.images_released >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_stops_installing_and_errors_when_idle() {
    let catalog = Arc::new(Catalog::builtin().clone());
    let slow = ScriptedComposer {
        fail_keys: HashSet::new(),
        delay: Duration::from_millis(20),
    };
    let engine = FeelingsEngine::new(
        EngineConfig::default(),
        ComposerHandle::new(slow),
        Arc::clone(&catalog),
    );

    let mut status_rx = engine.subscribe_status();
    engine.start_personalization(photo());
    tokio::time::sleep(Duration::from_millis(50)).await;
    engine.cancel().expect("cancel while running succeeds");

    let terminal = wait_terminal(&mut status_rx).await;
    assert_eq!(terminal.status, PipelineStatus::Cancelled);
    assert!(engine.personalized_count() < catalog.tile_count());

    assert!(matches!(engine.cancel(), Err(BoardError::NotRunning)));
}
