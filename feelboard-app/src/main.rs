//! Feelboard command-line host.
//!
//! Wires the engine SDK to concrete collaborators: a file-backed session
//! store, espeak-ng for speech, an optional remote compose endpoint (local
//! inset composition otherwise), and the HTML collage exporter.

mod collage;
mod compose_http;
mod settings;
mod speech_espeak;
mod storage;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use feelboard_core::compose::stub::InsetComposer;
use feelboard_core::compose::ComposedImage;
use feelboard_core::moderation::stub::{NeutralClassifier, PixelContentDetector};
use feelboard_core::speech::stub::SilentSynthesizer;
use feelboard_core::{
    Catalog, ClassifierHandle, ComposerHandle, DetectorHandle, EngineConfig, FeelingsEngine,
    GenerationGate, Lang, PipelineStatus, SessionGate, SpeechDriver, SpeechOutcome,
    SynthesizerHandle, UploadCandidate, UploadValidator, ValidatorConfig,
};
use tracing::{info, warn};

use collage::{CollageOptions, PageSize};
use compose_http::{HttpComposer, DEFAULT_COMPOSE_TIMEOUT};
use settings::{default_settings_path, load_settings, normalize_language, save_settings};
use speech_espeak::EspeakSynthesizer;
use storage::FileSessionStore;

#[derive(Parser)]
#[command(name = "feelboard", about = "Personalized AAC feelings board", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a photo and generate the personalized tile set.
    Generate(GenerateArgs),
    /// Speak a tile label (or free text) aloud.
    Speak(SpeakArgs),
    /// List the feeling catalog.
    Catalog {
        /// Label language (en, es, pt). Defaults to the saved preference.
        #[arg(long)]
        lang: Option<String>,
    },
    /// Show or clear the current session.
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Export a printable collage from a previous generate run.
    Collage(CollageArgs),
    /// Show or change saved preferences (language, contrast).
    Config {
        /// New display/speech language (en, es, pt).
        #[arg(long)]
        language: Option<String>,
        /// Enable or disable the high-contrast display hint.
        #[arg(long)]
        high_contrast: Option<bool>,
    },
}

#[derive(Args)]
struct GenerateArgs {
    /// Photo to personalize (one clearly visible face).
    photo: PathBuf,
    /// Where personalized images are written.
    #[arg(long, default_value = "feelboard-out")]
    out_dir: PathBuf,
    /// Remote compose endpoint; omitted = local inset composition.
    #[arg(long, env = "FEELBOARD_COMPOSE_ENDPOINT")]
    compose_endpoint: Option<String>,
    /// Root directory holding the catalog's reference assets.
    #[arg(long, default_value = ".")]
    assets_root: PathBuf,
    /// Cap on tiles attempted (smoke-testing aid).
    #[arg(long)]
    max_tiles: Option<usize>,
    /// Reject uploads when the safety classifier is unavailable.
    #[arg(long)]
    fail_closed: bool,
    /// Also export a printable collage next to the images.
    #[arg(long)]
    collage: bool,
}

#[derive(Args)]
struct SpeakArgs {
    /// Tile key to speak (e.g. "happy").
    #[arg(long, conflicts_with = "text")]
    tile: Option<String>,
    /// Free text to speak instead of a tile label.
    #[arg(long)]
    text: Option<String>,
    /// Language override (en, es, pt).
    #[arg(long)]
    lang: Option<String>,
}

#[derive(Subcommand)]
enum SessionAction {
    /// Print session info (start, count, cooldown).
    Info,
    /// Drop all session data.
    Clear,
}

#[derive(Args)]
struct CollageArgs {
    /// Directory of personalized images from a generate run.
    #[arg(long)]
    images_dir: PathBuf,
    /// Output HTML file.
    #[arg(long, default_value = "feelboard-collage.html")]
    out: PathBuf,
    /// Root directory holding the catalog's reference assets.
    #[arg(long, default_value = ".")]
    assets_root: PathBuf,
    #[arg(long, default_value = "My Feelings")]
    title: String,
    #[arg(long, default_value_t = 3)]
    tiles_per_row: usize,
    /// Page size: a4 or letter.
    #[arg(long, default_value = "a4")]
    page_size: String,
    /// Omit the category headings.
    #[arg(long)]
    no_headings: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feelboard=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Generate(args) => generate(args).await,
        Command::Speak(args) => speak(args).await,
        Command::Catalog { lang } => {
            print_catalog(resolve_lang(lang)?);
            Ok(())
        }
        Command::Session { action } => session(action),
        Command::Collage(args) => export_collage_from_dir(args),
        Command::Config {
            language,
            high_contrast,
        } => config(language, high_contrast),
    }
}

fn session_gate() -> SessionGate {
    let store = Arc::new(FileSessionStore::new(FileSessionStore::default_session_path()));
    let gate = SessionGate::new(store);
    gate.initialize();
    gate
}

fn resolve_lang(override_lang: Option<String>) -> anyhow::Result<Lang> {
    match override_lang {
        Some(raw) => raw.parse::<Lang>().map_err(|e| anyhow::anyhow!(e)),
        None => Ok(load_settings(&default_settings_path()).lang()),
    }
}

async fn generate(args: GenerateArgs) -> anyhow::Result<()> {
    let gate = session_gate();

    // Cooldown is checked at the request boundary, before any file work.
    if let GenerationGate::CoolingDown { retry_after_secs } = gate.can_generate() {
        info!(retry_after_secs, "generation blocked by cooldown");
        bail!("please wait {retry_after_secs} more seconds before creating another avatar");
    }

    let candidate = read_candidate(&args.photo)?;
    info!(
        file = %candidate.file_name,
        media_type = %candidate.media_type,
        bytes = candidate.byte_len(),
        "upload received"
    );

    let validator = UploadValidator::new(
        ValidatorConfig {
            open_on_unavailable: !args.fail_closed,
            ..ValidatorConfig::default()
        },
        ClassifierHandle::new(NeutralClassifier),
        DetectorHandle::new(PixelContentDetector),
    );

    let photo = match validator.validate(&candidate) {
        Ok(photo) => photo,
        Err(reason) => {
            info!(reason = %reason, "upload blocked by moderation");
            bail!("upload rejected: {reason}");
        }
    };

    // Record before the pipeline starts so a slow pipeline still enforces
    // the cooldown from request time.
    gate.record_generation();
    let count = gate.increment_count();
    info!(avatars_created = count, "generation accepted");

    let composer = match &args.compose_endpoint {
        Some(endpoint) => ComposerHandle::new(HttpComposer::new(
            endpoint.clone(),
            args.assets_root.clone(),
            DEFAULT_COMPOSE_TIMEOUT,
        )?),
        None => ComposerHandle::new(InsetComposer::new()),
    };

    let catalog = Arc::new(Catalog::builtin().clone());
    let engine = FeelingsEngine::new(
        EngineConfig {
            max_tiles: args.max_tiles,
        },
        composer,
        Arc::clone(&catalog),
    );

    let mut progress_rx = engine.subscribe_progress();
    let mut status_rx = engine.subscribe_status();
    let started = Instant::now();
    engine.start_personalization(photo);

    // Live "N of Total" indicator while tiles complete out of band.
    let progress_task = tokio::spawn(async move {
        while let Ok(event) = progress_rx.recv().await {
            println!(
                "  [{}/{}] {} — {:?}",
                event.completed, event.total, event.tile_key, event.outcome
            );
        }
    });

    let terminal = loop {
        let event = status_rx
            .recv()
            .await
            .context("engine status channel closed")?;
        if event.status != PipelineStatus::Composing {
            break event;
        }
    };
    let elapsed = started.elapsed();
    progress_task.abort();

    match terminal.status {
        PipelineStatus::Completed => {
            let images = engine.snapshot();
            write_images(&args.out_dir, &images)?;
            info!(
                personalized = images.len(),
                total = catalog.tile_count(),
                elapsed_ms = elapsed.as_millis() as u64,
                "personalization finished"
            );
            println!(
                "Personalized {} of {} tiles in {:.1}s → {}",
                images.len(),
                catalog.tile_count(),
                elapsed.as_secs_f32(),
                args.out_dir.display()
            );

            if args.collage {
                let out = args.out_dir.join("collage.html");
                collage::export_collage(
                    &catalog,
                    &images,
                    &args.assets_root,
                    &CollageOptions::default(),
                    &out,
                )?;
                println!("Collage written to {}", out.display());
            }
            Ok(())
        }
        PipelineStatus::Failed => {
            warn!("personalization failed for every tile");
            bail!(
                "personalization failed entirely: {}",
                terminal.detail.unwrap_or_else(|| "unknown error".into())
            );
        }
        other => bail!("personalization ended unexpectedly: {other:?}"),
    }
}

async fn speak(args: SpeakArgs) -> anyhow::Result<()> {
    let lang = resolve_lang(args.lang)?;
    let catalog = Catalog::builtin();

    let text = match (&args.tile, &args.text) {
        (Some(key), _) => {
            let tile = catalog
                .find_tile(key)
                .with_context(|| format!("unknown tile key: {key}"))?;
            tile.label.get(lang).to_string()
        }
        (None, Some(text)) => text.clone(),
        (None, None) => bail!("pass --tile <key> or --text <text>"),
    };

    info!(text = %text, lang = %lang, "tile tapped");

    // Prefer the system TTS; fall back to the silent backend so the flow
    // still runs end-to-end on hosts without espeak-ng.
    let synth = {
        use feelboard_core::SpeechSynthesizer as _;
        let mut espeak = EspeakSynthesizer::new();
        if espeak.is_supported() {
            SynthesizerHandle::new(espeak)
        } else {
            warn!("espeak-ng unavailable — using silent speech backend");
            SynthesizerHandle::new(SilentSynthesizer::new())
        }
    };
    let driver = Arc::new(SpeechDriver::new(synth));

    let spoken = text.clone();
    let outcome = tokio::task::spawn_blocking({
        let driver = Arc::clone(&driver);
        move || driver.speak(&spoken, lang)
    })
    .await?;

    match outcome {
        SpeechOutcome::Completed => println!("Spoke: {text}"),
        SpeechOutcome::Failed | SpeechOutcome::Unsupported => {
            // Visual-only degradation: the label is still shown.
            println!("(speech unavailable) {text}");
        }
        SpeechOutcome::Busy => println!("(already speaking) {text}"),
    }
    Ok(())
}

fn print_catalog(lang: Lang) {
    let catalog = Catalog::builtin();
    for category in &catalog.categories {
        println!("{} ({})", category.label.get(lang), category.key);
        for tile in &category.tiles {
            println!("  {:<14} {}", tile.key, tile.label.get(lang));
        }
    }
}

fn session(action: SessionAction) -> anyhow::Result<()> {
    let gate = session_gate();
    match action {
        SessionAction::Info => {
            let info = gate.info();
            println!("session start:   {} ms since epoch", info.session_start_ms);
            println!("avatars created: {}", info.avatars_created);
            match info.last_generation_ms {
                Some(last) => println!("last generation: {last} ms since epoch"),
                None => println!("last generation: never"),
            }
            match info.gate {
                GenerationGate::Allowed => println!("cooldown:        ready"),
                GenerationGate::CoolingDown { retry_after_secs } => {
                    println!("cooldown:        {retry_after_secs}s remaining")
                }
            }
        }
        SessionAction::Clear => {
            gate.clear();
            println!("session cleared");
        }
    }
    Ok(())
}

fn export_collage_from_dir(args: CollageArgs) -> anyhow::Result<()> {
    let catalog = Catalog::builtin();
    let images = read_images(&args.images_dir, catalog)?;
    if images.is_empty() {
        warn!(dir = %args.images_dir.display(), "no personalized images found — collage will use reference images");
    }

    let options = CollageOptions {
        title: args.title,
        include_category_headings: !args.no_headings,
        tiles_per_row: args.tiles_per_row,
        page_size: args.page_size.parse::<PageSize>().map_err(|e| anyhow::anyhow!(e))?,
    };
    collage::export_collage(catalog, &images, &args.assets_root, &options, &args.out)?;
    println!("Collage written to {}", args.out.display());
    Ok(())
}

fn config(language: Option<String>, high_contrast: Option<bool>) -> anyhow::Result<()> {
    let path = default_settings_path();
    let mut settings = load_settings(&path);

    let mut changed = false;
    if let Some(raw) = language {
        let normalized = normalize_language(&raw);
        if normalized != settings.language {
            info!(from = %settings.language, to = %normalized, "language changed");
            settings.language = normalized;
            changed = true;
        }
    }
    if let Some(contrast) = high_contrast {
        if contrast != settings.high_contrast {
            info!(high_contrast = contrast, "contrast preference changed");
            settings.high_contrast = contrast;
            changed = true;
        }
    }

    if changed {
        save_settings(&path, &settings).context("failed to save settings")?;
    }
    println!("language:      {}", settings.language);
    println!("high contrast: {}", settings.high_contrast);
    Ok(())
}

fn read_candidate(path: &Path) -> anyhow::Result<UploadCandidate> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read photo: {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "photo".into());
    Ok(UploadCandidate::new(
        file_name,
        media_type_for_path(path),
        bytes,
    ))
}

fn media_type_for_path(path: &Path) -> String {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
    .to_string()
}

fn write_images(out_dir: &Path, images: &HashMap<String, ComposedImage>) -> anyhow::Result<()> {
    std::fs::create_dir_all(out_dir)?;
    for (key, image) in images {
        let ext = match image.media_type.as_str() {
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            _ => "png",
        };
        let path = out_dir.join(format!("{key}.{ext}"));
        std::fs::write(&path, &image.bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}

/// Load `<tileKey>.<ext>` files from a previous generate run.
fn read_images(dir: &Path, catalog: &Catalog) -> anyhow::Result<HashMap<String, ComposedImage>> {
    let mut images = HashMap::new();
    if !dir.exists() {
        bail!("images directory does not exist: {}", dir.display());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if catalog.find_tile(stem).is_none() {
            continue;
        }
        let bytes = std::fs::read(&path)?;
        images.insert(
            stem.to_string(),
            ComposedImage {
                tile_key: stem.to_string(),
                media_type: media_type_for_path(&path),
                bytes,
            },
        );
    }
    Ok(images)
}
