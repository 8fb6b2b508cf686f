//! HTTP client for a remote tile-compose service.
//!
//! The service contract: POST multipart with the sanitized photo, the
//! reference illustration and the tile key; the response body is the
//! personalized image. Each call carries its own timeout — a slow or dead
//! endpoint fails that one tile and the pipeline moves on.

use std::path::PathBuf;
use std::time::Duration;

use feelboard_core::compose::{ComposedImage, TileComposer};
use feelboard_core::error::{BoardError, Result};
use feelboard_core::photo::SanitizedPhoto;
use feelboard_core::TileSpec;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use tracing::debug;

/// Per-call deadline when the caller does not override it.
pub const DEFAULT_COMPOSE_TIMEOUT: Duration = Duration::from_secs(60);

pub struct HttpComposer {
    client: Client,
    endpoint: String,
    /// Root directory for the catalog's reference image paths.
    assets_root: PathBuf,
}

impl HttpComposer {
    pub fn new(
        endpoint: impl Into<String>,
        assets_root: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BoardError::Compose(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            assets_root: assets_root.into(),
        })
    }
}

impl TileComposer for HttpComposer {
    fn compose(&mut self, photo: &SanitizedPhoto, tile: &TileSpec) -> Result<ComposedImage> {
        let reference_path = self.assets_root.join(&tile.reference_image);
        let reference = std::fs::read(&reference_path)?;

        let form = Form::new()
            .part(
                "photo",
                Part::bytes(photo.bytes.clone())
                    .file_name("photo.png")
                    .mime_str(SanitizedPhoto::MEDIA_TYPE)
                    .map_err(|e| BoardError::Compose(e.to_string()))?,
            )
            .part(
                "reference",
                Part::bytes(reference).file_name(tile.reference_image.clone()),
            )
            .text("tileKey", tile.key.clone());

        debug!(tile = %tile.key, endpoint = %self.endpoint, "compose request");
        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .map_err(|e| BoardError::Compose(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BoardError::Compose(format!(
                "compose endpoint returned {status} for tile {}",
                tile.key
            )));
        }

        let media_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(SanitizedPhoto::MEDIA_TYPE)
            .to_string();
        let bytes = response
            .bytes()
            .map_err(|e| BoardError::Compose(e.to_string()))?
            .to_vec();
        if bytes.is_empty() {
            return Err(BoardError::Compose(format!(
                "compose endpoint returned an empty body for tile {}",
                tile.key
            )));
        }

        Ok(ComposedImage {
            tile_key: tile.key.clone(),
            media_type,
            bytes,
        })
    }
}
