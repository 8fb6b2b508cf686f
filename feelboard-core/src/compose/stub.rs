//! `InsetComposer` — deterministic local composition without a model call.
//!
//! Draws the user's photo as an inset over a flat backdrop whose color is
//! derived from the tile key, so every tile gets a visually distinct,
//! reproducible output. Used when no remote compose endpoint is configured.

use std::io::Cursor;

use image::{imageops, DynamicImage, ImageFormat, Rgba, RgbaImage};
use tracing::debug;

use crate::catalog::TileSpec;
use crate::compose::{ComposedImage, TileComposer};
use crate::error::{BoardError, Result};
use crate::photo::SanitizedPhoto;

const CANVAS_SIZE: u32 = 512;
const INSET_SIZE: u32 = 384;

pub struct InsetComposer;

impl InsetComposer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for InsetComposer {
    fn default() -> Self {
        Self::new()
    }
}

impl TileComposer for InsetComposer {
    fn compose(&mut self, photo: &SanitizedPhoto, tile: &TileSpec) -> Result<ComposedImage> {
        let decoded = image::load_from_memory(&photo.bytes)
            .map_err(|e| BoardError::ImageDecode(e.to_string()))?;

        let mut canvas = RgbaImage::from_pixel(CANVAS_SIZE, CANVAS_SIZE, backdrop(&tile.key));
        let inset = decoded.thumbnail(INSET_SIZE, INSET_SIZE).to_rgba8();
        let x = i64::from((CANVAS_SIZE - inset.width()) / 2);
        let y = i64::from((CANVAS_SIZE - inset.height()) / 2);
        imageops::overlay(&mut canvas, &inset, x, y);

        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(canvas)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| BoardError::Compose(e.to_string()))?;

        debug!(tile = %tile.key, bytes = bytes.len(), "inset composition complete");
        Ok(ComposedImage {
            tile_key: tile.key.clone(),
            media_type: SanitizedPhoto::MEDIA_TYPE.to_string(),
            bytes,
        })
    }
}

/// Flat backdrop color derived from the tile key.
fn backdrop(key: &str) -> Rgba<u8> {
    let mut hash = 0xcbf2_9ce4u32;
    for b in key.bytes() {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    let [_, r, g, b] = hash.to_be_bytes();
    // Bias toward pastel so the inset stays legible.
    Rgba([128 + r / 2, 128 + g / 2, 128 + b / 2, 255])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn photo(width: u32, height: u32) -> SanitizedPhoto {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 150, 100, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        SanitizedPhoto {
            bytes,
            width,
            height,
        }
    }

    #[test]
    fn composition_is_keyed_and_decodable() {
        let mut composer = InsetComposer::new();
        let tile = Catalog::builtin().find_tile("happy").unwrap();
        let out = composer.compose(&photo(64, 48), tile).unwrap();
        assert_eq!(out.tile_key, "happy");
        assert_eq!(out.media_type, "image/png");
        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!(decoded.width(), CANVAS_SIZE);
        assert_eq!(decoded.height(), CANVAS_SIZE);
    }

    #[test]
    fn composition_is_deterministic_per_tile() {
        let mut composer = InsetComposer::new();
        let tile = Catalog::builtin().find_tile("calm").unwrap();
        let a = composer.compose(&photo(32, 32), tile).unwrap();
        let b = composer.compose(&photo(32, 32), tile).unwrap();
        assert_eq!(a.bytes, b.bytes);
    }

    #[test]
    fn different_tiles_get_different_backdrops() {
        assert_ne!(backdrop("happy"), backdrop("sad"));
    }

    #[test]
    fn garbage_photo_bytes_error_instead_of_panicking() {
        let mut composer = InsetComposer::new();
        let tile = Catalog::builtin().find_tile("happy").unwrap();
        let bad = SanitizedPhoto {
            bytes: vec![9, 9, 9],
            width: 1,
            height: 1,
        };
        assert!(matches!(
            composer.compose(&bad, tile),
            Err(BoardError::ImageDecode(_))
        ));
    }
}
