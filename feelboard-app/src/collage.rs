//! Printable collage export.
//!
//! Produces a single self-contained HTML document: title, optional category
//! headings, and an N-per-row grid of every tile. Personalized images are
//! embedded as base64 data URIs; a tile without one falls back to its
//! reference asset, and a missing asset renders a flat placeholder box so
//! the layout never collapses. Printing is the system's job (`@page` sets
//! the paper size).

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use feelboard_core::compose::ComposedImage;
use feelboard_core::error::Result;
use feelboard_core::Catalog;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CollageOptions {
    pub title: String,
    pub include_category_headings: bool,
    pub tiles_per_row: usize,
    pub page_size: PageSize,
}

impl Default for CollageOptions {
    fn default() -> Self {
        Self {
            title: "My Feelings".into(),
            include_category_headings: true,
            tiles_per_row: 3,
            page_size: PageSize::A4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    A4,
    Letter,
}

impl PageSize {
    fn css(self) -> &'static str {
        match self {
            PageSize::A4 => "A4",
            PageSize::Letter => "letter",
        }
    }
}

impl std::str::FromStr for PageSize {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a4" => Ok(PageSize::A4),
            "letter" => Ok(PageSize::Letter),
            other => Err(format!("unsupported page size: {other}")),
        }
    }
}

/// Write the collage document to `out_path`.
///
/// Labels are printed in English, matching the physical boards the collage
/// replaces.
pub fn export_collage(
    catalog: &Catalog,
    personalized: &HashMap<String, ComposedImage>,
    assets_root: &Path,
    options: &CollageOptions,
    out_path: &Path,
) -> Result<()> {
    let html = render_collage(catalog, personalized, assets_root, options);
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(out_path, html)?;
    debug!(path = %out_path.display(), "collage written");
    Ok(())
}

fn render_collage(
    catalog: &Catalog,
    personalized: &HashMap<String, ComposedImage>,
    assets_root: &Path,
    options: &CollageOptions,
) -> String {
    let tiles_per_row = options.tiles_per_row.max(1);
    let mut html = String::new();

    let _ = write!(
        html,
        "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>\n",
        escape(&options.title)
    );
    let _ = write!(
        html,
        "@page {{ size: {}; margin: 20mm; }}\n\
         body {{ font-family: Arial, sans-serif; background: white; }}\n\
         h1 {{ text-align: center; font-size: 24px; margin-bottom: 30px; color: #2C3E50; }}\n\
         h2 {{ font-size: 18px; margin: 40px 0 20px; color: #34495E; border-bottom: 2px solid #3498DB; padding-bottom: 10px; }}\n\
         .grid {{ display: grid; grid-template-columns: repeat({tiles_per_row}, 1fr); gap: 15px; margin-bottom: 30px; }}\n\
         .tile {{ text-align: center; padding: 10px; border: 1px solid #E1E8ED; border-radius: 8px; background: #F8F9FA; }}\n\
         .tile img, .tile .placeholder {{ width: 120px; height: 120px; object-fit: contain; display: block; margin: 0 auto 10px; }}\n\
         .tile .placeholder {{ background: #E1E8ED; }}\n\
         .tile .label {{ font-size: 14px; font-weight: bold; color: #2C3E50; word-wrap: break-word; }}\n\
         </style>\n</head>\n<body>\n",
        options.page_size.css()
    );
    let _ = write!(html, "<h1>{}</h1>\n", escape(&options.title));

    for category in &catalog.categories {
        if options.include_category_headings {
            let _ = write!(html, "<h2>{}</h2>\n", escape(&category.label.en));
        }
        html.push_str("<div class=\"grid\">\n");
        for tile in &category.tiles {
            html.push_str("<div class=\"tile\">\n");
            match tile_image_src(personalized.get(&tile.key), assets_root, tile) {
                Some(src) => {
                    let _ = write!(
                        html,
                        "<img src=\"{src}\" alt=\"{}\">\n",
                        escape(&tile.label.en)
                    );
                }
                None => html.push_str("<div class=\"placeholder\"></div>\n"),
            }
            let _ = write!(html, "<div class=\"label\">{}</div>\n", escape(&tile.label.en));
            html.push_str("</div>\n");
        }
        html.push_str("</div>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

/// Data URI for a tile: personalized image first, reference asset second.
fn tile_image_src(
    personalized: Option<&ComposedImage>,
    assets_root: &Path,
    tile: &feelboard_core::TileSpec,
) -> Option<String> {
    if let Some(image) = personalized {
        return Some(format!(
            "data:{};base64,{}",
            image.media_type,
            BASE64.encode(&image.bytes)
        ));
    }

    let reference_path = assets_root.join(&tile.reference_image);
    match fs::read(&reference_path) {
        Ok(bytes) => {
            let media_type = media_type_for_extension(&tile.reference_image);
            Some(format!("data:{media_type};base64,{}", BASE64.encode(bytes)))
        }
        Err(e) => {
            warn!(
                tile = %tile.key,
                path = %reference_path.display(),
                error = %e,
                "reference asset unreadable — rendering placeholder"
            );
            None
        }
    }
}

fn media_type_for_extension(path: &str) -> &'static str {
    match path.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn personalized(keys: &[&str]) -> HashMap<String, ComposedImage> {
        keys.iter()
            .map(|key| {
                (
                    key.to_string(),
                    ComposedImage {
                        tile_key: key.to_string(),
                        media_type: "image/png".into(),
                        bytes: vec![1, 2, 3, 4],
                    },
                )
            })
            .collect()
    }

    #[test]
    fn renders_title_headings_and_all_tiles() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::builtin();
        let html = render_collage(
            catalog,
            &personalized(&["happy"]),
            dir.path(),
            &CollageOptions::default(),
        );

        assert!(html.contains("<h1>My Feelings</h1>"));
        assert_eq!(html.matches("<h2>").count(), catalog.categories.len());
        assert_eq!(html.matches("class=\"tile\"").count(), catalog.tile_count());
        // The one personalized tile is embedded; everything else (no assets
        // in the temp root) falls back to placeholders.
        assert!(html.contains("data:image/png;base64,AQIDBA=="));
        assert_eq!(
            html.matches("class=\"placeholder\"").count(),
            catalog.tile_count() - 1
        );
    }

    #[test]
    fn headings_can_be_disabled_and_page_size_selected() {
        let dir = tempfile::tempdir().unwrap();
        let options = CollageOptions {
            include_category_headings: false,
            page_size: PageSize::Letter,
            tiles_per_row: 4,
            ..CollageOptions::default()
        };
        let html = render_collage(Catalog::builtin(), &HashMap::new(), dir.path(), &options);

        assert!(!html.contains("<h2>"));
        assert!(html.contains("size: letter"));
        assert!(html.contains("repeat(4, 1fr)"));
    }

    #[test]
    fn reference_asset_on_disk_is_embedded_when_no_personalized_entry() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::builtin();
        let tile = catalog.find_tile("happy").unwrap();
        let asset_path = dir.path().join(&tile.reference_image);
        fs::create_dir_all(asset_path.parent().unwrap()).unwrap();
        fs::write(&asset_path, [9u8, 9, 9]).unwrap();

        let src = tile_image_src(None, dir.path(), tile).unwrap();
        assert!(src.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn titles_are_html_escaped() {
        let dir = tempfile::tempdir().unwrap();
        let options = CollageOptions {
            title: "Tom & Jerry <3".into(),
            ..CollageOptions::default()
        };
        let html = render_collage(Catalog::builtin(), &HashMap::new(), dir.path(), &options);
        assert!(html.contains("Tom &amp; Jerry &lt;3"));
    }

    #[test]
    fn export_writes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("print").join("collage.html");
        export_collage(
            Catalog::builtin(),
            &HashMap::new(),
            dir.path(),
            &CollageOptions::default(),
            &out,
        )
        .unwrap();
        let written = fs::read_to_string(out).unwrap();
        assert!(written.starts_with("<!doctype html>"));
    }
}
