//! Sprite atlas descriptors and slicing.

use macroquad::math::Rect;
use macroquad::texture::Image;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One named rectangle of a sprite atlas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasEntry {
    /// Sub-image name with its file extension stripped.
    pub name: String,
    /// Left edge on the sheet, in pixels.
    pub x: u32,
    /// Top edge on the sheet, in pixels.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Parsed atlas descriptor: backing image path plus its rectangles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasDocument {
    /// Sheet path as written in the descriptor, relative to it.
    pub image_path: String,
    /// Rectangles in document order.
    pub entries: Vec<AtlasEntry>,
}

/// `"tankBody_green.png"` -> `"tankBody_green"`.
pub fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

/// Cuts one sub-image per entry out of `sheet`. Entries that do not fit
/// inside the sheet are skipped.
pub fn slice_atlas(sheet: &Image, entries: &[AtlasEntry]) -> BTreeMap<String, Image> {
    let mut pieces = BTreeMap::new();
    for entry in entries {
        let fits = entry.width > 0
            && entry.height > 0
            && entry
                .x
                .checked_add(entry.width)
                .is_some_and(|right| right <= sheet.width as u32)
            && entry
                .y
                .checked_add(entry.height)
                .is_some_and(|bottom| bottom <= sheet.height as u32);
        if !fits {
            log::warn!(
                "atlas entry '{}' ({}x{} at {},{}) lies outside the {}x{} sheet, skipped",
                entry.name,
                entry.width,
                entry.height,
                entry.x,
                entry.y,
                sheet.width,
                sheet.height
            );
            continue;
        }
        let rect = Rect::new(
            entry.x as f32,
            entry.y as f32,
            entry.width as f32,
            entry.height as f32,
        );
        pieces.insert(entry.name.clone(), sheet.sub_image(rect));
    }
    pieces
}
