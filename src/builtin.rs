//! Loader types registered on every [`crate::AssetsManager`].

use serde_json::json;
use std::future::Future;
use std::rc::Rc;

use crate::atlas::{slice_atlas, AtlasEntry};
use crate::context::LoadContext;
use crate::error::{AssetError, FormatError};
use crate::loader::{self, base_dir, detect_format, resolve_relative, DocumentKind};
use crate::map::{TileMap, TilesetSlot};
use crate::registry::{Asset, LoaderRegistry, ResourceRecord, Upload, UploadFn, UploadResult};
use crate::tileset::TileSet;

/// Sounds through the source's audio decoder.
pub const AUDIO: &str = "Audio";
/// CPU-side images.
pub const IMAGE: &str = "Image";
/// Tiled maps; external tilesets and tileset images are queued as dependencies.
pub const TILE_MAP: &str = "TileMap";
/// Tiled tilesets, standalone or on behalf of a map slot.
pub const TILESET: &str = "TileSet";
/// Atlas sheets sliced into named images.
pub const ATLAS_IMAGE_MAP: &str = "AtlasImageMap";
/// TextureAtlas descriptors; each queues its sheet.
pub const ATLAS_XML: &str = "AtlasXML";

/// Wraps an async loading function into an [`UploadFn`].
pub fn deferred_loader<F, Fut>(load: F) -> UploadFn
where
    F: Fn(LoadContext, ResourceRecord) -> Fut + 'static,
    Fut: Future<Output = UploadResult> + 'static,
{
    Rc::new(move |ctx: LoadContext, record: ResourceRecord| Upload::deferred(load(ctx, record)))
}

/// Default upload: the raw bytes behind the url.
pub fn fetch_bytes_loader() -> UploadFn {
    deferred_loader(load_bytes)
}

pub(crate) fn register_builtins(registry: &mut LoaderRegistry) {
    registry.register_loader_type(AUDIO, Some(deferred_loader(load_audio)));
    registry.register_loader_type(IMAGE, Some(deferred_loader(load_image)));
    registry.register_loader_type(TILE_MAP, Some(deferred_loader(load_tile_map)));
    registry.register_loader_type(TILESET, Some(deferred_loader(load_tileset)));
    registry.register_loader_type(ATLAS_IMAGE_MAP, Some(deferred_loader(load_atlas_image_map)));
    registry.register_loader_type(ATLAS_XML, Some(deferred_loader(load_atlas_xml)));
}

async fn load_bytes(ctx: LoadContext, record: ResourceRecord) -> UploadResult {
    let bytes = ctx.fetch(&record.url).await?;
    Ok(Some(Asset::Bytes(bytes)))
}

async fn load_audio(ctx: LoadContext, record: ResourceRecord) -> UploadResult {
    Ok(Some(ctx.load_audio(&record.url).await?))
}

async fn load_image(ctx: LoadContext, record: ResourceRecord) -> UploadResult {
    let bytes = ctx.fetch(&record.url).await?;
    let image = ctx.decode_image(&record.url, &bytes)?;
    Ok(Some(Asset::Image(image)))
}

/// Queues the tileset's image under the tileset name unless that key is taken.
fn queue_tileset_image(ctx: &LoadContext, base: &str, tileset: &TileSet) -> Result<(), AssetError> {
    let Some(image) = tileset.image.as_deref() else {
        return Ok(());
    };
    if tileset.name.trim().is_empty() {
        log::warn!("tileset with image '{image}' has no name, image not queued");
        return Ok(());
    }
    if ctx.contains_file(IMAGE, &tileset.name)? {
        return Ok(());
    }
    ctx.add_file(IMAGE, &tileset.name, &resolve_relative(base, image), Vec::new())?;
    Ok(())
}

fn queue_map_dependencies(
    ctx: &LoadContext,
    record: &ResourceRecord,
    map: &TileMap,
) -> Result<(), AssetError> {
    let base = base_dir(&record.url);
    for (index, slot) in map.tilesets.iter().enumerate() {
        match slot {
            TilesetSlot::Stub(stub) => {
                let url = resolve_relative(&base, &stub.source);
                ctx.add_file(
                    TILESET,
                    &format!("{}#{index}", record.key),
                    &url,
                    vec![json!(stub.firstgid), json!(record.key), json!(index)],
                )?;
            }
            TilesetSlot::Resolved(tileset) => queue_tileset_image(ctx, &base, tileset)?,
        }
    }
    Ok(())
}

async fn load_tile_map(ctx: LoadContext, record: ResourceRecord) -> UploadResult {
    let format = detect_format(&record.url, DocumentKind::TileMap)?;
    let bytes = ctx.fetch(&record.url).await?;
    let map = loader::decode_tile_map(format, &bytes)
        .map_err(|e| AssetError::format(&record.url, e))?;

    let skip_dependencies = record.arg_bool(0) == Some(true);
    if skip_dependencies || !ctx.settings().resolve_map_dependencies {
        log::debug!("tile map '{}' loaded without its dependencies", record.key);
    } else {
        queue_map_dependencies(&ctx, &record, &map)?;
    }
    Ok(Some(Asset::TileMap(map)))
}

async fn load_tileset(ctx: LoadContext, record: ResourceRecord) -> UploadResult {
    let format = detect_format(&record.url, DocumentKind::TileSet)?;
    let bytes = ctx.fetch(&record.url).await?;
    let mut tileset = loader::decode_tileset(format, &bytes)
        .map_err(|e| AssetError::format(&record.url, e))?;
    tileset.firstgid = record.arg_u32(0).unwrap_or(1);
    tileset.source = Some(record.url.clone());

    queue_tileset_image(&ctx, &base_dir(&record.url), &tileset)?;

    if let Some(map_key) = record.arg_str(1) {
        let index = record.arg_u32(2).ok_or_else(|| AssetError::MissingArgument {
            key: record.key.clone(),
            index: 2,
            what: "tileset slot index",
        })?;
        ctx.attach_tileset(map_key, index as usize, tileset.clone());
    }
    Ok(Some(Asset::TileSet(tileset)))
}

async fn load_atlas_xml(ctx: LoadContext, record: ResourceRecord) -> UploadResult {
    let format = detect_format(&record.url, DocumentKind::Atlas)?;
    let bytes = ctx.fetch(&record.url).await?;
    let document = loader::decode_atlas(format, &bytes)
        .map_err(|e| AssetError::format(&record.url, e))?;

    let image_url = resolve_relative(&base_dir(&record.url), &document.image_path);
    let entries = serde_json::to_value(&document.entries)
        .map_err(|e| AssetError::format(&record.url, FormatError::Json(e)))?;
    ctx.add_file(ATLAS_IMAGE_MAP, &record.key, &image_url, vec![entries])?;
    Ok(Some(Asset::AtlasEntries(document.entries)))
}

async fn load_atlas_image_map(ctx: LoadContext, record: ResourceRecord) -> UploadResult {
    let entries: Vec<AtlasEntry> = match record.arg(0) {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| AssetError::format(&record.url, FormatError::Json(e)))?,
        None => {
            return Err(AssetError::MissingArgument {
                key: record.key.clone(),
                index: 0,
                what: "atlas entries",
            })
        }
    };
    let bytes = ctx.fetch(&record.url).await?;
    let sheet = ctx.decode_image(&record.url, &bytes)?;

    let pieces = slice_atlas(&sheet, &entries);
    for (name, piece) in &pieces {
        ctx.register_completed(IMAGE, name, Asset::Image(piece.clone()))?;
    }
    log::debug!("atlas '{}' sliced into {} image(s)", record.key, pieces.len());
    Ok(Some(Asset::AtlasImages(pieces)))
}
