//! Document normalization: JSON and XML decoders that converge on the
//! canonical map/tileset/atlas types, plus url helpers.

/// `.tmj` and `.tsj` documents.
pub mod json_loader;
/// `.tmx`, `.tsx` and TextureAtlas documents.
pub mod xml_loader;

use crate::atlas::AtlasDocument;
use crate::error::{AssetError, FormatError};
use crate::map::TileMap;
use crate::tileset::TileSet;

/// Which structured document a url is expected to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// `.tmj`/`.tmx`, or `.json`/`.xml`
    TileMap,
    /// `.tsj`/`.tsx`, or `.json`/`.xml`
    TileSet,
    /// `.xml` only
    Atlas,
}

impl DocumentKind {
    fn label(self) -> &'static str {
        match self {
            DocumentKind::TileMap => "tile map",
            DocumentKind::TileSet => "tileset",
            DocumentKind::Atlas => "atlas",
        }
    }
}

/// Wire format of a structured document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum DocumentFormat {
    Json,
    Xml,
}

fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

fn extension(url: &str) -> Option<String> {
    let path = strip_query(url);
    let last = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = last.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Picks the decoder for `url` from its extension.
pub fn detect_format(url: &str, kind: DocumentKind) -> Result<DocumentFormat, AssetError> {
    let ext = extension(url);
    let format = match (kind, ext.as_deref()) {
        (DocumentKind::TileMap, Some("tmj" | "json")) => Some(DocumentFormat::Json),
        (DocumentKind::TileMap, Some("tmx" | "xml")) => Some(DocumentFormat::Xml),
        (DocumentKind::TileSet, Some("tsj" | "json")) => Some(DocumentFormat::Json),
        (DocumentKind::TileSet, Some("tsx" | "xml")) => Some(DocumentFormat::Xml),
        (DocumentKind::Atlas, Some("xml")) => Some(DocumentFormat::Xml),
        _ => None,
    };
    format.ok_or_else(|| AssetError::UnsupportedFormat {
        kind: kind.label(),
        url: url.to_owned(),
    })
}

/// Directory part of `url`, ending in `/`, used as the base for sibling
/// references. A last segment without an extension is treated as a directory.
pub fn base_dir(url: &str) -> String {
    let path = strip_query(url);
    if path.is_empty() || path.ends_with('/') {
        return path.to_owned();
    }
    if extension(path).is_none() {
        return format!("{path}/");
    }
    match path.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/"),
        None => String::new(),
    }
}

/// Joins a sibling reference onto `base` unless it is already absolute.
pub fn resolve_relative(base: &str, reference: &str) -> String {
    if reference.starts_with('/') || reference.contains("://") || base.is_empty() {
        reference.to_owned()
    } else {
        format!("{base}{reference}")
    }
}

/// Decodes a map with the decoder for `format`.
pub fn decode_tile_map(format: DocumentFormat, bytes: &[u8]) -> Result<TileMap, FormatError> {
    match format {
        DocumentFormat::Json => json_loader::decode_tile_map(bytes),
        DocumentFormat::Xml => xml_loader::decode_tile_map(bytes),
    }
}

/// Decodes a tileset with the decoder for `format`.
pub fn decode_tileset(format: DocumentFormat, bytes: &[u8]) -> Result<TileSet, FormatError> {
    match format {
        DocumentFormat::Json => json_loader::decode_tileset(bytes),
        DocumentFormat::Xml => xml_loader::decode_tileset(bytes),
    }
}

/// Atlas descriptors only exist as XML.
pub fn decode_atlas(format: DocumentFormat, bytes: &[u8]) -> Result<AtlasDocument, FormatError> {
    match format {
        DocumentFormat::Xml => xml_loader::decode_atlas(bytes),
        DocumentFormat::Json => Err(FormatError::UnsupportedEncoding("json atlas".into())),
    }
}
