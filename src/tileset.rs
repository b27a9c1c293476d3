use serde::{Deserialize, Serialize};

use crate::layer::ObjectGroup;
use crate::properties::Properties;

/// Canonical tileset, the same whether it came from `.tsj`/`.json`,
/// `.tsx`/`.xml` or was embedded in a map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct TileSet {
    pub name: String,
    /// Sprite sheet path as written in the document (relative to it).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub image_width: u32,
    pub image_height: u32,
    pub columns: u32,
    pub tile_count: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub margin: u32,
    pub spacing: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_offset: Option<TileOffset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiles: Option<Vec<TileMeta>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
    /// First global id; set by the referencing map.
    pub firstgid: u32,
    /// Url the tileset was loaded from, for external tilesets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl TileSet {
    /// Local tile id for a gid, if the gid belongs to this tileset.
    pub fn local_id(&self, gid: u32) -> Option<u32> {
        let local = gid.checked_sub(self.firstgid)?;
        (local < self.tile_count).then_some(local)
    }

    /// Metadata of a tile, if it has any.
    pub fn tile(&self, local_id: u32) -> Option<&TileMeta> {
        self.tiles.as_ref()?.iter().find(|t| t.id == local_id)
    }
}

/// Drawing offset applied to every tile of the set, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct TileOffset {
    pub x: i32,
    pub y: i32,
}

/// Per-tile metadata: collision shapes and animation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileMeta {
    /// Local tile id.
    pub id: u32,
    /// Collision shapes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_group: Option<ObjectGroup>,
    /// Frames in play order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<Vec<Frame>>,
    /// Custom properties of the tile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
}

/// One step of a tile animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Local id of the tile shown.
    pub tile_id: u32,
    /// How long it is shown.
    pub duration_ms: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tileset(firstgid: u32, tile_count: u32) -> TileSet {
        TileSet {
            name: "terrain".into(),
            image: None,
            image_width: 0,
            image_height: 0,
            columns: 4,
            tile_count,
            tile_width: 16,
            tile_height: 16,
            margin: 0,
            spacing: 0,
            tile_offset: None,
            tiles: None,
            properties: None,
            firstgid,
            source: None,
        }
    }

    #[test]
    fn local_id_respects_range() {
        let ts = tileset(17, 8);
        assert_eq!(ts.local_id(17), Some(0));
        assert_eq!(ts.local_id(24), Some(7));
        assert_eq!(ts.local_id(25), None);
        assert_eq!(ts.local_id(3), None);
    }

    #[test]
    fn absent_fields_are_not_serialized() {
        let json = serde_json::to_value(tileset(1, 4)).expect("serialize");
        let obj = json.as_object().expect("object");
        assert!(!obj.contains_key("image"));
        assert!(!obj.contains_key("tiles"));
        assert!(!obj.contains_key("tile_offset"));
        assert!(!obj.contains_key("source"));
    }
}
