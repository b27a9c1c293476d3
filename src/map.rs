use serde::{Deserialize, Serialize};

use crate::layer::Layer;
use crate::properties::Properties;
use crate::tileset::TileSet;

/// Tiled map orientation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum Orientation {
    #[default]
    Orthogonal,
    Isometric,
    Staggered,
    Hexagonal,
}

impl Orientation {
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw {
            "orthogonal" => Some(Self::Orthogonal),
            "isometric" => Some(Self::Isometric),
            "staggered" => Some(Self::Staggered),
            "hexagonal" => Some(Self::Hexagonal),
            _ => None,
        }
    }
}

/// Reference to an external tileset that has not been loaded yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilesetStub {
    /// First global id of the tileset's tiles in this map.
    pub firstgid: u32,
    /// Path as written in the map, relative to the map file.
    pub source: String,
}

/// A map's tileset entry: a stub until its external file is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TilesetSlot {
    /// Inline, or external and already loaded
    Resolved(TileSet),
    /// External and not loaded yet
    Stub(TilesetStub),
}

impl TilesetSlot {
    /// First global id, known for stubs too.
    pub fn firstgid(&self) -> u32 {
        match self {
            TilesetSlot::Resolved(ts) => ts.firstgid,
            TilesetSlot::Stub(stub) => stub.firstgid,
        }
    }

    /// The tileset, unless this is still a stub.
    pub fn resolved(&self) -> Option<&TileSet> {
        match self {
            TilesetSlot::Resolved(ts) => Some(ts),
            TilesetSlot::Stub(_) => None,
        }
    }
}

/// Canonical tile map. Fields mirror the Tiled attributes of the same name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct TileMap {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub orientation: Orientation,
    pub infinite: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiled_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_order: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
    pub tilesets: Vec<TilesetSlot>,
    pub layers: Vec<Layer>,
}

impl TileMap {
    /// True once every external tileset has been swapped in.
    pub fn is_fully_resolved(&self) -> bool {
        self.tilesets
            .iter()
            .all(|slot| matches!(slot, TilesetSlot::Resolved(_)))
    }

    /// Resolved tileset owning `gid` and the tile's local id within it.
    pub fn tileset_for_gid(&self, gid: u32) -> Option<(&TileSet, u32)> {
        let clean = gid & GID_MASK;
        if clean == 0 {
            return None;
        }
        // Owner is the slot with the greatest firstgid <= gid.
        let slot = self
            .tilesets
            .iter()
            .filter(|slot| slot.firstgid() <= clean)
            .max_by_key(|slot| slot.firstgid())?;
        let ts = slot.resolved()?;
        Some((ts, ts.local_id(clean)?))
    }

    /// First top-level layer called `name`.
    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }
}

/// Tiled stores flip flags in the top three bits of a gid.
pub const GID_MASK: u32 = 0x1FFF_FFFF;
