use serde::{Deserialize, Serialize};

use crate::properties::Properties;

/// Which of Tiled's layer types a [`Layer`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    /// `tilelayer`
    #[serde(rename = "tilelayer")]
    Tiles,
    /// `objectgroup`
    #[serde(rename = "objectgroup")]
    Objects,
    /// `imagelayer`
    #[serde(rename = "imagelayer")]
    Image,
    /// `group`
    Group,
}

/// One layer of a tile map. `data` holds row-major gids for tile layers and
/// is `None` for every other kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct Layer {
    pub id: u32,
    pub name: String,
    pub kind: LayerKind,
    pub width: u32,
    pub height: u32,
    pub visible: bool,
    pub opacity: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u32>>,
    /// Infinite maps store tiles in chunks instead of `data`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<Chunk>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<MapObject>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Children of a group layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layers: Option<Vec<Layer>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
}

/// A rectangle of tiles of an infinite map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in tiles; may be negative.
    pub x: i32,
    /// Position in tiles; may be negative.
    pub y: i32,
    /// Size in tiles.
    pub width: u32,
    /// Size in tiles.
    pub height: u32,
    /// Row-major gids.
    pub data: Vec<u32>,
}

/// Polygon or polyline vertex, relative to its object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Geometry of a [`MapObject`]. Objects without a shape marker are rectangles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "points", rename_all = "lowercase")]
pub enum ObjectShape {
    /// Spans `width` x `height`
    Rectangle,
    /// Fits the object's bounding box
    Ellipse,
    /// Just the object position
    Point,
    /// Closed outline
    Polygon(Vec<Point>),
    /// Open outline
    Polyline(Vec<Point>),
}

/// An object from an object layer or from a tile's collision group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct MapObject {
    pub id: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub class_name: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub rotation: f32,
    pub visible: bool,
    pub shape: ObjectShape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
}

/// Collision shapes attached to a single tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectGroup {
    /// `index` or `topdown`, when the document says.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draw_order: Option<String>,
    /// Shapes in document order.
    pub objects: Vec<MapObject>,
}

/// Parses Tiled's `"x1,y1 x2,y2 ..."` point lists.
pub(crate) fn parse_point_list(raw: &str) -> Option<Vec<Point>> {
    raw.split_whitespace()
        .map(|pair| {
            let (x, y) = pair.split_once(',')?;
            Some(Point {
                x: x.trim().parse().ok()?,
                y: y.trim().parse().ok()?,
            })
        })
        .collect()
}

/// Flattens csv tile data (`"1,2,\n3,4"`) into gids.
pub(crate) fn parse_csv_gids(raw: &str) -> Result<Vec<u32>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u32>().map_err(|e| format!("'{s}': {e}")))
        .collect()
}
