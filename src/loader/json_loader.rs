// src/loader/json_loader.rs
use crate::error::FormatError;
use crate::layer::*;
use crate::map::{Orientation, TileMap, TilesetSlot, TilesetStub};
use crate::properties::{Properties, PropertyKind, PropertyValue};
use crate::tileset::{Frame, TileMeta, TileOffset, TileSet};
use serde::Deserialize;
use serde_json::Value as JsonValue;

#[derive(Deserialize)]
struct JsonLayer {
    #[serde(default)]
    id: u32,
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default = "default_true")]
    visible: bool,
    #[serde(default = "one")]
    opacity: f32,
    #[serde(default)]
    data: Option<JsonValue>,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    chunks: Option<Vec<JsonChunk>>,
    #[serde(default)]
    objects: Vec<JsonObject>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    layers: Vec<JsonLayer>,
    #[serde(default)]
    properties: Vec<JsonProperty>,
}

fn default_true() -> bool {
    true
}
fn one() -> f32 {
    1.0
}

#[derive(Deserialize)]
struct JsonChunk {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    data: JsonValue,
}

#[derive(Deserialize)]
struct JsonMap {
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    tilewidth: u32,
    tileheight: u32,
    #[serde(default)]
    orientation: Option<String>,
    #[serde(default)]
    infinite: bool,
    #[serde(default)]
    version: Option<JsonValue>,
    #[serde(default)]
    tiledversion: Option<String>,
    #[serde(default)]
    renderorder: Option<String>,
    #[serde(default)]
    backgroundcolor: Option<String>,
    #[serde(default)]
    layers: Vec<JsonLayer>,
    #[serde(default)]
    tilesets: Vec<JsonTileset>,
    #[serde(default)]
    properties: Vec<JsonProperty>,
}

/// Either an external reference (`firstgid` + `source`) or a full inline
/// tileset; both shapes share this struct.
#[derive(Deserialize)]
struct JsonTileset {
    #[serde(default)]
    firstgid: Option<u32>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    imagewidth: u32,
    #[serde(default)]
    imageheight: u32,
    #[serde(default)]
    columns: u32,
    #[serde(default)]
    tilecount: u32,
    #[serde(default)]
    tilewidth: u32,
    #[serde(default)]
    tileheight: u32,
    #[serde(default)]
    spacing: u32,
    #[serde(default)]
    margin: u32,
    #[serde(default)]
    tileoffset: Option<TileOffset>,
    #[serde(default)]
    properties: Vec<JsonProperty>,
    #[serde(default)]
    tiles: Vec<JsonTile>,
}

#[derive(Deserialize)]
struct JsonProperty {
    name: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    value: JsonValue,
}

#[derive(Deserialize)]
struct JsonObject {
    #[serde(default)]
    id: u32,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    class: String,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    width: f32,
    #[serde(default)]
    height: f32,
    #[serde(default)]
    rotation: f32,
    #[serde(default = "default_true")]
    visible: bool,
    #[serde(default)]
    ellipse: bool,
    #[serde(default)]
    point: bool,
    #[serde(default)]
    polygon: Vec<Point>,
    #[serde(default)]
    polyline: Vec<Point>,
    #[serde(default)]
    properties: Vec<JsonProperty>,
}

#[derive(Deserialize)]
struct JsonObjectGroup {
    #[serde(default)]
    draworder: Option<String>,
    #[serde(default)]
    objects: Vec<JsonObject>,
}

#[derive(Deserialize)]
struct JsonFrame {
    tileid: u32,
    duration: u32,
}

#[derive(Deserialize)]
struct JsonTile {
    id: u32,
    #[serde(default)]
    properties: Vec<JsonProperty>,
    #[serde(default)]
    objectgroup: Option<JsonObjectGroup>,
    #[serde(default)]
    animation: Option<Vec<JsonFrame>>,
}

fn json_property_to_value(prop: JsonProperty) -> Result<Option<(String, PropertyValue)>, FormatError> {
    let JsonProperty { name, kind, value } = prop;

    let parsed = match kind.as_deref() {
        Some(kind) => match PropertyKind::parse(&name, kind)? {
            PropertyKind::Bool => value.as_bool().map(PropertyValue::Bool),
            PropertyKind::Int => value.as_i64().map(PropertyValue::Int),
            PropertyKind::Float => value.as_f64().map(PropertyValue::Float),
            PropertyKind::Text => value.as_str().map(|s| PropertyValue::String(s.to_owned())),
        },
        None => {
            if let Some(v) = value.as_bool() {
                Some(PropertyValue::Bool(v))
            } else if let Some(v) = value.as_i64() {
                Some(PropertyValue::Int(v))
            } else if let Some(v) = value.as_f64() {
                Some(PropertyValue::Float(v))
            } else {
                value.as_str().map(|s| PropertyValue::String(s.to_owned()))
            }
        }
    };

    Ok(parsed.map(|value| (name, value)))
}

fn properties_from_json(props: Vec<JsonProperty>) -> Result<Option<Properties>, FormatError> {
    let mut out = Properties::new();
    for p in props {
        if let Some((name, value)) = json_property_to_value(p)? {
            out.insert(name, value);
        }
    }
    Ok(out.non_empty())
}

fn object_from_json(obj: JsonObject) -> Result<MapObject, FormatError> {
    let shape = if obj.point {
        ObjectShape::Point
    } else if obj.ellipse {
        ObjectShape::Ellipse
    } else if !obj.polygon.is_empty() {
        ObjectShape::Polygon(obj.polygon)
    } else if !obj.polyline.is_empty() {
        ObjectShape::Polyline(obj.polyline)
    } else {
        ObjectShape::Rectangle
    };

    let class_name = if !obj.class.is_empty() {
        obj.class
    } else {
        obj.kind
    };

    Ok(MapObject {
        id: obj.id,
        name: obj.name,
        class_name,
        x: obj.x,
        y: obj.y,
        width: obj.width,
        height: obj.height,
        rotation: obj.rotation,
        visible: obj.visible,
        shape,
        properties: properties_from_json(obj.properties)?,
    })
}

fn objects_from_json(objects: Vec<JsonObject>) -> Result<Vec<MapObject>, FormatError> {
    objects.into_iter().map(object_from_json).collect()
}

fn tile_from_json(tile: JsonTile) -> Result<TileMeta, FormatError> {
    let object_group = match tile.objectgroup {
        Some(group) => Some(ObjectGroup {
            draw_order: group.draworder,
            objects: objects_from_json(group.objects)?,
        }),
        None => None,
    };
    let animation = tile.animation.filter(|f| !f.is_empty()).map(|frames| {
        frames
            .into_iter()
            .map(|f| Frame {
                tile_id: f.tileid,
                duration_ms: f.duration,
            })
            .collect()
    });

    Ok(TileMeta {
        id: tile.id,
        object_group,
        animation,
        properties: properties_from_json(tile.properties)?,
    })
}

fn tileset_from_json(ts: JsonTileset) -> Result<TileSet, FormatError> {
    let tiles = ts
        .tiles
        .into_iter()
        .map(tile_from_json)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TileSet {
        name: ts.name,
        image: ts.image.filter(|s| !s.is_empty()),
        image_width: ts.imagewidth,
        image_height: ts.imageheight,
        columns: ts.columns,
        tile_count: ts.tilecount,
        tile_width: ts.tilewidth,
        tile_height: ts.tileheight,
        margin: ts.margin,
        spacing: ts.spacing,
        tile_offset: ts.tileoffset,
        tiles: (!tiles.is_empty()).then_some(tiles),
        properties: properties_from_json(ts.properties)?,
        firstgid: ts.firstgid.unwrap_or(1),
        source: None,
    })
}

fn gids_from_json(layer: &str, data: JsonValue, encoding: Option<&str>) -> Result<Vec<u32>, FormatError> {
    match data {
        JsonValue::Array(values) => values
            .into_iter()
            .map(|v| {
                v.as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| FormatError::InvalidTileData {
                        layer: layer.to_owned(),
                        reason: format!("{v} is not a gid"),
                    })
            })
            .collect(),
        JsonValue::String(text) if encoding == Some("csv") => {
            parse_csv_gids(&text).map_err(|reason| FormatError::InvalidTileData {
                layer: layer.to_owned(),
                reason,
            })
        }
        JsonValue::String(_) => Err(FormatError::UnsupportedEncoding(
            encoding.unwrap_or("base64").to_owned(),
        )),
        other => Err(FormatError::InvalidTileData {
            layer: layer.to_owned(),
            reason: format!("unexpected data {other}"),
        }),
    }
}

fn layer_from_json(l: JsonLayer) -> Result<Layer, FormatError> {
    let kind = match l.kind.as_deref().unwrap_or("tilelayer") {
        "tilelayer" => LayerKind::Tiles,
        "objectgroup" => LayerKind::Objects,
        "imagelayer" => LayerKind::Image,
        "group" => LayerKind::Group,
        other => {
            return Err(FormatError::InvalidValue {
                element: "layer".into(),
                attribute: "type".into(),
                value: other.to_owned(),
            })
        }
    };

    let encoding = l.encoding.as_deref();
    let (data, chunks) = match kind {
        LayerKind::Tiles => {
            let chunks = match l.chunks {
                Some(chunks) => Some(
                    chunks
                        .into_iter()
                        .map(|c| -> Result<Chunk, FormatError> {
                            Ok(Chunk {
                                x: c.x,
                                y: c.y,
                                width: c.width,
                                height: c.height,
                                data: gids_from_json(&l.name, c.data, encoding)?,
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?,
                ),
                None => None,
            };
            let data = match l.data {
                Some(data) => Some(gids_from_json(&l.name, data, encoding)?),
                None if chunks.is_some() => None,
                None => Some(Vec::new()),
            };
            (data, chunks)
        }
        _ => (None, None),
    };

    let objects = match kind {
        LayerKind::Objects => Some(objects_from_json(l.objects)?),
        _ => None,
    };
    let layers = match kind {
        LayerKind::Group => Some(
            l.layers
                .into_iter()
                .map(layer_from_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        _ => None,
    };

    Ok(Layer {
        id: l.id,
        name: l.name,
        kind,
        width: l.width,
        height: l.height,
        visible: l.visible,
        opacity: l.opacity,
        data,
        chunks,
        objects,
        image: l.image.filter(|s| !s.is_empty()),
        layers,
        properties: properties_from_json(l.properties)?,
    })
}

fn version_string(v: JsonValue) -> Option<String> {
    match v {
        JsonValue::String(s) => Some(s),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decodes a `.tmj`/`.json` map. External tilesets stay as stubs.
pub fn decode_tile_map(bytes: &[u8]) -> Result<TileMap, FormatError> {
    let j: JsonMap = serde_json::from_slice(bytes)?;

    let orientation = match j.orientation.as_deref() {
        None => Orientation::default(),
        Some(raw) => Orientation::parse(raw).ok_or_else(|| FormatError::InvalidValue {
            element: "map".into(),
            attribute: "orientation".into(),
            value: raw.to_owned(),
        })?,
    };

    let mut tilesets = Vec::with_capacity(j.tilesets.len());
    for ts in j.tilesets {
        match ts.source.clone() {
            Some(source) => tilesets.push(TilesetSlot::Stub(TilesetStub {
                firstgid: ts.firstgid.unwrap_or(1),
                source,
            })),
            None => tilesets.push(TilesetSlot::Resolved(tileset_from_json(ts)?)),
        }
    }

    let layers = j
        .layers
        .into_iter()
        .map(layer_from_json)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TileMap {
        width: j.width,
        height: j.height,
        tile_width: j.tilewidth,
        tile_height: j.tileheight,
        orientation,
        infinite: j.infinite,
        version: j.version.and_then(version_string),
        tiled_version: j.tiledversion,
        render_order: j.renderorder,
        background_color: j.backgroundcolor,
        properties: properties_from_json(j.properties)?,
        tilesets,
        layers,
    })
}

/// Decodes a standalone `.tsj`/`.json` tileset.
pub fn decode_tileset(bytes: &[u8]) -> Result<TileSet, FormatError> {
    let ts: JsonTileset = serde_json::from_slice(bytes)?;
    tileset_from_json(ts)
}
