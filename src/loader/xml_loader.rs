// src/loader/xml_loader.rs
use crate::atlas::{strip_extension, AtlasDocument, AtlasEntry};
use crate::error::FormatError;
use crate::layer::*;
use crate::map::{Orientation, TileMap, TilesetSlot, TilesetStub};
use crate::properties::{Properties, PropertyKind};
use crate::tileset::{Frame, TileMeta, TileOffset, TileSet};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::str::FromStr;

/// Minimal owned DOM; Tiled documents are small enough to build in full.
#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, FormatError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| FormatError::Xml(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| FormatError::Xml(e.to_string()))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Element {
            name,
            attributes,
            ..Default::default()
        })
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn parse_attr<T: FromStr>(&self, key: &str) -> Result<Option<T>, FormatError> {
        match self.attr(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| FormatError::InvalidValue {
                    element: self.name.clone(),
                    attribute: key.to_owned(),
                    value: raw.to_owned(),
                }),
        }
    }

    fn attr_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, FormatError> {
        Ok(self.parse_attr(key)?.unwrap_or(default))
    }

    fn required<T: FromStr>(&self, key: &str) -> Result<T, FormatError> {
        self.parse_attr(key)?
            .ok_or_else(|| FormatError::MissingAttribute {
                element: self.name.clone(),
                attribute: key.to_owned(),
            })
    }

    /// Tiled writes booleans as `0`/`1`.
    fn flag(&self, key: &str, default: bool) -> Result<bool, FormatError> {
        match self.attr(key) {
            None => Ok(default),
            Some("1") | Some("true") => Ok(true),
            Some("0") | Some("false") => Ok(false),
            Some(other) => Err(FormatError::InvalidValue {
                element: self.name.clone(),
                attribute: key.to_owned(),
                value: other.to_owned(),
            }),
        }
    }

    fn owned_attr(&self, key: &str) -> Option<String> {
        self.attr(key).map(str::to_owned)
    }
}

fn attach(stack: &mut [Element], element: Element) -> Option<Element> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            None
        }
        None => Some(element),
    }
}

fn parse_document(bytes: &[u8]) -> Result<Element, FormatError> {
    let text = std::str::from_utf8(bytes).map_err(|e| FormatError::Xml(e.to_string()))?;
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(Element::from_start(&e)?),
            Ok(Event::Empty(e)) => {
                let element = Element::from_start(&e)?;
                if let Some(root) = attach(&mut stack, element) {
                    return Ok(root);
                }
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| FormatError::Xml("unbalanced closing tag".into()))?;
                if let Some(root) = attach(&mut stack, element) {
                    return Ok(root);
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(top) = stack.last_mut() {
                    let unescaped = t.unescape().map_err(|e| FormatError::Xml(e.to_string()))?;
                    top.text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::Eof) => {
                return Err(FormatError::Xml("unexpected end of document".into()));
            }
            Ok(_) => {}
            Err(e) => {
                return Err(FormatError::Xml(format!(
                    "at position {}: {e}",
                    reader.buffer_position()
                )));
            }
        }
    }
}

fn expect_root<'a>(root: &'a Element, name: &str) -> Result<&'a Element, FormatError> {
    if root.name == name {
        Ok(root)
    } else {
        Err(FormatError::MissingElement {
            element: name.to_owned(),
        })
    }
}

fn properties_from_xml(parent: &Element) -> Result<Option<Properties>, FormatError> {
    let Some(block) = parent.child("properties") else {
        return Ok(None);
    };
    let mut out = Properties::new();
    for prop in block.children_named("property") {
        let name: String = prop.required("name")?;
        let kind = PropertyKind::parse(&name, prop.attr("type").unwrap_or("string"))?;
        // Multi-line strings live in the element text instead of `value`.
        let raw = prop.attr("value").unwrap_or(prop.text.as_str());
        if let Some(value) = kind.parse_text(raw) {
            out.insert(name, value);
        }
    }
    Ok(out.non_empty())
}

fn points_attr(element: &Element) -> Result<Vec<Point>, FormatError> {
    let raw = element.attr("points").unwrap_or_default();
    parse_point_list(raw).ok_or_else(|| FormatError::InvalidValue {
        element: element.name.clone(),
        attribute: "points".into(),
        value: raw.to_owned(),
    })
}

fn object_from_xml(obj: &Element) -> Result<MapObject, FormatError> {
    let shape = if obj.child("point").is_some() {
        ObjectShape::Point
    } else if obj.child("ellipse").is_some() {
        ObjectShape::Ellipse
    } else if let Some(polygon) = obj.child("polygon") {
        ObjectShape::Polygon(points_attr(polygon)?)
    } else if let Some(polyline) = obj.child("polyline") {
        ObjectShape::Polyline(points_attr(polyline)?)
    } else {
        ObjectShape::Rectangle
    };

    let class_name = obj
        .attr("class")
        .or_else(|| obj.attr("type"))
        .unwrap_or_default()
        .to_owned();

    Ok(MapObject {
        id: obj.attr_or("id", 0)?,
        name: obj.attr("name").unwrap_or_default().to_owned(),
        class_name,
        x: obj.attr_or("x", 0.0)?,
        y: obj.attr_or("y", 0.0)?,
        width: obj.attr_or("width", 0.0)?,
        height: obj.attr_or("height", 0.0)?,
        rotation: obj.attr_or("rotation", 0.0)?,
        visible: obj.flag("visible", true)?,
        shape,
        properties: properties_from_xml(obj)?,
    })
}

fn objects_from_xml(group: &Element) -> Result<Vec<MapObject>, FormatError> {
    group.children_named("object").map(object_from_xml).collect()
}

fn tile_from_xml(tile: &Element) -> Result<TileMeta, FormatError> {
    let object_group = match tile.child("objectgroup") {
        Some(group) => Some(ObjectGroup {
            draw_order: group.owned_attr("draworder"),
            objects: objects_from_xml(group)?,
        }),
        None => None,
    };

    let animation = match tile.child("animation") {
        Some(anim) => {
            let frames = anim
                .children_named("frame")
                .map(|f| -> Result<Frame, FormatError> {
                    Ok(Frame {
                        tile_id: f.required("tileid")?,
                        duration_ms: f.required("duration")?,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            (!frames.is_empty()).then_some(frames)
        }
        None => None,
    };

    Ok(TileMeta {
        id: tile.required("id")?,
        object_group,
        animation,
        properties: properties_from_xml(tile)?,
    })
}

fn tileset_from_xml(ts: &Element) -> Result<TileSet, FormatError> {
    let image = ts.child("image");
    let tile_offset = match ts.child("tileoffset") {
        Some(offset) => Some(TileOffset {
            x: offset.attr_or("x", 0)?,
            y: offset.attr_or("y", 0)?,
        }),
        None => None,
    };
    let tiles = ts
        .children_named("tile")
        .map(tile_from_xml)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TileSet {
        name: ts.attr("name").unwrap_or_default().to_owned(),
        image: image
            .and_then(|img| img.owned_attr("source"))
            .filter(|s| !s.is_empty()),
        image_width: match image {
            Some(img) => img.attr_or("width", 0)?,
            None => 0,
        },
        image_height: match image {
            Some(img) => img.attr_or("height", 0)?,
            None => 0,
        },
        columns: ts.attr_or("columns", 0)?,
        tile_count: ts.attr_or("tilecount", 0)?,
        tile_width: ts.attr_or("tilewidth", 0)?,
        tile_height: ts.attr_or("tileheight", 0)?,
        margin: ts.attr_or("margin", 0)?,
        spacing: ts.attr_or("spacing", 0)?,
        tile_offset,
        tiles: (!tiles.is_empty()).then_some(tiles),
        properties: properties_from_xml(ts)?,
        firstgid: ts.attr_or("firstgid", 1)?,
        source: None,
    })
}

fn gids_from_xml(layer: &str, data: &Element, encoding: Option<&str>) -> Result<Vec<u32>, FormatError> {
    match encoding {
        Some("csv") => parse_csv_gids(&data.text).map_err(|reason| FormatError::InvalidTileData {
            layer: layer.to_owned(),
            reason,
        }),
        // No encoding: one <tile gid=".."/> per cell.
        None => data
            .children_named("tile")
            .map(|t| t.attr_or("gid", 0u32))
            .collect(),
        Some(other) => Err(FormatError::UnsupportedEncoding(other.to_owned())),
    }
}

fn tile_layer_data(
    layer: &Element,
    name: &str,
) -> Result<(Option<Vec<u32>>, Option<Vec<Chunk>>), FormatError> {
    let Some(data) = layer.child("data") else {
        return Ok((Some(Vec::new()), None));
    };
    if data.attr("compression").is_some() {
        return Err(FormatError::UnsupportedEncoding(
            data.attr("compression").unwrap_or_default().to_owned(),
        ));
    }
    let encoding = data.attr("encoding");
    let chunk_elements: Vec<&Element> = data.children_named("chunk").collect();
    if chunk_elements.is_empty() {
        return Ok((Some(gids_from_xml(name, data, encoding)?), None));
    }

    let chunks = chunk_elements
        .into_iter()
        .map(|c| -> Result<Chunk, FormatError> {
            Ok(Chunk {
                x: c.required("x")?,
                y: c.required("y")?,
                width: c.required("width")?,
                height: c.required("height")?,
                data: gids_from_xml(name, c, encoding)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((None, Some(chunks)))
}

fn layer_from_xml(el: &Element) -> Result<Option<Layer>, FormatError> {
    let kind = match el.name.as_str() {
        "layer" => LayerKind::Tiles,
        "objectgroup" => LayerKind::Objects,
        "imagelayer" => LayerKind::Image,
        "group" => LayerKind::Group,
        _ => return Ok(None),
    };
    let name = el.attr("name").unwrap_or_default().to_owned();

    let (data, chunks) = match kind {
        LayerKind::Tiles => tile_layer_data(el, &name)?,
        _ => (None, None),
    };
    let objects = match kind {
        LayerKind::Objects => Some(objects_from_xml(el)?),
        _ => None,
    };
    let image = match kind {
        LayerKind::Image => el
            .child("image")
            .and_then(|img| img.owned_attr("source"))
            .filter(|s| !s.is_empty()),
        _ => None,
    };
    let layers = match kind {
        LayerKind::Group => Some(layers_from_xml(el)?),
        _ => None,
    };

    Ok(Some(Layer {
        id: el.attr_or("id", 0)?,
        name,
        kind,
        width: el.attr_or("width", 0)?,
        height: el.attr_or("height", 0)?,
        visible: el.flag("visible", true)?,
        opacity: el.attr_or("opacity", 1.0)?,
        data,
        chunks,
        objects,
        image,
        layers,
        properties: properties_from_xml(el)?,
    }))
}

fn layers_from_xml(parent: &Element) -> Result<Vec<Layer>, FormatError> {
    let mut layers = Vec::new();
    for child in &parent.children {
        if let Some(layer) = layer_from_xml(child)? {
            layers.push(layer);
        }
    }
    Ok(layers)
}

/// Decodes a `.tmx`/`.xml` map. External tilesets stay as stubs.
pub fn decode_tile_map(bytes: &[u8]) -> Result<TileMap, FormatError> {
    let doc = parse_document(bytes)?;
    let map = expect_root(&doc, "map")?;

    let orientation = match map.attr("orientation") {
        None => Orientation::default(),
        Some(raw) => Orientation::parse(raw).ok_or_else(|| FormatError::InvalidValue {
            element: "map".into(),
            attribute: "orientation".into(),
            value: raw.to_owned(),
        })?,
    };

    let mut tilesets = Vec::new();
    for ts in map.children_named("tileset") {
        match ts.owned_attr("source") {
            Some(source) => tilesets.push(TilesetSlot::Stub(TilesetStub {
                firstgid: ts.attr_or("firstgid", 1)?,
                source,
            })),
            None => tilesets.push(TilesetSlot::Resolved(tileset_from_xml(ts)?)),
        }
    }

    Ok(TileMap {
        width: map.attr_or("width", 0)?,
        height: map.attr_or("height", 0)?,
        tile_width: map.required("tilewidth")?,
        tile_height: map.required("tileheight")?,
        orientation,
        infinite: map.flag("infinite", false)?,
        version: map.owned_attr("version"),
        tiled_version: map.owned_attr("tiledversion"),
        render_order: map.owned_attr("renderorder"),
        background_color: map.owned_attr("backgroundcolor"),
        properties: properties_from_xml(map)?,
        tilesets,
        layers: layers_from_xml(map)?,
    })
}

/// Decodes a standalone `.tsx`/`.xml` tileset.
pub fn decode_tileset(bytes: &[u8]) -> Result<TileSet, FormatError> {
    let doc = parse_document(bytes)?;
    tileset_from_xml(expect_root(&doc, "tileset")?)
}

/// Decodes a `<TextureAtlas imagePath=".."><SubTexture .../></TextureAtlas>` descriptor.
pub fn decode_atlas(bytes: &[u8]) -> Result<AtlasDocument, FormatError> {
    let doc = parse_document(bytes)?;
    let atlas = expect_root(&doc, "TextureAtlas")?;
    let image_path: String = atlas.required("imagePath")?;

    let entries = atlas
        .children_named("SubTexture")
        .map(|sub| -> Result<AtlasEntry, FormatError> {
            let raw_name: String = sub.required("name")?;
            Ok(AtlasEntry {
                name: strip_extension(&raw_name).to_owned(),
                x: sub.required("x")?,
                y: sub.required("y")?,
                width: sub.required("width")?,
                height: sub.required("height")?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AtlasDocument {
        image_path,
        entries,
    })
}
