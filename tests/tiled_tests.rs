mod common;

use common::{count, record_events, TestSource};
use macroquad_preloader::loader::{self, DocumentFormat};
use macroquad_preloader::{
    AssetsManager, LayerKind, ObjectShape, PreloadSettings, ProgressEventKind, PropertyValue,
    TilesetSlot,
};
use pollster::block_on;

const LEVEL_TMJ: &str = r#"{
    "width": 2, "height": 1, "tilewidth": 16, "tileheight": 16,
    "orientation": "orthogonal",
    "tilesets": [
        { "firstgid": 1, "source": "terrain.tsj" },
        { "firstgid": 5, "source": "../shared/props.tsx" }
    ],
    "layers": [
        { "id": 1, "name": "ground", "type": "tilelayer", "width": 2, "height": 1, "data": [1, 6] }
    ]
}"#;

const TERRAIN_TSJ: &str = r#"{
    "name": "terrain", "image": "terrain.png", "imagewidth": 32, "imageheight": 32,
    "columns": 2, "tilecount": 4, "tilewidth": 16, "tileheight": 16
}"#;

const PROPS_TSX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tileset name="props" tilewidth="16" tileheight="16" tilecount="4" columns="2">
 <image source="props.png" width="32" height="32"/>
</tileset>"#;

fn level_source() -> TestSource {
    TestSource::new()
        .file("maps/level.tmj", LEVEL_TMJ)
        .file("maps/terrain.tsj", TERRAIN_TSJ)
        .file("maps/../shared/props.tsx", PROPS_TSX)
        .image("maps/terrain.png", 32, 32)
        .image("maps/../shared/props.png", 32, 32)
}

#[test]
fn external_tilesets_replace_their_stubs() {
    let manager = AssetsManager::with_source(level_source());
    manager.add_tile_map("level", "maps/level.tmj").expect("add");
    let events = record_events(&manager);

    block_on(manager.preload()).expect("preload");

    let map = manager.get_tile_map("level").expect("map loaded");
    assert!(map.is_fully_resolved());
    let (props, local) = map.tileset_for_gid(6).expect("gid 6");
    assert_eq!(props.name, "props");
    assert_eq!(local, 1);

    let terrain = manager.get_tileset("level#0").expect("tileset stored by slot key");
    assert_eq!(terrain.firstgid, 1);
    assert_eq!(terrain.source.as_deref(), Some("maps/terrain.tsj"));
    assert_eq!(manager.get_tileset("level#1").map(|t| t.firstgid), Some(5));

    assert_eq!(manager.get_image("terrain").map(|i| i.width), Some(32));
    assert!(manager.get_image("props").is_some());

    // map, two tilesets, two images
    let events = events.borrow();
    assert_eq!(count(&events, ProgressEventKind::Progress), 5);
    assert_eq!(count(&events, ProgressEventKind::Error), 0);
    assert_eq!(events[0].total, 1);
}

#[test]
fn skip_flag_leaves_stubs_alone() {
    let source = level_source();
    let manager = AssetsManager::with_source(source.clone());
    manager
        .add_tile_map_without_dependencies("level", "maps/level.tmj")
        .expect("add");

    block_on(manager.preload()).expect("preload");

    let map = manager.get_tile_map("level").expect("map");
    assert!(!map.is_fully_resolved());
    assert!(matches!(&map.tilesets[0], TilesetSlot::Stub(stub) if stub.source == "terrain.tsj"));
    assert_eq!(source.fetched(), vec!["maps/level.tmj".to_owned()]);
    assert!(manager.get_tileset("level#0").is_none());
}

#[test]
fn dependency_resolution_can_be_switched_off() {
    let settings = PreloadSettings {
        resolve_map_dependencies: false,
        ..PreloadSettings::default()
    };
    let manager = AssetsManager::with_source(level_source())
        .with_settings(settings)
        .expect("valid");
    manager.add_tile_map("level", "maps/level.tmj").expect("add");
    block_on(manager.preload()).expect("preload");
    assert!(!manager.get_tile_map("level").expect("map").is_fully_resolved());
}

#[test]
fn queued_image_with_tileset_name_wins() {
    let source = level_source().image("custom/terrain.png", 8, 8);
    let manager = AssetsManager::with_source(source.clone());
    manager.add_image("terrain", "custom/terrain.png").expect("add");
    manager.add_tile_map("level", "maps/level.tmj").expect("add");

    block_on(manager.preload()).expect("preload");

    assert_eq!(manager.get_image("terrain").map(|i| i.width), Some(8));
    assert!(!source.fetched().contains(&"maps/terrain.png".to_owned()));
}

#[test]
fn standalone_tileset_defaults_to_first_gid_one() {
    let manager = AssetsManager::with_source(level_source());
    manager.add_tileset("props", "maps/../shared/props.tsx").expect("add");
    block_on(manager.preload()).expect("preload");

    let props = manager.get_tileset("props").expect("tileset");
    assert_eq!(props.firstgid, 1);
    assert_eq!(props.tile_count, 4);
    assert!(manager.get_image("props").is_some());
}

#[test]
fn missing_tileset_is_recoverable() {
    let source = TestSource::new().file("maps/level.tmj", LEVEL_TMJ);
    let manager = AssetsManager::with_source(source);
    manager.add_tile_map("level", "maps/level.tmj").expect("add");
    let events = record_events(&manager);

    block_on(manager.preload()).expect("preload survives missing tilesets");

    assert_eq!(count(&events.borrow(), ProgressEventKind::Error), 2);
    let map = manager.get_tile_map("level").expect("map itself loaded");
    assert!(!map.is_fully_resolved());
}

#[test]
fn unsupported_map_extension_aborts() {
    let manager = AssetsManager::with_source(TestSource::new().file("maps/level.txt", LEVEL_TMJ));
    manager.add_tile_map("level", "maps/level.txt").expect("add");
    let err = block_on(manager.preload()).expect_err("unsupported extension");
    assert!(err.is_critical());
    assert!(err.to_string().contains("maps/level.txt"));
}

#[test]
fn malformed_map_is_recoverable() {
    let manager = AssetsManager::with_source(TestSource::new().file("bad.tmx", "<map"));
    manager.add_tile_map("bad", "bad.tmx").expect("add");
    let events = record_events(&manager);
    block_on(manager.preload()).expect("format errors do not abort");
    assert_eq!(count(&events.borrow(), ProgressEventKind::Error), 1);
    assert!(manager.get_tile_map("bad").is_none());
}

const ROUND_TRIP_TMJ: &str = r#"{
    "width": 3, "height": 2, "tilewidth": 8, "tileheight": 8,
    "orientation": "orthogonal", "renderorder": "right-down", "infinite": false,
    "version": "1.10", "tiledversion": "1.10.2",
    "properties": [ { "name": "music", "type": "file", "value": "theme.ogg" } ],
    "tilesets": [ {
        "firstgid": 1, "name": "tiles", "image": "tiles.png", "imagewidth": 16, "imageheight": 16,
        "columns": 2, "tilecount": 4, "tilewidth": 8, "tileheight": 8,
        "tiles": [ {
            "id": 1,
            "animation": [ { "tileid": 1, "duration": 100 }, { "tileid": 2, "duration": 150 } ],
            "objectgroup": { "draworder": "index", "objects": [
                { "id": 1, "x": 0, "y": 0, "width": 8, "height": 4 }
            ] }
        } ]
    } ],
    "layers": [
        { "id": 1, "name": "ground", "type": "tilelayer", "width": 3, "height": 2,
          "data": [1, 2, 0, 0, 3, 4],
          "properties": [ { "name": "solid", "type": "bool", "value": true } ] },
        { "id": 2, "name": "things", "type": "objectgroup", "opacity": 0.5, "objects": [
            { "id": 7, "name": "spawn", "type": "player", "x": 4, "y": 12, "point": true },
            { "id": 8, "name": "path", "x": 0, "y": 0,
              "polyline": [ { "x": 0, "y": 0 }, { "x": 8, "y": 4 } ],
              "properties": [
                  { "name": "speed", "type": "float", "value": 1.5 },
                  { "name": "loops", "type": "int", "value": 3 }
              ] }
        ] }
    ]
}"#;

const ROUND_TRIP_TMX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" tiledversion="1.10.2" orientation="orthogonal" renderorder="right-down" width="3" height="2" tilewidth="8" tileheight="8" infinite="0">
 <properties>
  <property name="music" type="file" value="theme.ogg"/>
 </properties>
 <tileset firstgid="1" name="tiles" tilewidth="8" tileheight="8" tilecount="4" columns="2">
  <image source="tiles.png" width="16" height="16"/>
  <tile id="1">
   <objectgroup draworder="index">
    <object id="1" x="0" y="0" width="8" height="4"/>
   </objectgroup>
   <animation>
    <frame tileid="1" duration="100"/>
    <frame tileid="2" duration="150"/>
   </animation>
  </tile>
 </tileset>
 <layer id="1" name="ground" width="3" height="2">
  <properties>
   <property name="solid" type="bool" value="true"/>
  </properties>
  <data encoding="csv">
1,2,0,
0,3,4
</data>
 </layer>
 <objectgroup id="2" name="things" opacity="0.5">
  <object id="7" name="spawn" type="player" x="4" y="12">
   <point/>
  </object>
  <object id="8" name="path" x="0" y="0">
   <properties>
    <property name="speed" type="float" value="1.5"/>
    <property name="loops" type="int" value="3"/>
   </properties>
   <polyline points="0,0 8,4"/>
  </object>
 </objectgroup>
</map>"#;

#[test]
fn json_and_xml_maps_normalize_identically() {
    let from_json =
        loader::decode_tile_map(DocumentFormat::Json, ROUND_TRIP_TMJ.as_bytes()).expect("json");
    let from_xml =
        loader::decode_tile_map(DocumentFormat::Xml, ROUND_TRIP_TMX.as_bytes()).expect("xml");
    assert_eq!(from_json, from_xml);

    let ground = from_json.layer("ground").expect("ground");
    assert_eq!(ground.kind, LayerKind::Tiles);
    assert_eq!(ground.data.as_deref(), Some(&[1, 2, 0, 0, 3, 4][..]));
    let things = from_json.layer("things").expect("things");
    let objects = things.objects.as_ref().expect("objects");
    assert_eq!(objects[0].shape, ObjectShape::Point);
    assert_eq!(objects[0].class_name, "player");
    let path_props = objects[1].properties.as_ref().expect("props");
    assert_eq!(path_props.get("loops"), Some(&PropertyValue::Int(3)));
    assert_eq!(path_props.get_f64("speed"), Some(1.5));

    let tiles = from_json.tilesets[0].resolved().expect("inline tileset");
    let animated = tiles.tile(1).expect("tile 1");
    assert_eq!(animated.animation.as_ref().map(Vec::len), Some(2));

    // canonical form omits absent optionals entirely
    let json = serde_json::to_value(&from_xml).expect("serialize");
    assert!(json.get("background_color").is_none());
    assert!(json["layers"][1].get("data").is_none());
}

#[test]
fn inline_tileset_images_are_queued_through_the_manager() {
    let source = TestSource::new()
        .file("rt/map.tmx", ROUND_TRIP_TMX)
        .file("rt/map.tmj", ROUND_TRIP_TMJ)
        .image("rt/tiles.png", 16, 16);
    let manager = AssetsManager::with_source(source.clone());
    manager.add_tile_map("xml", "rt/map.tmx").expect("add");
    manager.add_tile_map("json", "rt/map.tmj").expect("add");

    block_on(manager.preload()).expect("preload");

    assert_eq!(manager.get_tile_map("xml"), manager.get_tile_map("json"));
    assert_eq!(manager.get_image("tiles").map(|i| i.height), Some(16));
    let image_fetches = source
        .fetched()
        .into_iter()
        .filter(|url| url == "rt/tiles.png")
        .count();
    assert_eq!(image_fetches, 1);
}

#[test]
fn blank_tileset_image_queues_nothing() {
    let tmj = r#"{
        "width": 1, "height": 1, "tilewidth": 8, "tileheight": 8,
        "tilesets": [{ "firstgid": 1, "name": "blank", "image": "", "tilewidth": 8, "tileheight": 8 }],
        "layers": [{ "id": 1, "name": "a", "type": "tilelayer", "width": 1, "height": 1, "data": [1] }]
    }"#;
    let source = TestSource::new().file("map.tmj", tmj);
    let manager = AssetsManager::with_source(source.clone());
    manager.add_tile_map("bare", "map.tmj").expect("add");
    let events = record_events(&manager);

    block_on(manager.preload()).expect("preload");

    assert!(manager.get_tile_map("bare").is_some());
    assert!(!manager.is_image_in_queue("blank"));
    assert_eq!(source.fetched(), vec!["map.tmj".to_string()]);
    assert_eq!(count(&events.borrow(), ProgressEventKind::Progress), 1);
}
