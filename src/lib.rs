#![warn(missing_docs)]

//! Asset preloader for Macroquad.
//!
//! Files are queued per loader type and loaded in passes: a loader may queue
//! more files (a tile map queues its tilesets, a tileset its image, an atlas
//! descriptor its sheet) and the next pass picks them up, until nothing is
//! left pending. Tiled maps and tilesets are read from JSON (`.tmj`/`.tsj`)
//! or XML (`.tmx`/`.tsx`) into the same types.

mod atlas;
mod builtin;
mod context;
mod error;
mod events;
mod layer;
pub mod loader;
mod manager;
mod map;
mod properties;
mod registry;
mod scheduler;
mod settings;
mod source;
mod tileset;

pub use atlas::{slice_atlas, strip_extension, AtlasDocument, AtlasEntry};
pub use builtin::{
    deferred_loader, fetch_bytes_loader, ATLAS_IMAGE_MAP, ATLAS_XML, AUDIO, IMAGE, TILESET,
    TILE_MAP,
};
pub use context::LoadContext;
pub use error::{AssetError, FormatError};
pub use events::{ListenerId, ProgressEmitter, ProgressEvent, ProgressEventKind};
pub use layer::{Chunk, Layer, LayerKind, MapObject, ObjectGroup, ObjectShape, Point};
pub use manager::AssetsManager;
pub use map::{Orientation, TileMap, TilesetSlot, TilesetStub};
pub use properties::{Properties, PropertyValue};
pub use registry::{Asset, LoaderRegistry, ResourceRecord, Upload, UploadFn, UploadResult};
pub use settings::PreloadSettings;
pub use source::{AssetSource, LocalBoxFuture, MacroquadSource, MemorySource};
pub use tileset::{Frame, TileMeta, TileOffset, TileSet};
