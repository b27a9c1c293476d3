//! Handle passed to every upload function.

use macroquad::texture::Image;
use serde_json::Value as JsonValue;
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::AssetError;
use crate::map::TilesetSlot;
use crate::registry::{Asset, LoaderRegistry};
use crate::settings::PreloadSettings;
use crate::source::{AssetSource, LocalBoxFuture};
use crate::tileset::TileSet;

/// Gives a loader access to I/O and to the registry it is loading into.
///
/// Cheap to clone. Every method takes and releases its registry borrow
/// before returning, so it is safe to call between `.await`s.
#[derive(Clone)]
pub struct LoadContext {
    registry: Rc<RefCell<LoaderRegistry>>,
    source: Rc<dyn AssetSource>,
    settings: Rc<PreloadSettings>,
}

impl LoadContext {
    pub(crate) fn new(
        registry: Rc<RefCell<LoaderRegistry>>,
        source: Rc<dyn AssetSource>,
        settings: Rc<PreloadSettings>,
    ) -> Self {
        Self {
            registry,
            source,
            settings,
        }
    }

    /// Raw bytes of `url`.
    pub fn fetch(&self, url: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, AssetError>> {
        self.source.fetch(url)
    }

    /// Decodes fetched bytes; `url` picks the format.
    pub fn decode_image(&self, url: &str, bytes: &[u8]) -> Result<Image, AssetError> {
        self.source.decode_image(url, bytes)
    }

    /// Loads a sound, resolving to [`Asset::Sound`].
    pub fn load_audio(&self, url: &str) -> LocalBoxFuture<'static, Result<Asset, AssetError>> {
        self.source.load_audio(url)
    }

    /// Queues a dependency; it is picked up by the next pass.
    pub fn add_file(
        &self,
        type_name: &str,
        key: &str,
        url: &str,
        extra_args: Vec<JsonValue>,
    ) -> Result<bool, AssetError> {
        self.registry
            .borrow_mut()
            .add_file(type_name, key, url, extra_args)
    }

    /// Whether `key` is still waiting for an upload.
    pub fn is_file_in_queue(&self, type_name: &str, key: &str) -> Result<bool, AssetError> {
        self.registry.borrow().is_file_in_queue(type_name, key)
    }

    /// Pending or already loaded.
    pub fn contains_file(&self, type_name: &str, key: &str) -> Result<bool, AssetError> {
        self.registry.borrow().contains_file(type_name, key)
    }

    /// Stores an already-loaded value under `key` without queueing it.
    /// Existing keys are kept and `Ok(false)` is returned.
    pub fn register_completed(
        &self,
        type_name: &str,
        key: &str,
        asset: Asset,
    ) -> Result<bool, AssetError> {
        self.registry
            .borrow_mut()
            .insert_completed(type_name, key, asset)
    }

    /// Replaces the stub at `index` of the loaded map `map_key` with `tileset`.
    pub fn attach_tileset(&self, map_key: &str, index: usize, tileset: TileSet) -> bool {
        let mut registry = self.registry.borrow_mut();
        let Some(Asset::TileMap(map)) =
            registry.completed_mut(crate::builtin::TILE_MAP, map_key)
        else {
            log::warn!("tileset #{index} finished but map '{map_key}' is not loaded");
            return false;
        };
        match map.tilesets.get_mut(index) {
            Some(slot) => {
                *slot = TilesetSlot::Resolved(tileset);
                true
            }
            None => {
                log::warn!("map '{map_key}' has no tileset slot #{index}");
                false
            }
        }
    }

    /// Settings of the running preload.
    pub fn settings(&self) -> &PreloadSettings {
        &self.settings
    }
}
