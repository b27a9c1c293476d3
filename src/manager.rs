use macroquad::audio::Sound;
use macroquad::texture::Image;
use serde_json::Value as JsonValue;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::atlas::AtlasEntry;
use crate::builtin;
use crate::context::LoadContext;
use crate::error::AssetError;
use crate::events::{self, ListenerId, ProgressEmitter, ProgressEvent, ProgressEventKind};
use crate::map::TileMap;
use crate::registry::{Asset, LoaderRegistry, UploadFn};
use crate::scheduler::{self, Progress};
use crate::settings::PreloadSettings;
use crate::source::{AssetSource, MacroquadSource};
use crate::tileset::TileSet;

/// Entry point: queue files, then [`preload`](Self::preload) them.
///
/// ```no_run
/// # async fn run() -> Result<(), macroquad_preloader::AssetError> {
/// let assets = macroquad_preloader::AssetsManager::new();
/// assets.add_tile_map("level1", "assets/level1.tmj")?;
/// assets.add_image("player", "assets/player.png")?;
/// assets.preload().await?;
/// let map = assets.get_tile_map("level1");
/// # Ok(())
/// # }
/// ```
pub struct AssetsManager {
    registry: Rc<RefCell<LoaderRegistry>>,
    emitter: Rc<RefCell<ProgressEmitter>>,
    source: Rc<dyn AssetSource>,
    settings: Rc<PreloadSettings>,
}

impl Default for AssetsManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetsManager {
    /// Manager backed by macroquad's file loading, with the built-in loaders.
    pub fn new() -> Self {
        Self::with_source(MacroquadSource)
    }

    /// Manager reading through `source`, with the built-in loaders.
    pub fn with_source(source: impl AssetSource + 'static) -> Self {
        let mut registry = LoaderRegistry::new();
        builtin::register_builtins(&mut registry);
        Self {
            registry: Rc::new(RefCell::new(registry)),
            emitter: Rc::new(RefCell::new(ProgressEmitter::new())),
            source: Rc::new(source),
            settings: Rc::new(PreloadSettings::default()),
        }
    }

    /// Replaces the settings after validating them.
    pub fn with_settings(mut self, settings: PreloadSettings) -> Result<Self, AssetError> {
        settings.validate()?;
        self.settings = Rc::new(settings);
        Ok(self)
    }

    /// Current settings.
    pub fn settings(&self) -> &PreloadSettings {
        &self.settings
    }

    /// Adds a loader type. `upload` defaults to fetching raw bytes.
    /// Registering a taken name keeps the existing loader and returns `false`.
    pub fn register_loader_type(&self, name: &str, upload: Option<UploadFn>) -> bool {
        self.registry.borrow_mut().register_loader_type(name, upload)
    }

    /// Registered loader names, built-ins first.
    pub fn loader_types(&self) -> Vec<String> {
        self.registry
            .borrow()
            .loader_names()
            .map(str::to_owned)
            .collect()
    }

    /// Queues `url` under `key` for the `type_name` loader. Duplicate keys
    /// are ignored with a warning and `Ok(false)`.
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

    /// Loaded value of `key`. Errors only for an unknown loader type.
    pub fn get_file(&self, type_name: &str, key: &str) -> Result<Option<Asset>, AssetError> {
        Ok(self.registry.borrow().get_file(type_name, key)?.cloned())
    }

    /// Whether `key` is still pending.
    pub fn is_file_in_queue(&self, type_name: &str, key: &str) -> Result<bool, AssetError> {
        self.registry.borrow().is_file_in_queue(type_name, key)
    }

    /// Pending records across all loader types.
    pub fn files_waiting_for_upload(&self) -> usize {
        self.registry.borrow().total_pending()
    }

    /// Calls `listener` for every event of `kind` until it is removed.
    pub fn add_event_listener(
        &self,
        kind: ProgressEventKind,
        listener: impl FnMut(&ProgressEvent) + 'static,
    ) -> ListenerId {
        self.emitter.borrow_mut().add_listener(kind, listener)
    }

    /// Returns `false` if `id` was already removed.
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.emitter.borrow_mut().remove_listener(id)
    }

    fn notify(&self, kind: ProgressEventKind, loaded: usize, total: usize) {
        events::emit(
            &self.emitter,
            &ProgressEvent {
                kind,
                loaded,
                total,
                error: None,
            },
        );
    }

    /// Loads everything queued, including whatever the loaders queue along
    /// the way. Fails on the first critical error or when work is still being
    /// discovered after `max_upload_passes` passes; files that failed in a
    /// recoverable way are reported through `error` events instead.
    pub async fn preload(&self) -> Result<(), AssetError> {
        let total = self.files_waiting_for_upload();
        log::info!("preload started with {total} file(s) queued");
        self.notify(ProgressEventKind::LoadStart, 0, total);

        let progress = Progress {
            registry: self.registry.clone(),
            emitter: self.emitter.clone(),
            loaded: Rc::new(Cell::new(0)),
        };
        let ctx = LoadContext::new(
            self.registry.clone(),
            self.source.clone(),
            self.settings.clone(),
        );
        let result =
            scheduler::run_to_fixpoint(&ctx, &progress, self.settings.max_upload_passes).await;

        let loaded = progress.loaded.get();
        match &result {
            Ok(()) => log::info!("preload finished, {loaded} file(s) settled"),
            Err(err) => log::warn!("preload aborted after {loaded} file(s): {err}"),
        }
        self.notify(ProgressEventKind::Load, loaded, self.files_waiting_for_upload());
        result
    }

    /// Queues a `.tmj` or `.tmx` map along with its tilesets and their images.
    pub fn add_tile_map(&self, key: &str, url: &str) -> Result<bool, AssetError> {
        self.add_file(builtin::TILE_MAP, key, url, Vec::new())
    }

    /// Queues a tile map whose external tilesets and images are left alone.
    pub fn add_tile_map_without_dependencies(
        &self,
        key: &str,
        url: &str,
    ) -> Result<bool, AssetError> {
        self.add_file(builtin::TILE_MAP, key, url, vec![JsonValue::Bool(true)])
    }

    /// Queues an atlas image to be sliced with already known rectangles.
    pub fn add_atlas_image_map(
        &self,
        key: &str,
        url: &str,
        entries: &[AtlasEntry],
    ) -> Result<bool, AssetError> {
        let entries = serde_json::to_value(entries)
            .map_err(|e| AssetError::InvalidInput(format!("atlas entries for '{key}': {e}")))?;
        self.add_file(builtin::ATLAS_IMAGE_MAP, key, url, vec![entries])
    }
}

macro_rules! simple_adders {
    ($($type_name:path, $label:literal => $add:ident;)*) => {
        impl AssetsManager {
            $(
                #[doc = concat!("Queues a file for the `", $label, "` loader.")]
                pub fn $add(&self, key: &str, url: &str) -> Result<bool, AssetError> {
                    self.add_file($type_name, key, url, Vec::new())
                }
            )*
        }
    };
}

macro_rules! typed_getters {
    ($($type_name:path, $label:literal => $get:ident, $queued:ident, $as:ident -> $out:ty;)*) => {
        impl AssetsManager {
            $(
                #[doc = concat!("Loaded `", $label, "` value of `key`.")]
                pub fn $get(&self, key: &str) -> Option<$out> {
                    let registry = self.registry.borrow();
                    let asset = registry.get_file($type_name, key).ok().flatten()?;
                    asset.$as().map(ToOwned::to_owned)
                }

                #[doc = concat!("Whether a `", $label, "` file is still pending under `key`.")]
                pub fn $queued(&self, key: &str) -> bool {
                    self.registry
                        .borrow()
                        .is_file_in_queue($type_name, key)
                        .unwrap_or(false)
                }
            )*
        }
    };
}

simple_adders! {
    builtin::AUDIO, "Audio" => add_audio;
    builtin::IMAGE, "Image" => add_image;
    builtin::TILESET, "TileSet" => add_tileset;
    builtin::ATLAS_XML, "AtlasXML" => add_atlas_xml;
}

typed_getters! {
    builtin::AUDIO, "Audio" => get_audio, is_audio_in_queue, as_sound -> Rc<Sound>;
    builtin::IMAGE, "Image" => get_image, is_image_in_queue, as_image -> Image;
    builtin::TILE_MAP, "TileMap" => get_tile_map, is_tile_map_in_queue, as_tile_map -> TileMap;
    builtin::TILESET, "TileSet" => get_tileset, is_tileset_in_queue, as_tileset -> TileSet;
    builtin::ATLAS_XML, "AtlasXML" => get_atlas_xml, is_atlas_xml_in_queue, as_atlas_entries -> Vec<AtlasEntry>;
    builtin::ATLAS_IMAGE_MAP, "AtlasImageMap" => get_atlas_image_map, is_atlas_image_map_in_queue, as_atlas_images -> BTreeMap<String, Image>;
}
