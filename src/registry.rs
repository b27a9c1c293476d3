//! Loader types, their pending queues and their completed stores.

use macroquad::audio::Sound;
use macroquad::texture::Image;
use serde_json::Value as JsonValue;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use crate::atlas::AtlasEntry;
use crate::context::LoadContext;
use crate::error::AssetError;
use crate::map::TileMap;
use crate::source::LocalBoxFuture;
use crate::tileset::TileSet;

/// A loaded resource.
#[derive(Clone)]
pub enum Asset {
    /// Raw bytes, what the default loader produces
    Bytes(Vec<u8>),
    /// Decoded image, still on the CPU
    Image(Image),
    /// Audio clip
    Sound(Rc<Sound>),
    /// Canonical Tiled map
    TileMap(TileMap),
    /// Canonical Tiled tileset
    TileSet(TileSet),
    /// Rectangles of an atlas descriptor
    AtlasEntries(Vec<AtlasEntry>),
    /// Sliced atlas pieces by name
    AtlasImages(BTreeMap<String, Image>),
    /// Anything a custom loader produces
    Custom(Rc<dyn Any>),
}

impl Asset {
    /// Bytes held by [`Asset::Bytes`].
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Asset::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// The image, if this is one.
    pub fn as_image(&self) -> Option<&Image> {
        match self {
            Asset::Image(img) => Some(img),
            _ => None,
        }
    }

    /// The sound, if this is one.
    pub fn as_sound(&self) -> Option<&Rc<Sound>> {
        match self {
            Asset::Sound(s) => Some(s),
            _ => None,
        }
    }

    /// The map, if this is one.
    pub fn as_tile_map(&self) -> Option<&TileMap> {
        match self {
            Asset::TileMap(m) => Some(m),
            _ => None,
        }
    }

    /// The tileset, if this is one.
    pub fn as_tileset(&self) -> Option<&TileSet> {
        match self {
            Asset::TileSet(ts) => Some(ts),
            _ => None,
        }
    }

    /// Atlas rectangles, if this is a descriptor.
    pub fn as_atlas_entries(&self) -> Option<&[AtlasEntry]> {
        match self {
            Asset::AtlasEntries(e) => Some(e.as_slice()),
            _ => None,
        }
    }

    /// Sliced pieces by name.
    pub fn as_atlas_images(&self) -> Option<&BTreeMap<String, Image>> {
        match self {
            Asset::AtlasImages(m) => Some(m),
            _ => None,
        }
    }

    /// Borrows a [`Asset::Custom`] value as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Asset::Custom(any) => any.downcast_ref(),
            _ => None,
        }
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            Asset::Image(img) => write!(f, "Image({}x{})", img.width, img.height),
            Asset::Sound(_) => write!(f, "Sound"),
            Asset::TileMap(m) => f.debug_tuple("TileMap").field(m).finish(),
            Asset::TileSet(ts) => f.debug_tuple("TileSet").field(ts).finish(),
            Asset::AtlasEntries(e) => f.debug_tuple("AtlasEntries").field(e).finish(),
            Asset::AtlasImages(m) => write!(f, "AtlasImages({:?})", m.keys().collect::<Vec<_>>()),
            Asset::Custom(_) => write!(f, "Custom"),
        }
    }
}

/// One pending request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    /// Unique within its loader type.
    pub key: String,
    /// Where the bytes come from.
    pub url: String,
    /// Loader specific arguments, passed through untouched.
    pub extra_args: Vec<JsonValue>,
}

impl ResourceRecord {
    /// Extra argument at `index`.
    pub fn arg(&self, index: usize) -> Option<&JsonValue> {
        self.extra_args.get(index)
    }

    /// Extra argument at `index` as a `u32`, if it fits.
    pub fn arg_u32(&self, index: usize) -> Option<u32> {
        self.arg(index)?.as_u64().and_then(|n| u32::try_from(n).ok())
    }

    /// Extra argument at `index` as a string.
    pub fn arg_str(&self, index: usize) -> Option<&str> {
        self.arg(index)?.as_str()
    }

    /// Extra argument at `index` as a bool.
    pub fn arg_bool(&self, index: usize) -> Option<bool> {
        self.arg(index)?.as_bool()
    }
}

/// What an upload function resolves to. `Ok(None)` means "intentionally empty".
pub type UploadResult = Result<Option<Asset>, AssetError>;

/// Return value of an upload function.
///
/// Uploads must be [`Upload::Deferred`]. An [`Upload::Immediate`] value
/// skipped the asynchronous stage, breaks the loader contract and aborts
/// the preload with [`AssetError::InvalidLoaderContract`].
pub enum Upload {
    /// Loading happens when the scheduler awaits this future.
    Deferred(LocalBoxFuture<'static, UploadResult>),
    /// A value produced synchronously. Always rejected.
    Immediate(Option<Asset>),
}

impl Upload {
    /// Boxes `future` into [`Upload::Deferred`].
    pub fn deferred(future: impl Future<Output = UploadResult> + 'static) -> Self {
        Upload::Deferred(Box::pin(future))
    }
}

/// Upload function of a loader type.
pub type UploadFn = Rc<dyn Fn(LoadContext, ResourceRecord) -> Upload>;

struct LoaderType {
    name: String,
    upload: UploadFn,
    pending: Vec<ResourceRecord>,
    completed: HashMap<String, Option<Asset>>,
}

impl LoaderType {
    fn is_pending(&self, key: &str) -> bool {
        self.pending.iter().any(|r| r.key == key)
    }

    fn take_pending(&mut self, key: &str) -> Option<ResourceRecord> {
        let idx = self.pending.iter().position(|r| r.key == key)?;
        Some(self.pending.remove(idx))
    }
}

/// A pending record paired with the upload function that will load it.
pub(crate) struct PendingUpload {
    pub type_name: String,
    pub upload: UploadFn,
    pub record: ResourceRecord,
}

/// Owns every loader type and all of their queues and stores.
#[derive(Default)]
pub struct LoaderRegistry {
    types: Vec<LoaderType>,
}

fn check_input(key: &str, url: &str) -> Result<(), AssetError> {
    if key.trim().is_empty() {
        return Err(AssetError::InvalidInput("key should be provided".into()));
    }
    if url.trim().is_empty() {
        return Err(AssetError::InvalidInput(format!(
            "url should be provided for '{key}'"
        )));
    }
    Ok(())
}

impl LoaderRegistry {
    /// An empty registry; built-in types are added by the manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name`, falling back to a plain byte fetch when `upload` is
    /// `None`. Returns `false` (and keeps the existing loader) if the name is
    /// already taken.
    pub fn register_loader_type(&mut self, name: &str, upload: Option<UploadFn>) -> bool {
        if self.is_registered(name) {
            log::warn!("loader type '{name}' is already registered, keeping the existing one");
            return false;
        }
        let upload = upload.unwrap_or_else(crate::builtin::fetch_bytes_loader);
        self.types.push(LoaderType {
            name: name.to_owned(),
            upload,
            pending: Vec::new(),
            completed: HashMap::new(),
        });
        log::debug!("registered loader type '{name}'");
        true
    }

    /// Whether a loader type called `name` exists.
    pub fn is_registered(&self, name: &str) -> bool {
        self.types.iter().any(|t| t.name == name)
    }

    /// Names in registration order.
    pub fn loader_names(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|t| t.name.as_str())
    }

    fn loader(&self, name: &str) -> Result<&LoaderType, AssetError> {
        self.types
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| AssetError::UnregisteredLoader {
                type_name: name.to_owned(),
            })
    }

    fn loader_mut(&mut self, name: &str) -> Result<&mut LoaderType, AssetError> {
        self.types
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| AssetError::UnregisteredLoader {
                type_name: name.to_owned(),
            })
    }

    /// Queues a file. A key that is already pending or loaded is left alone
    /// and `Ok(false)` is returned.
    pub fn add_file(
        &mut self,
        type_name: &str,
        key: &str,
        url: &str,
        extra_args: Vec<JsonValue>,
    ) -> Result<bool, AssetError> {
        let loader = self.loader_mut(type_name)?;
        check_input(key, url)?;
        if loader.is_pending(key) || loader.completed.contains_key(key) {
            log::warn!("{type_name} with key '{key}' is already added, keeping the first entry");
            return Ok(false);
        }
        loader.pending.push(ResourceRecord {
            key: key.to_owned(),
            url: url.to_owned(),
            extra_args,
        });
        Ok(true)
    }

    /// Whether `key` is pending. Loaded keys are no longer in the queue.
    pub fn is_file_in_queue(&self, type_name: &str, key: &str) -> Result<bool, AssetError> {
        Ok(self.loader(type_name)?.is_pending(key))
    }

    /// Loaded value for `key`; `None` while pending, after a failure, or
    /// when the loader resolved empty.
    pub fn get_file(&self, type_name: &str, key: &str) -> Result<Option<&Asset>, AssetError> {
        Ok(self
            .loader(type_name)?
            .completed
            .get(key)
            .and_then(Option::as_ref))
    }

    /// Pending or completed (including empty results).
    pub fn contains_file(&self, type_name: &str, key: &str) -> Result<bool, AssetError> {
        let loader = self.loader(type_name)?;
        Ok(loader.is_pending(key) || loader.completed.contains_key(key))
    }

    /// Pending records across every loader type.
    pub fn total_pending(&self) -> usize {
        self.types.iter().map(|t| t.pending.len()).sum()
    }

    pub(crate) fn pending_snapshot(&self) -> Vec<PendingUpload> {
        self.types
            .iter()
            .flat_map(|t| {
                t.pending.iter().map(move |record| PendingUpload {
                    type_name: t.name.clone(),
                    upload: t.upload.clone(),
                    record: record.clone(),
                })
            })
            .collect()
    }

    /// Moves `key` from pending to completed.
    pub(crate) fn complete(&mut self, type_name: &str, key: &str, result: Option<Asset>) {
        if let Ok(loader) = self.loader_mut(type_name) {
            loader.take_pending(key);
            loader.completed.insert(key.to_owned(), result);
        }
    }

    /// Drops `key` from pending without storing anything.
    pub(crate) fn discard(&mut self, type_name: &str, key: &str) {
        if let Ok(loader) = self.loader_mut(type_name) {
            loader.take_pending(key);
        }
    }

    /// Stores a value that never went through the queue (atlas pieces).
    pub(crate) fn insert_completed(
        &mut self,
        type_name: &str,
        key: &str,
        asset: Asset,
    ) -> Result<bool, AssetError> {
        let loader = self.loader_mut(type_name)?;
        if loader.is_pending(key) || loader.completed.contains_key(key) {
            log::warn!("{type_name} with key '{key}' already exists, keeping the first entry");
            return Ok(false);
        }
        loader.completed.insert(key.to_owned(), Some(asset));
        Ok(true)
    }

    pub(crate) fn completed_mut(&mut self, type_name: &str, key: &str) -> Option<&mut Asset> {
        self.loader_mut(type_name)
            .ok()?
            .completed
            .get_mut(key)
            .and_then(Option::as_mut)
    }
}
