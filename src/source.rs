//! Byte-level I/O capabilities the loaders depend on.

use macroquad::texture::Image;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use crate::error::AssetError;
use crate::registry::Asset;

/// Boxed, non-`Send` future. Everything runs on macroquad's single thread.
pub type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Fetch and decode capabilities the built-in loaders use.
pub trait AssetSource {
    /// Reads the raw bytes behind `url`.
    fn fetch(&self, url: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, AssetError>>;

    /// Decodes image bytes (png, jpeg, ...) into CPU-side pixels.
    fn decode_image(&self, url: &str, bytes: &[u8]) -> Result<Image, AssetError> {
        Image::from_file_with_format(bytes, None).map_err(|e| AssetError::Decode {
            url: url.to_owned(),
            reason: format!("{e:?}"),
        })
    }

    /// Loads and decodes an audio clip.
    fn load_audio(&self, url: &str) -> LocalBoxFuture<'static, Result<Asset, AssetError>>;
}

/// Loads through macroquad's file system / http layer. Needs a running
/// macroquad context.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacroquadSource;

impl AssetSource for MacroquadSource {
    fn fetch(&self, url: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, AssetError>> {
        let url = url.to_owned();
        Box::pin(async move {
            macroquad::file::load_file(&url)
                .await
                .map_err(|e| AssetError::Fetch {
                    url,
                    reason: format!("{e:?}"),
                })
        })
    }

    fn load_audio(&self, url: &str) -> LocalBoxFuture<'static, Result<Asset, AssetError>> {
        let url = url.to_owned();
        Box::pin(async move {
            let bytes = macroquad::file::load_file(&url)
                .await
                .map_err(|e| AssetError::Fetch {
                    url: url.clone(),
                    reason: format!("{e:?}"),
                })?;
            let sound = macroquad::audio::load_sound_from_bytes(&bytes)
                .await
                .map_err(|e| AssetError::Decode {
                    url,
                    reason: format!("{e:?}"),
                })?;
            Ok(Asset::Sound(Rc::new(sound)))
        })
    }
}

/// Serves bytes registered up front, e.g. from `include_bytes!`.
/// Audio comes back undecoded as [`Asset::Bytes`].
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    files: HashMap<String, Rc<[u8]>>,
}

impl MemorySource {
    /// An empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_file(mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(url, bytes);
        self
    }

    /// Serves `bytes` for `url`, replacing any earlier entry.
    pub fn insert(&mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(url.into(), Rc::from(bytes.into()));
    }

    fn lookup(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        self.files
            .get(url)
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| AssetError::Fetch {
                url: url.to_owned(),
                reason: "not found".into(),
            })
    }
}

impl AssetSource for MemorySource {
    fn fetch(&self, url: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, AssetError>> {
        let result = self.lookup(url);
        Box::pin(async move { result })
    }

    fn load_audio(&self, url: &str) -> LocalBoxFuture<'static, Result<Asset, AssetError>> {
        let result = self.lookup(url).map(Asset::Bytes);
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_serves_registered_files() {
        let source = MemorySource::new().with_file("a.txt", b"hello".to_vec());
        let bytes = pollster::block_on(source.fetch("a.txt")).expect("fetch");
        assert_eq!(bytes, b"hello");

        let err = pollster::block_on(source.fetch("missing.txt")).expect_err("missing");
        assert!(matches!(err, AssetError::Fetch { .. }));
        assert!(!err.is_critical());
    }

    #[test]
    fn garbage_image_bytes_fail_to_decode() {
        let source = MemorySource::new();
        let err = source.decode_image("x.png", b"not a png").expect_err("decode");
        assert!(matches!(err, AssetError::Decode { .. }));
    }
}
