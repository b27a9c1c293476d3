#![allow(dead_code)]

use macroquad::color::WHITE;
use macroquad::texture::Image;
use macroquad_preloader::{
    Asset, AssetError, AssetSource, AssetsManager, LocalBoxFuture, ProgressEvent,
    ProgressEventKind,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// In-memory files. Image bytes are the text `IMG <w>x<h>`, which decodes to
/// a white image of that size without touching a real codec.
#[derive(Clone, Default)]
pub struct TestSource {
    files: Rc<RefCell<HashMap<String, Vec<u8>>>>,
    fetched: Rc<RefCell<Vec<String>>>,
}

impl TestSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(self, url: &str, contents: &str) -> Self {
        self.files
            .borrow_mut()
            .insert(url.to_owned(), contents.as_bytes().to_vec());
        self
    }

    pub fn image(self, url: &str, width: u16, height: u16) -> Self {
        self.file(url, &format!("IMG {width}x{height}"))
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }

    fn lookup(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        self.fetched.borrow_mut().push(url.to_owned());
        self.files
            .borrow()
            .get(url)
            .cloned()
            .ok_or_else(|| AssetError::Fetch {
                url: url.to_owned(),
                reason: "404".into(),
            })
    }
}

impl AssetSource for TestSource {
    fn fetch(&self, url: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, AssetError>> {
        let result = self.lookup(url);
        Box::pin(async move { result })
    }

    fn decode_image(&self, url: &str, bytes: &[u8]) -> Result<Image, AssetError> {
        let bad = || AssetError::Decode {
            url: url.to_owned(),
            reason: "not a test image".into(),
        };
        let text = std::str::from_utf8(bytes).map_err(|_| bad())?;
        let size = text.strip_prefix("IMG ").ok_or_else(bad)?;
        let (w, h) = size.split_once('x').ok_or_else(bad)?;
        let w: u16 = w.parse().map_err(|_| bad())?;
        let h: u16 = h.parse().map_err(|_| bad())?;
        Ok(Image::gen_image_color(w, h, WHITE))
    }

    fn load_audio(&self, url: &str) -> LocalBoxFuture<'static, Result<Asset, AssetError>> {
        let result = self.lookup(url).map(Asset::Bytes);
        Box::pin(async move { result })
    }
}

/// Records every event of every kind, in order.
pub fn record_events(manager: &AssetsManager) -> Rc<RefCell<Vec<ProgressEvent>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    for kind in ProgressEventKind::ALL {
        let log = log.clone();
        manager.add_event_listener(kind, move |e| log.borrow_mut().push(e.clone()));
    }
    log
}

pub fn kinds(events: &[ProgressEvent]) -> Vec<ProgressEventKind> {
    events.iter().map(|e| e.kind).collect()
}

pub fn count(events: &[ProgressEvent], kind: ProgressEventKind) -> usize {
    events.iter().filter(|e| e.kind == kind).count()
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
