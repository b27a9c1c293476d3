//! Bounded fixpoint upload scheduling.
//!
//! Each pass snapshots every pending record, starts all uploads and waits
//! for all of them. Uploads may queue more files, which the next pass picks
//! up. The loop ends when nothing is pending or the pass budget is spent.

use std::cell::{Cell, RefCell};
use std::future::poll_fn;
use std::rc::Rc;
use std::task::Poll;

use crate::context::LoadContext;
use crate::error::AssetError;
use crate::events::{self, ProgressEmitter, ProgressEvent, ProgressEventKind};
use crate::registry::{LoaderRegistry, Upload, UploadResult};
use crate::source::LocalBoxFuture;

/// Polls every future until all are done, returning outputs in input order.
pub(crate) async fn join_all<'a, T>(futures: Vec<LocalBoxFuture<'a, T>>) -> Vec<T> {
    let mut slots: Vec<Option<LocalBoxFuture<'a, T>>> = futures.into_iter().map(Some).collect();
    let mut outputs: Vec<Option<T>> = slots.iter().map(|_| None).collect();
    poll_fn(move |cx| {
        let mut done = true;
        for (slot, out) in slots.iter_mut().zip(outputs.iter_mut()) {
            let Some(fut) = slot.as_mut() else { continue };
            match fut.as_mut().poll(cx) {
                Poll::Ready(value) => {
                    *out = Some(value);
                    *slot = None;
                }
                Poll::Pending => done = false,
            }
        }
        if done {
            Poll::Ready(outputs.drain(..).flatten().collect())
        } else {
            Poll::Pending
        }
    })
    .await
}

/// State shared by the settle wrappers of one preload.
#[derive(Clone)]
pub(crate) struct Progress {
    pub registry: Rc<RefCell<LoaderRegistry>>,
    pub emitter: Rc<RefCell<ProgressEmitter>>,
    pub loaded: Rc<Cell<usize>>,
}

impl Progress {
    fn bump(&self, error: Option<AssetError>) {
        let loaded = self.loaded.get() + 1;
        self.loaded.set(loaded);
        let total = self.registry.borrow().total_pending();
        if let Some(err) = error {
            events::emit(
                &self.emitter,
                &ProgressEvent {
                    kind: ProgressEventKind::Error,
                    loaded,
                    total,
                    error: Some(Rc::new(err)),
                },
            );
        }
        events::emit(
            &self.emitter,
            &ProgressEvent {
                kind: ProgressEventKind::Progress,
                loaded,
                total,
                error: None,
            },
        );
    }
}

/// Awaits one upload and records its outcome. Returns the error only if it
/// is critical.
async fn settle(
    progress: Progress,
    type_name: String,
    key: String,
    upload: LocalBoxFuture<'static, UploadResult>,
) -> Option<AssetError> {
    let result = upload.await;
    match result {
        Ok(asset) => {
            if asset.is_none() {
                log::info!("{type_name} '{key}' resolved empty");
            }
            progress
                .registry
                .borrow_mut()
                .complete(&type_name, &key, asset);
            progress.bump(None);
            None
        }
        Err(err) if err.is_critical() => {
            progress.registry.borrow_mut().discard(&type_name, &key);
            Some(err)
        }
        Err(err) => {
            log::warn!("{type_name} '{key}' failed: {err}");
            progress.registry.borrow_mut().discard(&type_name, &key);
            progress.bump(Some(err));
            None
        }
    }
}

/// Runs passes until the registry has nothing pending.
pub(crate) async fn run_to_fixpoint(
    ctx: &LoadContext,
    progress: &Progress,
    max_passes: u32,
) -> Result<(), AssetError> {
    let mut pass = 0;
    loop {
        pass += 1;
        let snapshot = progress.registry.borrow().pending_snapshot();
        log::debug!("upload pass {pass}: {} file(s)", snapshot.len());

        let mut critical = Vec::new();
        let mut uploads: Vec<LocalBoxFuture<'static, Option<AssetError>>> =
            Vec::with_capacity(snapshot.len());
        for pending in snapshot {
            let key = pending.record.key.clone();
            match (pending.upload)(ctx.clone(), pending.record) {
                Upload::Deferred(future) => uploads.push(Box::pin(settle(
                    progress.clone(),
                    pending.type_name,
                    key,
                    future,
                ))),
                Upload::Immediate(_) => {
                    progress
                        .registry
                        .borrow_mut()
                        .discard(&pending.type_name, &key);
                    critical.push(AssetError::InvalidLoaderContract {
                        type_name: pending.type_name,
                        key,
                    });
                }
            }
        }

        critical.extend(join_all(uploads).await.into_iter().flatten());
        if let Some(err) = critical.into_iter().next() {
            return Err(err);
        }

        let pending = progress.registry.borrow().total_pending();
        if pending == 0 {
            log::debug!("upload fixpoint reached after {pass} pass(es)");
            return Ok(());
        }
        if pass >= max_passes {
            return Err(AssetError::RecursionLimit {
                passes: pass,
                pending,
            });
        }
    }
}
