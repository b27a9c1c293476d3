//! Lifecycle notifications for a preload.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::error::AssetError;

/// Kind of progress notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressEventKind {
    /// Preload started; `total` is the number of files queued at that point
    LoadStart,
    /// One file settled
    Progress,
    /// Preload finished, successfully or not
    Load,
    /// A file failed without stopping the preload
    Error,
    /// Reserved, never emitted
    Abort,
    /// Reserved, never emitted
    Timeout,
}

impl ProgressEventKind {
    /// Every kind, in lifecycle order.
    pub const ALL: [ProgressEventKind; 6] = [
        ProgressEventKind::LoadStart,
        ProgressEventKind::Progress,
        ProgressEventKind::Load,
        ProgressEventKind::Error,
        ProgressEventKind::Abort,
        ProgressEventKind::Timeout,
    ];

    /// Lower-case event name, as accepted by `FromStr`.
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressEventKind::LoadStart => "loadstart",
            ProgressEventKind::Progress => "progress",
            ProgressEventKind::Load => "load",
            ProgressEventKind::Error => "error",
            ProgressEventKind::Abort => "abort",
            ProgressEventKind::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ProgressEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressEventKind {
    type Err = AssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AssetError::InvalidInput(format!("unknown event type '{s}'")))
    }
}

/// Payload delivered to listeners.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// Which event this is
    pub kind: ProgressEventKind,
    /// Files settled so far in this preload
    pub loaded: usize,
    /// Files still pending
    pub total: usize,
    /// Set on `error` events
    pub error: Option<Rc<AssetError>>,
}

/// Handle returned by [`ProgressEmitter::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Rc<RefCell<dyn FnMut(&ProgressEvent)>>;

/// Listener list keyed by event kind.
#[derive(Default)]
pub struct ProgressEmitter {
    next_id: u64,
    listeners: Vec<(ListenerId, ProgressEventKind, Listener)>,
}

impl ProgressEmitter {
    /// An emitter with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for `kind`.
    pub fn add_listener(
        &mut self,
        kind: ProgressEventKind,
        listener: impl FnMut(&ProgressEvent) + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners
            .push((id, kind, Rc::new(RefCell::new(listener))));
        id
    }

    /// Returns whether a listener was removed.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Listeners currently registered for `kind`.
    pub fn listener_count(&self, kind: ProgressEventKind) -> usize {
        self.listeners.iter().filter(|(_, k, _)| *k == kind).count()
    }

    /// Listeners for `event.kind`, in registration order. The list is
    /// cloned first so emitting never keeps the emitter borrowed.
    pub(crate) fn listeners_for(&self, kind: ProgressEventKind) -> Vec<Listener> {
        self.listeners
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, l)| l.clone())
            .collect()
    }
}

/// Calls every listener registered on `emitter` for `event.kind`.
pub(crate) fn emit(emitter: &RefCell<ProgressEmitter>, event: &ProgressEvent) {
    let listeners = emitter.borrow().listeners_for(event.kind);
    for listener in listeners {
        match listener.try_borrow_mut() {
            Ok(mut f) => f(event),
            Err(_) => log::warn!("skipping re-entrant '{}' listener", event.kind),
        }
    }
}
