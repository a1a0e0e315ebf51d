use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use futures_channel::mpsc::{self, UnboundedReceiver};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

/// Process-wide directory watch registrations, keyed by path.
///
/// Both calls are idempotent. The engine pairs every `watch` it issues with
/// one `unwatch` when the node that owns the registration goes away.
pub trait WatchService {
    fn watch(&self, path: &Path);
    fn unwatch(&self, path: &Path);
}

impl<W: WatchService> WatchService for &W {
    fn watch(&self, path: &Path) {
        (**self).watch(path)
    }

    fn unwatch(&self, path: &Path) {
        (**self).unwatch(path)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWatchService;

impl WatchService for NoopWatchService {
    fn watch(&self, _path: &Path) {}

    fn unwatch(&self, _path: &Path) {}
}

/// Something changed inside (or at) `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
}

/// Watch service backed by the platform's native notifier.
///
/// Events arrive on the notifier's own thread and are forwarded over an
/// unbounded channel, which the host drains on its event loop.
pub struct NotifyWatchService {
    watcher: RefCell<RecommendedWatcher>,
    watched: RefCell<HashSet<PathBuf>>,
}

impl NotifyWatchService {
    pub fn new() -> Result<(Self, UnboundedReceiver<WatchEvent>), notify::Error> {
        let (sender, receiver) = mpsc::unbounded();

        let watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| match result {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Access(_)) {
                        return;
                    }
                    for path in event.paths {
                        if sender.unbounded_send(WatchEvent { path }).is_err() {
                            return;
                        }
                    }
                }
                Err(error) => warn!("File watcher error: {}", error),
            },
            Config::default(),
        )?;

        Ok((
            Self {
                watcher: RefCell::new(watcher),
                watched: RefCell::new(HashSet::new()),
            },
            receiver,
        ))
    }

    pub fn watched_count(&self) -> usize {
        self.watched.borrow().len()
    }
}

impl WatchService for NotifyWatchService {
    fn watch(&self, path: &Path) {
        if self.watched.borrow().contains(path) {
            return;
        }
        match self
            .watcher
            .borrow_mut()
            .watch(path, RecursiveMode::NonRecursive)
        {
            Ok(()) => {
                debug!("Watching {}", path.display());
                self.watched.borrow_mut().insert(path.to_path_buf());
            }
            Err(error) => warn!("Failed to watch {}: {}", path.display(), error),
        }
    }

    fn unwatch(&self, path: &Path) {
        if !self.watched.borrow_mut().remove(path) {
            return;
        }
        debug!("Unwatching {}", path.display());
        // The directory is usually gone by now, which the notifier reports as an error.
        if let Err(error) = self.watcher.borrow_mut().unwatch(path) {
            debug!("Unwatch of {} reported: {}", path.display(), error);
        }
    }
}
