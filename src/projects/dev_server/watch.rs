//! Keymap file watching and debounce helpers for the dev server.
//!
//! The watcher observes the keymap's directory rather than the file itself, so editors that save
//! by replacing the file are still picked up.

use crate::host_bridge::bridge_errors::{BridgeError, ErrorMetaDataKey};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Changed,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchPoll {
    Event(WatchEvent),
    Idle,
    Closed,
}

pub struct KeymapWatcher {
    target: PathBuf,
    rx: mpsc::Receiver<WatchEvent>,
    // Dropping the watcher stops the notifications
    _watcher: RecommendedWatcher,
}

impl KeymapWatcher {
    /// `target` should be canonical, notify reports paths under the watched directory
    pub fn new(target: &Path) -> Result<Self, BridgeError> {
        let target = target.to_path_buf();
        let Some(watch_dir) = target.parent().map(Path::to_path_buf) else {
            return Err(watch_error(&target, "Keymap file has no parent directory to watch"));
        };

        let (tx, rx) = mpsc::channel();
        let filter_target = target.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) if is_relevant_event(&event, &filter_target) => WatchEvent::Changed,
                Ok(_) => return,
                Err(e) => WatchEvent::Error(e.to_string()),
            };
            let _ = tx.send(event);
        })
        .map_err(|e| watch_error(&target, format!("Failed to create file watcher: {e}")))?;

        watcher
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .map_err(|e| watch_error(&watch_dir, format!("Failed to watch directory: {e}")))?;

        Ok(Self {
            target,
            rx,
            _watcher: watcher,
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn poll(&self, timeout: Duration) -> WatchPoll {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => WatchPoll::Event(event),
            Err(RecvTimeoutError::Timeout) => WatchPoll::Idle,
            Err(RecvTimeoutError::Disconnected) => WatchPoll::Closed,
        }
    }
}

fn watch_error(path: &Path, msg: impl Into<String>) -> BridgeError {
    BridgeError::dev_server_error(msg).with_metadata(ErrorMetaDataKey::Path, path.display())
}

/// Content, rename and removal events that name the keymap file
pub fn is_relevant_event(event: &Event, target: &Path) -> bool {
    let kind_matters = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    kind_matters && event.paths.iter().any(|path| path == target)
}

pub fn should_trigger_debounced_render(
    dirty_since: Option<Instant>,
    debounce_window: Duration,
) -> bool {
    match dirty_since {
        Some(first_dirty_at) => first_dirty_at.elapsed() >= debounce_window,
        None => false,
    }
}

#[cfg(test)]
#[path = "tests/watch_tests.rs"]
mod tests;
