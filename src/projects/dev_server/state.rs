//! Shared mutable state for the dev server runtime.
//!
//! HTTP handlers, SSE broadcasts and the watch/render loop coordinate through this state. The
//! viewer sits behind its own lock so renders and page requests never interleave.

use crate::module_loader::fetch::SourceFetcher;
use crate::ui::controller::ViewerController;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::mpsc::Sender;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
pub struct SseClient {
    pub id: u64,
    pub sender: Sender<String>,
}

#[derive(Debug, Clone)]
pub struct RenderState {
    pub last_render_ok: bool,
    pub last_error_html: Option<String>,
    pub last_render_version: u64,
    pub last_render_summary: String,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            last_render_ok: false,
            last_error_html: None,
            last_render_version: 0,
            last_render_summary: String::from("The keymap has not been rendered yet."),
        }
    }
}

pub struct DevServerState {
    pub keymap_path: PathBuf,
    pub viewer: Mutex<ViewerController<SourceFetcher>>,
    pub render_state: Mutex<RenderState>,
    pub clients: Mutex<Vec<SseClient>>,
    // Monotonic so removal by id stays stable when the client list shifts
    pub next_client_id: AtomicU64,
}

impl DevServerState {
    pub fn new(viewer: ViewerController<SourceFetcher>, keymap_path: PathBuf) -> Self {
        Self {
            keymap_path,
            viewer: Mutex::new(viewer),
            render_state: Mutex::new(RenderState::default()),
            clients: Mutex::new(Vec::new()),
            next_client_id: AtomicU64::new(1),
        }
    }

    pub fn lock_viewer(&self) -> MutexGuard<'_, ViewerController<SourceFetcher>> {
        lock_or_recover(&self.viewer)
    }

    pub fn render_snapshot(&self) -> RenderState {
        lock_or_recover(&self.render_state).clone()
    }
}

/// A render that panicked leaves the page in whatever state it reached, which is still servable
pub fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
