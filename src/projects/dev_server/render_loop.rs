//! Render execution and watch-triggered re-render coordination for the dev server.
//!
//! Each cycle reads the keymap file, renders it through the shared viewer, records the outcome
//! in the render state and broadcasts a reload to every connected page.

use crate::host_bridge::bridge_errors::BridgeError;
use crate::projects::dev_server::error_page::{format_bridge_error, render_error_page};
use crate::projects::dev_server::sse;
use crate::projects::dev_server::state::{DevServerState, lock_or_recover};
use crate::projects::dev_server::watch::{
    KeymapWatcher, WatchEvent, WatchPoll, should_trigger_debounced_render,
};
use saying::say;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct RenderCycleReport {
    pub version: u64,
    pub render_ok: bool,
    pub clients_notified: usize,
}

pub fn run_single_render_cycle(state: &DevServerState) -> RenderCycleReport {
    let outcome = render_once(state);

    let version = {
        let mut render_state = lock_or_recover(&state.render_state);
        render_state.last_render_version = render_state.last_render_version.saturating_add(1);
        render_state.last_render_ok = outcome.is_ok();

        match &outcome {
            Ok(()) => {
                render_state.last_error_html = None;
                render_state.last_render_summary = String::from("Keymap rendered.");
            }
            Err(error) => {
                let details = format_bridge_error(error);
                render_state.last_error_html = Some(render_error_page(
                    "Render Failed",
                    &details,
                    render_state.last_render_version,
                ));
                render_state.last_render_summary = details;
            }
        }

        render_state.last_render_version
    };

    let clients_notified = sse::broadcast_reload(state, version, outcome.is_ok());
    RenderCycleReport {
        version,
        render_ok: outcome.is_ok(),
        clients_notified,
    }
}

fn render_once(state: &DevServerState) -> Result<(), BridgeError> {
    let path = &state.keymap_path;
    let text = std::fs::read_to_string(path)
        .map_err(|e| BridgeError::file_error(path, format!("Could not read keymap file: {e}")))?;

    state.lock_viewer().render_text(&text)
}

pub fn report_cycle(report: &RenderCycleReport) {
    if report.render_ok {
        say!(
            Green "Render #",
            Green report.version,
            Green " finished. Reload broadcast to ",
            Green report.clients_notified,
            Green " clients."
        );
    } else {
        say!(
            Yellow "Render #",
            Yellow report.version,
            Yellow " failed. Reload broadcast to ",
            Yellow report.clients_notified,
            Yellow " clients."
        );
    }
}

/// Re-render once the keymap file has been quiet for a whole poll interval.
///
/// Returns when the watcher shuts down.
pub fn run_watch_render_loop(
    state: Arc<DevServerState>,
    watcher: KeymapWatcher,
    poll_interval: Duration,
) {
    let debounce_window = poll_interval;
    let mut dirty_since: Option<Instant> = None;

    loop {
        match watcher.poll(poll_interval) {
            WatchPoll::Event(WatchEvent::Changed) => dirty_since = Some(Instant::now()),
            WatchPoll::Event(WatchEvent::Error(message)) => {
                say!(Yellow "Dev server watch warning: ", Yellow message);
            }
            WatchPoll::Idle => {}
            WatchPoll::Closed => {
                say!(Yellow "Dev server watch warning: the file watcher stopped.");
                return;
            }
        }

        if !should_trigger_debounced_render(dirty_since, debounce_window) {
            continue;
        }

        report_cycle(&run_single_render_cycle(&state));
        dirty_since = None;
    }
}

#[cfg(test)]
#[path = "tests/render_loop_tests.rs"]
mod tests;
