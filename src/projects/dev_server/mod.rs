//! Dev server entry point and orchestration.
//!
//! This module validates the keymap path, runs the initial render, starts the watcher and
//! render loop, and serves HTTP and SSE traffic for hot reload.

mod dev_client;
mod error_page;
mod http;
mod render_loop;
mod sse;
mod state;
mod watch;

use crate::host_bridge::bridge_errors::{BridgeError, ErrorMetaDataKey};
use crate::module_loader::fetch::SourceFetcher;
use crate::projects::dev_server::state::DevServerState;
use crate::projects::dev_server::watch::KeymapWatcher;
use crate::settings::DevServerSettings;
use crate::ui::controller::ViewerController;
use saying::say;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevServerOptions {
    pub host: String,
    pub port: u16,
    pub poll_interval_ms: u64,
}

impl Default for DevServerOptions {
    fn default() -> Self {
        Self::from(&DevServerSettings::default())
    }
}

impl From<&DevServerSettings> for DevServerOptions {
    fn from(settings: &DevServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            poll_interval_ms: settings.poll_interval_ms,
        }
    }
}

pub fn run_dev_server(
    viewer: ViewerController<SourceFetcher>,
    keymap_path: &str,
    options: DevServerOptions,
) -> Result<(), BridgeError> {
    let keymap_file = validate_keymap_path(keymap_path)?;
    let watcher = KeymapWatcher::new(&keymap_file)?;
    let watched = watcher.target().display().to_string();
    say!(Bright Black "Watching ", Bright Black watched);
    let state = Arc::new(DevServerState::new(viewer, keymap_file));

    let initial_report = render_loop::run_single_render_cycle(&state);
    if initial_report.render_ok {
        say!(Green "Initial render succeeded.");
    } else {
        let summary = state.render_snapshot().last_render_summary;
        say!(Yellow "Initial render failed, serving the error page until the keymap is fixed:");
        say!(Yellow summary);
    }

    let bind_addr = format!("{}:{}", options.host, options.port);
    let listener = TcpListener::bind(&bind_addr).map_err(|error| {
        BridgeError::dev_server_error(format!(
            "Failed to start dev server on {bind_addr}: {error}"
        ))
    })?;

    let host_display = if options.host == "127.0.0.1" {
        "localhost"
    } else {
        options.host.as_str()
    };
    say!(Bold "Dev server listening at:");
    say!(
        Green "http://",
        Green host_display,
        Green ":",
        Green options.port
    );

    let watch_state = Arc::clone(&state);
    let poll_interval = Duration::from_millis(options.poll_interval_ms);

    // Renders run on their own thread so SSE clients never hold up a re-render
    thread::spawn(move || {
        render_loop::run_watch_render_loop(watch_state, watcher, poll_interval);
    });

    for stream_result in listener.incoming() {
        match stream_result {
            Ok(stream) => {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    if let Err(error) = http::handle_connection(stream, state) {
                        say!(
                            Yellow "Dev server request handling warning: ",
                            Yellow error.to_string()
                        );
                    }
                });
            }
            Err(error) => {
                say!(
                    Yellow "Dev server connection accept warning: ",
                    Yellow error.to_string()
                );
            }
        }
    }

    Ok(())
}

fn validate_keymap_path(keymap_path: &str) -> Result<PathBuf, BridgeError> {
    if keymap_path.trim().is_empty() {
        return Err(BridgeError::dev_server_error(
            "Dev server needs a keymap file to watch.",
        ));
    }

    let path = Path::new(keymap_path);
    if !path.is_file() {
        return Err(BridgeError::file_error(
            path,
            "Dev server keymap path must be an existing file.",
        )
        .with_metadata(
            ErrorMetaDataKey::PrimarySuggestion,
            "Remote keymaps can be rendered once with `ergoweb render <url>`",
        ));
    }

    path.canonicalize().map_err(|error| {
        BridgeError::file_error(path, format!("Failed to canonicalize keymap path: {error}"))
    })
}

#[cfg(test)]
#[path = "tests/test_support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
