//! Server-Sent Events for hot reload.
//!
//! Each connected page gets a channel-backed writer loop. Every finished render is broadcast as a
//! `reload` event carrying the render version and outcome, and clients whose channel has closed
//! are pruned during the broadcast.

use crate::projects::dev_server::state::{DevServerState, SseClient, lock_or_recover};
use serde_json::json;
use std::io::{self, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

pub fn format_reload_event(version: u64, render_ok: bool) -> String {
    let data = json!({ "version": version, "ok": render_ok });
    format!("event: reload\ndata: {data}\n\n")
}

pub fn broadcast_reload(state: &DevServerState, version: u64, render_ok: bool) -> usize {
    let event = format_reload_event(version, render_ok);
    let mut clients = lock_or_recover(&state.clients);

    // Everyone still listening after the send was notified
    clients.retain(|client| client.sender.send(event.clone()).is_ok());
    clients.len()
}

fn register_client(state: &DevServerState, sender: mpsc::Sender<String>) -> u64 {
    let id = state.next_client_id.fetch_add(1, Ordering::Relaxed);
    lock_or_recover(&state.clients).push(SseClient { id, sender });
    id
}

pub fn remove_client(state: &DevServerState, client_id: u64) {
    lock_or_recover(&state.clients).retain(|client| client.id != client_id);
}

pub fn handle_sse_connection(mut stream: TcpStream, state: Arc<DevServerState>) -> io::Result<()> {
    let headers = concat!(
        "HTTP/1.1 200 OK\r\n",
        "Content-Type: text/event-stream\r\n",
        "Cache-Control: no-cache\r\n",
        "Connection: keep-alive\r\n",
        "Access-Control-Allow-Origin: *\r\n\r\n"
    );
    stream.write_all(headers.as_bytes())?;
    stream.write_all(b": connected\n\n")?;
    stream.flush()?;

    let (sender, receiver) = mpsc::channel::<String>();
    let client_id = register_client(&state, sender);

    loop {
        let payload = match receiver.recv_timeout(KEEP_ALIVE_INTERVAL) {
            Ok(event) => event,
            // Idle streams get a comment so proxies keep them open
            Err(RecvTimeoutError::Timeout) => String::from(": keep-alive\n\n"),
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if stream.write_all(payload.as_bytes()).is_err() || stream.flush().is_err() {
            break;
        }
    }

    remove_client(&state, client_id);
    Ok(())
}

#[cfg(test)]
#[path = "tests/sse_tests.rs"]
mod tests;
