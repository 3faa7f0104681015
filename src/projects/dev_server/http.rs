//! Minimal HTTP routing for the std-only dev server.
//!
//! `/` serves the current viewer page with the reload script injected, or the error page when
//! the latest render failed. `?layer=<k>` switches the visible layer before the page is served.

use crate::projects::dev_server::dev_client::{EVENTS_ROUTE, inject_dev_client};
use crate::projects::dev_server::error_page::{format_bridge_error, render_error_page};
use crate::projects::dev_server::sse;
use crate::projects::dev_server::state::DevServerState;
use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;

pub const PING_ROUTE: &str = "/__ergoweb/ping";

const HTML: &str = "text/html; charset=utf-8";
const TEXT: &str = "text/plain; charset=utf-8";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status_line: &'static str,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    fn ok(content_type: &'static str, body: impl Into<String>) -> Self {
        Self {
            status_line: "200 OK",
            content_type,
            body: body.into(),
        }
    }

    fn not_found() -> Self {
        Self {
            status_line: "404 NOT FOUND",
            content_type: TEXT,
            body: String::from("Not Found"),
        }
    }
}

pub fn handle_connection(mut stream: TcpStream, state: Arc<DevServerState>) -> io::Result<()> {
    let Some(request) = parse_request(&stream)? else {
        return Ok(());
    };

    if request.method != "GET" {
        let response = HttpResponse {
            status_line: "405 METHOD NOT ALLOWED",
            content_type: TEXT,
            body: String::from("Method Not Allowed"),
        };
        return send_response(&mut stream, &response);
    }

    let (path, query) = split_query_string(&request.path);
    if path == EVENTS_ROUTE {
        return sse::handle_sse_connection(stream, state);
    }

    let response = route_request(path, query, &state);
    send_response(&mut stream, &response)
}

pub fn route_request(path: &str, query: &str, state: &DevServerState) -> HttpResponse {
    match path {
        PING_ROUTE => HttpResponse::ok(TEXT, "ok"),
        "/" | "/index.html" => serve_viewer_page(query, state),
        _ => HttpResponse::not_found(),
    }
}

struct HttpRequest {
    method: String,
    path: String,
}

fn parse_request(stream: &TcpStream) -> io::Result<Option<HttpRequest>> {
    let mut reader = BufReader::new(stream.try_clone()?);

    let mut request_line = String::new();
    if reader.read_line(&mut request_line)? == 0 {
        return Ok(None);
    }

    // Headers are read and dropped, routing only needs the request line
    loop {
        let mut header_line = String::new();
        let bytes_read = reader.read_line(&mut header_line)?;
        if bytes_read == 0 || header_line == "\r\n" {
            break;
        }
    }

    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(path)) = (parts.next(), parts.next()) else {
        return Ok(None);
    };

    Ok(Some(HttpRequest {
        method: method.to_owned(),
        path: path.to_owned(),
    }))
}

/// Splits `/path?query` into the path and the query with its `?`, the form the viewer expects
pub fn split_query_string(target: &str) -> (&str, &str) {
    match target.find('?') {
        Some(index) => target.split_at(index),
        None => (target, ""),
    }
}

fn serve_viewer_page(query: &str, state: &DevServerState) -> HttpResponse {
    let render_state = state.render_snapshot();

    if !render_state.last_render_ok {
        let error_page = render_state.last_error_html.unwrap_or_else(|| {
            render_error_page(
                "Not Rendered",
                &render_state.last_render_summary,
                render_state.last_render_version,
            )
        });
        return HttpResponse::ok(HTML, error_page);
    }

    let mut viewer = state.lock_viewer();
    if let Err(error) = viewer.apply_layer_query(query) {
        return HttpResponse {
            status_line: "400 BAD REQUEST",
            content_type: TEXT,
            body: format_bridge_error(&error),
        };
    }

    HttpResponse::ok(HTML, inject_dev_client(&viewer.page().to_html()))
}

fn send_response(stream: &mut TcpStream, response: &HttpResponse) -> io::Result<()> {
    let headers = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        response.status_line,
        response.content_type,
        response.body.len()
    );
    stream.write_all(headers.as_bytes())?;
    stream.write_all(response.body.as_bytes())?;
    stream.flush()
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
