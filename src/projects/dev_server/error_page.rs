//! Error page served in place of the viewer while the latest render is failing.
//!
//! The page keeps the reload script, so fixing the keymap file brings the viewer straight back.

use crate::dom::markup::escape_text;
use crate::host_bridge::bridge_errors::{BridgeError, error_type_to_str};
use crate::projects::dev_server::dev_client::inject_dev_client;
use std::fmt::Write;

/// Plain text report of an error and its metadata, sorted by key
pub fn format_bridge_error(error: &BridgeError) -> String {
    let mut output = format!("[{}] {}\n", error_type_to_str(&error.error_type), error.msg);

    let mut details: Vec<(String, &String)> = error
        .metadata
        .iter()
        .map(|(key, value)| (format!("{key:?}"), value))
        .collect();
    details.sort();

    for (key, value) in details {
        let _ = writeln!(output, "  {key}: {value}");
    }
    output
}

pub fn render_error_page(title: &str, details: &str, render_version: u64) -> String {
    let title = escape_text(title);
    let details = escape_text(details);

    let page = format!(
        r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <title>ergoweb: {title}</title>
  <style>
    body {{ margin: 2rem; font-family: Menlo, Consolas, monospace; background: #f7f7f9; }}
    h1 {{ font-size: 1.1rem; color: #9c0f2b; }}
    .meta {{ color: #64646e; }}
    pre {{ background: #fff; border: 1px solid #d8d8df; padding: 1rem; overflow-x: auto; }}
  </style>
</head>
<body>
  <h1>{title}</h1>
  <p class="meta">Render #{render_version}. Save the keymap file to try again.</p>
  <pre>{details}</pre>
</body>
</html>"#
    );

    inject_dev_client(&page)
}

#[cfg(test)]
#[path = "tests/error_page_tests.rs"]
mod tests;
