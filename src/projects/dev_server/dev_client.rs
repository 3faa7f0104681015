//! The reload script the dev server adds to every page it serves.

pub const DEV_CLIENT_MARKER: &str = "<!-- ergoweb-dev-client -->";
pub const EVENTS_ROUTE: &str = "/__ergoweb/events";

pub fn dev_client_snippet() -> String {
    format!(
        "\n{DEV_CLIENT_MARKER}\n<script>\n  (() => {{\n    const source = new EventSource('{EVENTS_ROUTE}');\n    source.addEventListener('reload', () => window.location.reload());\n  }})();\n</script>\n"
    )
}

/// Adds the reload script before `</body>`, or at the end when there is no body close
pub fn inject_dev_client(html: &str) -> String {
    if html.contains(DEV_CLIENT_MARKER) {
        return html.to_owned();
    }

    let snippet = dev_client_snippet();
    let insert_at = html.rfind("</body>").unwrap_or(html.len());

    let mut injected = String::with_capacity(html.len() + snippet.len());
    injected.push_str(&html[..insert_at]);
    injected.push_str(&snippet);
    injected.push_str(&html[insert_at..]);
    injected
}

#[cfg(test)]
#[path = "tests/dev_client_tests.rs"]
mod tests;
