//! Tests for dev-server error page rendering helpers.

use super::{format_bridge_error, render_error_page};
use crate::host_bridge::bridge_errors::{BridgeError, ErrorMetaDataKey};
use crate::projects::dev_server::dev_client::DEV_CLIENT_MARKER;

#[test]
fn metadata_is_listed_in_a_stable_order() {
    let error = BridgeError::network_error("http://example.com/km.txt", "Server answered 404")
        .with_metadata(ErrorMetaDataKey::ElementId, "keymap");

    assert_eq!(
        format_bridge_error(&error),
        "[Network Error] Server answered 404\n  ElementId: keymap\n  Url: http://example.com/km.txt\n"
    );
}

#[test]
fn rendered_page_escapes_details_and_keeps_reloading() {
    let page = render_error_page("Render Failed", "<unexpected> & more", 14);

    assert!(page.contains("Render #14"));
    assert!(page.contains("&lt;unexpected&gt; &amp; more"));
    assert!(page.contains(DEV_CLIENT_MARKER));
}
