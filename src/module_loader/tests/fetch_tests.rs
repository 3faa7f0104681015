use super::{Fetcher, SourceFetcher, is_remote};
use crate::host_bridge::bridge_errors::ErrorType;
use std::fs;

#[test]
fn only_http_locations_are_remote() {
    assert!(is_remote("http://example.com/km.txt"));
    assert!(is_remote("https://example.com/km.txt"));
    assert!(!is_remote("file:///tmp/km.txt"));
    assert!(!is_remote("keymaps/km.txt"));
}

#[test]
fn local_paths_resolve_against_the_base_dir() {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("km.txt"), "KC_A, KC_B").expect("write keymap");

    let fetcher = SourceFetcher::new(dir.path()).expect("fetcher");
    assert_eq!(fetcher.fetch_text("km.txt").expect("relative read"), "KC_A, KC_B");

    let absolute = format!("file://{}", dir.path().join("km.txt").display());
    assert_eq!(fetcher.fetch_text(&absolute).expect("file url read"), "KC_A, KC_B");
}

#[test]
fn invalid_utf8_in_a_keymap_is_replaced() {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("km.txt"), b"KC_\xffA").expect("write keymap");

    let fetcher = SourceFetcher::new(dir.path()).expect("fetcher");
    assert_eq!(fetcher.fetch_text("km.txt").expect("lossy read"), "KC_\u{fffd}A");
}

#[test]
fn missing_files_are_file_errors() {
    let dir = tempfile::tempdir().expect("temp dir");
    let fetcher = SourceFetcher::new(dir.path()).expect("fetcher");

    let err = fetcher.fetch_bytes("nope.wasm").expect_err("file does not exist");
    assert_eq!(err.error_type, ErrorType::File);
}
