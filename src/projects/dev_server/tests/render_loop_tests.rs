//! Tests for render cycles and the state they leave behind.

use super::run_single_render_cycle;
use crate::host_bridge::bridge_errors::{ErrorType, error_type_to_str};
use crate::module_loader::stub_module::{STUB_THROW_MESSAGE, StubKind};
use crate::projects::dev_server::test_support::{TWO_LAYERS, dev_state};
use std::fs;

#[test]
fn successful_render_updates_the_page_and_version() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let state = dev_state(dir.path(), StubKind::CString, TWO_LAYERS);

    let report = run_single_render_cycle(&state);
    assert!(report.render_ok);
    assert_eq!(report.version, 1);
    assert_eq!(report.clients_notified, 0);

    let snapshot = state.render_snapshot();
    assert!(snapshot.last_render_ok);
    assert!(snapshot.last_error_html.is_none());

    let viewer = state.lock_viewer();
    assert!(viewer.page().contains("layer1"));
    assert_eq!(viewer.visible_layers(), vec![0]);
    assert_eq!(viewer.client().outstanding_allocations(), 0);
}

#[test]
fn a_missing_keymap_fails_and_the_next_save_recovers() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let state = dev_state(dir.path(), StubKind::CString, TWO_LAYERS);
    fs::remove_file(&state.keymap_path).expect("keymap should be removed");

    let failed = run_single_render_cycle(&state);
    assert!(!failed.render_ok);
    let snapshot = state.render_snapshot();
    assert!(
        snapshot
            .last_render_summary
            .contains(error_type_to_str(&ErrorType::File))
    );
    assert!(
        snapshot
            .last_error_html
            .expect("failed render stores an error page")
            .contains("Render #1")
    );

    fs::write(&state.keymap_path, TWO_LAYERS).expect("keymap should be restored");
    let recovered = run_single_render_cycle(&state);
    assert!(recovered.render_ok);
    assert_eq!(recovered.version, 2);
    assert!(state.render_snapshot().last_error_html.is_none());
}

#[test]
fn module_errors_end_up_on_the_error_page() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let state = dev_state(dir.path(), StubKind::Throwing, TWO_LAYERS);

    let report = run_single_render_cycle(&state);
    assert!(!report.render_ok);

    let error_page = state
        .render_snapshot()
        .last_error_html
        .expect("failed render stores an error page");
    assert!(error_page.contains(STUB_THROW_MESSAGE));
    assert!(error_page.contains("Keymap Module Error"));
    assert_eq!(state.lock_viewer().client().outstanding_allocations(), 0);
}
