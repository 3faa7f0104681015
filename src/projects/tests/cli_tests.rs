//! Tests for CLI command parsing and validation.

use super::{Command, DevOverrides, RenderOptions, get_command, split_config_flag};
use crate::module_loader::stub_module::StubKind;
use crate::projects::dev_server::DevServerOptions;
use std::path::PathBuf;

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[test]
fn render_command_parses_module_out_and_layer() {
    let command = get_command(&args(&[
        "render",
        "keymap.txt",
        "--module",
        "keymap.wasm",
        "--out",
        "index.html",
        "--layer",
        "2",
    ]))
    .expect("command should parse");

    assert_eq!(
        command,
        Command::Render {
            source: String::from("keymap.txt"),
            options: RenderOptions {
                module: Some(String::from("keymap.wasm")),
                out: Some(String::from("index.html")),
                layer: Some(2),
            },
        }
    );
}

#[test]
fn render_command_needs_a_source() {
    let error = get_command(&args(&["render", "--out", "index.html"]))
        .expect_err("missing source should fail");
    assert!(error.contains("keymap file or URL"));
}

#[test]
fn render_command_rejects_bad_layers_and_missing_values() {
    let error = get_command(&args(&["render", "km.txt", "--layer", "top"]))
        .expect_err("layer must be a number");
    assert!(error.contains("Invalid --layer value"));

    let error = get_command(&args(&["render", "km.txt", "--module"]))
        .expect_err("module needs a value");
    assert_eq!(error, "Missing value for --module");
}

#[test]
fn load_command_keeps_the_query_verbatim() {
    let command = get_command(&args(&["load", "?fileurl=http%3A%2F%2Fexample.com%2Fkm.txt"]))
        .expect("command should parse");

    assert_eq!(
        command,
        Command::Load {
            query: String::from("?fileurl=http%3A%2F%2Fexample.com%2Fkm.txt"),
            options: RenderOptions::default(),
        }
    );

    let error = get_command(&args(&["load", "?layer=1", "--layer", "1"]))
        .expect_err("load has no --layer flag");
    assert!(error.contains("Unknown load flag"));
}

#[test]
fn dev_command_leaves_unset_options_to_the_settings() {
    let command = get_command(&args(&["dev", "keymap.txt"])).expect("command should parse");
    assert_eq!(
        command,
        Command::Dev {
            path: String::from("keymap.txt"),
            module: None,
            overrides: DevOverrides::default(),
        }
    );
}

#[test]
fn dev_command_parses_custom_host_port_and_poll_interval() {
    let command = get_command(&args(&[
        "dev",
        "keymap.txt",
        "--host",
        "0.0.0.0",
        "--port",
        "7777",
        "--poll-interval-ms",
        "120",
    ]))
    .expect("command should parse");

    let Command::Dev { overrides, .. } = command else {
        panic!("expected a dev command");
    };
    let mut options = DevServerOptions::default();
    overrides.apply(&mut options);

    assert_eq!(
        options,
        DevServerOptions {
            host: String::from("0.0.0.0"),
            port: 7777,
            poll_interval_ms: 120,
        }
    );
}

#[test]
fn dev_command_rejects_invalid_values_and_unknown_flags() {
    let error = get_command(&args(&["dev", "keymap.txt", "--port", "invalid"]))
        .expect_err("invalid port should fail");
    assert!(error.contains("Invalid --port value"));

    let error = get_command(&args(&["dev", "keymap.txt", "--poll-interval-ms", "0"]))
        .expect_err("zero interval should fail");
    assert!(error.contains("greater than zero"));

    let error =
        get_command(&args(&["dev", "keymap.txt", "--wat"])).expect_err("unknown flag should fail");
    assert!(error.contains("Unknown dev flag"));

    let error = get_command(&args(&["dev"])).expect_err("dev needs a file");
    assert!(error.contains("keymap file"));
}

#[test]
fn stub_and_inspect_commands() {
    assert_eq!(
        get_command(&args(&["stub", "out.wasm", "--bindgen"])).expect("command should parse"),
        Command::Stub {
            out: String::from("out.wasm"),
            kind: StubKind::Bindgen,
        }
    );
    assert_eq!(
        get_command(&args(&["inspect", "keymap.wasm"])).expect("command should parse"),
        Command::Inspect(String::from("keymap.wasm"))
    );
    assert!(get_command(&args(&["stub"])).is_err());
    assert!(get_command(&args(&["inspect", "a.wasm", "b.wasm"])).is_err());
}

#[test]
fn config_flag_is_taken_from_anywhere() {
    let (remaining, config) =
        split_config_flag(&args(&["render", "--config", "alt.toml", "keymap.txt"]))
            .expect("flags should split");

    assert_eq!(remaining, args(&["render", "keymap.txt"]));
    assert_eq!(config, Some(PathBuf::from("alt.toml")));

    assert!(split_config_flag(&args(&["render", "--config"])).is_err());
}

#[test]
fn unknown_commands_are_rejected() {
    let error = get_command(&args(&["build"])).expect_err("no build command");
    assert_eq!(error, "Invalid command: 'build'");
    assert_eq!(get_command(&args(&["help"])).expect("help parses"), Command::Help);
}
