//! Command-line entrypoints for the keymap viewer.
//!
//! This module parses CLI commands and dispatches them into rendering, module inspection, stub
//! generation and the dev server.

use crate::host_bridge::bridge_errors::{BridgeError, print_bridge_error};
use crate::module_loader::contract::ModuleContract;
use crate::module_loader::fetch::{Fetcher, SourceFetcher, is_remote};
use crate::module_loader::stub_module::{StubKind, build_stub_module};
use crate::projects::dev_server::{self, DevServerOptions};
use crate::settings::Config;
use crate::ui::controller::ViewerController;
use crate::{open_viewer, timer_log};
use saying::say;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Default, PartialEq, Eq)]
struct RenderOptions {
    module: Option<String>,
    out: Option<String>,
    layer: Option<usize>,
}

/// Dev server flags given on the command line, each one overriding `[dev_server]`
#[derive(Debug, Default, PartialEq, Eq)]
struct DevOverrides {
    host: Option<String>,
    port: Option<u16>,
    poll_interval_ms: Option<u64>,
}

impl DevOverrides {
    fn apply(self, options: &mut DevServerOptions) {
        if let Some(host) = self.host {
            options.host = host;
        }
        if let Some(port) = self.port {
            options.port = port;
        }
        if let Some(poll_interval_ms) = self.poll_interval_ms {
            options.poll_interval_ms = poll_interval_ms;
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    // Renders a keymap file or URL into the viewer page
    Render {
        source: String,
        options: RenderOptions,
    },

    // Runs the page's start-up with a query string, like opening `index.html?fileurl=...`
    Load {
        query: String,
        options: RenderOptions,
    },

    // Serves the viewer page and re-renders whenever the keymap file changes
    Dev {
        path: String,
        module: Option<String>,
        overrides: DevOverrides,
    },

    Inspect(String),

    Stub {
        out: String,
        kind: StubKind,
    },

    Help,
}

pub fn start_cli() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help(false);
        return;
    }

    let (command_args, config_path) = match split_config_flag(&args[1..]) {
        Ok(split) => split,
        Err(e) => {
            say!(Red e);
            print_help(true);
            return;
        }
    };

    let command = match get_command(&command_args) {
        Ok(command) => command,
        Err(e) => {
            say!(Red e);
            print_help(true);
            return;
        }
    };

    if command == Command::Help {
        print_help(false);
        return;
    }

    let config = match Config::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            print_bridge_error(&e);
            return;
        }
    };

    if let Err(e) = run_command(command, config) {
        print_bridge_error(&e);
    }
}

fn run_command(command: Command, mut config: Config) -> Result<(), BridgeError> {
    let start = Instant::now();
    let base_dir = current_dir()?;

    match command {
        Command::Help => print_help(false),

        Command::Render { source, options } => {
            apply_module_override(&mut config, &options.module);
            let mut viewer = open_viewer(&config, &base_dir)?;

            if is_remote(&source) {
                viewer.render_from_url(&source)?;
            } else {
                let text = viewer.fetcher().fetch_text(&source)?;
                let text_id = config.viewer.text_id.clone();
                viewer.page_mut().set_value(&text_id, &text)?;
                viewer.render_from_text_field()?;
            }

            if let Some(layer) = options.layer {
                viewer.onlylayer(layer)?;
            }

            write_page(&viewer, options.out.as_deref())?;
        }

        Command::Load { query, options } => {
            apply_module_override(&mut config, &options.module);
            let mut viewer = open_viewer(&config, &base_dir)?;

            if !viewer.start_from_query(&query)? {
                say!(Yellow "No fileurl in the query, the page is left as loaded.");
            }
            viewer.apply_layer_query(&query)?;

            write_page(&viewer, options.out.as_deref())?;
        }

        Command::Dev {
            path,
            module,
            overrides,
        } => {
            apply_module_override(&mut config, &module);
            let mut options = DevServerOptions::from(&config.dev_server);
            overrides.apply(&mut options);
            say!("\nStarting dev server...");
            let viewer = open_viewer(&config, &base_dir)?;
            dev_server::run_dev_server(viewer, &path, options)?;
        }

        Command::Inspect(location) => {
            let fetcher = SourceFetcher::new(&base_dir)?;
            let bytes = fetcher.fetch_bytes(&location)?;
            let contract = ModuleContract::inspect(&bytes, config.module.entry.as_deref())?;
            println!("{}", contract.to_json()?);
        }

        Command::Stub { out, kind } => {
            let path = PathBuf::from(&out);
            std::fs::write(&path, build_stub_module(kind)).map_err(|e| {
                BridgeError::file_error(&path, format!("Could not write stub module: {e}"))
            })?;
            let kind_name = format!("{kind:?}");
            say!(Green "Wrote ", Green kind_name, Green " stub module to ", Green out);
        }
    }

    timer_log!(start, "Command finished in: ");
    Ok(())
}

fn apply_module_override(config: &mut Config, module: &Option<String>) {
    if let Some(module) = module {
        config.module.path = module.to_owned();
    }
}

fn current_dir() -> Result<PathBuf, BridgeError> {
    env::current_dir().map_err(|e| {
        BridgeError::file_error(
            Path::new("."),
            format!("Failed to resolve current directory: {e}"),
        )
    })
}

fn write_page(viewer: &ViewerController<SourceFetcher>, out: Option<&str>) -> Result<(), BridgeError> {
    let html = viewer.page().to_html();

    match out {
        Some(out) => {
            let path = Path::new(out);
            std::fs::write(path, html).map_err(|e| {
                BridgeError::file_error(path, format!("Could not write the viewer page: {e}"))
            })?;
            say!(Green "Viewer page written to ", Green out);
        }
        None => println!("{html}"),
    }

    Ok(())
}

/// Pulls the global `--config <path>` flag out of the arguments
fn split_config_flag(args: &[String]) -> Result<(Vec<String>, Option<PathBuf>), String> {
    let mut remaining = Vec::with_capacity(args.len());
    let mut config_path = None;
    let mut index = 0usize;

    while let Some(arg) = args.get(index) {
        if arg == "--config" {
            let value = flag_value(args, index, "--config")?;
            config_path = Some(PathBuf::from(value));
            index += 2;
        } else {
            remaining.push(arg.to_owned());
            index += 1;
        }
    }

    Ok((remaining, config_path))
}

fn get_command(args: &[String]) -> Result<Command, String> {
    let command = args.first().map(String::as_str);

    match command {
        Some("help") | Some("--help") | Some("-h") => Ok(Command::Help),

        Some("render") => {
            let (source, options) = parse_render_args(args, "render", true)?;
            let Some(source) = source else {
                return Err(String::from(
                    "Render needs a keymap file or URL (try 'ergoweb render keymap.txt')",
                ));
            };
            Ok(Command::Render { source, options })
        }

        Some("load") => {
            let (query, options) = parse_render_args(args, "load", false)?;
            Ok(Command::Load {
                query: query.unwrap_or_default(),
                options,
            })
        }

        Some("dev") => parse_dev_command(args),

        Some("inspect") => match args.get(1) {
            Some(path) if args.len() == 2 => Ok(Command::Inspect(path.to_owned())),
            Some(_) => Err(String::from("Inspect accepts exactly one module path.")),
            None => Err(String::from("Inspect needs a module path or URL.")),
        },

        Some("stub") => parse_stub_command(args),

        Some(unknown) => Err(format!("Invalid command: '{unknown}'")),
        None => Ok(Command::Help),
    }
}

fn parse_render_args(
    args: &[String],
    command: &str,
    allow_layer: bool,
) -> Result<(Option<String>, RenderOptions), String> {
    let mut positional = None;
    let mut options = RenderOptions::default();
    let mut index = 1usize;

    while let Some(arg) = args.get(index) {
        match arg.as_str() {
            "--module" => {
                options.module = Some(flag_value(args, index, "--module")?.to_owned());
                index += 2;
            }
            "--out" => {
                options.out = Some(flag_value(args, index, "--out")?.to_owned());
                index += 2;
            }
            "--layer" if allow_layer => {
                let value = flag_value(args, index, "--layer")?;
                options.layer = match value.parse::<usize>() {
                    Ok(layer) => Some(layer),
                    Err(_) => {
                        return Err(format!(
                            "Invalid --layer value: '{value}'. It must be a layer number."
                        ));
                    }
                };
                index += 2;
            }
            _ if arg.starts_with("--") => {
                return Err(format!("Unknown {command} flag: '{arg}'."));
            }
            _ => {
                if positional.is_some() {
                    return Err(format!("{command} accepts at most one positional argument."));
                }
                positional = Some(arg.to_owned());
                index += 1;
            }
        }
    }

    Ok((positional, options))
}

fn parse_dev_command(args: &[String]) -> Result<Command, String> {
    let mut path = String::new();
    let mut module = None;
    let mut overrides = DevOverrides::default();
    let mut index = 1usize;

    while let Some(arg) = args.get(index) {
        match arg.as_str() {
            "--module" => {
                module = Some(flag_value(args, index, "--module")?.to_owned());
                index += 2;
            }
            "--host" => {
                overrides.host = Some(flag_value(args, index, "--host")?.to_owned());
                index += 2;
            }
            "--port" => {
                let port_value = flag_value(args, index, "--port")?;
                overrides.port = match port_value.parse::<u16>() {
                    Ok(port) => Some(port),
                    Err(_) => {
                        return Err(format!(
                            "Invalid --port value: '{port_value}'. Port must be a number from 0 to 65535."
                        ));
                    }
                };
                index += 2;
            }
            "--poll-interval-ms" => {
                let interval_value = flag_value(args, index, "--poll-interval-ms")?;
                overrides.poll_interval_ms = match interval_value.parse::<u64>() {
                    Ok(interval) if interval > 0 => Some(interval),
                    Ok(_) => {
                        return Err(String::from(
                            "Invalid --poll-interval-ms value: '0'. It must be greater than zero.",
                        ));
                    }
                    Err(_) => {
                        return Err(format!(
                            "Invalid --poll-interval-ms value: '{interval_value}'. It must be a positive integer."
                        ));
                    }
                };
                index += 2;
            }
            _ if arg.starts_with("--") => {
                return Err(format!(
                    "Unknown dev flag: '{arg}'. Supported dev flags are --module, --host, --port, --poll-interval-ms."
                ));
            }
            _ => {
                if path.is_empty() {
                    path = arg.to_owned();
                    index += 1;
                } else {
                    return Err(String::from(
                        "Dev command accepts at most one keymap file.",
                    ));
                }
            }
        }
    }

    if path.is_empty() {
        return Err(String::from("Dev command needs a keymap file to watch."));
    }

    Ok(Command::Dev {
        path,
        module,
        overrides,
    })
}

fn parse_stub_command(args: &[String]) -> Result<Command, String> {
    let mut out = None;
    let mut kind = StubKind::CString;

    for arg in &args[1..] {
        match arg.as_str() {
            "--bindgen" => kind = StubKind::Bindgen,
            "--throwing" => kind = StubKind::Throwing,
            _ if arg.starts_with("--") => {
                return Err(format!(
                    "Unknown stub flag: '{arg}'. Supported stub flags are --bindgen, --throwing."
                ));
            }
            _ if out.is_none() => out = Some(arg.to_owned()),
            _ => return Err(String::from("Stub accepts exactly one output path.")),
        }
    }

    match out {
        Some(out) => Ok(Command::Stub { out, kind }),
        None => Err(String::from("Stub needs an output path (try 'ergoweb stub stub.wasm')")),
    }
}

fn flag_value<'a>(args: &'a [String], index: usize, flag: &str) -> Result<&'a str, String> {
    match args.get(index + 1) {
        Some(value) if !value.starts_with("--") => Ok(value),
        _ => Err(format!("Missing value for {flag}")),
    }
}

fn print_help(commands_only: bool) {
    if !commands_only {
        say!(Bright Black "------------------------------------");
        say!(Green Bold "ergoweb: the ergodox keymap viewer host");
        say!("Usage: ", Bold "<command>", Italic " <args>");
    }
    say!(Green Bold "\nCommands:");
    say!("  render <file|url>    - Renders a keymap into the viewer page");
    say!("  load \"<query>\"       - Starts the viewer page with a query string (?fileurl=...)");
    say!("  dev <file>           - Serves the viewer page, re-rendering when the keymap changes");
    say!("  inspect <wasm>       - Prints the module's exports, imports and entry ABI as JSON");
    say!("  stub <out.wasm>      - Writes a stand-in keymap module that echoes its input");
    say!("  help                 - Shows this message");

    say!(Green Bold "\nFlags:");
    say!("  --config <path>      (default: ./ergoweb.toml when present)");
    say!("  --module <wasm|url>  (render, load, dev)");
    say!("  --out <html>         (render, load; default: stdout)");
    say!("  --layer <k>          (render)");
    say!("  --bindgen | --throwing  (stub)");
    say!("\nDev command options:");
    say!("  --host <host>            (default: 127.0.0.1)");
    say!("  --port <port>            (default: 6342)");
    say!("  --poll-interval-ms <ms>  (default: 300)");
}

#[cfg(test)]
#[path = "tests/cli_tests.rs"]
mod tests;
