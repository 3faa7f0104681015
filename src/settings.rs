use crate::host_bridge::bridge_errors::BridgeError;
use crate::return_config_error;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "ergoweb.toml";
pub const DEFAULT_MODULE_PATH: &str = "ergoweb.wasm";

/// Upper bound on `layer<k>` ids the viewer walks when switching layers
pub const DEFAULT_MAX_LAYERS: usize = 32;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub module: ModuleSettings,
    pub viewer: ViewerSettings,
    pub dev_server: DevServerSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModuleSettings {
    /// Path or URL of the compiled keymap module
    pub path: String,
    /// Overrides the render export name (`svg` or `make_svg`)
    pub entry: Option<String>,
}

impl Default for ModuleSettings {
    fn default() -> Self {
        ModuleSettings {
            path: String::from(DEFAULT_MODULE_PATH),
            entry: None,
        }
    }
}

/// Element ids of the viewer page
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerSettings {
    pub keymap_id: String,
    pub spinner_id: String,
    pub url_tab_id: String,
    pub url_name_id: String,
    pub text_id: String,
    pub layer_prefix: String,
    pub max_layers: usize,
    /// HTML file used instead of the built-in viewer page
    pub template: Option<PathBuf>,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        ViewerSettings {
            keymap_id: String::from("keymap"),
            spinner_id: String::from("spinny"),
            url_tab_id: String::from("urltab"),
            url_name_id: String::from("urlname"),
            text_id: String::from("kmtext"),
            layer_prefix: String::from("layer"),
            max_layers: DEFAULT_MAX_LAYERS,
            template: None,
        }
    }
}

impl ViewerSettings {
    pub fn layer_id(&self, layer: usize) -> String {
        format!("{}{}", self.layer_prefix, layer)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DevServerSettings {
    pub host: String,
    pub port: u16,
    pub poll_interval_ms: u64,
}

impl Default for DevServerSettings {
    fn default() -> Self {
        DevServerSettings {
            host: String::from("127.0.0.1"),
            port: 6342,
            poll_interval_ms: 300,
        }
    }
}

impl Config {
    pub fn from_toml(source: &str, path: &Path) -> Result<Self, BridgeError> {
        let config: Config = match toml::from_str(source) {
            Ok(config) => config,
            Err(e) => {
                return_config_error!(format!("Malformed settings file: {e}"), {
                    Path => path.display(),
                });
            }
        };

        if config.viewer.max_layers == 0 {
            return_config_error!("[viewer] max_layers must be at least 1", {
                Path => path.display(),
            });
        }

        Ok(config)
    }

    /// Load settings from an explicit path, or from `./ergoweb.toml` when it exists
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, BridgeError> {
        let path = match explicit_path {
            Some(path) => {
                if !path.exists() {
                    return Err(BridgeError::file_error(path, "Settings file does not exist"));
                }
                path.to_path_buf()
            }
            None => {
                let implicit = PathBuf::from(CONFIG_FILE_NAME);
                if !implicit.exists() {
                    return Ok(Config::default());
                }
                implicit
            }
        };

        let source = std::fs::read_to_string(&path).map_err(|e| {
            BridgeError::file_error(&path, format!("Could not read settings file: {e}"))
        })?;
        Config::from_toml(&source, &path)
    }
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
