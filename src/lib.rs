pub mod settings;

pub mod host_bridge {
    pub mod bridge_dev_logging;
    pub mod bridge_errors;
    pub mod foreign_memory;
    pub mod guest;
    pub mod handle_table;
    pub mod memory_utils;

    #[cfg(test)]
    #[path = "tests/test_support.rs"]
    pub(crate) mod test_support;
}

pub mod module_loader {
    pub mod contract;
    pub mod fetch;
    pub mod host_functions;
    pub mod instance;
    pub mod stub_module;
}

pub mod dom {
    pub mod markup;
    pub mod page;
    pub mod viewer_template;
}

pub mod ui {
    pub mod controller;
    pub mod query;
}

pub mod projects;

use crate::dom::page::Page;
use crate::dom::viewer_template::VIEWER_TEMPLATE;
use crate::host_bridge::bridge_errors::BridgeError;
use crate::module_loader::fetch::SourceFetcher;
use crate::module_loader::instance::KeymapClient;
use crate::settings::Config;
use crate::ui::controller::ViewerController;
use std::path::Path;

/// The viewer page named in the settings, or the built-in one
pub fn load_viewer_page(config: &Config) -> Result<Page, BridgeError> {
    match &config.viewer.template {
        Some(path) => Page::from_file(path),
        None => Ok(Page::parse(VIEWER_TEMPLATE)),
    }
}

/// Load the configured keymap module into the viewer page and run the page's load step.
///
/// `base_dir` resolves relative module and keymap locations.
pub fn open_viewer(
    config: &Config,
    base_dir: &Path,
) -> Result<ViewerController<SourceFetcher>, BridgeError> {
    let page = load_viewer_page(config)?;
    let fetcher = SourceFetcher::new(base_dir)?;
    let client = KeymapClient::load(
        &fetcher,
        &config.module.path,
        config.module.entry.as_deref(),
        page,
    )?;

    let mut viewer = ViewerController::new(client, fetcher, config.viewer.clone());
    viewer.on_load()?;
    Ok(viewer)
}
