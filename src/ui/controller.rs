//! Viewer page behaviour: tabs, the loading spinner, layer visibility and rendering.
//!
//! The controller owns the keymap client, and with it the page, so every operation runs to
//! completion before the next one starts. There is no recovery: when a render fails the error
//! is returned and the spinner is left showing, the same as the page does when the module
//! throws.

use crate::dom::page::Page;
use crate::host_bridge::bridge_errors::BridgeError;
use crate::module_loader::fetch::Fetcher;
use crate::module_loader::instance::KeymapClient;
use crate::settings::ViewerSettings;
use crate::timer_log;
use crate::ui::query::{decode_uri_component, get_query_variable};
use std::time::Instant;

pub const FILE_URL_QUERY: &str = "fileurl";
pub const LAYER_QUERY: &str = "layer";

const VISIBLE: &str = "visible";
const HIDDEN: &str = "hidden";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinnerState {
    Idle,
    Loading,
}

impl SpinnerState {
    fn display(self) -> &'static str {
        match self {
            SpinnerState::Idle => "none",
            SpinnerState::Loading => "block",
        }
    }
}

pub struct ViewerController<F: Fetcher> {
    client: KeymapClient,
    fetcher: F,
    ids: ViewerSettings,
}

impl<F: Fetcher> ViewerController<F> {
    pub fn new(client: KeymapClient, fetcher: F, ids: ViewerSettings) -> Self {
        ViewerController {
            client,
            fetcher,
            ids,
        }
    }

    pub fn client(&self) -> &KeymapClient {
        &self.client
    }

    pub fn page(&self) -> &Page {
        self.client.document()
    }

    pub fn page_mut(&mut self) -> &mut Page {
        self.client.document_mut()
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Show layer 0 and hide the rest. The page must have a layer 0.
    pub fn on_load(&mut self) -> Result<(), BridgeError> {
        let first = self.ids.layer_id(0);
        if !self.page().contains(&first) {
            return Err(BridgeError::missing_element(&first));
        }
        self.onlylayer(0)
    }

    /// Render keymap text into the keymap element and reset to layer 0
    pub fn render_text(&mut self, text: &str) -> Result<(), BridgeError> {
        let start = Instant::now();
        self.set_spinner(SpinnerState::Loading)?;

        self.client.render_into(text, &self.ids.keymap_id)?;
        self.onlylayer(0)?;

        self.set_spinner(SpinnerState::Idle)?;
        timer_log!(start, "Keymap rendered in: ");
        Ok(())
    }

    pub fn render_from_url(&mut self, url: &str) -> Result<(), BridgeError> {
        self.select_url_tab()?;
        let url_name_id = self.ids.url_name_id.clone();
        self.page_mut().set_value(&url_name_id, url)?;
        self.set_spinner(SpinnerState::Loading)?;

        let text = self.fetcher.fetch_text(url)?;
        self.render_text(&text)
    }

    /// Render whatever is in the keymap text area
    pub fn render_from_text_field(&mut self) -> Result<(), BridgeError> {
        let text = self.page().value(&self.ids.text_id)?;
        self.render_text(&text)
    }

    /// Make `layer` the only visible layer. Layers missing from the page are skipped.
    pub fn onlylayer(&mut self, layer: usize) -> Result<(), BridgeError> {
        self.show_layers(&[layer])
    }

    /// Show several layers at once, hiding everything else
    pub fn show_layers(&mut self, layers: &[usize]) -> Result<(), BridgeError> {
        for index in 0..self.ids.max_layers {
            let id = self.ids.layer_id(index);
            if !self.page().contains(&id) {
                continue;
            }

            let visibility = if layers.contains(&index) { VISIBLE } else { HIDDEN };
            self.page_mut().set_attribute(&id, "visibility", visibility)?;
        }
        Ok(())
    }

    pub fn layer_on(&mut self, layer: usize) -> Result<(), BridgeError> {
        let id = self.ids.layer_id(layer);
        self.page_mut().set_attribute(&id, "visibility", VISIBLE)
    }

    pub fn layer_off(&mut self, layer: usize) -> Result<(), BridgeError> {
        let id = self.ids.layer_id(layer);
        self.page_mut().set_attribute(&id, "visibility", HIDDEN)
    }

    /// Layers currently marked visible, in index order
    pub fn visible_layers(&self) -> Vec<usize> {
        (0..self.ids.max_layers)
            .filter(|index| {
                self.page()
                    .get_attribute(&self.ids.layer_id(*index), "visibility")
                    .ok()
                    .flatten()
                    == Some(VISIBLE)
            })
            .collect()
    }

    pub fn spinner_state(&self) -> Result<SpinnerState, BridgeError> {
        let display = self.page().style_property(&self.ids.spinner_id, "display")?;
        Ok(if display == "block" {
            SpinnerState::Loading
        } else {
            SpinnerState::Idle
        })
    }

    pub fn set_spinner(&mut self, state: SpinnerState) -> Result<(), BridgeError> {
        let spinner_id = self.ids.spinner_id.clone();
        self.page_mut()
            .set_style_property(&spinner_id, "display", state.display())
    }

    /// `display: block` becomes `display: none` and anything else becomes `display: block`
    pub fn toggle_spinner(&mut self) -> Result<SpinnerState, BridgeError> {
        let next = match self.spinner_state()? {
            SpinnerState::Loading => SpinnerState::Idle,
            SpinnerState::Idle => SpinnerState::Loading,
        };
        self.set_spinner(next)?;
        Ok(next)
    }

    pub fn select_url_tab(&mut self) -> Result<(), BridgeError> {
        let url_tab_id = self.ids.url_tab_id.clone();
        self.page_mut().set_checked(&url_tab_id, true)
    }

    /// Render the keymap named by `fileurl` in the query, if there is one.
    ///
    /// An empty `fileurl=` counts as absent. Returns whether a keymap was requested.
    pub fn start_from_query(&mut self, query: &str) -> Result<bool, BridgeError> {
        let Some(encoded) = get_query_variable(query, FILE_URL_QUERY).filter(|v| !v.is_empty())
        else {
            return Ok(false);
        };

        let url = decode_uri_component(encoded)?;
        self.render_from_url(&url)?;
        Ok(true)
    }

    /// Switch to the layer named by `layer` in the query. Returns the layer when one was given,
    /// an empty `layer=` is ignored.
    pub fn apply_layer_query(&mut self, query: &str) -> Result<Option<usize>, BridgeError> {
        let Some(value) = get_query_variable(query, LAYER_QUERY).filter(|v| !v.is_empty()) else {
            return Ok(None);
        };

        let Ok(layer) = value.parse::<usize>() else {
            return Err(BridgeError::config_error(format!(
                "Layer '{value}' is not a layer number"
            )));
        };

        self.onlylayer(layer)?;
        Ok(Some(layer))
    }

    pub fn into_client(self) -> KeymapClient {
        self.client
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
