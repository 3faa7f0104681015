use crate::host_bridge::bridge_errors::BridgeError;
use crate::timer_log;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Where module binaries and keymap sources come from
pub trait Fetcher {
    fn fetch_bytes(&self, location: &str) -> Result<Vec<u8>, BridgeError>;

    /// Keymap sources are decoded leniently, invalid bytes become U+FFFD
    fn fetch_text(&self, location: &str) -> Result<String, BridgeError> {
        let bytes = self.fetch_bytes(location)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

pub fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Fetches `http(s)://` locations over the network and everything else from disk.
///
/// Relative paths are resolved against `base_dir`.
pub struct SourceFetcher {
    client: reqwest::blocking::Client,
    base_dir: PathBuf,
}

impl SourceFetcher {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, BridgeError> {
        // No timeout, a slow keymap host just keeps the spinner going
        let client = reqwest::blocking::Client::builder()
            .timeout(None)
            .build()
            .map_err(|e| {
                BridgeError::network_error("", format!("Could not create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_dir: base_dir.into(),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn resolve_path(&self, location: &str) -> PathBuf {
        let path = Path::new(location.strip_prefix("file://").unwrap_or(location));
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, BridgeError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| BridgeError::network_error(url, format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(BridgeError::network_error(
                url,
                format!("Server answered {status}"),
            ));
        }

        let body = response
            .bytes()
            .map_err(|e| BridgeError::network_error(url, format!("Could not read response: {e}")))?;
        Ok(body.to_vec())
    }
}

impl Fetcher for SourceFetcher {
    fn fetch_bytes(&self, location: &str) -> Result<Vec<u8>, BridgeError> {
        let start = Instant::now();

        let bytes = if is_remote(location) {
            self.fetch_remote(location)?
        } else {
            let path = self.resolve_path(location);
            std::fs::read(&path)
                .map_err(|e| BridgeError::file_error(&path, format!("Could not read file: {e}")))?
        };

        timer_log!(start, "Fetched source in: ");
        Ok(bytes)
    }
}

#[cfg(test)]
#[path = "tests/fetch_tests.rs"]
mod tests;
