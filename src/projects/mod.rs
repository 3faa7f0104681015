//! Command-line tooling around the viewer: the CLI and the hot reloading dev server.

pub mod cli;
pub mod dev_server;
