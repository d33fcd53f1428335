//! Shared helpers for CLI commands.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use mixgraph_config::{GraphConfig, default_config_path};
use mixgraph_core::CommandQueue;

/// Where a loaded configuration came from.
pub enum ConfigSource {
    /// Read from this file.
    File(PathBuf),
    /// No file given and none at the default path.
    Defaults,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => f.write_str("built-in defaults"),
        }
    }
}

/// Loads `path`, or the default config file if present, or the defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<(GraphConfig, ConfigSource)> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = default_config_path();
            if !default.exists() {
                return Ok((GraphConfig::default(), ConfigSource::Defaults));
            }
            default
        }
    };
    let config = GraphConfig::load(&path)
        .with_context(|| format!("cannot load config {}", path.display()))?;
    Ok((config, ConfigSource::File(path)))
}

/// Blocks until every action queued before this call has run.
pub fn sync(queue: &CommandQueue) -> anyhow::Result<()> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    queue.schedule(move || {
        tx.send(()).ok();
        Ok(())
    });
    rx.recv_timeout(Duration::from_secs(5))
        .context("audio thread did not respond")
}
