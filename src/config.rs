// Host-binary configuration: tick period, accepted line length, and the
// startup-store location. Optional for library embedders - `default()`
// reproduces the literal scheduler behavior with no config file at all.

use crate::error::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub tick_period_ms: u64,
    pub line_buffer_size: usize,
    pub startup_store_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> RuntimeConfig {
        RuntimeConfig {
            tick_period_ms: 10,
            line_buffer_size: 1024,
            startup_store_path: None,
        }
    }
}

impl RuntimeConfig {
    /// Load from a TOML file at `path`, falling back to `default()` when
    /// the file does not exist. A present-but-malformed file is an error.
    pub fn load(path: &Path) -> Result<RuntimeConfig> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let config: RuntimeConfig = toml::from_str(&text)
                    .map_err(|e| crate::error::RuntimeError::MalformedControl(e.to_string()))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(e) => Err(e.into()),
        }
    }
}
