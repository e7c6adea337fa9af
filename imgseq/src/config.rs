use std::path::Path;
use std::sync::OnceLock;

use serde::Deserialize;

use crate::Error;

/// Environment variable that points to a TOML config file
pub const CONFIG_ENV: &str = "IMGSEQ_CONFIG";

static CONFIG: OnceLock<Config> = OnceLock::new();

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub delay: DelayPolicy,
}

/// Rules for turning container delays into milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DelayPolicy {
    /// Smallest delay an animated frame gets, never less than 1
    pub minimum_ms: u32,
    /// Delay for frames whose container does not specify one
    pub unspecified_ms: u32,
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self {
            minimum_ms: 1,
            unspecified_ms: 100,
        }
    }
}

impl Config {
    /// Process wide config
    ///
    /// Loaded once from the file in `IMGSEQ_CONFIG` if set. A file that can't
    /// be loaded is reported and the defaults are used instead.
    pub fn cached() -> &'static Self {
        CONFIG.get_or_init(|| match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load_file(Path::new(&path)).unwrap_or_else(|err| {
                tracing::warn!("Failed to load config file {path:?}: {err}");
                Self::default()
            }),
            None => Self::default(),
        })
    }

    pub fn from_toml(data: &str) -> Result<Self, Error> {
        Ok(toml::from_str(data)?)
    }

    pub fn load_file(path: &Path) -> Result<Self, Error> {
        let data = std::fs::read_to_string(path).map_err(|err| Error::io(err, path.display()))?;
        Self::from_toml(&data)
    }
}
