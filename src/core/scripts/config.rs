//! Script manager configuration
//!
//! Loaded from a JSON file (all fields optional) and then overridden by the
//! caller, CLI flags first.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{ScriptError, ScriptResult};
use super::metadata::DEFAULT_DESCRIPTION;
use super::registry::DEFAULT_EXTENSION;

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE: &str = ".script_manager.json";

/// Runtime configuration of a [`ScriptManager`](super::ScriptManager)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManagerConfig {
    /// Folder scanned for scripts
    pub scripts_dir: PathBuf,
    /// Script file extension, without the dot
    pub extension: String,
    /// Quiescence window before a change triggers a reload
    pub debounce_ms: u64,
    /// Description used when a script declares none
    pub description_fallback: String,
    /// Watch the scripts folder for changes
    pub watch: bool,
    /// Locale override; when unset the host is asked
    pub locale: Option<String>,
}

/// `<config dir>/script-manager/scripts`, or `./scripts` without a config dir
pub fn default_scripts_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("script-manager").join("scripts"))
        .unwrap_or_else(|| PathBuf::from("scripts"))
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            scripts_dir: default_scripts_dir(),
            extension: DEFAULT_EXTENSION.to_string(),
            debounce_ms: 500,
            description_fallback: DEFAULT_DESCRIPTION.to_string(),
            watch: true,
            locale: None,
        }
    }
}

impl ManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON config file. Missing fields take their defaults; unknown
    /// fields and malformed JSON are rejected.
    pub fn from_file(path: &Path) -> ScriptResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> ScriptResult<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ScriptError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ScriptResult<()> {
        if self.extension.trim_start_matches('.').is_empty() {
            return Err(ScriptError::InvalidConfig("extension must not be empty".into()));
        }
        Ok(())
    }

    pub fn with_scripts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scripts_dir = dir.into();
        self
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_description_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.description_fallback = fallback.into();
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
