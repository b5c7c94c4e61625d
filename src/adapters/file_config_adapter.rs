//! INI file configuration adapter.
//!
//! Values may be overridden from the environment: with prefix `SVEA`, the
//! variable `SVEA_SIGNAL_WINDOW_START` replaces `[signal] window_start`.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::collections::HashMap;
use std::path::Path;

pub const ENV_PREFIX: &str = "SVEA";

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
    prefix: String,
    overrides: HashMap<String, String>,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self::wrap(config))
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self::wrap(config))
    }

    fn wrap(config: Ini) -> Self {
        Self {
            config,
            prefix: ENV_PREFIX.to_string(),
            overrides: HashMap::new(),
        }
    }

    /// Snapshot the process environment's `SVEA_*` variables.
    pub fn with_env_overrides(self) -> Self {
        let prefix = format!("{}_", ENV_PREFIX);
        self.with_overrides(std::env::vars().filter(|(k, _)| k.starts_with(&prefix)))
    }

    /// Explicit overrides, keyed like environment variables.
    pub fn with_overrides<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.overrides
            .extend(vars.into_iter().map(|(k, v)| (k.to_uppercase(), v)));
        self
    }

    fn override_key(&self, section: &str, key: &str) -> String {
        format!("{}_{}_{}", self.prefix, section, key).to_uppercase()
    }

    fn lookup(&self, section: &str, key: &str) -> Option<String> {
        self.overrides
            .get(&self.override_key(section, key))
            .cloned()
            .or_else(|| self.config.get(section, key))
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Some(true),
            "false" | "no" | "0" | "off" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.lookup(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.lookup(section, key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.lookup(section, key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.lookup(section, key)
            .as_deref()
            .and_then(Self::parse_bool)
            .unwrap_or(default)
    }
}
