//! Configuration du client SOAP.
//!
//! Values come from a YAML document, then from `PMOSOAP__*` environment
//! variables:
//!
//! ```yaml
//! timeout_secs: 10
//! body_excerpt_len: 256
//! ```

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::transport::DEFAULT_HTTP_TIMEOUT;

const ENV_PREFIX: &str = "PMOSOAP__";

const DEFAULT_BODY_EXCERPT_LEN: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Global timeout of one HTTP round trip, in seconds
    pub timeout_secs: u64,

    /// Characters of an error body kept in error messages
    pub body_excerpt_len: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_HTTP_TIMEOUT.as_secs(),
            body_excerpt_len: DEFAULT_BODY_EXCERPT_LEN,
        }
    }
}

impl ClientConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).context("Failed to parse SOAP client configuration")
    }

    /// Loads a YAML file. Missing keys keep their default value.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading SOAP client configuration");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&content)
    }

    /// Applies `PMOSOAP__TIMEOUT_SECS` and `PMOSOAP__BODY_EXCERPT_LEN`.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.apply_overrides(std::env::vars())
    }

    /// Applies `PMOSOAP__*` overrides from `vars`; other keys are ignored.
    pub fn apply_overrides<I, K, V>(mut self, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref().trim();
            match name.to_ascii_lowercase().as_str() {
                "timeout_secs" => self.timeout_secs = parse_override(name, value)?,
                "body_excerpt_len" => self.body_excerpt_len = parse_override(name, value)?,
                _ => continue,
            }
            info!(key = %key.as_ref(), value, "Configuration override from environment");
        }
        Ok(self)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parse_override<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("Invalid value {value:?} for {ENV_PREFIX}{name}"))
}
