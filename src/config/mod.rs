//! Instance configuration.
//!
//! The configuration file declares the desired state of one or more
//! instances. Connection settings live at the top level; everything the
//! sync pass manages lives under `settings`.
//!
//! ```yaml
//! hostname: "sonarr.example.com"
//! port: 8989
//! protocol: "http"
//! settings:
//!   tags:
//!     definitions:
//!       - "anime"
//! ```
//!
//! Multiple instances are declared under `instances`; each entry is a
//! complete instance configuration of its own, and its hostname defaults
//! to the instance name:
//!
//! ```yaml
//! instances:
//!   sonarr-tv:
//!     settings: ...
//!   sonarr-anime:
//!     settings: ...
//! ```

pub mod settings;

use crate::api::ArrClient;
use crate::error::{Error, Result};
use crate::secrets::Secrets;
use serde::{Deserialize, Serialize};
use settings::Settings;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// Name used for the implicit instance when no `instances` are declared.
pub const DEFAULT_INSTANCE: &str = "sonarr";

/// Communication protocol used to reach an instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Plain HTTP
    #[default]
    Http,
    /// HTTP over TLS
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Https => write!(f, "https"),
        }
    }
}

/// Configuration for one instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Hostname of the instance. Defaults to the instance name.
    pub hostname: Option<String>,

    /// Port number of the instance
    pub port: u16,

    /// Communication protocol
    pub protocol: Protocol,

    /// URL path the instance API is served under, when behind a reverse
    /// proxy. Normalized to a single leading slash.
    pub url_base: Option<String>,

    /// API key. When unset, the key is retrieved automatically, which
    /// only works while the instance has authentication disabled.
    pub api_key: Option<String>,

    /// Application settings to converge the instance to
    pub settings: Settings,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            hostname: None,
            port: 8989,
            protocol: Protocol::Http,
            url_base: None,
            api_key: None,
            settings: Settings::default(),
        }
    }
}

impl InstanceConfig {
    /// Hostname to connect to, falling back to the instance name.
    pub fn resolved_hostname(&self, instance_name: &str) -> String {
        self.hostname
            .clone()
            .unwrap_or_else(|| instance_name.to_string())
    }

    /// Normalize fields and fail fast on invalid declarations, before any
    /// remote call is made.
    pub fn validate(&mut self) -> Result<()> {
        self.url_base = normalize_url_base(self.url_base.as_deref());
        self.settings.validate()
    }

    /// Reconstruct the configuration of a live instance from its API.
    pub fn from_remote(secrets: &Secrets, api: &ArrClient) -> Result<Self> {
        Ok(Self {
            hostname: Some(secrets.hostname.clone()),
            port: secrets.port,
            protocol: secrets.protocol,
            url_base: secrets.url_base.clone(),
            api_key: Some(secrets.api_key.clone()),
            settings: Settings::from_remote(api)?,
        })
    }
}

/// Top-level configuration: one implicit instance, or a map of named ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The implicit single instance
    #[serde(flatten)]
    pub instance: InstanceConfig,

    /// Named per-instance configurations. When non-empty, the implicit
    /// instance is ignored and each entry stands on its own.
    pub instances: BTreeMap<String, InstanceConfig>,
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read '{}': {e}", path.display()))
        })?;
        let mut config: Self = serde_yaml_ng::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Normalize and fail fast on invalid declarations.
    pub fn validate(&mut self) -> Result<()> {
        self.instance.validate()?;
        for (name, instance) in &mut self.instances {
            instance
                .validate()
                .map_err(|e| Error::Config(format!("instances.{name}: {e}")))?;
        }
        Ok(())
    }

    /// The instances this configuration targets, in deterministic order.
    pub fn target_instances(&self) -> Vec<(String, &InstanceConfig)> {
        if self.instances.is_empty() {
            vec![(DEFAULT_INSTANCE.to_string(), &self.instance)]
        } else {
            self.instances
                .iter()
                .map(|(name, instance)| (name.clone(), instance))
                .collect()
        }
    }
}

/// Reduce a URL base to `/path` form, or `None` when it is empty.
fn normalize_url_base(url_base: Option<&str>) -> Option<String> {
    let trimmed = url_base.map(|v| v.trim_matches('/')).unwrap_or("");
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("/{trimmed}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_base_normalization() {
        assert_eq!(normalize_url_base(None), None);
        assert_eq!(normalize_url_base(Some("")), None);
        assert_eq!(normalize_url_base(Some("/")), None);
        assert_eq!(normalize_url_base(Some("sonarr")), Some("/sonarr".to_string()));
        assert_eq!(normalize_url_base(Some("/sonarr/")), Some("/sonarr".to_string()));
    }

    #[test]
    fn test_parse_single_instance() {
        let yaml = r#"
hostname: "tv.example.com"
api_key: "abc"
settings:
  tags:
    definitions:
      - "anime"
"#;
        let mut config: Config = serde_yaml_ng::from_str(yaml).unwrap();
        config.validate().unwrap();
        let targets = config.target_instances();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].0, DEFAULT_INSTANCE);
        assert_eq!(targets[0].1.resolved_hostname("sonarr"), "tv.example.com");
        assert!(targets[0].1.settings.tags.definitions.contains("anime"));
    }

    #[test]
    fn test_parse_named_instances_default_hostname() {
        let yaml = r#"
instances:
  sonarr-anime:
    port: 8990
  sonarr-tv: {}
"#;
        let mut config: Config = serde_yaml_ng::from_str(yaml).unwrap();
        config.validate().unwrap();
        let targets = config.target_instances();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].0, "sonarr-anime");
        assert_eq!(targets[0].1.resolved_hostname("sonarr-anime"), "sonarr-anime");
        assert_eq!(targets[0].1.port, 8990);
    }
}
