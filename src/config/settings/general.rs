//! General (host) settings section.
//!
//! The local model groups host configuration into small focused
//! sub-sections; remotely it is one flat `/config/host` document. Each
//! sub-section carries its own mapping table into that shared payload,
//! and one combined full-payload update is pushed when anything changed.

use super::util::{
    SingletonPart, csv_set_entry, optional_text_entry, str_enum_entry, to_attrs, update_singleton,
};
use crate::api::ArrClient;
use crate::error::{Error, Result};
use reconcile::{Attrs, DiagnosticSink, RemoteMapEntry, local_attrs};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

const AUTHENTICATION: &[(&str, &str)] =
    &[("none", "none"), ("basic", "basic"), ("forms", "forms")];

const PROXY_TYPE: &[(&str, &str)] = &[
    ("http", "http"),
    ("socks4", "socks4"),
    ("socks5", "socks5"),
];

const LOG_LEVEL: &[(&str, &str)] = &[("info", "info"), ("debug", "debug"), ("trace", "trace")];

const UPDATE_MECHANISM: &[(&str, &str)] = &[
    ("built_in", "builtIn"),
    ("script", "script"),
    ("docker", "docker"),
    ("external", "external"),
];

/// Connection binding and identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostGeneralSettings {
    /// Address the instance binds to
    pub bind_address: String,
    /// Port the instance listens on
    pub port: u16,
    /// URL base path, when behind a reverse proxy
    pub url_base: Option<String>,
    /// Display name of the instance
    pub instance_name: String,
}

impl Default for HostGeneralSettings {
    fn default() -> Self {
        Self {
            bind_address: "*".to_string(),
            port: 8989,
            url_base: None,
            instance_name: "Sonarr".to_string(),
        }
    }
}

fn host_map() -> Vec<RemoteMapEntry> {
    vec![
        RemoteMapEntry::new("bind_address", "bindAddress"),
        RemoteMapEntry::new("port", "port"),
        optional_text_entry("url_base", "urlBase"),
        RemoteMapEntry::new("instance_name", "instanceName"),
    ]
}

/// Web UI authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityGeneralSettings {
    /// Authentication method for the web UI and API
    pub authentication: String,
    /// Username, when authentication is enabled
    pub username: Option<String>,
    /// Password, when authentication is enabled
    pub password: Option<String>,
}

impl Default for SecurityGeneralSettings {
    fn default() -> Self {
        Self {
            authentication: "none".to_string(),
            username: None,
            password: None,
        }
    }
}

fn security_map() -> Vec<RemoteMapEntry> {
    vec![
        str_enum_entry("authentication", "authenticationMethod", AUTHENTICATION),
        RemoteMapEntry::new("username", "username").field_default(Value::Null),
        RemoteMapEntry::new("password", "password").field_default(Value::Null),
    ]
}

/// Outbound proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyGeneralSettings {
    /// Route outbound requests through a proxy
    pub enable: bool,
    /// Proxy protocol
    pub proxy_type: String,
    /// Proxy hostname
    pub hostname: Option<String>,
    /// Proxy port
    pub port: u16,
    /// Addresses that bypass the proxy
    pub ignored_addresses: BTreeSet<String>,
    /// Bypass the proxy for local addresses
    pub bypass_for_local_addresses: bool,
}

impl Default for ProxyGeneralSettings {
    fn default() -> Self {
        Self {
            enable: false,
            proxy_type: "http".to_string(),
            hostname: None,
            port: 8080,
            ignored_addresses: BTreeSet::new(),
            bypass_for_local_addresses: true,
        }
    }
}

fn proxy_map() -> Vec<RemoteMapEntry> {
    vec![
        RemoteMapEntry::new("enable", "proxyEnabled"),
        str_enum_entry("proxy_type", "proxyType", PROXY_TYPE),
        RemoteMapEntry::new("hostname", "proxyHostname").field_default(Value::Null),
        RemoteMapEntry::new("port", "proxyPort"),
        csv_set_entry("ignored_addresses", "proxyBypassFilter"),
        RemoteMapEntry::new("bypass_for_local_addresses", "proxyBypassLocalAddresses"),
    ]
}

/// Log verbosity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingGeneralSettings {
    /// Log level of the instance itself
    pub log_level: String,
}

impl Default for LoggingGeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

fn logging_map() -> Vec<RemoteMapEntry> {
    vec![str_enum_entry("log_level", "logLevel", LOG_LEVEL)]
}

/// Usage analytics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsGeneralSettings {
    /// Send anonymous usage and error information upstream
    pub send_anonymous_usage_data: bool,
}

impl Default for AnalyticsGeneralSettings {
    fn default() -> Self {
        Self {
            send_anonymous_usage_data: true,
        }
    }
}

fn analytics_map() -> Vec<RemoteMapEntry> {
    vec![RemoteMapEntry::new(
        "send_anonymous_usage_data",
        "analyticsEnabled",
    )]
}

/// Self-update behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdatesGeneralSettings {
    /// Release branch to follow
    pub branch: String,
    /// Install updates automatically
    pub automatic: bool,
    /// How updates are installed
    pub mechanism: String,
    /// Script invoked for `script` mechanism updates
    pub script_path: Option<String>,
}

impl Default for UpdatesGeneralSettings {
    fn default() -> Self {
        Self {
            branch: "main".to_string(),
            automatic: false,
            mechanism: "docker".to_string(),
            script_path: None,
        }
    }
}

fn updates_map() -> Vec<RemoteMapEntry> {
    vec![
        RemoteMapEntry::new("branch", "branch"),
        RemoteMapEntry::new("automatic", "updateAutomatically"),
        str_enum_entry("mechanism", "updateMechanism", UPDATE_MECHANISM),
        RemoteMapEntry::new("script_path", "updateScriptPath").field_default(Value::Null),
    ]
}

/// Database backups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupGeneralSettings {
    /// Folder backups are written to, relative to the app data directory
    pub folder: String,
    /// Interval between backups, in days
    pub interval: u32,
    /// Days backups are retained for
    pub retention: u32,
}

impl Default for BackupGeneralSettings {
    fn default() -> Self {
        Self {
            folder: "Backups".to_string(),
            interval: 7,
            retention: 28,
        }
    }
}

fn backup_map() -> Vec<RemoteMapEntry> {
    vec![
        RemoteMapEntry::new("folder", "backupFolder"),
        RemoteMapEntry::new("interval", "backupInterval"),
        RemoteMapEntry::new("retention", "backupRetention"),
    ]
}

/// General instance settings, grouped by concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    pub host: HostGeneralSettings,
    pub security: SecurityGeneralSettings,
    pub proxy: ProxyGeneralSettings,
    pub logging: LoggingGeneralSettings,
    pub analytics: AnalyticsGeneralSettings,
    pub updates: UpdatesGeneralSettings,
    pub backup: BackupGeneralSettings,
}

impl GeneralSettings {
    /// Read the general settings of a live instance.
    pub fn from_remote(api: &ArrClient) -> Result<Self> {
        let attrs = api.config_get("host")?;
        let decode = |map: Vec<RemoteMapEntry>| -> Result<Attrs> {
            local_attrs(&map, &attrs).map_err(Error::from)
        };
        Ok(Self {
            host: serde_json::from_value(Value::Object(decode(host_map())?))?,
            security: serde_json::from_value(Value::Object(decode(security_map())?))?,
            proxy: serde_json::from_value(Value::Object(decode(proxy_map())?))?,
            logging: serde_json::from_value(Value::Object(decode(logging_map())?))?,
            analytics: serde_json::from_value(Value::Object(decode(analytics_map())?))?,
            updates: serde_json::from_value(Value::Object(decode(updates_map())?))?,
            backup: serde_json::from_value(Value::Object(decode(backup_map())?))?,
        })
    }

    /// Diff every sub-section and push one combined update. Every
    /// sub-section runs even after a change is found.
    pub fn update_remote(
        &self,
        tree: &str,
        api: &ArrClient,
        remote: &Self,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        let parts = vec![
            SingletonPart {
                tree: format!("{tree}.host"),
                map: host_map(),
                local: to_attrs(&self.host)?,
                remote: to_attrs(&remote.host)?,
            },
            SingletonPart {
                tree: format!("{tree}.security"),
                map: security_map(),
                local: to_attrs(&self.security)?,
                remote: to_attrs(&remote.security)?,
            },
            SingletonPart {
                tree: format!("{tree}.proxy"),
                map: proxy_map(),
                local: to_attrs(&self.proxy)?,
                remote: to_attrs(&remote.proxy)?,
            },
            SingletonPart {
                tree: format!("{tree}.logging"),
                map: logging_map(),
                local: to_attrs(&self.logging)?,
                remote: to_attrs(&remote.logging)?,
            },
            SingletonPart {
                tree: format!("{tree}.analytics"),
                map: analytics_map(),
                local: to_attrs(&self.analytics)?,
                remote: to_attrs(&remote.analytics)?,
            },
            SingletonPart {
                tree: format!("{tree}.updates"),
                map: updates_map(),
                local: to_attrs(&self.updates)?,
                remote: to_attrs(&remote.updates)?,
            },
            SingletonPart {
                tree: format!("{tree}.backup"),
                map: backup_map(),
                local: to_attrs(&self.backup)?,
                remote: to_attrs(&remote.backup)?,
            },
        ];
        update_singleton(api, "host", &parts, sink)
    }

    /// Singleton settings have nothing to delete.
    pub fn delete_remote(
        &self,
        _tree: &str,
        _api: &ArrClient,
        _remote: &Self,
        _sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        Ok(false)
    }
}
