//! Download clients section.
//!
//! Download clients follow the same polymorphic shape as indexers: shared
//! top-level attributes plus implementation-specific parameters in the
//! resource's field list. Indexers route releases to these clients, so
//! this section updates before indexers and deletes after them.

use super::util::{create_resource, int_enum_entry, tags_entry, to_attrs, update_resource};
use crate::api::{ArrClient, attr_str};
use crate::error::{Error, Result};
use reconcile::{
    Attrs, CollectionOps, DiagnosticSink, RemoteMapEntry, delete_collection, local_attrs,
    update_collection,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Attributes shared by every download client implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadClientBase {
    /// Whether the instance may send requests to this client
    pub enable: bool,
    /// Remove completed downloads from the client history
    pub remove_completed_downloads: bool,
    /// Remove failed downloads from the client history
    pub remove_failed_downloads: bool,
    /// Client priority; lower values are preferred
    pub priority: u32,
    /// Tags controlling which series use this client
    pub tags: BTreeSet<String>,
}

impl Default for DownloadClientBase {
    fn default() -> Self {
        Self {
            enable: true,
            remove_completed_downloads: true,
            remove_failed_downloads: true,
            priority: 1,
            tags: BTreeSet::new(),
        }
    }
}

fn base_map(tag_ids: &BTreeMap<String, i64>) -> Vec<RemoteMapEntry> {
    vec![
        RemoteMapEntry::new("enable", "enable"),
        RemoteMapEntry::new("remove_completed_downloads", "removeCompletedDownloads"),
        RemoteMapEntry::new("remove_failed_downloads", "removeFailedDownloads"),
        RemoteMapEntry::new("priority", "priority"),
        tags_entry(tag_ids.clone()),
    ]
}

/// Queue priority for torrent clients.
const TORRENT_PRIORITY: &[(&str, i64)] = &[("last", 0), ("first", 1)];

/// Initial torrent state for qBittorrent.
const QBITTORRENT_STATE: &[(&str, i64)] = &[("start", 0), ("pause", 1), ("force_start", 2)];

/// Queue priority for SABnzbd.
const SABNZBD_PRIORITY: &[(&str, i64)] = &[
    ("default", -100),
    ("paused", -2),
    ("low", -1),
    ("normal", 0),
    ("high", 1),
    ("force", 2),
];

/// Transmission download client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmissionDownloadClient {
    #[serde(flatten)]
    pub base: DownloadClientBase,
    /// Transmission host
    pub host: String,
    /// Transmission RPC port
    pub port: u16,
    /// Connect over HTTPS
    pub use_ssl: bool,
    /// RPC URL base
    pub url_base: String,
    /// RPC username
    pub username: Option<String>,
    /// RPC password
    pub password: Option<String>,
    /// Category to attach to downloads
    pub category: Option<String>,
    /// Download directory, overrides the category
    pub directory: Option<String>,
    /// Queue priority for recently aired episodes
    pub recent_priority: String,
    /// Queue priority for older episodes
    pub older_priority: String,
    /// Add torrents paused
    pub add_paused: bool,
}

impl Default for TransmissionDownloadClient {
    fn default() -> Self {
        Self {
            base: DownloadClientBase::default(),
            host: "localhost".to_string(),
            port: 9091,
            use_ssl: false,
            url_base: "/transmission/".to_string(),
            username: None,
            password: None,
            category: None,
            directory: None,
            recent_priority: "last".to_string(),
            older_priority: "last".to_string(),
            add_paused: false,
        }
    }
}

fn transmission_map() -> Vec<RemoteMapEntry> {
    vec![
        RemoteMapEntry::new("host", "host").field(),
        RemoteMapEntry::new("port", "port").field(),
        RemoteMapEntry::new("use_ssl", "useSsl").field(),
        RemoteMapEntry::new("url_base", "urlBase").field(),
        RemoteMapEntry::new("username", "username").field().field_default(Value::Null),
        RemoteMapEntry::new("password", "password").field().field_default(Value::Null),
        RemoteMapEntry::new("category", "tvCategory").field().field_default(Value::Null),
        RemoteMapEntry::new("directory", "tvDirectory").field().field_default(Value::Null),
        int_enum_entry("recent_priority", "recentTvPriority", TORRENT_PRIORITY).field(),
        int_enum_entry("older_priority", "olderTvPriority", TORRENT_PRIORITY).field(),
        RemoteMapEntry::new("add_paused", "addPaused").field(),
    ]
}

/// qBittorrent download client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QbittorrentDownloadClient {
    #[serde(flatten)]
    pub base: DownloadClientBase,
    /// qBittorrent host
    pub host: String,
    /// Web UI port
    pub port: u16,
    /// Connect over HTTPS
    pub use_ssl: bool,
    /// Web UI URL base
    pub url_base: Option<String>,
    /// Web UI username
    pub username: Option<String>,
    /// Web UI password
    pub password: Option<String>,
    /// Category to attach to downloads
    pub category: String,
    /// Queue priority for recently aired episodes
    pub recent_priority: String,
    /// Queue priority for older episodes
    pub older_priority: String,
    /// State to add torrents in
    pub initial_state: String,
}

impl Default for QbittorrentDownloadClient {
    fn default() -> Self {
        Self {
            base: DownloadClientBase::default(),
            host: "localhost".to_string(),
            port: 8080,
            use_ssl: false,
            url_base: None,
            username: None,
            password: None,
            category: "tv-sonarr".to_string(),
            recent_priority: "last".to_string(),
            older_priority: "last".to_string(),
            initial_state: "start".to_string(),
        }
    }
}

fn qbittorrent_map() -> Vec<RemoteMapEntry> {
    vec![
        RemoteMapEntry::new("host", "host").field(),
        RemoteMapEntry::new("port", "port").field(),
        RemoteMapEntry::new("use_ssl", "useSsl").field(),
        RemoteMapEntry::new("url_base", "urlBase").field().field_default(Value::Null),
        RemoteMapEntry::new("username", "username").field().field_default(Value::Null),
        RemoteMapEntry::new("password", "password").field().field_default(Value::Null),
        RemoteMapEntry::new("category", "tvCategory").field(),
        int_enum_entry("recent_priority", "recentTvPriority", TORRENT_PRIORITY).field(),
        int_enum_entry("older_priority", "olderTvPriority", TORRENT_PRIORITY).field(),
        int_enum_entry("initial_state", "initialState", QBITTORRENT_STATE).field(),
    ]
}

/// SABnzbd download client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SabnzbdDownloadClient {
    #[serde(flatten)]
    pub base: DownloadClientBase,
    /// SABnzbd host
    pub host: String,
    /// SABnzbd port
    pub port: u16,
    /// Connect over HTTPS
    pub use_ssl: bool,
    /// URL base
    pub url_base: Option<String>,
    /// SABnzbd API key
    pub api_key: Option<String>,
    /// Username, for API-keyless setups
    pub username: Option<String>,
    /// Password, for API-keyless setups
    pub password: Option<String>,
    /// Category to attach to downloads
    pub category: String,
    /// Queue priority for recently aired episodes
    pub recent_priority: String,
    /// Queue priority for older episodes
    pub older_priority: String,
}

impl Default for SabnzbdDownloadClient {
    fn default() -> Self {
        Self {
            base: DownloadClientBase::default(),
            host: "localhost".to_string(),
            port: 8080,
            use_ssl: false,
            url_base: None,
            api_key: None,
            username: None,
            password: None,
            category: "tv".to_string(),
            recent_priority: "default".to_string(),
            older_priority: "default".to_string(),
        }
    }
}

fn sabnzbd_map() -> Vec<RemoteMapEntry> {
    vec![
        RemoteMapEntry::new("host", "host").field(),
        RemoteMapEntry::new("port", "port").field(),
        RemoteMapEntry::new("use_ssl", "useSsl").field(),
        RemoteMapEntry::new("url_base", "urlBase").field().field_default(Value::Null),
        RemoteMapEntry::new("api_key", "apiKey").field().field_default(Value::Null),
        RemoteMapEntry::new("username", "username").field().field_default(Value::Null),
        RemoteMapEntry::new("password", "password").field().field_default(Value::Null),
        RemoteMapEntry::new("category", "tvCategory").field(),
        int_enum_entry("recent_priority", "recentTvPriority", SABNZBD_PRIORITY).field(),
        int_enum_entry("older_priority", "olderTvPriority", SABNZBD_PRIORITY).field(),
    ]
}

/// One download client declaration, dispatched on its `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadClient {
    Transmission(TransmissionDownloadClient),
    Qbittorrent(QbittorrentDownloadClient),
    Sabnzbd(SabnzbdDownloadClient),
}

impl DownloadClient {
    /// Remote implementation name for this client type.
    pub fn implementation(&self) -> &'static str {
        match self {
            Self::Transmission(_) => "Transmission",
            Self::Qbittorrent(_) => "QBittorrent",
            Self::Sabnzbd(_) => "Sabnzbd",
        }
    }

    /// Full mapping table for this client type.
    fn remote_map(&self, tag_ids: &BTreeMap<String, i64>) -> Vec<RemoteMapEntry> {
        let mut map = base_map(tag_ids);
        map.extend(match self {
            Self::Transmission(_) => transmission_map(),
            Self::Qbittorrent(_) => qbittorrent_map(),
            Self::Sabnzbd(_) => sabnzbd_map(),
        });
        map
    }

    /// Decode a remote download client resource, or `None` for
    /// implementations this tool does not model.
    fn from_remote(resource: &Attrs, tag_ids: &BTreeMap<String, i64>) -> Result<Option<Self>> {
        let implementation = attr_str(resource, "implementation")?;
        let mut map = base_map(tag_ids);
        let client = match implementation {
            "Transmission" => {
                map.extend(transmission_map());
                Self::Transmission(serde_json::from_value(Value::Object(
                    local_attrs(&map, resource).map_err(Error::from)?,
                ))?)
            }
            "QBittorrent" => {
                map.extend(qbittorrent_map());
                Self::Qbittorrent(serde_json::from_value(Value::Object(
                    local_attrs(&map, resource).map_err(Error::from)?,
                ))?)
            }
            "Sabnzbd" => {
                map.extend(sabnzbd_map());
                Self::Sabnzbd(serde_json::from_value(Value::Object(
                    local_attrs(&map, resource).map_err(Error::from)?,
                ))?)
            }
            other => {
                log::warn!(
                    "skipping remote download client with unsupported implementation '{other}'"
                );
                return Ok(None);
            }
        };
        Ok(Some(client))
    }
}

/// Download clients, keyed by client name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadClientsSettings {
    /// Delete remote download clients with no local declaration
    pub delete_unmanaged: bool,
    /// Managed download clients
    pub definitions: BTreeMap<String, DownloadClient>,
}

struct DownloadClientOps<'a> {
    api: &'a ArrClient,
    tag_ids: BTreeMap<String, i64>,
    schemas: Vec<Attrs>,
    api_clients: BTreeMap<String, Attrs>,
}

impl CollectionOps for DownloadClientOps<'_> {
    type Resource = DownloadClient;
    type Error = Error;

    fn create(&mut self, _tree: &str, key: &str, local: &DownloadClient) -> Result<()> {
        create_resource(
            self.api,
            "downloadclient",
            key,
            local.implementation(),
            &self.schemas,
            &local.remote_map(&self.tag_ids),
            &to_attrs(local)?,
        )
    }

    fn update(
        &mut self,
        tree: &str,
        key: &str,
        local: &DownloadClient,
        remote: &DownloadClient,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        let api_resource = self.api_clients.get(key).cloned().ok_or_else(|| {
            Error::UnexpectedResponse(format!("download client '{key}' vanished from the remote"))
        })?;
        update_resource(
            self.api,
            "downloadclient",
            tree,
            &local.remote_map(&self.tag_ids),
            &to_attrs(local)?,
            &to_attrs(remote)?,
            &api_resource,
            sink,
        )
    }

    fn delete(&mut self, _tree: &str, key: &str) -> Result<()> {
        let api_resource = self.api_clients.get(key).ok_or_else(|| {
            Error::UnexpectedResponse(format!("download client '{key}' vanished from the remote"))
        })?;
        self.api
            .resources("downloadclient")
            .delete(crate::api::resource_id(api_resource)?)
    }
}

impl DownloadClientsSettings {
    /// Read the download clients of a live instance. Implementations this
    /// tool does not model are skipped with a warning.
    pub fn from_remote(api: &ArrClient) -> Result<Self> {
        let tag_ids = api.tag_ids()?;
        let mut definitions = BTreeMap::new();
        for resource in api.resources("downloadclient").list()? {
            let name = attr_str(&resource, "name")?.to_string();
            if let Some(client) = DownloadClient::from_remote(&resource, &tag_ids)? {
                definitions.insert(name, client);
            }
        }
        Ok(Self {
            delete_unmanaged: false,
            definitions,
        })
    }

    fn ops<'a>(&self, api: &'a ArrClient) -> Result<DownloadClientOps<'a>> {
        let mut api_clients = BTreeMap::new();
        for resource in api.resources("downloadclient").list()? {
            api_clients
                .entry(attr_str(&resource, "name")?.to_string())
                .or_insert(resource);
        }
        Ok(DownloadClientOps {
            api,
            tag_ids: api.tag_ids()?,
            schemas: api.resources("downloadclient").schemas()?,
            api_clients,
        })
    }

    /// Create and update download clients.
    pub fn update_remote(
        &self,
        tree: &str,
        api: &ArrClient,
        remote: &Self,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        if self.definitions.is_empty() && remote.definitions.is_empty() {
            return Ok(false);
        }
        let mut ops = self.ops(api)?;
        let local: Vec<(String, &DownloadClient)> = self
            .definitions
            .iter()
            .map(|(name, client)| (name.clone(), client))
            .collect();
        let remote: Vec<(String, &DownloadClient)> = remote
            .definitions
            .iter()
            .map(|(name, client)| (name.clone(), client))
            .collect();
        update_collection(&mut ops, &format!("{tree}.definitions"), &local, &remote, sink)
    }

    /// Delete unmanaged download clients, when enabled.
    pub fn delete_remote(
        &self,
        tree: &str,
        api: &ArrClient,
        _remote: &Self,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        let mut ops = self.ops(api)?;
        let local_keys: BTreeSet<String> = self.definitions.keys().cloned().collect();
        let remote_keys: Vec<String> = ops.api_clients.keys().cloned().collect();
        delete_collection(
            &mut ops,
            &format!("{tree}.definitions"),
            &local_keys,
            &remote_keys,
            self.delete_unmanaged,
            sink,
        )
    }
}
