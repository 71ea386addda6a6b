//! In-memory Sonarr fake for tests.
//!
//! Implements [`Transport`] over a mutable snapshot of one instance:
//! collections keyed by endpoint, implementation schema catalogs, and the
//! singleton `config/*` documents. Every request is recorded so tests can
//! assert on call order.

use crate::api::Transport;
use crate::error::{Error, Result};
use reconcile::Attrs;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Default)]
struct FakeState {
    collections: BTreeMap<String, Vec<Attrs>>,
    schemas: BTreeMap<String, Vec<Value>>,
    configs: BTreeMap<String, Attrs>,
    calls: Vec<String>,
    initialize_api_key: Option<String>,
    initialize_unauthorized: bool,
}

/// A fake instance reachable through the [`Transport`] trait.
pub struct FakeTransport {
    state: RefCell<FakeState>,
}

impl FakeTransport {
    /// An empty instance: no collections, no schemas, no configs.
    pub fn new() -> Self {
        Self {
            state: RefCell::new(FakeState::default()),
        }
    }

    /// A plausible freshly-installed instance: default singleton configs,
    /// a quality definition catalog, the three metadata providers, the
    /// usual indexer and download client schemas, and empty collections.
    pub fn sonarr() -> Self {
        let fake = Self::new();
        fake.seed_config("mediamanagement", default_media_management());
        fake.seed_config("host", default_host());
        fake.seed_config("ui", default_ui());
        fake.seed_collection("qualitydefinition", default_quality_definitions());
        fake.seed_collection("metadata", default_metadata());
        fake.seed_collection("delayprofile", default_delay_profiles());
        fake.seed_schemas("indexer", default_indexer_schemas());
        fake.seed_schemas("downloadclient", default_download_client_schemas());
        fake
    }

    /// Replace one collection wholesale.
    pub fn seed_collection(&self, endpoint: &str, resources: Vec<Value>) {
        let resources = resources
            .into_iter()
            .map(|r| r.as_object().cloned().expect("seed resource object"))
            .collect();
        self.state
            .borrow_mut()
            .collections
            .insert(endpoint.to_string(), resources);
    }

    /// Replace one schema catalog.
    pub fn seed_schemas(&self, endpoint: &str, schemas: Vec<Value>) {
        self.state
            .borrow_mut()
            .schemas
            .insert(endpoint.to_string(), schemas);
    }

    /// Replace one singleton config document.
    pub fn seed_config(&self, slug: &str, config: Value) {
        self.state.borrow_mut().configs.insert(
            slug.to_string(),
            config.as_object().cloned().expect("seed config object"),
        );
    }

    /// What `initialize.json` reports as the API key.
    pub fn set_initialize_api_key(&self, key: &str) {
        self.state.borrow_mut().initialize_api_key = Some(key.to_string());
    }

    /// Make `initialize.json` answer 401.
    pub fn set_initialize_unauthorized(&self) {
        self.state.borrow_mut().initialize_unauthorized = true;
    }

    /// Requests issued so far, as `METHOD path` strings in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    /// Current contents of a collection.
    pub fn collection(&self, endpoint: &str) -> Vec<Attrs> {
        self.state
            .borrow()
            .collections
            .get(endpoint)
            .cloned()
            .unwrap_or_default()
    }

    /// Current contents of a singleton config document.
    pub fn config(&self, slug: &str) -> Attrs {
        self.state
            .borrow()
            .configs
            .get(slug)
            .cloned()
            .unwrap_or_default()
    }

    fn record(&self, method: &str, path: &str) {
        self.state
            .borrow_mut()
            .calls
            .push(format!("{method} {path}"));
    }

    fn next_id(state: &FakeState) -> i64 {
        state
            .collections
            .values()
            .flatten()
            .filter_map(|r| r.get("id").and_then(Value::as_i64))
            .max()
            .unwrap_or(0)
            + 1
    }
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `/api/v3/{endpoint}` or `/api/v3/{endpoint}/{tail}`.
fn split_api_path(path: &str) -> Option<(&str, Option<&str>)> {
    let rest = path.strip_prefix("/api/v3/")?;
    match rest.split_once('/') {
        Some((endpoint, tail)) => Some((endpoint, Some(tail))),
        None => Some((rest, None)),
    }
}

impl Transport for FakeTransport {
    fn get(&self, path: &str) -> Result<Value> {
        self.record("GET", path);
        let state = self.state.borrow();
        if path == "/initialize.json" {
            if state.initialize_unauthorized {
                return Err(Error::Api {
                    status: 401,
                    message: format!("GET {path}"),
                });
            }
            let key = state
                .initialize_api_key
                .clone()
                .unwrap_or_else(|| "fake-api-key".to_string());
            return Ok(json!({"apiKey": key}));
        }
        if path == "/api/v3/system/status" {
            return Ok(json!({"version": "4.0.0.0", "appName": "Sonarr"}));
        }
        match split_api_path(path) {
            Some(("config", Some(slug))) => state
                .configs
                .get(slug)
                .map(|c| Value::Object(c.clone()))
                .ok_or_else(|| Error::Api {
                    status: 404,
                    message: format!("GET {path}"),
                }),
            Some((endpoint, Some("schema"))) => Ok(Value::Array(
                state.schemas.get(endpoint).cloned().unwrap_or_default(),
            )),
            Some((endpoint, None)) => Ok(Value::Array(
                state
                    .collections
                    .get(endpoint)
                    .map(|rs| rs.iter().cloned().map(Value::Object).collect())
                    .unwrap_or_default(),
            )),
            _ => Err(Error::Api {
                status: 404,
                message: format!("GET {path}"),
            }),
        }
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.record("POST", path);
        let mut state = self.state.borrow_mut();
        let Some((endpoint, None)) = split_api_path(path) else {
            return Err(Error::Api {
                status: 404,
                message: format!("POST {path}"),
            });
        };
        let mut resource = body.as_object().cloned().unwrap_or_default();
        let id = Self::next_id(&state);
        resource.insert("id".to_string(), Value::from(id));
        let endpoint = endpoint.to_string();
        state
            .collections
            .entry(endpoint)
            .or_default()
            .push(resource.clone());
        Ok(Value::Object(resource))
    }

    fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.record("PUT", path);
        let mut state = self.state.borrow_mut();
        let resource = body.as_object().cloned().unwrap_or_default();
        match split_api_path(path) {
            Some(("config", Some(tail))) => {
                let slug = tail.split('/').next().unwrap_or(tail);
                state.configs.insert(slug.to_string(), resource.clone());
                Ok(Value::Object(resource))
            }
            Some((endpoint, Some(id))) => {
                let id: i64 = id.parse().map_err(|_| Error::Api {
                    status: 404,
                    message: format!("PUT {path}"),
                })?;
                let endpoint = endpoint.to_string();
                let collection = state.collections.entry(endpoint).or_default();
                match collection
                    .iter_mut()
                    .find(|r| r.get("id").and_then(Value::as_i64) == Some(id))
                {
                    Some(existing) => {
                        *existing = resource;
                        existing.insert("id".to_string(), Value::from(id));
                        Ok(Value::Object(existing.clone()))
                    }
                    None => Err(Error::Api {
                        status: 404,
                        message: format!("PUT {path}"),
                    }),
                }
            }
            _ => Err(Error::Api {
                status: 404,
                message: format!("PUT {path}"),
            }),
        }
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.record("DELETE", path);
        let mut state = self.state.borrow_mut();
        let Some((endpoint, Some(id))) = split_api_path(path) else {
            return Err(Error::Api {
                status: 404,
                message: format!("DELETE {path}"),
            });
        };
        let id: i64 = id.parse().map_err(|_| Error::Api {
            status: 404,
            message: format!("DELETE {path}"),
        })?;
        let endpoint = endpoint.to_string();
        let collection = state.collections.entry(endpoint).or_default();
        let before = collection.len();
        collection.retain(|r| r.get("id").and_then(Value::as_i64) != Some(id));
        if collection.len() == before {
            return Err(Error::Api {
                status: 404,
                message: format!("DELETE {path}"),
            });
        }
        Ok(())
    }
}

// Shared fakes delegate to the inner instance, so a test can keep a handle
// for assertions while the client owns a transport.
impl Transport for Rc<FakeTransport> {
    fn get(&self, path: &str) -> Result<Value> {
        self.as_ref().get(path)
    }
    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.as_ref().post(path, body)
    }
    fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.as_ref().put(path, body)
    }
    fn delete(&self, path: &str) -> Result<()> {
        self.as_ref().delete(path)
    }
}

fn default_media_management() -> Value {
    json!({
        "id": 1,
        "autoUnmonitorPreviouslyDownloadedEpisodes": false,
        "downloadPropersAndRepacks": "preferAndUpgrade",
        "createEmptySeriesFolders": false,
        "deleteEmptyFolders": false,
        "episodeTitleRequired": "always",
        "skipFreeSpaceCheckWhenImporting": false,
        "minimumFreeSpaceWhenImporting": 100,
        "copyUsingHardlinks": true,
        "importExtraFiles": false,
        "extraFileExtensions": "srt",
        "fileDate": "none",
        "recycleBin": null,
        "recycleBinCleanupDays": 7,
        "rescanAfterRefresh": "always",
        "setPermissionsLinux": false,
        "chmodFolder": "755",
        "chownGroup": null,
    })
}

fn default_host() -> Value {
    json!({
        "id": 1,
        "bindAddress": "*",
        "port": 8989,
        "urlBase": "",
        "instanceName": "Sonarr",
        "enableSsl": false,
        "authenticationMethod": "none",
        "username": null,
        "password": null,
        "proxyEnabled": false,
        "proxyType": "http",
        "proxyHostname": null,
        "proxyPort": 8080,
        "proxyUsername": null,
        "proxyPassword": null,
        "proxyBypassFilter": "",
        "proxyBypassLocalAddresses": true,
        "logLevel": "info",
        "analyticsEnabled": true,
        "branch": "main",
        "updateAutomatically": false,
        "updateMechanism": "docker",
        "updateScriptPath": null,
        "backupFolder": "Backups",
        "backupInterval": 7,
        "backupRetention": 28,
    })
}

fn default_ui() -> Value {
    json!({
        "id": 1,
        "firstDayOfWeek": 0,
        "calendarWeekColumnHeader": "ddd M/D",
        "shortDateFormat": "MMM D YYYY",
        "longDateFormat": "dddd, MMMM D YYYY",
        "timeFormat": "h(:mm)a",
        "showRelativeDates": true,
        "enableColorImpairedMode": false,
    })
}

fn default_quality_definitions() -> Vec<Value> {
    [
        (1, "HDTV-720p", 0.0, 100.0),
        (2, "HDTV-1080p", 0.0, 100.0),
        (3, "WEBDL-720p", 0.0, 100.0),
        (4, "WEBDL-1080p", 0.0, 100.0),
        (5, "Bluray-1080p", 0.0, 100.0),
    ]
    .into_iter()
    .map(|(id, name, min, max)| {
        json!({
            "id": id,
            "quality": {"id": id, "name": name},
            "title": name,
            "minSize": min,
            "maxSize": max,
        })
    })
    .collect()
}

fn default_metadata() -> Vec<Value> {
    let metadata_fields = json!([
        {"name": "seriesMetadata", "value": false},
        {"name": "episodeMetadata", "value": false},
        {"name": "seriesImages", "value": false},
        {"name": "seasonImages", "value": false},
        {"name": "episodeImages", "value": false},
    ]);
    vec![
        json!({
            "id": 1,
            "name": "Kodi (XBMC) / Emby",
            "implementation": "XbmcMetadata",
            "configContract": "XbmcMetadataSettings",
            "enable": false,
            "fields": metadata_fields.clone(),
        }),
        json!({
            "id": 2,
            "name": "Roksbox",
            "implementation": "RoksboxMetadata",
            "configContract": "RoksboxMetadataSettings",
            "enable": false,
            "fields": metadata_fields.clone(),
        }),
        json!({
            "id": 3,
            "name": "WDTV",
            "implementation": "WdtvMetadata",
            "configContract": "WdtvMetadataSettings",
            "enable": false,
            "fields": metadata_fields,
        }),
    ]
}

fn default_delay_profiles() -> Vec<Value> {
    vec![json!({
        "id": 6,
        "enableUsenet": true,
        "enableTorrent": true,
        "preferredProtocol": "usenet",
        "usenetDelay": 0,
        "torrentDelay": 0,
        "bypassIfHighestQuality": false,
        "tags": [],
        "order": 2147483647,
    })]
}

fn default_indexer_schemas() -> Vec<Value> {
    vec![
        json!({
            "implementation": "Newznab",
            "implementationName": "Newznab",
            "configContract": "NewznabSettings",
            "protocol": "usenet",
            "enableRss": true,
            "enableAutomaticSearch": true,
            "enableInteractiveSearch": true,
            "priority": 25,
            "tags": [],
            "fields": [
                {"name": "baseUrl", "value": ""},
                {"name": "apiPath", "value": "/api"},
                {"name": "apiKey", "value": ""},
                {"name": "categories", "value": [5030, 5040]},
                {"name": "animeCategories", "value": []},
                {"name": "animeStandardFormatSearch", "value": false},
                {"name": "additionalParameters"},
            ],
        }),
        json!({
            "implementation": "Fanzub",
            "implementationName": "Fanzub",
            "configContract": "FanzubSettings",
            "protocol": "usenet",
            "enableRss": true,
            "enableAutomaticSearch": true,
            "enableInteractiveSearch": true,
            "priority": 25,
            "tags": [],
            "fields": [
                {"name": "rssUrl", "value": ""},
                {"name": "animeStandardFormatSearch", "value": false},
            ],
        }),
        json!({
            "implementation": "BroadcastheNet",
            "implementationName": "BroadcasTheNet",
            "configContract": "BroadcastheNetSettings",
            "protocol": "torrent",
            "enableRss": true,
            "enableAutomaticSearch": true,
            "enableInteractiveSearch": true,
            "priority": 25,
            "tags": [],
            "fields": [
                {"name": "apiUrl", "value": "https://api.broadcasthe.net"},
                {"name": "apiKey", "value": ""},
                {"name": "minimumSeeders", "value": 1},
                {"name": "seedCriteria.seedRatio"},
                {"name": "seedCriteria.seedTime"},
            ],
        }),
    ]
}

fn default_download_client_schemas() -> Vec<Value> {
    vec![
        json!({
            "implementation": "Transmission",
            "implementationName": "Transmission",
            "configContract": "TransmissionSettings",
            "protocol": "torrent",
            "enable": true,
            "removeCompletedDownloads": true,
            "removeFailedDownloads": true,
            "priority": 1,
            "tags": [],
            "fields": [
                {"name": "host", "value": "localhost"},
                {"name": "port", "value": 9091},
                {"name": "useSsl", "value": false},
                {"name": "urlBase", "value": "/transmission/"},
                {"name": "username"},
                {"name": "password"},
                {"name": "tvCategory"},
                {"name": "tvDirectory"},
                {"name": "recentTvPriority", "value": 0},
                {"name": "olderTvPriority", "value": 0},
                {"name": "addPaused", "value": false},
            ],
        }),
        json!({
            "implementation": "QBittorrent",
            "implementationName": "qBittorrent",
            "configContract": "QBittorrentSettings",
            "protocol": "torrent",
            "enable": true,
            "removeCompletedDownloads": true,
            "removeFailedDownloads": true,
            "priority": 1,
            "tags": [],
            "fields": [
                {"name": "host", "value": "localhost"},
                {"name": "port", "value": 8080},
                {"name": "useSsl", "value": false},
                {"name": "urlBase"},
                {"name": "username"},
                {"name": "password"},
                {"name": "tvCategory", "value": "tv-sonarr"},
                {"name": "recentTvPriority", "value": 0},
                {"name": "olderTvPriority", "value": 0},
                {"name": "initialState", "value": 0},
            ],
        }),
        json!({
            "implementation": "Sabnzbd",
            "implementationName": "SABnzbd",
            "configContract": "SabnzbdSettings",
            "protocol": "usenet",
            "enable": true,
            "removeCompletedDownloads": true,
            "removeFailedDownloads": true,
            "priority": 1,
            "tags": [],
            "fields": [
                {"name": "host", "value": "localhost"},
                {"name": "port", "value": 8080},
                {"name": "useSsl", "value": false},
                {"name": "urlBase"},
                {"name": "apiKey"},
                {"name": "username"},
                {"name": "password"},
                {"name": "tvCategory", "value": "tv"},
                {"name": "recentTvPriority", "value": -100},
                {"name": "olderTvPriority", "value": -100},
            ],
        }),
    ]
}
