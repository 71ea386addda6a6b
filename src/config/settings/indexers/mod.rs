//! Indexers section.
//!
//! Indexers are polymorphic remote resources: a shared set of top-level
//! attributes plus implementation-specific parameters stored in the
//! resource's field list. Each supported implementation declares its own
//! mapping table on top of the shared base table.

pub mod category;

use super::util::{create_resource, tags_entry, to_attrs, update_resource};
use crate::api::{ArrClient, attr_str};
use crate::error::{Error, Result};
use category::{decode_categories, encode_categories};
use reconcile::{
    Attrs, CollectionOps, Compare, DiagnosticSink, RemoteMapEntry, delete_collection, local_attrs,
    update_collection,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

pub use category::NabCategory;

/// Attributes shared by every indexer implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerBase {
    /// Monitor the indexer RSS feed for new releases
    pub enable_rss: bool,
    /// Use the indexer for automatic searches
    pub enable_automatic_search: bool,
    /// Use the indexer for interactive searches
    pub enable_interactive_search: bool,
    /// Indexer priority; lower values are preferred
    pub priority: u32,
    /// Tags controlling which series use this indexer
    pub tags: BTreeSet<String>,
}

impl Default for IndexerBase {
    fn default() -> Self {
        Self {
            enable_rss: true,
            enable_automatic_search: true,
            enable_interactive_search: true,
            priority: 25,
            tags: BTreeSet::new(),
        }
    }
}

fn base_map(tag_ids: &BTreeMap<String, i64>) -> Vec<RemoteMapEntry> {
    vec![
        RemoteMapEntry::new("enable_rss", "enableRss"),
        RemoteMapEntry::new("enable_automatic_search", "enableAutomaticSearch"),
        RemoteMapEntry::new("enable_interactive_search", "enableInteractiveSearch"),
        RemoteMapEntry::new("priority", "priority"),
        tags_entry(tag_ids.clone()),
    ]
}

/// Seeding/ratio attributes shared by torrent indexers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TorrentIndexerBase {
    /// Minimum number of seeders required to grab a release
    pub minimum_seeders: u32,
    /// Seed ratio to reach before stopping, instance default when unset
    pub seed_ratio: Option<f64>,
    /// Seed time in minutes before stopping, instance default when unset
    pub seed_time: Option<u32>,
}

impl Default for TorrentIndexerBase {
    fn default() -> Self {
        Self {
            minimum_seeders: 1,
            seed_ratio: None,
            seed_time: None,
        }
    }
}

fn torrent_base_map() -> Vec<RemoteMapEntry> {
    vec![
        RemoteMapEntry::new("minimum_seeders", "minimumSeeders")
            .field()
            .field_default(1),
        RemoteMapEntry::new("seed_ratio", "seedCriteria.seedRatio")
            .field()
            .field_default(Value::Null),
        RemoteMapEntry::new("seed_time", "seedCriteria.seedTime")
            .field()
            .field_default(Value::Null),
    ]
}

/// Indexer for a Newznab-compatible usenet indexing site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewznabIndexer {
    #[serde(flatten)]
    pub base: IndexerBase,
    /// URL of the indexing site
    pub base_url: String,
    /// API endpoint path, usually `/api`
    pub api_path: String,
    /// API key for the site
    pub api_key: String,
    /// Categories to monitor for standard shows
    pub categories: BTreeSet<NabCategory>,
    /// Categories to monitor for anime
    pub anime_categories: BTreeSet<NabCategory>,
    /// Also search for anime using standard numbering
    pub anime_standard_format_search: bool,
    /// Extra query parameters appended to API requests
    pub additional_parameters: Option<String>,
}

impl Default for NewznabIndexer {
    fn default() -> Self {
        Self {
            base: IndexerBase::default(),
            base_url: String::new(),
            api_path: "/api".to_string(),
            api_key: String::new(),
            categories: [NabCategory(5030), NabCategory(5040)].into(),
            anime_categories: BTreeSet::new(),
            anime_standard_format_search: false,
            additional_parameters: None,
        }
    }
}

fn newznab_map() -> Vec<RemoteMapEntry> {
    vec![
        RemoteMapEntry::new("base_url", "baseUrl").field(),
        RemoteMapEntry::new("api_path", "apiPath").field(),
        RemoteMapEntry::new("api_key", "apiKey").field(),
        RemoteMapEntry::new("categories", "categories")
            .field()
            .compare(Compare::Unordered)
            .encoder(encode_categories)
            .decoder(decode_categories),
        RemoteMapEntry::new("anime_categories", "animeCategories")
            .field()
            .compare(Compare::Unordered)
            .encoder(encode_categories)
            .decoder(decode_categories),
        RemoteMapEntry::new("anime_standard_format_search", "animeStandardFormatSearch").field(),
        RemoteMapEntry::new("additional_parameters", "additionalParameters")
            .field()
            .field_default(Value::Null)
            .decoder(|value| match value.as_str() {
                Some("") | None => Ok(Value::Null),
                Some(text) => Ok(Value::from(text)),
            }),
    ]
}

/// Indexer for a Fanzub-compatible anime RSS feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FanzubIndexer {
    #[serde(flatten)]
    pub base: IndexerBase,
    /// URL of the Fanzub-compatible feed
    pub rss_url: String,
    /// Also search for anime using standard numbering
    pub anime_standard_format_search: bool,
}

fn fanzub_map() -> Vec<RemoteMapEntry> {
    vec![
        RemoteMapEntry::new("rss_url", "rssUrl").field(),
        RemoteMapEntry::new("anime_standard_format_search", "animeStandardFormatSearch").field(),
    ]
}

/// Indexer for the BroadcasTheNet private torrent tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcasthenetIndexer {
    #[serde(flatten)]
    pub base: IndexerBase,
    #[serde(flatten)]
    pub torrent: TorrentIndexerBase,
    /// API URL of the tracker
    pub api_url: String,
    /// API key for the tracker
    pub api_key: String,
}

impl Default for BroadcasthenetIndexer {
    fn default() -> Self {
        Self {
            base: IndexerBase::default(),
            torrent: TorrentIndexerBase::default(),
            api_url: "https://api.broadcasthe.net".to_string(),
            api_key: String::new(),
        }
    }
}

fn broadcasthenet_map() -> Vec<RemoteMapEntry> {
    let mut map = torrent_base_map();
    map.push(RemoteMapEntry::new("api_url", "apiUrl").field());
    map.push(RemoteMapEntry::new("api_key", "apiKey").field());
    map
}

/// One indexer declaration, dispatched on its `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Indexer {
    Newznab(NewznabIndexer),
    Fanzub(FanzubIndexer),
    Broadcasthenet(BroadcasthenetIndexer),
}

impl Indexer {
    /// Remote implementation name for this indexer type.
    pub fn implementation(&self) -> &'static str {
        match self {
            Self::Newznab(_) => "Newznab",
            Self::Fanzub(_) => "Fanzub",
            Self::Broadcasthenet(_) => "BroadcastheNet",
        }
    }

    /// Full mapping table for this indexer type.
    fn remote_map(&self, tag_ids: &BTreeMap<String, i64>) -> Vec<RemoteMapEntry> {
        let mut map = base_map(tag_ids);
        map.extend(match self {
            Self::Newznab(_) => newznab_map(),
            Self::Fanzub(_) => fanzub_map(),
            Self::Broadcasthenet(_) => broadcasthenet_map(),
        });
        map
    }

    /// Decode a remote indexer resource, or `None` for implementations
    /// this tool does not model.
    fn from_remote(resource: &Attrs, tag_ids: &BTreeMap<String, i64>) -> Result<Option<Self>> {
        let implementation = attr_str(resource, "implementation")?;
        let mut map = base_map(tag_ids);
        let indexer = match implementation {
            "Newznab" => {
                map.extend(newznab_map());
                Self::Newznab(serde_json::from_value(Value::Object(
                    local_attrs(&map, resource).map_err(Error::from)?,
                ))?)
            }
            "Fanzub" => {
                map.extend(fanzub_map());
                Self::Fanzub(serde_json::from_value(Value::Object(
                    local_attrs(&map, resource).map_err(Error::from)?,
                ))?)
            }
            "BroadcastheNet" => {
                map.extend(broadcasthenet_map());
                Self::Broadcasthenet(serde_json::from_value(Value::Object(
                    local_attrs(&map, resource).map_err(Error::from)?,
                ))?)
            }
            other => {
                log::warn!("skipping remote indexer with unsupported implementation '{other}'");
                return Ok(None);
            }
        };
        Ok(Some(indexer))
    }
}

/// Indexers, keyed by indexer name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexersSettings {
    /// Delete remote indexers with no local declaration
    pub delete_unmanaged: bool,
    /// Managed indexers
    pub definitions: BTreeMap<String, Indexer>,
}

struct IndexerOps<'a> {
    api: &'a ArrClient,
    tag_ids: BTreeMap<String, i64>,
    schemas: Vec<Attrs>,
    api_indexers: BTreeMap<String, Attrs>,
}

impl CollectionOps for IndexerOps<'_> {
    type Resource = Indexer;
    type Error = Error;

    fn create(&mut self, _tree: &str, key: &str, local: &Indexer) -> Result<()> {
        create_resource(
            self.api,
            "indexer",
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
        local: &Indexer,
        remote: &Indexer,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        let api_resource = self.api_indexers.get(key).cloned().ok_or_else(|| {
            Error::UnexpectedResponse(format!("indexer '{key}' vanished from the remote"))
        })?;
        update_resource(
            self.api,
            "indexer",
            tree,
            &local.remote_map(&self.tag_ids),
            &to_attrs(local)?,
            &to_attrs(remote)?,
            &api_resource,
            sink,
        )
    }

    fn delete(&mut self, _tree: &str, key: &str) -> Result<()> {
        let api_resource = self.api_indexers.get(key).ok_or_else(|| {
            Error::UnexpectedResponse(format!("indexer '{key}' vanished from the remote"))
        })?;
        self.api
            .resources("indexer")
            .delete(crate::api::resource_id(api_resource)?)
    }
}

impl IndexersSettings {
    /// Read the indexers of a live instance. Implementations this tool
    /// does not model are skipped with a warning.
    pub fn from_remote(api: &ArrClient) -> Result<Self> {
        let tag_ids = api.tag_ids()?;
        let mut definitions = BTreeMap::new();
        for resource in api.resources("indexer").list()? {
            let name = attr_str(&resource, "name")?.to_string();
            if let Some(indexer) = Indexer::from_remote(&resource, &tag_ids)? {
                definitions.insert(name, indexer);
            }
        }
        Ok(Self {
            delete_unmanaged: false,
            definitions,
        })
    }

    fn ops<'a>(&self, api: &'a ArrClient) -> Result<IndexerOps<'a>> {
        let mut api_indexers = BTreeMap::new();
        for resource in api.resources("indexer").list()? {
            api_indexers
                .entry(attr_str(&resource, "name")?.to_string())
                .or_insert(resource);
        }
        Ok(IndexerOps {
            api,
            tag_ids: api.tag_ids()?,
            schemas: api.resources("indexer").schemas()?,
            api_indexers,
        })
    }

    /// Create and update indexers.
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
        let local: Vec<(String, &Indexer)> = self
            .definitions
            .iter()
            .map(|(name, indexer)| (name.clone(), indexer))
            .collect();
        let remote: Vec<(String, &Indexer)> = remote
            .definitions
            .iter()
            .map(|(name, indexer)| (name.clone(), indexer))
            .collect();
        update_collection(&mut ops, &format!("{tree}.definitions"), &local, &remote, sink)
    }

    /// Delete unmanaged indexers, when enabled.
    pub fn delete_remote(
        &self,
        tree: &str,
        api: &ArrClient,
        _remote: &Self,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        let mut ops = self.ops(api)?;
        let local_keys: BTreeSet<String> = self.definitions.keys().cloned().collect();
        let remote_keys: Vec<String> = ops.api_indexers.keys().cloned().collect();
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use reconcile::{ChangeEvent, RecordingSink};
    use serde_json::json;
    use std::rc::Rc;

    fn client(fake: &Rc<FakeTransport>) -> ArrClient {
        ArrClient::new(Box::new(Rc::clone(fake)))
    }

    fn nyaa() -> Indexer {
        Indexer::Newznab(NewznabIndexer {
            base_url: "https://nzb.example.com".to_string(),
            api_key: "k".to_string(),
            categories: [NabCategory(5040)].into(),
            ..NewznabIndexer::default()
        })
    }

    #[test]
    fn test_create_seeds_schema_fields() {
        let fake = Rc::new(FakeTransport::sonarr());
        let api = client(&fake);
        let local = IndexersSettings {
            delete_unmanaged: false,
            definitions: [("Nzb".to_string(), nyaa())].into(),
        };
        let remote = IndexersSettings::from_remote(&api).unwrap();

        let mut sink = RecordingSink::new();
        let changed = local
            .update_remote("t.indexers", &api, &remote, &mut sink)
            .unwrap();
        assert!(changed);

        let created = &fake.collection("indexer")[0];
        assert_eq!(created.get("name"), Some(&json!("Nzb")));
        assert_eq!(created.get("implementation"), Some(&json!("Newznab")));
        // mapped field written, schema-only field preserved
        let fields = created.get("fields").unwrap().as_array().unwrap();
        let field = |name: &str| {
            fields
                .iter()
                .find(|f| f.get("name") == Some(&json!(name)))
                .and_then(|f| f.get("value"))
                .cloned()
        };
        assert_eq!(field("baseUrl"), Some(json!("https://nzb.example.com")));
        assert_eq!(field("categories"), Some(json!([5040])));
        assert_eq!(field("apiPath"), Some(json!("/api")));
    }

    #[test]
    fn test_round_trip_is_idempotent() {
        let fake = Rc::new(FakeTransport::sonarr());
        let api = client(&fake);
        let local = IndexersSettings {
            delete_unmanaged: false,
            definitions: [("Nzb".to_string(), nyaa())].into(),
        };
        let remote = IndexersSettings::from_remote(&api).unwrap();
        local
            .update_remote("t.indexers", &api, &remote, &mut reconcile::NullSink)
            .unwrap();

        let remote = IndexersSettings::from_remote(&api).unwrap();
        let mut sink = RecordingSink::new();
        let changed = local
            .update_remote("t.indexers", &api, &remote, &mut sink)
            .unwrap();
        assert!(!changed);
        assert!(sink.changes().next().is_none());
    }

    #[test]
    fn test_update_changed_field_preserves_others() {
        let fake = Rc::new(FakeTransport::sonarr());
        let api = client(&fake);
        let mut local = IndexersSettings {
            delete_unmanaged: false,
            definitions: [("Nzb".to_string(), nyaa())].into(),
        };
        let remote = IndexersSettings::from_remote(&api).unwrap();
        local
            .update_remote("t.indexers", &api, &remote, &mut reconcile::NullSink)
            .unwrap();

        if let Some(Indexer::Newznab(indexer)) = local.definitions.get_mut("Nzb") {
            indexer.base.priority = 10;
        }
        let remote = IndexersSettings::from_remote(&api).unwrap();
        let mut sink = RecordingSink::new();
        let changed = local
            .update_remote("t.indexers", &api, &remote, &mut sink)
            .unwrap();
        assert!(changed);
        let updated = &fake.collection("indexer")[0];
        assert_eq!(updated.get("priority"), Some(&json!(10)));
        assert_eq!(updated.get("implementation"), Some(&json!("Newznab")));
        let changes: Vec<_> = sink.changes().collect();
        assert_eq!(changes.len(), 1);
        assert!(matches!(changes[0].event, ChangeEvent::Changed { .. }));
    }

    #[test]
    fn test_unsupported_local_implementation_fails() {
        let fake = Rc::new(FakeTransport::sonarr());
        // no BroadcastheNet schema on this instance
        fake.seed_schemas(
            "indexer",
            vec![json!({
                "implementation": "Newznab",
                "configContract": "NewznabSettings",
                "fields": [],
            })],
        );
        let api = client(&fake);
        let local = IndexersSettings {
            delete_unmanaged: false,
            definitions: [(
                "BTN".to_string(),
                Indexer::Broadcasthenet(BroadcasthenetIndexer {
                    api_key: "k".to_string(),
                    ..BroadcasthenetIndexer::default()
                }),
            )]
            .into(),
        };
        let remote = IndexersSettings::from_remote(&api).unwrap();
        let err = local
            .update_remote("t.indexers", &api, &remote, &mut reconcile::NullSink)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Reconcile(reconcile::Error::UnsupportedImplementation { .. })
        ));
    }

    #[test]
    fn test_delete_unmanaged_indexer() {
        let fake = Rc::new(FakeTransport::sonarr());
        let api = client(&fake);
        let mut seeded = IndexersSettings {
            delete_unmanaged: false,
            definitions: [("Stale".to_string(), nyaa())].into(),
        };
        let remote = IndexersSettings::from_remote(&api).unwrap();
        seeded
            .update_remote("t.indexers", &api, &remote, &mut reconcile::NullSink)
            .unwrap();
        seeded.definitions.clear();
        seeded.delete_unmanaged = true;

        let remote = IndexersSettings::from_remote(&api).unwrap();
        let changed = seeded
            .delete_remote("t.indexers", &api, &remote, &mut reconcile::NullSink)
            .unwrap();
        assert!(changed);
        assert!(fake.collection("indexer").is_empty());
    }
}
