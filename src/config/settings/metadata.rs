//! Metadata files section.
//!
//! The instance ships a fixed catalog of metadata file providers; each is
//! a remote resource with an `enable` flag and per-provider options in
//! its field list. Providers are matched by implementation name, never
//! created or deleted.

use super::util::{find_by_implementation, to_attrs, update_resource};
use crate::api::ArrClient;
use crate::error::{Error, Result};
use reconcile::{Attrs, DiagnosticSink, RemoteMapEntry, local_attrs};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Options for one metadata file provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataProvider {
    /// Write metadata files for this provider
    pub enable: bool,
    /// Write series-level metadata
    pub series_metadata: bool,
    /// Write episode-level metadata
    pub episode_metadata: bool,
    /// Save series images
    pub series_images: bool,
    /// Save season images
    pub season_images: bool,
    /// Save episode images
    pub episode_images: bool,
}

fn remote_map() -> Vec<RemoteMapEntry> {
    vec![
        RemoteMapEntry::new("enable", "enable"),
        RemoteMapEntry::new("series_metadata", "seriesMetadata").field(),
        RemoteMapEntry::new("episode_metadata", "episodeMetadata").field(),
        RemoteMapEntry::new("series_images", "seriesImages").field(),
        RemoteMapEntry::new("season_images", "seasonImages").field(),
        RemoteMapEntry::new("episode_images", "episodeImages").field(),
    ]
}

/// Metadata file settings for every supported provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataSettings {
    /// Kodi (XBMC) / Emby metadata files
    pub kodi_emby: MetadataProvider,
    /// Roksbox metadata files
    pub roksbox: MetadataProvider,
    /// WDTV metadata files
    pub wdtv: MetadataProvider,
}

/// (local section name, remote implementation) pairs.
const PROVIDERS: &[(&str, &str)] = &[
    ("kodi_emby", "XbmcMetadata"),
    ("roksbox", "RoksboxMetadata"),
    ("wdtv", "WdtvMetadata"),
];

impl MetadataSettings {
    fn provider(&self, name: &str) -> &MetadataProvider {
        match name {
            "kodi_emby" => &self.kodi_emby,
            "roksbox" => &self.roksbox,
            _ => &self.wdtv,
        }
    }

    /// Read the metadata provider options of a live instance. Providers
    /// missing from the remote catalog decode to defaults.
    pub fn from_remote(api: &ArrClient) -> Result<Self> {
        let listing = api.resources("metadata").list()?;
        let decode = |implementation: &str| -> Result<MetadataProvider> {
            match find_by_implementation(&listing, implementation) {
                Some(resource) => {
                    let attrs = local_attrs(&remote_map(), resource).map_err(Error::from)?;
                    Ok(serde_json::from_value(Value::Object(attrs))?)
                }
                None => Ok(MetadataProvider::default()),
            }
        };
        Ok(Self {
            kodi_emby: decode("XbmcMetadata")?,
            roksbox: decode("RoksboxMetadata")?,
            wdtv: decode("WdtvMetadata")?,
        })
    }

    /// Update every provider that differs. All providers are diffed even
    /// after one reports a change.
    pub fn update_remote(
        &self,
        tree: &str,
        api: &ArrClient,
        remote: &Self,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        let listing = api.resources("metadata").list()?;
        let mut changed = false;
        for (name, implementation) in PROVIDERS {
            let provider_tree = format!("{tree}.{name}");
            let Some(api_resource): Option<&Attrs> =
                find_by_implementation(&listing, implementation)
            else {
                log::warn!("{provider_tree}: provider not present on the remote instance");
                continue;
            };
            changed |= update_resource(
                api,
                "metadata",
                &provider_tree,
                &remote_map(),
                &to_attrs(self.provider(name))?,
                &to_attrs(remote.provider(name))?,
                api_resource,
                sink,
            )?;
        }
        Ok(changed)
    }

    /// The provider catalog is owned by the instance; nothing to delete.
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use reconcile::RecordingSink;
    use serde_json::json;
    use std::rc::Rc;

    fn client(fake: &Rc<FakeTransport>) -> ArrClient {
        ArrClient::new(Box::new(Rc::clone(fake)))
    }

    #[test]
    fn test_enable_provider_updates_fields() {
        let fake = Rc::new(FakeTransport::sonarr());
        let api = client(&fake);
        let remote = MetadataSettings::from_remote(&api).unwrap();
        let mut local = remote.clone();
        local.kodi_emby.enable = true;
        local.kodi_emby.series_metadata = true;
        local.kodi_emby.episode_images = true;

        let mut sink = RecordingSink::new();
        let changed = local
            .update_remote("t.metadata", &api, &remote, &mut sink)
            .unwrap();
        assert!(changed);

        let kodi = fake
            .collection("metadata")
            .into_iter()
            .find(|m| m.get("implementation") == Some(&json!("XbmcMetadata")))
            .unwrap();
        assert_eq!(kodi.get("enable"), Some(&json!(true)));
        let fields = kodi.get("fields").unwrap().as_array().unwrap();
        let field = |name: &str| {
            fields
                .iter()
                .find(|f| f.get("name") == Some(&json!(name)))
                .and_then(|f| f.get("value"))
                .cloned()
        };
        assert_eq!(field("seriesMetadata"), Some(json!(true)));
        assert_eq!(field("episodeImages"), Some(json!(true)));
        // unchanged provider untouched
        let wdtv = fake
            .collection("metadata")
            .into_iter()
            .find(|m| m.get("implementation") == Some(&json!("WdtvMetadata")))
            .unwrap();
        assert_eq!(wdtv.get("enable"), Some(&json!(false)));
    }

    #[test]
    fn test_converged_providers_push_nothing() {
        let fake = Rc::new(FakeTransport::sonarr());
        let api = client(&fake);
        let remote = MetadataSettings::from_remote(&api).unwrap();
        let local = remote.clone();
        let changed = local
            .update_remote("t.metadata", &api, &remote, &mut RecordingSink::new())
            .unwrap();
        assert!(!changed);
        assert!(!fake.calls().iter().any(|c| c.starts_with("PUT")));
    }
}
