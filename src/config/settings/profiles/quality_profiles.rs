//! Quality profiles.
//!
//! A profile declares which qualities are wanted, from most preferred to
//! least, and optionally a quality to stop upgrading at. The remote
//! representation is a full item list over the entire quality catalog
//! with per-item allowed flags, plus a cutoff quality id, so encoding
//! needs the quality name/id catalog fetched at reconcile time.

use crate::api::{ArrClient, attr_str, resource_id};
use crate::config::settings::util::to_attrs;
use crate::error::{Error, Result};
use reconcile::{
    Attrs, CollectionOps, Compare, DiagnosticSink, DiffOptions, RemoteMapEntry, delete_collection,
    update_collection, update_diff,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};

/// One quality profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityProfile {
    /// Stop upgrading once this quality is reached; when unset, upgrades
    /// are disabled and the first listed quality acts as the cutoff
    pub upgrade_until: Option<String>,
    /// Wanted qualities, most preferred first
    pub qualities: Vec<String>,
}

/// Quality profiles, keyed by profile name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityProfilesSettings {
    /// Delete remote profiles with no local declaration
    pub delete_unmanaged: bool,
    /// Managed profiles
    pub definitions: BTreeMap<String, QualityProfile>,
}

/// Quality name/id catalog, in remote listing order.
type Catalog = Vec<(String, i64)>;

fn fetch_catalog(api: &ArrClient) -> Result<Catalog> {
    let mut catalog = Vec::new();
    for resource in api.resources("qualitydefinition").list()? {
        let quality = resource
            .get("quality")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                Error::UnexpectedResponse(
                    "quality definition has no 'quality' attribute".to_string(),
                )
            })?;
        catalog.push((
            attr_str(quality, "name")?.to_string(),
            quality.get("id").and_then(Value::as_i64).ok_or_else(|| {
                Error::UnexpectedResponse("quality has no integer id".to_string())
            })?,
        ));
    }
    Ok(catalog)
}

fn quality_id(catalog: &Catalog, name: &str) -> reconcile::Result<i64> {
    catalog
        .iter()
        .find(|(known, _)| known == name)
        .map(|(_, id)| *id)
        .ok_or_else(|| reconcile::Error::InvalidValue {
            attr: "qualities".to_string(),
            message: format!("quality '{name}' does not exist on the remote instance"),
        })
}

/// Mapping table for one profile. Both entries close over the catalog and
/// the profile's own quality list, which the cutoff fallback needs.
fn remote_map(profile: &QualityProfile, catalog: &Catalog) -> Vec<RemoteMapEntry> {
    let cutoff_catalog = catalog.clone();
    let fallback = profile.qualities.first().cloned().unwrap_or_default();
    let items_catalog = catalog.clone();
    vec![
        RemoteMapEntry::new("upgrade_until", "cutoff").encoder(move |value| {
            let name = value.as_str().unwrap_or(&fallback);
            Ok(Value::from(quality_id(&cutoff_catalog, name)?))
        }),
        // declared order is informational; the payload follows catalog
        // order, so comparison ignores ordering
        RemoteMapEntry::new("qualities", "items")
            .compare(Compare::Unordered)
            .encoder(move |value| {
            let wanted: BTreeSet<&str> = value
                .as_array()
                .map(|names| names.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            // validate every declared quality before building the items
            for name in &wanted {
                quality_id(&items_catalog, name)?;
            }
            let items: Vec<Value> = items_catalog
                .iter()
                .map(|(name, id)| {
                    json!({
                        "quality": {"id": id, "name": name},
                        "allowed": wanted.contains(name.as_str()),
                    })
                })
                .collect();
            Ok(Value::Array(items))
        }),
    ]
}

/// Decode one remote profile resource.
fn profile_from_remote(resource: &Attrs) -> Result<(String, QualityProfile)> {
    let name = attr_str(resource, "name")?.to_string();
    let items = resource
        .get("items")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let mut qualities = Vec::new();
    let mut cutoff_name = None;
    let cutoff = resource.get("cutoff").and_then(Value::as_i64);
    for item in &items {
        let quality = item.get("quality").and_then(Value::as_object);
        let quality_name = quality
            .and_then(|q| q.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if quality.and_then(|q| q.get("id")).and_then(Value::as_i64) == cutoff {
            cutoff_name = Some(quality_name.clone());
        }
        if item.get("allowed").and_then(Value::as_bool) == Some(true) {
            qualities.push(quality_name);
        }
    }
    let upgrade_allowed = resource
        .get("upgradeAllowed")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    Ok((
        name,
        QualityProfile {
            upgrade_until: if upgrade_allowed { cutoff_name } else { None },
            qualities,
        },
    ))
}

struct QualityProfileOps<'a> {
    api: &'a ArrClient,
    catalog: Catalog,
    api_profiles: BTreeMap<String, Attrs>,
}

impl QualityProfileOps<'_> {
    fn payload(&self, name: &str, local: &QualityProfile, attrs: Attrs) -> Attrs {
        let mut payload = attrs;
        payload.insert("name".to_string(), Value::from(name));
        payload.insert(
            "upgradeAllowed".to_string(),
            Value::from(local.upgrade_until.is_some()),
        );
        payload
    }
}

impl CollectionOps for QualityProfileOps<'_> {
    type Resource = QualityProfile;
    type Error = Error;

    fn create(&mut self, _tree: &str, key: &str, local: &QualityProfile) -> Result<()> {
        let attrs = reconcile::remote_attrs(&remote_map(local, &self.catalog), &to_attrs(local)?)
            .map_err(Error::from)?;
        let payload = self.payload(key, local, attrs);
        self.api.resources("qualityprofile").create(&payload)?;
        Ok(())
    }

    fn update(
        &mut self,
        tree: &str,
        key: &str,
        local: &QualityProfile,
        remote: &QualityProfile,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        let diff = update_diff(
            tree,
            &remote_map(local, &self.catalog),
            &to_attrs(local)?,
            &to_attrs(remote)?,
            DiffOptions::full_payload(),
            sink,
        )
        .map_err(Error::from)?;
        if !diff.changed {
            return Ok(false);
        }
        let api_resource = self.api_profiles.get(key).cloned().ok_or_else(|| {
            Error::UnexpectedResponse(format!("quality profile '{key}' vanished from the remote"))
        })?;
        let mut payload = api_resource.clone();
        for (attr, value) in diff.attrs {
            payload.insert(attr, value);
        }
        let payload = self.payload(key, local, payload);
        let id = resource_id(&api_resource)?;
        self.api.resources("qualityprofile").update(id, &payload)?;
        Ok(true)
    }

    fn delete(&mut self, _tree: &str, key: &str) -> Result<()> {
        let api_resource = self.api_profiles.get(key).ok_or_else(|| {
            Error::UnexpectedResponse(format!("quality profile '{key}' vanished from the remote"))
        })?;
        self.api
            .resources("qualityprofile")
            .delete(resource_id(api_resource)?)
    }
}

impl QualityProfilesSettings {
    /// Reject empty quality lists and cutoffs not in the list.
    pub fn validate(&self) -> Result<()> {
        for (name, profile) in &self.definitions {
            if profile.qualities.is_empty() {
                return Err(Error::Config(format!(
                    "profiles.quality_profiles.definitions[{name}]: \
                     at least one quality must be listed"
                )));
            }
            if let Some(cutoff) = &profile.upgrade_until
                && !profile.qualities.contains(cutoff)
            {
                return Err(Error::Config(format!(
                    "profiles.quality_profiles.definitions[{name}]: \
                     upgrade_until '{cutoff}' is not among the listed qualities"
                )));
            }
        }
        Ok(())
    }

    /// Read the quality profiles of a live instance.
    pub fn from_remote(api: &ArrClient) -> Result<Self> {
        let mut definitions = BTreeMap::new();
        for resource in api.resources("qualityprofile").list()? {
            let (name, profile) = profile_from_remote(&resource)?;
            definitions.insert(name, profile);
        }
        Ok(Self {
            delete_unmanaged: false,
            definitions,
        })
    }

    fn ops<'a>(&self, api: &'a ArrClient) -> Result<QualityProfileOps<'a>> {
        let mut api_profiles = BTreeMap::new();
        for resource in api.resources("qualityprofile").list()? {
            api_profiles
                .entry(attr_str(&resource, "name")?.to_string())
                .or_insert(resource);
        }
        Ok(QualityProfileOps {
            api,
            catalog: fetch_catalog(api)?,
            api_profiles,
        })
    }

    /// Create and update quality profiles.
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
        let local: Vec<(String, &QualityProfile)> = self
            .definitions
            .iter()
            .map(|(name, profile)| (name.clone(), profile))
            .collect();
        let remote: Vec<(String, &QualityProfile)> = remote
            .definitions
            .iter()
            .map(|(name, profile)| (name.clone(), profile))
            .collect();
        update_collection(&mut ops, &format!("{tree}.definitions"), &local, &remote, sink)
    }

    /// Delete unmanaged quality profiles, when enabled.
    pub fn delete_remote(
        &self,
        tree: &str,
        api: &ArrClient,
        _remote: &Self,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        let mut ops = self.ops(api)?;
        let local_keys: BTreeSet<String> = self.definitions.keys().cloned().collect();
        let remote_keys: Vec<String> = ops.api_profiles.keys().cloned().collect();
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
