//! Delay profiles.
//!
//! Delay profiles have no natural name on the remote side; they are an
//! ordered list, so local and remote entries are matched by 1-based
//! ordinal. The remote listing is ordered by its `order` attribute, which
//! places the undeletable default profile last.

use crate::api::{ArrClient, resource_id};
use crate::config::settings::util::{tags_entry, to_attrs};
use crate::error::{Error, Result};
use reconcile::{
    Attrs, CollectionOps, DiagnosticSink, DiffOptions, RemoteMapEntry, delete_collection,
    update_collection, update_diff,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// One delay profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayProfile {
    /// Protocol preference: `usenet_prefer`, `torrent_prefer`,
    /// `usenet_only` or `torrent_only`
    pub preferred_protocol: String,
    /// Minutes to wait before grabbing a usenet release
    pub usenet_delay: u32,
    /// Minutes to wait before grabbing a torrent release
    pub torrent_delay: u32,
    /// Skip the delay when the release already meets the profile cutoff
    pub bypass_if_highest_quality: bool,
    /// Tags selecting which series this profile applies to
    pub tags: BTreeSet<String>,
}

impl Default for DelayProfile {
    fn default() -> Self {
        Self {
            preferred_protocol: "usenet_prefer".to_string(),
            usenet_delay: 0,
            torrent_delay: 0,
            bypass_if_highest_quality: false,
            tags: BTreeSet::new(),
        }
    }
}

/// Delay profiles, in priority order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayProfilesSettings {
    /// Delete remote profiles beyond the locally declared ones
    pub delete_unmanaged: bool,
    /// Managed profiles, highest priority first
    pub definitions: Vec<DelayProfile>,
}

fn remote_map(tag_ids: &BTreeMap<String, i64>) -> Vec<RemoteMapEntry> {
    vec![
        RemoteMapEntry::new("preferred_protocol", "preferredProtocol").encoder(|value| {
            match value.as_str().unwrap_or_default() {
                "usenet_prefer" | "usenet_only" => Ok(Value::from("usenet")),
                "torrent_prefer" | "torrent_only" => Ok(Value::from("torrent")),
                other => Err(reconcile::Error::InvalidValue {
                    attr: "preferred_protocol".to_string(),
                    message: format!("unrecognized protocol preference '{other}'"),
                }),
            }
        }),
        RemoteMapEntry::new("usenet_delay", "usenetDelay"),
        RemoteMapEntry::new("torrent_delay", "torrentDelay"),
        RemoteMapEntry::new("bypass_if_highest_quality", "bypassIfHighestQuality"),
        tags_entry(tag_ids.clone()),
    ]
}

/// Fill the enable flags the protocol preference implies.
fn apply_protocol_flags(payload: &mut Attrs, preferred_protocol: &str) {
    payload.insert(
        "enableUsenet".to_string(),
        Value::from(preferred_protocol != "torrent_only"),
    );
    payload.insert(
        "enableTorrent".to_string(),
        Value::from(preferred_protocol != "usenet_only"),
    );
}

/// Decode one remote delay profile resource.
fn profile_from_remote(resource: &Attrs, tag_ids: &BTreeMap<String, i64>) -> Result<DelayProfile> {
    let enable_usenet = resource
        .get("enableUsenet")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    let enable_torrent = resource
        .get("enableTorrent")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    let preferred = resource
        .get("preferredProtocol")
        .and_then(Value::as_str)
        .unwrap_or("usenet");
    let preferred_protocol = match (enable_usenet, enable_torrent) {
        (true, false) => "usenet_only",
        (false, true) => "torrent_only",
        _ if preferred == "torrent" => "torrent_prefer",
        _ => "usenet_prefer",
    }
    .to_string();

    let ids: Vec<i64> = resource
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| tags.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default();
    let tags = tag_ids
        .iter()
        .filter(|(_, id)| ids.contains(id))
        .map(|(label, _)| label.clone())
        .collect();

    Ok(DelayProfile {
        preferred_protocol,
        usenet_delay: resource
            .get("usenetDelay")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32,
        torrent_delay: resource
            .get("torrentDelay")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32,
        bypass_if_highest_quality: resource
            .get("bypassIfHighestQuality")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        tags,
    })
}

/// Remote delay profile listing ordered by priority (`order`, then id).
fn ordered_listing(api: &ArrClient) -> Result<Vec<Attrs>> {
    let mut listing = api.resources("delayprofile").list()?;
    listing.sort_by_key(|resource| {
        (
            resource.get("order").and_then(Value::as_i64).unwrap_or(0),
            resource.get("id").and_then(Value::as_i64).unwrap_or(0),
        )
    });
    Ok(listing)
}

struct DelayProfileOps<'a> {
    api: &'a ArrClient,
    tag_ids: BTreeMap<String, i64>,
    api_profiles: BTreeMap<String, Attrs>,
}

impl CollectionOps for DelayProfileOps<'_> {
    type Resource = DelayProfile;
    type Error = Error;

    fn create(&mut self, _tree: &str, _key: &str, local: &DelayProfile) -> Result<()> {
        let mut payload =
            reconcile::remote_attrs(&remote_map(&self.tag_ids), &to_attrs(local)?)
                .map_err(Error::from)?;
        apply_protocol_flags(&mut payload, &local.preferred_protocol);
        self.api.resources("delayprofile").create(&payload)?;
        Ok(())
    }

    fn update(
        &mut self,
        tree: &str,
        key: &str,
        local: &DelayProfile,
        remote: &DelayProfile,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        let diff = update_diff(
            tree,
            &remote_map(&self.tag_ids),
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
            Error::UnexpectedResponse(format!("delay profile #{key} vanished from the remote"))
        })?;
        let mut payload = api_resource.clone();
        for (attr, value) in diff.attrs {
            payload.insert(attr, value);
        }
        apply_protocol_flags(&mut payload, &local.preferred_protocol);
        let id = resource_id(&api_resource)?;
        self.api.resources("delayprofile").update(id, &payload)?;
        Ok(true)
    }

    fn delete(&mut self, _tree: &str, key: &str) -> Result<()> {
        let api_resource = self.api_profiles.get(key).ok_or_else(|| {
            Error::UnexpectedResponse(format!("delay profile #{key} vanished from the remote"))
        })?;
        self.api
            .resources("delayprofile")
            .delete(resource_id(api_resource)?)
    }
}

impl DelayProfilesSettings {
    /// Read the delay profiles of a live instance, in priority order.
    pub fn from_remote(api: &ArrClient) -> Result<Self> {
        let tag_ids = api.tag_ids()?;
        let mut definitions = Vec::new();
        for resource in ordered_listing(api)? {
            definitions.push(profile_from_remote(&resource, &tag_ids)?);
        }
        Ok(Self {
            delete_unmanaged: false,
            definitions,
        })
    }

    fn ops<'a>(&self, api: &'a ArrClient) -> Result<DelayProfileOps<'a>> {
        let mut api_profiles = BTreeMap::new();
        for (i, resource) in ordered_listing(api)?.into_iter().enumerate() {
            api_profiles.insert((i + 1).to_string(), resource);
        }
        Ok(DelayProfileOps {
            api,
            tag_ids: api.tag_ids()?,
            api_profiles,
        })
    }

    fn keyed(profiles: &[DelayProfile]) -> Vec<(String, &DelayProfile)> {
        profiles
            .iter()
            .enumerate()
            .map(|(i, profile)| ((i + 1).to_string(), profile))
            .collect()
    }

    /// Create and update delay profiles by ordinal.
    pub fn update_remote(
        &self,
        tree: &str,
        api: &ArrClient,
        remote: &Self,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        if self.definitions.is_empty() {
            return Ok(false);
        }
        let mut ops = self.ops(api)?;
        update_collection(
            &mut ops,
            &format!("{tree}.definitions"),
            &Self::keyed(&self.definitions),
            &Self::keyed(&remote.definitions),
            sink,
        )
    }

    /// Delete remote profiles beyond the declared ordinals, when enabled.
    pub fn delete_remote(
        &self,
        tree: &str,
        api: &ArrClient,
        _remote: &Self,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        if !self.delete_unmanaged && self.definitions.is_empty() {
            // nothing declared and deletion disabled: leave the list alone
            return Ok(false);
        }
        let mut ops = self.ops(api)?;
        let local_keys: BTreeSet<String> = (1..=self.definitions.len())
            .map(|ordinal| ordinal.to_string())
            .collect();
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
    fn test_update_default_profile_by_ordinal() {
        let fake = Rc::new(FakeTransport::sonarr());
        let api = client(&fake);
        let remote = DelayProfilesSettings::from_remote(&api).unwrap();
        assert_eq!(remote.definitions.len(), 1);

        let local = DelayProfilesSettings {
            delete_unmanaged: false,
            definitions: vec![DelayProfile {
                preferred_protocol: "torrent_only".to_string(),
                torrent_delay: 30,
                ..DelayProfile::default()
            }],
        };

        let mut sink = RecordingSink::new();
        let changed = local
            .update_remote("t.profiles.delay_profiles", &api, &remote, &mut sink)
            .unwrap();
        assert!(changed);

        let updated = &fake.collection("delayprofile")[0];
        assert_eq!(updated.get("enableUsenet"), Some(&json!(false)));
        assert_eq!(updated.get("enableTorrent"), Some(&json!(true)));
        assert_eq!(updated.get("torrentDelay"), Some(&json!(30)));
        // order attribute survives the full-payload overlay
        assert_eq!(updated.get("order"), Some(&json!(2147483647)));
    }

    #[test]
    fn test_round_trip_is_idempotent() {
        let fake = Rc::new(FakeTransport::sonarr());
        let api = client(&fake);
        let remote = DelayProfilesSettings::from_remote(&api).unwrap();
        let local = DelayProfilesSettings {
            delete_unmanaged: false,
            definitions: remote.definitions.clone(),
        };
        let mut sink = RecordingSink::new();
        let changed = local
            .update_remote("t", &api, &remote, &mut sink)
            .unwrap();
        assert!(!changed);
        assert!(sink.changes().next().is_none());
    }

    #[test]
    fn test_extra_profile_created() {
        let fake = Rc::new(FakeTransport::sonarr());
        let api = client(&fake);
        let remote = DelayProfilesSettings::from_remote(&api).unwrap();
        let mut local = DelayProfilesSettings {
            delete_unmanaged: false,
            definitions: remote.definitions.clone(),
        };
        local.definitions.push(DelayProfile {
            usenet_delay: 60,
            ..DelayProfile::default()
        });

        let changed = local
            .update_remote("t", &api, &remote, &mut RecordingSink::new())
            .unwrap();
        assert!(changed);
        assert_eq!(fake.collection("delayprofile").len(), 2);
    }
}
