//! Import list exclusions section.
//!
//! Exclusions stop import lists from ever adding a series. They are
//! matched between local and remote state by TVDB id; the remote-assigned
//! resource id is only used for update and delete calls.

use super::util::to_attrs;
use crate::api::{ArrClient, resource_id};
use crate::error::{Error, Result};
use reconcile::{
    Attrs, CollectionOps, DiagnosticSink, DiffOptions, RemoteMapEntry, delete_collection,
    local_attrs, remote_attrs, update_collection, update_diff,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// One series excluded from import lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListExclusion {
    /// TVDB id of the series
    pub tvdb_id: i64,
    /// Series title
    pub title: String,
    /// First-aired year
    pub year: u32,
}

fn remote_map() -> Vec<RemoteMapEntry> {
    vec![
        RemoteMapEntry::new("tvdb_id", "tvdbId"),
        RemoteMapEntry::new("title", "title"),
        RemoteMapEntry::new("year", "year"),
    ]
}

/// Import list handling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportListsSettings {
    /// Delete remote exclusions with no local declaration
    pub delete_unmanaged_exclusions: bool,
    /// Series excluded from all import lists, in declaration order
    pub exclusions: Vec<ListExclusion>,
}

struct ExclusionOps<'a> {
    api: &'a ArrClient,
    api_exclusions: BTreeMap<String, Attrs>,
}

impl CollectionOps for ExclusionOps<'_> {
    type Resource = ListExclusion;
    type Error = Error;

    fn create(&mut self, _tree: &str, _key: &str, local: &ListExclusion) -> Result<()> {
        let attrs = remote_attrs(&remote_map(), &to_attrs(local)?).map_err(Error::from)?;
        self.api.resources("importlistexclusion").create(&attrs)?;
        Ok(())
    }

    fn update(
        &mut self,
        tree: &str,
        key: &str,
        local: &ListExclusion,
        remote: &ListExclusion,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        let diff = update_diff(
            tree,
            &remote_map(),
            &to_attrs(local)?,
            &to_attrs(remote)?,
            DiffOptions::full_payload(),
            sink,
        )
        .map_err(Error::from)?;
        if !diff.changed {
            return Ok(false);
        }
        let api_resource = self.api_exclusions.get(key).ok_or_else(|| {
            Error::UnexpectedResponse(format!("exclusion '{key}' vanished from the remote"))
        })?;
        let mut payload = api_resource.clone();
        for (attr, value) in diff.attrs {
            payload.insert(attr, value);
        }
        let id = resource_id(api_resource)?;
        self.api
            .resources("importlistexclusion")
            .update(id, &payload)?;
        Ok(true)
    }

    fn delete(&mut self, _tree: &str, key: &str) -> Result<()> {
        let api_resource = self.api_exclusions.get(key).ok_or_else(|| {
            Error::UnexpectedResponse(format!("exclusion '{key}' vanished from the remote"))
        })?;
        self.api
            .resources("importlistexclusion")
            .delete(resource_id(api_resource)?)
    }
}

impl ImportListsSettings {
    /// Reject duplicate TVDB ids at construction time.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for exclusion in &self.exclusions {
            if !seen.insert(exclusion.tvdb_id) {
                return Err(Error::Config(format!(
                    "import_lists.exclusions: duplicate TVDB id {}",
                    exclusion.tvdb_id
                )));
            }
        }
        Ok(())
    }

    /// Read the exclusions of a live instance.
    pub fn from_remote(api: &ArrClient) -> Result<Self> {
        let mut exclusions = Vec::new();
        for resource in api.resources("importlistexclusion").list()? {
            let attrs = local_attrs(&remote_map(), &resource).map_err(Error::from)?;
            exclusions.push(serde_json::from_value(Value::Object(attrs))?);
        }
        Ok(Self {
            delete_unmanaged_exclusions: false,
            exclusions,
        })
    }

    fn ops<'a>(&self, api: &'a ArrClient) -> Result<ExclusionOps<'a>> {
        let mut api_exclusions = BTreeMap::new();
        for resource in api.resources("importlistexclusion").list()? {
            let tvdb_id = resource
                .get("tvdbId")
                .and_then(Value::as_i64)
                .ok_or_else(|| {
                    Error::UnexpectedResponse("exclusion has no 'tvdbId' attribute".to_string())
                })?;
            api_exclusions.entry(tvdb_id.to_string()).or_insert(resource);
        }
        Ok(ExclusionOps { api, api_exclusions })
    }

    fn keyed(exclusions: &[ListExclusion]) -> Vec<(String, &ListExclusion)> {
        exclusions
            .iter()
            .map(|exclusion| (exclusion.tvdb_id.to_string(), exclusion))
            .collect()
    }

    /// Create and update exclusions.
    pub fn update_remote(
        &self,
        tree: &str,
        api: &ArrClient,
        remote: &Self,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        if self.exclusions.is_empty() && remote.exclusions.is_empty() {
            return Ok(false);
        }
        let mut ops = self.ops(api)?;
        update_collection(
            &mut ops,
            &format!("{tree}.exclusions"),
            &Self::keyed(&self.exclusions),
            &Self::keyed(&remote.exclusions),
            sink,
        )
    }

    /// Delete unmanaged exclusions, when enabled.
    pub fn delete_remote(
        &self,
        tree: &str,
        api: &ArrClient,
        _remote: &Self,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        let mut ops = self.ops(api)?;
        let local_keys: BTreeSet<String> = self
            .exclusions
            .iter()
            .map(|exclusion| exclusion.tvdb_id.to_string())
            .collect();
        let remote_keys: Vec<String> = ops.api_exclusions.keys().cloned().collect();
        delete_collection(
            &mut ops,
            &format!("{tree}.exclusions"),
            &local_keys,
            &remote_keys,
            self.delete_unmanaged_exclusions,
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

    fn teletubbies() -> ListExclusion {
        ListExclusion {
            tvdb_id: 72662,
            title: "Teletubbies".to_string(),
            year: 1997,
        }
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let settings = ImportListsSettings {
            delete_unmanaged_exclusions: false,
            exclusions: vec![teletubbies(), teletubbies()],
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_create_then_update() {
        let fake = Rc::new(FakeTransport::new());
        let api = client(&fake);
        let mut local = ImportListsSettings {
            delete_unmanaged_exclusions: false,
            exclusions: vec![teletubbies()],
        };

        let remote = ImportListsSettings::from_remote(&api).unwrap();
        let changed = local
            .update_remote("t.import_lists", &api, &remote, &mut RecordingSink::new())
            .unwrap();
        assert!(changed);
        assert_eq!(fake.collection("importlistexclusion").len(), 1);

        // matched by tvdb id, updated in place
        local.exclusions[0].year = 1998;
        let remote = ImportListsSettings::from_remote(&api).unwrap();
        let changed = local
            .update_remote("t.import_lists", &api, &remote, &mut RecordingSink::new())
            .unwrap();
        assert!(changed);
        let exclusions = fake.collection("importlistexclusion");
        assert_eq!(exclusions.len(), 1);
        assert_eq!(exclusions[0].get("year"), Some(&json!(1998)));
    }

    #[test]
    fn test_delete_gating() {
        let fake = Rc::new(FakeTransport::new());
        fake.seed_collection(
            "importlistexclusion",
            vec![json!({"id": 3, "tvdbId": 72662, "title": "Teletubbies", "year": 1997})],
        );
        let api = client(&fake);
        let mut local = ImportListsSettings::default();

        let remote = ImportListsSettings::from_remote(&api).unwrap();
        let mut sink = RecordingSink::new();
        let changed = local
            .delete_remote("t.import_lists", &api, &remote, &mut sink)
            .unwrap();
        assert!(!changed);
        assert_eq!(fake.collection("importlistexclusion").len(), 1);

        local.delete_unmanaged_exclusions = true;
        let changed = local
            .delete_remote("t.import_lists", &api, &remote, &mut sink)
            .unwrap();
        assert!(changed);
        assert!(fake.collection("importlistexclusion").is_empty());
    }
}
