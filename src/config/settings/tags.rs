//! Tags section.
//!
//! Tags are referenced by id from indexers, download clients and delay
//! profiles, so this section runs before every other one. The instance
//! garbage-collects tags nothing references anymore, so the delete pass
//! only reports unmanaged labels and never issues deletes itself.

use crate::api::ArrClient;
use crate::error::Result;
use reconcile::{ChangeRecord, DiagnosticSink};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Tag labels managed on the instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TagsSettings {
    /// Labels that must exist. Tags referenced anywhere else in the
    /// configuration need to be declared here.
    pub definitions: BTreeSet<String>,
}

impl TagsSettings {
    /// Read the tag labels of a live instance.
    pub fn from_remote(api: &ArrClient) -> Result<Self> {
        Ok(Self {
            definitions: api.tag_ids()?.into_keys().collect(),
        })
    }

    /// Create any missing tags.
    pub fn update_remote(
        &self,
        tree: &str,
        api: &ArrClient,
        _remote: &Self,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        if self.definitions.is_empty() {
            return Ok(false);
        }
        let current = api.tag_ids()?;
        let mut changed = false;
        for (i, label) in self.definitions.iter().enumerate() {
            let tag_tree = format!("{tree}.definitions[{i}]");
            if current.contains_key(label) {
                sink.record(ChangeRecord::unchanged(tag_tree, Some(Value::from(label.as_str()))));
            } else {
                sink.record(ChangeRecord::created(format!("{tag_tree} ({label})")));
                let mut attrs = reconcile::Attrs::new();
                attrs.insert("label".to_string(), Value::from(label.as_str()));
                api.resources("tag").create(&attrs)?;
                changed = true;
            }
        }
        Ok(changed)
    }

    /// Report unmanaged labels; the instance prunes unreferenced tags on
    /// its own, so nothing is deleted here.
    pub fn delete_remote(
        &self,
        tree: &str,
        api: &ArrClient,
        _remote: &Self,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        for label in api.tag_ids()?.keys() {
            if !self.definitions.contains(label) {
                sink.record(ChangeRecord::unmanaged(format!("{tree}.definitions[{label}]")));
            }
        }
        Ok(false)
    }
}
