//! Quality definitions section.
//!
//! The quality catalog is fixed by the instance; only the size limits of
//! each definition are managed. Limits are megabytes per minute of
//! runtime, and the remote side rounds them, so comparison happens at one
//! decimal place to avoid phantom diffs.

use super::util::to_attrs;
use crate::api::{ArrClient, attr_str, resource_id};
use crate::error::{Error, Result};
use reconcile::{
    Attrs, ChangeRecord, Compare, DiagnosticSink, DiffOptions, RemoteMapEntry, local_attrs,
    update_diff,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Size limits for one quality definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityDefinition {
    /// Minimum size, in megabytes per minute
    pub min: f64,
    /// Maximum size, in megabytes per minute; unset means unlimited
    pub max: Option<f64>,
}

impl Default for QualityDefinition {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: None,
        }
    }
}

/// Quality definition limits, keyed by quality name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QualitySettings {
    /// Managed definitions. Definitions not listed here are left alone.
    pub definitions: BTreeMap<String, QualityDefinition>,
}

fn remote_map() -> Vec<RemoteMapEntry> {
    vec![
        RemoteMapEntry::new("min", "minSize").compare(Compare::Approx { decimals: 1 }),
        RemoteMapEntry::new("max", "maxSize").compare(Compare::Approx { decimals: 1 }),
    ]
}

/// Quality name of a listed definition resource.
fn quality_name(resource: &Attrs) -> Result<String> {
    let quality = resource
        .get("quality")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            Error::UnexpectedResponse("quality definition has no 'quality' attribute".to_string())
        })?;
    Ok(attr_str(quality, "name")?.to_string())
}

impl QualitySettings {
    /// Read the quality definition limits of a live instance.
    pub fn from_remote(api: &ArrClient) -> Result<Self> {
        let mut definitions = BTreeMap::new();
        for resource in api.resources("qualitydefinition").list()? {
            let attrs = local_attrs(&remote_map(), &resource)?;
            definitions.insert(
                quality_name(&resource)?,
                serde_json::from_value(Value::Object(attrs))?,
            );
        }
        Ok(Self { definitions })
    }

    /// Push changed limits back, one full-payload update per definition.
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
        let mut api_definitions = BTreeMap::new();
        for resource in api.resources("qualitydefinition").list()? {
            api_definitions.insert(quality_name(&resource)?, resource);
        }

        let mut changed = false;
        for (name, local) in &self.definitions {
            let definition_tree = format!("{tree}.definitions[{name}]");
            let api_resource = api_definitions.get(name).ok_or_else(|| {
                Error::Config(format!(
                    "quality definition '{name}' does not exist on the remote instance"
                ))
            })?;
            let remote_definition = remote.definitions.get(name).cloned().unwrap_or_default();
            let diff = update_diff(
                &definition_tree,
                &remote_map(),
                &to_attrs(local)?,
                &to_attrs(&remote_definition)?,
                DiffOptions::full_payload(),
                sink,
            )
            .map_err(Error::from)?;
            if diff.changed {
                let mut payload = api_resource.clone();
                for (attr, value) in diff.attrs {
                    payload.insert(attr, value);
                }
                let id = resource_id(api_resource)?;
                api.resources("qualitydefinition").update(id, &payload)?;
                changed = true;
            }
        }
        Ok(changed)
    }

    /// The catalog is owned by the instance; unmanaged definitions are
    /// only reported.
    pub fn delete_remote(
        &self,
        tree: &str,
        _api: &ArrClient,
        remote: &Self,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        for name in remote.definitions.keys() {
            if !self.definitions.contains_key(name) {
                sink.record(ChangeRecord::unmanaged(format!("{tree}.definitions[{name}]")));
            }
        }
        Ok(false)
    }
}
