//! Shared helpers for the settings sections.
//!
//! Mapping-entry constructors for the codecs that recur across sections
//! (tag label/id translation, enum encodings, comma-joined sets), plus the
//! create/update shapes shared by every polymorphic resource endpoint.

use crate::api::{ArrClient, resource_id};
use crate::error::Result;
use reconcile::{
    Attrs, Compare, DiagnosticSink, DiffOptions, RemoteMapEntry, merge_field_values, remote_attrs,
    select_schema, update_diff,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Serialize a configuration object into its local attribute map.
pub(crate) fn to_attrs<T: Serialize>(value: &T) -> Result<Attrs> {
    match serde_json::to_value(value)? {
        Value::Object(attrs) => Ok(attrs),
        other => Err(crate::error::Error::Config(format!(
            "configuration object did not serialize to a mapping: {other}"
        ))),
    }
}

/// Mapping entry for a set of tag labels stored remotely as a sorted list
/// of tag ids. The label/id table is captured at table-build time.
pub(crate) fn tags_entry(tag_ids: BTreeMap<String, i64>) -> RemoteMapEntry {
    let encode_ids = tag_ids.clone();
    RemoteMapEntry::new("tags", "tags")
        .compare(Compare::Unordered)
        .encoder(move |value| {
            let labels = value.as_array().cloned().unwrap_or_default();
            let mut ids = Vec::with_capacity(labels.len());
            for label in &labels {
                let label = label.as_str().unwrap_or_default();
                match encode_ids.get(label) {
                    Some(id) => ids.push(*id),
                    None => {
                        return Err(reconcile::Error::InvalidValue {
                            attr: "tags".to_string(),
                            message: format!("tag '{label}' does not exist on the remote instance"),
                        });
                    }
                }
            }
            ids.sort_unstable();
            Ok(Value::from(ids))
        })
        .decoder(move |value| {
            let ids: Vec<i64> = value
                .as_array()
                .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
                .unwrap_or_default();
            let labels: Vec<&str> = tag_ids
                .iter()
                .filter(|(_, id)| ids.contains(id))
                .map(|(label, _)| label.as_str())
                .collect();
            Ok(serde_json::to_value(labels)?)
        })
}

/// Mapping entry for an enum stored remotely as a different string.
pub(crate) fn str_enum_entry(
    local: &'static str,
    remote: &'static str,
    pairs: &'static [(&'static str, &'static str)],
) -> RemoteMapEntry {
    RemoteMapEntry::new(local, remote)
        .encoder(move |value| {
            let name = value.as_str().unwrap_or_default();
            pairs
                .iter()
                .find(|(local_name, _)| *local_name == name)
                .map(|(_, remote_name)| Value::from(*remote_name))
                .ok_or_else(|| reconcile::Error::InvalidValue {
                    attr: local.to_string(),
                    message: format!("unrecognized value '{name}'"),
                })
        })
        .decoder(move |value| {
            let name = value.as_str().unwrap_or_default();
            pairs
                .iter()
                .find(|(_, remote_name)| *remote_name == name)
                .map(|(local_name, _)| Value::from(*local_name))
                .ok_or_else(|| reconcile::Error::InvalidValue {
                    attr: remote.to_string(),
                    message: format!("unrecognized remote value '{name}'"),
                })
        })
}

/// Mapping entry for an enum stored remotely as an integer.
pub(crate) fn int_enum_entry(
    local: &'static str,
    remote: &'static str,
    pairs: &'static [(&'static str, i64)],
) -> RemoteMapEntry {
    RemoteMapEntry::new(local, remote)
        .encoder(move |value| {
            let name = value.as_str().unwrap_or_default();
            pairs
                .iter()
                .find(|(local_name, _)| *local_name == name)
                .map(|(_, code)| Value::from(*code))
                .ok_or_else(|| reconcile::Error::InvalidValue {
                    attr: local.to_string(),
                    message: format!("unrecognized value '{name}'"),
                })
        })
        .decoder(move |value| {
            let code = value.as_i64().unwrap_or_default();
            pairs
                .iter()
                .find(|(_, remote_code)| *remote_code == code)
                .map(|(local_name, _)| Value::from(*local_name))
                .ok_or_else(|| reconcile::Error::InvalidValue {
                    attr: remote.to_string(),
                    message: format!("unrecognized remote value '{code}'"),
                })
        })
}

/// Mapping entry for a set of strings stored remotely as one
/// comma-separated string.
pub(crate) fn csv_set_entry(local: &'static str, remote: &'static str) -> RemoteMapEntry {
    RemoteMapEntry::new(local, remote)
        .compare(Compare::Unordered)
        .encoder(|value| {
            let items: Vec<&str> = value
                .as_array()
                .map(|items| items.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            Ok(Value::from(items.join(",")))
        })
        .decoder(|value| {
            let items: Vec<&str> = value
                .as_str()
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .collect();
            Ok(serde_json::to_value(items)?)
        })
}

/// Mapping entry for an optional string the remote API stores as an empty
/// string when unset.
pub(crate) fn optional_text_entry(local: &'static str, remote: &'static str) -> RemoteMapEntry {
    RemoteMapEntry::new(local, remote)
        .encoder(|value| match value {
            Value::Null => Ok(Value::from("")),
            other => Ok(other.clone()),
        })
        .decoder(|value| match value.as_str() {
            Some("") | None => Ok(Value::Null),
            Some(text) => Ok(Value::from(text)),
        })
}

/// Create a polymorphic resource, seeding unmapped parameters from the
/// implementation's schema template.
pub(crate) fn create_resource(
    api: &ArrClient,
    endpoint: &'static str,
    name: &str,
    implementation: &str,
    schemas: &[Attrs],
    map: &[RemoteMapEntry],
    local: &Attrs,
) -> Result<()> {
    let schema = select_schema(schemas, implementation).map_err(crate::error::Error::from)?;
    let set_attrs = remote_attrs(map, local).map_err(crate::error::Error::from)?;

    let mut resource = schema;
    let base_fields = resource
        .get("fields")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let computed_fields = set_attrs
        .get("fields")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for (attr, value) in set_attrs {
        if attr != "fields" {
            resource.insert(attr, value);
        }
    }
    if !base_fields.is_empty() || !computed_fields.is_empty() {
        resource.insert(
            "fields".to_string(),
            Value::Array(merge_field_values(&base_fields, &computed_fields)),
        );
    }
    resource.insert("name".to_string(), Value::from(name));

    api.resources(endpoint).create(&resource)?;
    Ok(())
}

/// Diff a resource against its remote counterpart and push a full-payload
/// update when anything differs. Field values are merged back into the
/// field list of the live API resource, so schema-mandated entries the
/// mapping does not cover pass through untouched.
pub(crate) fn update_resource(
    api: &ArrClient,
    endpoint: &'static str,
    tree: &str,
    map: &[RemoteMapEntry],
    local: &Attrs,
    remote: &Attrs,
    api_resource: &Attrs,
    sink: &mut dyn DiagnosticSink,
) -> Result<bool> {
    let diff = update_diff(tree, map, local, remote, DiffOptions::full_payload(), sink)
        .map_err(crate::error::Error::from)?;
    if !diff.changed {
        return Ok(false);
    }

    let mut resource = api_resource.clone();
    let base_fields = api_resource
        .get("fields")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let computed_fields = diff
        .attrs
        .get("fields")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for (attr, value) in diff.attrs {
        if attr != "fields" {
            resource.insert(attr, value);
        }
    }
    if !base_fields.is_empty() || !computed_fields.is_empty() {
        resource.insert(
            "fields".to_string(),
            Value::Array(merge_field_values(&base_fields, &computed_fields)),
        );
    }

    let id = resource_id(api_resource)?;
    api.resources(endpoint).update(id, &resource)?;
    Ok(true)
}

/// One independently mapped slice of a singleton config document.
pub(crate) struct SingletonPart {
    pub tree: String,
    pub map: Vec<RemoteMapEntry>,
    pub local: Attrs,
    pub remote: Attrs,
}

/// Diff the parts of a singleton `/config/{slug}` document and push one
/// combined full-payload update when any part changed. Every part is
/// diffed even after a change is found, so all change records are emitted.
pub(crate) fn update_singleton(
    api: &ArrClient,
    slug: &str,
    parts: &[SingletonPart],
    sink: &mut dyn DiagnosticSink,
) -> Result<bool> {
    let api_attrs = api.config_get(slug)?;
    let id = resource_id(&api_attrs)?;

    let mut changed = false;
    let mut payload = api_attrs;
    for part in parts {
        let diff = update_diff(
            &part.tree,
            &part.map,
            &part.local,
            &part.remote,
            DiffOptions::full_payload(),
            sink,
        )
        .map_err(crate::error::Error::from)?;
        changed |= diff.changed;
        for (attr, value) in diff.attrs {
            payload.insert(attr, value);
        }
    }

    if changed {
        payload.insert("id".to_string(), Value::from(id));
        api.config_put(slug, id, &payload)?;
    }
    Ok(changed)
}

/// Find a resource in a listing by its `implementation` attribute.
pub(crate) fn find_by_implementation<'a>(
    listing: &'a [Attrs],
    implementation: &str,
) -> Option<&'a Attrs> {
    listing.iter().find(|resource| {
        resource
            .get("implementation")
            .and_then(Value::as_str)
            .is_some_and(|name| name.eq_ignore_ascii_case(implementation))
    })
}
