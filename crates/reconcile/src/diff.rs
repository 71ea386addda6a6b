//! Change detection between local and remote-derived configuration.

use crate::error::Result;
use crate::mapping::RemoteMapEntry;
use crate::projector::Attrs;
use crate::sink::{ChangeRecord, DiagnosticSink};
use serde_json::Value;

/// Per-call policy knobs for a diff pass.
#[derive(Debug, Clone, Copy)]
pub struct DiffOptions {
    /// Include unchanged fields in the update payload. Required when the
    /// remote API expects the full object on every update.
    pub set_unchanged: bool,
    /// Compare fields whose local value is unset (null). When false, an
    /// unset local field is treated as unmanaged and left alone.
    pub manage_unset: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            set_unchanged: false,
            manage_unset: true,
        }
    }
}

impl DiffOptions {
    /// Full-payload update semantics: every field is written back.
    pub fn full_payload() -> Self {
        Self {
            set_unchanged: true,
            manage_unset: true,
        }
    }
}

/// Outcome of a diff pass.
#[derive(Debug)]
pub struct Diff {
    /// Whether any compared field differed
    pub changed: bool,
    /// Remote-shaped attributes to send in an update payload; `is_field`
    /// entries are collected under a `fields` list
    pub attrs: Attrs,
}

/// Compare a local configuration object against its remote-derived
/// counterpart, field by field in mapping declaration order.
///
/// Both inputs are local-shaped attribute maps (serialized configuration
/// objects); encoding to the remote representation happens only for the
/// values placed in the update payload. Every compared field is reported
/// to the sink under `tree.<local name>`.
pub fn update_diff(
    tree: &str,
    map: &[RemoteMapEntry],
    local: &Attrs,
    remote: &Attrs,
    opts: DiffOptions,
    sink: &mut dyn DiagnosticSink,
) -> Result<Diff> {
    let mut changed = false;
    let mut attrs = Attrs::new();
    let mut fields: Vec<Value> = Vec::new();

    for entry in map {
        let local_value = local.get(entry.local).cloned().unwrap_or(Value::Null);
        if local_value.is_null() && !opts.manage_unset {
            continue;
        }
        let remote_value = remote.get(entry.local).cloned().unwrap_or(Value::Null);
        let path = format!("{tree}.{}", entry.local);

        let include = if entry.compare.values_equal(&local_value, &remote_value) {
            sink.record(ChangeRecord::unchanged(path, Some(local_value.clone())));
            opts.set_unchanged
        } else {
            sink.record(ChangeRecord::changed(
                path,
                remote_value,
                local_value.clone(),
            ));
            changed = true;
            true
        };

        if include {
            let encoded = entry.encode(&local_value)?;
            if entry.is_field {
                let mut record = Attrs::new();
                record.insert("name".to_string(), Value::String(entry.remote.to_string()));
                record.insert("value".to_string(), encoded);
                fields.push(Value::Object(record));
            } else {
                attrs.insert(entry.remote.to_string(), encoded);
            }
        }
    }

    if !fields.is_empty() {
        attrs.insert("fields".to_string(), Value::Array(fields));
    }
    Ok(Diff { changed, attrs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{Compare, RemoteMapEntry};
    use crate::sink::{ChangeEvent, RecordingSink};
    use serde_json::json;

    fn attrs(value: serde_json::Value) -> Attrs {
        value.as_object().cloned().unwrap()
    }

    fn sample_map() -> Vec<RemoteMapEntry> {
        vec![
            RemoteMapEntry::new("enable", "enable"),
            RemoteMapEntry::new("tags", "tags").compare(Compare::Unordered),
            RemoteMapEntry::new("min_size", "minSize").compare(Compare::Approx { decimals: 1 }),
            RemoteMapEntry::new("api_key", "apiKey").field(),
        ]
    }

    #[test]
    fn test_no_op_diff_is_empty() {
        let state = attrs(json!({
            "enable": true, "tags": [1, 2], "min_size": 2.0, "api_key": "k",
        }));
        let mut sink = RecordingSink::new();
        let diff = update_diff(
            "t",
            &sample_map(),
            &state,
            &state,
            DiffOptions::default(),
            &mut sink,
        )
        .unwrap();
        assert!(!diff.changed);
        assert!(diff.attrs.is_empty());
        assert!(sink.changes().next().is_none());
    }

    #[test]
    fn test_no_op_diff_with_set_unchanged_reports_no_change() {
        let state = attrs(json!({
            "enable": true, "tags": [1, 2], "min_size": 2.0, "api_key": "k",
        }));
        let mut sink = RecordingSink::new();
        let diff = update_diff(
            "t",
            &sample_map(),
            &state,
            &state,
            DiffOptions::full_payload(),
            &mut sink,
        )
        .unwrap();
        // every field present in the payload, but nothing counts as changed
        assert!(!diff.changed);
        assert_eq!(diff.attrs.len(), 4);
        assert!(sink.changes().next().is_none());
    }

    #[test]
    fn test_changed_field_carries_local_value() {
        let local = attrs(json!({
            "enable": false, "tags": [1, 2], "min_size": 2.0, "api_key": "k",
        }));
        let remote = attrs(json!({
            "enable": true, "tags": [2, 1], "min_size": 2.04, "api_key": "k",
        }));
        let mut sink = RecordingSink::new();
        let diff = update_diff(
            "t",
            &sample_map(),
            &local,
            &remote,
            DiffOptions::default(),
            &mut sink,
        )
        .unwrap();
        assert!(diff.changed);
        // set order and float rounding do not count as changes
        assert_eq!(diff.attrs.len(), 1);
        assert_eq!(diff.attrs.get("enable"), Some(&json!(false)));
        let changes: Vec<_> = sink.changes().collect();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "t.enable");
        assert_eq!(
            changes[0].event,
            ChangeEvent::Changed {
                from: json!(true),
                to: json!(false),
            }
        );
    }

    #[test]
    fn test_field_entries_collected_into_fields_list() {
        let local = attrs(json!({
            "enable": true, "tags": [], "min_size": 0.0, "api_key": "new",
        }));
        let remote = attrs(json!({
            "enable": true, "tags": [], "min_size": 0.0, "api_key": "old",
        }));
        let mut sink = RecordingSink::new();
        let diff = update_diff(
            "t",
            &sample_map(),
            &local,
            &remote,
            DiffOptions::default(),
            &mut sink,
        )
        .unwrap();
        assert!(diff.changed);
        assert_eq!(
            diff.attrs.get("fields"),
            Some(&json!([{"name": "apiKey", "value": "new"}]))
        );
    }

    #[test]
    fn test_unset_local_skipped_when_not_managing_unset() {
        let map = vec![RemoteMapEntry::new("url_base", "urlBase")];
        let local = attrs(json!({"url_base": null}));
        let remote = attrs(json!({"url_base": "/sonarr"}));
        let mut sink = RecordingSink::new();
        let opts = DiffOptions {
            set_unchanged: false,
            manage_unset: false,
        };
        let diff = update_diff("t", &map, &local, &remote, opts, &mut sink).unwrap();
        assert!(!diff.changed);
        assert!(sink.records.is_empty());
    }
}
