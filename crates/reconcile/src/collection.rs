//! Keyed-collection reconciliation.
//!
//! Generalizes change detection over collections of sub-resources matched
//! by natural key (name, label, external id). Creation and update happen
//! in one pass; deletion of unmanaged remote entries is a separate,
//! explicitly gated pass, so a caller can order deletions independently
//! of updates across resource types.

use crate::sink::{ChangeRecord, DiagnosticSink};
use std::collections::{BTreeMap, BTreeSet};

/// Remote-side operations for one collection of resources.
///
/// Implementations hold whatever API handles and freshly listed remote
/// state they need; the reconciliation driver only decides *which*
/// operation to invoke for each entry.
pub trait CollectionOps {
    /// Local configuration type of one collection entry
    type Resource;
    /// Error type surfaced by remote operations
    type Error;

    /// Create a resource that exists locally but not remotely.
    fn create(&mut self, tree: &str, key: &str, local: &Self::Resource)
    -> Result<(), Self::Error>;

    /// Diff a local entry against its remote counterpart and push an
    /// update if anything differs. Returns whether an update was issued.
    fn update(
        &mut self,
        tree: &str,
        key: &str,
        local: &Self::Resource,
        remote: &Self::Resource,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool, Self::Error>;

    /// Delete the remote resource matched by `key`.
    fn delete(&mut self, tree: &str, key: &str) -> Result<(), Self::Error>;
}

/// Create missing entries and update divergent ones.
///
/// Entries present only on the remote side are not touched here; see
/// [`delete_collection`]. Processing follows the order of `local`, so
/// side effects are deterministic across runs. When two local entries
/// share a natural key the first-declared one wins and the rest are
/// skipped with a warning.
pub fn update_collection<O: CollectionOps>(
    ops: &mut O,
    tree: &str,
    local: &[(String, &O::Resource)],
    remote: &[(String, &O::Resource)],
    sink: &mut dyn DiagnosticSink,
) -> Result<bool, O::Error> {
    let mut remote_by_key: BTreeMap<&str, &O::Resource> = BTreeMap::new();
    for (key, resource) in remote {
        remote_by_key.entry(key.as_str()).or_insert(resource);
    }

    let mut changed = false;
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    for (key, local_resource) in local {
        if !seen.insert(key.as_str()) {
            log::warn!("{tree}[{key}]: duplicate natural key, keeping first declaration");
            continue;
        }
        let entry_tree = format!("{tree}[{key}]");
        match remote_by_key.get(key.as_str()) {
            None => {
                sink.record(ChangeRecord::created(&entry_tree));
                ops.create(&entry_tree, key, local_resource)?;
                changed = true;
            }
            Some(remote_resource) => {
                if ops.update(&entry_tree, key, local_resource, remote_resource, sink)? {
                    changed = true;
                }
            }
        }
    }
    Ok(changed)
}

/// Delete remote entries with no local counterpart.
///
/// With `delete_unmanaged` unset, unmanaged entries are only reported and
/// the pass never counts as a change. Processing follows the order of
/// `remote_keys` for deterministic logs and side effects; keys are taken
/// from the fresh remote listing so entries the local model could not
/// decode are still covered.
pub fn delete_collection<O: CollectionOps>(
    ops: &mut O,
    tree: &str,
    local_keys: &BTreeSet<String>,
    remote_keys: &[String],
    delete_unmanaged: bool,
    sink: &mut dyn DiagnosticSink,
) -> Result<bool, O::Error> {
    let mut changed = false;
    for key in remote_keys {
        if local_keys.contains(key) {
            continue;
        }
        let entry_tree = format!("{tree}[{key}]");
        if delete_unmanaged {
            sink.record(ChangeRecord::deleted(&entry_tree));
            ops.delete(&entry_tree, key)?;
            changed = true;
        } else {
            sink.record(ChangeRecord::unmanaged(&entry_tree));
        }
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::sink::{ChangeEvent, RecordingSink};

    /// Ops stub that records invocations and reports divergence for
    /// resources whose value differs.
    #[derive(Default)]
    struct StubOps {
        calls: Vec<String>,
    }

    impl CollectionOps for StubOps {
        type Resource = i64;
        type Error = Error;

        fn create(&mut self, _tree: &str, key: &str, local: &i64) -> Result<(), Error> {
            self.calls.push(format!("create {key}={local}"));
            Ok(())
        }

        fn update(
            &mut self,
            _tree: &str,
            key: &str,
            local: &i64,
            remote: &i64,
            _sink: &mut dyn DiagnosticSink,
        ) -> Result<bool, Error> {
            if local != remote {
                self.calls.push(format!("update {key}={local}"));
                return Ok(true);
            }
            Ok(false)
        }

        fn delete(&mut self, _tree: &str, key: &str) -> Result<(), Error> {
            self.calls.push(format!("delete {key}"));
            Ok(())
        }
    }

    fn entries(pairs: &[(&str, i64)]) -> Vec<(String, i64)> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn borrowed(owned: &[(String, i64)]) -> Vec<(String, &i64)> {
        owned.iter().map(|(k, v)| (k.clone(), v)).collect()
    }

    #[test]
    fn test_update_creates_missing_and_updates_divergent() {
        let local = entries(&[("a", 1), ("b", 2), ("c", 3)]);
        let remote = entries(&[("b", 2), ("c", 9)]);
        let mut ops = StubOps::default();
        let mut sink = RecordingSink::new();
        let changed = update_collection(
            &mut ops,
            "t",
            &borrowed(&local),
            &borrowed(&remote),
            &mut sink,
        )
        .unwrap();
        assert!(changed);
        assert_eq!(ops.calls, vec!["create a=1", "update c=3"]);
        assert!(
            sink.records
                .iter()
                .any(|r| r.path == "t[a]" && r.event == ChangeEvent::Created)
        );
    }

    #[test]
    fn test_update_is_idempotent_when_converged() {
        let local = entries(&[("a", 1)]);
        let remote = entries(&[("a", 1)]);
        let mut ops = StubOps::default();
        let mut sink = RecordingSink::new();
        let changed = update_collection(
            &mut ops,
            "t",
            &borrowed(&local),
            &borrowed(&remote),
            &mut sink,
        )
        .unwrap();
        assert!(!changed);
        assert!(ops.calls.is_empty());
    }

    #[test]
    fn test_update_ignores_remote_only_entries() {
        let local = entries(&[]);
        let remote = entries(&[("a", 1)]);
        let mut ops = StubOps::default();
        let mut sink = RecordingSink::new();
        let changed = update_collection(
            &mut ops,
            "t",
            &borrowed(&local),
            &borrowed(&remote),
            &mut sink,
        )
        .unwrap();
        assert!(!changed);
        assert!(ops.calls.is_empty());
    }

    #[test]
    fn test_first_declared_entry_wins_on_key_collision() {
        let local = entries(&[("a", 1), ("a", 5)]);
        let remote = entries(&[]);
        let mut ops = StubOps::default();
        let mut sink = RecordingSink::new();
        update_collection(
            &mut ops,
            "t",
            &borrowed(&local),
            &borrowed(&remote),
            &mut sink,
        )
        .unwrap();
        assert_eq!(ops.calls, vec!["create a=1"]);
    }

    #[test]
    fn test_delete_gated_by_flag() {
        let remote_keys = vec!["a".to_string()];
        let local_keys = BTreeSet::new();
        let mut ops = StubOps::default();
        let mut sink = RecordingSink::new();

        let changed =
            delete_collection(&mut ops, "t", &local_keys, &remote_keys, false, &mut sink).unwrap();
        assert!(!changed);
        assert!(ops.calls.is_empty());
        assert!(
            sink.records
                .iter()
                .any(|r| r.path == "t[a]" && r.event == ChangeEvent::Unmanaged)
        );

        let changed =
            delete_collection(&mut ops, "t", &local_keys, &remote_keys, true, &mut sink).unwrap();
        assert!(changed);
        assert_eq!(ops.calls, vec!["delete a"]);
    }

    #[test]
    fn test_delete_leaves_managed_entries_alone() {
        let remote_keys = vec!["a".to_string(), "b".to_string()];
        let local_keys: BTreeSet<String> = ["a".to_string()].into();
        let mut ops = StubOps::default();
        let mut sink = RecordingSink::new();
        let changed =
            delete_collection(&mut ops, "t", &local_keys, &remote_keys, true, &mut sink).unwrap();
        assert!(changed);
        assert_eq!(ops.calls, vec!["delete b"]);
    }
}
