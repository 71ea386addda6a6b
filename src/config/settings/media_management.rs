//! Media management section.
//!
//! A singleton configuration document; the remote API requires the full
//! object on every update, so the diff always emits every mapped field.

use super::util::{SingletonPart, csv_set_entry, str_enum_entry, to_attrs, update_singleton};
use crate::api::ArrClient;
use crate::error::{Error, Result};
use reconcile::{DiagnosticSink, RemoteMapEntry, local_attrs};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

const PROPERS_AND_REPACKS: &[(&str, &str)] = &[
    ("prefer_and_upgrade", "preferAndUpgrade"),
    ("do_not_upgrade", "doNotUpgrade"),
    ("do_not_prefer", "doNotPrefer"),
];

const EPISODE_TITLE_REQUIRED: &[(&str, &str)] = &[
    ("always", "always"),
    ("bulk_season_releases", "bulkSeasonReleases"),
    ("never", "never"),
];

const FILE_DATE: &[(&str, &str)] = &[
    ("none", "none"),
    ("local_air_date", "localAirDate"),
    ("utc_air_date", "utcAirDate"),
];

const RESCAN_AFTER_REFRESH: &[(&str, &str)] = &[
    ("always", "always"),
    ("after_manual", "afterManual"),
    ("never", "never"),
];

/// File and folder handling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaManagementSettings {
    /// Unmonitor episodes whose files were deleted from disk
    pub unmonitor_deleted_episodes: bool,
    /// How proper/repack releases upgrade existing files
    pub propers_and_repacks: String,
    /// Create series folders even before any file is imported
    pub create_empty_series_folders: bool,
    /// Delete folders left empty after moving files
    pub delete_empty_folders: bool,
    /// When an episode can be imported without a parsed title
    pub episode_title_required: String,
    /// Skip the free-space check before importing
    pub skip_free_space_check: bool,
    /// Minimum free space (MB) required to import
    pub minimum_free_space: u64,
    /// Hardlink instead of copying when the source is seeding
    pub use_hardlinks: bool,
    /// Import matching extra files next to episodes
    pub import_extra_files: bool,
    /// Extensions of extra files to import
    pub extra_file_extensions: BTreeSet<String>,
    /// Which timestamp to stamp imported files with
    pub change_file_date: String,
    /// Path files are moved to instead of being deleted
    pub recycling_bin: Option<String>,
    /// Days after which the recycling bin is emptied
    pub recycling_bin_cleanup: u32,
    /// When to rescan series folders after a refresh
    pub rescan_after_refresh: String,
    /// Apply a Unix permission mask to imported media
    pub set_permissions: bool,
    /// Folder permission mask, in octal
    pub chmod_folder: String,
    /// Group name or gid to own imported media
    pub chown_group: Option<String>,
}

impl Default for MediaManagementSettings {
    fn default() -> Self {
        Self {
            unmonitor_deleted_episodes: false,
            propers_and_repacks: "prefer_and_upgrade".to_string(),
            create_empty_series_folders: false,
            delete_empty_folders: false,
            episode_title_required: "always".to_string(),
            skip_free_space_check: false,
            minimum_free_space: 100,
            use_hardlinks: true,
            import_extra_files: false,
            extra_file_extensions: ["srt".to_string()].into(),
            change_file_date: "none".to_string(),
            recycling_bin: None,
            recycling_bin_cleanup: 7,
            rescan_after_refresh: "always".to_string(),
            set_permissions: false,
            chmod_folder: "755".to_string(),
            chown_group: None,
        }
    }
}

fn remote_map() -> Vec<RemoteMapEntry> {
    vec![
        RemoteMapEntry::new(
            "unmonitor_deleted_episodes",
            "autoUnmonitorPreviouslyDownloadedEpisodes",
        ),
        str_enum_entry(
            "propers_and_repacks",
            "downloadPropersAndRepacks",
            PROPERS_AND_REPACKS,
        ),
        RemoteMapEntry::new("create_empty_series_folders", "createEmptySeriesFolders"),
        RemoteMapEntry::new("delete_empty_folders", "deleteEmptyFolders"),
        str_enum_entry(
            "episode_title_required",
            "episodeTitleRequired",
            EPISODE_TITLE_REQUIRED,
        ),
        RemoteMapEntry::new("skip_free_space_check", "skipFreeSpaceCheckWhenImporting"),
        RemoteMapEntry::new("minimum_free_space", "minimumFreeSpaceWhenImporting"),
        RemoteMapEntry::new("use_hardlinks", "copyUsingHardlinks"),
        RemoteMapEntry::new("import_extra_files", "importExtraFiles"),
        csv_set_entry("extra_file_extensions", "extraFileExtensions"),
        str_enum_entry("change_file_date", "fileDate", FILE_DATE),
        RemoteMapEntry::new("recycling_bin", "recycleBin").field_default(Value::Null),
        RemoteMapEntry::new("recycling_bin_cleanup", "recycleBinCleanupDays"),
        str_enum_entry("rescan_after_refresh", "rescanAfterRefresh", RESCAN_AFTER_REFRESH),
        RemoteMapEntry::new("set_permissions", "setPermissionsLinux"),
        RemoteMapEntry::new("chmod_folder", "chmodFolder"),
        RemoteMapEntry::new("chown_group", "chownGroup").field_default(Value::Null),
    ]
}

impl MediaManagementSettings {
    /// Read the media management settings of a live instance.
    pub fn from_remote(api: &ArrClient) -> Result<Self> {
        let attrs = api.config_get("mediamanagement")?;
        let local = local_attrs(&remote_map(), &attrs).map_err(Error::from)?;
        Ok(serde_json::from_value(Value::Object(local))?)
    }

    /// Push the full document back when any field differs.
    pub fn update_remote(
        &self,
        tree: &str,
        api: &ArrClient,
        remote: &Self,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        update_singleton(
            api,
            "mediamanagement",
            &[SingletonPart {
                tree: tree.to_string(),
                map: remote_map(),
                local: to_attrs(self)?,
                remote: to_attrs(remote)?,
            }],
            sink,
        )
    }

    /// Singleton settings have nothing to delete.
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
    fn test_no_op_when_converged() {
        let fake = Rc::new(FakeTransport::sonarr());
        let api = client(&fake);
        let remote = MediaManagementSettings::from_remote(&api).unwrap();
        let local = remote.clone();

        let mut sink = RecordingSink::new();
        let changed = local
            .update_remote("t.media_management", &api, &remote, &mut sink)
            .unwrap();
        assert!(!changed);
        assert!(!fake.calls().iter().any(|c| c.starts_with("PUT")));
    }

    #[test]
    fn test_full_payload_update() {
        let fake = Rc::new(FakeTransport::sonarr());
        let api = client(&fake);
        let remote = MediaManagementSettings::from_remote(&api).unwrap();
        let mut local = remote.clone();
        local.use_hardlinks = false;
        local.extra_file_extensions.insert("nfo".to_string());
        local.propers_and_repacks = "do_not_upgrade".to_string();

        let mut sink = RecordingSink::new();
        let changed = local
            .update_remote("t.media_management", &api, &remote, &mut sink)
            .unwrap();
        assert!(changed);
        assert_eq!(sink.changes().count(), 3);

        let config = fake.config("mediamanagement");
        assert_eq!(config.get("copyUsingHardlinks"), Some(&json!(false)));
        assert_eq!(config.get("extraFileExtensions"), Some(&json!("nfo,srt")));
        assert_eq!(
            config.get("downloadPropersAndRepacks"),
            Some(&json!("doNotUpgrade"))
        );
        // untouched fields carried through from the live document
        assert_eq!(config.get("chmodFolder"), Some(&json!("755")));
    }
}
