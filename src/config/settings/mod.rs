//! Application settings sections and the cross-section orchestrator.
//!
//! Section execution order is fixed by referential dependencies and must
//! not be reordered:
//!
//! - updates: tags before everything that references tags by id, quality
//!   definitions before the quality profiles that reference them, and
//!   download clients before the indexers that route to them;
//! - deletions: referencing resources go first (indexers before download
//!   clients) so the remote side never sees a dangling reference.
//!
//! Every section always executes regardless of what earlier sections
//! reported, because each owns independent side effects; results are
//! aggregated afterwards.

pub mod custom_formats;
pub mod download_clients;
pub mod general;
pub mod import_lists;
pub mod indexers;
pub mod media_management;
pub mod metadata;
pub mod profiles;
pub mod quality;
pub mod tags;
pub mod ui;
mod util;

use crate::api::ArrClient;
use crate::error::Result;
use custom_formats::CustomFormatsSettings;
use download_clients::DownloadClientsSettings;
use general::GeneralSettings;
use import_lists::ImportListsSettings;
use indexers::IndexersSettings;
use media_management::MediaManagementSettings;
use metadata::MetadataSettings;
use profiles::ProfilesSettings;
use quality::QualitySettings;
use reconcile::DiagnosticSink;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tags::TagsSettings;
use ui::UiSettings;

/// All managed settings of one instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub media_management: MediaManagementSettings,
    pub profiles: ProfilesSettings,
    pub quality: QualitySettings,
    pub custom_formats: CustomFormatsSettings,
    pub indexers: IndexersSettings,
    pub download_clients: DownloadClientsSettings,
    pub import_lists: ImportListsSettings,
    pub metadata: MetadataSettings,
    pub tags: TagsSettings,
    pub general: GeneralSettings,
    pub ui: UiSettings,
}

impl Settings {
    /// Fail fast on invalid declarations, before any remote call.
    pub fn validate(&self) -> Result<()> {
        self.custom_formats.validate()?;
        self.import_lists.validate()?;
        self.profiles.validate()?;
        Ok(())
    }

    /// Reconstruct the settings of a live instance from its API.
    pub fn from_remote(api: &ArrClient) -> Result<Self> {
        Ok(Self {
            media_management: MediaManagementSettings::from_remote(api)?,
            profiles: ProfilesSettings::from_remote(api)?,
            quality: QualitySettings::from_remote(api)?,
            custom_formats: CustomFormatsSettings::from_remote(api)?,
            indexers: IndexersSettings::from_remote(api)?,
            download_clients: DownloadClientsSettings::from_remote(api)?,
            import_lists: ImportListsSettings::from_remote(api)?,
            metadata: MetadataSettings::from_remote(api)?,
            tags: TagsSettings::from_remote(api)?,
            general: GeneralSettings::from_remote(api)?,
            ui: UiSettings::from_remote(api)?,
        })
    }

    /// Run the update pass of every section, in dependency order.
    pub fn update_remote(
        &self,
        tree: &str,
        api: &ArrClient,
        remote: &Self,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        let results = [
            self.tags
                .update_remote(&format!("{tree}.tags"), api, &remote.tags, sink)?,
            self.quality
                .update_remote(&format!("{tree}.quality"), api, &remote.quality, sink)?,
            self.custom_formats.update_remote(
                &format!("{tree}.custom_formats"),
                api,
                &remote.custom_formats,
                sink,
            )?,
            self.download_clients.update_remote(
                &format!("{tree}.download_clients"),
                api,
                &remote.download_clients,
                sink,
            )?,
            self.indexers
                .update_remote(&format!("{tree}.indexers"), api, &remote.indexers, sink)?,
            self.media_management.update_remote(
                &format!("{tree}.media_management"),
                api,
                &remote.media_management,
                sink,
            )?,
            self.profiles
                .update_remote(&format!("{tree}.profiles"), api, &remote.profiles, sink)?,
            self.import_lists.update_remote(
                &format!("{tree}.import_lists"),
                api,
                &remote.import_lists,
                sink,
            )?,
            self.metadata
                .update_remote(&format!("{tree}.metadata"), api, &remote.metadata, sink)?,
            self.general
                .update_remote(&format!("{tree}.general"), api, &remote.general, sink)?,
            self.ui
                .update_remote(&format!("{tree}.ui"), api, &remote.ui, sink)?,
        ];
        Ok(results.into_iter().any(|changed| changed))
    }

    /// Run the delete pass of every section, in reverse dependency order.
    pub fn delete_remote(
        &self,
        tree: &str,
        api: &ArrClient,
        remote: &Self,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        let results = [
            self.import_lists.delete_remote(
                &format!("{tree}.import_lists"),
                api,
                &remote.import_lists,
                sink,
            )?,
            self.profiles
                .delete_remote(&format!("{tree}.profiles"), api, &remote.profiles, sink)?,
            self.indexers
                .delete_remote(&format!("{tree}.indexers"), api, &remote.indexers, sink)?,
            self.download_clients.delete_remote(
                &format!("{tree}.download_clients"),
                api,
                &remote.download_clients,
                sink,
            )?,
            self.media_management.delete_remote(
                &format!("{tree}.media_management"),
                api,
                &remote.media_management,
                sink,
            )?,
            self.tags
                .delete_remote(&format!("{tree}.tags"), api, &remote.tags, sink)?,
            self.custom_formats.delete_remote(
                &format!("{tree}.custom_formats"),
                api,
                &remote.custom_formats,
                sink,
            )?,
            self.quality
                .delete_remote(&format!("{tree}.quality"), api, &remote.quality, sink)?,
            self.metadata
                .delete_remote(&format!("{tree}.metadata"), api, &remote.metadata, sink)?,
            self.general
                .delete_remote(&format!("{tree}.general"), api, &remote.general, sink)?,
            self.ui
                .delete_remote(&format!("{tree}.ui"), api, &remote.ui, sink)?,
        ];
        Ok(results.into_iter().any(|changed| changed))
    }

    /// Natural keys of every locally managed collection entry, for the
    /// previous-run state snapshot.
    pub fn managed_keys(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut managed = BTreeMap::new();
        managed.insert(
            "tags".to_string(),
            self.tags.definitions.iter().cloned().collect(),
        );
        managed.insert(
            "custom_formats".to_string(),
            self.custom_formats.definitions.keys().cloned().collect(),
        );
        managed.insert(
            "download_clients".to_string(),
            self.download_clients.definitions.keys().cloned().collect(),
        );
        managed.insert(
            "indexers".to_string(),
            self.indexers.definitions.keys().cloned().collect(),
        );
        managed.insert(
            "quality_profiles".to_string(),
            self.profiles
                .quality_profiles
                .definitions
                .keys()
                .cloned()
                .collect(),
        );
        managed.insert(
            "import_list_exclusions".to_string(),
            self.import_lists
                .exclusions
                .iter()
                .map(|exclusion| exclusion.tvdb_id.to_string())
                .collect(),
        );
        managed
    }
}
