//! Profiles section.
//!
//! A nested section grouping quality profiles and delay profiles. Both
//! children always run, and the section reports a change when either did.

pub mod delay_profiles;
pub mod quality_profiles;

use crate::api::ArrClient;
use crate::error::Result;
use delay_profiles::DelayProfilesSettings;
use quality_profiles::QualityProfilesSettings;
use reconcile::DiagnosticSink;
use serde::{Deserialize, Serialize};

/// Profile settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilesSettings {
    /// Quality profiles, keyed by profile name
    pub quality_profiles: QualityProfilesSettings,
    /// Delay profiles, ordered by priority
    pub delay_profiles: DelayProfilesSettings,
}

impl ProfilesSettings {
    /// Reject invalid profile declarations.
    pub fn validate(&self) -> Result<()> {
        self.quality_profiles.validate()
    }

    /// Read the profiles of a live instance.
    pub fn from_remote(api: &ArrClient) -> Result<Self> {
        Ok(Self {
            quality_profiles: QualityProfilesSettings::from_remote(api)?,
            delay_profiles: DelayProfilesSettings::from_remote(api)?,
        })
    }

    /// Update both profile kinds; no short-circuiting between them.
    pub fn update_remote(
        &self,
        tree: &str,
        api: &ArrClient,
        remote: &Self,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        let results = [
            self.quality_profiles.update_remote(
                &format!("{tree}.quality_profiles"),
                api,
                &remote.quality_profiles,
                sink,
            )?,
            self.delay_profiles.update_remote(
                &format!("{tree}.delay_profiles"),
                api,
                &remote.delay_profiles,
                sink,
            )?,
        ];
        Ok(results.into_iter().any(|changed| changed))
    }

    /// Delete unmanaged profiles of both kinds, where enabled.
    pub fn delete_remote(
        &self,
        tree: &str,
        api: &ArrClient,
        remote: &Self,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<bool> {
        let results = [
            self.quality_profiles.delete_remote(
                &format!("{tree}.quality_profiles"),
                api,
                &remote.quality_profiles,
                sink,
            )?,
            self.delay_profiles.delete_remote(
                &format!("{tree}.delay_profiles"),
                api,
                &remote.delay_profiles,
                sink,
            )?,
        ];
        Ok(results.into_iter().any(|changed| changed))
    }
}
