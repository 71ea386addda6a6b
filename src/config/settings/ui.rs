//! UI settings section.

use super::util::{SingletonPart, int_enum_entry, str_enum_entry, to_attrs, update_singleton};
use crate::api::ArrClient;
use crate::error::{Error, Result};
use reconcile::{DiagnosticSink, RemoteMapEntry, local_attrs};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const FIRST_DAY_OF_WEEK: &[(&str, i64)] = &[("sunday", 0), ("monday", 1)];

const TIME_FORMAT: &[(&str, &str)] = &[
    ("twelve_hour", "h(:mm)a"),
    ("twenty_four_hour", "HH:mm"),
];

/// Web UI display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    /// First day of the calendar week
    pub first_day_of_week: String,
    /// Column header format on the calendar week view
    pub week_column_header: String,
    /// Short date format
    pub short_date_format: String,
    /// Long date format
    pub long_date_format: String,
    /// Clock format
    pub time_format: String,
    /// Show relative dates (today, yesterday) instead of absolute ones
    pub show_relative_dates: bool,
    /// Color-impaired friendly palette
    pub enable_color_impaired_mode: bool,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            first_day_of_week: "sunday".to_string(),
            week_column_header: "ddd M/D".to_string(),
            short_date_format: "MMM D YYYY".to_string(),
            long_date_format: "dddd, MMMM D YYYY".to_string(),
            time_format: "twelve_hour".to_string(),
            show_relative_dates: true,
            enable_color_impaired_mode: false,
        }
    }
}

fn remote_map() -> Vec<RemoteMapEntry> {
    vec![
        int_enum_entry("first_day_of_week", "firstDayOfWeek", FIRST_DAY_OF_WEEK),
        RemoteMapEntry::new("week_column_header", "calendarWeekColumnHeader"),
        RemoteMapEntry::new("short_date_format", "shortDateFormat"),
        RemoteMapEntry::new("long_date_format", "longDateFormat"),
        str_enum_entry("time_format", "timeFormat", TIME_FORMAT),
        RemoteMapEntry::new("show_relative_dates", "showRelativeDates"),
        RemoteMapEntry::new("enable_color_impaired_mode", "enableColorImpairedMode"),
    ]
}

impl UiSettings {
    /// Read the UI settings of a live instance.
    pub fn from_remote(api: &ArrClient) -> Result<Self> {
        let attrs = api.config_get("ui")?;
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
            "ui",
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
