//! # Reconcile
//!
//! A framework for converging remote HTTP-managed resources to a locally
//! declared desired state.
//!
//! The crate is the generic half of a declarative configuration tool: it
//! knows how to translate between a typed local configuration object and
//! an untyped remote attribute mapping, how to detect which fields
//! actually differ, and how to drive create/update/delete decisions over
//! keyed collections of resources. What the resources *are* and how the
//! remote API is reached stays with the caller.
//!
//! ## Core Concepts
//!
//! - [`RemoteMapEntry`]: one (local field, remote field, options) triple;
//!   a mapping table is a plain `Vec` of them
//! - [`local_attrs`] / [`remote_attrs`]: projection through a mapping
//!   table, in either direction
//! - [`update_diff`]: field-by-field change detection producing an update
//!   payload
//! - [`update_collection`] / [`delete_collection`]: reconciliation of
//!   keyed collections through a [`CollectionOps`] implementation
//! - [`DiagnosticSink`]: structured change records, passed explicitly so
//!   harnesses can capture events instead of parsing log text
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{update_diff, DiffOptions, LogSink, RemoteMapEntry};
//!
//! let map = vec![
//!     RemoteMapEntry::new("enable", "enable"),
//!     RemoteMapEntry::new("api_key", "apiKey").field(),
//! ];
//! let local = serde_json::to_value(&local_config)?;
//! let remote = serde_json::to_value(&remote_config)?;
//! let diff = update_diff(
//!     "sonarr.settings.indexers[Nyaa]",
//!     &map,
//!     local.as_object().unwrap(),
//!     remote.as_object().unwrap(),
//!     DiffOptions::full_payload(),
//!     &mut LogSink,
//! )?;
//! if diff.changed {
//!     // PUT diff.attrs back to the remote API
//! }
//! ```

pub mod collection;
pub mod diff;
pub mod error;
pub mod mapping;
pub mod projector;
pub mod sink;

// Re-export main types at crate root
pub use collection::{CollectionOps, delete_collection, update_collection};
pub use diff::{Diff, DiffOptions, update_diff};
pub use error::{Error, Result};
pub use mapping::{Compare, RemoteMapEntry};
pub use projector::{Attrs, local_attrs, merge_field_values, remote_attrs, select_schema};
pub use sink::{ChangeEvent, ChangeRecord, DiagnosticSink, LogSink, NullSink, RecordingSink};
