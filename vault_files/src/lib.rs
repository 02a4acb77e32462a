//! File lifecycle and archival engine for versioned asset storage.
//!
//! Files of an asset live under the asset's base key in a versioned
//! [`ObjectStore`](vault_core::ObjectStore). Archiving writes a tombstone,
//! deleting erases the whole version chain, and every operation on a base
//! file cascades to its `<name>.previewFile.<ext>` sidecars and to the
//! derived files kept in a separate auxiliary container.
//!
//! [`FileManager`] is the entry point; every operation is authorized
//! against the asset through a [`PermissionOracle`](vault_core::PermissionOracle)
//! before anything is read or written.

pub mod archive;
pub mod authorize;
pub mod cascade;
pub mod config;
pub mod error;
mod info;
mod listing;
mod manager;
pub mod mismatch;
pub mod model;
mod ops;
pub mod paths;
pub mod preview;
pub mod versions;

pub use cascade::{CascadeAction, CascadeOutcome, CascadeReport, CascadeStep};
pub use config::EngineConfig;
pub use error::{ErrorKind, FileError, FileResult};
pub use manager::FileManager;
pub use model::*;
pub use ops::transfer::{ASSET_ID_TAG, DATABASE_ID_TAG};
pub use versions::FileVersion;
