//! Core asset vault types and traits.
//!
//! This crate defines the capabilities the file lifecycle engine is built
//! on. None of them are implemented by the engine itself:
//!
//! - Versioned object storage (`ObjectStore`, `StoreFeatures`) with per-key
//!   version chains and tombstones. Implementations live in
//!   `vault_store_memory` and `vault_store_local`.
//! - Asset metadata (`MetadataStore`): asset records, bucket configuration
//!   and the per-asset-version file snapshots. `MemoryMetadataStore` lives
//!   here, `RedbMetadataStore` in `vault_meta_redb`.
//! - Authorization (`PermissionOracle`) and change notification
//!   (`NotificationSink`).
//!
//! `chain` holds the version-chain model and paging rules the store
//! implementations share. The `retry` module wraps any `ObjectStore` with bounded retry for
//! throttling-class failures.

pub mod authz;
pub mod chain;
pub mod meta;
pub mod notify;
pub mod retry;
pub mod store;

// Test utilities (behind feature flag)
#[cfg(feature = "testutil")]
pub mod testutil;

pub use authz::{AllowAll, Operation, PermissionOracle, StaticPermissions, Subject};
pub use meta::memory::MemoryMetadataStore;
pub use meta::{Asset, AssetLocation, AssetVersionFileRecord, BucketConfig, MetadataStore};
pub use notify::{LogNotifier, NotificationSink};
pub use retry::{RetryConfig, RetryingStore};
pub use store::{
    CopyRequest, ObjectHead, ObjectPage, ObjectStore, ObjectSummary, PutOptions, StoreError,
    StoreFeatures, StoreResult, TagDirective, Tags, TombstoneEntry, VersionEntry, VersionPage,
};
