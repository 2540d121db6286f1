// SPDX-License-Identifier: PMPL-1.0-or-later
//
// rtsdata Storage
//
// Ordered key-value backends and the typed measurement tables built on them.
//
// # Modules
//
// - [`backend`] -- The `StorageBackend` trait: get/put, atomic batches and
//   bounded range scans in either direction.
// - [`error`] -- The `StorageError` enum covering all backend failure modes.
// - [`memory`] -- An in-memory `BTreeMap` backend for tests and ephemeral
//   serving sessions.
// - [`keys`] -- Order-preserving key codec for reference and observation rows.
// - [`store`] -- `MeasurementStore`: batch inserts with reference checks,
//   descending range queries and min/max bounds per channel.
//
// # Example
//
// ```rust
// use rtsdata_model::{NewWell, WellRole};
// use rtsdata_storage::MeasurementStore;
//
// # async fn demo() {
// let store = MeasurementStore::in_memory();
// let wells = store
//     .insert_wells(&[NewWell {
//         name: "RJS739".to_string(),
//         role: WellRole::Producer,
//         metadata: serde_json::Value::Null,
//     }])
//     .await
//     .unwrap();
// assert_eq!(wells[0].id.get(), 1);
// # }
// ```

pub mod backend;
pub mod error;
pub mod keys;
pub mod memory;
pub mod store;

// Optional persistent backend, on by default.
#[cfg(feature = "redb-backend")]
pub mod redb_backend;

pub use backend::{ScanOrder, StorageBackend};
pub use error::StorageError;
pub use memory::InMemoryBackend;
pub use store::{Bounds, MeasurementStore, ReferenceCounts};

#[cfg(feature = "redb-backend")]
pub use redb_backend::RedbBackend;
