//! Treecache - Concurrently readable tree tables for key-value caching
//!
//! A cache is a set of named tables. Each table is an ordered map from
//! string keys to string values, supporting point lookup and insert-or-update.
//! There is no delete: tables only ever gain keys or overwrite values.
//!
//! The layers, from the bottom:
//!
//! * [treemap::TreeMap] - an unbalanced binary search tree. It does no
//!   locking of its own, and none of its operations recurse, so sorted
//!   insertion orders degrade lookups to O(n) but never exhaust the stack.
//! * [cowcell::CowCell] - a concurrently readable cell. Readers hold a
//!   stable snapshot, writers are serialised and publish on commit.
//! * [table::Table] - a named `TreeMap<String, String>` inside a `CowCell`.
//! * [cache::Cache] - the registry of tables, configured with
//!   [cache::CacheBuilder].
//!
//! Readers never block writers and writers never block readers. A reader is
//! guaranteed the content of their transaction will remain the same for the
//! duration of the read.
//!
//! # Features
//!
//! * `serde` - serialise and deserialise a `TreeMap` as a map

#![warn(unused_extern_crates)]
#![warn(missing_docs)]

pub mod cache;
pub mod cowcell;
pub mod error;
pub mod table;
pub mod treemap;

#[cfg(feature = "serde")]
mod utils;

pub use cache::{Cache, CacheBuilder};
pub use error::CacheError;
pub use table::Table;
pub use treemap::TreeMap;
