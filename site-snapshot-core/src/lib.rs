#![doc = "site-snapshot-core: core logic library for site-snapshot."]

//! This crate contains the index snapshot sequence, the search admin client,
//! and the static export steps used by the `site-snapshot` CLI.
//!
//! # Usage
//! Build an [`contract::IndexAdmin`] (normally [`elasticsearch::ElasticsearchAdmin`]),
//! hand it to a [`snapshot::Snapshotter`] and call [`snapshot::Snapshotter::snapshot`].
//! The full `snapshot-create` flow lives in [`pipeline`].

pub mod contract;
pub mod elasticsearch;
pub mod error;
pub mod export;
pub mod identifier;
pub mod index;
pub mod mirror;
pub mod pipeline;
pub mod snapshot;
