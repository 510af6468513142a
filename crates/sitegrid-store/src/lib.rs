//! sitegrid-store — embedded object store for SiteGrid.
//!
//! Backed by [redb](https://docs.rs/redb), holds grids, their expanded
//! child objects, grid status, and cluster nodes. This crate is the
//! repo's stand-in for the platform's object-store/watch collaborator;
//! the controller only consumes its read/write and watch surface.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value
//! columns under `{namespace}/{name}` composite keys. On top of plain
//! CRUD the store provides the semantics the reconciler depends on:
//!
//! - **Optimistic concurrency** — every child write bumps a
//!   `resource_version`; an update carrying a stale version fails with
//!   [`StoreError::Conflict`].
//! - **Owner references** — deleting a grid cascade-deletes every child
//!   whose owner points at it.
//! - **Watch events** — every mutation is published on a
//!   `tokio::sync::broadcast` channel as a [`WatchEvent`].
//!
//! The `GridStore` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`) and can be shared across async tasks.

pub mod error;
pub mod events;
pub mod store;
pub mod tables;

pub use error::{StoreError, StoreResult};
pub use events::{EventKind, WatchEvent};
pub use store::GridStore;
