//! Status list document storage.
//!
//! Documents are keyed by list name. The [`DocumentStore`] trait defines the
//! persistence contract (atomic, forward-only writes with compare-and-swap);
//! [`InMemoryDocumentStore`] and [`FsDocumentStore`] implement it.
//!
//! [`StatusListService`] is the publisher-facing API on top: `init`,
//! `update`, `status`, the published payload, and the signed credential. It
//! serializes updates per list with [`KeyedLocks`] in-process, and
//! [`FsDocumentStore`] serializes writers across processes with a
//! [`FileLock`] per list.

pub mod config;
pub mod error;
pub mod filelock;
pub mod fs;
pub mod locks;
pub mod memory;
pub mod names;
pub mod service;
pub mod traits;

pub use config::PublisherConfig;
pub use error::{StoreError, StoreResult};
pub use filelock::FileLock;
pub use fs::FsDocumentStore;
pub use locks::KeyedLocks;
pub use memory::InMemoryDocumentStore;
pub use names::validate_list_name;
pub use service::{StatusListService, MAX_UPDATE_ATTEMPTS};
pub use traits::DocumentStore;
