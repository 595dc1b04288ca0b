//! In-memory mirror of the watched store subtree.
//!
//! The tree is rebuilt from upsert events alone: directories appear the first
//! time a path runs through them, entries are created or overwritten in place,
//! and nothing but a full reset ever removes a node.

mod observer;
mod store_event;
mod tree_engine;

pub use observer::TreeObserver;
pub use store_event::{EventDecodeError, EventPath, StoreEvent, VersionToken};
pub use tree_engine::{Applied, Directory, DirectoryId, Entry, EntryId, TreeEngine, TreeNode};
