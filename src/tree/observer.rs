use crate::tree::{DirectoryId, Entry, EntryId};

/// Receives every mutation the [`TreeEngine`](crate::tree::TreeEngine) makes.
///
/// Positions are indices into the parent's directory or entry list after the
/// insertion. All methods default to doing nothing.
pub trait TreeObserver {
    fn directory_created(&mut self, _id: DirectoryId, _parent: DirectoryId, _position: usize) {}

    fn entry_created(&mut self, _id: EntryId, _parent: DirectoryId, _position: usize) {}

    /// Called after every applied event, including the one that created the entry.
    fn entry_updated(&mut self, _id: EntryId, _entry: &Entry) {}

    fn cleared(&mut self) {}
}

impl TreeObserver for () {}
