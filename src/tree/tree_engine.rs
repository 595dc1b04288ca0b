use std::collections::HashMap;

use derive_more::Display;
use tracing::{debug, trace};

use crate::tree::{EventPath, StoreEvent, TreeObserver, VersionToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("dir#{_0}")]
pub struct DirectoryId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("entry#{_0}")]
pub struct EntryId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    name: String,
    directories: Vec<DirectoryId>,
    entries: Vec<EntryId>,
    directory_index: HashMap<String, DirectoryId>,
    entry_index: HashMap<String, EntryId>,
}

impl Directory {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            directories: Vec::new(),
            entries: Vec::new(),
            directory_index: HashMap::new(),
            entry_index: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sub-directories in display order.
    pub fn directories(&self) -> &[DirectoryId] {
        &self.directories
    }

    /// Entries in display order.
    pub fn entries(&self) -> &[EntryId] {
        &self.entries
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    name: String,
    version: VersionToken,
    body: String,
}

impl Entry {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: VersionToken::Missing,
            body: String::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &VersionToken {
        &self.version
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// A node looked up by path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeNode<'a> {
    Directory(DirectoryId, &'a Directory),
    Entry(EntryId, &'a Entry),
}

/// Outcome of an applied event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub entry: EntryId,
    pub created: bool,
}

/// Incrementally built mirror of the watched store subtree.
///
/// Directories and entries live in two arenas and are referenced by id from
/// their parent's ordered child lists. Nothing is ever removed except by
/// [`TreeEngine::reset`], which drops everything at once.
#[derive(Debug)]
pub struct TreeEngine<O: TreeObserver = ()> {
    directories: Vec<Directory>,
    entries: Vec<Entry>,
    observer: O,
}

impl TreeEngine<()> {
    pub fn new() -> Self {
        Self::with_observer(())
    }
}

impl Default for TreeEngine<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: TreeObserver> TreeEngine<O> {
    const ROOT: DirectoryId = DirectoryId(0);

    pub fn with_observer(observer: O) -> Self {
        Self {
            directories: vec![Directory::new("")],
            entries: Vec::new(),
            observer,
        }
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Upserts the entry named by `event.path`, creating missing directories
    /// on the way. Events without a basename are ignored.
    pub fn apply(&mut self, event: &StoreEvent) -> Option<Applied> {
        let Some(path) = EventPath::parse(&event.path) else {
            debug!("Ignoring event without a basename: {:?}", event.path);
            return None;
        };

        let mut current = Self::ROOT;
        for part in path.directories {
            current = match self.directory(current).directory_index.get(part) {
                Some(&existing) => existing,
                None => self.create_directory(current, part),
            };
        }

        let existing = self
            .directory(current)
            .entry_index
            .get(path.basename)
            .copied();
        let (id, created) = match existing {
            Some(id) => (id, false),
            None => (self.create_entry(current, path.basename), true),
        };

        let entry = &mut self.entries[id.0];
        entry.version = event.version.clone();
        entry.body = event.body.clone();
        trace!("Applied {} to {}", event.path, id);
        self.observer.entry_updated(id, entry);

        Some(Applied { entry: id, created })
    }

    /// Drops every directory and entry.
    pub fn reset(&mut self) {
        debug!(
            "Clearing tree with {} directories and {} entries",
            self.directories.len() - 1,
            self.entries.len()
        );
        self.directories.truncate(1);
        self.directories[0] = Directory::new("");
        self.entries.clear();
        self.observer.cleared();
    }

    pub fn root(&self) -> DirectoryId {
        Self::ROOT
    }

    pub fn directory(&self, id: DirectoryId) -> &Directory {
        &self.directories[id.0]
    }

    pub fn entry(&self, id: EntryId) -> &Entry {
        &self.entries[id.0]
    }

    /// Number of directories below the root.
    pub fn directory_count(&self) -> usize {
        self.directories.len() - 1
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directories.len() == 1 && self.entries.is_empty()
    }

    /// Looks up a node with the same path rules as [`TreeEngine::apply`].
    /// A path ending in `/` names a directory.
    pub fn find(&self, path: &str) -> Option<TreeNode<'_>> {
        let (chain, leaf) = match path.strip_suffix('/') {
            Some(directory_path) => (directory_path, None),
            None => {
                let parsed = EventPath::parse(path)?;
                let chain = &path[..path.len() - parsed.basename.len()];
                (chain.strip_suffix('/').unwrap_or(chain), Some(parsed.basename))
            }
        };

        let mut current = Self::ROOT;
        for part in chain.split('/').skip(1) {
            current = *self.directory(current).directory_index.get(part)?;
        }

        match leaf {
            None => Some(TreeNode::Directory(current, self.directory(current))),
            Some(name) => {
                let id = *self.directory(current).entry_index.get(name)?;
                Some(TreeNode::Entry(id, self.entry(id)))
            }
        }
    }

    fn create_directory(&mut self, parent: DirectoryId, name: &str) -> DirectoryId {
        let id = DirectoryId(self.directories.len());
        self.directories.push(Directory::new(name));

        let position = insertion_point(
            self.directories[parent.0]
                .directories
                .iter()
                .map(|sibling| self.directories[sibling.0].name.as_str()),
            name,
        );
        let parent_dir = &mut self.directories[parent.0];
        parent_dir.directories.insert(position, id);
        parent_dir.directory_index.insert(name.to_string(), id);

        debug!("Created directory '{}' ({}) under {}", name, id, parent);
        self.observer.directory_created(id, parent, position);
        id
    }

    fn create_entry(&mut self, parent: DirectoryId, name: &str) -> EntryId {
        let id = EntryId(self.entries.len());
        self.entries.push(Entry::new(name));

        let position = insertion_point(
            self.directories[parent.0]
                .entries
                .iter()
                .map(|sibling| self.entries[sibling.0].name.as_str()),
            name,
        );
        let parent_dir = &mut self.directories[parent.0];
        parent_dir.entries.insert(position, id);
        parent_dir.entry_index.insert(name.to_string(), id);

        self.observer.entry_created(id, parent, position);
        id
    }
}

/// Index right after the last sibling whose name sorts before `name`,
/// or 0 if there is none.
fn insertion_point<'a>(siblings: impl Iterator<Item = &'a str>, name: &str) -> usize {
    siblings
        .enumerate()
        .filter(|(_, sibling)| *sibling < name)
        .last()
        .map(|(index, _)| index + 1)
        .unwrap_or(0)
}
