use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::tree::{DirectoryId, Entry, EntryId, TreeObserver};

pub const DEFAULT_HIGHLIGHT: Duration = Duration::from_millis(550);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightKind {
    Created,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Highlight {
    kind: HighlightKind,
    until: Instant,
}

/// Display-side state kept next to the tree: which entries were touched
/// recently and whether anything changed since the last frame.
///
/// Highlights are stamped with the view's own clock, which only moves
/// through [`TreeView::advance`].
#[derive(Debug)]
pub struct TreeView {
    clock: Instant,
    highlight_for: Duration,
    highlights: HashMap<EntryId, Highlight>,
    fresh: HashSet<EntryId>,
    dirty: bool,
}

impl Default for TreeView {
    fn default() -> Self {
        Self::new(DEFAULT_HIGHLIGHT)
    }
}

impl TreeView {
    pub fn new(highlight_for: Duration) -> Self {
        Self {
            clock: Instant::now(),
            highlight_for,
            highlights: HashMap::new(),
            fresh: HashSet::new(),
            dirty: true,
        }
    }

    pub fn highlight(&self, id: EntryId, now: Instant) -> Option<HighlightKind> {
        self.highlights
            .get(&id)
            .filter(|highlight| now < highlight.until)
            .map(|highlight| highlight.kind)
    }

    /// Earliest instant at which a highlight wears off.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.highlights.values().map(|highlight| highlight.until).min()
    }

    /// Moves the clock to `now` and forgets highlights that wore off by then.
    pub fn advance(&mut self, now: Instant) {
        self.clock = now;
        let before = self.highlights.len();
        self.highlights.retain(|_, highlight| now < highlight.until);
        if self.highlights.len() != before {
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_drawn(&mut self) {
        self.dirty = false;
    }
}

impl TreeObserver for TreeView {
    fn directory_created(&mut self, _id: DirectoryId, _parent: DirectoryId, _position: usize) {
        self.dirty = true;
    }

    fn entry_created(&mut self, id: EntryId, _parent: DirectoryId, _position: usize) {
        self.fresh.insert(id);
        self.dirty = true;
    }

    fn entry_updated(&mut self, id: EntryId, _entry: &Entry) {
        let kind = if self.fresh.remove(&id) {
            HighlightKind::Created
        } else {
            HighlightKind::Updated
        };
        self.highlights.insert(
            id,
            Highlight {
                kind,
                until: self.clock + self.highlight_for,
            },
        );
        self.dirty = true;
    }

    fn cleared(&mut self) {
        self.highlights.clear();
        self.fresh.clear();
        self.dirty = true;
    }
}
