//! Terminal projection of the tree and the connection status.

mod frame;
mod palette;
mod screen;
mod tree_view;

pub use frame::{Frame, Header};
pub use palette::Palette;
pub use screen::{Screen, ScreenError};
pub use tree_view::{DEFAULT_HIGHLIGHT, HighlightKind, TreeView};
