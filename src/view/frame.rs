use std::time::Instant;

use crate::connection::{ConnectionState, StatusLine};
use crate::tree::{DirectoryId, TreeEngine};
use crate::view::{Palette, TreeView};

const INDENT: &str = "  ";
const TRY_NOW_HINT: &str = "[Enter: try now]";
const WERE_BACK_NOTICE: &str = "...and, we're back!";

/// Static part of the frame: which cluster and subtree are shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub path: String,
}

/// Projects the current tree and connection status into printable text.
pub struct Frame<'a> {
    pub header: &'a Header,
    pub status: &'a StatusLine,
    pub tree: &'a TreeEngine<TreeView>,
    pub palette: Palette,
    pub now: Instant,
}

impl Frame<'_> {
    pub fn render(&self) -> String {
        let mut lines = vec![
            self.palette.title(&format!(
                "{} {} doozer viewer",
                self.header.name, self.header.path
            )),
            self.status_line(),
            String::new(),
            self.palette.directory(&self.header.path),
        ];
        self.push_directory(&mut lines, self.tree.root(), 1);
        lines.join("\n")
    }

    fn status_line(&self) -> String {
        let mut parts = vec![self.palette.status(
            &format!("[{}]", self.status.text),
            self.status.state,
        )];
        if self.status.state == ConnectionState::WaitingToRetry {
            if let Some(message) = &self.status.retry_message {
                parts.push(message.clone());
                parts.push(TRY_NOW_HINT.to_string());
            }
        }
        if self.status.were_back {
            parts.push(self.palette.notice(WERE_BACK_NOTICE));
        }
        parts.join("  ")
    }

    fn push_directory(&self, lines: &mut Vec<String>, id: DirectoryId, depth: usize) {
        let indent = INDENT.repeat(depth);
        let directory = self.tree.directory(id);

        for child in directory.directories() {
            let name = format!("{}/", self.tree.directory(*child).name());
            lines.push(format!("{indent}{}", self.palette.directory(&name)));
            self.push_directory(lines, *child, depth + 1);
        }

        let view = self.tree.observer();
        for child in directory.entries() {
            let entry = self.tree.entry(*child);
            let line = format!(
                "{} {} = {}",
                entry.name(),
                self.palette.version(&format!("({})", entry.version())),
                escape_body(entry.body())
            );
            lines.push(format!(
                "{indent}{}",
                self.palette.highlight(&line, view.highlight(*child, self.now))
            ));
        }
    }
}

fn escape_body(body: &str) -> String {
    body.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}
