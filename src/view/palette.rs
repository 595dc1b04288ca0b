use colored::Colorize;

use crate::connection::ConnectionState;
use crate::view::HighlightKind;

/// Decides whether and how frame fragments get coloured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn plain() -> Self {
        Self::new(false)
    }

    pub fn title(&self, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }
        text.bold().to_string()
    }

    pub fn directory(&self, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }
        text.blue().bold().to_string()
    }

    pub fn version(&self, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }
        text.dimmed().to_string()
    }

    pub fn highlight(&self, text: &str, kind: Option<HighlightKind>) -> String {
        if !self.enabled {
            return text.to_string();
        }
        match kind {
            Some(HighlightKind::Created) => text.green().bold().to_string(),
            Some(HighlightKind::Updated) => text.yellow().bold().to_string(),
            None => text.to_string(),
        }
    }

    pub fn status(&self, text: &str, state: ConnectionState) -> String {
        if !self.enabled {
            return text.to_string();
        }
        match state {
            ConnectionState::Open => text.green().to_string(),
            ConnectionState::Connecting => text.cyan().to_string(),
            ConnectionState::Closed | ConnectionState::WaitingToRetry => text.yellow().to_string(),
            ConnectionState::Error | ConnectionState::Unsupported => text.red().to_string(),
            ConnectionState::Stopped => text.dimmed().to_string(),
        }
    }

    pub fn notice(&self, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }
        text.magenta().italic().to_string()
    }
}
