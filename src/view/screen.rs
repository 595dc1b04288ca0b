use std::io::{self, Write};

use snafu::prelude::*;

/// Moves the cursor home and clears the terminal.
const CLEAR: &str = "\x1b[H\x1b[2J";

/// Terminal surface the frames are drawn on.
pub struct Screen<W: Write = io::Stdout> {
    out: W,
    last_frame: Option<String>,
}

impl Screen {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Screen<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_frame: None,
        }
    }

    /// Replaces the screen contents with `frame` unless it is already shown.
    pub fn draw(&mut self, frame: String) -> Result<(), ScreenError> {
        if self.last_frame.as_ref() == Some(&frame) {
            return Ok(());
        }
        writeln!(self.out, "{CLEAR}{frame}").context(WriteSnafu)?;
        self.out.flush().context(WriteSnafu)?;
        self.last_frame = Some(frame);
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[derive(Debug, Snafu)]
pub enum ScreenError {
    #[snafu(display("Failed to write to the terminal"))]
    WriteError { source: io::Error },
}
