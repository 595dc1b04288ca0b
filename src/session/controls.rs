use std::io::{self, BufRead};
use std::thread;

use futures_channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

/// A user command read from the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    RetryNow,
    Quit,
}

impl Control {
    /// An empty line or `r` retries, `q` quits; anything else is ignored.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "" | "r" | "retry" => Some(Control::RetryNow),
            "q" | "quit" => Some(Control::Quit),
            _ => None,
        }
    }
}

/// Reads controls from stdin on a dedicated thread.
///
/// The stream ends when stdin reaches end of file.
pub fn spawn_stdin_controls() -> UnboundedReceiver<Control> {
    let (sender, receiver) = mpsc::unbounded();
    let spawned = thread::Builder::new()
        .name("dzview-stdin".to_string())
        .spawn(move || forward_controls(io::stdin().lock(), sender));
    if let Err(err) = spawned {
        warn!("Keyboard controls unavailable: {}", err);
    }
    receiver
}

fn forward_controls(input: impl BufRead, sender: UnboundedSender<Control>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                debug!("Stopped reading controls: {}", err);
                return;
            }
        };
        match Control::parse(&line) {
            Some(control) => {
                if sender.unbounded_send(control).is_err() {
                    return;
                }
            }
            None => debug!("Ignoring unknown control {:?}", line),
        }
    }
    debug!("Control input closed");
}
