//! The running viewer: one cooperative loop over the push channel, the
//! countdown timer, cosmetic timers and keyboard controls.

mod controls;
mod session;

pub use controls::{Control, spawn_stdin_controls};
pub use session::{DEFAULT_CONNECT_TIMEOUT, Session, SessionError};
