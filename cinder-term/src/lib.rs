//! cinder-term - terminal session layer
//!
//! Glues the parser and the screen model together: the [`Terminal`]
//! interpreter executes parsed sequences and queues wire replies, the
//! [`input`] module encodes host events into bytes, and [`Session`] runs
//! the PTY I/O thread and hands render snapshots to the host.

pub mod input;
mod session;
mod terminal;

pub use session::{OnClosed, Session};
pub use terminal::{ClipboardWrite, Notification, Terminal};
