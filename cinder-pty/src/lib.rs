//! cinder-pty - pseudoterminal layer
//!
//! PTY master creation and I/O, child process spawning with proper session
//! and controlling-terminal setup, window sizing, and a self-pipe wakeup so
//! a blocked reader thread can be interrupted for shutdown or resize.

mod child;
mod error;
mod pty;
mod size;

pub use child::{exit_code, Child};
pub use error::{Error, Result};
pub use pty::{configure_slave, open_slave, Pty, WaitEvent, WakeupHandle};
pub use size::WindowSize;

pub use nix::sys::signal::Signal;
pub use nix::sys::wait::WaitStatus;
