//! PTY error types

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to create pty: {0}")]
    PtyCreation(String),

    #[error("failed to spawn child: {0}")]
    SpawnFailed(String),

    #[error("failed to set window size: {0}")]
    WindowSize(String),

    #[error("system error: {0}")]
    Nix(#[from] nix::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
