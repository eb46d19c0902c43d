//! cinder-parser - VT escape sequence parser
//!
//! A streaming, byte-at-a-time parser for the VT500-series control sequence
//! grammar. Bytes go in (in arbitrary chunks), typed [`Action`]s come out.
//! The parser holds no screen state and performs no I/O; interpretation of
//! the action stream is the caller's job.
//!
//! Reference: https://vt100.net/emu/dec_ansi_parser

mod action;
mod params;
mod parser;
mod utf8;

pub use action::{c0, Action, CsiAction, DcsAction, EscAction};
pub use params::Params;
pub use parser::{Parser, ParserState};
pub use utf8::{Utf8Decoder, Utf8Result};
