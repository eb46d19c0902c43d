//! VT500-series escape sequence state machine
//!
//! Byte-at-a-time state machine following the DEC ANSI parser model.
//! Handles C0/C1 controls, ESC, CSI, OSC, DCS and the SOS/PM/APC string
//! categories. UTF-8 decoding happens in Ground via a dedicated sub-decoder.
//!
//! Streaming contract: bytes may arrive in arbitrary chunks; no byte is lost
//! across chunk boundaries and the emitted action order is total and stable.

use crate::action::{Action, CsiAction, DcsAction, EscAction};
use crate::params::Params;
use crate::utf8::{Utf8Decoder, Utf8Result};

/// Cap on accumulated OSC/DCS/APC/PM/SOS payloads. Overflow is silently
/// truncated; the sequence still dispatches with the truncated data.
const MAX_STRING_LEN: usize = 8192;
/// Cap on intermediate bytes per sequence.
const MAX_INTERMEDIATES: usize = 4;

/// Parser state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Normal text processing.
    Ground,
    /// After ESC.
    Escape,
    /// ESC followed by intermediate bytes.
    EscapeIntermediate,
    /// After CSI.
    CsiEntry,
    /// Collecting CSI parameters.
    CsiParam,
    /// Collecting CSI intermediate bytes.
    CsiIntermediate,
    /// Invalid CSI; consume until the final byte.
    CsiIgnore,
    /// After DCS.
    DcsEntry,
    /// Collecting DCS parameters.
    DcsParam,
    /// Collecting DCS intermediate bytes.
    DcsIntermediate,
    /// DCS data until ST.
    DcsPassthrough,
    /// Invalid DCS; consume until ST.
    DcsIgnore,
    /// OSC data until BEL or ST.
    OscString,
    /// SOS/PM/APC data until ST.
    SosPmApcString,
}

/// Which string category SosPmApcString is collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringKind {
    Sos,
    Pm,
    Apc,
}

/// The streaming parser.
#[derive(Debug, Clone)]
pub struct Parser {
    state: ParserState,
    utf8: Utf8Decoder,
    /// Raw parameter bytes (digits, `;`, `:`) for CSI and DCS.
    params_buf: Vec<u8>,
    /// Intermediate bytes for the sequence in flight.
    intermediates: Vec<u8>,
    /// CSI leader byte (`?`, `>`, `<`, `=`) or 0.
    leader: u8,
    /// DCS final byte, recorded on entry to passthrough.
    dcs_final: u8,
    /// OSC/DCS/SOS/PM/APC payload.
    string_data: Vec<u8>,
    string_kind: StringKind,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Ground,
            utf8: Utf8Decoder::new(),
            params_buf: Vec::with_capacity(32),
            intermediates: Vec::with_capacity(MAX_INTERMEDIATES),
            leader: 0,
            dcs_final: 0,
            string_data: Vec::with_capacity(256),
            string_kind: StringKind::Apc,
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Drop any partial sequence and return to Ground.
    pub fn reset(&mut self) {
        self.state = ParserState::Ground;
        self.utf8.reset();
        self.params_buf.clear();
        self.intermediates.clear();
        self.leader = 0;
        self.dcs_final = 0;
        self.string_data.clear();
    }

    /// Feed a chunk, invoking the callback for every completed action.
    pub fn parse<F>(&mut self, data: &[u8], mut callback: F)
    where
        F: FnMut(Action),
    {
        for &byte in data {
            self.advance(byte, &mut callback);
        }
    }

    /// Feed a chunk and collect the actions. Test convenience.
    pub fn parse_collect(&mut self, data: &[u8]) -> Vec<Action> {
        let mut actions = Vec::new();
        self.parse(data, |action| actions.push(action));
        actions
    }

    fn advance<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        // String states take every byte; terminators are handled inline.
        match self.state {
            ParserState::OscString
            | ParserState::DcsPassthrough
            | ParserState::SosPmApcString => {
                self.advance_string(byte, callback);
                return;
            }
            _ => {}
        }

        // An interrupted UTF-8 sequence is one ill-formed maximal
        // subsequence; flush the replacement before handling the control.
        if self.utf8.is_pending() && byte < 0x80 {
            self.utf8.reset();
            callback(Action::Print(Utf8Decoder::REPLACEMENT));
        }

        // C0 controls execute in any non-string state without disturbing a
        // sequence in flight, except CAN/SUB which abort it.
        if byte < 0x20 {
            match byte {
                0x1B => self.enter_escape(),
                0x18 | 0x1A => self.state = ParserState::Ground,
                0x07..=0x0F => callback(Action::Control(byte)),
                _ => {}
            }
            return;
        }

        // C1 controls (8-bit forms).
        if (0x80..=0x9F).contains(&byte) && !self.utf8.is_pending() {
            match byte {
                0x90 => self.enter_dcs(),
                0x98 => self.enter_string(StringKind::Sos),
                0x9B => self.enter_csi(),
                0x9D => self.enter_osc(),
                0x9E => self.enter_string(StringKind::Pm),
                0x9F => self.enter_string(StringKind::Apc),
                // Stray ST and the remaining C1 set are ignored.
                _ => {}
            }
            return;
        }

        match self.state {
            ParserState::Ground => self.handle_ground(byte, callback),
            ParserState::Escape => self.handle_escape(byte, callback),
            ParserState::EscapeIntermediate => self.handle_escape_intermediate(byte, callback),
            ParserState::CsiEntry => self.handle_csi_entry(byte, callback),
            ParserState::CsiParam => self.handle_csi_param(byte, callback),
            ParserState::CsiIntermediate => self.handle_csi_intermediate(byte, callback),
            ParserState::CsiIgnore => self.handle_csi_ignore(byte),
            ParserState::DcsEntry => self.handle_dcs_entry(byte),
            ParserState::DcsParam => self.handle_dcs_param(byte),
            ParserState::DcsIntermediate => self.handle_dcs_intermediate(byte),
            ParserState::DcsIgnore => {}
            ParserState::OscString
            | ParserState::DcsPassthrough
            | ParserState::SosPmApcString => unreachable!("handled above"),
        }
    }

    // {{{ Ground

    fn handle_ground<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        if (0x20..0x7F).contains(&byte) && !self.utf8.is_pending() {
            callback(Action::Print(byte as char));
            return;
        }
        match self.utf8.feed(byte) {
            Utf8Result::Char(c) => callback(Action::Print(c)),
            Utf8Result::Invalid => callback(Action::Print(Utf8Decoder::REPLACEMENT)),
            Utf8Result::InvalidKeepByte => {
                callback(Action::Print(Utf8Decoder::REPLACEMENT));
                self.handle_ground(byte, callback);
            }
            Utf8Result::Pending => {}
        }
    }

    // }}}
    // {{{ Escape

    fn enter_escape(&mut self) {
        self.state = ParserState::Escape;
        self.intermediates.clear();
    }

    fn handle_escape<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        match byte {
            b'[' => self.enter_csi(),
            b']' => self.enter_osc(),
            b'P' => self.enter_dcs(),
            b'X' => self.enter_string(StringKind::Sos),
            b'^' => self.enter_string(StringKind::Pm),
            b'_' => self.enter_string(StringKind::Apc),
            // Stray ST with no string open.
            b'\\' => self.state = ParserState::Ground,
            0x20..=0x2F => {
                self.intermediates.push(byte);
                self.state = ParserState::EscapeIntermediate;
            }
            0x30..=0x7E => {
                callback(Action::Esc(EscAction::new(Vec::new(), byte)));
                self.state = ParserState::Ground;
            }
            _ => self.state = ParserState::Ground,
        }
    }

    fn handle_escape_intermediate<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        match byte {
            0x20..=0x2F => {
                if self.intermediates.len() < MAX_INTERMEDIATES {
                    self.intermediates.push(byte);
                }
            }
            0x30..=0x7E => {
                let intermediates = std::mem::take(&mut self.intermediates);
                callback(Action::Esc(EscAction::new(intermediates, byte)));
                self.state = ParserState::Ground;
            }
            _ => self.state = ParserState::Ground,
        }
    }

    // }}}
    // {{{ CSI

    fn enter_csi(&mut self) {
        self.state = ParserState::CsiEntry;
        self.params_buf.clear();
        self.intermediates.clear();
        self.leader = 0;
    }

    fn handle_csi_entry<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        match byte {
            b'?' | b'>' | b'<' | b'=' => {
                self.leader = byte;
                self.state = ParserState::CsiParam;
            }
            b'0'..=b'9' | b';' | b':' => {
                self.params_buf.push(byte);
                self.state = ParserState::CsiParam;
            }
            0x20..=0x2F => {
                self.intermediates.push(byte);
                self.state = ParserState::CsiIntermediate;
            }
            0x40..=0x7E => self.dispatch_csi(byte, callback),
            _ => self.state = ParserState::CsiIgnore,
        }
    }

    fn handle_csi_param<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        match byte {
            b'0'..=b'9' | b';' | b':' => self.params_buf.push(byte),
            0x20..=0x2F => {
                self.intermediates.push(byte);
                self.state = ParserState::CsiIntermediate;
            }
            0x40..=0x7E => self.dispatch_csi(byte, callback),
            // Leader in parameter position is invalid.
            _ => self.state = ParserState::CsiIgnore,
        }
    }

    fn handle_csi_intermediate<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        match byte {
            0x20..=0x2F => {
                if self.intermediates.len() < MAX_INTERMEDIATES {
                    self.intermediates.push(byte);
                } else {
                    self.state = ParserState::CsiIgnore;
                }
            }
            0x40..=0x7E => self.dispatch_csi(byte, callback),
            _ => self.state = ParserState::CsiIgnore,
        }
    }

    fn handle_csi_ignore(&mut self, byte: u8) {
        if (0x40..=0x7E).contains(&byte) {
            self.state = ParserState::Ground;
        }
    }

    fn dispatch_csi<F>(&mut self, final_byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        let action = CsiAction {
            leader: self.leader,
            params: Params::parse(&self.params_buf),
            intermediates: std::mem::take(&mut self.intermediates),
            final_byte,
        };
        callback(Action::Csi(action));
        self.state = ParserState::Ground;
    }

    // }}}
    // {{{ OSC / SOS / PM / APC strings

    fn enter_osc(&mut self) {
        self.state = ParserState::OscString;
        self.string_data.clear();
    }

    fn enter_string(&mut self, kind: StringKind) {
        self.state = ParserState::SosPmApcString;
        self.string_kind = kind;
        self.string_data.clear();
    }

    fn advance_string<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        match byte {
            // Possible ST (ESC \): dispatch now and let the Escape state
            // consume the backslash.
            0x1B => {
                self.dispatch_string(callback);
                self.enter_escape();
            }
            // BEL terminates OSC (xterm convention).
            0x07 if self.state == ParserState::OscString => {
                self.dispatch_string(callback);
                self.state = ParserState::Ground;
            }
            // 8-bit ST.
            0x9C => {
                self.dispatch_string(callback);
                self.state = ParserState::Ground;
            }
            // CAN/SUB abort without dispatch.
            0x18 | 0x1A => {
                self.string_data.clear();
                self.state = ParserState::Ground;
            }
            // Other C0 controls are not part of the payload.
            0x00..=0x1F => {
                if self.state == ParserState::DcsPassthrough {
                    self.put_string_byte(byte);
                }
            }
            _ => self.put_string_byte(byte),
        }
    }

    fn put_string_byte(&mut self, byte: u8) {
        if self.string_data.len() < MAX_STRING_LEN {
            self.string_data.push(byte);
        }
    }

    fn dispatch_string<F>(&mut self, callback: &mut F)
    where
        F: FnMut(Action),
    {
        let data = std::mem::take(&mut self.string_data);
        match self.state {
            ParserState::OscString => callback(Action::Osc(data)),
            ParserState::DcsPassthrough => {
                let action = DcsAction {
                    params: Params::parse(&self.params_buf),
                    intermediates: std::mem::take(&mut self.intermediates),
                    final_byte: self.dcs_final,
                    data,
                };
                callback(Action::Dcs(action));
            }
            ParserState::SosPmApcString => match self.string_kind {
                StringKind::Sos => callback(Action::Sos(data)),
                StringKind::Pm => callback(Action::Pm(data)),
                StringKind::Apc => callback(Action::Apc(data)),
            },
            _ => {}
        }
    }

    // }}}
    // {{{ DCS

    fn enter_dcs(&mut self) {
        self.state = ParserState::DcsEntry;
        self.params_buf.clear();
        self.intermediates.clear();
        self.dcs_final = 0;
        self.string_data.clear();
    }

    fn handle_dcs_entry(&mut self, byte: u8) {
        match byte {
            b'0'..=b'9' | b';' | b':' => {
                self.params_buf.push(byte);
                self.state = ParserState::DcsParam;
            }
            b'?' | b'>' | b'<' | b'=' => self.state = ParserState::DcsParam,
            0x20..=0x2F => {
                self.intermediates.push(byte);
                self.state = ParserState::DcsIntermediate;
            }
            0x40..=0x7E => {
                self.dcs_final = byte;
                self.state = ParserState::DcsPassthrough;
            }
            _ => self.state = ParserState::DcsIgnore,
        }
    }

    fn handle_dcs_param(&mut self, byte: u8) {
        match byte {
            b'0'..=b'9' | b';' | b':' => self.params_buf.push(byte),
            0x20..=0x2F => {
                self.intermediates.push(byte);
                self.state = ParserState::DcsIntermediate;
            }
            0x40..=0x7E => {
                self.dcs_final = byte;
                self.state = ParserState::DcsPassthrough;
            }
            _ => self.state = ParserState::DcsIgnore,
        }
    }

    fn handle_dcs_intermediate(&mut self, byte: u8) {
        match byte {
            0x20..=0x2F => {
                if self.intermediates.len() < MAX_INTERMEDIATES {
                    self.intermediates.push(byte);
                } else {
                    self.state = ParserState::DcsIgnore;
                }
            }
            0x40..=0x7E => {
                self.dcs_final = byte;
                self.state = ParserState::DcsPassthrough;
            }
            _ => self.state = ParserState::DcsIgnore,
        }
    }

    // }}}
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}
