//! Terminal modes
//!
//! ANSI modes, DEC private modes, and the mouse protocol/encoding selection.
//! Every mode is resolvable for DECRQM reporting.

use serde::{Deserialize, Serialize};

/// Which mouse events are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MouseProtocol {
    #[default]
    None,
    /// Mode 9: press only.
    X10,
    /// Mode 1000: press and release.
    Normal,
    /// Mode 1002: press, release, motion while a button is held.
    ButtonEvent,
    /// Mode 1003: press, release, any motion.
    AnyEvent,
}

/// How mouse coordinates are encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MouseEncoding {
    /// Legacy `CSI M` with byte-offset coordinates.
    #[default]
    Default,
    /// Mode 1005: UTF-8 extended coordinates.
    Utf8,
    /// Mode 1006: `CSI < b ; x ; y M/m`.
    Sgr,
    /// Mode 1015: `CSI b ; x ; y M`.
    Urxvt,
}

/// DECRQM answer for a single mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeValue {
    NotRecognized,
    Set,
    Reset,
    PermanentlySet,
    PermanentlyReset,
}

impl ModeValue {
    /// The Ps field of the DECRPM reply.
    pub fn report_code(self) -> u16 {
        match self {
            ModeValue::NotRecognized => 0,
            ModeValue::Set => 1,
            ModeValue::Reset => 2,
            ModeValue::PermanentlySet => 3,
            ModeValue::PermanentlyReset => 4,
        }
    }

    fn from_flag(set: bool) -> Self {
        if set {
            ModeValue::Set
        } else {
            ModeValue::Reset
        }
    }
}

/// The live mode set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modes {
    // ANSI modes
    /// IRM: printed characters shift existing cells right.
    pub insert_mode: bool,
    /// LNM: LF implies CR.
    pub linefeed_mode: bool,

    // DEC private modes
    /// DECCKM: application cursor keys.
    pub cursor_keys_application: bool,
    /// DECNKM / DECKPAM: application keypad.
    pub keypad_application: bool,
    /// DECOM: cursor addressing relative to the margins.
    pub origin_mode: bool,
    /// DECAWM.
    pub auto_wrap: bool,
    /// DECSCNM: reverse video for the whole screen.
    pub reverse_video: bool,
    /// DECLRMM (mode 69): DECSLRM accepted, left/right margins honored.
    pub left_right_margins: bool,
    /// DECTCEM.
    pub cursor_visible: bool,
    /// Mode 12 (att610): cursor blink.
    pub cursor_blink: bool,
    /// Modes 47/1047/1049.
    pub alternate_screen: bool,
    /// Mode 1007: wheel sends arrows on the alternate screen.
    pub alternate_scroll: bool,
    /// Mode 1004.
    pub focus_events: bool,
    /// Mode 2004.
    pub bracketed_paste: bool,
    /// Mode 2026: renderer holds frames until reset.
    pub synchronized_output: bool,

    pub mouse_protocol: MouseProtocol,
    pub mouse_encoding: MouseEncoding,

    /// xterm modifyOtherKeys level (CSI > 4 ; level m), 0-2.
    pub modify_other_keys: u8,
}

impl Modes {
    pub fn new() -> Self {
        Self {
            insert_mode: false,
            linefeed_mode: false,
            cursor_keys_application: false,
            keypad_application: false,
            origin_mode: false,
            auto_wrap: true,
            reverse_video: false,
            left_right_margins: false,
            cursor_visible: true,
            cursor_blink: true,
            alternate_screen: false,
            alternate_scroll: false,
            focus_events: false,
            bracketed_paste: false,
            synchronized_output: false,
            mouse_protocol: MouseProtocol::None,
            mouse_encoding: MouseEncoding::Default,
            modify_other_keys: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn mouse_tracking_enabled(&self) -> bool {
        self.mouse_protocol != MouseProtocol::None
    }

    /// Apply a simple DEC private mode change. Modes with side effects on
    /// the screen (6, 25, 47, 1047-1049, 2026) are intercepted by the
    /// interpreter before this is reached.
    pub fn set_dec_mode(&mut self, mode: u16, value: bool) {
        match mode {
            1 => self.cursor_keys_application = value,
            7 => self.auto_wrap = value,
            5 => self.reverse_video = value,
            9 => {
                self.mouse_protocol = if value {
                    MouseProtocol::X10
                } else {
                    MouseProtocol::None
                }
            }
            12 => self.cursor_blink = value,
            66 => self.keypad_application = value,
            69 => self.left_right_margins = value,
            1000 => {
                self.mouse_protocol = if value {
                    MouseProtocol::Normal
                } else {
                    MouseProtocol::None
                }
            }
            1002 => {
                self.mouse_protocol = if value {
                    MouseProtocol::ButtonEvent
                } else {
                    MouseProtocol::None
                }
            }
            1003 => {
                self.mouse_protocol = if value {
                    MouseProtocol::AnyEvent
                } else {
                    MouseProtocol::None
                }
            }
            1004 => self.focus_events = value,
            1005 => {
                self.mouse_encoding = if value {
                    MouseEncoding::Utf8
                } else {
                    MouseEncoding::Default
                }
            }
            1006 => {
                self.mouse_encoding = if value {
                    MouseEncoding::Sgr
                } else {
                    MouseEncoding::Default
                }
            }
            1007 => self.alternate_scroll = value,
            1015 => {
                self.mouse_encoding = if value {
                    MouseEncoding::Urxvt
                } else {
                    MouseEncoding::Default
                }
            }
            2004 => self.bracketed_paste = value,
            _ => {
                log::debug!("ignoring unknown DEC private mode {} (set={})", mode, value);
            }
        }
    }

    /// Resolve a DEC private mode for DECRQM.
    pub fn query_dec_mode(&self, mode: u16) -> ModeValue {
        match mode {
            1 => ModeValue::from_flag(self.cursor_keys_application),
            // Always ANSI, never VT52.
            2 => ModeValue::PermanentlySet,
            5 => ModeValue::from_flag(self.reverse_video),
            6 => ModeValue::from_flag(self.origin_mode),
            7 => ModeValue::from_flag(self.auto_wrap),
            // Auto-repeat is the host's business.
            8 => ModeValue::PermanentlySet,
            9 => ModeValue::from_flag(self.mouse_protocol == MouseProtocol::X10),
            12 => ModeValue::from_flag(self.cursor_blink),
            25 => ModeValue::from_flag(self.cursor_visible),
            47 | 1047 | 1049 => ModeValue::from_flag(self.alternate_screen),
            66 => ModeValue::from_flag(self.keypad_application),
            69 => ModeValue::from_flag(self.left_right_margins),
            1000 => ModeValue::from_flag(self.mouse_protocol == MouseProtocol::Normal),
            1002 => ModeValue::from_flag(self.mouse_protocol == MouseProtocol::ButtonEvent),
            1003 => ModeValue::from_flag(self.mouse_protocol == MouseProtocol::AnyEvent),
            1004 => ModeValue::from_flag(self.focus_events),
            1005 => ModeValue::from_flag(self.mouse_encoding == MouseEncoding::Utf8),
            1006 => ModeValue::from_flag(self.mouse_encoding == MouseEncoding::Sgr),
            1007 => ModeValue::from_flag(self.alternate_scroll),
            1015 => ModeValue::from_flag(self.mouse_encoding == MouseEncoding::Urxvt),
            2004 => ModeValue::from_flag(self.bracketed_paste),
            2026 => ModeValue::from_flag(self.synchronized_output),
            _ => ModeValue::NotRecognized,
        }
    }

    /// Apply an ANSI (non-private) mode change.
    pub fn set_ansi_mode(&mut self, mode: u16, value: bool) {
        match mode {
            4 => self.insert_mode = value,
            20 => self.linefeed_mode = value,
            _ => {
                log::debug!("ignoring unknown ANSI mode {} (set={})", mode, value);
            }
        }
    }

    /// Resolve an ANSI mode for DECRQM.
    pub fn query_ansi_mode(&self, mode: u16) -> ModeValue {
        match mode {
            4 => ModeValue::from_flag(self.insert_mode),
            20 => ModeValue::from_flag(self.linefeed_mode),
            _ => ModeValue::NotRecognized,
        }
    }
}

impl Default for Modes {
    fn default() -> Self {
        Self::new()
    }
}
