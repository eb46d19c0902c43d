//! Input encoding
//!
//! Pure functions translating key, mouse, focus and paste events into the
//! bytes an application expects, driven by the live mode set (application
//! cursor/keypad, modifyOtherKeys, the mouse protocol grid, bracketed
//! paste). Nothing here touches the screen.

use cinder_core::{Modes, MouseEncoding, MouseProtocol};

/// A key event the host delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Tab,
    Backspace,
    Escape,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    F(u8),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub alt: bool,
    pub ctrl: bool,
}

impl Modifiers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn any(&self) -> bool {
        self.shift || self.alt || self.ctrl
    }

    /// xterm modifier parameter: 1 + shift(1) + alt(2) + ctrl(4).
    pub fn code(&self) -> u8 {
        let mut code = 1;
        if self.shift {
            code += 1;
        }
        if self.alt {
            code += 2;
        }
        if self.ctrl {
            code += 4;
        }
        code
    }
}

/// Encode a key press against the current modes.
pub fn encode_key(key: Key, mods: Modifiers, modes: &Modes) -> Vec<u8> {
    match key {
        Key::Char(c) => encode_char(c, mods, modes.modify_other_keys),
        Key::Enter => {
            if mods.alt {
                vec![0x1B, 0x0D]
            } else {
                vec![0x0D]
            }
        }
        Key::Tab => {
            if mods.shift {
                b"\x1b[Z".to_vec()
            } else {
                vec![0x09]
            }
        }
        Key::Backspace => {
            if mods.ctrl {
                vec![0x08]
            } else if mods.alt {
                vec![0x1B, 0x7F]
            } else {
                vec![0x7F]
            }
        }
        Key::Escape => vec![0x1B],
        Key::Up => cursor_key(b'A', mods, modes.cursor_keys_application),
        Key::Down => cursor_key(b'B', mods, modes.cursor_keys_application),
        Key::Right => cursor_key(b'C', mods, modes.cursor_keys_application),
        Key::Left => cursor_key(b'D', mods, modes.cursor_keys_application),
        Key::Home => cursor_key(b'H', mods, modes.cursor_keys_application),
        Key::End => cursor_key(b'F', mods, modes.cursor_keys_application),
        Key::PageUp => tilde_key(5, mods),
        Key::PageDown => tilde_key(6, mods),
        Key::Insert => tilde_key(2, mods),
        Key::Delete => tilde_key(3, mods),
        Key::F(n) => function_key(n, mods),
    }
}

fn encode_char(c: char, mods: Modifiers, modify_other_keys: u8) -> Vec<u8> {
    if modify_other_keys_applies(c, mods, modify_other_keys) {
        return format!("\x1b[27;{};{}~", mods.code(), c as u32).into_bytes();
    }

    if mods.ctrl {
        if let Some(ctrl) = control_code(c) {
            if mods.alt {
                return vec![0x1B, ctrl];
            }
            return vec![ctrl];
        }
    }

    let mut bytes = Vec::with_capacity(5);
    if mods.alt {
        bytes.push(0x1B);
    }
    let mut buf = [0u8; 4];
    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    bytes
}

/// Legacy control code for Ctrl+key, when one exists.
fn control_code(c: char) -> Option<u8> {
    match c {
        'a'..='z' => Some(c as u8 - b'a' + 1),
        'A'..='Z' => Some(c as u8 - b'A' + 1),
        ' ' | '@' => Some(0x00),
        '[' => Some(0x1B),
        '\\' => Some(0x1C),
        ']' => Some(0x1D),
        '^' => Some(0x1E),
        '_' => Some(0x1F),
        '?' => Some(0x7F),
        _ => None,
    }
}

/// xterm modifyOtherKeys: level 2 escapes every modified character; level 1
/// only the combinations that have no legacy encoding.
fn modify_other_keys_applies(c: char, mods: Modifiers, level: u8) -> bool {
    match level {
        2 => (mods.ctrl || mods.alt) && c.is_ascii(),
        1 => mods.ctrl && (control_code(c).is_none() || mods.shift),
        _ => false,
    }
}

fn cursor_key(final_byte: u8, mods: Modifiers, application: bool) -> Vec<u8> {
    if mods.any() {
        format!("\x1b[1;{}{}", mods.code(), final_byte as char).into_bytes()
    } else if application {
        vec![0x1B, b'O', final_byte]
    } else {
        vec![0x1B, b'[', final_byte]
    }
}

fn tilde_key(code: u8, mods: Modifiers) -> Vec<u8> {
    if mods.any() {
        format!("\x1b[{};{}~", code, mods.code()).into_bytes()
    } else {
        format!("\x1b[{}~", code).into_bytes()
    }
}

fn function_key(n: u8, mods: Modifiers) -> Vec<u8> {
    // F1-F4 are SS3 P/Q/R/S unmodified, CSI 1;mod P/... modified.
    if (1..=4).contains(&n) {
        let final_byte = b'P' + (n - 1);
        return if mods.any() {
            format!("\x1b[1;{}{}", mods.code(), final_byte as char).into_bytes()
        } else {
            vec![0x1B, b'O', final_byte]
        };
    }
    let code = match n {
        5 => 15,
        6 => 17,
        7 => 18,
        8 => 19,
        9 => 20,
        10 => 21,
        11 => 23,
        12 => 24,
        _ => return Vec::new(),
    };
    if mods.any() {
        format!("\x1b[{};{}~", code, mods.code()).into_bytes()
    } else {
        format!("\x1b[{}~", code).into_bytes()
    }
}

/// Application keypad (DECPAM) translation for the numeric pad.
pub fn encode_keypad_digit(c: char, modes: &Modes) -> Vec<u8> {
    if !modes.keypad_application {
        return c.to_string().into_bytes();
    }
    let final_byte = match c {
        '0'..='9' => b'p' + (c as u8 - b'0'),
        '-' => b'm',
        '+' => b'k',
        '.' => b'n',
        '*' => b'j',
        '/' => b'o',
        '=' => b'X',
        _ => return c.to_string().into_bytes(),
    };
    vec![0x1B, b'O', final_byte]
}

/// A mouse button, wire numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    WheelUp,
    WheelDown,
}

impl MouseButton {
    fn code(self) -> u16 {
        match self {
            MouseButton::Left => 0,
            MouseButton::Middle => 1,
            MouseButton::Right => 2,
            MouseButton::WheelUp => 64,
            MouseButton::WheelDown => 65,
        }
    }
}

/// A mouse transition in cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEvent {
    Press(MouseButton),
    Release(MouseButton),
    /// Pointer motion; carries the held button, if any.
    Motion(Option<MouseButton>),
}

/// Does the active protocol report this transition at all?
fn protocol_permits(protocol: MouseProtocol, event: MouseEvent) -> bool {
    match protocol {
        MouseProtocol::None => false,
        MouseProtocol::X10 => matches!(event, MouseEvent::Press(_)),
        MouseProtocol::Normal => {
            matches!(event, MouseEvent::Press(_) | MouseEvent::Release(_))
        }
        MouseProtocol::ButtonEvent => !matches!(event, MouseEvent::Motion(None)),
        MouseProtocol::AnyEvent => true,
    }
}

/// Encode a mouse event at 0-based cell (col, row). Returns empty bytes
/// when the active protocol does not report the transition.
pub fn encode_mouse(
    event: MouseEvent,
    col: usize,
    row: usize,
    mods: Modifiers,
    modes: &Modes,
) -> Vec<u8> {
    if !protocol_permits(modes.mouse_protocol, event) {
        return Vec::new();
    }

    let mut button = match event {
        MouseEvent::Press(btn) => btn.code(),
        // Legacy encodings use 3 for release; SGR keeps the button and
        // flags release in the final byte.
        MouseEvent::Release(btn) => {
            if modes.mouse_encoding == MouseEncoding::Sgr {
                btn.code()
            } else {
                3
            }
        }
        MouseEvent::Motion(btn) => 32 + btn.map_or(3, MouseButton::code),
    };
    // X10 never reports modifiers.
    if modes.mouse_protocol != MouseProtocol::X10 {
        if mods.shift {
            button += 4;
        }
        if mods.alt {
            button += 8;
        }
        if mods.ctrl {
            button += 16;
        }
    }

    let col = col + 1;
    let row = row + 1;

    match modes.mouse_encoding {
        MouseEncoding::Sgr => {
            let final_byte = if matches!(event, MouseEvent::Release(_)) {
                'm'
            } else {
                'M'
            };
            format!("\x1b[<{button};{col};{row}{final_byte}").into_bytes()
        }
        MouseEncoding::Urxvt => format!("\x1b[{};{col};{row}M", button + 32).into_bytes(),
        MouseEncoding::Utf8 => {
            let mut out = vec![0x1B, b'[', b'M', (button + 32) as u8];
            utf8_coord(col.min(2015) as u16 + 32, &mut out);
            utf8_coord(row.min(2015) as u16 + 32, &mut out);
            out
        }
        MouseEncoding::Default => {
            let clamp = |v: usize| (v.min(223) + 32) as u8;
            vec![0x1B, b'[', b'M', (button + 32) as u8, clamp(col), clamp(row)]
        }
    }
}

fn utf8_coord(value: u16, out: &mut Vec<u8>) {
    if value < 0x80 {
        out.push(value as u8);
    } else {
        out.push(0xC0 | (value >> 6) as u8);
        out.push(0x80 | (value & 0x3F) as u8);
    }
}

/// Focus reporting (mode 1004).
pub fn encode_focus(focused: bool, modes: &Modes) -> Vec<u8> {
    if !modes.focus_events {
        return Vec::new();
    }
    if focused {
        b"\x1b[I".to_vec()
    } else {
        b"\x1b[O".to_vec()
    }
}

/// Encode pasted text, wrapping in the bracketed paste guards when mode
/// 2004 is set. The guard sequence itself is stripped from the payload so
/// a hostile paste cannot break out.
pub fn encode_paste(text: &str, modes: &Modes) -> Vec<u8> {
    if !modes.bracketed_paste {
        return text.as_bytes().to_vec();
    }
    let sanitized = text.replace("\x1b[201~", "");
    let mut out = Vec::with_capacity(sanitized.len() + 12);
    out.extend_from_slice(b"\x1b[200~");
    out.extend_from_slice(sanitized.as_bytes());
    out.extend_from_slice(b"\x1b[201~");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modes() -> Modes {
        Modes::new()
    }

    #[test]
    fn test_plain_chars() {
        let m = modes();
        assert_eq!(encode_key(Key::Char('a'), Modifiers::none(), &m), b"a");
        assert_eq!(
            encode_key(Key::Char('é'), Modifiers::none(), &m),
            "é".as_bytes()
        );
    }

    #[test]
    fn test_ctrl_chars() {
        let m = modes();
        let ctrl = Modifiers {
            ctrl: true,
            ..Default::default()
        };
        assert_eq!(encode_key(Key::Char('c'), ctrl, &m), vec![0x03]);
        assert_eq!(encode_key(Key::Char('a'), ctrl, &m), vec![0x01]);
        assert_eq!(encode_key(Key::Char('['), ctrl, &m), vec![0x1B]);
    }

    #[test]
    fn test_alt_prefix() {
        let m = modes();
        let alt = Modifiers {
            alt: true,
            ..Default::default()
        };
        assert_eq!(encode_key(Key::Char('x'), alt, &m), vec![0x1B, b'x']);
    }

    #[test]
    fn test_cursor_keys_both_modes() {
        let mut m = modes();
        assert_eq!(
            encode_key(Key::Up, Modifiers::none(), &m),
            b"\x1b[A".to_vec()
        );
        m.cursor_keys_application = true;
        assert_eq!(
            encode_key(Key::Up, Modifiers::none(), &m),
            b"\x1bOA".to_vec()
        );
    }

    #[test]
    fn test_modified_cursor_key() {
        let m = modes();
        let shift = Modifiers {
            shift: true,
            ..Default::default()
        };
        assert_eq!(encode_key(Key::Up, shift, &m), b"\x1b[1;2A".to_vec());
        let ctrl_alt = Modifiers {
            ctrl: true,
            alt: true,
            ..Default::default()
        };
        assert_eq!(encode_key(Key::Left, ctrl_alt, &m), b"\x1b[1;7D".to_vec());
    }

    #[test]
    fn test_function_keys() {
        let m = modes();
        assert_eq!(
            encode_key(Key::F(1), Modifiers::none(), &m),
            b"\x1bOP".to_vec()
        );
        assert_eq!(
            encode_key(Key::F(5), Modifiers::none(), &m),
            b"\x1b[15~".to_vec()
        );
        let shift = Modifiers {
            shift: true,
            ..Default::default()
        };
        assert_eq!(encode_key(Key::F(5), shift, &m), b"\x1b[15;2~".to_vec());
    }

    #[test]
    fn test_modify_other_keys_level2() {
        let mut m = modes();
        m.modify_other_keys = 2;
        let ctrl = Modifiers {
            ctrl: true,
            ..Default::default()
        };
        assert_eq!(
            encode_key(Key::Char('a'), ctrl, &m),
            b"\x1b[27;5;97~".to_vec()
        );
    }

    #[test]
    fn test_modify_other_keys_level1_keeps_legacy() {
        let mut m = modes();
        m.modify_other_keys = 1;
        let ctrl = Modifiers {
            ctrl: true,
            ..Default::default()
        };
        // Plain Ctrl+C still has its legacy encoding at level 1.
        assert_eq!(encode_key(Key::Char('c'), ctrl, &m), vec![0x03]);
        let ctrl_shift = Modifiers {
            ctrl: true,
            shift: true,
            ..Default::default()
        };
        assert_eq!(
            encode_key(Key::Char('C'), ctrl_shift, &m),
            b"\x1b[27;6;67~".to_vec()
        );
    }

    #[test]
    fn test_keypad_application() {
        let mut m = modes();
        assert_eq!(encode_keypad_digit('5', &m), b"5".to_vec());
        m.keypad_application = true;
        assert_eq!(encode_keypad_digit('5', &m), b"\x1bOu".to_vec());
        assert_eq!(encode_keypad_digit('-', &m), b"\x1bOm".to_vec());
    }

    #[test]
    fn test_mouse_protocol_filtering() {
        let mut m = modes();
        let press = MouseEvent::Press(MouseButton::Left);
        assert!(encode_mouse(press, 0, 0, Modifiers::none(), &m).is_empty());

        m.mouse_protocol = MouseProtocol::X10;
        assert!(!encode_mouse(press, 0, 0, Modifiers::none(), &m).is_empty());
        assert!(encode_mouse(
            MouseEvent::Release(MouseButton::Left),
            0,
            0,
            Modifiers::none(),
            &m
        )
        .is_empty());

        m.mouse_protocol = MouseProtocol::ButtonEvent;
        assert!(encode_mouse(MouseEvent::Motion(None), 0, 0, Modifiers::none(), &m).is_empty());
        assert!(!encode_mouse(
            MouseEvent::Motion(Some(MouseButton::Left)),
            0,
            0,
            Modifiers::none(),
            &m
        )
        .is_empty());

        m.mouse_protocol = MouseProtocol::AnyEvent;
        assert!(!encode_mouse(MouseEvent::Motion(None), 0, 0, Modifiers::none(), &m).is_empty());
    }

    #[test]
    fn test_mouse_sgr_press_release() {
        let mut m = modes();
        m.mouse_protocol = MouseProtocol::AnyEvent;
        m.mouse_encoding = MouseEncoding::Sgr;

        // Press at cell (col=11, line=3), reported 1-based as 12;4.
        let bytes = encode_mouse(
            MouseEvent::Press(MouseButton::Left),
            11,
            3,
            Modifiers::none(),
            &m,
        );
        assert_eq!(bytes, b"\x1b[<0;12;4M".to_vec());

        let bytes = encode_mouse(
            MouseEvent::Release(MouseButton::Left),
            11,
            3,
            Modifiers::none(),
            &m,
        );
        assert_eq!(bytes, b"\x1b[<0;12;4m".to_vec());
    }

    #[test]
    fn test_mouse_sgr_motion() {
        let mut m = modes();
        m.mouse_protocol = MouseProtocol::AnyEvent;
        m.mouse_encoding = MouseEncoding::Sgr;
        let bytes = encode_mouse(MouseEvent::Motion(None), 4, 2, Modifiers::none(), &m);
        assert_eq!(bytes, b"\x1b[<35;5;3M".to_vec());
    }

    #[test]
    fn test_mouse_default_encoding() {
        let mut m = modes();
        m.mouse_protocol = MouseProtocol::Normal;
        let bytes = encode_mouse(
            MouseEvent::Press(MouseButton::Left),
            0,
            0,
            Modifiers::none(),
            &m,
        );
        assert_eq!(bytes, vec![0x1B, b'[', b'M', 32, 33, 33]);
    }

    #[test]
    fn test_mouse_urxvt_encoding() {
        let mut m = modes();
        m.mouse_protocol = MouseProtocol::Normal;
        m.mouse_encoding = MouseEncoding::Urxvt;
        let bytes = encode_mouse(
            MouseEvent::Press(MouseButton::Left),
            9,
            19,
            Modifiers::none(),
            &m,
        );
        assert_eq!(bytes, b"\x1b[32;10;20M".to_vec());
    }

    #[test]
    fn test_mouse_modifier_bits() {
        let mut m = modes();
        m.mouse_protocol = MouseProtocol::Normal;
        m.mouse_encoding = MouseEncoding::Sgr;
        let ctrl = Modifiers {
            ctrl: true,
            ..Default::default()
        };
        let bytes = encode_mouse(MouseEvent::Press(MouseButton::Left), 0, 0, ctrl, &m);
        assert_eq!(bytes, b"\x1b[<16;1;1M".to_vec());
    }

    #[test]
    fn test_wheel_buttons() {
        let mut m = modes();
        m.mouse_protocol = MouseProtocol::Normal;
        m.mouse_encoding = MouseEncoding::Sgr;
        let bytes = encode_mouse(
            MouseEvent::Press(MouseButton::WheelUp),
            0,
            0,
            Modifiers::none(),
            &m,
        );
        assert_eq!(bytes, b"\x1b[<64;1;1M".to_vec());
    }

    #[test]
    fn test_focus_reporting() {
        let mut m = modes();
        assert!(encode_focus(true, &m).is_empty());
        m.focus_events = true;
        assert_eq!(encode_focus(true, &m), b"\x1b[I".to_vec());
        assert_eq!(encode_focus(false, &m), b"\x1b[O".to_vec());
    }

    #[test]
    fn test_bracketed_paste() {
        let mut m = modes();
        assert_eq!(encode_paste("hi", &m), b"hi".to_vec());
        m.bracketed_paste = true;
        assert_eq!(encode_paste("hi", &m), b"\x1b[200~hi\x1b[201~".to_vec());
        // The end guard cannot be smuggled in.
        assert_eq!(
            encode_paste("a\x1b[201~b", &m),
            b"\x1b[200~ab\x1b[201~".to_vec()
        );
    }
}
