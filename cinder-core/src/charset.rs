//! Character set translation
//!
//! G0-G3 designation slots, SI/SO locking shifts and SS2/SS3 single shifts,
//! with translation tables for DEC Special Graphics and the UK set.

use serde::{Deserialize, Serialize};

/// A designatable character set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Charset {
    /// US-ASCII, the default.
    #[default]
    Ascii,
    /// DEC Special Graphics (line drawing).
    DecSpecialGraphics,
    /// British: `#` becomes `£`.
    British,
}

impl Charset {
    /// Designation final byte per `ESC ( final` and friends.
    pub fn from_designator(c: char) -> Self {
        match c {
            '0' | '2' => Charset::DecSpecialGraphics,
            'A' => Charset::British,
            _ => Charset::Ascii,
        }
    }

    pub fn translate(self, c: char) -> char {
        match self {
            Charset::Ascii => c,
            Charset::British => {
                if c == '#' {
                    '£'
                } else {
                    c
                }
            }
            Charset::DecSpecialGraphics => dec_special_graphics(c),
        }
    }
}

/// DEC Special Graphics maps 0x5F-0x7E onto line drawing glyphs.
fn dec_special_graphics(c: char) -> char {
    match c {
        '`' => '◆',
        'a' => '▒',
        'b' => '␉',
        'c' => '␌',
        'd' => '␍',
        'e' => '␊',
        'f' => '°',
        'g' => '±',
        'h' => '␤',
        'i' => '␋',
        'j' => '┘',
        'k' => '┐',
        'l' => '┌',
        'm' => '└',
        'n' => '┼',
        'o' => '⎺',
        'p' => '⎻',
        'q' => '─',
        'r' => '⎼',
        's' => '⎽',
        't' => '├',
        'u' => '┤',
        'v' => '┴',
        'w' => '┬',
        'x' => '│',
        'y' => '≤',
        'z' => '≥',
        '{' => 'π',
        '|' => '≠',
        '}' => '£',
        '~' => '·',
        _ => c,
    }
}

/// Active charset state: four slots plus shift selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharsetState {
    slots: [Charset; 4],
    /// Slot selected into GL (0 = G0 after SI, 1 = G1 after SO).
    active: u8,
    /// Pending single shift (SS2 selects G2, SS3 selects G3).
    single_shift: Option<u8>,
}

impl Default for CharsetState {
    fn default() -> Self {
        Self {
            slots: [Charset::Ascii; 4],
            active: 0,
            single_shift: None,
        }
    }
}

impl CharsetState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn designate(&mut self, slot: u8, charset: Charset) {
        if let Some(entry) = self.slots.get_mut(slot as usize) {
            *entry = charset;
        }
    }

    pub fn slot(&self, slot: u8) -> Charset {
        self.slots.get(slot as usize).copied().unwrap_or_default()
    }

    /// SI: lock G0 into GL.
    pub fn shift_in(&mut self) {
        self.active = 0;
        self.single_shift = None;
    }

    /// SO: lock G1 into GL.
    pub fn shift_out(&mut self) {
        self.active = 1;
        self.single_shift = None;
    }

    /// SS2/SS3: use G2/G3 for the next printable only.
    pub fn single_shift(&mut self, slot: u8) {
        self.single_shift = Some(slot);
    }

    /// Translate one character, consuming any pending single shift.
    pub fn translate_next(&mut self, c: char) -> char {
        let slot = self.single_shift.take().unwrap_or(self.active);
        self.slot(slot).translate(c)
    }
}
