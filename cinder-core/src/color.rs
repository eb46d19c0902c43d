//! Cell colors
//!
//! A color is either the terminal default, an index into the 256-color
//! palette (0-15 being the named ANSI colors), or a 24-bit RGB value.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Color {
    /// Default foreground or background, resolved by the renderer.
    #[default]
    Default,
    /// Palette color: 0-7 standard, 8-15 bright, 16-231 cube, 232-255 gray.
    Indexed(u8),
    /// 24-bit direct color.
    Rgb { r: u8, g: u8, b: u8 },
}

impl Color {
    pub const BLACK: u8 = 0;
    pub const RED: u8 = 1;
    pub const GREEN: u8 = 2;
    pub const YELLOW: u8 = 3;
    pub const BLUE: u8 = 4;
    pub const MAGENTA: u8 = 5;
    pub const CYAN: u8 = 6;
    pub const WHITE: u8 = 7;

    pub fn indexed(index: u8) -> Self {
        Color::Indexed(index)
    }

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color::Rgb { r, g, b }
    }

    /// Resolve to RGB using the xterm palette; Default maps to white.
    pub fn to_rgb(&self) -> (u8, u8, u8) {
        match self {
            Color::Default => (255, 255, 255),
            Color::Indexed(idx) => palette_rgb(*idx),
            Color::Rgb { r, g, b } => (*r, *g, *b),
        }
    }
}

/// xterm 256-color palette.
fn palette_rgb(index: u8) -> (u8, u8, u8) {
    match index {
        0 => (0, 0, 0),
        1 => (205, 0, 0),
        2 => (0, 205, 0),
        3 => (205, 205, 0),
        4 => (0, 0, 238),
        5 => (205, 0, 205),
        6 => (0, 205, 205),
        7 => (229, 229, 229),
        8 => (127, 127, 127),
        9 => (255, 0, 0),
        10 => (0, 255, 0),
        11 => (255, 255, 0),
        12 => (92, 92, 255),
        13 => (255, 0, 255),
        14 => (0, 255, 255),
        15 => (255, 255, 255),
        16..=231 => {
            let idx = index - 16;
            let r = idx / 36;
            let g = (idx % 36) / 6;
            let b = idx % 6;
            let level = |v: u8| if v == 0 { 0 } else { 55 + v * 40 };
            (level(r), level(g), level(b))
        }
        232..=255 => {
            let gray = 8 + (index - 232) * 10;
            (gray, gray, gray)
        }
    }
}
