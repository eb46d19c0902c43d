//! Terminal cells
//!
//! A cell holds a grapheme cluster (base character plus any combining
//! marks), its display width, the graphics attributes in effect when it was
//! written, and an optional hyperlink id. A wide character occupies two
//! cells: the base cell with width 2 followed by a width-0 tail.

use serde::{Deserialize, Serialize};

use crate::color::Color;

/// Underline rendition (SGR 4, SGR 4:0..4:5, SGR 21).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnderlineStyle {
    #[default]
    None,
    Single,
    Double,
    Curly,
    Dotted,
    Dashed,
}

/// Blink rendition (SGR 5 slow, SGR 6 rapid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Blink {
    #[default]
    None,
    Slow,
    Rapid,
}

/// Graphics attributes applied to a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CellAttributes {
    pub fg: Color,
    pub bg: Color,
    /// Underline color (SGR 58/59); Default means "same as fg".
    pub underline_color: Color,
    pub underline: UnderlineStyle,
    pub blink: Blink,
    /// Bold (SGR 1).
    pub bold: bool,
    /// Faint/dim (SGR 2).
    pub faint: bool,
    /// Italic (SGR 3).
    pub italic: bool,
    /// Reverse video (SGR 7).
    pub inverse: bool,
    /// Concealed (SGR 8).
    pub hidden: bool,
    /// Crossed out (SGR 9).
    pub strikethrough: bool,
    /// Overlined (SGR 53).
    pub overline: bool,
}

impl CellAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Foreground as rendered, honoring reverse video.
    pub fn effective_fg(&self) -> Color {
        if self.inverse {
            self.bg
        } else {
            self.fg
        }
    }

    /// Background as rendered, honoring reverse video.
    pub fn effective_bg(&self) -> Color {
        if self.inverse {
            self.fg
        } else {
            self.bg
        }
    }

    /// The attributes an erased cell takes: background color only (BCE).
    pub fn fill(&self) -> Self {
        Self {
            bg: self.bg,
            ..Self::default()
        }
    }
}

/// One cell of the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// Cluster content; empty means a blank cell.
    content: String,
    /// 1 normal, 2 wide base, 0 wide tail.
    width: u8,
    pub attrs: CellAttributes,
    /// Hyperlink pool id; 0 means none.
    pub hyperlink_id: u32,
}

impl Cell {
    pub fn new() -> Self {
        Self {
            content: String::new(),
            width: 1,
            attrs: CellAttributes::default(),
            hyperlink_id: 0,
        }
    }

    pub fn blank(attrs: CellAttributes) -> Self {
        Self {
            content: String::new(),
            width: 1,
            attrs,
            hyperlink_id: 0,
        }
    }

    pub fn with_char(c: char) -> Self {
        let mut cell = Self::new();
        cell.set_char(c);
        cell
    }

    pub fn set_char(&mut self, c: char) {
        self.content.clear();
        self.content.push(c);
        self.width = char_width(c);
    }

    /// Append a combining mark to the cluster.
    pub fn push_combining(&mut self, c: char) {
        if !self.content.is_empty() {
            self.content.push(c);
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// First scalar of the cluster, or space when blank.
    pub fn display_char(&self) -> char {
        self.content.chars().next().unwrap_or(' ')
    }

    pub fn is_blank(&self) -> bool {
        self.content.is_empty() || self.content == " "
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn is_wide(&self) -> bool {
        self.width == 2
    }

    /// Turn this cell into the right half of a wide pair.
    pub fn set_wide_tail(&mut self, attrs: CellAttributes) {
        self.content.clear();
        self.width = 0;
        self.attrs = attrs;
    }

    pub fn is_wide_tail(&self) -> bool {
        self.width == 0
    }

    /// Blank the cell, keeping the given fill attributes.
    pub fn clear(&mut self, attrs: CellAttributes) {
        self.content.clear();
        self.width = 1;
        self.attrs = attrs;
        self.hyperlink_id = 0;
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::new()
    }
}

/// Display width of a character: 0 combining, 1 narrow, 2 wide.
pub fn char_width(c: char) -> u8 {
    use unicode_width::UnicodeWidthChar;
    match c.width() {
        Some(w) => w.min(2) as u8,
        // Control characters never reach the grid; treat as narrow.
        None => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_cell() {
        let cell = Cell::new();
        assert!(cell.is_blank());
        assert_eq!(cell.width(), 1);
        assert_eq!(cell.display_char(), ' ');
    }

    #[test]
    fn test_narrow_char() {
        let cell = Cell::with_char('A');
        assert_eq!(cell.display_char(), 'A');
        assert_eq!(cell.width(), 1);
    }

    #[test]
    fn test_wide_char() {
        let cell = Cell::with_char('中');
        assert_eq!(cell.width(), 2);
        assert!(cell.is_wide());
    }

    #[test]
    fn test_wide_tail() {
        let mut cell = Cell::with_char('中');
        cell.set_wide_tail(CellAttributes::default());
        assert!(cell.is_wide_tail());
        assert!(cell.is_blank());
    }

    #[test]
    fn test_combining_cluster() {
        let mut cell = Cell::with_char('e');
        cell.push_combining('\u{0301}');
        assert_eq!(cell.content(), "e\u{0301}");
        assert_eq!(cell.width(), 1);
    }

    #[test]
    fn test_clear_keeps_fill() {
        let mut attrs = CellAttributes::new();
        attrs.bg = Color::Indexed(4);
        let mut cell = Cell::with_char('X');
        cell.hyperlink_id = 7;
        cell.clear(attrs);
        assert!(cell.is_blank());
        assert_eq!(cell.attrs.bg, Color::Indexed(4));
        assert_eq!(cell.hyperlink_id, 0);
    }

    #[test]
    fn test_effective_colors_inverse() {
        let mut attrs = CellAttributes::new();
        attrs.fg = Color::Indexed(1);
        attrs.bg = Color::Indexed(0);
        attrs.inverse = true;
        assert_eq!(attrs.effective_fg(), Color::Indexed(0));
        assert_eq!(attrs.effective_bg(), Color::Indexed(1));
    }

    #[test]
    fn test_fill_attrs() {
        let mut attrs = CellAttributes::new();
        attrs.bold = true;
        attrs.bg = Color::Indexed(2);
        let fill = attrs.fill();
        assert!(!fill.bold);
        assert_eq!(fill.bg, Color::Indexed(2));
    }
}
