//! Cursor state
//!
//! Position, pending-wrap sentinel, the attributes applied to new cells, and
//! the visibility/blink machine driven by DECTCEM, DECSCUSR and the host's
//! blink timer.

use serde::{Deserialize, Serialize};

use crate::cell::CellAttributes;

/// Cursor glyph shape (DECSCUSR).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CursorStyle {
    #[default]
    Block,
    Underline,
    Bar,
}

/// What the renderer should draw this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CursorDisplay {
    /// Visible, not blinking.
    Steady,
    /// Visible, blink phase on.
    BlinkOn,
    /// Visible, blink phase off.
    BlinkOff,
    /// Not drawn (DECTCEM reset).
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// 0-indexed column.
    pub col: usize,
    /// 0-indexed row.
    pub row: usize,
    pub style: CursorStyle,
    /// DECTCEM.
    pub visible: bool,
    /// Blink enabled (DECSCUSR / mode 12).
    pub blinking: bool,
    /// Current blink phase, toggled by the timer.
    blink_on: bool,
    /// Attributes for subsequently written cells.
    pub attrs: CellAttributes,
    /// DECOM: addressing relative to the scroll region.
    pub origin_mode: bool,
    /// The cursor sits past the right margin; the next print wraps.
    pub pending_wrap: bool,
    /// Hyperlink applied to subsequently written cells (0 = none).
    pub hyperlink_id: u32,
}

impl Cursor {
    pub fn new() -> Self {
        Self {
            col: 0,
            row: 0,
            style: CursorStyle::Block,
            visible: true,
            blinking: true,
            blink_on: true,
            attrs: CellAttributes::default(),
            origin_mode: false,
            pending_wrap: false,
            hyperlink_id: 0,
        }
    }

    /// Resolve the visibility/blink state machine.
    pub fn display(&self) -> CursorDisplay {
        if !self.visible {
            CursorDisplay::Hidden
        } else if !self.blinking {
            CursorDisplay::Steady
        } else if self.blink_on {
            CursorDisplay::BlinkOn
        } else {
            CursorDisplay::BlinkOff
        }
    }

    /// Advance the blink phase; called from the host's blink timer.
    pub fn tick_blink(&mut self) {
        if self.visible && self.blinking {
            self.blink_on = !self.blink_on;
        }
    }

    /// Restart the blink cycle in the on phase (any style change does this).
    pub fn reset_blink_phase(&mut self) {
        self.blink_on = true;
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new()
    }
}

/// State captured by DECSC and restored by DECRC.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SavedCursor {
    pub col: usize,
    pub row: usize,
    pub attrs: CellAttributes,
    pub origin_mode: bool,
    pub pending_wrap: bool,
    pub hyperlink_id: u32,
}

impl SavedCursor {
    pub fn capture(cursor: &Cursor) -> Self {
        Self {
            col: cursor.col,
            row: cursor.row,
            attrs: cursor.attrs,
            origin_mode: cursor.origin_mode,
            pending_wrap: cursor.pending_wrap,
            hyperlink_id: cursor.hyperlink_id,
        }
    }

    pub fn restore_into(&self, cursor: &mut Cursor) {
        cursor.col = self.col;
        cursor.row = self.row;
        cursor.attrs = self.attrs;
        cursor.origin_mode = self.origin_mode;
        cursor.pending_wrap = self.pending_wrap;
        cursor.hyperlink_id = self.hyperlink_id;
    }
}
