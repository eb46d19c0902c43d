//! cinder-core - terminal screen model
//!
//! The platform-independent heart of the emulator: cells, lines (compact
//! and inflated), the page grid, scrollback with stable line ids, the
//! screen state machine executing control functions, selections, search,
//! the viewport and render snapshots.
//!
//! Everything here is deterministic and free of I/O: the same operation
//! sequence always produces the same screen state. The interpreter driving
//! this crate lives in `cinder-term`.

mod cell;
mod charset;
mod color;
mod cursor;
mod grid;
mod hyperlink;
mod line;
mod modes;
mod screen;
mod scrollback;
mod search;
mod selection;
mod snapshot;
mod viewport;

pub use cell::{char_width, Blink, Cell, CellAttributes, UnderlineStyle};
pub use charset::{Charset, CharsetState};
pub use color::Color;
pub use cursor::{Cursor, CursorDisplay, CursorStyle, SavedCursor};
pub use grid::Grid;
pub use hyperlink::HyperlinkPool;
pub use line::Line;
pub use modes::{ModeValue, Modes, MouseEncoding, MouseProtocol};
pub use screen::Screen;
pub use scrollback::{Scrollback, DEFAULT_MAX_LINES};
pub use search::{SearchDirection, SearchMatch, SearchPattern, SearchState};
pub use selection::{GridPoint, Selection, SelectionMode};
pub use snapshot::{Snapshot, SnapshotCursor, SnapshotLine, SnapshotRun};
pub use viewport::Viewport;

/// Page dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub cols: usize,
    pub rows: usize,
}

impl Dimensions {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self { cols, rows }
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}
