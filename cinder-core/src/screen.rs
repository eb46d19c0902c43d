//! The screen
//!
//! Cursor, margins, tab stops, charsets, the primary/alternate grid pair and
//! the scrollback, plus every control function the interpreter executes.
//! All coordinates here are 0-based; 1-based wire parameters are converted
//! by the interpreter before they arrive.
//!
//! Erased and scrolled-in cells take the current background color only
//! (background color erase); see [`CellAttributes::fill`].

use crate::cell::{char_width, Cell, CellAttributes};
use crate::charset::{Charset, CharsetState};
use crate::cursor::{Cursor, SavedCursor};
use crate::grid::Grid;
use crate::hyperlink::HyperlinkPool;
use crate::line::Line;
use crate::modes::Modes;
use crate::scrollback::Scrollback;
use crate::search::{SearchMatch, SearchPattern};
use crate::selection::{GridPoint, Selection, SelectionMode};
use crate::viewport::Viewport;
use crate::Dimensions;

const DEFAULT_TAB_INTERVAL: usize = 8;
/// Title stack depth per xterm.
const MAX_TITLE_STACK: usize = 10;

#[derive(Debug, Clone)]
pub struct Screen {
    primary: Grid,
    alternate: Grid,
    using_alternate: bool,
    scrollback: Scrollback,
    cursor: Cursor,
    saved_cursor_primary: SavedCursor,
    saved_cursor_alternate: SavedCursor,
    modes: Modes,
    /// Vertical margins (DECSTBM), 0-based inclusive; None = full page.
    scroll_region: Option<(usize, usize)>,
    /// Horizontal margins (DECSLRM), 0-based inclusive; honored while
    /// DECLRMM is set.
    h_margins: Option<(usize, usize)>,
    tab_stops: Vec<bool>,
    selection: Selection,
    viewport: Viewport,
    hyperlinks: HyperlinkPool,
    charsets: CharsetState,
    title: String,
    title_stack: Vec<String>,
    reflow_on_resize: bool,
}

impl Screen {
    pub fn new(dims: Dimensions) -> Self {
        Self::with_history(dims, crate::scrollback::DEFAULT_MAX_LINES, true)
    }

    pub fn with_history(dims: Dimensions, max_history: usize, reflow: bool) -> Self {
        Self {
            primary: Grid::new(dims, reflow),
            alternate: Grid::new(dims, false),
            using_alternate: false,
            scrollback: Scrollback::new(max_history),
            cursor: Cursor::new(),
            saved_cursor_primary: SavedCursor::default(),
            saved_cursor_alternate: SavedCursor::default(),
            modes: Modes::new(),
            scroll_region: None,
            h_margins: None,
            tab_stops: default_tab_stops(dims.cols),
            selection: Selection::new(),
            viewport: Viewport::new(),
            hyperlinks: HyperlinkPool::new(),
            charsets: CharsetState::new(),
            title: String::new(),
            title_stack: Vec::new(),
            reflow_on_resize: reflow,
        }
    }

    // {{{ accessors

    pub fn grid(&self) -> &Grid {
        if self.using_alternate {
            &self.alternate
        } else {
            &self.primary
        }
    }

    fn grid_mut(&mut self) -> &mut Grid {
        if self.using_alternate {
            &mut self.alternate
        } else {
            &mut self.primary
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        self.grid().dimensions()
    }

    pub fn cols(&self) -> usize {
        self.grid().cols()
    }

    pub fn rows(&self) -> usize {
        self.grid().rows()
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    pub fn modes(&self) -> &Modes {
        &self.modes
    }

    pub fn modes_mut(&mut self) -> &mut Modes {
        &mut self.modes
    }

    pub fn scrollback(&self) -> &Scrollback {
        &self.scrollback
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn hyperlinks(&self) -> &HyperlinkPool {
        &self.hyperlinks
    }

    pub fn charsets(&self) -> &CharsetState {
        &self.charsets
    }

    pub fn is_alternate(&self) -> bool {
        self.using_alternate
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.chars().take(4096).collect();
    }

    /// CSI 22 t.
    pub fn push_title(&mut self) {
        if self.title_stack.len() < MAX_TITLE_STACK {
            self.title_stack.push(self.title.clone());
        }
    }

    /// CSI 23 t.
    pub fn pop_title(&mut self) {
        if let Some(title) = self.title_stack.pop() {
            self.title = title;
        }
    }

    pub fn line(&self, row: usize) -> &Line {
        self.grid().line(row)
    }

    /// Flag a row as a navigation mark (shell integration prompts).
    pub fn mark_row(&mut self, row: usize) {
        if let Some(line) = self.grid_mut().get_line_mut(row) {
            line.marked = true;
        }
    }

    /// Vertical margins, 0-based inclusive.
    pub fn vertical_margins(&self) -> (usize, usize) {
        self.scroll_region.unwrap_or((0, self.rows() - 1))
    }

    /// Horizontal margins, 0-based inclusive; the full row unless DECLRMM.
    pub fn horizontal_margins(&self) -> (usize, usize) {
        if self.modes.left_right_margins {
            self.h_margins.unwrap_or((0, self.cols() - 1))
        } else {
            (0, self.cols() - 1)
        }
    }

    fn fill_attrs(&self) -> CellAttributes {
        self.cursor.attrs.fill()
    }

    // }}}
    // {{{ absolute line ids

    /// Absolute id of a page row.
    pub fn line_id_of_row(&self, row: usize) -> u64 {
        self.scrollback.next_id() + row as u64
    }

    /// Line by absolute id, from history or the page.
    pub fn line_by_id(&self, id: u64) -> Option<&Line> {
        if id < self.scrollback.next_id() {
            self.scrollback.get_by_id(id)
        } else {
            self.grid().get_line((id - self.scrollback.next_id()) as usize)
        }
    }

    /// Oldest addressable absolute id.
    pub fn first_line_id(&self) -> u64 {
        self.scrollback.base_id()
    }

    /// Newest addressable absolute id (bottom page row).
    pub fn last_line_id(&self) -> u64 {
        self.line_id_of_row(self.rows().saturating_sub(1))
    }

    // }}}
    // {{{ hyperlinks

    /// OSC 8 open: intern the link and point the cursor at it.
    pub fn open_hyperlink(&mut self, id_param: &str, uri: &str) {
        let id = self.hyperlinks.open(id_param, uri);
        self.close_hyperlink();
        self.cursor.hyperlink_id = id;
    }

    /// OSC 8 with an empty URI.
    pub fn close_hyperlink(&mut self) {
        let old = std::mem::replace(&mut self.cursor.hyperlink_id, 0);
        self.hyperlinks.release(old);
    }

    pub fn hyperlink_uri(&self, id: u32) -> Option<&str> {
        self.hyperlinks.uri(id)
    }

    fn release_line_links(hyperlinks: &mut HyperlinkPool, line: &Line) {
        for id in line.hyperlink_ids() {
            hyperlinks.release(id);
        }
    }

    fn release_links_in(&mut self, row: usize, start: usize, end: usize) {
        let ids: Vec<u32> = (start..end)
            .map(|col| self.grid().line(row).hyperlink_at(col))
            .filter(|&id| id != 0)
            .collect();
        for id in ids {
            self.hyperlinks.release(id);
        }
    }

    // }}}
    // {{{ printing

    /// Write one character at the cursor, honoring charset translation,
    /// autowrap, insert mode and wide-cell pairing.
    pub fn print(&mut self, c: char) {
        let c = self.charsets.translate_next(c);
        let width = char_width(c) as usize;

        if width == 0 {
            self.print_combining(c);
            return;
        }

        let (left, right) = self.horizontal_margins();
        let auto_wrap = self.modes.auto_wrap;

        if self.cursor.pending_wrap {
            self.cursor.pending_wrap = false;
            if auto_wrap {
                let row = self.cursor.row;
                self.grid_mut().line_mut(row).wrapped = true;
                self.cursor.col = left;
                self.index();
            }
        }

        // A wide char that cannot fit before the right margin wraps early.
        if width == 2 && self.cursor.col + 1 > right {
            if auto_wrap {
                let row = self.cursor.row;
                self.grid_mut().line_mut(row).wrapped = true;
                self.cursor.col = left;
                self.index();
            } else {
                self.cursor.col = right.saturating_sub(1).max(left);
            }
        }

        let row = self.cursor.row;
        let col = self.cursor.col;
        let attrs = self.cursor.attrs;
        let link = self.cursor.hyperlink_id;

        self.invalidate_selection_on(row);

        if self.modes.insert_mode {
            let fill = self.fill_attrs();
            self.grid_mut()
                .line_mut(row)
                .insert_cells(col, width, right + 1, fill);
        }

        // Compact fast path: uniform narrow text appended at the line end.
        let took_fast_path = width == 1
            && link == 0
            && !self.modes.insert_mode
            && left == 0
            && self.grid().line(row).trivial_len() == Some(col)
            && self.grid_mut().line_mut(row).try_append_trivial(c, attrs);

        if !took_fast_path {
            self.release_links_in(row, col, (col + width).min(right + 1));
            let mut cell = Cell::with_char(c);
            cell.attrs = attrs;
            cell.hyperlink_id = link;
            if link != 0 {
                self.hyperlinks.retain(link);
            }
            self.grid_mut().line_mut(row).put_cell(col, cell);
        }

        let next = col + width;
        if next > right {
            self.cursor.col = right;
            self.cursor.pending_wrap = auto_wrap;
        } else {
            self.cursor.col = next;
        }
    }

    fn print_combining(&mut self, c: char) {
        let row = self.cursor.row;
        let col = self.cursor.col;
        if col == 0 && !self.cursor.pending_wrap {
            return;
        }
        // With a pending wrap the base cell is the one under the cursor + 1.
        let target = if self.cursor.pending_wrap { col + 1 } else { col };
        self.grid_mut().line_mut(row).combine_at(target, c);
    }

    // }}}
    // {{{ C0-level cursor motion

    pub fn backspace(&mut self) {
        let (left, _) = self.horizontal_margins();
        self.cursor.pending_wrap = false;
        if self.cursor.col > left {
            self.cursor.col -= 1;
        } else if self.cursor.col > 0 && !self.modes.left_right_margins {
            self.cursor.col -= 1;
        }
    }

    pub fn carriage_return(&mut self) {
        let (left, _) = self.horizontal_margins();
        self.cursor.pending_wrap = false;
        self.cursor.col = if self.cursor.col >= left { left } else { 0 };
    }

    /// LF/VT/FF: move down, scrolling at the bottom margin.
    pub fn linefeed(&mut self) {
        self.index();
    }

    /// IND: like linefeed.
    pub fn index(&mut self) {
        let (_, bottom) = self.vertical_margins();
        self.cursor.pending_wrap = false;
        if self.cursor.row == bottom {
            self.scroll_up(1);
        } else if self.cursor.row + 1 < self.rows() {
            self.cursor.row += 1;
        }
    }

    /// RI: move up, scrolling at the top margin.
    pub fn reverse_index(&mut self) {
        let (top, _) = self.vertical_margins();
        self.cursor.pending_wrap = false;
        if self.cursor.row == top {
            self.scroll_down(1);
        } else if self.cursor.row > 0 {
            self.cursor.row -= 1;
        }
    }

    /// NEL.
    pub fn next_line(&mut self) {
        self.index();
        self.carriage_return();
    }

    // }}}
    // {{{ tabs

    pub fn tab(&mut self) {
        let (_, right) = self.horizontal_margins();
        self.cursor.pending_wrap = false;
        let mut col = self.cursor.col + 1;
        while col < right && !self.tab_stops.get(col).copied().unwrap_or(false) {
            col += 1;
        }
        self.cursor.col = col.min(right);
    }

    /// CHT.
    pub fn tab_forward(&mut self, n: usize) {
        for _ in 0..n.max(1) {
            self.tab();
        }
    }

    /// CBT.
    pub fn tab_backward(&mut self, n: usize) {
        let (left, _) = self.horizontal_margins();
        self.cursor.pending_wrap = false;
        for _ in 0..n.max(1) {
            let mut col = self.cursor.col;
            while col > left {
                col -= 1;
                if self.tab_stops.get(col).copied().unwrap_or(false) {
                    break;
                }
            }
            self.cursor.col = col;
        }
    }

    /// HTS.
    pub fn set_tab_stop(&mut self) {
        let col = self.cursor.col;
        if let Some(stop) = self.tab_stops.get_mut(col) {
            *stop = true;
        }
    }

    /// TBC 0 / 3.
    pub fn clear_tab_stop(&mut self, mode: u16) {
        match mode {
            0 => {
                let col = self.cursor.col;
                if let Some(stop) = self.tab_stops.get_mut(col) {
                    *stop = false;
                }
            }
            3 => self.tab_stops.iter_mut().for_each(|s| *s = false),
            _ => {}
        }
    }

    // }}}
    // {{{ scrolling

    /// Scroll the margin rectangle up by `n`; full-page scrolls on the
    /// primary screen feed the scrollback.
    pub fn scroll_up(&mut self, n: usize) {
        let (top, bottom) = self.vertical_margins();
        let (left, right) = self.horizontal_margins();
        let fill = self.fill_attrs();

        let removed = self.grid_mut().scroll_up(top, bottom, left, right, n, fill);
        if removed.is_empty() {
            return;
        }

        let evict = !self.using_alternate && top == 0 && left == 0 && right == self.cols() - 1;
        for line in removed {
            if evict {
                if let Some(dropped) = self.scrollback.push(line) {
                    Self::release_line_links(&mut self.hyperlinks, &dropped);
                }
            } else {
                Self::release_line_links(&mut self.hyperlinks, &line);
            }
        }

        // Selections anchored on lines that fell off the cap are dead.
        if self.selection.active && self.selection.bounds().0.line < self.scrollback.base_id() {
            self.selection.clear();
        }
        let len = self.scrollback.len();
        self.viewport.clamp(len);
    }

    /// Scroll the margin rectangle down by `n`.
    pub fn scroll_down(&mut self, n: usize) {
        let (top, bottom) = self.vertical_margins();
        let (left, right) = self.horizontal_margins();
        let fill = self.fill_attrs();
        self.grid_mut().scroll_down(top, bottom, left, right, n, fill);
    }

    // }}}
    // {{{ absolute cursor motion

    /// CUP/HVP target, already 0-based; origin mode maps into the margins.
    pub fn goto(&mut self, row: usize, col: usize) {
        let (top, bottom) = self.vertical_margins();
        let (left, right) = self.horizontal_margins();
        self.cursor.pending_wrap = false;
        if self.modes.origin_mode {
            self.cursor.row = (top + row).min(bottom);
            self.cursor.col = (left + col).min(right);
        } else {
            self.cursor.row = row.min(self.rows() - 1);
            self.cursor.col = col.min(self.cols() - 1);
        }
    }

    /// CHA/HPA, 0-based.
    pub fn goto_col(&mut self, col: usize) {
        let (left, right) = self.horizontal_margins();
        self.cursor.pending_wrap = false;
        self.cursor.col = if self.modes.origin_mode {
            (left + col).min(right)
        } else {
            col.min(self.cols() - 1)
        };
    }

    /// VPA, 0-based.
    pub fn goto_row(&mut self, row: usize) {
        let (top, bottom) = self.vertical_margins();
        self.cursor.pending_wrap = false;
        self.cursor.row = if self.modes.origin_mode {
            (top + row).min(bottom)
        } else {
            row.min(self.rows() - 1)
        };
    }

    pub fn move_up(&mut self, n: usize) {
        let (top, _) = self.vertical_margins();
        let floor = if self.cursor.row >= top { top } else { 0 };
        self.cursor.row = self.cursor.row.saturating_sub(n).max(floor);
        self.cursor.pending_wrap = false;
    }

    pub fn move_down(&mut self, n: usize) {
        let (_, bottom) = self.vertical_margins();
        let ceil = if self.cursor.row <= bottom {
            bottom
        } else {
            self.rows() - 1
        };
        self.cursor.row = (self.cursor.row + n).min(ceil);
        self.cursor.pending_wrap = false;
    }

    pub fn move_left(&mut self, n: usize) {
        let (left, _) = self.horizontal_margins();
        let floor = if self.cursor.col >= left { left } else { 0 };
        self.cursor.col = self.cursor.col.saturating_sub(n).max(floor);
        self.cursor.pending_wrap = false;
    }

    pub fn move_right(&mut self, n: usize) {
        let (_, right) = self.horizontal_margins();
        let ceil = if self.cursor.col <= right {
            right
        } else {
            self.cols() - 1
        };
        self.cursor.col = (self.cursor.col + n).min(ceil);
        self.cursor.pending_wrap = false;
    }

    // }}}
    // {{{ margins

    /// DECSTBM, 0-based inclusive. Clamps, requires top < bottom, homes the
    /// cursor.
    pub fn set_scroll_region(&mut self, top: usize, bottom: usize) {
        let rows = self.rows();
        let top = top.min(rows - 1);
        let bottom = bottom.min(rows - 1);
        if top < bottom {
            self.scroll_region = if (top, bottom) == (0, rows - 1) {
                None
            } else {
                Some((top, bottom))
            };
            self.home_cursor();
        }
    }

    /// DECSLRM, 0-based inclusive. Only while DECLRMM is set.
    pub fn set_horizontal_margins(&mut self, left: usize, right: usize) {
        if !self.modes.left_right_margins {
            return;
        }
        let cols = self.cols();
        let left = left.min(cols - 1);
        let right = right.min(cols - 1);
        if left < right {
            self.h_margins = if (left, right) == (0, cols - 1) {
                None
            } else {
                Some((left, right))
            };
            self.home_cursor();
        }
    }

    /// DECLRMM reset drops the margins entirely.
    pub fn reset_horizontal_margins(&mut self) {
        self.h_margins = None;
    }

    fn home_cursor(&mut self) {
        self.cursor.pending_wrap = false;
        if self.modes.origin_mode {
            let (top, _) = self.vertical_margins();
            let (left, _) = self.horizontal_margins();
            self.cursor.row = top;
            self.cursor.col = left;
        } else {
            self.cursor.row = 0;
            self.cursor.col = 0;
        }
    }

    /// DECOM flips how addressing works and homes the cursor.
    pub fn set_origin_mode(&mut self, enabled: bool) {
        self.modes.origin_mode = enabled;
        self.cursor.origin_mode = enabled;
        self.home_cursor();
    }

    // }}}
    // {{{ erase / insert / delete

    /// ED 0/1/2/3.
    pub fn erase_display(&mut self, mode: u16) {
        let fill = self.fill_attrs();
        let row = self.cursor.row;
        let col = self.cursor.col;
        let rows = self.rows();
        let cols = self.cols();
        self.selection.clear();

        match mode {
            0 => {
                self.release_links_in(row, col, cols);
                for r in row + 1..rows {
                    self.release_links_in(r, 0, cols);
                }
                self.grid_mut().clear_below(row, col, fill);
            }
            1 => {
                for r in 0..row {
                    self.release_links_in(r, 0, cols);
                }
                self.release_links_in(row, 0, col + 1);
                self.grid_mut().clear_above(row, col, fill);
            }
            2 => {
                for r in 0..rows {
                    self.release_links_in(r, 0, cols);
                }
                self.grid_mut().clear(fill);
            }
            3 => {
                for line in self.scrollback.clear() {
                    Self::release_line_links(&mut self.hyperlinks, &line);
                }
                self.viewport.clamp(0);
            }
            _ => {}
        }
    }

    /// EL 0/1/2.
    pub fn erase_line(&mut self, mode: u16) {
        let fill = self.fill_attrs();
        let row = self.cursor.row;
        let col = self.cursor.col;
        let cols = self.cols();
        self.invalidate_selection_on(row);

        match mode {
            0 => {
                self.release_links_in(row, col, cols);
                self.grid_mut().line_mut(row).clear_from(col, fill);
            }
            1 => {
                self.release_links_in(row, 0, col + 1);
                self.grid_mut().line_mut(row).clear_to(col, fill);
            }
            2 => {
                self.release_links_in(row, 0, cols);
                self.grid_mut().line_mut(row).clear(fill);
            }
            _ => {}
        }
    }

    /// ECH.
    pub fn erase_chars(&mut self, n: usize) {
        let fill = self.fill_attrs();
        let row = self.cursor.row;
        let col = self.cursor.col;
        let n = n.max(1);
        self.invalidate_selection_on(row);
        self.release_links_in(row, col, (col + n).min(self.cols()));
        self.grid_mut().line_mut(row).erase_cells(col, n, fill);
    }

    /// ICH. No-op when the cursor is outside the horizontal margins.
    pub fn insert_chars(&mut self, n: usize) {
        let (left, right) = self.horizontal_margins();
        let col = self.cursor.col;
        if col < left || col > right {
            return;
        }
        let fill = self.fill_attrs();
        let row = self.cursor.row;
        self.invalidate_selection_on(row);
        self.grid_mut()
            .line_mut(row)
            .insert_cells(col, n.max(1), right + 1, fill);
    }

    /// DCH.
    pub fn delete_chars(&mut self, n: usize) {
        let (left, right) = self.horizontal_margins();
        let col = self.cursor.col;
        if col < left || col > right {
            return;
        }
        let fill = self.fill_attrs();
        let row = self.cursor.row;
        self.invalidate_selection_on(row);
        self.release_links_in(row, col, (col + n.max(1)).min(right + 1));
        self.grid_mut()
            .line_mut(row)
            .delete_cells(col, n.max(1), right + 1, fill);
    }

    /// IL. Ignored when the cursor is outside the margins.
    pub fn insert_lines(&mut self, n: usize) {
        let (top, bottom) = self.vertical_margins();
        let (left, right) = self.horizontal_margins();
        let row = self.cursor.row;
        if row < top || row > bottom || self.cursor.col < left || self.cursor.col > right {
            return;
        }
        let fill = self.fill_attrs();
        self.selection.clear();
        self.grid_mut()
            .scroll_down(row, bottom, left, right, n.max(1), fill);
        self.cursor.col = left;
        self.cursor.pending_wrap = false;
    }

    /// DL.
    pub fn delete_lines(&mut self, n: usize) {
        let (top, bottom) = self.vertical_margins();
        let (left, right) = self.horizontal_margins();
        let row = self.cursor.row;
        if row < top || row > bottom || self.cursor.col < left || self.cursor.col > right {
            return;
        }
        let fill = self.fill_attrs();
        self.selection.clear();
        let removed = self
            .grid_mut()
            .scroll_up(row, bottom, left, right, n.max(1), fill);
        for line in removed {
            Self::release_line_links(&mut self.hyperlinks, &line);
        }
        self.cursor.col = left;
        self.cursor.pending_wrap = false;
    }

    // }}}
    // {{{ saved cursor, charsets

    /// DECSC.
    pub fn save_cursor(&mut self) {
        let saved = SavedCursor::capture(&self.cursor);
        if self.using_alternate {
            self.saved_cursor_alternate = saved;
        } else {
            self.saved_cursor_primary = saved;
        }
    }

    /// DECRC.
    pub fn restore_cursor(&mut self) {
        let saved = if self.using_alternate {
            self.saved_cursor_alternate.clone()
        } else {
            self.saved_cursor_primary.clone()
        };
        saved.restore_into(&mut self.cursor);
        self.cursor.col = self.cursor.col.min(self.cols() - 1);
        self.cursor.row = self.cursor.row.min(self.rows() - 1);
    }

    pub fn designate_charset(&mut self, slot: u8, designator: char) {
        self.charsets
            .designate(slot, Charset::from_designator(designator));
    }

    pub fn shift_in(&mut self) {
        self.charsets.shift_in();
    }

    pub fn shift_out(&mut self) {
        self.charsets.shift_out();
    }

    pub fn single_shift(&mut self, slot: u8) {
        self.charsets.single_shift(slot);
    }

    // }}}
    // {{{ alternate screen

    pub fn enter_alternate_screen(&mut self, clear: bool) {
        if !self.using_alternate {
            self.using_alternate = true;
            self.modes.alternate_screen = true;
            self.selection.clear();
            self.viewport.scroll_to_bottom();
        }
        if clear {
            self.alternate.clear(CellAttributes::default());
            self.cursor.row = 0;
            self.cursor.col = 0;
            self.cursor.pending_wrap = false;
        }
    }

    pub fn exit_alternate_screen(&mut self) {
        if self.using_alternate {
            self.using_alternate = false;
            self.modes.alternate_screen = false;
            self.selection.clear();
        }
    }

    // }}}
    // {{{ resets, DECALN

    /// RIS. Keeps dimensions and history, resets everything else.
    pub fn reset(&mut self) {
        let dims = self.dimensions();
        let history = std::mem::replace(&mut self.scrollback, Scrollback::default());
        *self = Self::with_history(dims, history.max_lines(), self.reflow_on_resize);
        self.scrollback = history;
    }

    /// DECSTR.
    pub fn soft_reset(&mut self) {
        self.cursor.visible = true;
        self.modes.cursor_visible = true;
        self.scroll_region = None;
        self.h_margins = None;
        self.modes.left_right_margins = false;
        self.modes.origin_mode = false;
        self.cursor.origin_mode = false;
        self.modes.insert_mode = false;
        self.modes.cursor_keys_application = false;
        self.modes.keypad_application = false;
        self.cursor.attrs = CellAttributes::default();
        self.cursor.pending_wrap = false;
        self.saved_cursor_primary = SavedCursor::default();
        self.saved_cursor_alternate = SavedCursor::default();
        self.charsets.reset();
        self.close_hyperlink();
    }

    /// DECALN: fill the page with E, reset margins, home the cursor.
    pub fn alignment_test(&mut self) {
        self.scroll_region = None;
        self.h_margins = None;
        self.selection.clear();
        let rows = self.rows();
        let cols = self.cols();
        for row in 0..rows {
            self.release_links_in(row, 0, cols);
            let line = self.grid_mut().line_mut(row);
            line.clear(CellAttributes::default());
            for col in 0..cols {
                line.put_cell(col, Cell::with_char('E'));
            }
        }
        self.cursor.row = 0;
        self.cursor.col = 0;
        self.cursor.pending_wrap = false;
    }

    // }}}
    // {{{ resize & reflow

    pub fn resize(&mut self, dims: Dimensions) {
        if dims.cols == 0 || dims.rows == 0 || dims == self.dimensions() {
            return;
        }
        let fill = self.fill_attrs();
        let old = self.dimensions();
        self.selection.clear();

        // The alternate screen never reflows.
        self.alternate.resize(dims, CellAttributes::default());

        if self.reflow_on_resize && dims.cols != old.cols {
            if self.using_alternate {
                // The cursor belongs to the alternate screen; primary
                // reflow must not move it.
                let saved = (self.cursor.row, self.cursor.col);
                self.reflow_primary(dims);
                self.cursor.row = saved.0;
                self.cursor.col = saved.1;
            } else {
                self.reflow_primary(dims);
            }
        } else {
            if dims.rows < old.rows && !self.using_alternate {
                // Keep the bottom of the page: evict from the top.
                let excess = old.rows - dims.rows;
                let keep_blank = old
                    .rows
                    .saturating_sub(self.cursor.row + 1)
                    .min(excess);
                let evict = excess - keep_blank;
                for line in self.primary.evict_top(evict, fill) {
                    if let Some(dropped) = self.scrollback.push(line) {
                        Self::release_line_links(&mut self.hyperlinks, &dropped);
                    }
                }
                self.cursor.row = self.cursor.row.saturating_sub(evict);
            }
            self.primary.resize(dims, fill);
        }

        self.scroll_region = None;
        self.h_margins = None;

        // Tab stops persist; new columns get the default interval.
        let old_cols = self.tab_stops.len();
        self.tab_stops.resize(dims.cols, false);
        for col in old_cols..dims.cols {
            if col % DEFAULT_TAB_INTERVAL == 0 {
                self.tab_stops[col] = true;
            }
        }

        self.cursor.col = self.cursor.col.min(dims.cols - 1);
        self.cursor.row = self.cursor.row.min(dims.rows - 1);
        self.cursor.pending_wrap = false;
        let len = self.scrollback.len();
        self.viewport.clamp(len);
    }

    /// Re-lay wrapped runs into the new width, preserving logical content
    /// and keeping the cursor on its character.
    fn reflow_primary(&mut self, dims: Dimensions) {
        let old_cols = self.primary.cols();
        let history: Vec<Line> = self.scrollback.iter().cloned().collect();
        let history_len = history.len();
        let page = self.primary.take_lines();

        let mut lines = history;
        lines.extend(page);
        let cursor_abs = history_len + self.cursor.row;
        let cursor_col = self.cursor.col;

        let mut out: Vec<Line> = Vec::new();
        let mut cursor_out = (0usize, 0usize);

        let mut i = 0;
        while i < lines.len() {
            let mut j = i;
            while j + 1 < lines.len() && lines[j].wrapped {
                j += 1;
            }
            let reflowable = lines[i..=j].iter().all(|l| l.wrappable);

            if reflowable {
                let mut cells: Vec<Cell> = Vec::new();
                let mut cursor_offset = None;
                for (k, line) in lines[i..=j].iter().enumerate() {
                    if i + k == cursor_abs {
                        cursor_offset = Some(cells.len() + cursor_col.min(old_cols));
                    }
                    cells.extend(line.cells_in(0, old_cols));
                }
                while cells
                    .last()
                    .map_or(false, |c| c.is_blank() && c.hyperlink_id == 0 && c.attrs == CellAttributes::default())
                {
                    cells.pop();
                }

                let mut start = 0;
                loop {
                    let mut end = (start + dims.cols).min(cells.len());
                    if end < cells.len() && cells[end].is_wide_tail() {
                        end -= 1;
                    }
                    let mut chunk = cells[start..end].to_vec();
                    chunk.resize(dims.cols, Cell::new());
                    let mut line = Line::from_cells(chunk);
                    line.wrappable = true;
                    line.wrapped = end < cells.len();
                    out.push(line);

                    if let Some(off) = cursor_offset {
                        if off >= start && (off < end || end == cells.len()) {
                            cursor_out = (out.len() - 1, (off - start).min(dims.cols - 1));
                            cursor_offset = None;
                        }
                    }
                    if end >= cells.len() {
                        break;
                    }
                    start = end;
                }
            } else {
                for (k, line) in lines[i..=j].iter().enumerate() {
                    let mut line = line.clone();
                    line.resize(dims.cols, CellAttributes::default());
                    if i + k == cursor_abs {
                        cursor_out = (out.len(), cursor_col.min(dims.cols - 1));
                    }
                    out.push(line);
                }
            }
            i = j + 1;
        }

        // Surplus blank lines below the cursor stay on the page rather than
        // pushing content into history.
        while out.len() > dims.rows
            && out.len() - 1 > cursor_out.0
            && out.last().map_or(false, |l| l.is_blank() && !l.wrapped)
        {
            out.pop();
        }

        let total = out.len();
        if total >= dims.rows {
            let split = total - dims.rows;
            let history: Vec<Line> = out.drain(..split).collect();
            for line in self.scrollback.replace_all(history) {
                Self::release_line_links(&mut self.hyperlinks, &line);
            }
            self.cursor.row = cursor_out.0.saturating_sub(split).min(dims.rows - 1);
        } else {
            for _ in total..dims.rows {
                let mut blank = Line::new(dims.cols);
                blank.wrappable = true;
                out.push(blank);
            }
            for line in self.scrollback.replace_all(Vec::new()) {
                Self::release_line_links(&mut self.hyperlinks, &line);
            }
            self.cursor.row = cursor_out.0.min(dims.rows - 1);
        }
        self.cursor.col = cursor_out.1.min(dims.cols - 1);
        self.primary.set_lines(out, dims);
    }

    // }}}
    // {{{ selection & text extraction

    fn invalidate_selection_on(&mut self, row: usize) {
        if self.selection.active {
            let id = self.line_id_of_row(row);
            if self.selection.overlaps_line(id) {
                self.selection.clear();
            }
        }
    }

    pub fn start_selection(&mut self, point: GridPoint, mode: SelectionMode) {
        self.selection.start(point, mode);
    }

    pub fn extend_selection(&mut self, point: GridPoint) {
        self.selection.extend(point);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Double-click: expand to the delimiter-bounded word around `point`.
    pub fn select_word_at(&mut self, point: GridPoint, delimiters: &str) {
        let expanded = {
            let Some(line) = self.line_by_id(point.line) else {
                return;
            };
            let cols = line.cols();
            if cols == 0 {
                return;
            }
            let col = point.col.min(cols - 1);
            let is_delim = |col: usize| -> bool {
                let c = line.cluster_at(col).chars().next().unwrap_or(' ');
                c == ' ' || delimiters.contains(c)
            };
            if is_delim(col) {
                (col, col)
            } else {
                let mut start = col;
                while start > 0 && !is_delim(start - 1) {
                    start -= 1;
                }
                let mut end = col;
                while end + 1 < cols && !is_delim(end + 1) {
                    end += 1;
                }
                (start, end)
            }
        };
        self.selection
            .start(GridPoint::new(point.line, expanded.0), SelectionMode::Word);
        self.selection
            .extend(GridPoint::new(point.line, expanded.1));
    }

    /// Extract the selected text; soft-wrapped lines concatenate without a
    /// newline.
    pub fn selection_text(&self) -> String {
        if !self.selection.active {
            return String::new();
        }
        let (start, end) = self.selection.bounds();
        let mut out = String::new();
        for id in start.line..=end.line {
            let Some(line) = self.line_by_id(id) else {
                continue;
            };
            let cols = line.cols();
            let (from, to) = match self.selection.mode {
                SelectionMode::FullLine => (0, cols - 1),
                SelectionMode::Rectangular => {
                    let (lo, hi) = if start.col <= end.col {
                        (start.col, end.col)
                    } else {
                        (end.col, start.col)
                    };
                    (lo.min(cols - 1), hi.min(cols - 1))
                }
                _ => {
                    let from = if id == start.line { start.col } else { 0 };
                    let to = if id == end.line { end.col } else { cols - 1 };
                    (from.min(cols - 1), to.min(cols - 1))
                }
            };
            let mut text = String::new();
            for cell in line.cells_in(from, to + 1) {
                if cell.is_wide_tail() {
                    continue;
                }
                if cell.content().is_empty() {
                    text.push(' ');
                } else {
                    text.push_str(cell.content());
                }
            }
            out.push_str(text.trim_end());
            if id != end.line && (!line.wrapped || self.selection.mode == SelectionMode::Rectangular)
            {
                out.push('\n');
            }
        }
        out
    }

    /// Page contents as trimmed text, trailing blank lines dropped.
    pub fn page_text_trimmed(&self) -> String {
        let mut lines: Vec<String> = self.grid().iter().map(|l| l.text_trimmed()).collect();
        while lines.last().map_or(false, |l| l.is_empty()) {
            lines.pop();
        }
        lines.join("\n")
    }

    // }}}
    // {{{ search

    /// First occurrence at or after `from`, scanning toward the page
    /// bottom. Matches may span soft-wrapped line boundaries.
    pub fn search(&self, pattern: &SearchPattern, from: GridPoint) -> Option<SearchMatch> {
        if pattern.is_empty() {
            return None;
        }
        let mut id = from.line.max(self.first_line_id());
        let last = self.last_line_id();
        let mut from_col = from.col;
        while id <= last {
            let group_start = id;
            let (text, positions) = self.logical_line(group_start);
            let offset = positions
                .iter()
                .position(|&(l, c)| l == from.line.max(group_start) && c >= from_col)
                .unwrap_or(0);
            if let Some(start) = pattern.find_at_or_after(&text, offset) {
                return Some(SearchMatch {
                    line: positions[start].0,
                    start,
                    end: start + pattern.len(),
                });
            }
            id = group_start + self.logical_line_len(group_start);
            from_col = 0;
        }
        None
    }

    /// Last occurrence at or before `from`, scanning toward history.
    pub fn search_reverse(&self, pattern: &SearchPattern, from: GridPoint) -> Option<SearchMatch> {
        if pattern.is_empty() {
            return None;
        }
        let first = self.first_line_id();
        let mut id = from.line.min(self.last_line_id());
        loop {
            let group_start = self.logical_line_start(id);
            let (text, positions) = self.logical_line(group_start);
            let limit = positions
                .iter()
                .rposition(|&(l, c)| l < from.line || (l == from.line && c <= from.col))
                .unwrap_or(0);
            if let Some(start) = pattern.find_at_or_before(&text, limit) {
                return Some(SearchMatch {
                    line: positions[start].0,
                    start,
                    end: start + pattern.len(),
                });
            }
            if group_start <= first {
                return None;
            }
            id = group_start - 1;
        }
    }

    /// Walk back to the first line of the soft-wrapped run containing `id`.
    fn logical_line_start(&self, id: u64) -> u64 {
        let mut id = id;
        let first = self.first_line_id();
        while id > first
            && self
                .line_by_id(id - 1)
                .map_or(false, |l| l.wrapped)
        {
            id -= 1;
        }
        id
    }

    fn logical_line_len(&self, start: u64) -> u64 {
        let mut len = 1;
        let last = self.last_line_id();
        let mut id = start;
        while id < last && self.line_by_id(id).map_or(false, |l| l.wrapped) {
            id += 1;
            len += 1;
        }
        len
    }

    /// Concatenated text of a soft-wrapped run plus a per-character map
    /// back to (line id, column).
    fn logical_line(&self, start: u64) -> (String, Vec<(u64, usize)>) {
        let mut text = String::new();
        let mut positions = Vec::new();
        let len = self.logical_line_len(start);
        for id in start..start + len {
            let Some(line) = self.line_by_id(id) else {
                break;
            };
            for (col, cell) in line.cells_in(0, line.cols()).iter().enumerate() {
                if cell.is_wide_tail() {
                    continue;
                }
                let c = cell.content().chars().next().unwrap_or(' ');
                text.push(c);
                positions.push((id, col));
            }
        }
        (text, positions)
    }

    // }}}
}

fn default_tab_stops(cols: usize) -> Vec<bool> {
    let mut stops = vec![false; cols];
    for col in (0..cols).step_by(DEFAULT_TAB_INTERVAL) {
        stops[col] = true;
    }
    stops
}
