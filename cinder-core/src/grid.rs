//! The page grid
//!
//! The visible page: an ordered sequence of lines. Scrolling, line
//! insertion and deletion operate on a region bounded by the vertical
//! margins and, when DECLRMM is in effect, the horizontal margins; a
//! margin-limited operation moves cell ranges instead of whole lines.

use serde::{Deserialize, Serialize};

use crate::cell::CellAttributes;
use crate::line::Line;
use crate::Dimensions;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    lines: Vec<Line>,
    cols: usize,
    rows: usize,
    /// Lines minted by this grid participate in reflow.
    wrappable: bool,
}

impl Grid {
    pub fn new(dims: Dimensions, wrappable: bool) -> Self {
        let lines = (0..dims.rows)
            .map(|_| Self::mint(dims.cols, CellAttributes::default(), wrappable))
            .collect();
        Self {
            lines,
            cols: dims.cols,
            rows: dims.rows,
            wrappable,
        }
    }

    fn mint(cols: usize, fill: CellAttributes, wrappable: bool) -> Line {
        let mut line = Line::with_fill(cols, fill);
        line.wrappable = wrappable;
        line
    }

    fn blank_line(&self, fill: CellAttributes) -> Line {
        Self::mint(self.cols, fill, self.wrappable)
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            cols: self.cols,
            rows: self.rows,
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn line(&self, row: usize) -> &Line {
        &self.lines[row]
    }

    pub fn line_mut(&mut self, row: usize) -> &mut Line {
        &mut self.lines[row]
    }

    pub fn get_line(&self, row: usize) -> Option<&Line> {
        self.lines.get(row)
    }

    pub fn get_line_mut(&mut self, row: usize) -> Option<&mut Line> {
        self.lines.get_mut(row)
    }

    pub fn clear(&mut self, fill: CellAttributes) {
        for line in &mut self.lines {
            line.clear(fill);
        }
    }

    /// Blank from (row, col) to the end of the page.
    pub fn clear_below(&mut self, row: usize, col: usize, fill: CellAttributes) {
        if row >= self.rows {
            return;
        }
        self.lines[row].clear_from(col, fill);
        for line in self.lines.iter_mut().skip(row + 1) {
            line.clear(fill);
        }
    }

    /// Blank from the top of the page through (row, col).
    pub fn clear_above(&mut self, row: usize, col: usize, fill: CellAttributes) {
        if row >= self.rows {
            return;
        }
        for line in self.lines.iter_mut().take(row) {
            line.clear(fill);
        }
        self.lines[row].clear_to(col, fill);
    }

    /// Scroll the region `[top, bottom] x [left, right]` up by `n`.
    /// Removed full-width lines are returned so the screen can evict them
    /// to scrollback or release their resources.
    pub fn scroll_up(
        &mut self,
        top: usize,
        bottom: usize,
        left: usize,
        right: usize,
        n: usize,
        fill: CellAttributes,
    ) -> Vec<Line> {
        if top > bottom || bottom >= self.rows || right >= self.cols || left > right {
            return Vec::new();
        }
        let n = n.min(bottom - top + 1);
        if n == 0 {
            return Vec::new();
        }

        if left == 0 && right == self.cols - 1 {
            let mut removed = Vec::with_capacity(n);
            for _ in 0..n {
                removed.push(self.lines.remove(top));
                self.lines.insert(bottom, self.blank_line(fill));
            }
            return removed;
        }

        // Margin-limited: shift cell ranges, lines stay put.
        for row in top..=bottom {
            if row + n <= bottom {
                let src = self.lines[row + n].cells_in(left, right + 1);
                self.lines[row].write_cells(left, &src);
            } else {
                self.lines[row].erase_cells(left, right - left + 1, fill);
            }
        }
        Vec::new()
    }

    /// Scroll the region `[top, bottom] x [left, right]` down by `n`.
    pub fn scroll_down(
        &mut self,
        top: usize,
        bottom: usize,
        left: usize,
        right: usize,
        n: usize,
        fill: CellAttributes,
    ) {
        if top > bottom || bottom >= self.rows || right >= self.cols || left > right {
            return;
        }
        let n = n.min(bottom - top + 1);
        if n == 0 {
            return;
        }

        if left == 0 && right == self.cols - 1 {
            for _ in 0..n {
                self.lines.remove(bottom);
                self.lines.insert(top, self.blank_line(fill));
            }
            return;
        }

        for row in (top..=bottom).rev() {
            if row >= top + n {
                let src = self.lines[row - n].cells_in(left, right + 1);
                self.lines[row].write_cells(left, &src);
            } else {
                self.lines[row].erase_cells(left, right - left + 1, fill);
            }
        }
    }

    /// Resize without reflow: pad or truncate every line and the row list.
    pub fn resize(&mut self, dims: Dimensions, fill: CellAttributes) {
        for line in &mut self.lines {
            line.resize(dims.cols, fill);
        }
        if dims.rows > self.rows {
            for _ in self.rows..dims.rows {
                self.lines
                    .push(Self::mint(dims.cols, fill, self.wrappable));
            }
        } else {
            self.lines.truncate(dims.rows);
        }
        self.cols = dims.cols;
        self.rows = dims.rows;
    }

    /// Remove `n` lines from the top, for row-shrink eviction.
    pub fn evict_top(&mut self, n: usize, fill: CellAttributes) -> Vec<Line> {
        let n = n.min(self.rows);
        let evicted: Vec<Line> = self.lines.drain(..n).collect();
        for _ in 0..n {
            self.lines.push(self.blank_line(fill));
        }
        evicted
    }

    /// Take all lines out for reflow; the grid is left empty.
    pub fn take_lines(&mut self) -> Vec<Line> {
        std::mem::take(&mut self.lines)
    }

    /// Install reflowed lines; the caller guarantees `lines.len() == rows`
    /// and per-line width == cols.
    pub fn set_lines(&mut self, lines: Vec<Line>, dims: Dimensions) {
        debug_assert_eq!(lines.len(), dims.rows);
        self.lines = lines;
        self.cols = dims.cols;
        self.rows = dims.rows;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Line> {
        self.lines.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Line> {
        self.lines.iter_mut()
    }
}
