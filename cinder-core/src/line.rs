//! Grid lines
//!
//! A line is stored in one of two representations. A *trivial* line is a run
//! of narrow, uniformly-attributed text starting at column zero, plus fill
//! attributes for the remainder; it is the cheap case covering untouched and
//! bulk-written lines. The first non-uniform write promotes the line to an
//! *inflated* vector of cells. The displayed width of a line always equals
//! the configured column count.

use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellAttributes};

/// Compact representation: uniform text plus fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct TrivialLine {
    cols: usize,
    /// Narrow characters only, starting at column 0.
    text: String,
    /// Attributes of every character in `text`.
    attrs: CellAttributes,
    /// Attributes of the blank remainder.
    fill: CellAttributes,
}

impl TrivialLine {
    fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    fn inflate(&self) -> Vec<Cell> {
        let mut cells = Vec::with_capacity(self.cols);
        for c in self.text.chars() {
            let mut cell = Cell::with_char(c);
            cell.attrs = self.attrs;
            cells.push(cell);
        }
        while cells.len() < self.cols {
            cells.push(Cell::blank(self.fill));
        }
        cells.truncate(self.cols);
        cells
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum Storage {
    Trivial(TrivialLine),
    Inflated(Vec<Cell>),
}

/// A single line of the grid or scrollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    storage: Storage,
    /// This line soft-wraps onto the next one.
    pub wrapped: bool,
    /// This line participates in reflow on resize.
    pub wrappable: bool,
    /// User mark (vi-style navigation anchors).
    pub marked: bool,
}

impl Line {
    pub fn new(cols: usize) -> Self {
        Self::with_fill(cols, CellAttributes::default())
    }

    /// A blank line whose cells carry the given fill attributes.
    pub fn with_fill(cols: usize, fill: CellAttributes) -> Self {
        Self {
            storage: Storage::Trivial(TrivialLine {
                cols,
                text: String::new(),
                attrs: fill,
                fill,
            }),
            wrapped: false,
            wrappable: false,
            marked: false,
        }
    }

    pub fn from_cells(cells: Vec<Cell>) -> Self {
        Self {
            storage: Storage::Inflated(cells),
            wrapped: false,
            wrappable: false,
            marked: false,
        }
    }

    pub fn cols(&self) -> usize {
        match &self.storage {
            Storage::Trivial(t) => t.cols,
            Storage::Inflated(cells) => cells.len(),
        }
    }

    pub fn is_trivial(&self) -> bool {
        matches!(self.storage, Storage::Trivial(_))
    }

    /// Number of characters stored in the trivial run, if trivial.
    pub fn trivial_len(&self) -> Option<usize> {
        match &self.storage {
            Storage::Trivial(t) => Some(t.char_count()),
            Storage::Inflated(_) => None,
        }
    }

    /// Append one narrow character to a trivial line. Returns false (and
    /// leaves the line untouched) when the write is not uniform; the caller
    /// falls back to the cell path.
    pub fn try_append_trivial(&mut self, c: char, attrs: CellAttributes) -> bool {
        let Storage::Trivial(t) = &mut self.storage else {
            return false;
        };
        if t.char_count() >= t.cols {
            return false;
        }
        if !t.text.is_empty() && t.attrs != attrs {
            return false;
        }
        if t.text.is_empty() {
            t.attrs = attrs;
        }
        t.text.push(c);
        true
    }

    /// Cell access, promoting to the inflated representation.
    pub fn cells_mut(&mut self) -> &mut Vec<Cell> {
        if let Storage::Trivial(t) = &self.storage {
            let cells = t.inflate();
            self.storage = Storage::Inflated(cells);
        }
        match &mut self.storage {
            Storage::Inflated(cells) => cells,
            Storage::Trivial(_) => unreachable!(),
        }
    }

    /// Cells of an inflated line; None while trivial.
    pub fn cells(&self) -> Option<&[Cell]> {
        match &self.storage {
            Storage::Trivial(_) => None,
            Storage::Inflated(cells) => Some(cells.as_slice()),
        }
    }

    /// Materialize the cells of a column range regardless of representation.
    pub fn cells_in(&self, start: usize, end: usize) -> Vec<Cell> {
        match &self.storage {
            Storage::Trivial(t) => {
                let all = t.inflate();
                all[start.min(all.len())..end.min(all.len())].to_vec()
            }
            Storage::Inflated(cells) => {
                cells[start.min(cells.len())..end.min(cells.len())].to_vec()
            }
        }
    }

    /// Overwrite a run of cells starting at `col`.
    pub fn write_cells(&mut self, col: usize, source: &[Cell]) {
        let cells = self.cells_mut();
        for (i, cell) in source.iter().enumerate() {
            if let Some(slot) = cells.get_mut(col + i) {
                *slot = cell.clone();
            }
        }
    }

    /// Place a cell, keeping wide pairs atomic: overwriting either half of
    /// an existing pair blanks the other half.
    pub fn put_cell(&mut self, col: usize, cell: Cell) {
        let cols = self.cols();
        if col >= cols {
            return;
        }
        let wide = cell.is_wide();
        let cells = self.cells_mut();
        Self::damage_pair(cells, col);
        if wide && col + 1 < cols {
            Self::damage_pair(cells, col + 1);
            let fill = cell.attrs.fill();
            cells[col + 1].set_wide_tail(fill);
        }
        cells[col] = cell;
    }

    fn damage_pair(cells: &mut [Cell], col: usize) {
        if cells[col].is_wide() {
            if let Some(tail) = cells.get_mut(col + 1) {
                let fill = tail.attrs.fill();
                tail.clear(fill);
            }
        } else if cells[col].is_wide_tail() && col > 0 && cells[col - 1].is_wide() {
            let fill = cells[col - 1].attrs.fill();
            cells[col - 1].clear(fill);
        }
    }

    /// Append a combining mark to the cluster ending before `col`.
    pub fn combine_at(&mut self, col: usize, c: char) {
        if col == 0 {
            return;
        }
        let cells = self.cells_mut();
        let base = if cells[col - 1].is_wide_tail() && col >= 2 {
            col - 2
        } else {
            col - 1
        };
        cells[base].push_combining(c);
    }

    pub fn cluster_at(&self, col: usize) -> &str {
        match &self.storage {
            Storage::Trivial(t) => {
                let mut chars = t.text.char_indices();
                match chars.nth(col) {
                    Some((start, c)) => &t.text[start..start + c.len_utf8()],
                    None => "",
                }
            }
            Storage::Inflated(cells) => cells.get(col).map(|c| c.content()).unwrap_or(""),
        }
    }

    pub fn attrs_at(&self, col: usize) -> CellAttributes {
        match &self.storage {
            Storage::Trivial(t) => {
                if col < t.char_count() {
                    t.attrs
                } else {
                    t.fill
                }
            }
            Storage::Inflated(cells) => cells.get(col).map(|c| c.attrs).unwrap_or_default(),
        }
    }

    pub fn width_at(&self, col: usize) -> u8 {
        match &self.storage {
            Storage::Trivial(_) => 1,
            Storage::Inflated(cells) => cells.get(col).map(|c| c.width()).unwrap_or(1),
        }
    }

    pub fn hyperlink_at(&self, col: usize) -> u32 {
        match &self.storage {
            Storage::Trivial(_) => 0,
            Storage::Inflated(cells) => cells.get(col).map(|c| c.hyperlink_id).unwrap_or(0),
        }
    }

    /// Blank the whole line; it becomes trivial again.
    pub fn clear(&mut self, fill: CellAttributes) {
        let cols = self.cols();
        self.storage = Storage::Trivial(TrivialLine {
            cols,
            text: String::new(),
            attrs: fill,
            fill,
        });
        self.wrapped = false;
    }

    /// Blank from `col` to the end of the line.
    pub fn clear_from(&mut self, col: usize, fill: CellAttributes) {
        if col == 0 {
            self.clear(fill);
            return;
        }
        let mut mixed_fill = false;
        match &mut self.storage {
            Storage::Trivial(t) => {
                if let Some((idx, _)) = t.text.char_indices().nth(col) {
                    t.text.truncate(idx);
                    t.fill = fill;
                } else if t.fill != fill {
                    // Two distinct fill regions; give up on the compact form.
                    mixed_fill = true;
                }
            }
            Storage::Inflated(cells) => {
                if col < cells.len() && cells[col].is_wide_tail() {
                    let pre = cells[col - 1].attrs.fill();
                    cells[col - 1].clear(pre);
                }
                for cell in cells.iter_mut().skip(col) {
                    cell.clear(fill);
                }
            }
        }
        if mixed_fill {
            for cell in self.cells_mut().iter_mut().skip(col) {
                cell.clear(fill);
            }
        }
    }

    /// Blank from the start of the line through `col` inclusive.
    pub fn clear_to(&mut self, col: usize, fill: CellAttributes) {
        if col + 1 >= self.cols() {
            self.clear(fill);
            return;
        }
        let cells = self.cells_mut();
        if cells[col].is_wide() {
            let post = cells[col + 1].attrs.fill();
            cells[col + 1].clear(post);
        }
        for cell in cells.iter_mut().take(col + 1) {
            cell.clear(fill);
        }
    }

    /// Blank `n` cells starting at `col`, without shifting.
    pub fn erase_cells(&mut self, col: usize, n: usize, fill: CellAttributes) {
        let cols = self.cols();
        if col >= cols || n == 0 {
            return;
        }
        let end = col.saturating_add(n).min(cols);
        if end == cols {
            self.clear_from(col, fill);
            return;
        }
        let cells = self.cells_mut();
        Self::damage_pair(cells, col);
        Self::damage_pair(cells, end - 1);
        for cell in &mut cells[col..end] {
            cell.clear(fill);
        }
    }

    /// Insert `n` blanks at `col`, shifting cells right within `[col, end)`.
    pub fn insert_cells(&mut self, col: usize, n: usize, end: usize, fill: CellAttributes) {
        let cols = self.cols();
        let end = end.min(cols);
        if col >= end || n == 0 {
            return;
        }
        let n = n.min(end - col);
        let cells = self.cells_mut();
        Self::damage_pair(cells, col);
        cells[col..end].rotate_right(n);
        for cell in &mut cells[col..col + n] {
            cell.clear(fill);
        }
        // A wide base shifted against the region edge loses its tail.
        if cells[end - 1].is_wide() {
            let f = cells[end - 1].attrs.fill();
            cells[end - 1].clear(f);
        }
    }

    /// Delete `n` cells at `col`, shifting cells left within `[col, end)`;
    /// vacated cells take the fill attributes.
    pub fn delete_cells(&mut self, col: usize, n: usize, end: usize, fill: CellAttributes) {
        let cols = self.cols();
        let end = end.min(cols);
        if col >= end || n == 0 {
            return;
        }
        let n = n.min(end - col);
        let cells = self.cells_mut();
        Self::damage_pair(cells, col);
        if n < end - col {
            Self::damage_pair(cells, col + n);
        }
        cells[col..end].rotate_left(n);
        for cell in &mut cells[end - n..end] {
            cell.clear(fill);
        }
    }

    /// Change the column count, truncating or padding with fill.
    pub fn resize(&mut self, cols: usize, fill: CellAttributes) {
        match &mut self.storage {
            Storage::Trivial(t) => {
                t.cols = cols;
                if t.char_count() > cols {
                    if let Some((idx, _)) = t.text.char_indices().nth(cols) {
                        t.text.truncate(idx);
                    }
                }
            }
            Storage::Inflated(cells) => {
                if cols > cells.len() {
                    cells.resize_with(cols, || Cell::blank(fill));
                } else {
                    cells.truncate(cols);
                    if let Some(last) = cells.last_mut() {
                        if last.is_wide() {
                            let f = last.attrs.fill();
                            last.clear(f);
                        }
                    }
                }
            }
        }
    }

    /// Visible text of the line, wide tails skipped, blanks as spaces.
    pub fn text(&self) -> String {
        match &self.storage {
            Storage::Trivial(t) => {
                let mut out = t.text.clone();
                out.extend(std::iter::repeat(' ').take(t.cols.saturating_sub(t.char_count())));
                out
            }
            Storage::Inflated(cells) => {
                let mut out = String::with_capacity(cells.len());
                for cell in cells {
                    if cell.is_wide_tail() {
                        continue;
                    }
                    if cell.content().is_empty() {
                        out.push(' ');
                    } else {
                        out.push_str(cell.content());
                    }
                }
                out
            }
        }
    }

    /// Visible text with trailing blanks removed.
    pub fn text_trimmed(&self) -> String {
        let mut text = self.text();
        text.truncate(text.trim_end().len());
        text
    }

    pub fn is_blank(&self) -> bool {
        match &self.storage {
            Storage::Trivial(t) => t.text.trim().is_empty(),
            Storage::Inflated(cells) => cells.iter().all(|c| c.is_blank()),
        }
    }

    /// Hyperlink ids referenced by this line, for pool maintenance.
    pub fn hyperlink_ids(&self) -> Vec<u32> {
        match &self.storage {
            Storage::Trivial(_) => Vec::new(),
            Storage::Inflated(cells) => cells
                .iter()
                .map(|c| c.hyperlink_id)
                .filter(|&id| id != 0)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;

    fn styled(bg: u8) -> CellAttributes {
        CellAttributes {
            bg: Color::Indexed(bg),
            ..CellAttributes::default()
        }
    }

    #[test]
    fn test_new_line_is_trivial() {
        let line = Line::new(80);
        assert!(line.is_trivial());
        assert_eq!(line.cols(), 80);
        assert_eq!(line.text_trimmed(), "");
    }

    #[test]
    fn test_trivial_append() {
        let mut line = Line::new(10);
        assert!(line.try_append_trivial('H', CellAttributes::default()));
        assert!(line.try_append_trivial('i', CellAttributes::default()));
        assert!(line.is_trivial());
        assert_eq!(line.text_trimmed(), "Hi");
        assert_eq!(line.cluster_at(0), "H");
        assert_eq!(line.cluster_at(1), "i");
        assert_eq!(line.cluster_at(2), "");
    }

    #[test]
    fn test_trivial_append_rejects_nonuniform() {
        let mut line = Line::new(10);
        assert!(line.try_append_trivial('a', CellAttributes::default()));
        assert!(!line.try_append_trivial('b', styled(3)));
        assert!(line.is_trivial());
    }

    #[test]
    fn test_inflate_preserves_content() {
        let mut line = Line::new(5);
        line.try_append_trivial('a', styled(1));
        line.try_append_trivial('b', styled(1));
        let cells = line.cells_mut();
        assert_eq!(cells.len(), 5);
        assert_eq!(cells[0].display_char(), 'a');
        assert_eq!(cells[1].attrs, styled(1));
        assert!(cells[4].is_blank());
        assert!(!line.is_trivial());
    }

    #[test]
    fn test_put_cell_promotes() {
        let mut line = Line::new(5);
        line.put_cell(2, Cell::with_char('X'));
        assert!(!line.is_trivial());
        assert_eq!(line.cluster_at(2), "X");
    }

    #[test]
    fn test_wide_pair_placement() {
        let mut line = Line::new(5);
        line.put_cell(1, Cell::with_char('中'));
        assert_eq!(line.width_at(1), 2);
        assert_eq!(line.width_at(2), 0);
    }

    #[test]
    fn test_overwrite_wide_base_clears_tail() {
        let mut line = Line::new(5);
        line.put_cell(1, Cell::with_char('中'));
        line.put_cell(1, Cell::with_char('x'));
        assert_eq!(line.cluster_at(1), "x");
        assert_eq!(line.width_at(2), 1);
        assert_eq!(line.cluster_at(2), "");
    }

    #[test]
    fn test_overwrite_wide_tail_clears_base() {
        let mut line = Line::new(5);
        line.put_cell(1, Cell::with_char('中'));
        line.put_cell(2, Cell::with_char('x'));
        assert_eq!(line.cluster_at(1), "");
        assert_eq!(line.width_at(1), 1);
        assert_eq!(line.cluster_at(2), "x");
    }

    #[test]
    fn test_clear_returns_to_trivial() {
        let mut line = Line::new(5);
        line.put_cell(0, Cell::with_char('X'));
        line.clear(styled(2));
        assert!(line.is_trivial());
        assert_eq!(line.attrs_at(3), styled(2));
    }

    #[test]
    fn test_clear_from_trivial_stays_trivial() {
        let mut line = Line::new(10);
        for c in "hello".chars() {
            line.try_append_trivial(c, CellAttributes::default());
        }
        line.clear_from(3, CellAttributes::default());
        assert!(line.is_trivial());
        assert_eq!(line.text_trimmed(), "hel");
    }

    #[test]
    fn test_clear_to() {
        let mut line = Line::new(10);
        for (i, c) in "ABCDEFGHIJ".chars().enumerate() {
            line.put_cell(i, Cell::with_char(c));
        }
        line.clear_to(4, CellAttributes::default());
        assert_eq!(line.cluster_at(4), "");
        assert_eq!(line.cluster_at(5), "F");
    }

    #[test]
    fn test_insert_cells() {
        let mut line = Line::new(5);
        for (i, c) in "ABCDE".chars().enumerate() {
            line.put_cell(i, Cell::with_char(c));
        }
        line.insert_cells(2, 2, 5, CellAttributes::default());
        assert_eq!(line.text_trimmed(), "AB  C");
    }

    #[test]
    fn test_delete_cells() {
        let mut line = Line::new(5);
        for (i, c) in "ABCDE".chars().enumerate() {
            line.put_cell(i, Cell::with_char(c));
        }
        line.delete_cells(1, 2, 5, CellAttributes::default());
        assert_eq!(line.text_trimmed(), "ADE");
    }

    #[test]
    fn test_insert_respects_region_end() {
        let mut line = Line::new(6);
        for (i, c) in "ABCDEF".chars().enumerate() {
            line.put_cell(i, Cell::with_char(c));
        }
        // Inserting inside [1, 4) must not disturb columns 4..6.
        line.insert_cells(1, 1, 4, CellAttributes::default());
        assert_eq!(line.text_trimmed(), "A BCEF");
    }

    #[test]
    fn test_erase_cells() {
        let mut line = Line::new(6);
        for (i, c) in "ABCDEF".chars().enumerate() {
            line.put_cell(i, Cell::with_char(c));
        }
        line.erase_cells(2, 2, CellAttributes::default());
        assert_eq!(line.text_trimmed(), "AB  EF");
    }

    #[test]
    fn test_combine_at() {
        let mut line = Line::new(5);
        line.put_cell(0, Cell::with_char('e'));
        line.combine_at(1, '\u{0301}');
        assert_eq!(line.cluster_at(0), "e\u{0301}");
    }

    #[test]
    fn test_resize() {
        let mut line = Line::new(5);
        line.put_cell(0, Cell::with_char('A'));
        line.resize(10, CellAttributes::default());
        assert_eq!(line.cols(), 10);
        line.resize(3, CellAttributes::default());
        assert_eq!(line.cols(), 3);
        assert_eq!(line.cluster_at(0), "A");
    }

    #[test]
    fn test_text_roundtrip() {
        let mut line = Line::new(10);
        for (i, c) in "Hi".chars().enumerate() {
            line.put_cell(i, Cell::with_char(c));
        }
        assert_eq!(line.text(), "Hi        ");
        assert_eq!(line.text_trimmed(), "Hi");
    }

    #[test]
    fn test_wide_text_skips_tail() {
        let mut line = Line::new(5);
        line.put_cell(0, Cell::with_char('中'));
        line.put_cell(2, Cell::with_char('x'));
        assert_eq!(line.text_trimmed(), "中x");
    }
}
