//! Scrollback history
//!
//! A bounded ring of lines evicted from the top of the page, oldest first.
//! Lines are only ever appended; overflow drops the oldest. Each retained
//! line has a stable absolute id so selections survive grid scrolling; the
//! id of the oldest retained line is `base_id`.

use serde::{Deserialize, Serialize};

use crate::line::Line;

pub const DEFAULT_MAX_LINES: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scrollback {
    lines: Vec<Line>,
    max_lines: usize,
    /// Ring start index.
    start: usize,
    len: usize,
    /// Absolute id of the line at logical index 0.
    base_id: u64,
}

impl Scrollback {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: Vec::new(),
            max_lines,
            start: 0,
            len: 0,
            base_id: 0,
        }
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Absolute id of the oldest retained line.
    pub fn base_id(&self) -> u64 {
        self.base_id
    }

    /// Absolute id one past the newest retained line; the id the next
    /// evicted page line will take.
    pub fn next_id(&self) -> u64 {
        self.base_id + self.len as u64
    }

    /// Append an evicted page line. Returns the line dropped to honor the
    /// cap, if any, so the caller can release its resources.
    pub fn push(&mut self, line: Line) -> Option<Line> {
        if self.max_lines == 0 {
            self.base_id += 1;
            return Some(line);
        }

        if self.lines.len() < self.max_lines {
            self.lines.push(line);
            self.len += 1;
            return None;
        }

        // Ring is at capacity: overwrite the oldest slot.
        let dropped = std::mem::replace(&mut self.lines[self.start], line);
        self.start = (self.start + 1) % self.max_lines;
        self.base_id += 1;
        Some(dropped)
    }

    /// Line at logical index (0 = oldest).
    pub fn get(&self, index: usize) -> Option<&Line> {
        if index >= self.len {
            return None;
        }
        let idx = (self.start + index) % self.lines.len();
        self.lines.get(idx)
    }

    /// Line by absolute id.
    pub fn get_by_id(&self, id: u64) -> Option<&Line> {
        if id < self.base_id {
            return None;
        }
        self.get((id - self.base_id) as usize)
    }

    /// Drop every line; absolute ids stay monotone.
    pub fn clear(&mut self) -> Vec<Line> {
        self.base_id += self.len as u64;
        self.start = 0;
        self.len = 0;
        std::mem::take(&mut self.lines)
    }

    /// Replace the whole history (reflow rebuilds it). Ids restart above the
    /// previous range so stale selections cannot alias new lines. Lines
    /// beyond the cap are returned for resource release.
    pub fn replace_all(&mut self, mut lines: Vec<Line>) -> Vec<Line> {
        let next = self.next_id();
        self.start = 0;
        self.base_id = next;
        let dropped = if lines.len() > self.max_lines {
            let excess = lines.len() - self.max_lines;
            lines.drain(..excess).collect()
        } else {
            Vec::new()
        };
        self.len = lines.len();
        self.lines = lines;
        dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &Line> + '_ {
        (0..self.len).filter_map(move |i| self.get(i))
    }
}

impl Default for Scrollback {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;

    fn make_line(text: &str) -> Line {
        let mut line = Line::new(10);
        for (i, c) in text.chars().enumerate() {
            line.put_cell(i, Cell::with_char(c));
        }
        line
    }

    #[test]
    fn test_push_and_get() {
        let mut sb = Scrollback::new(100);
        assert!(sb.push(make_line("one")).is_none());
        assert!(sb.push(make_line("two")).is_none());
        assert_eq!(sb.len(), 2);
        assert_eq!(sb.get(0).unwrap().text_trimmed(), "one");
        assert_eq!(sb.get(1).unwrap().text_trimmed(), "two");
    }

    #[test]
    fn test_cap_drops_oldest() {
        let mut sb = Scrollback::new(3);
        for text in ["a", "b", "c"] {
            assert!(sb.push(make_line(text)).is_none());
        }
        let dropped = sb.push(make_line("d")).unwrap();
        assert_eq!(dropped.text_trimmed(), "a");
        assert_eq!(sb.len(), 3);
        assert_eq!(sb.get(0).unwrap().text_trimmed(), "b");
        assert_eq!(sb.get(2).unwrap().text_trimmed(), "d");
    }

    #[test]
    fn test_absolute_ids_stable_across_eviction() {
        let mut sb = Scrollback::new(2);
        sb.push(make_line("a"));
        sb.push(make_line("b"));
        assert_eq!(sb.base_id(), 0);
        assert_eq!(sb.get_by_id(1).unwrap().text_trimmed(), "b");

        sb.push(make_line("c"));
        assert_eq!(sb.base_id(), 1);
        assert!(sb.get_by_id(0).is_none());
        assert_eq!(sb.get_by_id(1).unwrap().text_trimmed(), "b");
        assert_eq!(sb.get_by_id(2).unwrap().text_trimmed(), "c");
        assert_eq!(sb.next_id(), 3);
    }

    #[test]
    fn test_zero_capacity() {
        let mut sb = Scrollback::new(0);
        let dropped = sb.push(make_line("x")).unwrap();
        assert_eq!(dropped.text_trimmed(), "x");
        assert!(sb.is_empty());
        assert_eq!(sb.next_id(), 1);
    }

    #[test]
    fn test_clear_keeps_ids_monotone() {
        let mut sb = Scrollback::new(10);
        sb.push(make_line("a"));
        sb.push(make_line("b"));
        sb.clear();
        assert!(sb.is_empty());
        assert_eq!(sb.next_id(), 2);
    }

    #[test]
    fn test_iter_order() {
        let mut sb = Scrollback::new(2);
        sb.push(make_line("a"));
        sb.push(make_line("b"));
        sb.push(make_line("c"));
        let texts: Vec<_> = sb.iter().map(|l| l.text_trimmed()).collect();
        assert_eq!(texts, vec!["b", "c"]);
    }

    #[test]
    fn test_replace_all_truncates_to_cap() {
        let mut sb = Scrollback::new(2);
        sb.replace_all(vec![make_line("a"), make_line("b"), make_line("c")]);
        assert_eq!(sb.len(), 2);
        assert_eq!(sb.get(0).unwrap().text_trimmed(), "b");
    }
}
