//! Viewport scrolling
//!
//! Tracks how far the user has scrolled back into history. Offset 0 means
//! the live page is visible; offset N shows N history lines above the page
//! top. The offset is clamped against the current history length, and new
//! output keeps the view pinned when the user is at the bottom.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    offset: usize,
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// History lines shown above the page top.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_at_bottom(&self) -> bool {
        self.offset == 0
    }

    /// Scroll further into history.
    pub fn scroll_up(&mut self, n: usize, history_len: usize) {
        self.offset = (self.offset + n).min(history_len);
    }

    /// Scroll back toward the live page.
    pub fn scroll_down(&mut self, n: usize) {
        self.offset = self.offset.saturating_sub(n);
    }

    pub fn scroll_to_top(&mut self, history_len: usize) {
        self.offset = history_len;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.offset = 0;
    }

    /// Re-clamp after history shrank (cap eviction, clear, reflow).
    pub fn clamp(&mut self, history_len: usize) {
        self.offset = self.offset.min(history_len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_bottom() {
        let vp = Viewport::new();
        assert!(vp.is_at_bottom());
    }

    #[test]
    fn test_scroll_clamps_to_history() {
        let mut vp = Viewport::new();
        vp.scroll_up(100, 30);
        assert_eq!(vp.offset(), 30);
        vp.scroll_down(10);
        assert_eq!(vp.offset(), 20);
        vp.scroll_to_bottom();
        assert!(vp.is_at_bottom());
    }

    #[test]
    fn test_clamp_after_shrink() {
        let mut vp = Viewport::new();
        vp.scroll_up(50, 50);
        vp.clamp(10);
        assert_eq!(vp.offset(), 10);
    }
}
