//! Scrollback search
//!
//! A compiled UTF-32 pattern plus direction and the current match position.
//! Matching is per logical line: consecutive soft-wrapped lines are
//! concatenated before matching, so a hit may span a wrap boundary. The
//! screen drives the line iteration and calls into the primitives here.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchDirection {
    Forward,
    Backward,
}

/// A compiled search pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPattern {
    needle: Vec<char>,
    case_sensitive: bool,
}

impl SearchPattern {
    pub fn new(pattern: &str, case_sensitive: bool) -> Self {
        // One-to-one fold so character offsets stay aligned with the
        // haystack; multi-char expansions (ß) are not worth breaking that.
        let needle = if case_sensitive {
            pattern.chars().collect()
        } else {
            pattern.chars().map(fold_char).collect()
        };
        Self {
            needle,
            case_sensitive,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    pub fn len(&self) -> usize {
        self.needle.len()
    }

    fn compile(&self, haystack: &str) -> Vec<char> {
        if self.case_sensitive {
            haystack.chars().collect()
        } else {
            haystack.chars().map(fold_char).collect()
        }
    }

    /// First occurrence at or after `from` (character offset).
    pub fn find_at_or_after(&self, haystack: &str, from: usize) -> Option<usize> {
        if self.needle.is_empty() {
            return None;
        }
        let chars = self.compile(haystack);
        if chars.len() < self.needle.len() {
            return None;
        }
        (from..=chars.len() - self.needle.len())
            .find(|&start| chars[start..start + self.needle.len()] == self.needle[..])
    }

    /// Last occurrence starting at or before `from` (character offset).
    pub fn find_at_or_before(&self, haystack: &str, from: usize) -> Option<usize> {
        if self.needle.is_empty() {
            return None;
        }
        let chars = self.compile(haystack);
        if chars.len() < self.needle.len() {
            return None;
        }
        let upper = from.min(chars.len() - self.needle.len());
        (0..=upper)
            .rev()
            .find(|&start| chars[start..start + self.needle.len()] == self.needle[..])
    }
}

fn fold_char(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// A located occurrence in the unified line space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMatch {
    /// Absolute id of the logical line the match starts in.
    pub line: u64,
    /// Character offset within the concatenated logical line.
    pub start: usize,
    pub end: usize,
}

/// Live search state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchState {
    pub pattern: SearchPattern,
    pub direction: SearchDirection,
    pub current: Option<SearchMatch>,
}

impl SearchState {
    pub fn new(pattern: SearchPattern, direction: SearchDirection) -> Self {
        Self {
            pattern,
            direction,
            current: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_find() {
        let pat = SearchPattern::new("lo", true);
        assert_eq!(pat.find_at_or_after("hello world", 0), Some(3));
        assert_eq!(pat.find_at_or_after("hello world", 4), None);
    }

    #[test]
    fn test_backward_find() {
        let pat = SearchPattern::new("o", true);
        assert_eq!(pat.find_at_or_before("hello world", 10), Some(7));
        assert_eq!(pat.find_at_or_before("hello world", 6), Some(4));
        assert_eq!(pat.find_at_or_before("hello world", 3), None);
    }

    #[test]
    fn test_case_insensitive() {
        let pat = SearchPattern::new("WoRlD", false);
        assert_eq!(pat.find_at_or_after("hello World", 0), Some(6));
    }

    #[test]
    fn test_unicode_offsets_are_characters() {
        let pat = SearchPattern::new("界", true);
        assert_eq!(pat.find_at_or_after("世界", 0), Some(1));
    }

    #[test]
    fn test_empty_pattern_never_matches() {
        let pat = SearchPattern::new("", true);
        assert!(pat.is_empty());
        assert_eq!(pat.find_at_or_after("abc", 0), None);
    }
}
