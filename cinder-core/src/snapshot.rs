//! Render snapshots
//!
//! An immutable, serializable view of the visible region, produced under
//! the screen lock and consumed by the renderer (or by golden tests as
//! JSON) after the lock is released. The snapshot accounts for the
//! viewport's scrollback offset and carries everything a frame needs:
//! text runs with attributes, cursor, selection overlay and hyperlink uris.

use serde::{Deserialize, Serialize};

use crate::cell::CellAttributes;
use crate::cursor::{CursorDisplay, CursorStyle};
use crate::screen::Screen;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub cols: usize,
    pub rows: usize,
    pub cursor: SnapshotCursor,
    /// Visible lines, top to bottom.
    pub lines: Vec<SnapshotLine>,
    /// History lines above the page top (viewport offset).
    pub scroll_offset: usize,
    pub title: String,
    /// Hyperlink uris referenced by visible cells, keyed by pool id.
    pub hyperlinks: Vec<(u32, String)>,
    /// The whole screen renders inverted (DECSCNM).
    pub reverse_video: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotCursor {
    /// Viewport row; None while scrolled out of view.
    pub row: Option<usize>,
    pub col: usize,
    pub style: CursorStyle,
    pub display: CursorDisplay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotLine {
    pub text: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub wrapped: bool,
    /// Runs of uniformly attributed cells.
    pub runs: Vec<SnapshotRun>,
    /// Selected column ranges, inclusive.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selection: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRun {
    /// First column of the run.
    pub start: usize,
    /// One past the last column.
    pub end: usize,
    pub attrs: CellAttributes,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub hyperlink_id: u32,
}

fn is_zero(id: &u32) -> bool {
    *id == 0
}

impl Snapshot {
    /// Capture the visible region of a screen.
    pub fn capture(screen: &Screen) -> Self {
        let rows = screen.rows();
        let cols = screen.cols();
        let offset = screen.viewport().offset();
        let history_len = screen.scrollback().len();

        let mut lines = Vec::with_capacity(rows);
        let mut hyperlinks: Vec<(u32, String)> = Vec::new();

        for view_row in 0..rows {
            // Viewport row -> history line or page row.
            let (line, line_id) = if view_row < offset {
                let idx = history_len - offset + view_row;
                (
                    screen.scrollback().get(idx),
                    screen.scrollback().base_id() + idx as u64,
                )
            } else {
                let page_row = view_row - offset;
                (
                    Some(screen.line(page_row)),
                    screen.line_id_of_row(page_row),
                )
            };
            let Some(line) = line else {
                continue;
            };

            let mut runs: Vec<SnapshotRun> = Vec::new();
            let mut selection: Vec<(usize, usize)> = Vec::new();
            for col in 0..cols {
                let attrs = line.attrs_at(col);
                let link = line.hyperlink_at(col);
                match runs.last_mut() {
                    Some(run) if run.attrs == attrs && run.hyperlink_id == link => {
                        run.end = col + 1;
                    }
                    _ => runs.push(SnapshotRun {
                        start: col,
                        end: col + 1,
                        attrs,
                        hyperlink_id: link,
                    }),
                }
                if link != 0 && !hyperlinks.iter().any(|(id, _)| *id == link) {
                    if let Some(uri) = screen.hyperlink_uri(link) {
                        hyperlinks.push((link, uri.to_string()));
                    }
                }
                if screen.selection().contains(line_id, col) {
                    match selection.last_mut() {
                        Some(range) if range.1 + 1 == col => range.1 = col,
                        _ => selection.push((col, col)),
                    }
                }
            }

            lines.push(SnapshotLine {
                text: line.text(),
                wrapped: line.wrapped,
                runs,
                selection,
            });
        }

        let cursor = screen.cursor();
        let cursor_row = cursor.row.checked_add(offset).filter(|&r| r < rows);

        Self {
            cols,
            rows,
            cursor: SnapshotCursor {
                row: cursor_row,
                col: cursor.col,
                style: cursor.style,
                display: cursor.display(),
            },
            lines,
            scroll_offset: offset,
            title: screen.title().to_string(),
            hyperlinks,
            reverse_video: screen.modes().reverse_video,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Plain text of the visible region, one line per row.
    pub fn screen_text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.trim_end())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::Dimensions;

    fn screen_with(text: &str) -> Screen {
        let mut screen = Screen::new(Dimensions::new(20, 5));
        for c in text.chars() {
            screen.print(c);
        }
        screen
    }

    #[test]
    fn test_capture_text() {
        let screen = screen_with("hello");
        let snap = Snapshot::capture(&screen);
        assert_eq!(snap.cols, 20);
        assert_eq!(snap.rows, 5);
        assert!(snap.screen_text().starts_with("hello"));
        assert_eq!(snap.cursor.row, Some(0));
        assert_eq!(snap.cursor.col, 5);
    }

    #[test]
    fn test_runs_split_on_attrs() {
        let mut screen = Screen::new(Dimensions::new(10, 2));
        screen.print('a');
        screen.cursor_mut().attrs.fg = Color::Indexed(1);
        screen.print('b');
        let snap = Snapshot::capture(&screen);
        let runs = &snap.lines[0].runs;
        assert!(runs.len() >= 2);
        assert_eq!(runs[0].end, 1);
        assert_eq!(runs[1].attrs.fg, Color::Indexed(1));
    }

    #[test]
    fn test_scrolled_viewport_shows_history() {
        let mut screen = Screen::new(Dimensions::new(10, 2));
        for i in 0..5 {
            for c in format!("line{i}").chars() {
                screen.print(c);
            }
            screen.carriage_return();
            screen.linefeed();
        }
        let history_len = screen.scrollback().len();
        screen.viewport_mut().scroll_up(2, history_len);
        let snap = Snapshot::capture(&screen);
        assert_eq!(snap.scroll_offset, 2);
        assert!(snap.lines[0].text.starts_with("line2"));
        // Cursor sits below the visible region while scrolled back.
        assert_eq!(snap.cursor.row, None);
    }

    #[test]
    fn test_json_roundtrip() {
        let screen = screen_with("json");
        let snap = Snapshot::capture(&screen);
        let json = snap.to_json().unwrap();
        let parsed = Snapshot::from_json(&json).unwrap();
        assert_eq!(parsed.screen_text(), snap.screen_text());
        assert_eq!(parsed.cols, snap.cols);
    }

    #[test]
    fn test_hyperlinks_listed() {
        let mut screen = Screen::new(Dimensions::new(10, 2));
        screen.open_hyperlink("", "https://example.com");
        screen.print('x');
        screen.close_hyperlink();
        let snap = Snapshot::capture(&screen);
        assert_eq!(snap.hyperlinks.len(), 1);
        assert_eq!(snap.hyperlinks[0].1, "https://example.com");
    }
}
