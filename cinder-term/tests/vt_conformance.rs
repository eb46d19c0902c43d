//! End-to-end conformance tests
//!
//! Each test drives a Terminal with raw bytes, exactly as they would arrive
//! from the PTY, and checks the resulting screen state or reply bytes.

use cinder_core::{Color, Dimensions, GridPoint, SelectionMode};
use cinder_term::input::{self, Modifiers, MouseButton, MouseEvent};
use cinder_term::Terminal;

fn term(cols: usize, rows: usize) -> Terminal {
    Terminal::new(Dimensions::new(cols, rows))
}

#[test]
fn plain_write_wraps_and_flags() {
    let mut t = term(5, 3);
    t.process(b"Hello, World");

    let screen = t.screen();
    assert_eq!(screen.line(0).text_trimmed(), "Hello");
    assert_eq!(screen.line(1).text_trimmed(), ", Wor");
    assert_eq!(screen.line(2).text_trimmed(), "ld");
    assert!(screen.line(0).wrapped);
    assert!(screen.line(1).wrapped);
    assert!(!screen.line(2).wrapped);
    assert_eq!((screen.cursor().row, screen.cursor().col), (2, 2));
}

#[test]
fn sgr_subparameter_rgb() {
    let mut t = term(20, 3);
    t.process(b"\x1b[38:2::10:20:30mX");
    let attrs = t.screen().line(0).attrs_at(0);
    assert_eq!(attrs.fg, Color::rgb(10, 20, 30));
    assert_eq!(t.screen().line(0).cluster_at(0), "X");
}

#[test]
fn mouse_sgr_report_bytes() {
    let mut t = term(80, 24);
    t.process(b"\x1b[?1003h\x1b[?1006h");
    let modes = t.screen().modes().clone();

    // Left press at cell col=12, line=4 (1-based wire coordinates).
    let press = input::encode_mouse(
        MouseEvent::Press(MouseButton::Left),
        11,
        3,
        Modifiers::none(),
        &modes,
    );
    assert_eq!(press, b"\x1b[<0;12;4M".to_vec());

    let release = input::encode_mouse(
        MouseEvent::Release(MouseButton::Left),
        11,
        3,
        Modifiers::none(),
        &modes,
    );
    assert_eq!(release, b"\x1b[<0;12;4m".to_vec());
}

#[test]
fn decrqm_reports_a_valid_state() {
    let mut t = term(80, 24);
    t.process(b"\x1b[?2022$p");
    let responses = t.take_pending_responses();
    assert_eq!(responses.len(), 1);
    let reply = String::from_utf8(responses[0].clone()).unwrap();
    assert!(reply.starts_with("\x1b[?2022;"));
    assert!(reply.ends_with("$y"));
    let state: u16 = reply["\x1b[?2022;".len()..reply.len() - 2].parse().unwrap();
    assert!(state <= 4);
}

#[test]
fn alternate_screen_preserves_primary() {
    let mut t = term(80, 24);
    t.process(b"A");
    t.process(b"\x1b[?1049h");
    t.process(b"B");
    assert_eq!(t.screen().line(0).text_trimmed(), "B");
    t.process(b"\x1b[?1049l");

    assert_eq!(t.screen().line(0).text_trimmed(), "A");
    assert_eq!(t.screen().cursor().col, 1);
    assert!(!t.screen().modes().alternate_screen);
}

#[test]
fn reflow_never_leaves_dangling_selection() {
    let mut t = term(5, 4);
    t.process(b"HelloWorld");
    let id = t.screen().line_id_of_row(0);
    t.screen_mut()
        .start_selection(GridPoint::new(id, 0), SelectionMode::Linear);
    t.screen_mut().extend_selection(GridPoint::new(id + 1, 4));
    assert_eq!(t.screen().selection_text(), "HelloWorld");

    t.resize(Dimensions::new(12, 4));
    // The selection either tracks or clears; it must never reference a
    // line that no longer exists.
    let screen = t.screen();
    if screen.selection().active {
        let (start, end) = screen.selection().bounds();
        assert!(screen.line_by_id(start.line).is_some());
        assert!(screen.line_by_id(end.line).is_some());
    }
}

#[test]
fn reflow_roundtrip_preserves_text() {
    let mut t = term(7, 5);
    t.process(b"The quick brown fox");
    let before = t.screen().page_text_trimmed();

    t.resize(Dimensions::new(19, 5));
    assert_eq!(t.screen().line(0).text_trimmed(), "The quick brown fox");
    t.resize(Dimensions::new(11, 5));
    t.resize(Dimensions::new(7, 5));

    assert_eq!(t.screen().page_text_trimmed(), before);
}

#[test]
fn roundtrip_text_readback() {
    let mut t = term(40, 6);
    t.process(b"first\r\nsecond line\r\n\r\nfourth");
    assert_eq!(
        t.screen().page_text_trimmed(),
        "first\nsecond line\n\nfourth"
    );
}

#[test]
fn scrollback_matches_eviction_order() {
    let mut t = term(10, 2);
    for i in 0..6 {
        t.process(format!("line{i}\r\n").as_bytes());
    }
    // The page keeps the last written line; everything above it was
    // evicted in write order.
    let texts: Vec<String> = t
        .screen()
        .scrollback()
        .iter()
        .map(|l| l.text_trimmed())
        .collect();
    assert_eq!(texts, vec!["line0", "line1", "line2", "line3", "line4"]);
    assert_eq!(t.screen().line(0).text_trimmed(), "line5");
    assert!(t.screen().line(1).is_blank());
}

#[test]
fn chunked_input_is_deterministic() {
    let input: &[u8] = b"\x1b[2J\x1b[H\x1b[1;31mred\x1b[0m \xe4\xb8\xad\r\ntail\x1b[?25l";
    let mut reference = term(20, 4);
    reference.process(input);
    let expected = reference.snapshot().to_json().unwrap();

    for chunk_size in [1usize, 2, 3, 5, 7] {
        let mut t = term(20, 4);
        for chunk in input.chunks(chunk_size) {
            t.process(chunk);
        }
        assert_eq!(
            t.snapshot().to_json().unwrap(),
            expected,
            "chunk size {chunk_size}"
        );
    }
}

#[test]
fn wide_cell_pair_is_atomic_under_overwrite() {
    let mut t = term(10, 2);
    t.process("中".as_bytes());
    assert_eq!(t.screen().line(0).width_at(0), 2);
    assert_eq!(t.screen().line(0).width_at(1), 0);

    // Overwrite the left half.
    t.process(b"\x1b[1;1Hx");
    assert_eq!(t.screen().line(0).cluster_at(0), "x");
    assert_eq!(t.screen().line(0).width_at(1), 1);
}

#[test]
fn bracketed_paste_wire_format() {
    let mut t = term(10, 2);
    t.process(b"\x1b[?2004h");
    let bytes = input::encode_paste("data", t.screen().modes());
    assert_eq!(bytes, b"\x1b[200~data\x1b[201~".to_vec());
}

#[test]
fn osc8_hyperlink_open_and_close() {
    let mut t = term(40, 3);
    t.process(b"\x1b]8;id=doc;https://docs.example\x1b\\here\x1b]8;;\x1b\\ rest");
    let id = t.screen().line(0).hyperlink_at(0);
    assert_ne!(id, 0);
    assert_eq!(t.screen().hyperlink_uri(id), Some("https://docs.example"));
    assert_eq!(t.screen().line(0).hyperlink_at(5), 0);
}

#[test]
fn cursor_position_report_roundtrip() {
    let mut t = term(80, 24);
    t.process(b"\x1b[12;34H\x1b[6n");
    assert_eq!(t.take_pending_responses(), vec![b"\x1b[12;34R".to_vec()]);
}

#[test]
fn osc_buffer_overflow_is_survivable() {
    let mut t = term(20, 3);
    let mut blob = b"\x1b]2;".to_vec();
    blob.extend(std::iter::repeat(b't').take(100_000));
    blob.push(0x07);
    t.process(&blob);
    t.process(b"still alive");
    assert_eq!(t.screen().line(0).text_trimmed(), "still alive");
}

#[test]
fn decsc_decrc_roundtrip_with_attributes() {
    let mut t = term(40, 5);
    t.process(b"\x1b[2;3H\x1b[1m\x1b7\x1b[H\x1b[0m\x1b8X");
    let screen = t.screen();
    assert_eq!((screen.cursor().row, screen.cursor().col), (1, 3));
    assert!(screen.line(1).attrs_at(2).bold);
}

#[test]
fn snapshot_reflects_selection_overlay() {
    let mut t = term(10, 2);
    t.process(b"abcdef");
    let id = t.screen().line_id_of_row(0);
    t.screen_mut()
        .start_selection(GridPoint::new(id, 1), SelectionMode::Linear);
    t.screen_mut().extend_selection(GridPoint::new(id, 3));
    let snapshot = t.snapshot();
    assert_eq!(snapshot.lines[0].selection, vec![(1, 3)]);
}
