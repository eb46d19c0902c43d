//! Sequence interpreter
//!
//! Feeds PTY bytes through the parser and executes the resulting actions
//! against the screen. Also owns the reply queue (DSR, DA, DECRQM, DECRQSS,
//! OSC color queries) drained by the session loop, and the host-visible
//! event flags (bell, title, notifications, clipboard writes).
//!
//! Unknown sequences are harmless: each distinct shape is logged at warn
//! once, then at debug, and otherwise ignored.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use cinder_core::{
    Blink, CellAttributes, Color, CursorStyle, Dimensions, GridPoint, Screen, SearchMatch,
    SearchPattern, Snapshot, UnderlineStyle,
};
use cinder_parser::{c0, Action, CsiAction, DcsAction, EscAction, Parser};

/// A desktop notification requested by the guest (OSC 9 / OSC 777).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

/// An OSC 52 clipboard write; the payload is still base64 as sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardWrite {
    pub selection: String,
    pub payload: String,
}

pub struct Terminal {
    screen: Screen,
    parser: Parser,
    bell: bool,
    title_changed: bool,
    notifications: Vec<Notification>,
    clipboard_writes: Vec<ClipboardWrite>,
    pending_responses: Vec<Vec<u8>>,
    /// Last printed character, for REP.
    last_printed: Option<char>,
    /// Text-area pixel size for CSI 14 t.
    window_pixel_size: (u32, u32),
    /// Cell pixel size for CSI 16 t.
    cell_pixel_size: (u32, u32),
    fg_color: (u8, u8, u8),
    bg_color: (u8, u8, u8),
    cursor_color: (u8, u8, u8),
    palette_overrides: HashMap<u8, (u8, u8, u8)>,
    working_directory: Option<String>,
    /// Sequence shapes already logged at warn.
    reported_unknown: HashSet<(u8, u8, u8)>,
}

impl Terminal {
    pub fn new(dims: Dimensions) -> Self {
        Self {
            screen: Screen::new(dims),
            parser: Parser::new(),
            bell: false,
            title_changed: false,
            notifications: Vec::new(),
            clipboard_writes: Vec::new(),
            pending_responses: Vec::new(),
            last_printed: None,
            window_pixel_size: (0, 0),
            cell_pixel_size: (0, 0),
            fg_color: (212, 212, 212),
            bg_color: (30, 30, 30),
            cursor_color: (255, 255, 255),
            palette_overrides: HashMap::new(),
            working_directory: None,
            reported_unknown: HashSet::new(),
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut Screen {
        &mut self.screen
    }

    pub fn title(&self) -> &str {
        self.screen.title()
    }

    pub fn working_directory(&self) -> Option<&str> {
        self.working_directory.as_deref()
    }

    pub fn take_bell(&mut self) -> bool {
        std::mem::take(&mut self.bell)
    }

    pub fn take_title_changed(&mut self) -> bool {
        std::mem::take(&mut self.title_changed)
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn take_clipboard_writes(&mut self) -> Vec<ClipboardWrite> {
        std::mem::take(&mut self.clipboard_writes)
    }

    /// Replies queued for the PTY, in order.
    pub fn take_pending_responses(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.pending_responses)
    }

    pub fn resize(&mut self, dims: Dimensions) {
        self.screen.resize(dims);
    }

    pub fn set_window_pixel_size(&mut self, width: u32, height: u32) {
        self.window_pixel_size = (width, height);
    }

    pub fn set_cell_pixel_size(&mut self, width: u32, height: u32) {
        self.cell_pixel_size = (width, height);
    }

    pub fn set_default_colors(&mut self, fg: (u8, u8, u8), bg: (u8, u8, u8), cursor: (u8, u8, u8)) {
        self.fg_color = fg;
        self.bg_color = bg;
        self.cursor_color = cursor;
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.screen)
    }

    pub fn search(&self, pattern: &SearchPattern, from: GridPoint) -> Option<SearchMatch> {
        self.screen.search(pattern, from)
    }

    pub fn search_reverse(&self, pattern: &SearchPattern, from: GridPoint) -> Option<SearchMatch> {
        self.screen.search_reverse(pattern, from)
    }

    /// Feed PTY output through the parser.
    pub fn process(&mut self, data: &[u8]) {
        let mut parser = std::mem::take(&mut self.parser);
        parser.parse(data, |action| self.apply(action));
        self.parser = parser;
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::Print(c) => {
                self.last_printed = Some(c);
                self.screen.print(c);
            }
            Action::Control(byte) => self.control(byte),
            Action::Esc(esc) => self.esc_dispatch(esc),
            Action::Csi(csi) => self.csi_dispatch(csi),
            Action::Osc(data) => self.osc_dispatch(&data),
            Action::Dcs(dcs) => self.dcs_dispatch(dcs),
            Action::Apc(_) | Action::Pm(_) | Action::Sos(_) => {}
        }
    }

    fn control(&mut self, byte: u8) {
        match byte {
            c0::BEL => self.bell = true,
            c0::BS => self.screen.backspace(),
            c0::HT => self.screen.tab(),
            c0::LF | c0::VT | c0::FF => {
                self.screen.linefeed();
                if self.screen.modes().linefeed_mode {
                    self.screen.carriage_return();
                }
            }
            c0::CR => self.screen.carriage_return(),
            c0::SO => self.screen.shift_out(),
            c0::SI => self.screen.shift_in(),
            _ => {}
        }
    }

    // {{{ ESC

    fn esc_dispatch(&mut self, esc: EscAction) {
        match (esc.intermediates.as_slice(), esc.final_byte) {
            ([], b'7') => self.screen.save_cursor(),
            ([], b'8') => self.screen.restore_cursor(),
            ([], b'D') => self.screen.index(),
            ([], b'E') => self.screen.next_line(),
            ([], b'H') => self.screen.set_tab_stop(),
            ([], b'M') => self.screen.reverse_index(),
            ([], b'N') => self.screen.single_shift(2),
            ([], b'O') => self.screen.single_shift(3),
            ([], b'c') => self.hard_reset(),
            ([], b'=') => self.screen.modes_mut().keypad_application = true,
            ([], b'>') => self.screen.modes_mut().keypad_application = false,
            ([b'('], d) => self.screen.designate_charset(0, d as char),
            ([b')'], d) => self.screen.designate_charset(1, d as char),
            ([b'*'], d) => self.screen.designate_charset(2, d as char),
            ([b'+'], d) => self.screen.designate_charset(3, d as char),
            ([b'#'], b'8') => self.screen.alignment_test(),
            _ => self.log_unknown(0, esc.intermediates.first().copied().unwrap_or(0), esc.final_byte),
        }
    }

    fn hard_reset(&mut self) {
        self.screen.reset();
        self.parser.reset();
        self.last_printed = None;
        self.title_changed = true;
    }

    // }}}
    // {{{ CSI

    fn csi_dispatch(&mut self, csi: CsiAction) {
        match csi.leader {
            b'?' => self.csi_private(&csi),
            b'>' => self.csi_gt(&csi),
            0 if !csi.intermediates.is_empty() => self.csi_intermediate(&csi),
            0 => self.csi_standard(&csi),
            _ => self.log_unknown(csi.leader, 0, csi.final_byte),
        }
    }

    fn csi_standard(&mut self, csi: &CsiAction) {
        let n = csi.param(0, 1) as usize;
        match csi.final_byte {
            b'@' => self.screen.insert_chars(n),
            b'A' => self.screen.move_up(n),
            b'B' | b'e' => self.screen.move_down(n),
            b'C' | b'a' => self.screen.move_right(n),
            b'D' => self.screen.move_left(n),
            b'E' => {
                self.screen.move_down(n);
                self.screen.carriage_return();
            }
            b'F' => {
                self.screen.move_up(n);
                self.screen.carriage_return();
            }
            b'G' | b'`' => self.screen.goto_col(n.saturating_sub(1)),
            b'H' | b'f' => {
                let row = csi.param(0, 1) as usize;
                let col = csi.param(1, 1) as usize;
                self.screen.goto(row.saturating_sub(1), col.saturating_sub(1));
            }
            b'I' => self.screen.tab_forward(n),
            b'J' => self.screen.erase_display(csi.param(0, 0)),
            b'K' => self.screen.erase_line(csi.param(0, 0)),
            b'L' => self.screen.insert_lines(n),
            b'M' => self.screen.delete_lines(n),
            b'P' => self.screen.delete_chars(n),
            b'S' => self.screen.scroll_up(n),
            b'T' => self.screen.scroll_down(n),
            b'X' => self.screen.erase_chars(n),
            b'Z' => self.screen.tab_backward(n),
            b'b' => self.repeat_last(n),
            b'c' => self.queue(b"\x1b[?62;22c".to_vec()),
            b'd' => self.screen.goto_row(n.saturating_sub(1)),
            b'g' => self.screen.clear_tab_stop(csi.param(0, 0)),
            b'h' => {
                for mode in csi.params.iter() {
                    self.screen.modes_mut().set_ansi_mode(mode, true);
                }
            }
            b'l' => {
                for mode in csi.params.iter() {
                    self.screen.modes_mut().set_ansi_mode(mode, false);
                }
            }
            b'm' => self.select_graphic_rendition(csi),
            b'n' => self.device_status(csi.param(0, 0), false),
            b'r' => {
                let top = csi.param(0, 1) as usize;
                let bottom = csi.param(1, self.screen.rows() as u16) as usize;
                self.screen
                    .set_scroll_region(top.saturating_sub(1), bottom.saturating_sub(1));
            }
            b's' => {
                // DECSLRM shares this final with ANSI save-cursor; DECLRMM
                // decides which one the application meant.
                if self.screen.modes().left_right_margins {
                    let left = csi.param(0, 1) as usize;
                    let right = csi.param(1, self.screen.cols() as u16) as usize;
                    self.screen
                        .set_horizontal_margins(left.saturating_sub(1), right.saturating_sub(1));
                } else {
                    self.screen.save_cursor();
                }
            }
            b't' => self.window_op(csi),
            b'u' => self.screen.restore_cursor(),
            _ => self.log_unknown(0, 0, csi.final_byte),
        }
    }

    fn repeat_last(&mut self, n: usize) {
        if let Some(c) = self.last_printed {
            for _ in 0..n.min(self.screen.cols()) {
                self.screen.print(c);
            }
        }
    }

    fn csi_private(&mut self, csi: &CsiAction) {
        match (csi.intermediates.as_slice(), csi.final_byte) {
            ([], b'h') => {
                for mode in csi.params.iter() {
                    self.set_dec_mode(mode, true);
                }
            }
            ([], b'l') => {
                for mode in csi.params.iter() {
                    self.set_dec_mode(mode, false);
                }
            }
            ([], b'n') => self.device_status(csi.param(0, 0), true),
            ([b'$'], b'p') => {
                let mode = csi.param(0, 0);
                let value = self.screen.modes().query_dec_mode(mode);
                self.queue(format!("\x1b[?{};{}$y", mode, value.report_code()).into_bytes());
            }
            _ => self.log_unknown(b'?', 0, csi.final_byte),
        }
    }

    fn csi_gt(&mut self, csi: &CsiAction) {
        match csi.final_byte {
            b'c' => self.queue(b"\x1b[>1;10;0c".to_vec()),
            b'q' => {
                let version = env!("CARGO_PKG_VERSION");
                self.queue(format!("\x1bP>|cinder({version})\x1b\\").into_bytes());
            }
            b'm' => {
                // xterm modifyOtherKeys: CSI > 4 ; level m
                if csi.params.raw(0) == 4 {
                    self.screen.modes_mut().modify_other_keys =
                        csi.params.raw(1).min(2) as u8;
                }
            }
            _ => self.log_unknown(b'>', 0, csi.final_byte),
        }
    }

    fn csi_intermediate(&mut self, csi: &CsiAction) {
        match (csi.intermediates.as_slice(), csi.final_byte) {
            ([b' '], b'q') => self.set_cursor_style(csi.param(0, 1)),
            ([b'!'], b'p') => self.screen.soft_reset(),
            ([b'$'], b'p') => {
                let mode = csi.param(0, 0);
                let value = self.screen.modes().query_ansi_mode(mode);
                self.queue(format!("\x1b[{};{}$y", mode, value.report_code()).into_bytes());
            }
            _ => self.log_unknown(0, csi.intermediates[0], csi.final_byte),
        }
    }

    /// DECSCUSR.
    fn set_cursor_style(&mut self, style: u16) {
        let cursor = self.screen.cursor_mut();
        let (shape, blinking) = match style {
            0 | 1 => (CursorStyle::Block, true),
            2 => (CursorStyle::Block, false),
            3 => (CursorStyle::Underline, true),
            4 => (CursorStyle::Underline, false),
            5 => (CursorStyle::Bar, true),
            6 => (CursorStyle::Bar, false),
            _ => return,
        };
        cursor.style = shape;
        cursor.blinking = blinking;
        cursor.reset_blink_phase();
    }

    fn set_dec_mode(&mut self, mode: u16, value: bool) {
        match mode {
            6 => self.screen.set_origin_mode(value),
            25 => {
                self.screen.modes_mut().cursor_visible = value;
                self.screen.cursor_mut().visible = value;
            }
            12 => {
                self.screen.modes_mut().cursor_blink = value;
                self.screen.cursor_mut().blinking = value;
            }
            47 => {
                if value {
                    self.screen.enter_alternate_screen(false);
                } else {
                    self.screen.exit_alternate_screen();
                }
            }
            69 => {
                self.screen.modes_mut().left_right_margins = value;
                if !value {
                    self.screen.reset_horizontal_margins();
                }
            }
            1047 => {
                if value {
                    self.screen.enter_alternate_screen(true);
                } else {
                    self.screen.exit_alternate_screen();
                }
            }
            1048 => {
                if value {
                    self.screen.save_cursor();
                } else {
                    self.screen.restore_cursor();
                }
            }
            1049 => {
                if value {
                    self.screen.save_cursor();
                    self.screen.enter_alternate_screen(true);
                } else {
                    self.screen.exit_alternate_screen();
                    self.screen.restore_cursor();
                }
            }
            2026 => self.screen.modes_mut().synchronized_output = value,
            _ => self.screen.modes_mut().set_dec_mode(mode, value),
        }
    }

    fn device_status(&mut self, request: u16, dec: bool) {
        match request {
            5 if !dec => self.queue(b"\x1b[0n".to_vec()),
            6 => {
                // CPR is origin-relative while DECOM is set.
                let (mut row, mut col) = (self.screen.cursor().row, self.screen.cursor().col);
                if self.screen.modes().origin_mode {
                    let (top, _) = self.screen.vertical_margins();
                    let (left, _) = self.screen.horizontal_margins();
                    row = row.saturating_sub(top);
                    col = col.saturating_sub(left);
                }
                let reply = if dec {
                    format!("\x1b[?{};{}R", row + 1, col + 1)
                } else {
                    format!("\x1b[{};{}R", row + 1, col + 1)
                };
                self.queue(reply.into_bytes());
            }
            _ => debug!("unanswered DSR request {} (dec={})", request, dec),
        }
    }

    fn window_op(&mut self, csi: &CsiAction) {
        match csi.param(0, 0) {
            14 => {
                let (w, h) = self.window_pixel_size;
                self.queue(format!("\x1b[4;{h};{w}t").into_bytes());
            }
            16 => {
                let (w, h) = self.cell_pixel_size;
                self.queue(format!("\x1b[6;{h};{w}t").into_bytes());
            }
            18 => {
                let rows = self.screen.rows();
                let cols = self.screen.cols();
                self.queue(format!("\x1b[8;{rows};{cols}t").into_bytes());
            }
            22 => self.screen.push_title(),
            23 => {
                self.screen.pop_title();
                self.title_changed = true;
            }
            op => debug!("ignoring window op {}", op),
        }
    }

    // }}}
    // {{{ SGR

    fn select_graphic_rendition(&mut self, csi: &CsiAction) {
        if csi.params.is_empty() {
            self.screen.cursor_mut().attrs.reset();
            return;
        }

        let params: Vec<(u16, Vec<u16>)> = csi
            .params
            .iter_with_subparams()
            .map(|(v, s)| (v, s.to_vec()))
            .collect();
        let attrs = &mut self.screen.cursor_mut().attrs;

        let mut i = 0;
        while i < params.len() {
            let (param, subparams) = &params[i];
            match *param {
                0 => attrs.reset(),
                1 => attrs.bold = true,
                2 => attrs.faint = true,
                3 => attrs.italic = true,
                4 => {
                    attrs.underline = match subparams.first().copied() {
                        None | Some(1) => UnderlineStyle::Single,
                        Some(0) => UnderlineStyle::None,
                        Some(2) => UnderlineStyle::Double,
                        Some(3) => UnderlineStyle::Curly,
                        Some(4) => UnderlineStyle::Dotted,
                        Some(5) => UnderlineStyle::Dashed,
                        Some(_) => UnderlineStyle::Single,
                    };
                }
                5 => attrs.blink = Blink::Slow,
                6 => attrs.blink = Blink::Rapid,
                7 => attrs.inverse = true,
                8 => attrs.hidden = true,
                9 => attrs.strikethrough = true,
                21 => attrs.underline = UnderlineStyle::Double,
                22 => {
                    attrs.bold = false;
                    attrs.faint = false;
                }
                23 => attrs.italic = false,
                24 => attrs.underline = UnderlineStyle::None,
                25 => attrs.blink = Blink::None,
                27 => attrs.inverse = false,
                28 => attrs.hidden = false,
                29 => attrs.strikethrough = false,
                30..=37 => attrs.fg = Color::Indexed((*param - 30) as u8),
                38 => {
                    if let Some((color, consumed)) =
                        extended_color(subparams, &params[i..])
                    {
                        attrs.fg = color;
                        i += consumed;
                    }
                }
                39 => attrs.fg = Color::Default,
                40..=47 => attrs.bg = Color::Indexed((*param - 40) as u8),
                48 => {
                    if let Some((color, consumed)) =
                        extended_color(subparams, &params[i..])
                    {
                        attrs.bg = color;
                        i += consumed;
                    }
                }
                49 => attrs.bg = Color::Default,
                53 => attrs.overline = true,
                55 => attrs.overline = false,
                58 => {
                    if let Some((color, consumed)) =
                        extended_color(subparams, &params[i..])
                    {
                        attrs.underline_color = color;
                        i += consumed;
                    }
                }
                59 => attrs.underline_color = Color::Default,
                90..=97 => attrs.fg = Color::Indexed((*param - 90 + 8) as u8),
                100..=107 => attrs.bg = Color::Indexed((*param - 100 + 8) as u8),
                other => debug!("ignoring SGR parameter {}", other),
            }
            i += 1;
        }
    }

    // }}}
    // {{{ OSC

    fn osc_dispatch(&mut self, data: &[u8]) {
        let text = String::from_utf8_lossy(data);
        let (code, payload) = match text.find(';') {
            Some(pos) => (&text[..pos], &text[pos + 1..]),
            None => (text.as_ref(), ""),
        };
        let code: u16 = match code.parse() {
            Ok(code) => code,
            Err(_) => {
                debug!("ignoring OSC with non-numeric code: {:?}", code);
                return;
            }
        };

        match code {
            0 | 2 => {
                self.screen.set_title(payload);
                self.title_changed = true;
            }
            1 => {} // icon name
            4 => self.osc_set_palette(payload),
            7 => self.working_directory = Some(payload.to_string()),
            8 => self.osc_hyperlink(payload),
            9 => self.notifications.push(Notification {
                title: String::new(),
                body: payload.to_string(),
            }),
            10 => self.osc_color_query_or_set(10, payload, self.fg_color),
            11 => self.osc_color_query_or_set(11, payload, self.bg_color),
            12 => self.osc_color_query_or_set(12, payload, self.cursor_color),
            52 => {
                let mut parts = payload.splitn(2, ';');
                let selection = parts.next().unwrap_or("").to_string();
                let data = parts.next().unwrap_or("").to_string();
                if data != "?" {
                    self.clipboard_writes.push(ClipboardWrite {
                        selection,
                        payload: data,
                    });
                }
            }
            104 => match payload.parse::<u8>() {
                Ok(index) => {
                    self.palette_overrides.remove(&index);
                }
                Err(_) => self.palette_overrides.clear(),
            },
            110 | 111 | 112 => {} // default color resets; host owns those
            133 => {
                // Shell integration prompt marks.
                if payload.starts_with('A') {
                    let row = self.screen.cursor().row;
                    self.screen.mark_row(row);
                }
            }
            777 => {
                // OSC 777;notify;title;body
                let mut parts = payload.splitn(3, ';');
                if parts.next() == Some("notify") {
                    let title = parts.next().unwrap_or("").to_string();
                    let body = parts.next().unwrap_or("").to_string();
                    self.notifications.push(Notification { title, body });
                }
            }
            other => debug!("ignoring OSC {}", other),
        }
    }

    fn osc_hyperlink(&mut self, payload: &str) {
        let mut parts = payload.splitn(2, ';');
        let params = parts.next().unwrap_or("");
        let uri = parts.next().unwrap_or("");
        if uri.is_empty() {
            self.screen.close_hyperlink();
            return;
        }
        let id_param = params
            .split(':')
            .find_map(|p| p.strip_prefix("id="))
            .unwrap_or("");
        self.screen.open_hyperlink(id_param, uri);
    }

    fn osc_set_palette(&mut self, payload: &str) {
        // OSC 4 ; index ; spec [; index ; spec]...
        let mut parts = payload.split(';');
        while let (Some(index), Some(spec)) = (parts.next(), parts.next()) {
            let Ok(index) = index.parse::<u8>() else {
                continue;
            };
            if spec == "?" {
                let (r, g, b) = self
                    .palette_overrides
                    .get(&index)
                    .copied()
                    .unwrap_or_else(|| Color::Indexed(index).to_rgb());
                self.queue(
                    format!(
                        "\x1b]4;{};rgb:{:04x}/{:04x}/{:04x}\x07",
                        index,
                        scale_component(r),
                        scale_component(g),
                        scale_component(b),
                    )
                    .into_bytes(),
                );
            } else if let Some(rgb) = parse_color_spec(spec) {
                self.palette_overrides.insert(index, rgb);
            }
        }
    }

    fn osc_color_query_or_set(&mut self, code: u16, payload: &str, current: (u8, u8, u8)) {
        if payload == "?" {
            let (r, g, b) = current;
            self.queue(
                format!(
                    "\x1b]{};rgb:{:04x}/{:04x}/{:04x}\x07",
                    code,
                    scale_component(r),
                    scale_component(g),
                    scale_component(b),
                )
                .into_bytes(),
            );
        } else if let Some(rgb) = parse_color_spec(payload) {
            match code {
                10 => self.fg_color = rgb,
                11 => self.bg_color = rgb,
                12 => self.cursor_color = rgb,
                _ => {}
            }
        }
    }

    // }}}
    // {{{ DCS

    fn dcs_dispatch(&mut self, dcs: DcsAction) {
        match (dcs.intermediates.as_slice(), dcs.final_byte) {
            ([b'$'], b'q') => self.decrqss(&dcs.data),
            ([], b'q') => {
                // Sixel image data; the decoder lives outside the core.
                debug!("dropping sixel payload ({} bytes)", dcs.data.len());
            }
            ([], b'p') => {
                debug!("dropping ReGIS payload ({} bytes)", dcs.data.len());
            }
            _ => {
                debug!(
                    "ignoring DCS {:?} final {:?} ({} bytes)",
                    dcs.intermediates,
                    dcs.final_byte as char,
                    dcs.data.len()
                );
            }
        }
    }

    /// DECRQSS: report the requested setting inside DCS 1 $ r ... ST.
    fn decrqss(&mut self, request: &[u8]) {
        match request {
            b"m" => {
                let sgr = sgr_report(&self.screen.cursor().attrs);
                self.queue(format!("\x1bP1$r{}m\x1b\\", sgr).into_bytes());
            }
            b"r" => {
                let (top, bottom) = self.screen.vertical_margins();
                self.queue(format!("\x1bP1$r{};{}r\x1b\\", top + 1, bottom + 1).into_bytes());
            }
            b"s" => {
                let (left, right) = self.screen.horizontal_margins();
                self.queue(format!("\x1bP1$r{};{}s\x1b\\", left + 1, right + 1).into_bytes());
            }
            b" q" => {
                let cursor = self.screen.cursor();
                let style = match (cursor.style, cursor.blinking) {
                    (CursorStyle::Block, true) => 1,
                    (CursorStyle::Block, false) => 2,
                    (CursorStyle::Underline, true) => 3,
                    (CursorStyle::Underline, false) => 4,
                    (CursorStyle::Bar, true) => 5,
                    (CursorStyle::Bar, false) => 6,
                };
                self.queue(format!("\x1bP1$r{} q\x1b\\", style).into_bytes());
            }
            _ => {
                self.queue(b"\x1bP0$r\x1b\\".to_vec());
                debug!("unknown DECRQSS request {:?}", String::from_utf8_lossy(request));
            }
        }
    }

    // }}}

    fn queue(&mut self, response: Vec<u8>) {
        self.pending_responses.push(response);
    }

    fn log_unknown(&mut self, leader: u8, intermediate: u8, final_byte: u8) {
        let key = (leader, intermediate, final_byte);
        if self.reported_unknown.insert(key) {
            warn!(
                "unhandled sequence (leader {:?} intermediate {:?} final {:?})",
                leader as char, intermediate as char, final_byte as char
            );
        } else {
            debug!(
                "unhandled sequence (leader {:?} intermediate {:?} final {:?})",
                leader as char, intermediate as char, final_byte as char
            );
        }
    }
}

/// Parse 38/48/58 color arguments, either from sub-parameters
/// (`38:2::r:g:b`, `38:5:n`) or from following parameters (`38;2;r;g;b`,
/// `38;5;n`). Returns the color and how many *extra* parameters were
/// consumed.
fn extended_color(subparams: &[u16], params: &[(u16, Vec<u16>)]) -> Option<(Color, usize)> {
    if !subparams.is_empty() {
        // Colon form, self-contained in one parameter.
        match subparams[0] {
            2 => {
                // 38:2:r:g:b or 38:2:colorspace:r:g:b
                let rgb = match subparams.len() {
                    4 => &subparams[1..4],
                    n if n >= 5 => &subparams[2..5],
                    _ => return None,
                };
                Some((
                    Color::rgb(rgb[0] as u8, rgb[1] as u8, rgb[2] as u8),
                    0,
                ))
            }
            5 if subparams.len() >= 2 => Some((Color::Indexed(subparams[1] as u8), 0)),
            _ => None,
        }
    } else {
        // Semicolon form, spread over the following parameters.
        match params.get(1).map(|(v, _)| *v) {
            Some(2) if params.len() >= 5 => Some((
                Color::rgb(
                    params[2].0 as u8,
                    params[3].0 as u8,
                    params[4].0 as u8,
                ),
                4,
            )),
            Some(5) if params.len() >= 3 => Some((Color::Indexed(params[2].0 as u8), 2)),
            _ => None,
        }
    }
}

/// Render attributes back into SGR parameters for DECRQSS.
fn sgr_report(attrs: &CellAttributes) -> String {
    let mut parts = vec!["0".to_string()];
    if attrs.bold {
        parts.push("1".into());
    }
    if attrs.faint {
        parts.push("2".into());
    }
    if attrs.italic {
        parts.push("3".into());
    }
    match attrs.underline {
        UnderlineStyle::None => {}
        UnderlineStyle::Single => parts.push("4".into()),
        UnderlineStyle::Double => parts.push("4:2".into()),
        UnderlineStyle::Curly => parts.push("4:3".into()),
        UnderlineStyle::Dotted => parts.push("4:4".into()),
        UnderlineStyle::Dashed => parts.push("4:5".into()),
    }
    match attrs.blink {
        Blink::None => {}
        Blink::Slow => parts.push("5".into()),
        Blink::Rapid => parts.push("6".into()),
    }
    if attrs.inverse {
        parts.push("7".into());
    }
    if attrs.hidden {
        parts.push("8".into());
    }
    if attrs.strikethrough {
        parts.push("9".into());
    }
    match attrs.fg {
        Color::Default => {}
        Color::Indexed(i) if i < 8 => parts.push(format!("{}", 30 + i as u16)),
        Color::Indexed(i) if i < 16 => parts.push(format!("{}", 90 + (i - 8) as u16)),
        Color::Indexed(i) => parts.push(format!("38:5:{i}")),
        Color::Rgb { r, g, b } => parts.push(format!("38:2::{r}:{g}:{b}")),
    }
    match attrs.bg {
        Color::Default => {}
        Color::Indexed(i) if i < 8 => parts.push(format!("{}", 40 + i as u16)),
        Color::Indexed(i) if i < 16 => parts.push(format!("{}", 100 + (i - 8) as u16)),
        Color::Indexed(i) => parts.push(format!("48:5:{i}")),
        Color::Rgb { r, g, b } => parts.push(format!("48:2::{r}:{g}:{b}")),
    }
    parts.join(";")
}

/// XParseColor subset: `rgb:RR/GG/BB` (1-4 hex digits per component) and
/// `#RRGGBB`.
fn parse_color_spec(spec: &str) -> Option<(u8, u8, u8)> {
    if let Some(rest) = spec.strip_prefix("rgb:") {
        let mut out = [0u8; 3];
        let mut parts = rest.split('/');
        for slot in &mut out {
            let part = parts.next()?;
            if part.is_empty() || part.len() > 4 {
                return None;
            }
            let value = u16::from_str_radix(part, 16).ok()?;
            // Scale to 8 bits based on the digit count.
            let max = (16u32.pow(part.len() as u32) - 1) as u32;
            *slot = ((value as u32 * 255 + max / 2) / max) as u8;
        }
        if parts.next().is_some() {
            return None;
        }
        return Some((out[0], out[1], out[2]));
    }
    if let Some(hex) = spec.strip_prefix('#') {
        if hex.len() == 6 {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            return Some((r, g, b));
        }
    }
    None
}

/// 8-bit component to the 16-bit value xterm reports.
fn scale_component(v: u8) -> u16 {
    (v as u16) << 8 | v as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(cols: usize, rows: usize) -> Terminal {
        Terminal::new(Dimensions::new(cols, rows))
    }

    #[test]
    fn test_print_and_cursor() {
        let mut t = term(80, 24);
        t.process(b"Hello");
        assert_eq!(t.screen().line(0).text_trimmed(), "Hello");
        assert_eq!(t.screen().cursor().col, 5);
    }

    #[test]
    fn test_cup() {
        let mut t = term(80, 24);
        t.process(b"\x1b[10;20H");
        assert_eq!(t.screen().cursor().row, 9);
        assert_eq!(t.screen().cursor().col, 19);
    }

    #[test]
    fn test_sgr_semicolon_rgb() {
        let mut t = term(80, 24);
        t.process(b"\x1b[38;2;10;20;30mX");
        assert_eq!(
            t.screen().line(0).attrs_at(0).fg,
            Color::rgb(10, 20, 30)
        );
    }

    #[test]
    fn test_sgr_subparam_rgb_with_colorspace() {
        let mut t = term(80, 24);
        t.process(b"\x1b[38:2::10:20:30mX");
        assert_eq!(
            t.screen().line(0).attrs_at(0).fg,
            Color::rgb(10, 20, 30)
        );
    }

    #[test]
    fn test_sgr_subparam_256() {
        let mut t = term(80, 24);
        t.process(b"\x1b[48:5:196mX");
        assert_eq!(t.screen().line(0).attrs_at(0).bg, Color::Indexed(196));
    }

    #[test]
    fn test_sgr_curly_underline() {
        let mut t = term(80, 24);
        t.process(b"\x1b[4:3mX");
        assert_eq!(
            t.screen().line(0).attrs_at(0).underline,
            UnderlineStyle::Curly
        );
        t.process(b"\x1b[24mY");
        assert_eq!(
            t.screen().line(0).attrs_at(1).underline,
            UnderlineStyle::None
        );
    }

    #[test]
    fn test_sgr_rapid_blink_and_overline() {
        let mut t = term(80, 24);
        t.process(b"\x1b[6;53mX");
        let attrs = t.screen().line(0).attrs_at(0);
        assert_eq!(attrs.blink, Blink::Rapid);
        assert!(attrs.overline);
    }

    #[test]
    fn test_decrqm_unknown_mode() {
        let mut t = term(80, 24);
        t.process(b"\x1b[?2022$p");
        let responses = t.take_pending_responses();
        assert_eq!(responses, vec![b"\x1b[?2022;0$y".to_vec()]);
    }

    #[test]
    fn test_decrqm_known_modes() {
        let mut t = term(80, 24);
        t.process(b"\x1b[?2004h\x1b[?2004$p");
        assert_eq!(
            t.take_pending_responses(),
            vec![b"\x1b[?2004;1$y".to_vec()]
        );
        t.process(b"\x1b[?2004l\x1b[?2004$p");
        assert_eq!(
            t.take_pending_responses(),
            vec![b"\x1b[?2004;2$y".to_vec()]
        );
    }

    #[test]
    fn test_cpr() {
        let mut t = term(80, 24);
        t.process(b"\x1b[5;7H\x1b[6n");
        assert_eq!(t.take_pending_responses(), vec![b"\x1b[5;7R".to_vec()]);
    }

    #[test]
    fn test_cpr_origin_relative() {
        let mut t = term(80, 24);
        t.process(b"\x1b[3;10r\x1b[?6h\x1b[2;2H\x1b[6n");
        assert_eq!(t.take_pending_responses(), vec![b"\x1b[2;2R".to_vec()]);
    }

    #[test]
    fn test_alternate_screen_1049() {
        let mut t = term(80, 24);
        t.process(b"A\x1b[?1049hB\x1b[?1049l");
        assert!(!t.screen().modes().alternate_screen);
        assert_eq!(t.screen().line(0).text_trimmed(), "A");
        assert_eq!(t.screen().cursor().col, 1);
    }

    #[test]
    fn test_title_and_bell() {
        let mut t = term(80, 24);
        t.process(b"\x1b]2;My Title\x07\x07");
        assert_eq!(t.title(), "My Title");
        assert!(t.take_title_changed());
        assert!(t.take_bell());
        assert!(!t.take_bell());
    }

    #[test]
    fn test_hyperlink_roundtrip() {
        let mut t = term(80, 24);
        t.process(b"\x1b]8;;https://example.com\x1b\\link\x1b]8;;\x1b\\plain");
        let id = t.screen().line(0).hyperlink_at(0);
        assert_ne!(id, 0);
        assert_eq!(
            t.screen().hyperlink_uri(id),
            Some("https://example.com")
        );
        assert_eq!(t.screen().line(0).hyperlink_at(4), 0);
    }

    #[test]
    fn test_decrqss_sgr() {
        let mut t = term(80, 24);
        t.process(b"\x1b[1;31m\x1bP$qm\x1b\\");
        let responses = t.take_pending_responses();
        assert_eq!(responses, vec![b"\x1bP1$r0;1;31m\x1b\\".to_vec()]);
    }

    #[test]
    fn test_decrqss_margins() {
        let mut t = term(80, 24);
        t.process(b"\x1b[3;10r\x1bP$qr\x1b\\");
        assert_eq!(
            t.take_pending_responses(),
            vec![b"\x1bP1$r3;10r\x1b\\".to_vec()]
        );
    }

    #[test]
    fn test_da1_da2() {
        let mut t = term(80, 24);
        t.process(b"\x1b[c\x1b[>c");
        let responses = t.take_pending_responses();
        assert_eq!(responses[0], b"\x1b[?62;22c".to_vec());
        assert_eq!(responses[1], b"\x1b[>1;10;0c".to_vec());
    }

    #[test]
    fn test_window_size_report() {
        let mut t = term(80, 24);
        t.set_window_pixel_size(720, 432);
        t.process(b"\x1b[14t\x1b[18t");
        let responses = t.take_pending_responses();
        assert_eq!(responses[0], b"\x1b[4;432;720t".to_vec());
        assert_eq!(responses[1], b"\x1b[8;24;80t".to_vec());
    }

    #[test]
    fn test_osc_color_query() {
        let mut t = term(80, 24);
        t.set_default_colors((0x10, 0x20, 0x30), (0, 0, 0), (255, 255, 255));
        t.process(b"\x1b]10;?\x07");
        assert_eq!(
            t.take_pending_responses(),
            vec![b"\x1b]10;rgb:1010/2020/3030\x07".to_vec()]
        );
    }

    #[test]
    fn test_osc_notification() {
        let mut t = term(80, 24);
        t.process(b"\x1b]777;notify;Build;done\x1b\\\x1b]9;hello\x07");
        let notes = t.take_notifications();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].title, "Build");
        assert_eq!(notes[0].body, "done");
        assert_eq!(notes[1].body, "hello");
    }

    #[test]
    fn test_osc_clipboard_write() {
        let mut t = term(80, 24);
        t.process(b"\x1b]52;c;aGVsbG8=\x07");
        let writes = t.take_clipboard_writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].selection, "c");
        assert_eq!(writes[0].payload, "aGVsbG8=");
    }

    #[test]
    fn test_modify_other_keys_selection() {
        let mut t = term(80, 24);
        t.process(b"\x1b[>4;2m");
        assert_eq!(t.screen().modes().modify_other_keys, 2);
        t.process(b"\x1b[>4;0m");
        assert_eq!(t.screen().modes().modify_other_keys, 0);
    }

    #[test]
    fn test_rep_repeats_last_char() {
        let mut t = term(80, 24);
        t.process(b"a\x1b[3b");
        assert_eq!(t.screen().line(0).text_trimmed(), "aaaa");
    }

    #[test]
    fn test_decstr_soft_reset() {
        let mut t = term(80, 24);
        t.process(b"\x1b[4h\x1b[5;10r\x1b[!p");
        assert!(!t.screen().modes().insert_mode);
        assert_eq!(t.screen().vertical_margins(), (0, 23));
    }

    #[test]
    fn test_ris_resets_and_keeps_size() {
        let mut t = term(40, 10);
        t.process(b"hello\x1b[?25l\x1bc");
        assert_eq!(t.screen().cols(), 40);
        assert!(t.screen().modes().cursor_visible);
        assert_eq!(t.screen().page_text_trimmed(), "");
    }

    #[test]
    fn test_decslrm_vs_ansi_save_cursor() {
        let mut t = term(80, 24);
        // Without DECLRMM, CSI s saves the cursor.
        t.process(b"\x1b[5;5H\x1b[s\x1b[H\x1b[u");
        assert_eq!(t.screen().cursor().row, 4);
        // With DECLRMM, the same final sets margins.
        t.process(b"\x1b[?69h\x1b[10;20s");
        assert_eq!(t.screen().horizontal_margins(), (9, 19));
    }

    #[test]
    fn test_charset_line_drawing() {
        let mut t = term(80, 24);
        t.process(b"\x1b(0lqk\x1b(B");
        assert_eq!(t.screen().line(0).text_trimmed(), "┌─┐");
    }

    #[test]
    fn test_parse_color_spec() {
        assert_eq!(parse_color_spec("rgb:ff/00/80"), Some((255, 0, 128)));
        assert_eq!(parse_color_spec("rgb:ffff/0000/8080"), Some((255, 0, 128)));
        assert_eq!(parse_color_spec("#ff0080"), Some((255, 0, 128)));
        assert_eq!(parse_color_spec("nonsense"), None);
    }

    #[test]
    fn test_osc4_palette_query() {
        let mut t = term(80, 24);
        t.process(b"\x1b]4;1;?\x07");
        let responses = t.take_pending_responses();
        assert_eq!(responses.len(), 1);
        assert!(responses[0].starts_with(b"\x1b]4;1;rgb:"));
        t.process(b"\x1b]4;1;#102030\x07\x1b]4;1;?\x07");
        assert_eq!(
            t.take_pending_responses(),
            vec![b"\x1b]4;1;rgb:1010/2020/3030\x07".to_vec()]
        );
    }

    #[test]
    fn test_prompt_mark() {
        let mut t = term(80, 24);
        t.process(b"\x1b]133;A\x07$ ");
        assert!(t.screen().line(0).marked);
    }

    #[test]
    fn test_unknown_sequences_are_noops() {
        let mut t = term(80, 24);
        t.process(b"\x1b[99z\x1b[<5y\x1b]99999;x\x07ok");
        assert_eq!(t.screen().line(0).text_trimmed(), "ok");
    }
}
