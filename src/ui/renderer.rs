/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// The scene layer draws the panorama with `▀` half-blocks: foreground is
/// the upper pixel, background the lower one, so each cell carries two
/// rows of the view.

use std::io::{self, BufWriter, Write};
use std::time::Instant;

use crossterm::{
    cursor::{self, MoveTo},
    event::{
        DisableMouseCapture, EnableMouseCapture, KeyboardEnhancementFlags,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};
use image::Rgb;

use crate::sim::world::{ExperienceState, Phase, Rect};
use super::panorama::{fog_blend, sample_view, ViewParams, EMPTY_SKY};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: [u8; 4],
    ch_len: u8,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit dark background for all "empty" terminal cells, so inter-row
    /// gaps match the cell colour on VTE terminals.
    const BASE_BG: Color = Color::Rgb { r: 18, g: 18, b: 22 };

    const BLANK: Cell = Cell {
        ch: [b' ', 0, 0, 0],
        ch_len: 1,
        fg: Color::White,
        bg: Cell::BASE_BG,
    };

    /// Sentinel cell used to invalidate the back buffer.
    const INVALID: Cell = Cell {
        ch: [b'?', 0, 0, 0],
        ch_len: 1,
        fg: Color::Magenta,
        bg: Color::Magenta,
    };

    fn from_char(c: char, fg: Color, bg: Color) -> Self {
        let mut cell = Self::BLANK;
        let len = c.encode_utf8(&mut cell.ch).len() as u8;
        cell.ch_len = len;
        cell.fg = fg;
        cell.bg = match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        };
        cell
    }

    fn as_str(&self) -> &str {
        std::str::from_utf8(&self.ch[..self.ch_len as usize]).unwrap_or(" ")
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer {
            width: w,
            height: h,
            cells: vec![Cell::BLANK; w * h],
        }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    /// Background colour currently at (x, y); text overlays keep it.
    fn bg_at(&self, x: usize, y: usize) -> Color {
        self.get(x, y).bg
    }

    /// Write a string at (x, y). Each char occupies 1 column.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        let mut cx = x;
        for ch in s.chars() {
            if cx >= self.width { break; }
            self.set(cx, y, Cell::from_char(ch, fg, bg));
            cx += 1;
        }
    }

    /// Write a string centered on row `y`.
    fn put_centered(&mut self, y: usize, s: &str, fg: Color, bg: Color) {
        let len = s.chars().count();
        let x = self.width.saturating_sub(len) / 2;
        self.put_str(x, y, s, fg, bg);
    }

    fn fill(&mut self, r: Rect, bg: Color) {
        for y in r.y as usize..(r.y + r.h) as usize {
            for x in r.x as usize..(r.x + r.w) as usize {
                self.set(x, y, Cell::from_char(' ', Color::White, bg));
            }
        }
    }
}

// ── Palette ──

const TITLE_C: Color = Color::Rgb { r: 240, g: 232, b: 214 };
const TEXT_C: Color = Color::Rgb { r: 214, g: 210, b: 200 };
const DIM_C: Color = Color::Rgb { r: 130, g: 130, b: 140 };
const ACCENT_C: Color = Color::Rgb { r: 222, g: 180, b: 92 };
const PANEL_BG: Color = Color::Rgb { r: 12, g: 12, b: 16 };
const MSG_C: Color = Color::Rgb { r: 255, g: 120, b: 90 };

/// Horizontal field of view of the panorama view, radians.
const VIEW_FOV: f32 = 1.75;
const METER_W: usize = 20;
const TEXT_PANEL_MAX_W: usize = 64;
/// Screen row of the first drawer entry.
pub const DRAWER_FIRST_ROW: u16 = 3;

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_phase: Option<Phase>,
    enhanced_keys: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(65536, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_phase: None,
            enhanced_keys: false,
        }
    }

    /// Enter raw mode + alternate screen. Returns whether key release
    /// events are available.
    pub fn init(&mut self) -> io::Result<bool> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            EnableMouseCapture,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        if terminal::supports_keyboard_enhancement().unwrap_or(false) {
            execute!(
                self.writer,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
            self.enhanced_keys = true;
        }
        log::info!("terminal ready (key release events: {})", self.enhanced_keys);

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        // Force full repaint on first frame.
        self.back.cells.fill(Cell::INVALID);

        Ok(self.enhanced_keys)
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        if self.enhanced_keys {
            execute!(self.writer, PopKeyboardEnhancementFlags)?;
        }
        execute!(
            self.writer,
            ResetColor,
            DisableMouseCapture,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    pub fn render(&mut self, state: &mut ExperienceState, now: Instant) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        if self.last_phase != Some(state.phase) {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_phase = Some(state.phase);
        }

        self.front.clear();

        match state.phase {
            Phase::Home => self.compose_home(state),
            Phase::Video => self.compose_video(state, now),
            Phase::Scene => self.compose_scene(state, now),
        }
        self.compose_message(state);

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);

        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut need_move = true;
        let mut last_x: usize = 0;
        let mut last_y: usize = 0;

        queue!(self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    need_move = true;
                    continue;
                }

                if need_move || x != last_x + 1 || y != last_y {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                    need_move = false;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.as_str()))?;
                last_x = x;
                last_y = y;
            }
        }

        self.writer.flush()
    }

    // ── Compose: build front buffer content ──

    fn compose_home(&mut self, state: &mut ExperienceState) {
        let w = self.front.width;
        let h = self.front.height;
        let hud = &state.hud;

        self.front.put_centered(1, &hud.title, TITLE_C, Color::Reset);

        // Portrait frame
        let pw = 26_usize.min(w);
        let ph = 9_usize.min(h.saturating_sub(4));
        let px = w.saturating_sub(pw) / 2;
        let py = 3;
        let frame = Rect { x: px as u16, y: py as u16, w: pw as u16, h: ph as u16 };
        self.front.fill(frame, PANEL_BG);
        if ph >= 3 {
            let inner = pw.saturating_sub(2);
            self.front.put_str(px, py, &format!("╭{}╮", "─".repeat(inner)), ACCENT_C, PANEL_BG);
            for row in py + 1..py + ph - 1 {
                self.front.put_str(px, row, "│", ACCENT_C, PANEL_BG);
                self.front.put_str(px + pw - 1, row, "│", ACCENT_C, PANEL_BG);
            }
            self.front.put_str(px, py + ph - 1, &format!("╰{}╯", "─".repeat(inner)), ACCENT_C, PANEL_BG);
            let mid = py + ph / 2;
            let blink = (state.anim_tick / 30) % 2 == 0;
            self.put_in(frame, mid.saturating_sub(1), "Giacomo Leopardi", TITLE_C, PANEL_BG);
            let hint = if blink { "▶  Enter / click  ◀" } else { "   Enter / click   " };
            self.put_in(frame, mid + 1, hint, DIM_C, PANEL_BG);
        }
        state.layout.portrait = frame;

        let mut y = py + ph + 1;
        for line in wrap(&hud.text, TEXT_PANEL_MAX_W.min(w.saturating_sub(4))) {
            if y + 2 >= h { break; }
            self.front.put_centered(y, &line, TEXT_C, Color::Reset);
            y += 1;
        }
        self.compose_status(hud.status.as_str(), hud.meter, h.saturating_sub(2));
        self.front.put_str(1, h.saturating_sub(1), "Esc quit", DIM_C, Color::Reset);
    }

    fn compose_video(&mut self, state: &ExperienceState, now: Instant) {
        let w = self.front.width;
        let h = self.front.height;
        let mid = h / 2;

        let Some(player) = state.player.as_ref() else { return };
        self.front.put_centered(mid.saturating_sub(3), "▶  VIDEO", ACCENT_C, Color::Reset);
        self.front.put_centered(mid.saturating_sub(1), &format!("youtube.com/watch?v={}", player.video_id()), TEXT_C, Color::Reset);

        match player.progress(now) {
            Some((elapsed, total)) => {
                let bar_w = 40_usize.min(w.saturating_sub(12));
                let ratio = if total.is_zero() { 1.0 } else { elapsed.as_secs_f32() / total.as_secs_f32() };
                let filled = ((bar_w as f32) * ratio.clamp(0.0, 1.0)) as usize;
                let bar = format!(
                    "{}{}  {:>3}s",
                    "█".repeat(filled),
                    "░".repeat(bar_w - filled),
                    total.saturating_sub(elapsed).as_secs()
                );
                self.front.put_centered(mid + 1, &bar, ACCENT_C, Color::Reset);
            }
            None => {
                let dots = ".".repeat(((state.anim_tick / 10) % 4) as usize);
                let label = match state.play_retry.as_ref() {
                    Some(retry) if retry.attempts() > 0 => format!("starting player (attempt {}){dots:<3}", retry.attempts()),
                    _ => format!("loading player{dots:<3}"),
                };
                self.front.put_centered(mid + 1, &label, DIM_C, Color::Reset);
            }
        }

        self.front.put_str(1, h.saturating_sub(1), "S skip   H home   Esc quit", DIM_C, Color::Reset);
    }

    fn compose_scene(&mut self, state: &mut ExperienceState, now: Instant) {
        let w = self.front.width;
        let h = self.front.height;
        if w == 0 || h == 0 { return; }

        // ── Panorama ──
        let fog = state.choreo.fog_level(now);
        let view = ViewParams {
            yaw: state.look.yaw,
            pitch: state.look.pitch + state.look.bob,
            fov: VIEW_FOV,
        };
        // Terminal cells are about twice as tall as wide; a half-block
        // pixel is roughly square.
        let px_h = h * 2;
        let aspect = w as f32 / px_h as f32;
        let pano = state.choreo.active().map(|p| &p.pixels);
        for row in 0..h {
            for col in 0..w {
                let u = (col as f32 + 0.5) / w as f32;
                let (top, bottom) = match pano {
                    Some(img) => (
                        sample_view(img, view, aspect, u, (row * 2) as f32 / px_h as f32),
                        sample_view(img, view, aspect, u, (row * 2 + 1) as f32 / px_h as f32),
                    ),
                    None => (EMPTY_SKY, EMPTY_SKY),
                };
                let top = fog_blend(top, fog);
                let bottom = fog_blend(bottom, fog);
                self.front.set(col, row, Cell::from_char('▀', rgb(top), rgb(bottom)));
            }
        }

        // ── HUD: title bar ──
        let hud = &state.hud;
        self.front.fill(Rect { x: 0, y: 0, w: w as u16, h: 1 }, PANEL_BG);
        self.front.put_str(2, 0, "☰", ACCENT_C, PANEL_BG);
        self.front.put_centered(0, &hud.title, TITLE_C, PANEL_BG);
        let busy = if state.choreo.is_busy() { "… " } else { "" };
        let pos = format!("{busy}{}/{}", state.nav.scene_index() + 1, state.catalog.len());
        self.front.put_str(w.saturating_sub(pos.chars().count() + 2), 0, &pos, DIM_C, PANEL_BG);

        // ── HUD: lesson text panel (hidden under the fog) ──
        let panel_w = TEXT_PANEL_MAX_W.min(w.saturating_sub(4));
        let lines = wrap(&hud.text, panel_w.saturating_sub(4));
        let panel_h = lines.len() + 2;
        if h > panel_h + 6 && !state.choreo.fog_visible() {
            let panel = Rect {
                x: (w.saturating_sub(panel_w) / 2) as u16,
                y: (h - panel_h - 3) as u16,
                w: panel_w as u16,
                h: panel_h as u16,
            };
            self.front.fill(panel, PANEL_BG);
            for (i, line) in lines.iter().enumerate() {
                self.put_in(panel, panel.y as usize + 1 + i, line, TEXT_C, PANEL_BG);
            }
        }

        // ── HUD: status, meter, hold buttons ──
        let bar_row = h.saturating_sub(2);
        self.front.fill(Rect { x: 0, y: bar_row as u16, w: w as u16, h: 2 }, PANEL_BG);
        self.compose_status(&hud.status, hud.meter, bar_row);

        let back_btn = Rect { x: 1, y: bar_row as u16, w: 5, h: 2 };
        let fwd_btn = Rect { x: w.saturating_sub(6) as u16, y: bar_row as u16, w: 5, h: 2 };
        let dir = state.nav.direction().sign();
        self.compose_button(back_btn, "◀", dir < 0.0);
        self.compose_button(fwd_btn, "▶", dir > 0.0);
        state.layout.back_btn = back_btn;
        state.layout.forward_btn = fwd_btn;

        self.front.put_centered(
            h - 1,
            "←/→ walk  a/d/w/x look  Tab menu  1-9 jump  H home  Esc quit",
            DIM_C,
            PANEL_BG,
        );

        state.layout.drawer = Rect::default();
        if state.drawer.open {
            self.compose_drawer(state);
        }
    }

    fn compose_status(&mut self, status: &str, meter: f32, row: usize) {
        let filled = ((meter.clamp(0.0, 100.0) / 100.0) * METER_W as f32).round() as usize;
        let line = format!("{status}  {}{}", "━".repeat(filled), "─".repeat(METER_W - filled));
        let x = self.front.width.saturating_sub(line.chars().count()) / 2;
        let bg = self.front.bg_at(x, row);
        self.front.put_str(x, row, status, ACCENT_C, bg);
        let bar_x = x + status.chars().count() + 2;
        self.front.put_str(bar_x, row, &"━".repeat(filled), ACCENT_C, bg);
        self.front.put_str(bar_x + filled, row, &"─".repeat(METER_W - filled), DIM_C, bg);
    }

    fn compose_button(&mut self, r: Rect, glyph: &str, active: bool) {
        let bg = if active { ACCENT_C } else { Color::Rgb { r: 40, g: 40, b: 48 } };
        let fg = if active { PANEL_BG } else { TITLE_C };
        self.front.fill(r, bg);
        self.put_in(r, r.y as usize, glyph, fg, bg);
    }

    /// Scene list; item `i` sits on row `DRAWER_FIRST_ROW + i`.
    fn compose_drawer(&mut self, state: &mut ExperienceState) {
        let w = self.front.width;
        let dw = 36_usize.min(w);
        let dh = (state.catalog.len() + 4).min(self.front.height.saturating_sub(1));
        let r = Rect { x: 0, y: 1, w: dw as u16, h: dh as u16 };
        self.front.fill(r, PANEL_BG);
        self.front.put_str(2, DRAWER_FIRST_ROW as usize - 1, "Scene", ACCENT_C, PANEL_BG);
        for (i, scene) in state.catalog.iter().enumerate() {
            let y = DRAWER_FIRST_ROW as usize + i;
            if y + 1 >= 1 + dh { break; }
            let selected = i == state.drawer.cursor;
            let current = i == state.nav.scene_index();
            let marker = if selected { "›" } else { " " };
            let label = format!("{marker} {}  {}", scene.id, scene.title);
            let fg = if selected { TITLE_C } else if current { ACCENT_C } else { TEXT_C };
            self.front.put_str(1, y, &label, fg, PANEL_BG);
        }
        state.layout.drawer = r;
    }

    fn compose_message(&mut self, state: &ExperienceState) {
        if state.message.is_empty() || self.front.height < 3 { return; }
        let row = 2;
        let text = format!(" {} ", state.message);
        self.front.put_centered(row, &text, MSG_C, PANEL_BG);
    }

    /// Centered text inside a rect on row `y`.
    fn put_in(&mut self, r: Rect, y: usize, s: &str, fg: Color, bg: Color) {
        let len = s.chars().count();
        let x = r.x as usize + (r.w as usize).saturating_sub(len) / 2;
        self.front.put_str(x, y, s, fg, bg);
    }
}

fn rgb(c: Rgb<u8>) -> Color {
    Color::Rgb { r: c[0], g: c[1], b: c[2] }
}

/// Greedy word wrap. Explicit newlines are kept; blank lines survive.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();
    for para in text.split('\n') {
        let mut line = String::new();
        for word in para.split_whitespace() {
            let needed = if line.is_empty() { word.chars().count() } else { line.chars().count() + 1 + word.chars().count() };
            if needed > width && !line.is_empty() {
                out.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        out.push(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_breaks_on_words() {
        let lines = wrap("Qui non c’è cattiveria. C’è indifferenza. È peggio.", 20);
        assert!(lines.iter().all(|l| l.chars().count() <= 20));
        assert_eq!(lines.join(" "), "Qui non c’è cattiveria. C’è indifferenza. È peggio.");
    }

    #[test]
    fn wrap_keeps_blank_lines() {
        let lines = wrap("Non stai entrando in una biografia.\n\nStai entrando in una visione.", 80);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "");
    }

    #[test]
    fn wrap_long_word_overflows_alone() {
        let lines = wrap("a supercalifragilistic b", 5);
        assert_eq!(lines, vec!["a", "supercalifragilistic", "b"]);
    }

    #[test]
    fn cells_hold_multibyte_glyphs() {
        let c = Cell::from_char('▀', Color::White, Color::Reset);
        assert_eq!(c.as_str(), "▀");
        assert_eq!(c.bg, Cell::BASE_BG);
    }

    #[test]
    fn put_str_clips_at_edge() {
        let mut fb = FrameBuffer::new(4, 1);
        fb.put_str(2, 0, "abcdef", Color::White, Color::Reset);
        assert_eq!(fb.get(3, 0).as_str(), "b");
        assert_eq!(fb.get(1, 0).as_str(), " ");
    }
}
