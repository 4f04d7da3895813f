/// Input state tracker and direction adapter.
///
/// `InputState` tracks which keys are currently held down, enabling:
///   - Continuous walking while an arrow key is held
///   - Edge-triggered actions (menu, jumps) on the initial press
///   - Raw mouse events for hold buttons and drag-to-look
///
/// Uses crossterm's keyboard enhancement for Release events when available.
/// Falls back to timeout-based release detection on terminals that don't support it.
///
/// `DirectionLatch` folds every source (keys, gamepad, on-screen buttons)
/// into the single walking direction: last press wins, and a release only
/// clears the direction it pressed.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, poll, Event, KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind,
};

use crate::domain::nav::Direction;
use crate::sim::world::Layout;

/// After this duration without a Press/Repeat event, consider the key released.
/// Only used when the terminal doesn't report Release events.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

pub struct InputState {
    /// Timestamp of last Press/Repeat event for each key.
    last_active: HashMap<KeyCode, Instant>,

    /// Keys that transitioned from "not held" → "held" during the
    /// most recent drain_events() call.
    fresh_presses: Vec<KeyCode>,

    /// Raw key events collected during drain, for meta-key handling.
    pub raw_events: Vec<KeyEvent>,

    /// Mouse events collected during drain, in arrival order.
    pub mouse_events: Vec<MouseEvent>,

    /// Whether to honor Release events. Only true when keyboard
    /// enhancement is confirmed working.
    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            fresh_presses: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            mouse_events: Vec::with_capacity(8),
            honor_release: false,
        }
    }

    /// Drain all pending terminal events and update key states.
    /// Call this once per frame, before the step.
    pub fn drain_events(&mut self) {
        self.fresh_presses.clear();
        self.raw_events.clear();
        self.mouse_events.clear();

        while poll(Duration::ZERO).unwrap_or(false) {
            match event::read() {
                Ok(Event::Key(key)) => self.apply_key(key, Instant::now()),
                Ok(Event::Mouse(m)) => self.mouse_events.push(m),
                _ => {}
            }
        }

        self.expire(Instant::now());
    }

    fn apply_key(&mut self, key: KeyEvent, now: Instant) {
        self.raw_events.push(key);

        match key.kind {
            KeyEventKind::Release if self.honor_release => {
                self.last_active.remove(&key.code);
            }
            KeyEventKind::Release => {
                // Rely on timeout-based expiry instead
            }
            _ => {
                let was_held = self.is_held_at(key.code, now);
                self.last_active.insert(key.code, now);
                if !was_held {
                    self.fresh_presses.push(key.code);
                }
            }
        }
    }

    fn expire(&mut self, now: Instant) {
        if !self.honor_release {
            self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
        }
    }

    /// Is this key currently held down?
    pub fn is_held(&self, code: KeyCode) -> bool {
        self.is_held_at(code, Instant::now())
    }

    /// Convenience: is any of these keys held?
    pub fn any_held(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.is_held(*c))
    }

    /// Was this key freshly pressed this frame? (edge trigger)
    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.fresh_presses.contains(&code)
    }

    /// Convenience: was any of these keys freshly pressed?
    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.was_pressed(*c))
    }

    /// Check if any raw event this frame has Ctrl+C
    pub fn ctrl_c_pressed(&self) -> bool {
        use crossterm::event::KeyModifiers;
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }

    // ── Internal ──

    fn is_held_at(&self, code: KeyCode, now: Instant) -> bool {
        match self.last_active.get(&code) {
            Some(_) if self.honor_release => true,
            Some(t) => now.saturating_duration_since(*t) < HOLD_TIMEOUT,
            None => false,
        }
    }
}

// ── Direction adapter ──

/// The single walking direction shared by all input sources.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectionLatch {
    current: Direction,
}

impl DirectionLatch {
    pub fn press(&mut self, dir: Direction) {
        self.current = dir;
    }

    /// Clears only if `dir` is still the active direction, so a stale
    /// release cannot cancel a newer press.
    pub fn release(&mut self, dir: Direction) {
        if self.current == dir {
            self.current = Direction::Idle;
        }
    }

    pub fn clear(&mut self) {
        self.current = Direction::Idle;
    }

    pub fn direction(&self) -> Direction {
        self.current
    }
}

/// Edge detector for one source's forward/back hold flags.
#[derive(Clone, Copy, Debug, Default)]
pub struct HoldEdges {
    forward: bool,
    back: bool,
}

impl HoldEdges {
    /// Compare with last frame's flags and emit press/release on the latch.
    pub fn feed(&mut self, latch: &mut DirectionLatch, forward: bool, back: bool) {
        Self::edge(latch, &mut self.forward, forward, Direction::Forward);
        Self::edge(latch, &mut self.back, back, Direction::Backward);
    }

    fn edge(latch: &mut DirectionLatch, prev: &mut bool, now: bool, dir: Direction) {
        match (*prev, now) {
            (false, true) => latch.press(dir),
            (true, false) => latch.release(dir),
            _ => {}
        }
        *prev = now;
    }
}

// ── Pointer (scene layer) ──

/// What a scene-layer mouse event leaves for the caller to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerAction {
    None,
    /// Click inside the open drawer, on this screen row.
    DrawerRow(u16),
    /// Drag the view by this many cells.
    Look { dx: i32, dy: i32 },
}

/// Mouse state for the on-screen hold buttons and drag-to-look.
///
/// Down on a button presses its direction on the latch. Up, or a drag
/// that leaves the button, releases it.
#[derive(Clone, Copy, Debug, Default)]
pub struct Pointer {
    hold: Option<Direction>,
    drag_from: Option<(u16, u16)>,
}

impl Pointer {
    pub fn scene_event(
        &mut self,
        kind: MouseEventKind,
        col: u16,
        row: u16,
        layout: &Layout,
        drawer_open: bool,
        latch: &mut DirectionLatch,
    ) -> PointerAction {
        match kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if drawer_open && layout.drawer.contains(col, row) {
                    return PointerAction::DrawerRow(row);
                }
                if layout.forward_btn.contains(col, row) {
                    self.hold_button(latch, Direction::Forward);
                } else if layout.back_btn.contains(col, row) {
                    self.hold_button(latch, Direction::Backward);
                } else {
                    self.drag_from = Some((col, row));
                }
                PointerAction::None
            }

            MouseEventKind::Drag(MouseButton::Left) => {
                if let Some(dir) = self.hold {
                    let btn = match dir {
                        Direction::Forward => layout.forward_btn,
                        _ => layout.back_btn,
                    };
                    if !btn.contains(col, row) {
                        latch.release(dir);
                        self.hold = None;
                    }
                    PointerAction::None
                } else if let Some((x0, y0)) = self.drag_from {
                    self.drag_from = Some((col, row));
                    PointerAction::Look { dx: col as i32 - x0 as i32, dy: row as i32 - y0 as i32 }
                } else {
                    PointerAction::None
                }
            }

            MouseEventKind::Up(MouseButton::Left) => {
                if let Some(dir) = self.hold.take() {
                    latch.release(dir);
                }
                self.drag_from = None;
                PointerAction::None
            }

            _ => PointerAction::None,
        }
    }

    fn hold_button(&mut self, latch: &mut DirectionLatch, dir: Direction) {
        latch.press(dir);
        self.hold = Some(dir);
    }
}
