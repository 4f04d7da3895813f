/// ExperienceState: the complete state of a running session.
///
/// One owned struct, passed by reference to step/renderer/input code.
/// There are no module-level globals.
///
/// ## Ownership
///   - `nav` is only mutated by the state machine calls in `step`.
///   - `choreo` owns the active panorama and the fog timer.
///   - `layout` is written by the renderer each frame so mouse input can
///     hit-test the on-screen buttons.

use std::f32::consts::FRAC_PI_2;
use std::time::{Duration, Instant};

use crate::config::{AppConfig, MotionConfig, VideoConfig};
use crate::domain::catalog::{Catalog, SceneDescriptor};
use crate::domain::nav::NavigationState;
use super::choreo::{Choreographer, PanoramaSource};
use super::video::{PlayRetry, VideoPlayer};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Home,
    Video,
    Scene,
}

/// Text and meter shown by the UI shell.
#[derive(Clone, Debug, PartialEq)]
pub struct Hud {
    pub title: String,
    pub status: String,
    pub text: String,
    pub meter_base: f32,
    pub meter: f32,
}

impl Hud {
    pub fn home() -> Self {
        Hud {
            title: "Giacomo Leopardi – Spazio di esperienza".into(),
            status: "Apertura".into(),
            text: "Non stai entrando in una biografia.\n\nStai entrando in una visione.".into(),
            meter_base: 55.0,
            meter: 55.0,
        }
    }

    pub fn show_scene(&mut self, scene: &SceneDescriptor) {
        self.title = scene.title.clone();
        self.status = scene.status_label.clone();
        self.text = scene.narrative_text.clone();
        self.meter_base = scene.meter_value;
        self.meter = scene.meter_value;
    }
}

/// Look direction over the panorama.
///
/// `yaw`/`pitch` are radians. `bob` is a small pitch offset while walking.
#[derive(Clone, Debug, Default)]
pub struct Look {
    pub yaw: f32,
    pub pitch: f32,
    pub bob: f32,
}

impl Look {
    /// Radians per terminal cell of mouse drag.
    pub const DRAG_SENS: f32 = 0.025;
    const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.05;

    pub fn drag(&mut self, dx_cells: i32, dy_cells: i32) {
        self.turn(-(dx_cells as f32) * Self::DRAG_SENS, -(dy_cells as f32) * Self::DRAG_SENS * 2.0);
    }

    pub fn turn(&mut self, d_yaw: f32, d_pitch: f32) {
        self.yaw = (self.yaw + d_yaw).rem_euclid(std::f32::consts::TAU);
        self.pitch = (self.pitch + d_pitch).clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT);
    }

    pub fn update_bob(&mut self, t_secs: f64, moving: bool) {
        self.bob = if moving { ((t_secs * 2.0).sin() * 0.03) as f32 } else { 0.0 };
    }
}

/// Screen rectangle in terminal cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
}

impl Rect {
    pub fn contains(&self, col: u16, row: u16) -> bool {
        col >= self.x && col < self.x.saturating_add(self.w)
            && row >= self.y && row < self.y.saturating_add(self.h)
    }
}

/// Hit areas published by the renderer.
#[derive(Clone, Copy, Debug, Default)]
pub struct Layout {
    pub portrait: Rect,
    pub forward_btn: Rect,
    pub back_btn: Rect,
    /// Empty while the drawer is closed.
    pub drawer: Rect,
}

#[derive(Clone, Debug, Default)]
pub struct Drawer {
    pub open: bool,
    pub cursor: usize,
}

pub struct ExperienceState {
    pub phase: Phase,
    pub catalog: Catalog,
    pub nav: NavigationState,
    pub hud: Hud,
    pub choreo: Choreographer,
    pub look: Look,
    pub drawer: Drawer,
    pub layout: Layout,

    // ── Video ──
    pub player: Option<Box<dyn VideoPlayer>>,
    pub play_retry: Option<PlayRetry>,
    pub video_cfg: VideoConfig,

    // ── Meta ──
    pub motion: MotionConfig,
    pub scene_started: bool,
    pub started_at: Instant,
    pub anim_tick: u32,

    // ── UI ──
    pub message: String,
    pub message_until: Option<Instant>,
}

impl ExperienceState {
    pub fn new(config: &AppConfig, source: Box<dyn PanoramaSource>, now: Instant) -> Self {
        let catalog = config.catalog.clone();
        ExperienceState {
            phase: Phase::Home,
            nav: NavigationState::new(catalog.len(), config.motion.speed),
            catalog,
            hud: Hud::home(),
            choreo: Choreographer::new(source, &config.transition),
            look: Look::default(),
            drawer: Drawer::default(),
            layout: Layout::default(),
            player: None,
            play_retry: None,
            video_cfg: config.video.clone(),
            motion: config.motion.clone(),
            scene_started: false,
            started_at: now,
            anim_tick: 0,
            message: String::new(),
            message_until: None,
        }
    }

    pub fn set_message(&mut self, msg: &str, duration: Duration, now: Instant) {
        self.message = msg.to_string();
        self.message_until = Some(now + duration);
    }

    /// Seconds since the session began (drives meter breathing and bob).
    pub fn clock(&self, now: Instant) -> f64 {
        now.saturating_duration_since(self.started_at).as_secs_f64()
    }
}
