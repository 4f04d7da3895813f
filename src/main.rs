/// Entry point and frame loop.

mod config;
mod domain;
mod error;
mod sim;
mod ui;

use std::fs::OpenOptions;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, MouseButton, MouseEventKind};

use config::AppConfig;
use sim::event::ExperienceEvent;
use sim::step;
use sim::world::{ExperienceState, Phase};
use ui::gamepad::GamepadState;
use ui::input::{DirectionLatch, HoldEdges, InputState, Pointer, PointerAction};
use ui::panorama::FilePanoramaSource;
use ui::renderer::{Renderer, DRAWER_FIRST_ROW};
use ui::sound::SoundEngine;

/// Look speed for the keyboard look keys, radians per second.
const LOOK_RATE: f32 = 1.2;
const NOTICE_TIME: Duration = Duration::from_millis(1500);

fn main() {
    let config = AppConfig::load();
    init_logging(&config);
    log::info!(
        "panowalk starting: {} scenes, assets in {}",
        config.catalog.len(),
        config.assets_dir.display()
    );

    let now = Instant::now();
    let source = FilePanoramaSource::new(config.assets_dir.clone());
    let mut state = ExperienceState::new(&config, Box::new(source), now);

    let mut renderer = Renderer::new();
    let honor_release = match renderer.init() {
        Ok(enhanced) => enhanced,
        Err(e) => {
            eprintln!("Terminal init failed: {e}");
            return;
        }
    };

    let mut sound = SoundEngine::new();

    let result = frame_loop(&mut state, &mut renderer, sound.as_mut(), &config, honor_release);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }

    if let Err(e) = result {
        log::error!("session aborted: {e}");
        eprintln!("Error: {e}");
    }
    log::info!("panowalk exiting");
}

/// Log to the configured file; the terminal belongs to the renderer.
/// `RUST_LOG` overrides the configured level.
fn init_logging(config: &AppConfig) {
    let file = match OpenOptions::new().create(true).append(true).open(&config.log_file) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: cannot open log file {}: {e}", config.log_file.display());
            return;
        }
    };
    let env = env_logger::Env::default().default_filter_or(config.log_level.as_str());
    let result = env_logger::Builder::from_env(env)
        .target(env_logger::Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init();
    if let Err(e) = result {
        eprintln!("Warning: logger init failed: {e}");
    }
}

fn frame_loop(
    state: &mut ExperienceState,
    renderer: &mut Renderer,
    mut sound: Option<&mut SoundEngine>,
    config: &AppConfig,
    honor_release: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut kb = InputState::new();
    kb.honor_release = honor_release;
    let mut gp = GamepadState::new();
    gp.load_button_config(&config.gamepad);
    if gp.connected {
        log::info!("gamepad detected");
    }

    let mut latch = DirectionLatch::default();
    let mut key_edges = HoldEdges::default();
    let mut pad_edges = HoldEdges::default();
    let mut pointer = Pointer::default();

    let mut last_frame = Instant::now();

    loop {
        kb.drain_events();
        gp.update();

        let now = Instant::now();
        let dt = now.saturating_duration_since(last_frame).as_secs_f64();
        last_frame = now;

        if kb.ctrl_c_pressed() {
            break;
        }

        let mut events = Vec::new();
        if handle_meta(state, &kb, &gp, now, &mut events) {
            break;
        }
        handle_pointer(state, &kb, &mut latch, &mut pointer, now, &mut events);

        if state.phase == Phase::Scene {
            key_edges.feed(&mut latch, kb.any_held(KEYS_FORWARD), kb.any_held(KEYS_BACK));
            pad_edges.feed(&mut latch, gp.forward_held(), gp.back_held());
            state.nav.set_direction(latch.direction());
            look_keys(state, &kb, dt as f32);
        } else {
            latch.clear();
            key_edges = HoldEdges::default();
            pad_edges = HoldEdges::default();
            pointer = Pointer::default();
        }

        events.extend(step::step(state, dt, now));
        process_sound_events(sound.as_deref_mut(), &events);

        renderer.render(state, now)?;
        std::thread::sleep(state.motion.frame);
    }

    Ok(())
}

fn process_sound_events(sound: Option<&mut SoundEngine>, events: &[ExperienceEvent]) {
    let Some(sfx) = sound else { return };
    for event in events {
        match event {
            ExperienceEvent::PhaseChanged { to: Phase::Scene } => sfx.start_ambient(),
            ExperienceEvent::PhaseChanged { to: Phase::Home } => sfx.pause_ambient(),
            _ => {}
        }
    }
}

// ── Key Constants ──

const KEYS_FORWARD: &[KeyCode] = &[KeyCode::Right];
const KEYS_BACK: &[KeyCode] = &[KeyCode::Left];
const KEYS_LOOK_LEFT: &[KeyCode] = &[KeyCode::Char('a'), KeyCode::Char('A')];
const KEYS_LOOK_RIGHT: &[KeyCode] = &[KeyCode::Char('d'), KeyCode::Char('D')];
const KEYS_LOOK_UP: &[KeyCode] = &[KeyCode::Char('w'), KeyCode::Char('W')];
const KEYS_LOOK_DOWN: &[KeyCode] = &[KeyCode::Char('x'), KeyCode::Char('X')];
const KEYS_CONFIRM: &[KeyCode] = &[KeyCode::Enter, KeyCode::Char(' ')];
const KEYS_MENU: &[KeyCode] = &[KeyCode::Tab, KeyCode::Char('m'), KeyCode::Char('M')];
const KEYS_HOME: &[KeyCode] = &[KeyCode::Char('h'), KeyCode::Char('H')];
const KEYS_SKIP: &[KeyCode] = &[KeyCode::Char('s'), KeyCode::Char('S')];
const KEYS_QUIT: &[KeyCode] = &[KeyCode::Char('q'), KeyCode::Char('Q')];

fn look_keys(state: &mut ExperienceState, kb: &InputState, dt: f32) {
    let axis = |neg: &[KeyCode], pos: &[KeyCode]| {
        (kb.any_held(pos) as i32 - kb.any_held(neg) as i32) as f32
    };
    let yaw = axis(KEYS_LOOK_RIGHT, KEYS_LOOK_LEFT);
    let pitch = axis(KEYS_LOOK_DOWN, KEYS_LOOK_UP);
    if yaw != 0.0 || pitch != 0.0 {
        state.look.turn(yaw * LOOK_RATE * dt, pitch * LOOK_RATE * dt);
    }
}

/// Digit key 1..9 as a scene id.
fn digit_pressed(kb: &InputState) -> Option<u32> {
    ('1'..='9').find(|c| kb.was_pressed(KeyCode::Char(*c))).and_then(|c| c.to_digit(10))
}

/// Phase-level keys. Returns true to quit.
fn handle_meta(
    state: &mut ExperienceState,
    kb: &InputState,
    gp: &GamepadState,
    now: Instant,
    events: &mut Vec<ExperienceEvent>,
) -> bool {
    let confirm = kb.any_pressed(KEYS_CONFIRM) || gp.confirm_pressed();
    let esc = kb.any_pressed(&[KeyCode::Esc]);

    if kb.any_pressed(KEYS_QUIT) {
        return true;
    }

    match state.phase {
        Phase::Home => {
            if confirm {
                step::start_video(state, now, events);
            } else if esc {
                return true;
            }
        }

        Phase::Video => {
            if kb.any_pressed(KEYS_SKIP) || gp.skip_pressed() {
                log::info!("video skipped");
                step::enter_scene(state, now, events);
            } else if kb.any_pressed(KEYS_HOME) || gp.home_pressed() {
                step::go_home(state, events);
            } else if esc {
                return true;
            }
        }

        Phase::Scene => {
            if kb.any_pressed(KEYS_MENU) || gp.menu_pressed() {
                step::toggle_drawer(state);
            } else if kb.any_pressed(KEYS_HOME) || gp.home_pressed() {
                step::go_home(state, events);
            } else if let Some(id) = digit_pressed(kb) {
                match state.catalog.index_of_id(id) {
                    Some(index) => step::jump_to_scene(state, index, now, events),
                    None => state.set_message(&format!("No scene {id}"), NOTICE_TIME, now),
                }
            } else if state.drawer.open {
                if kb.any_pressed(&[KeyCode::Up]) || gp.up_pressed() {
                    step::move_drawer_cursor(state, -1);
                } else if kb.any_pressed(&[KeyCode::Down]) || gp.down_pressed() {
                    step::move_drawer_cursor(state, 1);
                } else if confirm {
                    let target = state.drawer.cursor;
                    step::jump_to_scene(state, target, now, events);
                } else if esc {
                    state.drawer.open = false;
                }
            } else if esc {
                return true;
            }
        }
    }

    false
}

/// Mouse: portrait click, on-screen hold buttons, drawer clicks and
/// drag-to-look.
fn handle_pointer(
    state: &mut ExperienceState,
    kb: &InputState,
    latch: &mut DirectionLatch,
    pointer: &mut Pointer,
    now: Instant,
    events: &mut Vec<ExperienceEvent>,
) {
    for m in &kb.mouse_events {
        let (col, row) = (m.column, m.row);
        match (state.phase, m.kind) {
            (Phase::Home, MouseEventKind::Down(MouseButton::Left)) => {
                if state.layout.portrait.contains(col, row) {
                    step::start_video(state, now, events);
                }
            }

            (Phase::Scene, kind) => {
                let layout = state.layout;
                match pointer.scene_event(kind, col, row, &layout, state.drawer.open, latch) {
                    PointerAction::DrawerRow(r) => {
                        if let Some(i) = r.checked_sub(DRAWER_FIRST_ROW) {
                            if (i as usize) < state.catalog.len() {
                                step::jump_to_scene(state, i as usize, now, events);
                            }
                        }
                    }
                    PointerAction::Look { dx, dy } => state.look.drag(dx, dy),
                    PointerAction::None => {}
                }
            }

            _ => {}
        }
    }
}
