/// The step function: advances the experience by one frame.
///
/// Processing order (Scene phase):
///   1. Walk: `nav.advance(dt)` with `dt` clamped to `max_tick_dt`
///   2. Threshold crossing → `choreo.execute`
///   3. `choreo.poll`: load completion, fog timer
///   4. Meter breathing, walking bob
///
/// The Video phase drives the play-retry poller and the player's events.
/// Phase changes (home, video, scene, jumps) are the other pub fns here;
/// `main` calls them from input handling.

use std::time::{Duration, Instant};

use crate::domain::nav::{meter_value, Direction};
use super::choreo::TransitionOutcome;
use super::event::ExperienceEvent;
use super::video::{PlayRetry, RetryStatus, TimedClip, VideoEvent};
use super::world::{ExperienceState, Hud, Phase};

const MESSAGE_TIME: Duration = Duration::from_millis(2500);

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(state: &mut ExperienceState, dt: f64, now: Instant) -> Vec<ExperienceEvent> {
    let mut events: Vec<ExperienceEvent> = Vec::new();
    state.anim_tick = state.anim_tick.wrapping_add(1);

    match state.phase {
        Phase::Home => {}
        Phase::Video => step_video(state, now, &mut events),
        Phase::Scene => step_scene(state, dt, now, &mut events),
    }

    // Transitions may still settle after leaving the scene layer.
    if state.phase != Phase::Scene {
        resolve_transition(state, now, &mut events);
    }

    if state.message_until.is_some_and(|t| now >= t) {
        state.message.clear();
        state.message_until = None;
    }

    events
}

fn step_scene(state: &mut ExperienceState, dt: f64, now: Instant, events: &mut Vec<ExperienceEvent>) {
    let dt = dt.clamp(0.0, state.motion.max_tick_dt);
    if let Some(request) = state.nav.advance(dt) {
        state.choreo.execute(request, &state.catalog, &mut state.hud, now, events);
    }

    resolve_transition(state, now, events);

    let t = state.clock(now);
    let moving = state.nav.direction() != Direction::Idle;
    if moving {
        state.hud.meter = meter_value(state.hud.meter_base, t);
    }
    state.look.update_bob(t, moving);
}

fn resolve_transition(state: &mut ExperienceState, now: Instant, events: &mut Vec<ExperienceEvent>) {
    if let Some(TransitionOutcome::Failed { to, error }) = state.choreo.poll(now, events) {
        let title = state.catalog.get(to).title.clone();
        state.set_message(&format!("{}: {}", title, error.short()), MESSAGE_TIME, now);
    }
}

fn step_video(state: &mut ExperienceState, now: Instant, events: &mut Vec<ExperienceEvent>) {
    let Some(player) = state.player.as_mut() else { return };

    if let Some(retry) = state.play_retry.as_mut() {
        match retry.poll(&mut **player, now) {
            RetryStatus::Waiting => {}
            RetryStatus::Started => state.play_retry = None,
            RetryStatus::GaveUp(err) => {
                log::error!("{err}; entering scenes without the video");
                state.play_retry = None;
                events.push(ExperienceEvent::VideoUnavailable);
                state.set_message("Video unavailable", MESSAGE_TIME, now);
                enter_scene(state, now, events);
                return;
            }
        }
    }

    while let Some(ev) = player.poll_event(now) {
        match ev {
            VideoEvent::Ready => {
                log::debug!("video {} ready", player.video_id());
                events.push(ExperienceEvent::VideoReady);
            }
            VideoEvent::Ended => {
                log::info!("video {} ended", player.video_id());
                events.push(ExperienceEvent::VideoEnded);
                enter_scene(state, now, events);
                return;
            }
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Phase changes
// ══════════════════════════════════════════════════════════════

/// Portrait selected: show the video layer and start playback.
pub fn start_video(state: &mut ExperienceState, now: Instant, events: &mut Vec<ExperienceEvent>) {
    if state.phase == Phase::Video {
        return;
    }
    set_phase(state, Phase::Video, events);
    if state.player.is_none() {
        state.player = Some(Box::new(TimedClip::new(&state.video_cfg, now)));
    }
    state.play_retry = Some(PlayRetry::new(&state.video_cfg, now));
}

/// Video ended or skipped: show the scene layer.
///
/// The first entry teleports to scene 0 with fog; later entries resume
/// wherever the visitor left off.
pub fn enter_scene(state: &mut ExperienceState, now: Instant, events: &mut Vec<ExperienceEvent>) {
    if state.phase == Phase::Scene {
        return;
    }
    if let Some(player) = state.player.as_mut() {
        player.stop();
    }
    state.play_retry = None;
    set_phase(state, Phase::Scene, events);

    if state.scene_started {
        let current = state.catalog.get(state.nav.scene_index());
        state.hud.show_scene(current);
        return;
    }
    state.scene_started = true;
    let request = state.nav.jump_to(0);
    state.choreo.execute(request, &state.catalog, &mut state.hud, now, events);
}

/// Back to the portrait. Motion stops; the scene position is kept.
pub fn go_home(state: &mut ExperienceState, events: &mut Vec<ExperienceEvent>) {
    state.nav.stop();
    state.drawer.open = false;
    if let Some(player) = state.player.as_mut() {
        player.stop();
    }
    state.play_retry = None;
    state.hud = Hud::home();
    set_phase(state, Phase::Home, events);
}

/// Menu / digit shortcut: teleport to a scene with fog.
pub fn jump_to_scene(state: &mut ExperienceState, index: usize, now: Instant, events: &mut Vec<ExperienceEvent>) {
    if state.phase != Phase::Scene {
        return;
    }
    state.drawer.open = false;
    let request = state.nav.jump_to(index);
    state.choreo.execute(request, &state.catalog, &mut state.hud, now, events);
}

pub fn toggle_drawer(state: &mut ExperienceState) {
    state.drawer.open = !state.drawer.open;
    if state.drawer.open {
        state.drawer.cursor = state.nav.scene_index();
    }
}

pub fn move_drawer_cursor(state: &mut ExperienceState, delta: i32) {
    let last = state.catalog.last_index() as i64;
    let next = (state.drawer.cursor as i64 + delta as i64).clamp(0, last);
    state.drawer.cursor = next as usize;
}

fn set_phase(state: &mut ExperienceState, phase: Phase, events: &mut Vec<ExperienceEvent>) {
    log::info!("phase {:?} -> {:?}", state.phase, phase);
    state.phase = phase;
    state.anim_tick = 0;
    events.push(ExperienceEvent::PhaseChanged { to: phase });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::domain::nav::WALK_SPEED;
    use crate::sim::choreo::tests::ManualSource;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn setup() -> (ExperienceState, ManualSource, Instant) {
        let src = ManualSource::default();
        let t0 = Instant::now();
        let state = ExperienceState::new(&AppConfig::default(), Box::new(src.clone()), t0);
        (state, src, t0)
    }

    /// Enter the scene layer and let the first panorama load.
    fn in_scene(state: &mut ExperienceState, src: &ManualSource, t0: Instant) -> Vec<ExperienceEvent> {
        let mut ev = vec![];
        enter_scene(state, t0, &mut ev);
        src.succeed_next();
        ev.extend(step(state, 0.0, t0 + ms(10)));
        ev
    }

    /// Hold `dir` for `ticks` ticks of 50ms.
    fn walk(state: &mut ExperienceState, dir: Direction, from: Instant, ticks: usize) -> (Vec<ExperienceEvent>, Instant) {
        state.nav.set_direction(dir);
        let mut ev = vec![];
        let mut t = from;
        for _ in 0..ticks {
            t += ms(50);
            ev.extend(step(state, 0.05, t));
        }
        (ev, t)
    }

    fn ticks_per_scene() -> usize {
        (1.0 / (WALK_SPEED * 0.05)).ceil() as usize
    }

    #[test]
    fn first_entry_fogs_into_scene_zero() {
        let (mut state, src, t0) = setup();
        let ev = in_scene(&mut state, &src, t0);
        assert_eq!(state.phase, Phase::Scene);
        assert!(ev.contains(&ExperienceEvent::FogShown));
        assert!(ev.contains(&ExperienceEvent::SceneChanged { from: 0, to: 0 }));
        assert!(ev.contains(&ExperienceEvent::PanoramaApplied { index: 0 }));
        assert_eq!(state.hud.title, state.catalog.get(0).title);
    }

    #[test]
    fn walking_forward_crosses_into_next_scene() {
        let (mut state, src, t0) = setup();
        in_scene(&mut state, &src, t0);
        let (ev, _) = walk(&mut state, Direction::Forward, t0 + ms(10), ticks_per_scene());
        let changes: Vec<_> = ev.iter()
            .filter(|e| matches!(e, ExperienceEvent::SceneChanged { .. }))
            .collect();
        assert_eq!(changes, vec![&ExperienceEvent::SceneChanged { from: 0, to: 1 }]);
        assert_eq!(state.nav.scene_index(), 1);
        assert_eq!(state.nav.progress(), 0.0);
        assert_eq!(state.hud.title, state.catalog.get(1).title);
    }

    #[test]
    fn large_dt_is_clamped() {
        let (mut state, src, t0) = setup();
        in_scene(&mut state, &src, t0);
        state.nav.set_direction(Direction::Forward);
        step(&mut state, 30.0, t0 + ms(100));
        assert!((state.nav.progress() - WALK_SPEED * 0.05).abs() < 1e-9);
        assert_eq!(state.nav.scene_index(), 0);
    }

    #[test]
    fn load_failure_on_third_scene_keeps_second_panorama() {
        let (mut state, src, t0) = setup();
        in_scene(&mut state, &src, t0);

        let (_, t) = walk(&mut state, Direction::Forward, t0 + ms(10), ticks_per_scene());
        src.succeed_next(); // scene 1 loads
        let (ev_a, t) = walk(&mut state, Direction::Forward, t, ticks_per_scene());
        assert_eq!(state.nav.scene_index(), 2);
        src.fail_next(); // scene 2 fails
        let (ev_b, _) = walk(&mut state, Direction::Idle, t, 3);

        assert_eq!(state.hud.title, state.catalog.get(2).title);
        assert_eq!(state.hud.text, state.catalog.get(2).narrative_text);
        let active = state.choreo.active().map(|p| p.image_ref.clone());
        assert_eq!(active, Some(state.catalog.get(1).image_ref.clone()));

        let failures = ev_a.iter().chain(ev_b.iter())
            .filter(|e| matches!(e, ExperienceEvent::PanoramaLoadFailed { index: 2 }))
            .count();
        assert_eq!(failures, 1);
        assert!(state.message.contains(&state.catalog.get(2).title));
    }

    #[test]
    fn meter_breathes_only_while_walking() {
        let (mut state, src, t0) = setup();
        in_scene(&mut state, &src, t0);
        let base = state.hud.meter_base;
        walk(&mut state, Direction::Idle, t0 + ms(10), 20);
        assert_eq!(state.hud.meter, base);
        walk(&mut state, Direction::Forward, t0 + ms(1010), 5);
        assert!((state.hud.meter - base).abs() <= 2.0);
        assert!(state.hud.meter != base);
    }

    #[test]
    fn video_end_enters_scene() {
        let (mut state, _src, t0) = setup();
        let mut ev = vec![];
        start_video(&mut state, t0, &mut ev);
        assert_eq!(state.phase, Phase::Video);

        // Warm-up 600ms, retry every 120ms, clip 10s.
        let mut t = t0;
        let mut all = vec![];
        while state.phase == Phase::Video && t < t0 + Duration::from_secs(20) {
            t += ms(60);
            all.extend(step(&mut state, 0.05, t));
        }
        assert_eq!(state.phase, Phase::Scene);
        assert!(all.contains(&ExperienceEvent::VideoReady));
        assert!(all.contains(&ExperienceEvent::VideoEnded));
        assert!(t >= t0 + Duration::from_secs(10));
    }

    #[test]
    fn unavailable_player_falls_through_to_scene() {
        let (mut state, _src, t0) = setup();
        state.video_cfg.warmup = Duration::from_secs(3600);
        state.video_cfg.max_play_attempts = 3;
        let mut ev = vec![];
        start_video(&mut state, t0, &mut ev);
        let mut t = t0;
        let mut all = vec![];
        for _ in 0..10 {
            all.extend(step(&mut state, 0.05, t));
            t += ms(120);
        }
        assert_eq!(state.phase, Phase::Scene);
        assert!(all.contains(&ExperienceEvent::VideoUnavailable));
    }

    #[test]
    fn reentering_scene_resumes_current() {
        let (mut state, src, t0) = setup();
        in_scene(&mut state, &src, t0);
        let mut ev = vec![];
        jump_to_scene(&mut state, 2, t0 + ms(20), &mut ev);
        src.succeed_next();
        step(&mut state, 0.0, t0 + ms(30));

        go_home(&mut state, &mut ev);
        assert_eq!(state.phase, Phase::Home);
        assert_eq!(state.hud, Hud::home());

        start_video(&mut state, t0 + ms(40), &mut ev);
        enter_scene(&mut state, t0 + ms(50), &mut ev);
        assert_eq!(state.nav.scene_index(), 2);
        assert_eq!(state.hud.title, state.catalog.get(2).title);
        assert!(!state.choreo.is_busy());
    }

    #[test]
    fn going_home_stops_motion() {
        let (mut state, src, t0) = setup();
        in_scene(&mut state, &src, t0);
        state.nav.set_direction(Direction::Forward);
        let mut ev = vec![];
        go_home(&mut state, &mut ev);
        assert_eq!(state.nav.direction(), Direction::Idle);
    }

    #[test]
    fn drawer_jump_closes_drawer() {
        let (mut state, src, t0) = setup();
        in_scene(&mut state, &src, t0);
        toggle_drawer(&mut state);
        assert!(state.drawer.open);
        move_drawer_cursor(&mut state, 5);
        assert_eq!(state.drawer.cursor, 2);
        move_drawer_cursor(&mut state, -9);
        assert_eq!(state.drawer.cursor, 0);

        let mut ev = vec![];
        jump_to_scene(&mut state, 1, t0 + ms(20), &mut ev);
        assert!(!state.drawer.open);
        assert_eq!(state.nav.scene_index(), 1);
        assert!(ev.contains(&ExperienceEvent::SceneChanged { from: 0, to: 1 }));
    }

    #[test]
    fn jumps_are_ignored_outside_scene() {
        let (mut state, _src, t0) = setup();
        let mut ev = vec![];
        jump_to_scene(&mut state, 2, t0, &mut ev);
        assert_eq!(state.nav.scene_index(), 0);
        assert!(ev.is_empty());
    }
}
