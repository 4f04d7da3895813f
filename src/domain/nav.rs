/// Scene transition state machine.
///
/// Walking is modelled as `progress` in 0..1 inside the current scene.
/// Crossing 1.0 moves to the next scene, crossing 0.0 to the previous
/// one. Each crossing yields exactly one `TransitionRequest`.
///
/// ## Boundaries
///   - First scene, walking back: progress clamps at 0.0, no request.
///   - Last scene, walking forward: progress clamps at 1.0, no request.

/// Default walking pace in progress units per second.
pub const WALK_SPEED: f64 = 0.18;

/// Largest tick the caller should feed to `advance` (stall guard).
pub const MAX_TICK_DT: f64 = 0.05;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Direction {
    Backward,
    #[default]
    Idle,
    Forward,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Backward => -1.0,
            Direction::Idle => 0.0,
            Direction::Forward => 1.0,
        }
    }
}

/// A detected scene change, consumed once by the choreographer.
#[derive(Debug, PartialEq)]
pub struct TransitionRequest {
    pub from: usize,
    pub to: usize,
    pub use_fog: bool,
}

#[derive(Clone, Debug)]
pub struct NavigationState {
    scene_index: usize,
    progress: f64,
    direction: Direction,
    last_index: usize,
    speed: f64,
}

impl NavigationState {
    pub fn new(scene_count: usize, speed: f64) -> Self {
        NavigationState {
            scene_index: 0,
            progress: 0.0,
            direction: Direction::Idle,
            last_index: scene_count.saturating_sub(1),
            speed,
        }
    }

    pub fn scene_index(&self) -> usize { self.scene_index }
    pub fn progress(&self) -> f64 { self.progress }
    pub fn direction(&self) -> Direction { self.direction }

    pub fn set_direction(&mut self, dir: Direction) {
        self.direction = dir;
    }

    pub fn stop(&mut self) {
        self.direction = Direction::Idle;
    }

    /// Advance by one tick of `dt` seconds (already clamped by the caller).
    pub fn advance(&mut self, dt: f64) -> Option<TransitionRequest> {
        if self.direction == Direction::Idle || dt <= 0.0 {
            return None;
        }

        self.progress += self.direction.sign() * self.speed * dt;

        match self.direction {
            Direction::Forward if self.progress >= 1.0 => {
                if self.scene_index < self.last_index {
                    let from = self.scene_index;
                    self.scene_index += 1;
                    self.progress = 0.0;
                    return Some(TransitionRequest { from, to: self.scene_index, use_fog: true });
                }
                self.progress = 1.0;
            }
            Direction::Backward if self.progress <= 0.0 => {
                if self.scene_index > 0 {
                    let from = self.scene_index;
                    self.scene_index -= 1;
                    self.progress = 1.0;
                    return Some(TransitionRequest { from, to: self.scene_index, use_fog: true });
                }
                self.progress = 0.0;
            }
            _ => {}
        }
        None
    }

    /// Teleport to `target` (menu, digit shortcut, first entry).
    /// Always fogs, even for adjacent or identical targets.
    pub fn jump_to(&mut self, target: usize) -> TransitionRequest {
        let from = self.scene_index;
        self.scene_index = target.min(self.last_index);
        self.progress = 0.0;
        TransitionRequest { from, to: self.scene_index, use_fog: true }
    }
}

/// Meter shown for a scene: baseline plus a slow breathing swing.
pub fn meter_value(base: f32, t_secs: f64) -> f32 {
    base + ((t_secs * 1.2).sin() * 2.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 0.05;

    fn held(nav: &mut NavigationState, dir: Direction, ticks: usize) -> Vec<TransitionRequest> {
        nav.set_direction(dir);
        (0..ticks).filter_map(|_| nav.advance(DT)).collect()
    }

    /// Ticks of `DT` needed to cross one full scene.
    fn ticks_per_scene() -> usize {
        (1.0 / (WALK_SPEED * DT)).ceil() as usize
    }

    #[test]
    fn idle_never_moves() {
        let mut nav = NavigationState::new(3, WALK_SPEED);
        assert!(held(&mut nav, Direction::Idle, 500).is_empty());
        assert_eq!(nav.scene_index(), 0);
        assert_eq!(nav.progress(), 0.0);
    }

    #[test]
    fn zero_dt_is_idempotent() {
        let mut nav = NavigationState::new(3, WALK_SPEED);
        nav.jump_to(1); // progress 0.0 at index 1: backward would cross on any dt > 0
        nav.set_direction(Direction::Backward);
        for _ in 0..100 {
            assert!(nav.advance(0.0).is_none());
        }
        assert_eq!(nav.scene_index(), 1);
        assert_eq!(nav.progress(), 0.0);
    }

    #[test]
    fn progress_is_monotonic_between_transitions() {
        let mut nav = NavigationState::new(3, WALK_SPEED);
        nav.set_direction(Direction::Forward);
        let mut prev = nav.progress();
        for _ in 0..ticks_per_scene() - 1 {
            assert!(nav.advance(DT).is_none());
            assert!(nav.progress() > prev);
            prev = nav.progress();
        }

        let mut nav = NavigationState::new(3, WALK_SPEED);
        nav.jump_to(2);
        held(&mut nav, Direction::Forward, 10);
        nav.set_direction(Direction::Backward);
        let mut prev = nav.progress();
        for _ in 0..5 {
            assert!(nav.advance(DT).is_none());
            assert!(nav.progress() < prev);
            prev = nav.progress();
        }
    }

    #[test]
    fn hold_forward_one_scene_length() {
        // 3 scenes, start at 0, hold forward for 1/SPEED seconds.
        let mut nav = NavigationState::new(3, WALK_SPEED);
        let reqs = held(&mut nav, Direction::Forward, ticks_per_scene());
        assert_eq!(reqs, vec![TransitionRequest { from: 0, to: 1, use_fog: true }]);
        assert_eq!(nav.scene_index(), 1);
        assert_eq!(nav.progress(), 0.0);
    }

    #[test]
    fn backward_crossing_resets_to_one() {
        let mut nav = NavigationState::new(3, WALK_SPEED);
        nav.jump_to(2);
        let reqs = held(&mut nav, Direction::Backward, 1);
        assert_eq!(reqs, vec![TransitionRequest { from: 2, to: 1, use_fog: true }]);
        assert_eq!(nav.scene_index(), 1);
        assert_eq!(nav.progress(), 1.0);
    }

    #[test]
    fn first_scene_holds_and_clamps() {
        let mut nav = NavigationState::new(3, WALK_SPEED);
        assert!(held(&mut nav, Direction::Backward, 1000).is_empty());
        assert_eq!(nav.scene_index(), 0);
        assert_eq!(nav.progress(), 0.0);
        // Clamped, so walking forward resumes immediately.
        nav.set_direction(Direction::Forward);
        nav.advance(DT);
        assert!(nav.progress() > 0.0);
    }

    #[test]
    fn last_scene_holds_and_clamps() {
        let mut nav = NavigationState::new(3, WALK_SPEED);
        let reqs = held(&mut nav, Direction::Forward, ticks_per_scene() * 10);
        assert_eq!(reqs.len(), 2);
        assert_eq!(nav.scene_index(), 2);
        assert_eq!(nav.progress(), 1.0);
        nav.set_direction(Direction::Backward);
        nav.advance(DT);
        assert!(nav.progress() < 1.0);
    }

    #[test]
    fn forward_crossing_does_not_bounce_back() {
        let mut nav = NavigationState::new(3, WALK_SPEED);
        let reqs = held(&mut nav, Direction::Forward, ticks_per_scene());
        assert_eq!(reqs.len(), 1);
        assert_eq!(nav.scene_index(), 1);
    }

    #[test]
    fn each_crossing_yields_one_request() {
        let mut nav = NavigationState::new(5, WALK_SPEED);
        let reqs = held(&mut nav, Direction::Forward, ticks_per_scene() * 4);
        let pairs: Vec<(usize, usize)> = reqs.iter().map(|r| (r.from, r.to)).collect();
        assert_eq!(pairs, vec![(0, 1), (1, 2), (2, 3), (3, 4)]);
    }

    #[test]
    fn jump_lands_exactly_and_fogs() {
        let mut nav = NavigationState::new(3, WALK_SPEED);
        for target in 0..3 {
            let req = nav.jump_to(target);
            assert!(req.use_fog);
            assert_eq!(req.to, target);
            assert_eq!(nav.scene_index(), target);
            assert_eq!(nav.progress(), 0.0);
        }
        // Non-adjacent and same-scene jumps still fog.
        let req = nav.jump_to(0);
        assert_eq!((req.from, req.to, req.use_fog), (2, 0, true));
        let req = nav.jump_to(0);
        assert_eq!((req.from, req.to, req.use_fog), (0, 0, true));
    }

    #[test]
    fn jump_clamps_out_of_range() {
        let mut nav = NavigationState::new(3, WALK_SPEED);
        let req = nav.jump_to(42);
        assert_eq!(req.to, 2);
        assert_eq!(nav.scene_index(), 2);
    }

    #[test]
    fn single_scene_catalog_never_transitions() {
        let mut nav = NavigationState::new(1, WALK_SPEED);
        assert!(held(&mut nav, Direction::Forward, 500).is_empty());
        assert_eq!(nav.progress(), 1.0);
        assert!(held(&mut nav, Direction::Backward, 500).is_empty());
        assert_eq!(nav.progress(), 0.0);
    }

    #[test]
    fn meter_breathes_around_base() {
        for i in 0..100 {
            let m = meter_value(50.0, i as f64 * 0.37);
            assert!((48.0..=52.0).contains(&m));
        }
        assert_eq!(meter_value(50.0, 0.0), 50.0);
    }
}
