/// Transition choreographer: fog-in → metadata → async panorama load → fog-out.
///
/// Only one transition is ever in flight. A new request supersedes the
/// current one (cancel-and-replace): the old load's receiver is dropped so
/// its result can never land, and the fog-out timer is re-armed from the
/// new fog-in instead of racing a second timer.
///
/// ## Timing
///   - fog-in happens inside `execute`, synchronously.
///   - fog-out fires `dwell` after the load settles, so the panorama swap
///     always happens under full fog. A load always settles: success,
///     failure, or `load_timeout`.
///   - `poll(now)` must be called once per tick; it is the only place a
///     load completes.

use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

use image::RgbImage;

use crate::config::TransitionConfig;
use crate::domain::catalog::Catalog;
use crate::domain::nav::TransitionRequest;
use crate::error::PanoramaLoadError;
use super::event::ExperienceEvent;
use super::world::Hud;

/// A decoded equirectangular panorama.
#[derive(Clone, Debug)]
pub struct Panorama {
    pub image_ref: String,
    pub pixels: RgbImage,
}

pub type LoadResult = Result<Panorama, PanoramaLoadError>;

/// Renderer-side loader. `request` must not block: the result is
/// delivered later on the returned channel.
pub trait PanoramaSource {
    fn request(&mut self, image_ref: &str) -> Receiver<LoadResult>;
}

/// How a transition's load ended.
#[derive(Debug)]
pub enum TransitionOutcome {
    Applied { to: usize },
    Failed { to: usize, error: PanoramaLoadError },
}

struct InFlight {
    generation: u64,
    to: usize,
    image_ref: String,
    started: Instant,
    rx: Receiver<LoadResult>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Fog {
    Hidden,
    Shown { since: Instant, release_at: Instant },
    Fading { since: Instant },
}

pub struct Choreographer {
    source: Box<dyn PanoramaSource>,
    dwell: Duration,
    fade: Duration,
    load_timeout: Duration,
    fog: Fog,
    in_flight: Option<InFlight>,
    active: Option<Panorama>,
    generation: u64,
}

impl Choreographer {
    pub fn new(source: Box<dyn PanoramaSource>, cfg: &TransitionConfig) -> Self {
        Choreographer {
            source,
            dwell: cfg.fog_dwell,
            fade: cfg.fog_fade,
            load_timeout: cfg.load_timeout,
            fog: Fog::Hidden,
            in_flight: None,
            active: None,
            generation: 0,
        }
    }

    /// Start a transition. Consumes the request.
    pub fn execute(
        &mut self,
        request: TransitionRequest,
        catalog: &Catalog,
        hud: &mut Hud,
        now: Instant,
        events: &mut Vec<ExperienceEvent>,
    ) {
        let target = catalog.get(request.to);

        if let Some(old) = self.in_flight.take() {
            log::debug!(
                "transition #{} to scene {} superseded by #{}",
                old.generation, old.to, self.generation + 1
            );
            events.push(ExperienceEvent::TransitionSuperseded { to: old.to });
        }

        if request.use_fog {
            let since = match self.fog {
                Fog::Shown { since, .. } => since,
                _ => {
                    events.push(ExperienceEvent::FogShown);
                    now
                }
            };
            self.fog = Fog::Shown { since, release_at: now + self.dwell };
        }

        hud.show_scene(target);
        events.push(ExperienceEvent::SceneChanged { from: request.from, to: request.to });

        self.generation += 1;
        log::debug!(
            "transition #{}: scene {} -> {} ({}), fog={}",
            self.generation, request.from, request.to, target.image_ref, request.use_fog
        );
        let rx = self.source.request(&target.image_ref);
        self.in_flight = Some(InFlight {
            generation: self.generation,
            to: request.to,
            image_ref: target.image_ref.clone(),
            started: now,
            rx,
        });
    }

    /// Drive the in-flight load and the fog timer. Returns the outcome on
    /// the tick the load settles.
    pub fn poll(&mut self, now: Instant, events: &mut Vec<ExperienceEvent>) -> Option<TransitionOutcome> {
        let outcome = self.poll_load(now);

        match &outcome {
            Some(TransitionOutcome::Applied { to }) => {
                events.push(ExperienceEvent::PanoramaApplied { index: *to });
            }
            Some(TransitionOutcome::Failed { to, error }) => {
                log::warn!("scene {to}: {error}; keeping previous panorama");
                events.push(ExperienceEvent::PanoramaLoadFailed { index: *to });
            }
            None => {}
        }
        if outcome.is_some() {
            self.arm_fog_out(now);
        }

        self.poll_fog(now, events);
        outcome
    }

    fn poll_load(&mut self, now: Instant) -> Option<TransitionOutcome> {
        let flight = self.in_flight.as_ref()?;
        let settled = match flight.rx.try_recv() {
            Ok(Ok(pano)) => Ok(pano),
            Ok(Err(e)) => Err(e),
            Err(TryRecvError::Disconnected) => Err(PanoramaLoadError::WorkerGone {
                image_ref: flight.image_ref.clone(),
            }),
            Err(TryRecvError::Empty) => {
                if now.saturating_duration_since(flight.started) < self.load_timeout {
                    return None;
                }
                Err(PanoramaLoadError::TimedOut {
                    image_ref: flight.image_ref.clone(),
                    after: self.load_timeout,
                })
            }
        };

        let flight = self.in_flight.take()?;
        match settled {
            Ok(pano) => {
                log::debug!("transition #{}: panorama {} applied", flight.generation, pano.image_ref);
                self.active = Some(pano);
                Some(TransitionOutcome::Applied { to: flight.to })
            }
            Err(error) => Some(TransitionOutcome::Failed { to: flight.to, error }),
        }
    }

    /// Hold the fog for one dwell from `settled`.
    fn arm_fog_out(&mut self, settled: Instant) {
        if let Fog::Shown { since, .. } = self.fog {
            self.fog = Fog::Shown { since, release_at: settled + self.dwell };
        }
    }

    fn poll_fog(&mut self, now: Instant, events: &mut Vec<ExperienceEvent>) {
        match self.fog {
            Fog::Shown { release_at, .. } if now >= release_at && self.in_flight.is_none() => {
                self.fog = Fog::Fading { since: now };
                events.push(ExperienceEvent::FogHidden);
            }
            Fog::Fading { since } if now.saturating_duration_since(since) >= self.fade => {
                self.fog = Fog::Hidden;
            }
            _ => {}
        }
    }

    /// Fog opacity 0..=1 for the renderer (short ramps at both ends).
    pub fn fog_level(&self, now: Instant) -> f32 {
        match self.fog {
            Fog::Hidden => 0.0,
            Fog::Shown { since, .. } => ramp(now.saturating_duration_since(since), self.fade),
            Fog::Fading { since } => 1.0 - ramp(now.saturating_duration_since(since), self.fade),
        }
    }

    /// True from fog-in until fog-out is triggered.
    pub fn fog_visible(&self) -> bool {
        matches!(self.fog, Fog::Shown { .. })
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn active(&self) -> Option<&Panorama> {
        self.active.as_ref()
    }
}

fn ramp(elapsed: Duration, fade: Duration) -> f32 {
    if fade.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f32() / fade.as_secs_f32()).min(1.0)
}
