/// Events emitted during a step.
/// The presentation layer consumes these for sound and HUD messages.

#[derive(Clone, Debug, PartialEq)]
pub enum ExperienceEvent {
    PhaseChanged { to: super::world::Phase },
    SceneChanged { from: usize, to: usize },
    TransitionSuperseded { to: usize },
    FogShown,
    FogHidden,
    PanoramaApplied { index: usize },
    PanoramaLoadFailed { index: usize },
    VideoReady,
    VideoEnded,
    VideoUnavailable,
}
