/// Error kinds surfaced by the collaborators around the scene core.
///
/// None of these end the session: a failed panorama keeps the previous
/// image on screen, an unavailable player falls through to the scenes.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Panorama fetch/decode failure. The active panorama is left untouched.
#[derive(Debug, Error)]
pub enum PanoramaLoadError {
    #[error("cannot open panorama {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode panorama {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("panorama {image_ref} did not load within {}ms", .after.as_millis())]
    TimedOut { image_ref: String, after: Duration },

    #[error("panorama loader for {image_ref} exited without a result")]
    WorkerGone { image_ref: String },
}

impl PanoramaLoadError {
    /// Short label for the HUD message line.
    pub fn short(&self) -> &'static str {
        match self {
            PanoramaLoadError::Open { .. } => "panorama missing",
            PanoramaLoadError::Decode { .. } => "panorama unreadable",
            PanoramaLoadError::TimedOut { .. } => "panorama load timed out",
            PanoramaLoadError::WorkerGone { .. } => "panorama loader failed",
        }
    }
}

/// The video collaborator was not ready when `play` was called.
#[derive(Debug, Error)]
pub enum PlayerUnavailableError {
    #[error("video player not ready (attempt {attempts})")]
    NotReady { attempts: u32 },
}
