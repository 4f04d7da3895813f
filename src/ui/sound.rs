/// Sound engine: procedural ambient wind via rodio.
///
/// A 2-second buffer of low-passed white noise is generated at init and
/// looped forever, faded in slowly when the scenes start.
///
/// Compile with `--no-default-features` or without "sound" feature
/// to disable audio entirely (the stub SoundEngine does nothing).

#[cfg(feature = "sound")]
mod inner {
    use std::time::Duration;

    use rodio::buffer::SamplesBuffer;
    use rodio::{OutputStream, OutputStreamHandle, Sink, Source};

    const SAMPLE_RATE: u32 = 22050;
    const AMBIENT_GAIN: f32 = 0.06;
    const FADE_IN: Duration = Duration::from_millis(2200);
    const LOWPASS_HZ: f32 = 720.0;

    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        wind: Vec<f32>,
        ambient: Option<Sink>,
    }

    impl SoundEngine {
        pub fn new() -> Option<Self> {
            let (stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    log::warn!("audio output unavailable: {e}");
                    return None;
                }
            };
            Some(SoundEngine {
                _stream: stream,
                handle,
                wind: gen_wind(),
                ambient: None,
            })
        }

        /// Start (or resume) the ambient bed. Idempotent.
        pub fn start_ambient(&mut self) {
            if let Some(sink) = &self.ambient {
                sink.play();
                return;
            }
            match Sink::try_new(&self.handle) {
                Ok(sink) => {
                    let src = SamplesBuffer::new(1, SAMPLE_RATE, self.wind.clone())
                        .repeat_infinite()
                        .amplify(AMBIENT_GAIN)
                        .fade_in(FADE_IN);
                    sink.append(src);
                    self.ambient = Some(sink);
                }
                Err(e) => log::warn!("ambient sound not started: {e}"),
            }
        }

        pub fn pause_ambient(&mut self) {
            if let Some(sink) = &self.ambient {
                sink.pause();
            }
        }
    }

    /// White noise through a one-pole low-pass, 2 seconds long.
    fn gen_wind() -> Vec<f32> {
        let n = SAMPLE_RATE as usize * 2;
        let dt = 1.0 / SAMPLE_RATE as f32;
        let rc = 1.0 / (2.0 * std::f32::consts::PI * LOWPASS_HZ);
        let alpha = dt / (rc + dt);

        let mut rng: u32 = 0x5eed_1234;
        let mut y = 0.0_f32;
        (0..n)
            .map(|_| {
                rng = rng.wrapping_mul(1103515245).wrapping_add(12345);
                let noise = ((rng >> 8) as f32 / (1u32 << 24) as f32) * 2.0 - 1.0;
                y += alpha * (noise * 0.35 - y);
                y
            })
            .collect()
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn wind_is_two_seconds_and_quiet() {
            let w = gen_wind();
            assert_eq!(w.len(), SAMPLE_RATE as usize * 2);
            assert!(w.iter().all(|s| s.abs() <= 0.35));
            assert!(w.iter().any(|s| *s != 0.0));
        }
    }
}

// ════════════════════════════════════════════════════════════
//  Public API — compiles to no-ops when sound feature is off
// ════════════════════════════════════════════════════════════

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> { Some(SoundEngine) }
    pub fn start_ambient(&mut self) {}
    pub fn pause_ambient(&mut self) {}
}
