/// Video collaborator: the clip shown between the portrait and the scenes.
///
/// The core only knows two events (ready, ended) and two calls (play, stop).
/// `TimedClip` is the built-in player: it becomes ready after a short
/// warm-up and ends after its configured duration.

use std::time::{Duration, Instant};

use crate::config::VideoConfig;
use crate::error::PlayerUnavailableError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VideoEvent {
    Ready,
    Ended,
}

pub trait VideoPlayer {
    fn video_id(&self) -> &str;
    fn is_ready(&self, now: Instant) -> bool;
    /// Start playback. Returns false if the player is not ready yet.
    fn play(&mut self, now: Instant) -> bool;
    fn stop(&mut self);
    fn poll_event(&mut self, now: Instant) -> Option<VideoEvent>;
    /// (elapsed, total) while playing.
    fn progress(&self, now: Instant) -> Option<(Duration, Duration)>;
}

pub struct TimedClip {
    video_id: String,
    ready_at: Instant,
    duration: Duration,
    started: Option<Instant>,
    ready_sent: bool,
    ended_sent: bool,
}

impl TimedClip {
    pub fn new(cfg: &VideoConfig, now: Instant) -> Self {
        TimedClip {
            video_id: cfg.video_id.clone(),
            ready_at: now + cfg.warmup,
            duration: cfg.duration,
            started: None,
            ready_sent: false,
            ended_sent: false,
        }
    }
}

impl VideoPlayer for TimedClip {
    fn video_id(&self) -> &str {
        &self.video_id
    }

    fn is_ready(&self, now: Instant) -> bool {
        now >= self.ready_at
    }

    fn play(&mut self, now: Instant) -> bool {
        if !self.is_ready(now) {
            return false;
        }
        self.started = Some(now);
        self.ended_sent = false;
        true
    }

    fn stop(&mut self) {
        self.started = None;
    }

    fn poll_event(&mut self, now: Instant) -> Option<VideoEvent> {
        if !self.ready_sent && self.is_ready(now) {
            self.ready_sent = true;
            return Some(VideoEvent::Ready);
        }
        let started = self.started?;
        if !self.ended_sent && now.saturating_duration_since(started) >= self.duration {
            self.ended_sent = true;
            return Some(VideoEvent::Ended);
        }
        None
    }

    fn progress(&self, now: Instant) -> Option<(Duration, Duration)> {
        let started = self.started?;
        let elapsed = now.saturating_duration_since(started).min(self.duration);
        Some((elapsed, self.duration))
    }
}

#[derive(Debug)]
pub enum RetryStatus {
    Waiting,
    Started,
    GaveUp(PlayerUnavailableError),
}

/// Calls `play` until the player accepts it, with a fixed interval and a
/// bounded number of attempts.
pub struct PlayRetry {
    interval: Duration,
    max_attempts: u32,
    attempts: u32,
    next_at: Instant,
}

impl PlayRetry {
    pub fn new(cfg: &VideoConfig, now: Instant) -> Self {
        PlayRetry {
            interval: cfg.retry_interval,
            max_attempts: cfg.max_play_attempts,
            attempts: 0,
            next_at: now,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn poll(&mut self, player: &mut dyn VideoPlayer, now: Instant) -> RetryStatus {
        if now < self.next_at {
            return RetryStatus::Waiting;
        }
        self.attempts += 1;
        if player.play(now) {
            log::info!("video {} playing (attempt {})", player.video_id(), self.attempts);
            return RetryStatus::Started;
        }
        let err = PlayerUnavailableError::NotReady { attempts: self.attempts };
        if self.attempts >= self.max_attempts {
            return RetryStatus::GaveUp(err);
        }
        log::debug!("{err}; retrying in {}ms", self.interval.as_millis());
        self.next_at = now + self.interval;
        RetryStatus::Waiting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(warmup_ms: u64, max_attempts: u32) -> VideoConfig {
        VideoConfig {
            video_id: "clip".into(),
            duration: Duration::from_secs(10),
            warmup: Duration::from_millis(warmup_ms),
            retry_interval: Duration::from_millis(120),
            max_play_attempts: max_attempts,
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn clip_reports_ready_then_ended_once() {
        let t0 = Instant::now();
        let mut clip = TimedClip::new(&cfg(100, 5), t0);
        assert_eq!(clip.poll_event(t0), None);
        assert!(!clip.play(t0));
        assert_eq!(clip.poll_event(t0 + ms(100)), Some(VideoEvent::Ready));
        assert!(clip.play(t0 + ms(100)));
        assert_eq!(clip.poll_event(t0 + ms(5000)), None);
        assert_eq!(clip.progress(t0 + ms(5100)), Some((ms(5000), ms(10_000))));
        assert_eq!(clip.poll_event(t0 + ms(10_100)), Some(VideoEvent::Ended));
        assert_eq!(clip.poll_event(t0 + ms(10_200)), None);
    }

    #[test]
    fn stopped_clip_never_ends() {
        let t0 = Instant::now();
        let mut clip = TimedClip::new(&cfg(0, 5), t0);
        clip.poll_event(t0);
        assert!(clip.play(t0));
        clip.stop();
        assert_eq!(clip.poll_event(t0 + ms(20_000)), None);
        assert_eq!(clip.progress(t0 + ms(1)), None);
    }

    #[test]
    fn retry_polls_until_ready() {
        let t0 = Instant::now();
        let c = cfg(300, 50);
        let mut clip = TimedClip::new(&c, t0);
        let mut retry = PlayRetry::new(&c, t0);

        assert!(matches!(retry.poll(&mut clip, t0), RetryStatus::Waiting));
        assert!(matches!(retry.poll(&mut clip, t0 + ms(60)), RetryStatus::Waiting));
        assert_eq!(retry.attempts(), 1);
        assert!(matches!(retry.poll(&mut clip, t0 + ms(120)), RetryStatus::Waiting));
        assert!(matches!(retry.poll(&mut clip, t0 + ms(240)), RetryStatus::Waiting));
        assert!(matches!(retry.poll(&mut clip, t0 + ms(360)), RetryStatus::Started));
        assert_eq!(retry.attempts(), 4);
    }

    #[test]
    fn retry_is_bounded() {
        let t0 = Instant::now();
        let c = cfg(60_000, 3);
        let mut clip = TimedClip::new(&c, t0);
        let mut retry = PlayRetry::new(&c, t0);
        let mut t = t0;
        let status = loop {
            match retry.poll(&mut clip, t) {
                RetryStatus::Waiting => t += ms(120),
                other => break other,
            }
        };
        match status {
            RetryStatus::GaveUp(PlayerUnavailableError::NotReady { attempts }) => assert_eq!(attempts, 3),
            other => panic!("expected give-up, got {other:?}"),
        }
    }
}
