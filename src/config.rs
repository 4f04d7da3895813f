/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::catalog::{builtin_scenes, Catalog, SceneDescriptor};
use crate::domain::nav::{MAX_TICK_DT, WALK_SPEED};

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub motion: MotionConfig,
    pub transition: TransitionConfig,
    pub video: VideoConfig,
    pub gamepad: GamepadConfig,
    pub catalog: Catalog,
    pub assets_dir: PathBuf,
    pub log_file: PathBuf,
    pub log_level: String,
}

#[derive(Clone, Debug)]
pub struct MotionConfig {
    pub speed: f64,
    pub max_tick_dt: f64,
    pub frame: Duration,
}

#[derive(Clone, Debug)]
pub struct TransitionConfig {
    pub fog_dwell: Duration,
    pub fog_fade: Duration,
    pub load_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct VideoConfig {
    pub video_id: String,
    pub duration: Duration,
    pub warmup: Duration,
    pub retry_interval: Duration,
    pub max_play_attempts: u32,
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub forward: Vec<String>,
    pub back: Vec<String>,
    pub confirm: Vec<String>,
    pub skip: Vec<String>,
    pub menu: Vec<String>,
    pub home: Vec<String>,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    general: TomlGeneral,
    #[serde(default)]
    motion: TomlMotion,
    #[serde(default)]
    transition: TomlTransition,
    #[serde(default)]
    video: TomlVideo,
    #[serde(default)]
    gamepad: TomlGamepad,
    #[serde(default)]
    scenes: Vec<TomlScene>,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_assets_dir")]
    assets_dir: String,
    #[serde(default = "default_log_file")]
    log_file: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

#[derive(Deserialize, Debug)]
struct TomlMotion {
    #[serde(default = "default_speed")]
    speed: f64,
    #[serde(default = "default_max_tick_dt")]
    max_tick_dt: f64,
    #[serde(default = "default_frame_ms")]
    frame_ms: u64,
}

#[derive(Deserialize, Debug)]
struct TomlTransition {
    #[serde(default = "default_fog_dwell")]
    fog_dwell_ms: u64,
    #[serde(default = "default_fog_fade")]
    fog_fade_ms: u64,
    #[serde(default = "default_load_timeout")]
    load_timeout_ms: u64,
}

#[derive(Deserialize, Debug)]
struct TomlVideo {
    #[serde(default = "default_video_id")]
    video_id: String,
    #[serde(default = "default_video_duration")]
    duration_secs: f64,
    #[serde(default = "default_warmup")]
    warmup_ms: u64,
    #[serde(default = "default_retry_interval")]
    retry_interval_ms: u64,
    #[serde(default = "default_max_play_attempts")]
    max_play_attempts: u32,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_forward")]
    forward: Vec<String>,
    #[serde(default = "default_back")]
    back: Vec<String>,
    #[serde(default = "default_confirm")]
    confirm: Vec<String>,
    #[serde(default = "default_skip")]
    skip: Vec<String>,
    #[serde(default = "default_menu")]
    menu: Vec<String>,
    #[serde(default = "default_home")]
    home: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct TomlScene {
    id: u32,
    title: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    meter: f32,
    #[serde(default)]
    text: String,
    pano: String,
}

// ── Defaults ──

fn default_assets_dir() -> String { "assets".into() }
fn default_log_file() -> String { "panowalk.log".into() }
fn default_log_level() -> String { "info".into() }

fn default_speed() -> f64 { WALK_SPEED }
fn default_max_tick_dt() -> f64 { MAX_TICK_DT }
fn default_frame_ms() -> u64 { 16 }

fn default_fog_dwell() -> u64 { 1400 }
fn default_fog_fade() -> u64 { 350 }
fn default_load_timeout() -> u64 { 10_000 }

fn default_video_id() -> String { "iN_rSsKyAQc".into() }
fn default_video_duration() -> f64 { 10.0 }   // demo clip length
fn default_warmup() -> u64 { 600 }
fn default_retry_interval() -> u64 { 120 }
fn default_max_play_attempts() -> u32 { 50 }  // ~6s of polling

fn default_forward() -> Vec<String> { vec!["R1".into()] }
fn default_back() -> Vec<String> { vec!["L1".into()] }
fn default_confirm() -> Vec<String> { vec!["A".into()] }
fn default_skip() -> Vec<String> { vec!["Start".into()] }
fn default_menu() -> Vec<String> { vec!["Y".into()] }
fn default_home() -> Vec<String> { vec!["Select".into()] }

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            assets_dir: default_assets_dir(),
            log_file: default_log_file(),
            log_level: default_log_level(),
        }
    }
}

impl Default for TomlMotion {
    fn default() -> Self {
        TomlMotion {
            speed: default_speed(),
            max_tick_dt: default_max_tick_dt(),
            frame_ms: default_frame_ms(),
        }
    }
}

impl Default for TomlTransition {
    fn default() -> Self {
        TomlTransition {
            fog_dwell_ms: default_fog_dwell(),
            fog_fade_ms: default_fog_fade(),
            load_timeout_ms: default_load_timeout(),
        }
    }
}

impl Default for TomlVideo {
    fn default() -> Self {
        TomlVideo {
            video_id: default_video_id(),
            duration_secs: default_video_duration(),
            warmup_ms: default_warmup(),
            retry_interval_ms: default_retry_interval(),
            max_play_attempts: default_max_play_attempts(),
        }
    }
}

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad {
            forward: default_forward(),
            back: default_back(),
            confirm: default_confirm(),
            skip: default_skip(),
            menu: default_menu(),
            home: default_home(),
        }
    }
}

// ── Loading ──

impl AppConfig {
    /// Load config from `config.toml`.
    /// Search order: exe directory, CWD, then the user and system share dirs.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        Self::from_toml(toml_cfg, &search_dirs)
    }

    fn from_toml(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        let assets_dir_str = &toml_cfg.general.assets_dir;
        let assets_dir = if PathBuf::from(assets_dir_str).is_absolute() {
            PathBuf::from(assets_dir_str)
        } else {
            search_dirs.iter()
                .map(|d| d.join(assets_dir_str))
                .find(|p| p.is_dir())
                .unwrap_or_else(|| PathBuf::from(assets_dir_str))
        };

        let entries: Vec<SceneDescriptor> = if toml_cfg.scenes.is_empty() {
            builtin_scenes()
        } else {
            toml_cfg.scenes.into_iter()
                .map(|s| SceneDescriptor {
                    id: s.id,
                    title: s.title,
                    status_label: s.status,
                    meter_value: s.meter,
                    narrative_text: s.text,
                    image_ref: s.pano,
                })
                .collect()
        };

        let m = toml_cfg.motion;
        let t = toml_cfg.transition;
        let v = toml_cfg.video;
        let g = toml_cfg.gamepad;

        AppConfig {
            motion: MotionConfig {
                speed: if m.speed > 0.0 { m.speed } else { default_speed() },
                max_tick_dt: if m.max_tick_dt > 0.0 { m.max_tick_dt } else { default_max_tick_dt() },
                frame: Duration::from_millis(m.frame_ms.max(1)),
            },
            transition: TransitionConfig {
                fog_dwell: Duration::from_millis(t.fog_dwell_ms),
                fog_fade: Duration::from_millis(t.fog_fade_ms),
                load_timeout: Duration::from_millis(t.load_timeout_ms.max(1)),
            },
            video: VideoConfig {
                video_id: v.video_id,
                duration: clip_duration(v.duration_secs),
                warmup: Duration::from_millis(v.warmup_ms),
                retry_interval: Duration::from_millis(v.retry_interval_ms.max(1)),
                max_play_attempts: v.max_play_attempts.max(1),
            },
            gamepad: GamepadConfig {
                forward: g.forward,
                back: g.back,
                confirm: g.confirm,
                skip: g.skip,
                menu: g.menu,
                home: g.home,
            },
            catalog: Catalog::from_entries(entries),
            assets_dir,
            log_file: PathBuf::from(toml_cfg.general.log_file),
            log_level: toml_cfg.general.log_level,
        }
    }
}

/// Clip length from config; values a `Duration` cannot hold fall back
/// to the default.
fn clip_duration(secs: f64) -> Duration {
    match Duration::try_from_secs_f64(secs.max(0.0)) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Warning: video.duration_secs = {secs} unusable ({e}); using default.");
            Duration::from_secs_f64(default_video_duration())
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig::from_toml(TomlConfig::default(), &[])
    }
}

/// Candidate directories to search: exe dir + CWD + system paths (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/panowalk");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    let sys = PathBuf::from("/usr/share/panowalk");
    if sys.is_dir() && !dirs.iter().any(|d| d == &sys) {
        dirs.push(sys);
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
///
/// Runs before the logger exists, so problems go to stderr.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        eprintln!("Warning: config.toml parse error: {e}");
                        eprintln!("Using default settings.");
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    eprintln!("Warning: could not read {}: {e}", path.display());
                }
            }
        }
    }
    TomlConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> AppConfig {
        let cfg: TomlConfig = toml::from_str(text).expect("valid toml");
        AppConfig::from_toml(cfg, &[])
    }

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = parse("");
        assert_eq!(cfg.motion.speed, WALK_SPEED);
        assert_eq!(cfg.motion.max_tick_dt, MAX_TICK_DT);
        assert_eq!(cfg.transition.fog_dwell, Duration::from_millis(1400));
        assert_eq!(cfg.transition.load_timeout, Duration::from_secs(10));
        assert_eq!(cfg.video.retry_interval, Duration::from_millis(120));
        assert_eq!(cfg.catalog.len(), 3);
        assert_eq!(cfg.assets_dir, PathBuf::from("assets"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = parse("[motion]\nspeed = 0.5\n[transition]\nfog_dwell_ms = 200\n");
        assert_eq!(cfg.motion.speed, 0.5);
        assert_eq!(cfg.motion.frame, Duration::from_millis(16));
        assert_eq!(cfg.transition.fog_dwell, Duration::from_millis(200));
        assert_eq!(cfg.transition.fog_fade, Duration::from_millis(350));
    }

    #[test]
    fn nonpositive_speed_falls_back() {
        let cfg = parse("[motion]\nspeed = 0.0\nmax_tick_dt = -1.0\n");
        assert_eq!(cfg.motion.speed, WALK_SPEED);
        assert_eq!(cfg.motion.max_tick_dt, MAX_TICK_DT);
    }

    #[test]
    fn scenes_replace_builtin_catalog() {
        let cfg = parse(
            r#"
            [[scenes]]
            id = 10
            title = "Mare"
            status = "Quiete"
            meter = 40.0
            text = "Onde."
            pano = "mare.jpg"

            [[scenes]]
            id = 11
            title = "Bosco"
            meter = 120.0
            pano = "bosco.jpg"
            "#,
        );
        assert_eq!(cfg.catalog.len(), 2);
        assert_eq!(cfg.catalog.get(0).title, "Mare");
        assert_eq!(cfg.catalog.get(0).status_label, "Quiete");
        assert_eq!(cfg.catalog.get(1).meter_value, 100.0);
        assert_eq!(cfg.catalog.index_of_id(11), Some(1));
    }

    #[test]
    fn oversized_clip_duration_falls_back() {
        let default = Duration::from_secs_f64(default_video_duration());
        assert_eq!(parse("[video]\nduration_secs = 1e30\n").video.duration, default);
        assert_eq!(parse("[video]\nduration_secs = inf\n").video.duration, default);
        assert_eq!(parse("[video]\nduration_secs = nan\n").video.duration, Duration::ZERO);
        assert_eq!(parse("[video]\nduration_secs = -3.0\n").video.duration, Duration::ZERO);
        assert_eq!(parse("[video]\nduration_secs = 4.5\n").video.duration, Duration::from_millis(4500));
    }

    #[test]
    fn gamepad_lists_are_read() {
        let cfg = parse("[gamepad]\nforward = [\"A\", \"R2\"]\n");
        assert_eq!(cfg.gamepad.forward, vec!["A".to_string(), "R2".to_string()]);
        assert_eq!(cfg.gamepad.back, vec!["L1".to_string()]);
    }
}
