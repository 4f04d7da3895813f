/// Panorama loading and view sampling.
///
/// Loads run on a background thread each and report over a one-shot
/// channel; the choreographer polls it. Views are sampled straight from
/// the equirectangular image: one colour per half-cell.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};

use image::imageops::FilterType;
use image::{Rgb, RgbImage};

use crate::error::PanoramaLoadError;
use crate::sim::choreo::{LoadResult, Panorama, PanoramaSource};

/// Decoded panoramas wider than this are downscaled on the worker.
const MAX_WIDTH: u32 = 2048;

/// Background colour before any panorama has loaded.
pub const EMPTY_SKY: Rgb<u8> = Rgb([0x22, 0x22, 0x22]);

pub struct FilePanoramaSource {
    assets_dir: PathBuf,
}

impl FilePanoramaSource {
    pub fn new(assets_dir: PathBuf) -> Self {
        Self { assets_dir }
    }
}

impl PanoramaSource for FilePanoramaSource {
    fn request(&mut self, image_ref: &str) -> Receiver<LoadResult> {
        let (tx, rx) = mpsc::channel();
        let path = self.assets_dir.join(image_ref);
        let image_ref = image_ref.to_string();

        std::thread::spawn(move || {
            let result = load_and_decode(&path).map(|pixels| Panorama { image_ref, pixels });
            // Receiver is gone if the transition was superseded.
            let _ = tx.send(result);
        });

        rx
    }
}

fn load_and_decode(path: &Path) -> Result<RgbImage, PanoramaLoadError> {
    let bytes = std::fs::read(path).map_err(|source| PanoramaLoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let img = image::load_from_memory(&bytes).map_err(|source| PanoramaLoadError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let rgb = img.to_rgb8();
    let (w, h) = rgb.dimensions();

    if w > MAX_WIDTH {
        let new_h = ((h as f32) * (MAX_WIDTH as f32 / w as f32)).max(1.0) as u32;
        Ok(image::imageops::resize(&rgb, MAX_WIDTH, new_h, FilterType::Triangle))
    } else {
        Ok(rgb)
    }
}

/// Camera parameters for a view.
#[derive(Clone, Copy, Debug)]
pub struct ViewParams {
    pub yaw: f32,
    pub pitch: f32,
    /// Horizontal field of view, radians.
    pub fov: f32,
}

/// Colour seen at view position (`u`, `v`), both in 0..1 across the view.
///
/// `aspect` is view width / height in pixels; the vertical field of view
/// follows from it.
pub fn sample_view(pano: &RgbImage, view: ViewParams, aspect: f32, u: f32, v: f32) -> Rgb<u8> {
    let (w, h) = pano.dimensions();
    if w == 0 || h == 0 {
        return EMPTY_SKY;
    }
    let vfov = view.fov / aspect.max(0.01);
    let lon = view.yaw + (u - 0.5) * view.fov;
    let lat = (view.pitch + (0.5 - v) * vfov).clamp(-std::f32::consts::FRAC_PI_2, std::f32::consts::FRAC_PI_2);

    let tx = (lon / std::f32::consts::TAU).rem_euclid(1.0);
    let ty = 0.5 - lat / std::f32::consts::PI;

    let px = ((tx * w as f32) as u32).min(w - 1);
    let py = ((ty * h as f32) as u32).min(h - 1);
    *pano.get_pixel(px, py)
}

/// Blend `c` toward the fog colour by `amount` (0..=1).
pub fn fog_blend(c: Rgb<u8>, amount: f32) -> Rgb<u8> {
    const FOG: [f32; 3] = [214.0, 218.0, 222.0];
    let a = amount.clamp(0.0, 1.0);
    let mix = |i: usize| (c[i] as f32 * (1.0 - a) + FOG[i] * a).round() as u8;
    Rgb([mix(0), mix(1), mix(2)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    /// 4x2 panorama: top row red, bottom row blue, right half brighter.
    fn test_pano() -> RgbImage {
        RgbImage::from_fn(4, 2, |x, y| {
            let bright = if x >= 2 { 200 } else { 100 };
            if y == 0 { Rgb([bright, 0, 0]) } else { Rgb([0, 0, bright]) }
        })
    }

    const FRONT: ViewParams = ViewParams { yaw: 0.0, pitch: 0.0, fov: 1.0 };

    #[test]
    fn horizon_splits_sky_and_ground() {
        let p = test_pano();
        assert_eq!(sample_view(&p, FRONT, 2.0, 0.5, 0.1)[0], 100);
        assert_eq!(sample_view(&p, FRONT, 2.0, 0.5, 0.9)[2], 100);
    }

    #[test]
    fn yaw_wraps_around() {
        let p = test_pano();
        let back = ViewParams { yaw: std::f32::consts::PI + 0.1, ..FRONT };
        assert_eq!(sample_view(&p, back, 2.0, 0.5, 0.1), Rgb([200, 0, 0]));
        let around = ViewParams { yaw: -std::f32::consts::TAU + 0.1, ..FRONT };
        assert_eq!(sample_view(&p, around, 2.0, 0.5, 0.1), sample_view(&p, FRONT, 2.0, 0.5, 0.1));
    }

    #[test]
    fn steep_pitch_stays_in_bounds() {
        let p = test_pano();
        let up = ViewParams { pitch: 1.5, ..FRONT };
        assert_eq!(sample_view(&p, up, 2.0, 0.5, 0.0), Rgb([100, 0, 0]));
        let down = ViewParams { pitch: -1.5, ..FRONT };
        assert_eq!(sample_view(&p, down, 2.0, 0.5, 1.0), Rgb([0, 0, 100]));
    }

    #[test]
    fn fog_blend_endpoints() {
        let c = Rgb([10, 20, 30]);
        assert_eq!(fog_blend(c, 0.0), c);
        assert_eq!(fog_blend(c, 1.0), Rgb([214, 218, 222]));
        assert_eq!(fog_blend(c, 7.0), Rgb([214, 218, 222]));
    }

    #[test]
    fn missing_file_reports_open_error() {
        let mut src = FilePanoramaSource::new(std::env::temp_dir().join("panowalk-no-such-dir"));
        let rx = src.request("nope.jpg");
        let result = rx.recv_timeout(Duration::from_secs(5)).expect("worker answers");
        assert!(matches!(result, Err(PanoramaLoadError::Open { .. })));
    }

    #[test]
    fn png_is_decoded() {
        let dir = std::env::temp_dir().join(format!("panowalk-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        test_pano().save(dir.join("tiny.png")).expect("write png");

        let mut src = FilePanoramaSource::new(dir.clone());
        let started = Instant::now();
        let pano = src.request("tiny.png")
            .recv_timeout(Duration::from_secs(5))
            .expect("worker answers")
            .expect("decodes");
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(pano.image_ref, "tiny.png");
        assert_eq!(pano.pixels.dimensions(), (4, 2));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn garbage_reports_decode_error() {
        let dir = std::env::temp_dir().join(format!("panowalk-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        std::fs::write(dir.join("bad.jpg"), b"not an image").expect("write");
        let mut src = FilePanoramaSource::new(dir.clone());
        let result = src.request("bad.jpg").recv_timeout(Duration::from_secs(5)).expect("worker answers");
        assert!(matches!(result, Err(PanoramaLoadError::Decode { .. })));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
