//! Core path tracing routines.
//!
//! Implements Monte Carlo path tracing with:
//! - Recursive shading with a configurable depth cap
//! - Anti-aliasing via jittered multi-sampling
//! - Per-band rendering with cooperative cancellation
//! - Gamma correction for 8-bit output

use crate::band::Band;
use crate::framebuffer::Framebuffer;
use crate::{Camera, Color, Hittable, Ray, RenderError, RenderResult};
use lumen_math::Interval;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

/// Lower hit bound for secondary rays, avoids re-hitting the surface they
/// leave from.
pub const SECONDARY_RAY_EPSILON: f32 = 0.001;

/// Render configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Samples per pixel for anti-aliasing
    pub samples_per_pixel: u32,
    /// Maximum number of bounces before a path is absorbed
    pub max_depth: u32,
    /// Number of row bands; 1 renders on the calling thread
    pub band_count: u32,
    /// Answer ray queries through the BVH
    pub use_spatial_index: bool,
    /// Makes frames reproducible; `None` seeds every band from entropy
    pub seed: Option<u64>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            samples_per_pixel: 10,
            max_depth: 10,
            band_count: 8,
            use_spatial_index: true,
            seed: None,
        }
    }
}

impl RenderSettings {
    /// Reject settings that cannot produce a frame.
    pub fn validate(&self) -> RenderResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.samples_per_pixel == 0 {
            return Err(RenderError::InvalidSettings(
                "samples_per_pixel must be at least 1".into(),
            ));
        }
        if self.band_count == 0 {
            return Err(RenderError::InvalidSettings("band_count must be at least 1".into()));
        }
        Ok(())
    }

    /// Bands actually used: never more than there are rows.
    pub fn effective_band_count(&self) -> u32 {
        self.band_count.min(self.height).max(1)
    }

    /// Image aspect ratio (width / height).
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// Random state for one band.
///
/// With a seed, each band index gets its own stream so the frame does not
/// depend on which worker picks up which band.
pub fn band_rng(seed: Option<u64>, band_index: usize) -> StdRng {
    match seed {
        Some(seed) => {
            let mix = (band_index as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
            StdRng::seed_from_u64(seed ^ mix)
        }
        None => StdRng::from_entropy(),
    }
}

/// Background seen by rays that hit nothing.
///
/// Blends white into sky blue on the vertical component of the normalized
/// direction.
pub fn sky_gradient(ray: &Ray) -> Color {
    let unit_direction = ray.direction().normalize();
    let a = 0.5 * (unit_direction.y + 1.0);
    let white = Color::new(1.0, 1.0, 1.0);
    let blue = Color::new(0.5, 0.7, 1.0);
    white * (1.0 - a) + blue * a
}

/// Compute the color seen by a ray.
///
/// `depth` counts bounces taken so far, starting at 0 for camera rays. A hit
/// scatters only while `depth < max_depth`; absorbed and depth-capped paths
/// return black.
pub fn shade(
    ray: &Ray,
    world: &dyn Hittable,
    depth: u32,
    max_depth: u32,
    rng: &mut dyn RngCore,
) -> Color {
    let t_min = if depth > 0 { SECONDARY_RAY_EPSILON } else { 0.0 };

    let Some(rec) = world.hit(ray, Interval::new(t_min, f32::INFINITY)) else {
        return sky_gradient(ray);
    };

    if depth >= max_depth {
        return Color::ZERO;
    }

    match rec.material.scatter(ray, &rec, rng) {
        Some(result) => {
            result.attenuation * shade(&result.scattered, world, depth + 1, max_depth, rng)
        }
        // Ray was absorbed
        None => Color::ZERO,
    }
}

/// Average of `samples_per_pixel` jittered samples for pixel `(row, col)`.
///
/// Row `r` samples `v` in `[r / height, (r + 1) / height)`, so row 0 is the
/// bottom of the image.
pub fn render_pixel(
    camera: &Camera,
    world: &dyn Hittable,
    row: u32,
    col: u32,
    settings: &RenderSettings,
    rng: &mut dyn RngCore,
) -> Color {
    let mut pixel_color = Color::ZERO;

    for _ in 0..settings.samples_per_pixel {
        let u = (col as f32 + rng.gen::<f32>()) / settings.width as f32;
        let v = (row as f32 + rng.gen::<f32>()) / settings.height as f32;
        let ray = camera.get_ray(u, v);
        pixel_color += shade(&ray, world, 0, settings.max_depth, rng);
    }

    pixel_color / settings.samples_per_pixel as f32
}

/// Render every pixel of `band` into `framebuffer`, row by row from its
/// highest row down to `start_row`.
///
/// `cancelled` is polled after each pixel; once it returns true the band
/// stops and the rest of its rows stay untouched. Returns the number of
/// pixels written.
pub fn render_band(
    band: &Band,
    camera: &Camera,
    world: &dyn Hittable,
    settings: &RenderSettings,
    framebuffer: &Framebuffer,
    rng: &mut dyn RngCore,
    cancelled: impl Fn() -> bool,
) -> usize {
    let mut written = 0;

    for row in (band.start_row..band.end_row).rev() {
        for col in 0..settings.width {
            let color = render_pixel(camera, world, row, col, settings, rng);
            framebuffer.set_pixel(row, col, color);
            written += 1;

            if cancelled() {
                log::debug!("Band {} cancelled after {} pixels", band.index, written);
                return written;
            }
        }
    }

    written
}

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Convert a linear RGBA float pixel to gamma-corrected 8-bit RGBA.
pub fn color_to_rgba(rgba: [f32; 4]) -> [u8; 4] {
    let to_byte = |c: f32| (255.0 * linear_to_gamma(c).clamp(0.0, 1.0)) as u8;
    [
        to_byte(rgba[0]),
        to_byte(rgba[1]),
        to_byte(rgba[2]),
        (255.0 * rgba[3].clamp(0.0, 1.0)) as u8,
    ]
}
