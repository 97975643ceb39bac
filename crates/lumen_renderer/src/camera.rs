//! Camera for ray generation.

use crate::{Ray, RenderError, RenderResult};
use lumen_math::Vec3;
use serde::{Deserialize, Serialize};

/// User-facing camera placement, as stored in scene files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub look_from: Vec3,
    pub look_at: Vec3,
    pub vup: Vec3,
    /// Vertical field of view in degrees
    pub vfov: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            look_from: Vec3::ZERO,
            look_at: Vec3::new(0.0, 0.0, -1.0),
            vup: Vec3::Y,
            vfov: 90.0,
        }
    }
}

/// Pinhole camera generating rays through normalized image coordinates.
///
/// `(u, v) = (0, 0)` is the bottom-left corner of the image plane and
/// `(1, 1)` the top-right one. Generated directions are unit length, so hit
/// distances along camera rays are world distances.
#[derive(Debug, Clone)]
pub struct Camera {
    settings: CameraSettings,
    aspect: f32,

    // Cached computed values (set by initialize())
    lower_left: Vec3,
    horizontal: Vec3,
    vertical: Vec3,
}

impl Camera {
    /// Create a new camera with default settings and a square aspect ratio.
    pub fn new() -> Self {
        Self::from_settings(CameraSettings::default(), 1.0)
    }

    /// Create a camera from stored settings and the image aspect ratio (width / height).
    pub fn from_settings(settings: CameraSettings, aspect: f32) -> Self {
        let mut camera = Self {
            settings,
            aspect,
            lower_left: Vec3::ZERO,
            horizontal: Vec3::X,
            vertical: Vec3::Y,
        };
        camera.initialize();
        camera
    }

    /// Set camera position.
    pub fn with_position(mut self, look_from: Vec3, look_at: Vec3, vup: Vec3) -> Self {
        self.settings.look_from = look_from;
        self.settings.look_at = look_at;
        self.settings.vup = vup;
        self.initialize();
        self
    }

    /// Set the vertical field of view in degrees.
    pub fn with_vfov(mut self, vfov: f32) -> Self {
        self.settings.vfov = vfov;
        self.initialize();
        self
    }

    /// Set the image aspect ratio (width / height).
    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = aspect;
        self.initialize();
        self
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Check that the eye, target and up vector span a usable view basis.
    ///
    /// The eye must not sit on the target, `vup` must not be parallel to
    /// the viewing direction and the image plane must come out finite.
    pub fn validate(&self) -> RenderResult<()> {
        let CameraSettings { look_from, look_at, vup, vfov } = self.settings;
        let view = look_from - look_at;

        if !view.is_finite() || view.length_squared() <= f32::EPSILON {
            return Err(RenderError::InvalidSettings(format!(
                "camera look_from {look_from} coincides with look_at {look_at}"
            )));
        }
        if vup.normalize_or_zero().cross(view.normalize()).length_squared() <= f32::EPSILON {
            return Err(RenderError::InvalidSettings(format!(
                "camera up vector {vup} is parallel to the view direction {}",
                -view
            )));
        }
        if !(self.lower_left.is_finite() && self.horizontal.is_finite() && self.vertical.is_finite()) {
            return Err(RenderError::InvalidSettings(format!(
                "camera image plane is not finite (vfov {vfov}, aspect {})",
                self.aspect
            )));
        }
        Ok(())
    }

    /// Recompute the image plane. The plane sits at unit distance in front
    /// of the eye.
    fn initialize(&mut self) {
        let theta = self.settings.vfov.to_radians();
        let viewport_height = 2.0 * (theta / 2.0).tan();
        let viewport_width = viewport_height * self.aspect;

        // Calculate camera basis vectors
        let w = (self.settings.look_from - self.settings.look_at).normalize();
        let u = self.settings.vup.cross(w).normalize();
        let v = w.cross(u);

        self.horizontal = viewport_width * u;
        self.vertical = viewport_height * v;
        self.lower_left = self.settings.look_from - self.horizontal / 2.0 - self.vertical / 2.0 - w;
    }

    /// Generate the ray through normalized image coordinates `(u, v)`.
    pub fn get_ray(&self, u: f32, v: f32) -> Ray {
        let origin = self.settings.look_from;
        let target = self.lower_left + u * self.horizontal + v * self.vertical;
        Ray::new(origin, (target - origin).normalize())
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}
