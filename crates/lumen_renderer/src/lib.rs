//! Lumen renderer - multi-threaded CPU path tracing
//!
//! A Monte Carlo path tracer that splits each frame into row bands and
//! renders them on a fixed pool of worker threads, with cooperative
//! cancellation and an optional BVH over the scene.

mod band;
mod bvh;
mod camera;
mod engine;
mod error;
mod framebuffer;
mod hittable;
mod material;
mod renderer;
mod scene;
mod scheduler;
mod sphere;

pub use band::{split_rows, Band};
pub use bvh::BvhNode;
pub use camera::{Camera, CameraSettings};
pub use engine::{RenderEngine, RenderReport, RenderState};
pub use error::{RenderError, RenderResult};
pub use framebuffer::{Framebuffer, CHANNELS};
pub use hittable::{closest, HitRecord, Hittable, SharedHittable};
pub use material::{random_unit_vector, reflect, Color, Diffuse, Material, Metal, ScatterResult};
pub use renderer::{
    band_rng, color_to_rgba, linear_to_gamma, render_band, render_pixel, shade, sky_gradient,
    RenderSettings, SECONDARY_RAY_EPSILON,
};
pub use scene::Scene;
pub use scheduler::{TaskHandle, TaskScheduler};
pub use sphere::Sphere;

/// Re-export the math types from lumen_math
pub use lumen_math::{Aabb, Interval, Ray, Vec3};
