//! JSON scene description and random scene generation.

use anyhow::{Context, Result};
use glam::Vec3;
use lumen_renderer::{
    CameraSettings, Color, Diffuse, Material, Metal, RenderSettings, Scene, Sphere,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Surface description of a sphere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MaterialDesc {
    Diffuse {
        albedo: Color,
    },
    Metal {
        albedo: Color,
        #[serde(default)]
        fuzz: f32,
    },
}

impl MaterialDesc {
    pub fn build(&self) -> Arc<dyn Material> {
        match *self {
            MaterialDesc::Diffuse { albedo } => Arc::new(Diffuse::new(albedo)),
            MaterialDesc::Metal { albedo, fuzz } => Arc::new(Metal::new(albedo, fuzz)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SphereDesc {
    pub center: Vec3,
    pub radius: f32,
    pub material: MaterialDesc,
}

/// Everything needed to render a frame, as stored on disk.
///
/// Every section is optional; missing ones take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneFile {
    pub settings: RenderSettings,
    pub camera: CameraSettings,
    pub spheres: Vec<SphereDesc>,
    /// Extra small spheres scattered around the fixed ones
    pub random_shapes: usize,
}

impl SceneFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scene file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse scene file {}", path.display()))
    }

    /// The default demo: two spheres above a floor plus the random ones.
    pub fn demo(random_shapes: usize) -> Self {
        Self {
            spheres: demo_spheres(),
            random_shapes,
            ..Default::default()
        }
    }

    /// Instantiate the listed spheres, then `random_shapes` random ones.
    pub fn build_scene(&self, rng: &mut impl Rng) -> Scene {
        let mut scene = Scene::new();
        let random = (0..self.random_shapes).map(|_| random_sphere(&mut *rng));

        for desc in self.spheres.iter().copied().chain(random) {
            scene.add(Arc::new(Sphere::new(desc.center, desc.radius, desc.material.build())));
        }
        scene
    }
}

fn demo_spheres() -> Vec<SphereDesc> {
    vec![
        SphereDesc {
            center: Vec3::new(-0.5, 0.0, -1.3),
            radius: 0.5,
            material: MaterialDesc::Diffuse {
                albedo: Color::new(0.8, 0.3, 0.4),
            },
        },
        SphereDesc {
            center: Vec3::new(0.7, 0.0, -3.0),
            radius: 0.5,
            material: MaterialDesc::Metal {
                albedo: Color::new(0.8, 0.6, 0.2),
                fuzz: 0.0,
            },
        },
        // Floor
        SphereDesc {
            center: Vec3::new(0.0, -100.5, -1.0),
            radius: 100.0,
            material: MaterialDesc::Diffuse {
                albedo: Color::new(0.8, 0.8, 0.8),
            },
        },
    ]
}

/// Small sphere in the box x in [-2, 2], y in [-1, 0], z in [-10, 5].
/// Four out of five are diffuse, the rest metal.
pub fn random_sphere(rng: &mut impl Rng) -> SphereDesc {
    let center = Vec3::new(
        rng.gen_range(-2.0..=2.0),
        rng.gen_range(-1.0..=0.0),
        rng.gen_range(-10.0..=5.0),
    );
    let radius = rng.gen_range(0.01..=0.1);
    let albedo = Color::new(rng.gen(), rng.gen(), rng.gen());

    let material = if rng.gen_range(0..=4) > 0 {
        MaterialDesc::Diffuse { albedo }
    } else {
        MaterialDesc::Metal { albedo, fuzz: 0.0 }
    };

    SphereDesc { center, radius, material }
}
