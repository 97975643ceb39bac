//! Simple path tracer example.
//!
//! Renders a grid of spheres through the band scheduler and saves the
//! result in PPM format.

use lumen_renderer::{
    color_to_rgba, Camera, Color, Diffuse, Framebuffer, Material, Metal, RenderEngine,
    RenderSettings, Scene, Sphere, Vec3,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let start = std::time::Instant::now();
    let scene = build_scene();
    println!("Scene with {} spheres built in {:?}", scene.len(), start.elapsed());

    let camera = Camera::new()
        .with_position(Vec3::new(13.0, 2.0, 3.0), Vec3::ZERO, Vec3::Y)
        .with_vfov(20.0);

    let settings = RenderSettings {
        width: 400,
        height: 225,
        samples_per_pixel: 20,
        max_depth: 10,
        band_count: 16,
        use_spatial_index: true,
        seed: Some(7),
    };

    let engine = RenderEngine::new(settings, scene, camera)?;
    let report = engine.render()?;
    println!("Rendered {} pixels in {:?}", report.pixels_written, report.elapsed);

    let filename = "output.ppm";
    save_ppm(&engine.framebuffer(), filename)?;
    println!("Saved to {}", filename);
    Ok(())
}

fn build_scene() -> Scene {
    let mut scene = Scene::new();

    // Ground
    scene.add(Arc::new(Sphere::new(
        Vec3::new(0.0, -1000.0, 0.0),
        1000.0,
        Arc::new(Diffuse::new(Color::new(0.5, 0.5, 0.5))),
    )));

    scene.add(Arc::new(Sphere::new(
        Vec3::new(-4.0, 1.0, 0.0),
        1.0,
        Arc::new(Diffuse::new(Color::new(0.4, 0.2, 0.1))),
    )));

    scene.add(Arc::new(Sphere::new(
        Vec3::new(4.0, 1.0, 0.0),
        1.0,
        Arc::new(Metal::new(Color::new(0.7, 0.6, 0.5), 0.0)),
    )));

    // Small random spheres
    let mut rng = StdRng::seed_from_u64(2024);
    for a in -5..5 {
        for b in -5..5 {
            let center = Vec3::new(
                a as f32 + 0.9 * rng.gen::<f32>(),
                0.2,
                b as f32 + 0.9 * rng.gen::<f32>(),
            );
            if (center - Vec3::new(4.0, 0.2, 0.0)).length() <= 0.9 {
                continue;
            }

            let material: Arc<dyn Material> = if rng.gen::<f32>() < 0.8 {
                let albedo = Color::new(
                    rng.gen::<f32>() * rng.gen::<f32>(),
                    rng.gen::<f32>() * rng.gen::<f32>(),
                    rng.gen::<f32>() * rng.gen::<f32>(),
                );
                Arc::new(Diffuse::new(albedo))
            } else {
                let albedo = Color::new(
                    0.5 + 0.5 * rng.gen::<f32>(),
                    0.5 + 0.5 * rng.gen::<f32>(),
                    0.5 + 0.5 * rng.gen::<f32>(),
                );
                Arc::new(Metal::new(albedo, 0.5 * rng.gen::<f32>()))
            };
            scene.add(Arc::new(Sphere::new(center, 0.2, material)));
        }
    }

    scene
}

fn save_ppm(framebuffer: &Framebuffer, filename: &str) -> std::io::Result<()> {
    let file = File::create(filename)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "P3")?;
    writeln!(writer, "{} {}", framebuffer.width(), framebuffer.height())?;
    writeln!(writer, "255")?;

    // PPM lists the top row first
    for row in (0..framebuffer.height()).rev() {
        for col in 0..framebuffer.width() {
            let rgba = color_to_rgba(framebuffer.pixel(row, col));
            writeln!(writer, "{} {} {}", rgba[0], rgba[1], rgba[2])?;
        }
    }

    writer.flush()
}
