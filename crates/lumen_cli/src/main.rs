//! Command-line front end: loads or generates a scene, renders one frame and
//! writes it to disk.

mod output;
mod scene_file;

use anyhow::{Context, Result};
use clap::Parser;
use lumen_renderer::{Camera, RenderEngine, RenderReport, TaskScheduler};
use output::OutputFormat;
use rand::rngs::StdRng;
use rand::SeedableRng;
use scene_file::SceneFile;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Random spheres added to the built-in demo scene
const DEFAULT_RANDOM_SHAPES: usize = 50;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "lumen")]
#[command(version, about = "Multi-threaded CPU ray tracer", long_about = None)]
struct Cli {
    /// JSON scene description; renders the built-in demo scene when omitted
    scene: Option<PathBuf>,

    /// Output image path
    #[arg(short, long, default_value = "render.png")]
    output: PathBuf,

    /// Output format, guessed from the output extension when omitted
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Samples per pixel
    #[arg(short, long)]
    samples: Option<u32>,

    /// Maximum bounces per path
    #[arg(long)]
    max_depth: Option<u32>,

    /// Number of row bands rendered in parallel
    #[arg(short, long)]
    bands: Option<u32>,

    /// Test every sphere instead of building a BVH
    #[arg(long)]
    no_bvh: bool,

    /// Number of random small spheres to add
    #[arg(long)]
    random_shapes: Option<usize>,

    /// Seed for scene generation and sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Worker threads (default: hardware threads minus one)
    #[arg(long)]
    workers: Option<usize>,

    /// Cancel the frame after this many seconds and keep what was rendered
    #[arg(long, value_name = "SECONDS", value_parser = parse_seconds)]
    time_limit: Option<Duration>,
}

impl Cli {
    /// Apply command-line overrides on top of the scene file.
    fn apply(&self, file: &mut SceneFile) {
        let settings = &mut file.settings;
        if let Some(width) = self.width {
            settings.width = width;
        }
        if let Some(height) = self.height {
            settings.height = height;
        }
        if let Some(samples) = self.samples {
            settings.samples_per_pixel = samples;
        }
        if let Some(max_depth) = self.max_depth {
            settings.max_depth = max_depth;
        }
        if let Some(bands) = self.bands {
            settings.band_count = bands;
        }
        if self.no_bvh {
            settings.use_spatial_index = false;
        }
        if self.seed.is_some() {
            settings.seed = self.seed;
        }
        if let Some(random_shapes) = self.random_shapes {
            file.random_shapes = random_shapes;
        }
    }

    fn output_format(&self) -> OutputFormat {
        self.format.unwrap_or_else(|| OutputFormat::from_path(&self.output))
    }
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let seconds: f64 = s.parse().map_err(|e| format!("{e}"))?;
    Duration::try_from_secs_f64(seconds).map_err(|e| format!("{e}"))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    run(&Cli::parse())
}

fn run(cli: &Cli) -> Result<()> {
    let mut file = match &cli.scene {
        Some(path) => SceneFile::load(path)?,
        None => SceneFile::demo(DEFAULT_RANDOM_SHAPES),
    };
    cli.apply(&mut file);

    let mut rng = match file.settings.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let scene = file.build_scene(&mut rng);
    log::info!("Scene has {} spheres", scene.len());

    let scheduler = match cli.workers {
        Some(workers) => TaskScheduler::with_workers(workers),
        None => TaskScheduler::new(),
    }
    .context("Failed to start the worker pool")?;

    let camera = Camera::from_settings(file.camera, file.settings.aspect_ratio());
    let engine = RenderEngine::with_scheduler(file.settings.clone(), scene, camera, Arc::new(scheduler))
        .context("Invalid render configuration")?;

    let report = render_frame(&engine, cli.time_limit)?;
    if report.cancelled {
        log::warn!(
            "Frame cancelled with {} of {} pixels rendered",
            report.pixels_written,
            file.settings.width as usize * file.settings.height as usize
        );
    }

    output::write(&engine.framebuffer(), &cli.output, cli.output_format())
}

/// Run one frame in the background, cancelling it once `time_limit` has
/// passed, and report progress while waiting.
fn render_frame(engine: &RenderEngine, time_limit: Option<Duration>) -> Result<RenderReport> {
    engine.start_render()?;

    let start = Instant::now();
    let mut last_progress = start;
    let total = engine.settings().width as usize * engine.settings().height as usize;

    while engine.is_rendering() {
        if let Some(limit) = time_limit {
            if start.elapsed() >= limit && engine.cancel_render() {
                log::warn!("Time limit of {:.2?} reached", limit);
            }
        }
        if last_progress.elapsed() >= PROGRESS_INTERVAL {
            let done = engine.framebuffer().written_pixels();
            log::info!("{:.1}% rendered", 100.0 * done as f64 / total as f64);
            last_progress = Instant::now();
        }
        thread::sleep(POLL_INTERVAL);
    }

    let report = engine.wait()?.context("Render thread produced no report")?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "lumen", "--width", "64", "--height", "48", "-s", "3", "--bands", "2", "--no-bvh",
            "--seed", "5", "--random-shapes", "7",
        ])
        .unwrap();

        let mut file = SceneFile::demo(DEFAULT_RANDOM_SHAPES);
        cli.apply(&mut file);

        assert_eq!((file.settings.width, file.settings.height), (64, 48));
        assert_eq!(file.settings.samples_per_pixel, 3);
        assert_eq!(file.settings.band_count, 2);
        assert!(!file.settings.use_spatial_index);
        assert_eq!(file.settings.seed, Some(5));
        assert_eq!(file.random_shapes, 7);
        assert_eq!(cli.output_format(), OutputFormat::Png);
    }

    #[test]
    fn test_no_overrides_keep_file_values() {
        let cli = Cli::try_parse_from(["lumen", "scene.json", "-o", "out.raw"]).unwrap();
        let mut file = SceneFile::demo(3);
        let before = file.clone();
        cli.apply(&mut file);

        assert_eq!(file, before);
        assert_eq!(cli.scene, Some(PathBuf::from("scene.json")));
        assert_eq!(cli.output_format(), OutputFormat::Raw);
    }

    #[test]
    fn test_time_limit_parsing() {
        let cli = Cli::try_parse_from(["lumen", "--time-limit", "1.5"]).unwrap();
        assert_eq!(cli.time_limit, Some(Duration::from_millis(1500)));
        assert!(Cli::try_parse_from(["lumen", "--time-limit", "-1"]).is_err());
        assert!(Cli::try_parse_from(["lumen", "--time-limit", "soon"]).is_err());
    }

    #[test]
    fn test_run_writes_image() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("demo.png");
        let cli = Cli::try_parse_from([
            "lumen",
            "--width", "24",
            "--height", "16",
            "--samples", "2",
            "--bands", "3",
            "--workers", "2",
            "--seed", "1",
            "--random-shapes", "10",
            "-o", output.to_str().unwrap(),
        ])
        .unwrap();

        run(&cli).unwrap();
        let image = image::open(&output).unwrap();
        assert_eq!((image.width(), image.height()), (24, 16));
    }

    #[test]
    fn test_run_scene_file_raw() {
        let dir = tempfile::tempdir().unwrap();
        let scene_path = dir.path().join("scene.json");
        std::fs::write(
            &scene_path,
            r#"{
                "settings": { "width": 8, "height": 4, "samples_per_pixel": 1, "band_count": 1, "seed": 2 },
                "camera": { "look_from": [0, 0, 5], "look_at": [0, 0, 0] },
                "spheres": [ { "center": [0, 0, 0], "radius": 1, "material": { "type": "diffuse", "albedo": [0.5, 0.5, 0.5] } } ]
            }"#,
        )
        .unwrap();
        let output = dir.path().join("frame.raw");

        let cli = Cli::try_parse_from([
            "lumen",
            scene_path.to_str().unwrap(),
            "--workers", "1",
            "-o", output.to_str().unwrap(),
        ])
        .unwrap();
        run(&cli).unwrap();

        assert_eq!(std::fs::metadata(&output).unwrap().len(), 8 * 4 * 4 * 4);
    }

    #[test]
    fn test_bad_scene_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let scene_path = dir.path().join("broken.json");
        std::fs::write(&scene_path, "{ not json").unwrap();

        let cli = Cli::try_parse_from(["lumen", scene_path.to_str().unwrap()]).unwrap();
        let err = run(&cli).unwrap_err();
        assert!(format!("{err:#}").contains("broken.json"));
    }
}
