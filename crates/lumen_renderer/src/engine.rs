//! Render engine: owns a scene, a camera and a framebuffer and drives frames
//! through the task scheduler.
//!
//! State machine:
//!
//! ```text
//! Idle --start--> Rendering --cancel--> CancelRequested --(bands observe)--> Idle
//!                     \----------------(frame finishes)--------------------> Idle
//! ```
//!
//! A frame started with [`RenderEngine::start_render`] is coordinated on a
//! dedicated render thread which submits one work unit per band and awaits
//! them, so the calling thread (typically a UI loop) returns at once and a
//! pool with a single worker cannot deadlock.

use crate::band::{split_rows, Band};
use crate::framebuffer::Framebuffer;
use crate::renderer::{band_rng, render_band, RenderSettings};
use crate::scheduler::{panic_message, TaskScheduler};
use crate::{Camera, RenderError, RenderResult, Scene};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Lifecycle state of the engine.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Idle = 0,
    Rendering = 1,
    CancelRequested = 2,
}

impl RenderState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RenderState::Rendering,
            2 => RenderState::CancelRequested,
            _ => RenderState::Idle,
        }
    }
}

/// Outcome of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderReport {
    pub elapsed: Duration,
    /// A cancel request was observed before the frame settled
    pub cancelled: bool,
    pub pixels_written: usize,
    pub bands: usize,
}

/// Everything a band needs, shared read-only while a frame is in flight.
struct Frame {
    scene: Scene,
    camera: Camera,
    settings: RenderSettings,
    framebuffer: Arc<Framebuffer>,
}

/// Multi-threaded renderer for one scene.
///
/// The engine is an explicit context object: several engines may coexist
/// and may share one [`TaskScheduler`].
pub struct RenderEngine {
    frame: Arc<Frame>,
    state: Arc<AtomicU8>,
    scheduler: Arc<TaskScheduler>,
    coordinator: Mutex<Option<JoinHandle<RenderResult<RenderReport>>>>,
}

impl RenderEngine {
    /// Create an engine with its own scheduler sized from the hardware.
    pub fn new(settings: RenderSettings, scene: Scene, camera: Camera) -> RenderResult<Self> {
        let scheduler = Arc::new(TaskScheduler::new()?);
        Self::with_scheduler(settings, scene, camera, scheduler)
    }

    /// Create an engine running its bands on `scheduler`.
    ///
    /// Validates the settings, matches the camera aspect to the image, checks
    /// the camera basis and builds the BVH when the spatial index is requested.
    pub fn with_scheduler(
        settings: RenderSettings,
        mut scene: Scene,
        camera: Camera,
        scheduler: Arc<TaskScheduler>,
    ) -> RenderResult<Self> {
        settings.validate()?;
        let camera = camera.with_aspect(settings.aspect_ratio());
        camera.validate()?;
        prepare_index(&mut scene, settings.use_spatial_index)?;

        let frame = Frame {
            camera,
            framebuffer: Arc::new(Framebuffer::new(settings.width, settings.height)),
            scene,
            settings,
        };

        Ok(Self {
            frame: Arc::new(frame),
            state: Arc::new(AtomicU8::new(RenderState::Idle as u8)),
            scheduler,
            coordinator: Mutex::new(None),
        })
    }

    /// Apply new settings. Only valid while idle.
    ///
    /// Reallocates the framebuffer; readers holding the previous one keep
    /// the last frame. The index is rebuilt or disabled to match
    /// `use_spatial_index`.
    pub fn configure(&mut self, settings: RenderSettings) -> RenderResult<()> {
        settings.validate()?;
        let frame = self.frame_mut()?;

        prepare_index(&mut frame.scene, settings.use_spatial_index)?;
        frame.camera = frame.camera.clone().with_aspect(settings.aspect_ratio());
        frame.framebuffer = Arc::new(Framebuffer::new(settings.width, settings.height));
        frame.settings = settings;

        log::debug!(
            "Engine configured: {}x{}, {} spp, depth {}, {} bands",
            frame.settings.width,
            frame.settings.height,
            frame.settings.samples_per_pixel,
            frame.settings.max_depth,
            frame.settings.band_count
        );
        Ok(())
    }

    /// Change the scene while idle. The index is rebuilt afterwards when the
    /// settings ask for one.
    pub fn edit_scene(&mut self, edit: impl FnOnce(&mut Scene)) -> RenderResult<()> {
        let frame = self.frame_mut()?;
        edit(&mut frame.scene);
        prepare_index(&mut frame.scene, frame.settings.use_spatial_index)
    }

    /// Replace the camera while idle, keeping the image aspect ratio.
    ///
    /// A camera with a degenerate basis is rejected and the old one kept.
    pub fn set_camera(&mut self, camera: Camera) -> RenderResult<()> {
        let frame = self.frame_mut()?;
        let camera = camera.with_aspect(frame.settings.aspect_ratio());
        camera.validate()?;
        frame.camera = camera;
        Ok(())
    }

    /// Exclusive access to the frame data, which requires an idle engine.
    fn frame_mut(&mut self) -> RenderResult<&mut Frame> {
        if self.state() != RenderState::Idle {
            return Err(RenderError::Busy);
        }
        self.reap_coordinator();
        Arc::get_mut(&mut self.frame).ok_or(RenderError::Busy)
    }

    /// Join a coordinator whose report nobody collected.
    fn reap_coordinator(&self) {
        if let Some(handle) = self.coordinator.lock().take() {
            match handle.join() {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => log::warn!("Uncollected frame had failed: {}", e),
                Err(_) => log::error!("Render thread panicked"),
            }
        }
    }

    /// Start a frame in the background.
    ///
    /// Returns `Ok(false)` without doing anything unless the engine is idle.
    pub fn start_render(&self) -> RenderResult<bool> {
        if !self.transition(RenderState::Idle, RenderState::Rendering) {
            return Ok(false);
        }
        self.reap_coordinator();
        self.frame.framebuffer.clear();

        let frame = Arc::clone(&self.frame);
        let state = Arc::clone(&self.state);
        let scheduler = Arc::clone(&self.scheduler);
        let spawned = thread::Builder::new()
            .name("lumen-render".into())
            .spawn(move || run_frame(&frame, &state, &scheduler));

        match spawned {
            Ok(handle) => {
                *self.coordinator.lock() = Some(handle);
                Ok(true)
            }
            Err(e) => {
                self.state.store(RenderState::Idle as u8, Ordering::Release);
                Err(RenderError::Spawn(e))
            }
        }
    }

    /// Ask the frame in flight to stop. Returns false unless rendering.
    ///
    /// Bands poll the request after every pixel, so a few more pixels may
    /// land before the frame settles back to idle.
    pub fn cancel_render(&self) -> bool {
        let requested = self.transition(RenderState::Rendering, RenderState::CancelRequested);
        if requested {
            log::info!("Cancelling render");
        }
        requested
    }

    /// True while a frame is in flight, including while a cancel request is
    /// being honored.
    pub fn is_rendering(&self) -> bool {
        self.state() != RenderState::Idle
    }

    pub fn state(&self) -> RenderState {
        RenderState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Block until the background frame settles and return its report.
    ///
    /// Returns `Ok(None)` when no background frame was started since the
    /// last call.
    pub fn wait(&self) -> RenderResult<Option<RenderReport>> {
        let Some(handle) = self.coordinator.lock().take() else {
            return Ok(None);
        };
        match handle.join() {
            Ok(result) => result.map(Some),
            Err(payload) => Err(RenderError::TaskPanicked(panic_message(payload.as_ref()))),
        }
    }

    /// Render a whole frame, blocking the calling thread until it settles.
    ///
    /// With a single band the frame runs on the calling thread; otherwise
    /// the bands go to the scheduler. Fails with [`RenderError::Busy`] if a
    /// frame is already in flight.
    pub fn render(&self) -> RenderResult<RenderReport> {
        if !self.transition(RenderState::Idle, RenderState::Rendering) {
            return Err(RenderError::Busy);
        }
        self.reap_coordinator();
        self.frame.framebuffer.clear();
        run_frame(&self.frame, &self.state, &self.scheduler)
    }

    fn transition(&self, from: RenderState, to: RenderState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Framebuffer of the current configuration, readable during a frame.
    pub fn framebuffer(&self) -> Arc<Framebuffer> {
        Arc::clone(&self.frame.framebuffer)
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.frame.settings
    }

    pub fn scene(&self) -> &Scene {
        &self.frame.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.frame.camera
    }

    pub fn scheduler(&self) -> &Arc<TaskScheduler> {
        &self.scheduler
    }
}

impl Drop for RenderEngine {
    fn drop(&mut self) {
        self.cancel_render();
        self.reap_coordinator();
    }
}

fn prepare_index(scene: &mut Scene, use_spatial_index: bool) -> RenderResult<()> {
    if !use_spatial_index {
        scene.disable_index();
    } else if !scene.has_index() {
        scene.build_index()?;
    }
    Ok(())
}

/// Puts the engine back to idle however the frame ends.
struct IdleOnDrop<'a>(&'a AtomicU8);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(RenderState::Idle as u8, Ordering::Release);
    }
}

/// Render every band of the frame and wait for all of them.
///
/// The caller has already moved the state to `Rendering`.
fn run_frame(
    frame: &Arc<Frame>,
    state: &Arc<AtomicU8>,
    scheduler: &TaskScheduler,
) -> RenderResult<RenderReport> {
    let _idle = IdleOnDrop(state.as_ref());
    let start = Instant::now();
    let settings = &frame.settings;
    let bands = split_rows(settings.height, settings.effective_band_count());

    log::info!(
        "Rendering {}x{}, {} spp, depth {}, {} bands, BVH {}",
        settings.width,
        settings.height,
        settings.samples_per_pixel,
        settings.max_depth,
        bands.len(),
        if frame.scene.has_index() { "on" } else { "off" }
    );

    let written = if let [band] = bands.as_slice() {
        panic::catch_unwind(AssertUnwindSafe(|| render_frame_band(frame, state, band)))
            .map_err(|payload| RenderError::TaskPanicked(panic_message(payload.as_ref())))
    } else {
        let handles: Vec<_> = bands
            .iter()
            .map(|&band| {
                let frame = Arc::clone(frame);
                let state = Arc::clone(state);
                scheduler.submit(move || render_frame_band(&frame, &state, &band))
            })
            .collect();

        // Every handle is awaited even after a failure; the first error wins
        let mut written = 0;
        let mut first_error = None;
        for handle in handles {
            match handle.wait() {
                Ok(pixels) => written += pixels,
                Err(e) => {
                    log::error!("Band task failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(written),
        }
    };

    let cancelled = state.load(Ordering::Acquire) == RenderState::CancelRequested as u8;
    let elapsed = start.elapsed();
    let pixels_written = written?;

    log::info!(
        "Rendering {} in {:.2?} ({} pixels)",
        if cancelled { "CANCELLED" } else { "DONE" },
        elapsed,
        pixels_written
    );

    Ok(RenderReport {
        elapsed,
        cancelled,
        pixels_written,
        bands: bands.len(),
    })
}

fn render_frame_band(frame: &Frame, state: &AtomicU8, band: &Band) -> usize {
    let mut rng = band_rng(frame.settings.seed, band.index);
    render_band(
        band,
        &frame.camera,
        &frame.scene,
        &frame.settings,
        &frame.framebuffer,
        &mut rng,
        || state.load(Ordering::Relaxed) == RenderState::CancelRequested as u8,
    )
}
