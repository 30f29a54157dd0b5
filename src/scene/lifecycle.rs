//! Viewer lifecycle: init, the frame loop, resize and teardown
//!
//! Teardown runs in a fixed order: stop the loop, release the batch and its
//! GPU buffers, release the autofocus raycaster, release the device, then
//! clear the scene's collections. A second `dispose()` does nothing.

use glam::Vec2;

use super::Scene;
use crate::consts::MAX_FRAME_DT;
use crate::contestants::ContestantRoster;
use crate::error::{FrameError, InitError};
use crate::renderer::batch::ResourceCounts;
use crate::renderer::catalog::GeometryProvider;
use crate::renderer::FrameRenderer;
use crate::settings::Settings;

/// dt used for the first frame after (re)starting
const FIRST_FRAME_DT: f32 = 1.0 / 60.0;

/// Cooperative frame scheduling state
#[derive(Debug, Clone, Default)]
pub struct FrameLoop {
    running: bool,
    last_time: Option<f64>,
    elapsed: f64,
    frames: u64,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when already running
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        self.last_time = None;
        true
    }

    /// Returns false when already stopped
    pub fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        self.last_time = None;
        true
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Feed a frame timestamp (milliseconds). Returns the clamped dt in
    /// seconds, or None while stopped.
    pub fn tick(&mut self, now_ms: f64) -> Option<f32> {
        if !self.running {
            return None;
        }
        let dt = match self.last_time {
            Some(last) => ((now_ms - last) / 1000.0) as f32,
            None => FIRST_FRAME_DT,
        };
        self.last_time = Some(now_ms);
        Some(self.accumulate(dt))
    }

    /// Advance by a fixed dt (seconds), for drivers without timestamps
    pub fn advance(&mut self, dt: f32) -> Option<f32> {
        if !self.running {
            return None;
        }
        Some(self.accumulate(dt))
    }

    fn accumulate(&mut self, dt: f32) -> f32 {
        let dt = dt.clamp(0.0, MAX_FRAME_DT);
        self.elapsed += dt as f64;
        self.frames += 1;
        dt
    }

    /// Seconds spent running
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

/// A scene bound to a presentation backend
pub struct Viewer<R: FrameRenderer> {
    scene: Scene,
    renderer: R,
    frame_loop: FrameLoop,
    settings: Settings,
    /// Drawable size last handed to the backend
    physical_size: (u32, u32),
    frame_errors: u64,
    disposed: bool,
}

impl<R: FrameRenderer> Viewer<R> {
    /// Build the scene, then the backend. On failure everything created so
    /// far is released before the error is returned.
    pub fn init(
        settings: &Settings,
        roster: ContestantRoster,
        provider: &dyn GeometryProvider,
        viewport: Vec2,
        seed: u64,
        make_renderer: impl FnOnce(&Scene) -> Result<R, InitError>,
    ) -> Result<Self, InitError> {
        let scene = Scene::new(settings, roster, provider, viewport, seed).inspect_err(|e| {
            log::error!("Scene initialization failed: {}", e);
        })?;
        let renderer = make_renderer(&scene);
        Self::assemble(settings, scene, renderer)
    }

    /// Bind an already-built scene to a backend result (for async backends)
    pub fn assemble(settings: &Settings, mut scene: Scene, renderer: Result<R, InitError>) -> Result<Self, InitError> {
        let mut renderer = match renderer {
            Ok(renderer) => renderer,
            Err(e) => {
                log::error!("Renderer initialization failed: {}", e);
                scene.release_batch();
                scene.release_optics();
                scene.clear();
                return Err(e);
            }
        };

        renderer.upload_scene(scene.batch());

        let viewport = scene.camera().viewport();
        let ratio = settings.render_pixel_ratio(1.0);
        let mut frame_loop = FrameLoop::new();
        frame_loop.start();
        log::info!("Viewer ready");

        Ok(Self {
            scene,
            renderer,
            frame_loop,
            settings: settings.clone(),
            physical_size: (
                (viewport.x * ratio).round() as u32,
                (viewport.y * ratio).round() as u32,
            ),
            frame_errors: 0,
            disposed: false,
        })
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Frames whose render submission failed and was skipped
    pub fn frame_errors(&self) -> u64 {
        self.frame_errors
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn resource_counts(&self) -> ResourceCounts {
        self.scene.resource_counts()
    }

    /// Run a frame for a timestamp in milliseconds. Returns false while
    /// stopped.
    pub fn frame(&mut self, now_ms: f64) -> bool {
        match self.frame_loop.tick(now_ms) {
            Some(dt) => {
                self.run_frame(dt);
                true
            }
            None => false,
        }
    }

    /// Run a frame with a fixed dt in seconds
    pub fn step(&mut self, dt: f32) -> bool {
        match self.frame_loop.advance(dt) {
            Some(dt) => {
                self.run_frame(dt);
                true
            }
            None => false,
        }
    }

    fn run_frame(&mut self, dt: f32) {
        self.scene.update(dt);
        match self.renderer.render(&self.scene.frame_view()) {
            Ok(()) => {}
            Err(FrameError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                self.frame_errors += 1;
                log::warn!("Surface lost, reconfiguring");
                self.renderer.reconfigure();
            }
            Err(e) => {
                self.frame_errors += 1;
                log::warn!("Frame skipped: {}", e);
            }
        }
    }

    pub fn start_animation(&mut self) {
        if !self.disposed && self.frame_loop.start() {
            log::debug!("Animation started");
        }
    }

    pub fn stop_animation(&mut self) {
        if self.frame_loop.stop() {
            log::debug!("Animation stopped");
        }
    }

    pub fn is_animating(&self) -> bool {
        self.frame_loop.is_running()
    }

    /// Resize to a CSS-pixel viewport at a device pixel ratio. Returns false
    /// when nothing changed or the size is zero.
    pub fn resize(&mut self, width: f32, height: f32, device_ratio: f32) -> bool {
        if self.disposed || width <= 0.0 || height <= 0.0 {
            return false;
        }
        let viewport_changed = self.scene.resize_viewport(width, height);
        let ratio = self.settings.render_pixel_ratio(device_ratio);
        let physical = ((width * ratio).round() as u32, (height * ratio).round() as u32);
        if physical == self.physical_size && !viewport_changed {
            return false;
        }
        self.physical_size = physical;
        self.renderer.resize(physical.0, physical.1);
        log::info!("Resized to {}x{} ({}x{} physical)", width, height, physical.0, physical.1);
        true
    }

    /// Tear everything down. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.frame_loop.stop();
        self.scene.release_batch();
        self.renderer.release_scene();
        self.scene.release_optics();
        self.renderer.release_device();
        self.scene.clear();
        self.disposed = true;

        let counts = self.scene.resource_counts();
        if !counts.is_zero() {
            log::error!("Resources still live after dispose: {:?}", counts);
        }
        log::info!("Viewer disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::headless::HeadlessRenderer;
    use crate::renderer::shapes::ProceduralShapes;

    fn settings() -> Settings {
        Settings {
            zone_width: 6,
            zone_height: 4,
            ..Settings::default()
        }
    }

    fn viewer() -> Viewer<HeadlessRenderer> {
        Viewer::init(
            &settings(),
            ContestantRoster::default(),
            &ProceduralShapes::default(),
            Vec2::new(640.0, 480.0),
            5,
            |_| Ok(HeadlessRenderer::new(640, 480)),
        )
        .unwrap()
    }

    #[test]
    fn test_frame_loop_clamps_dt() {
        let mut frame_loop = FrameLoop::new();
        frame_loop.start();
        assert_eq!(frame_loop.tick(1000.0), Some(FIRST_FRAME_DT));
        assert_eq!(frame_loop.tick(3000.0), Some(MAX_FRAME_DT));
        let dt = frame_loop.tick(3016.0).unwrap();
        assert!((dt - 0.016).abs() < 1e-5);
    }

    #[test]
    fn test_elapsed_only_while_running() {
        let mut frame_loop = FrameLoop::new();
        assert_eq!(frame_loop.advance(0.05), None);
        frame_loop.start();
        frame_loop.advance(0.05);
        frame_loop.stop();
        frame_loop.advance(0.05);
        assert!((frame_loop.elapsed() - 0.05).abs() < 1e-6);
        assert_eq!(frame_loop.frames(), 1);
    }

    #[test]
    fn test_failed_renderer_rejects_init() {
        let result: Result<Viewer<HeadlessRenderer>, _> = Viewer::init(
            &settings(),
            ContestantRoster::default(),
            &ProceduralShapes::default(),
            Vec2::new(640.0, 480.0),
            5,
            |_| Err(InitError::Adapter("no adapter".into())),
        );
        assert!(matches!(result, Err(InitError::Adapter(_))));
    }

    #[test]
    fn test_oversized_zone_rejects_init() {
        for (width, height) in [(100_000, 100_000), (i32::MAX, 2)] {
            let settings = Settings {
                zone_width: width,
                zone_height: height,
                ..Settings::default()
            };
            let result: Result<Viewer<HeadlessRenderer>, _> = Viewer::init(
                &settings,
                ContestantRoster::default(),
                &ProceduralShapes::default(),
                Vec2::new(640.0, 480.0),
                5,
                |_| Ok(HeadlessRenderer::new(640, 480)),
            );
            assert!(matches!(result, Err(InitError::ZoneTooLarge { .. })), "{width}x{height}");
        }
    }

    #[test]
    fn test_geometry_uploaded_at_init() {
        let mut viewer = viewer();
        assert_eq!(viewer.renderer().uploads(), 1);
        assert_eq!(viewer.renderer().frames(), 0);
        for _ in 0..5 {
            viewer.step(1.0 / 60.0);
        }
        assert_eq!(viewer.renderer().uploads(), 1);
    }

    #[test]
    fn test_transient_errors_skip_frames() {
        let mut viewer = viewer();
        viewer.renderer_mut().fail_next_frames(3);
        for _ in 0..10 {
            assert!(viewer.step(1.0 / 60.0));
        }
        assert_eq!(viewer.frame_errors(), 3);
        assert_eq!(viewer.renderer().frames(), 7);
    }

    #[test]
    fn test_stop_and_start() {
        let mut viewer = viewer();
        viewer.stop_animation();
        assert!(!viewer.step(0.016));
        let elapsed = viewer.scene().elapsed();
        viewer.start_animation();
        assert!(viewer.step(0.016));
        assert!(viewer.scene().elapsed() > elapsed);
    }

    #[test]
    fn test_resize_idempotent() {
        let mut viewer = viewer();
        assert!(viewer.resize(800.0, 600.0, 1.0));
        assert!(!viewer.resize(800.0, 600.0, 1.0));
        assert!(!viewer.resize(0.0, 600.0, 1.0));
        assert_eq!(viewer.renderer().size(), (800, 600));
    }

    #[test]
    fn test_dispose_twice() {
        let mut viewer = viewer();
        viewer.step(0.016);
        viewer.dispose();
        assert!(viewer.resource_counts().is_zero());
        assert!(viewer.renderer().is_released());
        assert!(viewer.scene().is_torn_down());
        assert!(viewer.scene().wave().colors(0).is_none());
        assert!(!viewer.is_animating());
        viewer.dispose();
        assert!(viewer.resource_counts().is_zero());
        viewer.start_animation();
        assert!(!viewer.step(0.016));
    }
}
