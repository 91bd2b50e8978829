//! Progressive path tracing renderer.
//!
//! [`PathTracer`] owns the scene snapshot, camera, render settings and the
//! accumulation buffer. Each call to [`PathTracer::render_frame`] adds one
//! sample per pixel, rendered tile by tile in parallel with rayon.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use pt_math::Vec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::accumulator::Accumulator;
use crate::bucket::{render_bucket, Bucket, BucketResult, Tiling};
use crate::camera::Camera;
use crate::control::RenderControl;
use crate::error::{RenderError, Result};
use crate::integrator::Integrator;
use crate::scene::Scene;

/// Render configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Bounces before Russian roulette may terminate a path
    pub trace_depth: u32,
    /// Hard cap on path length
    pub max_depth: u32,
    /// Radiance returned by rays that leave the scene
    pub background: Vec3,
    /// Sample one light per diffuse bounce with a shadow ray
    pub next_event_estimation: bool,
    /// Tile layout for parallel dispatch
    pub tiling: Tiling,
    /// Base seed for the per-pixel random streams
    pub seed: u64,
    /// Gamma-2 encode 8-bit output
    pub gamma: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            trace_depth: 3,
            max_depth: 32,
            background: Vec3::ZERO,
            next_event_estimation: true,
            tiling: Tiling::default(),
            seed: 0,
            gamma: true,
        }
    }
}

impl RenderConfig {
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_trace_depth(mut self, trace_depth: u32) -> Self {
        self.trace_depth = trace_depth;
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_background(mut self, background: Vec3) -> Self {
        self.background = background;
        self
    }

    pub fn with_next_event_estimation(mut self, enabled: bool) -> Self {
        self.next_event_estimation = enabled;
        self
    }

    pub fn with_tiling(mut self, tiling: Tiling) -> Self {
        self.tiling = tiling;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_gamma(mut self, gamma: bool) -> Self {
        self.gamma = gamma;
        self
    }

    /// Parse a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Reject an empty image and clamp the depths to `1 <= trace_depth <= max_depth`.
    ///
    /// Both backends start from the configuration returned here.
    pub fn validated(mut self) -> Result<Self> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidResolution {
                width: self.width,
                height: self.height,
            });
        }
        self.max_depth = self.max_depth.max(1);
        self.trace_depth = self.trace_depth.clamp(1, self.max_depth);
        Ok(self)
    }
}

/// Outcome of [`PathTracer::render_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Every tile finished and the sample was added to the image
    Completed,
    /// Exit was requested; nothing was added
    Cancelled,
}

/// Progressive CPU path tracer.
pub struct PathTracer {
    scene: Arc<Scene>,
    camera: Camera,
    config: RenderConfig,
    accumulator: Accumulator,
    control: RenderControl,
    buckets: Vec<Bucket>,
}

impl PathTracer {
    /// Create a renderer with an empty scene and the default camera.
    pub fn new(config: RenderConfig) -> Result<Self> {
        let config = config.validated()?;

        let buckets = config.tiling.tiles(config.width, config.height);
        Ok(Self {
            scene: Arc::new(Scene::empty()),
            camera: Camera::default(),
            accumulator: Accumulator::new(config.width, config.height),
            control: RenderControl::new(),
            buckets,
            config,
        })
    }

    /// Swap in a new scene snapshot. The image is not cleared; call
    /// [`PathTracer::reset_image`] when old samples should be discarded.
    pub fn set_scene(&mut self, scene: Arc<Scene>) {
        log::info!("Scene set: {} triangles, {} lights", scene.triangle_count(), scene.lights().len());
        self.scene = scene;
    }

    pub fn scene(&self) -> &Arc<Scene> {
        &self.scene
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Handle for requesting exit or reset from other threads.
    pub fn control(&self) -> RenderControl {
        self.control.clone()
    }

    /// Render one sample per pixel and add it to the image.
    ///
    /// Exit is polled before every tile. If it is raised while the frame is
    /// in flight, the finished tiles are dropped and the image and sample
    /// counter stay as they were.
    ///
    /// A camera without a valid basis contributes a black sample: the counter
    /// still advances, so earlier samples are dimmed rather than replaced.
    /// Call [`PathTracer::reset_image`] first for an all-black image.
    pub fn render_frame(&mut self) -> FrameStatus {
        if self.control.take_reset() {
            self.accumulator.reset();
        }
        if self.control.is_exit_requested() {
            return FrameStatus::Cancelled;
        }

        let start = Instant::now();
        let sample_index = self.accumulator.samples();

        let Some(frame) = self.camera.frame(self.config.width, self.config.height) else {
            log::warn!("Degenerate camera basis, frame {} rendered black", sample_index);
            self.accumulator.commit_black();
            return FrameStatus::Completed;
        };

        let integrator = Integrator::new(&self.scene, &self.config);
        let seed = self.config.seed;
        let control = &self.control;

        let tiles: Option<Vec<BucketResult>> = self
            .buckets
            .par_iter()
            .map(|bucket| {
                if control.is_exit_requested() {
                    None
                } else {
                    Some(render_bucket(bucket, &frame, &integrator, sample_index, seed))
                }
            })
            .collect();

        match tiles {
            Some(tiles) => {
                self.accumulator.commit_tiles(&tiles);
                log::debug!(
                    "Frame {} rendered in {:.1} ms ({} tiles)",
                    sample_index,
                    start.elapsed().as_secs_f64() * 1000.0,
                    tiles.len()
                );
                FrameStatus::Completed
            }
            None => {
                log::debug!("Frame {} cancelled", sample_index);
                FrameStatus::Cancelled
            }
        }
    }

    /// Render frames until the image holds `target` samples per pixel or
    /// exit is requested. Returns the sample count reached.
    pub fn render_samples(&mut self, target: u32) -> u32 {
        let start = Instant::now();
        while self.accumulator.samples() < target {
            if self.render_frame() == FrameStatus::Cancelled {
                break;
            }
        }
        log::info!(
            "Rendered {} spp in {:.2} s",
            self.accumulator.samples(),
            start.elapsed().as_secs_f64()
        );
        self.accumulator.samples()
    }

    /// Clear the accumulated image and sample counter.
    pub fn reset_image(&mut self) {
        self.accumulator.reset();
    }

    /// Stop rendering; see [`RenderControl::exit`].
    pub fn exit(&self) {
        self.control.exit();
    }

    /// Set the bounce count after which Russian roulette starts, clamped to
    /// `1..=max_depth`.
    pub fn set_trace_depth(&mut self, trace_depth: u32) {
        self.config.trace_depth = trace_depth.clamp(1, self.config.max_depth);
    }

    /// Change the output size. Reallocates and clears the image.
    pub fn set_resolution(&mut self, width: u32, height: u32) -> Result<()> {
        let config = self.config.clone().with_resolution(width, height);
        let config = config.validated()?;
        self.config = config;
        self.accumulator = Accumulator::new(width, height);
        self.buckets = self.config.tiling.tiles(width, height);
        Ok(())
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Number of samples per pixel in the current image.
    pub fn samples(&self) -> u32 {
        self.accumulator.samples()
    }

    pub fn triangle_count(&self) -> usize {
        self.scene.triangle_count()
    }

    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    /// Averaged image as 8-bit RGB, top row first.
    pub fn output_rgb8(&self) -> Vec<u8> {
        self.accumulator.to_rgb8(self.config.gamma)
    }

    /// Averaged linear image clamped to [0, 1], top row first.
    pub fn output_rgb_f32(&self) -> Vec<f32> {
        self.accumulator.to_rgb_f32()
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.accumulator.save_png(path, self.config.gamma)
    }
}
