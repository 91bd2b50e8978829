use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use pt_renderer::{cornell_box, PathTracer, RenderConfig, Scene, Tiling};

/// Render the built-in Cornell box with the path tracer.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Output PNG path
    #[arg(short, long, default_value = "render.png")]
    output: PathBuf,

    /// JSON render configuration; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Image width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Image height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Samples per pixel
    #[arg(short, long, default_value_t = 64)]
    samples: u32,

    /// Bounces before Russian roulette
    #[arg(short, long)]
    trace_depth: Option<u32>,

    /// Base random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Disable next-event estimation
    #[arg(long)]
    no_nee: bool,

    /// Render scanlines instead of square buckets
    #[arg(long)]
    scanlines: bool,

    /// Render with the wgpu compute backend
    #[cfg(feature = "gpu")]
    #[arg(long)]
    gpu: bool,
}

impl Args {
    fn render_config(&self) -> Result<RenderConfig> {
        let mut config = match &self.config {
            Some(path) => RenderConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
            None => RenderConfig::default().with_resolution(512, 512).with_trace_depth(4),
        };
        if self.width.is_some() || self.height.is_some() {
            let (width, height) = (self.width.unwrap_or(config.width), self.height.unwrap_or(config.height));
            config = config.with_resolution(width, height);
        }
        if let Some(depth) = self.trace_depth {
            config = config.with_trace_depth(depth);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if self.no_nee {
            config = config.with_next_event_estimation(false);
        }
        if self.scanlines {
            config = config.with_tiling(Tiling::Scanlines);
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();
    let config = args.render_config()?;
    log::info!(
        "Rendering {}x{} at {} spp (trace depth {}, NEE {})",
        config.width,
        config.height,
        args.samples,
        config.trace_depth,
        config.next_event_estimation
    );

    let demo = cornell_box().context("building demo scene")?;
    let scene = Scene::build(demo.triangles, demo.materials);

    #[cfg(feature = "gpu")]
    {
        if args.gpu {
            return render_gpu(&args, config, &scene, demo.camera);
        }
    }

    let start = Instant::now();
    let mut tracer = PathTracer::new(config)?;
    tracer.set_scene(Arc::new(scene));
    tracer.set_camera(demo.camera);
    let samples = tracer.render_samples(args.samples);
    log::info!("Finished {} spp in {:.2?}", samples, start.elapsed());

    tracer
        .save_png(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    Ok(())
}

#[cfg(feature = "gpu")]
fn render_gpu(args: &Args, config: RenderConfig, scene: &Scene, camera: pt_renderer::Camera) -> Result<()> {
    let start = Instant::now();

    let mut renderer = pt_renderer::GpuRenderer::new(config)?;
    renderer.upload_scene(scene)?;
    renderer.set_camera(camera);
    for _ in 0..args.samples {
        if renderer.render_frame()? == pt_renderer::FrameStatus::Cancelled {
            break;
        }
    }
    log::info!("GPU finished {} spp in {:.2?}", renderer.samples(), start.elapsed());

    renderer
        .save_png(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    Ok(())
}
