//! Render the built-in Cornell box to `cornell_box.png`.
//!
//! Run with `RUST_LOG=info` to see scene and frame statistics.

use std::sync::Arc;

use pt_renderer::{cornell_box, PathTracer, RenderConfig, Scene};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let demo = cornell_box()?;
    let scene = Scene::build(demo.triangles, demo.materials);

    let config = RenderConfig::default().with_resolution(400, 400).with_trace_depth(4);
    let mut tracer = PathTracer::new(config)?;
    tracer.set_scene(Arc::new(scene));
    tracer.set_camera(demo.camera);

    let samples = tracer.render_samples(64);
    tracer.save_png("cornell_box.png")?;
    println!("Rendered {} samples per pixel to cornell_box.png", samples);
    Ok(())
}
