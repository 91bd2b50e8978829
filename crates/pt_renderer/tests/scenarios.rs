//! End-to-end rendering scenarios.

use std::sync::Arc;
use std::time::Duration;

use pt_core::{Material, Triangle};
use pt_renderer::{
    closest_hit_linear, Bvh, Camera, CookTorrance, FrameStatus, GpuSceneData, Integrator, Interval, PathTracer, Ray,
    RenderConfig, Scene, Vec3,
};
use rand::rngs::{SmallRng, StdRng};
use rand::{Rng, SeedableRng};

/// Axis-aligned quad in the plane `y = center.y`.
fn horizontal_quad(center: Vec3, half: f32, material: u32) -> Vec<Triangle> {
    let p = [
        center + Vec3::new(-half, 0.0, -half),
        center + Vec3::new(-half, 0.0, half),
        center + Vec3::new(half, 0.0, half),
        center + Vec3::new(half, 0.0, -half),
    ];
    vec![
        Triangle::new(p[0], p[1], p[2], material),
        Triangle::new(p[0], p[2], p[3], material),
    ]
}

/// Axis-aligned box as 12 triangles.
fn cube(min: Vec3, max: Vec3, material: u32) -> Vec<Triangle> {
    let c = |i: usize| {
        Vec3::new(
            if i & 1 == 0 { min.x } else { max.x },
            if i & 2 == 0 { min.y } else { max.y },
            if i & 4 == 0 { min.z } else { max.z },
        )
    };
    let faces = [
        [0, 2, 1, 1, 2, 3],
        [4, 5, 6, 5, 7, 6],
        [0, 1, 4, 1, 5, 4],
        [2, 6, 3, 3, 6, 7],
        [0, 4, 2, 2, 4, 6],
        [1, 3, 5, 3, 7, 5],
    ];
    faces
        .iter()
        .flat_map(|f| {
            [
                Triangle::new(c(f[0]), c(f[1]), c(f[2]), material),
                Triangle::new(c(f[3]), c(f[4]), c(f[5]), material),
            ]
        })
        .collect()
}

fn random_triangles(count: usize, seed: u64) -> Vec<Triangle> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let center = Vec3::new(rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0));
            let mut corner = || center + Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
            let (a, b, c) = (corner(), corner(), corner());
            Triangle::new(a, b, c, 0)
        })
        .collect()
}

#[test]
fn test_direct_lighting_converges_to_quadrature() {
    let emission = 10.0;
    let half = 0.05;
    let light_center = Vec3::new(0.0, 1.0, 0.0);

    let mut tris = horizontal_quad(Vec3::ZERO, 2.0, 0);
    tris.extend(horizontal_quad(light_center, half, 1));
    let materials = vec![
        Material::new("floor", Vec3::splat(0.5)),
        Material::light("light", Vec3::ONE, emission),
    ];
    let scene = Scene::build(tris, materials);
    let config = RenderConfig::default();
    let integrator = Integrator::new(&scene, &config);

    // Looking down at the floor from the side, never through the light
    let origin = Vec3::new(1.5, 0.5, 0.3);
    let target = Vec3::new(0.2, 0.0, 0.1);
    let ray = Ray::new(origin, (target - origin).normalize());

    let samples = 4096;
    let mut rng = SmallRng::seed_from_u64(17);
    let mut sum = Vec3::ZERO;
    for _ in 0..samples {
        sum += integrator.radiance(ray, &mut rng);
    }
    let estimate = sum / samples as f32;

    // Midpoint quadrature of f_d * Le * cos * cos / d^2 over the light, the
    // diffuse lobe being the only one a non-reflective floor samples
    let brdf = CookTorrance::new(Vec3::splat(0.5), 0.0, 0.5);
    let wo = -ray.direction;
    let n = 100;
    let cell = 2.0 * half / n as f32;
    let mut expected = Vec3::ZERO;
    for i in 0..n {
        for j in 0..n {
            let x = -half + (i as f32 + 0.5) * cell;
            let z = -half + (j as f32 + 0.5) * cell;
            let to_light = light_center + Vec3::new(x, 0.0, z) - target;
            let d2 = to_light.length_squared();
            let l = to_light / d2.sqrt();
            let f = brdf.evaluate_diffuse(Vec3::Y, wo, l).unwrap();
            expected += f * emission * (l.y * l.y / d2) * (cell * cell);
        }
    }

    for c in 0..3 {
        let rel = (estimate[c] - expected[c]).abs() / expected[c];
        assert!(rel < 0.05, "channel {c}: estimate {} expected {}", estimate[c], expected[c]);
    }
}

#[test]
fn test_empty_scene_renders_black() {
    let config = RenderConfig::default().with_resolution(16, 12);
    let mut tracer = PathTracer::new(config).unwrap();
    tracer.set_scene(Arc::new(Scene::empty()));

    assert_eq!(tracer.render_samples(4), 4);
    assert!(tracer.output_rgb8().iter().all(|&c| c == 0));
    assert!(tracer.output_rgb_f32().iter().all(|&c| c == 0.0));
}

#[test]
fn test_reset_is_idempotent() {
    let demo = pt_renderer::cornell_box().unwrap();
    let config = RenderConfig::default().with_resolution(24, 24).with_seed(5);
    let mut tracer = PathTracer::new(config).unwrap();
    tracer.set_scene(Arc::new(Scene::build(demo.triangles, demo.materials)));
    tracer.set_camera(demo.camera);

    tracer.render_samples(3);
    let first = tracer.output_rgb_f32();
    assert!(first.iter().any(|&c| c > 0.0));

    tracer.reset_image();
    tracer.reset_image();
    assert_eq!(tracer.samples(), 0);
    assert!(tracer.output_rgb_f32().iter().all(|&c| c == 0.0));

    // Same seeds for the same sample indices reproduce the image
    tracer.render_samples(3);
    assert_eq!(tracer.output_rgb_f32(), first);
}

#[test]
fn test_cube_under_quad_light() {
    let mut tris = cube(Vec3::splat(-0.5), Vec3::splat(0.5), 0);
    tris.extend(horizontal_quad(Vec3::new(0.0, 2.0, 0.0), 0.75, 1));
    let materials = vec![
        Material::new("cube", Vec3::splat(0.8)),
        Material::light("light", Vec3::ONE, 4.0),
    ];
    let scene = Arc::new(Scene::build(tris, materials));

    let (width, height) = (64, 64);
    let camera = Camera::default().with_position(Vec3::new(1.5, 1.6, 2.5), Vec3::ZERO, Vec3::Y);
    let config = RenderConfig::default()
        .with_resolution(width, height)
        .with_trace_depth(4)
        .with_gamma(false);
    let mut tracer = PathTracer::new(config).unwrap();
    tracer.set_scene(scene.clone());
    tracer.set_camera(camera);
    assert_eq!(tracer.render_samples(256), 256);

    // Classify pixels by what their center ray sees
    let frame = camera.frame(width, height).unwrap();
    let center_hit = |x: i64, y: i64| {
        if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
            return None;
        }
        let ray = frame.primary_ray(x as u32, y as u32, pt_renderer::Vec2::splat(0.5), pt_renderer::Vec2::ZERO);
        closest_hit_linear(scene.triangles(), &ray, Interval::FORWARD)
    };

    let accumulator = tracer.accumulator();
    let (mut top, mut top_n) = (0.0, 0);
    let (mut side, mut side_n) = (0.0, 0);
    let mut background_pixels = 0;
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let value = accumulator.average(x as u32, y as u32);
            match center_hit(x, y) {
                Some(hit) => {
                    let tri = scene.triangle(hit.triangle);
                    if tri.material != 0 {
                        continue;
                    }
                    if tri.normal.y.abs() > 0.9 && tri.centroid().y > 0.4 {
                        top += value.x;
                        top_n += 1;
                    } else if tri.normal.y.abs() < 0.1 {
                        side += value.x;
                        side_n += 1;
                    }
                }
                None => {
                    let clear = (-2..=2).all(|dy| (-2..=2).all(|dx| center_hit(x + dx, y + dy).is_none()));
                    if clear {
                        background_pixels += 1;
                        assert_eq!(value, Vec3::ZERO, "background pixel ({x}, {y}) not black");
                    }
                }
            }
        }
    }

    assert!(top_n > 20 && side_n > 20 && background_pixels > 100);
    let (top, side) = (top / top_n as f32, side / side_n as f32);
    assert!(top > 0.05, "top face mean {top}");
    assert!(top > side, "top {top} should be brighter than sides {side}");
}

/// Mean linear radiance over all pixels, before any clamping.
fn image_mean(tracer: &PathTracer) -> Vec3 {
    let (width, height) = tracer.resolution();
    let accumulator = tracer.accumulator();
    let mut sum = Vec3::ZERO;
    for y in 0..height {
        for x in 0..width {
            sum += accumulator.average(x, y);
        }
    }
    sum / (width * height) as f32
}

#[test]
fn test_light_sampling_does_not_change_the_image() {
    // Glossy metal cube on a diffuse floor under a quad light, with multiple
    // bounces and roulette: both estimators converge to the same image
    let mut tris = horizontal_quad(Vec3::ZERO, 3.0, 0);
    tris.extend(cube(Vec3::new(-0.5, 0.0, -0.5), Vec3::new(0.5, 1.0, 0.5), 1));
    tris.extend(horizontal_quad(Vec3::new(0.0, 2.5, 0.0), 0.75, 2));
    let materials = vec![
        Material::new("floor", Vec3::splat(0.6)),
        Material::new("metal", Vec3::new(0.8, 0.6, 0.4))
            .with_reflectiveness(0.5)
            .with_roughness(0.4),
        Material::light("light", Vec3::ONE, 6.0),
    ];
    let scene = Arc::new(Scene::build(tris, materials));
    let camera = Camera::default().with_position(Vec3::new(2.0, 2.0, 3.0), Vec3::new(0.0, 0.5, 0.0), Vec3::Y);

    let render = |nee: bool| {
        let config = RenderConfig::default()
            .with_resolution(32, 32)
            .with_trace_depth(2)
            .with_max_depth(8)
            .with_next_event_estimation(nee)
            .with_seed(if nee { 1 } else { 2 });
        let mut tracer = PathTracer::new(config).unwrap();
        tracer.set_scene(scene.clone());
        tracer.set_camera(camera);
        assert_eq!(tracer.render_samples(512), 512);
        image_mean(&tracer)
    };

    let with_nee = render(true);
    let without = render(false);
    assert!(without.min_element() > 0.01, "image too dark: {without:?}");
    for c in 0..3 {
        let rel = (with_nee[c] - without[c]).abs() / without[c];
        assert!(rel < 0.05, "channel {c}: with {} without {}", with_nee[c], without[c]);
    }
}

#[test]
fn test_exit_cancels_and_resume_continues() {
    let demo = pt_renderer::cornell_box().unwrap();
    let mut tracer = PathTracer::new(RenderConfig::default().with_resolution(16, 16)).unwrap();
    tracer.set_scene(Arc::new(Scene::build(demo.triangles, demo.materials)));
    tracer.set_camera(demo.camera);

    tracer.render_samples(2);
    let before = tracer.output_rgb_f32();

    let control = tracer.control();
    control.exit();
    assert_eq!(tracer.render_frame(), FrameStatus::Cancelled);
    assert_eq!(tracer.render_samples(10), 2);
    assert_eq!(tracer.samples(), 2);
    assert_eq!(tracer.output_rgb_f32(), before);

    control.resume();
    assert_eq!(tracer.render_frame(), FrameStatus::Completed);
    assert_eq!(tracer.samples(), 3);
}

#[test]
fn test_exit_from_other_thread_never_commits_partial_frame() {
    // Every camera ray hits a unit emitter, so each committed frame adds
    // exactly 1.0 to every pixel
    let tris = vec![
        Triangle::new(Vec3::new(-10.0, -10.0, 0.0), Vec3::new(10.0, -10.0, 0.0), Vec3::new(10.0, 10.0, 0.0), 0),
        Triangle::new(Vec3::new(-10.0, -10.0, 0.0), Vec3::new(10.0, 10.0, 0.0), Vec3::new(-10.0, 10.0, 0.0), 0),
    ];
    let scene = Arc::new(Scene::build(tris, vec![Material::light("light", Vec3::ONE, 1.0)]));
    let config = RenderConfig::default().with_resolution(96, 64);
    let mut tracer = PathTracer::new(config).unwrap();
    tracer.set_scene(scene);
    tracer.set_camera(Camera::default().with_position(Vec3::new(0.0, 0.0, 1.0), Vec3::ZERO, Vec3::Y));

    let control = tracer.control();
    let samples = std::thread::scope(|s| {
        s.spawn(|| {
            std::thread::sleep(Duration::from_millis(30));
            control.exit();
        });
        tracer.render_samples(u32::MAX)
    });

    assert_eq!(samples, tracer.samples());
    let accumulator = tracer.accumulator();
    for y in 0..64 {
        for x in 0..96 {
            assert_eq!(accumulator.sum(x, y), Vec3::splat(samples as f32));
        }
    }
}

#[test]
fn test_bvh_and_flat_layout_match_brute_force() {
    let triangles = random_triangles(1000, 21);
    let bvh = Bvh::build(&triangles, 99);
    let scene = Scene::build(triangles.clone(), vec![Material::default()]);
    let flat = GpuSceneData::from_scene(&scene);

    let mut rng = StdRng::seed_from_u64(22);
    for _ in 0..2000 {
        let origin = Vec3::new(rng.gen_range(-15.0..15.0), rng.gen_range(-15.0..15.0), rng.gen_range(-15.0..15.0));
        let direction = Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
        if direction.length_squared() < 1e-4 {
            continue;
        }
        let ray = Ray::new(origin, direction.normalize());

        let brute = closest_hit_linear(&triangles, &ray, Interval::FORWARD).map(|h| h.t);
        let tree = bvh.closest_hit(&triangles, &ray, Interval::FORWARD, &mut |_| true).map(|h| h.t);
        let flat_t = flat.closest_hit(scene.triangles(), &ray, Interval::FORWARD).map(|h| h.t);

        match (brute, tree, flat_t) {
            (Some(a), Some(b), Some(c)) => {
                assert!((a - b).abs() < 1e-4);
                assert!((a - c).abs() < 1e-4);
            }
            (None, None, None) => {}
            other => panic!("traversals disagree: {:?}", other),
        }
    }
}
