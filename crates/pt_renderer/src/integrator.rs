//! Monte Carlo path integrator.
//!
//! Paths are traced iteratively with a throughput weight. Each bounce picks
//! one event: a dielectric interface (translucent materials), the glossy
//! lobe, or the diffuse lobe with next-event estimation toward a random
//! emissive triangle.
//!
//! The diffuse lobe is the `kd * albedo / pi` term of [`CookTorrance`]. Light
//! sampling and the cosine-sampled bounce both estimate that term divided by
//! the lobe selection probability, so emission found by the bounce is skipped
//! when next-event estimation already counted it.

use pt_core::{Surface, Triangle};
use std::f32::consts::PI;

use pt_math::{Interval, Ray, Vec2, Vec3, RAY_EPSILON};
use rand::Rng;

use crate::brdf::CookTorrance;
use crate::intersect::TriangleHit;
use crate::renderer::RenderConfig;
use crate::sampling::{cosine_direction, ggx_microfacet_normal, glossy_direction, reflect, refract, schlick_reflectance};
use crate::scene::Scene;

/// Largest Russian roulette survival probability, so every path ends.
const MAX_SURVIVAL: f32 = 0.95;

/// Floor for the diffuse lobe selection probability.
const MIN_LOBE_PROBABILITY: f32 = 1.0e-4;

/// Material inputs at a hit after texture lookups.
#[derive(Debug, Clone, Copy)]
struct ShadingPoint {
    position: Vec3,
    /// Shading normal, facing the incoming ray
    normal: Vec3,
    /// Geometric normal, facing the incoming ray
    geometric: Vec3,
    /// Unit direction toward the previous vertex
    wo: Vec3,
    diffuse: Vec3,
    specular: Vec3,
    emission: Vec3,
    roughness: f32,
    metalness: f32,
}

pub struct Integrator<'a> {
    scene: &'a Scene,
    config: &'a RenderConfig,
}

impl<'a> Integrator<'a> {
    pub fn new(scene: &'a Scene, config: &'a RenderConfig) -> Self {
        Self { scene, config }
    }

    /// Estimate the radiance arriving along `ray` (direction must be unit).
    pub fn radiance<R: Rng>(&self, mut ray: Ray, rng: &mut R) -> Vec3 {
        let nee = self.config.next_event_estimation;
        let mut radiance = Vec3::ZERO;
        let mut throughput = Vec3::ONE;
        let mut count_emission = true;
        let mut inside = false;

        for depth in 0..self.config.max_depth {
            let Some(hit) = self.scene.intersect(&ray, Interval::FORWARD, rng) else {
                radiance += throughput * self.config.background;
                break;
            };

            let tri = self.scene.triangle(hit.triangle);
            let sp = self.shade(tri, &hit, &ray);

            // Emission already sampled by NEE at the previous diffuse bounce is skipped
            if count_emission || !nee {
                radiance += throughput * sp.emission;
            }

            // Roulette once the bounce count exceeds the trace depth
            if depth > self.config.trace_depth {
                let survival = sp.diffuse.max_element().min(MAX_SURVIVAL);
                if rng.gen::<f32>() >= survival {
                    break;
                }
                throughput /= survival;
            }

            let material = self.scene.material_of(tri);
            let translucent = match material.surface {
                Surface::Translucent { translucency, ior } if rng.gen::<f32>() < translucency => Some(ior),
                _ => None,
            };

            let (origin, direction) = if let Some(ior) = translucent {
                count_emission = true;
                let (refracted, direction) = self.dielectric_event(&sp, ray.direction, ior, inside, rng);
                if refracted {
                    inside = !inside;
                    throughput *= sp.diffuse;
                    (sp.position - sp.geometric * RAY_EPSILON, direction)
                } else {
                    throughput *= sp.specular;
                    (sp.position + sp.geometric * RAY_EPSILON, direction)
                }
            } else if rng.gen::<f32>() < sp.metalness {
                count_emission = true;
                let mirror = reflect(ray.direction, sp.normal);
                let direction = glossy_direction(mirror, sp.normal, sp.roughness, rng.gen(), rng.gen());
                throughput *= sp.specular;
                (sp.position + sp.geometric * RAY_EPSILON, direction)
            } else {
                let brdf = CookTorrance::new(sp.diffuse, sp.metalness, sp.roughness);
                let lobe_probability = (1.0 - sp.metalness).max(MIN_LOBE_PROBABILITY);
                // The last vertex gets no light sample, as its bounce would never be traced
                if nee && depth + 1 < self.config.max_depth {
                    radiance += throughput * self.direct_light(&sp, &brdf, rng) / lobe_probability;
                }
                count_emission = false;
                let direction = cosine_direction(sp.normal, rng.gen(), rng.gen());
                // f * cos / pdf = f * pi for a cosine-weighted direction
                let Some(f) = brdf.evaluate_diffuse(sp.normal, sp.wo, direction) else {
                    break;
                };
                throughput *= f * (PI / lobe_probability);
                (sp.position + sp.geometric * RAY_EPSILON, direction)
            };

            if throughput.max_element() <= 0.0 || direction == Vec3::ZERO {
                break;
            }
            ray = Ray::new(origin, direction);
        }

        radiance
    }

    /// Resolve normals and texture-driven material inputs at a hit.
    fn shade(&self, tri: &Triangle, hit: &TriangleHit, ray: &Ray) -> ShadingPoint {
        let material = self.scene.material_of(tri);
        let slots = &material.textures;
        let uv: Vec2 = tri.interpolate_uv(hit.barycentric);

        let front_facing = tri.normal.dot(ray.direction) < 0.0;
        let geometric = if front_facing { tri.normal } else { -tri.normal };

        let mut normal = tri.interpolate_normal(hit.barycentric);
        if let Some(texel) = self.scene.sample_texture(slots.normal, uv) {
            let local = texel.truncate() * 2.0 - Vec3::ONE;
            let perturbed = tri.tangent * local.x + tri.bitangent * local.y + normal * local.z;
            normal = perturbed.try_normalize().unwrap_or(normal);
        }
        if !front_facing {
            normal = -normal;
        }
        if normal.dot(ray.direction) >= 0.0 {
            normal = geometric;
        }

        let diffuse = self
            .scene
            .sample_texture(slots.diffuse, uv)
            .map_or(material.diffuse, |t| t.truncate());
        let roughness = self
            .scene
            .sample_texture(slots.roughness, uv)
            .map_or(material.roughness, |t| t.x.clamp(0.0, 1.0));
        let metalness = self
            .scene
            .sample_texture(slots.metallic, uv)
            .map_or(material.reflectiveness, |t| t.x.clamp(0.0, 1.0));
        let emission = self
            .scene
            .sample_texture(slots.emissive, uv)
            .map_or(material.emission(), |t| t.truncate() * material.emissive_intensity);

        ShadingPoint {
            position: ray.at(hit.t),
            normal,
            geometric,
            wo: -ray.direction,
            diffuse,
            specular: material.specular,
            emission,
            roughness,
            metalness,
        }
    }

    /// Reflect or refract at a dielectric interface.
    ///
    /// Returns whether the ray was refracted and the new direction.
    fn dielectric_event<R: Rng>(
        &self,
        sp: &ShadingPoint,
        incoming: Vec3,
        ior: f32,
        inside: bool,
        rng: &mut R,
    ) -> (bool, Vec3) {
        let alpha = sp.roughness * sp.roughness;
        let mut h = if alpha > 0.0 {
            ggx_microfacet_normal(sp.normal, alpha, rng.gen(), rng.gen())
        } else {
            sp.normal
        };
        if h.dot(incoming) >= 0.0 {
            h = sp.normal;
        }

        // eta = n_incident / n_transmitted
        let eta = if inside { ior } else { 1.0 / ior };
        let cos_i = (-incoming).dot(h).clamp(0.0, 1.0);

        match refract(incoming, h, eta) {
            Some(transmitted) if rng.gen::<f32>() >= schlick_reflectance(cos_i, eta) => (true, transmitted),
            _ => {
                let reflected = reflect(incoming, h);
                if reflected.dot(sp.geometric) > 0.0 {
                    (false, reflected)
                } else {
                    (false, reflect(incoming, sp.normal))
                }
            }
        }
    }

    /// Next-event estimation: one sample on one uniformly chosen light.
    ///
    /// Estimator `f_d * Le * cos_s * |cos_l| / d^2 * (N_lights * A)` with the
    /// diffuse term of `brdf`.
    fn direct_light<R: Rng>(&self, sp: &ShadingPoint, brdf: &CookTorrance, rng: &mut R) -> Vec3 {
        let lights = self.scene.lights();
        if lights.is_empty() {
            return Vec3::ZERO;
        }

        let light_index = lights[rng.gen_range(0..lights.len())];
        let light = self.scene.triangle(light_index);
        let target = light.sample_point(rng.gen(), rng.gen());

        let origin = sp.position + sp.geometric * RAY_EPSILON;
        let to_light = target - origin;
        let dist2 = to_light.length_squared();
        if dist2 <= RAY_EPSILON * RAY_EPSILON {
            return Vec3::ZERO;
        }
        let dist = dist2.sqrt();
        let l = to_light / dist;

        let cos_surface = sp.normal.dot(l);
        let cos_light = light.normal.dot(l).abs();
        if cos_surface <= 0.0 || cos_light <= 0.0 {
            return Vec3::ZERO;
        }

        let Some(f) = brdf.evaluate_diffuse(sp.normal, sp.wo, l) else {
            return Vec3::ZERO;
        };

        let shadow = Ray::new(origin, l);
        let range = Interval::FORWARD.with_max(dist + RAY_EPSILON);
        let Some(blocker) = self.scene.intersect(&shadow, range, rng) else {
            return Vec3::ZERO;
        };
        if blocker.triangle != light_index {
            return Vec3::ZERO;
        }

        let le = self.emission_at(light, &blocker);
        let inv_pdf = lights.len() as f32 * light.area;
        f * le * (cos_surface * cos_light / dist2 * inv_pdf)
    }

    /// Emitted radiance of a light triangle at a hit on it.
    fn emission_at(&self, tri: &Triangle, hit: &TriangleHit) -> Vec3 {
        let material = self.scene.material_of(tri);
        let uv = tri.interpolate_uv(hit.barycentric);
        self.scene
            .sample_texture(material.textures.emissive, uv)
            .map_or(material.emission(), |t| t.truncate() * material.emissive_intensity)
    }
}
