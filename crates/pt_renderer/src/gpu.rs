//! wgpu compute backend.
//!
//! The scene is flattened into [`GpuSceneData`] and uploaded once into
//! read-only storage buffers. Each frame writes the small uniform block and
//! dispatches one invocation per pixel; the kernel adds its sample to a
//! float accumulation buffer that stays on the device until read back.

use std::path::Path;
use std::sync::mpsc;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::camera::Camera;
use crate::control::RenderControl;
use crate::error::{RenderError, Result};
use crate::gpu_layout::{GpuBvhNode, GpuSceneData, GpuUniforms, NONE};
use crate::renderer::{FrameStatus, RenderConfig};
use crate::scene::Scene;
use pt_math::Vec3;

const WORKGROUP_SIZE: u32 = 8;

/// Storage buffers holding one uploaded scene.
struct SceneBuffers {
    bind_group: wgpu::BindGroup,
    light_count: u32,
    triangle_count: usize,
    // Kept alive for the bind group
    _buffers: Vec<wgpu::Buffer>,
}

/// GPU path tracer mirroring [`crate::PathTracer`].
pub struct GpuRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    accumulation: wgpu::Buffer,
    scene: Option<SceneBuffers>,
    config: RenderConfig,
    camera: Camera,
    control: RenderControl,
    samples: u32,
}

impl GpuRenderer {
    /// Open the default adapter and build the compute pipeline.
    pub fn new(config: RenderConfig) -> Result<Self> {
        pollster::block_on(Self::new_async(config))
    }

    async fn new_async(config: RenderConfig) -> Result<Self> {
        let config = config.validated()?;

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| RenderError::Gpu("no suitable GPU adapter".to_string()))?;

        let info = adapter.get_info();
        log::info!("Using GPU adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Path Tracer Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| RenderError::Gpu(e.to_string()))?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Path Trace Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/path_trace.wgsl").into()),
        });

        let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Path Trace Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage(1, true),
                storage(2, true),
                storage(3, true),
                storage(4, true),
                storage(5, true),
                storage(6, true),
                storage(7, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Path Trace Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Path Trace Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "main",
            compilation_options: Default::default(),
            cache: None,
        });

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Path Trace Uniforms"),
            contents: bytemuck::bytes_of(&GpuUniforms::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let accumulation = create_accumulation(&device, config.width, config.height);

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            uniform_buffer,
            accumulation,
            scene: None,
            config,
            camera: Camera::default(),
            control: RenderControl::new(),
            samples: 0,
        })
    }

    /// Flatten and upload a scene. Fails with
    /// [`RenderError::SceneTooLarge`] when an array exceeds the device's
    /// storage binding limit.
    pub fn upload_scene(&mut self, scene: &Scene) -> Result<()> {
        let data = GpuSceneData::from_scene(scene);
        let limit = self.device.limits().max_storage_buffer_binding_size as u64;
        data.check_limits(limit)?;

        // Empty arrays cannot be bound; pad them with records that never hit
        let leaf = GpuBvhNode {
            right_child: NONE,
            ..GpuBvhNode::default()
        };
        let buffers = vec![
            self.storage_buffer("BVH Nodes", &non_empty(&data.nodes, leaf)),
            self.storage_buffer("Triangles", &non_empty(&data.triangles, Zeroable::zeroed())),
            self.storage_buffer("Materials", &non_empty(&data.materials, Zeroable::zeroed())),
            self.storage_buffer("Lights", &non_empty(&data.lights, Zeroable::zeroed())),
            self.storage_buffer("Texture Headers", &non_empty(&data.texture_headers, Zeroable::zeroed())),
            self.storage_buffer("Texels", &non_empty(&data.texels, [0.0; 4])),
        ];

        self.scene = Some(SceneBuffers {
            bind_group: self.create_bind_group(&buffers),
            light_count: data.lights.len() as u32,
            triangle_count: data.triangles.len(),
            _buffers: buffers,
        });

        log::info!(
            "Uploaded scene to GPU: {:.1} KB geometry, {:.1} KB textures",
            (data.nodes_bytes() + data.triangles_bytes()) as f32 / 1024.0,
            data.texels_bytes() as f32 / 1024.0
        );
        Ok(())
    }

    fn storage_buffer<T: Pod>(&self, label: &str, items: &[T]) -> wgpu::Buffer {
        self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(items),
            usage: wgpu::BufferUsages::STORAGE,
        })
    }

    fn create_bind_group(&self, buffers: &[wgpu::Buffer]) -> wgpu::BindGroup {
        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: self.uniform_buffer.as_entire_binding(),
        }];
        for (i, buffer) in buffers.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: i as u32 + 1,
                resource: buffer.as_entire_binding(),
            });
        }
        entries.push(wgpu::BindGroupEntry {
            binding: buffers.len() as u32 + 1,
            resource: self.accumulation.as_entire_binding(),
        });

        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Path Trace Bind Group"),
            layout: &self.bind_group_layout,
            entries: &entries,
        })
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    pub fn control(&self) -> RenderControl {
        self.control.clone()
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    pub fn triangle_count(&self) -> usize {
        self.scene.as_ref().map_or(0, |s| s.triangle_count)
    }

    pub fn set_trace_depth(&mut self, trace_depth: u32) {
        self.config.trace_depth = trace_depth.clamp(1, self.config.max_depth);
    }

    /// Change the output size. Reallocates the accumulation buffer, which
    /// also clears it.
    pub fn set_resolution(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidResolution { width, height });
        }
        self.config.width = width;
        self.config.height = height;
        self.accumulation = create_accumulation(&self.device, width, height);
        self.samples = 0;

        if let Some(scene) = self.scene.take() {
            let bind_group = self.create_bind_group(&scene._buffers);
            self.scene = Some(SceneBuffers { bind_group, ..scene });
        }
        Ok(())
    }

    /// Zero the accumulation buffer and sample counter.
    pub fn reset_image(&mut self) {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Reset Encoder"),
        });
        encoder.clear_buffer(&self.accumulation, 0, None);
        self.queue.submit(std::iter::once(encoder.finish()));
        self.samples = 0;
    }

    /// Dispatch one sample per pixel.
    ///
    /// Exit is checked before the dispatch; a submitted dispatch always
    /// completes and is counted.
    pub fn render_frame(&mut self) -> Result<FrameStatus> {
        if self.control.take_reset() {
            self.reset_image();
        }
        if self.control.is_exit_requested() {
            return Ok(FrameStatus::Cancelled);
        }
        let Some(scene) = &self.scene else {
            return Err(RenderError::Gpu("no scene uploaded".to_string()));
        };

        let frame = self.camera.frame(self.config.width, self.config.height);
        let uniforms = GpuUniforms::new(frame.as_ref(), &self.config, scene.light_count, self.samples);
        self.queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Path Trace Encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Path Trace Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &scene.bind_group, &[]);
            pass.dispatch_workgroups(
                self.config.width.div_ceil(WORKGROUP_SIZE),
                self.config.height.div_ceil(WORKGROUP_SIZE),
                1,
            );
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.device.poll(wgpu::Maintain::Wait);

        self.samples += 1;
        Ok(FrameStatus::Completed)
    }

    /// Read back the per-pixel radiance sums, row-major with the top row
    /// first. Divide by [`GpuRenderer::samples`] for the average.
    pub fn read_accumulation(&self) -> Result<Vec<Vec3>> {
        let size = self.accumulation.size();
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Accumulation Readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
        encoder.copy_buffer_to_buffer(&self.accumulation, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|e| RenderError::Gpu(e.to_string()))?
            .map_err(|e| RenderError::Gpu(e.to_string()))?;

        let sums = {
            let bytes = slice.get_mapped_range();
            let texels: &[[f32; 4]] = bytemuck::cast_slice(&bytes);
            texels.iter().map(|t| Vec3::new(t[0], t[1], t[2])).collect()
        };
        staging.unmap();
        Ok(sums)
    }

    /// Averaged image as 8-bit RGB.
    pub fn output_rgb8(&self) -> Result<Vec<u8>> {
        let sums = self.read_accumulation()?;
        let scale = if self.samples == 0 { 0.0 } else { 1.0 / self.samples as f32 };
        Ok(sums
            .iter()
            .flat_map(|s| crate::accumulator::color_to_rgb8(*s * scale, self.config.gamma))
            .collect())
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        let pixels = self.output_rgb8()?;
        image::save_buffer(
            path.as_ref(),
            &pixels,
            self.config.width,
            self.config.height,
            image::ColorType::Rgb8,
        )?;
        Ok(())
    }
}

fn create_accumulation(device: &wgpu::Device, width: u32, height: u32) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Accumulation"),
        size: (width as u64) * (height as u64) * std::mem::size_of::<[f32; 4]>() as u64,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn non_empty<T: Pod>(items: &[T], filler: T) -> Vec<T> {
    if items.is_empty() {
        vec![filler]
    } else {
        items.to_vec()
    }
}
