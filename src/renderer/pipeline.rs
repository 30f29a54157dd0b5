//! WebGPU block pipeline
//!
//! One indexed pipeline draws every block instance, grouped by geometry.
//! Depth-of-field is approximated in the fragment shader by hazing
//! fragments toward the background by their distance from the focal plane.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::batch::InstancedRenderBatch;
use super::vertex::{InstanceRaw, Vertex};
use super::{FrameRenderer, FrameView};
use crate::error::{FrameError, InitError};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

// ============================================================================
// GPU DATA STRUCTURES (must match shader)
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Globals {
    view_proj: [[f32; 4]; 4], // offset 0
    camera_pos: [f32; 4],     // offset 64, w = elapsed time
    focus: [f32; 4],          // offset 80: distance, aperture, max blur, enabled
    background: [f32; 4],     // offset 96
    light_dir: [f32; 4],      // offset 112
}

impl Globals {
    fn from_frame(frame: &FrameView<'_>) -> Self {
        Self {
            view_proj: frame.view_proj.to_cols_array_2d(),
            camera_pos: frame.camera_position.extend(frame.elapsed).to_array(),
            focus: [
                frame.focus.focus_distance,
                frame.focus.aperture,
                frame.focus.max_blur,
                if frame.depth_of_field { 1.0 } else { 0.0 },
            ],
            background: frame.background.extend(1.0).to_array(),
            light_dir: glam::Vec3::new(0.4, 1.0, 0.3).normalize().extend(0.0).to_array(),
        }
    }
}

/// Geometry and instance buffers tied to one batch
struct SceneBuffers {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    instance_buffer: wgpu::Buffer,
    instance_capacity: u32,
    revision: u64,
}

impl SceneBuffers {
    fn destroy(self) {
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
        self.instance_buffer.destroy();
    }
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

// ============================================================================
// BLOCK RENDER STATE
// ============================================================================

pub struct BlockRenderState {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub pipeline: wgpu::RenderPipeline,

    globals_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
    scene: Option<SceneBuffers>,

    pub size: (u32, u32),
    released: bool,
}

impl BlockRenderState {
    pub async fn new(
        surface: wgpu::Surface<'static>,
        adapter: &wgpu::Adapter,
        width: u32,
        height: u32,
    ) -> Result<Self, InitError> {
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("block-tide-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
                memory_hints: Default::default(),
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await
            .map_err(|e| InitError::Device(e.to_string()))?;

        let surface_caps = surface.get_capabilities(adapter);
        log::info!("Surface formats: {:?}", surface_caps.formats);

        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| InitError::Surface("surface reports no formats".into()))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        log::info!("Using surface format: {:?}", surface_format);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("block_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("blocks.wgsl").into()),
        });

        let globals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("globals"),
            contents: bytemuck::bytes_of(&Globals::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("block_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("block_bind_group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("block_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("block_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::desc(), InstanceRaw::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let (depth_texture, depth_view) = create_depth_view(&device, config.width, config.height);

        Ok(Self {
            surface,
            device,
            queue,
            size: (config.width, config.height),
            config,
            pipeline,
            globals_buffer,
            bind_group,
            depth_texture,
            depth_view,
            scene: None,
            released: false,
        })
    }

    /// (Re)create buffers when the batch's geometry changed since last upload
    fn sync_geometry(&mut self, batch: &InstancedRenderBatch) {
        if self.scene.as_ref().is_some_and(|s| s.revision == batch.geometry_revision()) {
            return;
        }
        if let Some(old) = self.scene.take() {
            old.destroy();
        }
        if batch.vertices().is_empty() {
            return;
        }

        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("block_vertices"),
            contents: bytemuck::cast_slice(batch.vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("block_indices"),
            contents: bytemuck::cast_slice(batch.indices()),
            usage: wgpu::BufferUsages::INDEX,
        });
        let instance_capacity = batch.capacity().max(1);
        let instance_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("block_instances"),
            size: (std::mem::size_of::<InstanceRaw>() as u64) * instance_capacity as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        log::debug!(
            "Uploaded block geometry: {} vertices, {} indices, {} instance slots",
            batch.vertices().len(),
            batch.indices().len(),
            instance_capacity
        );

        self.scene = Some(SceneBuffers {
            vertex_buffer,
            index_buffer,
            instance_buffer,
            instance_capacity,
            revision: batch.geometry_revision(),
        });
    }
}

impl FrameRenderer for BlockRenderState {
    fn upload_scene(&mut self, batch: &InstancedRenderBatch) {
        if !self.released {
            self.sync_geometry(batch);
        }
    }

    fn render(&mut self, frame: &FrameView<'_>) -> Result<(), FrameError> {
        if self.released {
            return Err(FrameError::Released);
        }

        self.sync_geometry(frame.batch);
        let (instances, groups) = frame.batch.packed_instances();
        if let Some(scene) = &self.scene {
            let count = (instances.len() as u32).min(scene.instance_capacity) as usize;
            self.queue
                .write_buffer(&scene.instance_buffer, 0, bytemuck::cast_slice(&instances[..count]));
        }

        self.queue
            .write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&Globals::from_frame(frame)));

        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("block_encoder"),
        });

        {
            let bg = frame.background;
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("block_render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: bg.x as f64,
                            g: bg.y as f64,
                            b: bg.z as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if let Some(scene) = &self.scene {
                let stride = std::mem::size_of::<InstanceRaw>() as u64;
                render_pass.set_pipeline(&self.pipeline);
                render_pass.set_bind_group(0, &self.bind_group, &[]);
                render_pass.set_vertex_buffer(0, scene.vertex_buffer.slice(..));
                render_pass.set_index_buffer(scene.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                for group in groups {
                    let end = group.instances.end.min(scene.instance_capacity);
                    if group.instances.start >= end {
                        continue;
                    }
                    // Slice per group instead of relying on a base instance (WebGL2)
                    render_pass.set_vertex_buffer(
                        1,
                        scene
                            .instance_buffer
                            .slice(group.instances.start as u64 * stride..end as u64 * stride),
                    );
                    render_pass.draw_indexed(group.indices, 0, 0..end - group.instances.start);
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.released || width == 0 || height == 0 || (width, height) == self.size {
            return;
        }
        self.size = (width, height);
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_texture.destroy();
        let (texture, view) = create_depth_view(&self.device, width, height);
        self.depth_texture = texture;
        self.depth_view = view;
    }

    fn reconfigure(&mut self) {
        if !self.released {
            self.surface.configure(&self.device, &self.config);
        }
    }

    fn release_scene(&mut self) {
        if let Some(scene) = self.scene.take() {
            scene.destroy();
        }
    }

    fn release_device(&mut self) {
        if self.released {
            return;
        }
        self.release_scene();
        self.globals_buffer.destroy();
        self.depth_texture.destroy();
        self.device.destroy();
        self.released = true;
        log::info!("Render device released");
    }

    fn is_released(&self) -> bool {
        self.released
    }
}
