//! wgpu implementation of [`RenderBackend`].
//!
//! Owns the surface-bound [`GpuContext`] and maps the backend's opaque
//! handles onto wgpu pipelines, buffers and textures. One draw call
//! acquires the surface frame, runs a single quad pass and presents.

use std::collections::HashMap;

use wgpu::{
    BindGroupLayout, ColorTargetState, FragmentState, PipelineCompilationOptions,
    PipelineLayoutDescriptor, PrimitiveState, RenderPipeline, SamplerBindingType, ShaderStages,
    TextureSampleType, TextureViewDimension, VertexState,
};

use super::backend::{
    BackendError, BufferId, ContextId, FramePixels, ProgramId, RenderBackend, TextureId,
};
use super::context::GpuContext;

struct CompiledProgram {
    pipeline: RenderPipeline,
    bind_group_layout: BindGroupLayout,
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

pub struct WgpuBackend {
    pub gpu: GpuContext,
    id: ContextId,
    lost: bool,
    next_handle: u64,
    programs: HashMap<u64, CompiledProgram>,
    buffers: HashMap<u64, wgpu::Buffer>,
    textures: HashMap<u64, GpuTexture>,
    sampler: wgpu::Sampler,
}

impl WgpuBackend {
    pub fn new(gpu: GpuContext, id: u64) -> Self {
        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("stacked-frame-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        Self {
            gpu,
            id: ContextId(id),
            lost: false,
            next_handle: 1,
            programs: HashMap::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            sampler,
        }
    }

    fn next(&mut self) -> u64 {
        let h = self.next_handle;
        self.next_handle += 1;
        h
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
    }

    /// Reconfigure the surface and clear the lost flag after the host
    /// handled a Lost/Outdated acquire. The caller is responsible for
    /// invalidating caches and recreating resources first.
    pub fn mark_restored(&mut self) {
        self.gpu.reconfigure();
        self.programs.clear();
        self.buffers.clear();
        self.textures.clear();
        self.lost = false;
    }

    fn write_frame(&self, texture: &wgpu::Texture, frame: FramePixels<'_>) {
        self.gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            frame.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(frame.width * 4),
                rows_per_image: Some(frame.height),
            },
            wgpu::Extent3d {
                width: frame.width,
                height: frame.height,
                depth_or_array_layers: 1,
            },
        );
    }
}

impl RenderBackend for WgpuBackend {
    fn context_id(&self) -> ContextId {
        self.id
    }

    fn context_lost(&self) -> bool {
        self.lost
    }

    fn compile_program(
        &mut self,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<ProgramId, BackendError> {
        if self.lost {
            return Err(BackendError::ContextLost);
        }
        let device = &self.gpu.device;

        // wgpu defers shader validation to pipeline creation; trap it in
        // an error scope so a bad module surfaces as a compile error
        // instead of a device panic.
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let full_source = format!("{vertex_src}\n{fragment_src}");
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("stacked-alpha-shader"),
            source: wgpu::ShaderSource::Wgsl(full_source.into()),
        });

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("stacked-alpha-bgl"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: TextureSampleType::Float { filterable: true },
                            view_dimension: TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("stacked-alpha-layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let position_attrs = [wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 0,
            shader_location: 0,
        }];
        let texcoord_attrs = [wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 0,
            shader_location: 1,
        }];
        let vertex_buffers = [
            wgpu::VertexBufferLayout {
                array_stride: 8,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &position_attrs,
            },
            wgpu::VertexBufferLayout {
                array_stride: 8,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &texcoord_attrs,
            },
        ];

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("stacked-alpha-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                buffers: &vertex_buffers,
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                targets: &[Some(ColorTargetState {
                    format: self.gpu.format,
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: PipelineCompilationOptions::default(),
            }),
            primitive: PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(BackendError::Compile(err.to_string()));
        }

        let handle = self.next();
        self.programs.insert(
            handle,
            CompiledProgram {
                pipeline,
                bind_group_layout,
            },
        );
        Ok(ProgramId(handle))
    }

    fn create_buffer(&mut self, label: &str, data: &[f32]) -> Result<BufferId, BackendError> {
        if self.lost {
            return Err(BackendError::ContextLost);
        }
        let buffer = self.gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of_val(data) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.gpu
            .queue
            .write_buffer(&buffer, 0, bytemuck::cast_slice(data));

        let handle = self.next();
        self.buffers.insert(handle, buffer);
        Ok(BufferId(handle))
    }

    fn create_texture(&mut self, frame: FramePixels<'_>) -> Result<TextureId, BackendError> {
        if self.lost {
            return Err(BackendError::ContextLost);
        }
        let texture = self.gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("stacked-frame"),
            size: wgpu::Extent3d {
                width: frame.width,
                height: frame.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.write_frame(&texture, frame);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let handle = self.next();
        self.textures.insert(handle, GpuTexture { texture, view });
        Ok(TextureId(handle))
    }

    fn update_texture(
        &mut self,
        texture: TextureId,
        frame: FramePixels<'_>,
    ) -> Result<(), BackendError> {
        if self.lost {
            return Err(BackendError::ContextLost);
        }
        let stored = self
            .textures
            .get(&texture.0)
            .ok_or_else(|| BackendError::Texture("unknown texture handle".into()))?;
        self.write_frame(&stored.texture, frame);
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if let Some(stored) = self.textures.remove(&texture.0) {
            stored.texture.destroy();
        }
    }

    fn draw(
        &mut self,
        program: ProgramId,
        position: BufferId,
        texcoord: BufferId,
        texture: TextureId,
    ) -> Result<(), BackendError> {
        if self.lost {
            return Err(BackendError::ContextLost);
        }
        let compiled = self
            .programs
            .get(&program.0)
            .ok_or_else(|| BackendError::Draw("unknown program handle".into()))?;
        let position = self
            .buffers
            .get(&position.0)
            .ok_or_else(|| BackendError::Draw("unknown position buffer".into()))?;
        let texcoord = self
            .buffers
            .get(&texcoord.0)
            .ok_or_else(|| BackendError::Draw("unknown texcoord buffer".into()))?;
        let frame_tex = self
            .textures
            .get(&texture.0)
            .ok_or_else(|| BackendError::Draw("unknown texture handle".into()))?;

        let output = match self.gpu.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.lost = true;
                return Err(BackendError::ContextLost);
            }
            Err(e) => return Err(BackendError::Draw(e.to_string())),
        };
        let surface_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("stacked-alpha-bg"),
            layout: &compiled.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&frame_tex.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("stackplay-encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("stacked-alpha-composite"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&compiled.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, position.slice(..));
            pass.set_vertex_buffer(1, texcoord.slice(..));
            pass.draw(0..4, 0..1);
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}
