//! Lit and unlit mesh drawing with depth testing.
//!
//! The mesh pass uses two bind groups:
//! - **Group 0**: Frame uniforms (view-projection, camera position, lights)
//! - **Group 1**: Model uniforms (model matrix, normal matrix, color, flags),
//!   one 256-byte aligned slot per draw selected with a dynamic offset
//!
//! Drawing is split in two steps because uniform uploads may grow buffers:
//! [`MeshPass::prepare`] writes every uniform for the frame, then
//! [`MeshPass::draw`] records the draws into an open render pass.

use std::num::NonZeroU64;

use glam::{Mat4, Vec3};

use crate::camera::Camera;
use crate::gpu::GpuContext;
use crate::mesh::{Mesh, Vertex3d};
use crate::model::Color;
use crate::scene::{AmbientLight, DirectionalLight};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 4],
    /// Ambient color premultiplied by intensity.
    pub ambient: [f32; 4],
    /// Direction the light travels, in world space.
    pub light_dir: [f32; 4],
    /// Directional color premultiplied by intensity.
    pub light_color: [f32; 4],
}

impl FrameUniforms {
    pub fn new(camera: &Camera, ambient: &AmbientLight, light: &DirectionalLight) -> Self {
        Self {
            view_proj: camera.view_projection().to_cols_array_2d(),
            camera_pos: camera.position.extend(1.0).to_array(),
            ambient: ambient.color.scaled(ambient.intensity).to_array(),
            light_dir: light.direction().extend(0.0).to_array(),
            light_color: light.color.scaled(light.intensity).to_array(),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniforms {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// `x > 0.5` skips lighting.
    pub params: [f32; 4],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    Triangles,
    Lines,
}

pub struct DrawCall<'a> {
    pub mesh: &'a Mesh,
    pub matrix: Mat4,
    pub color: Color,
    pub unlit: bool,
    pub topology: Topology,
}

impl<'a> DrawCall<'a> {
    pub fn lit(mesh: &'a Mesh, matrix: Mat4, color: Color) -> Self {
        Self {
            mesh,
            matrix,
            color,
            unlit: false,
            topology: Topology::Triangles,
        }
    }

    pub fn unlit(mesh: &'a Mesh, matrix: Mat4, color: Color) -> Self {
        Self {
            unlit: true,
            ..Self::lit(mesh, matrix, color)
        }
    }

    pub fn lines(mesh: &'a Mesh, matrix: Mat4, color: Color) -> Self {
        Self {
            topology: Topology::Lines,
            ..Self::unlit(mesh, matrix, color)
        }
    }

    fn uniforms(&self) -> ModelUniforms {
        // Normal matrix is inverse transpose of model matrix (for non-uniform scaling)
        let normal_matrix = self.matrix.inverse().transpose();
        ModelUniforms {
            model: self.matrix.to_cols_array_2d(),
            normal_matrix: normal_matrix.to_cols_array_2d(),
            color: self.color.to_array(),
            params: [if self.unlit { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        }
    }
}

pub struct MeshPass {
    triangle_pipeline: wgpu::RenderPipeline,
    line_pipeline: wgpu::RenderPipeline,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    model_layout: wgpu::BindGroupLayout,
    model_buffer: wgpu::Buffer,
    model_bind_group: wgpu::BindGroup,
    model_stride: u64,
    model_capacity: u64,
    pub(crate) depth_view: wgpu::TextureView,
    depth_size: (u32, u32),
}

impl MeshPass {
    pub fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/mesh.wgsl").into()),
        });

        // Frame uniform buffer (group 0)
        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        // Model uniform buffer (group 1), one slot per draw
        let model_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Model Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(std::mem::size_of::<ModelUniforms>() as u64),
                },
                count: None,
            }],
        });

        let align = device.limits().min_uniform_buffer_offset_alignment as u64;
        let model_stride = (std::mem::size_of::<ModelUniforms>() as u64).div_ceil(align) * align;
        let model_capacity = 16;
        let (model_buffer, model_bind_group) =
            Self::create_model_slots(device, &model_layout, model_stride, model_capacity);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &model_layout],
            push_constant_ranges: &[],
        });

        let triangle_pipeline = Self::create_pipeline(
            gpu,
            &shader,
            &pipeline_layout,
            wgpu::PrimitiveTopology::TriangleList,
            "Mesh Triangle Pipeline",
        );
        let line_pipeline = Self::create_pipeline(
            gpu,
            &shader,
            &pipeline_layout,
            wgpu::PrimitiveTopology::LineList,
            "Mesh Line Pipeline",
        );

        let depth_view = Self::create_depth_view(gpu);

        Self {
            triangle_pipeline,
            line_pipeline,
            frame_buffer,
            frame_bind_group,
            model_layout,
            model_buffer,
            model_bind_group,
            model_stride,
            model_capacity,
            depth_view,
            depth_size: (gpu.width(), gpu.height()),
        }
    }

    fn create_pipeline(
        gpu: &GpuContext,
        shader: &wgpu::ShaderModule,
        layout: &wgpu::PipelineLayout,
        topology: wgpu::PrimitiveTopology,
        label: &str,
    ) -> wgpu::RenderPipeline {
        gpu.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: shader,
                    entry_point: Some("vs"),
                    buffers: &[Vertex3d::LAYOUT],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: shader,
                    entry_point: Some("fs"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: gpu.config.format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology,
                    // Loaded assets do not agree on winding
                    cull_mode: None,
                    front_face: wgpu::FrontFace::Ccw,
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
                multiview: None,
                cache: None,
            })
    }

    fn create_model_slots(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        stride: u64,
        capacity: u64,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Model Uniforms"),
            size: stride * capacity,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Model Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(std::mem::size_of::<ModelUniforms>() as u64),
                }),
            }],
        });
        (buffer, bind_group)
    }

    fn create_depth_view(gpu: &GpuContext) -> wgpu::TextureView {
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width: gpu.width(),
                height: gpu.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    pub fn ensure_depth_size(&mut self, gpu: &GpuContext) {
        if self.depth_size != (gpu.width(), gpu.height()) {
            self.depth_view = Self::create_depth_view(gpu);
            self.depth_size = (gpu.width(), gpu.height());
        }
    }

    /// Uploads frame and per-draw uniforms. Call before opening the render pass.
    pub fn prepare(&mut self, gpu: &GpuContext, frame: &FrameUniforms, draws: &[DrawCall]) {
        self.ensure_depth_size(gpu);
        gpu.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::cast_slice(&[*frame]));

        let needed = draws.len() as u64;
        if needed > self.model_capacity {
            let capacity = needed.next_power_of_two();
            let (buffer, bind_group) =
                Self::create_model_slots(&gpu.device, &self.model_layout, self.model_stride, capacity);
            self.model_buffer = buffer;
            self.model_bind_group = bind_group;
            self.model_capacity = capacity;
        }

        if draws.is_empty() {
            return;
        }
        let stride = self.model_stride as usize;
        let mut bytes = vec![0u8; stride * draws.len()];
        for (slot, call) in draws.iter().enumerate() {
            let uniforms = call.uniforms();
            let data = bytemuck::bytes_of(&uniforms);
            bytes[slot * stride..slot * stride + data.len()].copy_from_slice(data);
        }
        gpu.queue.write_buffer(&self.model_buffer, 0, &bytes);
    }

    /// Records the draws prepared by the last [`MeshPass::prepare`].
    pub fn draw(&self, render_pass: &mut wgpu::RenderPass, draws: &[DrawCall]) {
        render_pass.set_bind_group(0, &self.frame_bind_group, &[]);

        for (slot, call) in draws.iter().enumerate() {
            if call.mesh.index_count() == 0 {
                continue;
            }
            let pipeline = match call.topology {
                Topology::Triangles => &self.triangle_pipeline,
                Topology::Lines => &self.line_pipeline,
            };
            render_pass.set_pipeline(pipeline);
            let offset = (slot as u64 * self.model_stride) as u32;
            render_pass.set_bind_group(1, &self.model_bind_group, &[offset]);
            render_pass.set_vertex_buffer(0, call.mesh.vertex_buffer.slice(..));
            render_pass
                .set_index_buffer(call.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..call.mesh.index_count(), 0, 0..1);
        }
    }
}

/// World matrix placing a unit sphere as a marker.
pub fn marker_matrix(position: Vec3, radius: f32) -> Mat4 {
    Mat4::from_scale_rotation_translation(Vec3::splat(radius), glam::Quat::IDENTITY, position)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_sizes_match_shader_layout() {
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 128);
        assert_eq!(std::mem::size_of::<ModelUniforms>(), 160);
    }

    #[test]
    fn marker_matrix_scales_then_translates() {
        let m = marker_matrix(Vec3::new(0.0, 0.0, 2.0), 0.5);
        let p = m.transform_point3(Vec3::X);
        assert!((p - Vec3::new(0.5, 0.0, 2.0)).length() < 1e-6);
    }
}
