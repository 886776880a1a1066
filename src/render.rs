//! The wgpu-backed [`Renderer`] used by the desktop viewer.

use std::sync::Arc;

use glam::{Mat4, Vec3};
use winit::window::Window;

use crate::camera::Camera;
use crate::geometry::RawGeometry;
use crate::gpu::{GpuContext, RenderError};
use crate::mesh::Mesh;
use crate::mesh_pass::{DrawCall, FrameUniforms, MeshPass, marker_matrix};
use crate::model::Color;
use crate::scene::Scene;
use crate::session::{Canvas, Renderer};

const AXIS_COLORS: [Color; 3] = [Color::RED, Color::GREEN, Color::BLUE];

struct GpuState {
    gpu: GpuContext,
    pass: MeshPass,
    /// One mesh per model part, uploaded on the first frame.
    parts: Option<Vec<Mesh>>,
    marker: Mesh,
    axes: [Mesh; 3],
}

/// Renders a [`Scene`] into a window surface.
///
/// Owns its own GPU context; [`Renderer::dispose`] drops it.
pub struct WgpuRenderer {
    state: Option<GpuState>,
}

impl WgpuRenderer {
    pub fn new(window: Arc<Window>) -> Result<Self, RenderError> {
        let gpu = GpuContext::new(window)?;
        let pass = MeshPass::new(&gpu);
        let marker = Mesh::from_geometry(&gpu.device, &RawGeometry::uv_sphere(1.0, 16, 12));
        let axes = [Vec3::X, Vec3::Y, Vec3::Z]
            .map(|axis| Mesh::from_geometry(&gpu.device, &RawGeometry::segment(axis)));

        Ok(Self {
            state: Some(GpuState {
                gpu,
                pass,
                parts: None,
                marker,
                axes,
            }),
        })
    }

    pub fn is_disposed(&self) -> bool {
        self.state.is_none()
    }
}

impl Renderer for WgpuRenderer {
    fn render(&mut self, scene: &Scene, camera: &Camera) {
        let Some(GpuState {
            gpu,
            pass,
            parts,
            marker,
            axes,
        }) = self.state.as_mut()
        else {
            return;
        };

        let Some(model) = scene.model() else {
            return;
        };
        let parts = parts.get_or_insert_with(|| {
            log::debug!("uploading {} mesh parts", model.parts().len());
            model
                .parts()
                .iter()
                .map(|part| Mesh::from_geometry(&gpu.device, &part.geometry))
                .collect()
        });

        let mut draws: Vec<DrawCall> = model
            .world_parts()
            .zip(parts.iter())
            .map(|((world, part), mesh)| DrawCall::lit(mesh, world, part.material.color))
            .collect();
        for m in scene.markers() {
            draws.push(DrawCall::unlit(marker, marker_matrix(m.position, m.radius), m.color));
        }
        if let Some(indicator) = scene.axis_indicator() {
            let scale = Mat4::from_scale(Vec3::splat(indicator.size));
            for (mesh, color) in axes.iter().zip(AXIS_COLORS) {
                draws.push(DrawCall::lines(mesh, scale, color));
            }
        }

        let frame = FrameUniforms::new(camera, &scene.ambient_light(), &scene.directional_light());
        pass.prepare(gpu, &frame, &draws);

        let output = match gpu.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("surface lost, reconfiguring");
                gpu.reconfigure();
                return;
            }
            Err(err) => {
                log::warn!("skipping frame: {err}");
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Scene Encoder"),
            });

        {
            let bg = scene.background;
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: bg.r as f64,
                            g: bg.g as f64,
                            b: bg.b as f64,
                            a: bg.a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &pass.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.draw(&mut render_pass, &draws);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
    }

    fn resize(&mut self, width: u32, height: u32) {
        if let Some(state) = self.state.as_mut() {
            state.gpu.resize(width, height);
        }
    }

    fn dispose(&mut self) {
        if self.state.take().is_some() {
            log::debug!("GPU resources released");
        }
    }
}

/// A window that binds a fresh [`WgpuRenderer`] for every session.
#[derive(Clone)]
pub struct WindowCanvas {
    window: Arc<Window>,
}

impl WindowCanvas {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }
}

impl Canvas for WindowCanvas {
    type Renderer = WgpuRenderer;

    fn dimensions(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn create_renderer(&self) -> Result<WgpuRenderer, RenderError> {
        WgpuRenderer::new(self.window.clone())
    }
}
