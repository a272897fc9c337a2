//! Owns the GPU context, the depth target and the scene pipelines.

pub mod context;
pub mod pipelines;
pub mod targets;

use self::{
    context::GfxContext,
    pipelines::{gizmo::GizmoPipeline, mesh::MeshPipeline, splat::SplatPipeline},
    targets::Targets,
};
use std::sync::Arc;
use winit::{dpi::PhysicalSize, window::Window};

const CLEAR: wgpu::Color = wgpu::Color::BLACK;

pub struct Renderer {
    pub gfx: GfxContext,
    pub targets: Targets,
    pub mesh: MeshPipeline,
    pub splats: SplatPipeline,
    pub gizmo: GizmoPipeline,
    pub egui_renderer: egui_wgpu::Renderer,
}

impl Renderer {
    pub async fn new(window: Arc<Window>, size: PhysicalSize<u32>) -> anyhow::Result<Self> {
        let gfx = GfxContext::new(window, size).await?;
        let color_fmt = gfx.config.format;

        let targets = Targets::new(&gfx.device, gfx.size);
        let mesh = MeshPipeline::new(&gfx.device, color_fmt, targets.depth_fmt);
        let splats = SplatPipeline::new(&gfx.device, color_fmt, targets.depth_fmt);
        let gizmo = GizmoPipeline::new(&gfx.device, color_fmt, targets.depth_fmt);

        let egui_renderer = egui_wgpu::Renderer::new(&gfx.device, color_fmt, None, 1);

        Ok(Self {
            gfx,
            targets,
            mesh,
            splats,
            gizmo,
            egui_renderer,
        })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.gfx.resize(new_size);
            self.targets.resize(&self.gfx.device, new_size);
        }
    }

    /// Draws the opaque model, then the sorted splats, then the gizmo.
    pub fn render(&mut self, swap_view: &wgpu::TextureView) {
        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.mesh.draw(&mut pass);
            self.splats.draw(&mut pass);
            self.gizmo.draw(&mut pass);
        }

        self.gfx.queue.submit(std::iter::once(encoder.finish()));
    }
}
