//! Opaque OBJ meshes lit by the ambient light only.

use crate::scene::{AmbientLight, ModelNode};
use collage::{Material, MeshVertex};
use glam::Mat4;
use std::f32::consts::PI;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshUniforms {
    pub view_proj: [[f32; 4]; 4], // 64 B
    pub model: [[f32; 4]; 4],     // +64
    pub color: [f32; 4],          // +16 -> 144
}

const _: [(); 144] = [(); core::mem::size_of::<MeshUniforms>()];

/// Lambertian response of `material` to ambient irradiance.
pub fn shade(material: &Material, light: &AmbientLight) -> [f32; 4] {
    let [r, g, b, a] = material.diffuse_rgba();
    let e = light.irradiance();
    [r * e[0] / PI, g * e[1] / PI, b * e[2] / PI, a]
}

struct GpuMesh {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
    uniforms: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    color: [f32; 4],
}

pub struct MeshPipeline {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    meshes: Vec<GpuMesh>,
}

impl MeshPipeline {
    pub fn new(
        device: &wgpu::Device,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
    ) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Mesh UBO Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<MeshUniforms>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mesh WGSL"),
            source: wgpu::ShaderSource::Wgsl(MESH_WGSL.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Mesh Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<MeshVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x3],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                // CAD exports do not agree on winding.
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_fmt,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_fmt,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self {
            pipeline,
            layout,
            meshes: Vec::new(),
        }
    }

    /// Replaces the drawn model; meshes without triangles are skipped.
    pub fn upload(&mut self, device: &wgpu::Device, node: &ModelNode, light: &AmbientLight) {
        self.meshes = node
            .model
            .meshes
            .iter()
            .zip(&node.materials)
            .filter(|(mesh, _)| !mesh.indices.is_empty())
            .map(|(mesh, material)| {
                let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Mesh VB"),
                    contents: bytemuck::cast_slice(&mesh.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Mesh IB"),
                    contents: bytemuck::cast_slice(&mesh.indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
                let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Mesh UBO"),
                    size: std::mem::size_of::<MeshUniforms>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Mesh Bind Group"),
                    layout: &self.layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniforms.as_entire_binding(),
                    }],
                });
                GpuMesh {
                    vertices,
                    indices,
                    index_count: mesh.indices.len() as u32,
                    uniforms,
                    bind_group,
                    color: shade(material, light),
                }
            })
            .collect();
    }

    pub fn prepare(&self, queue: &wgpu::Queue, view_proj: Mat4, model: Mat4) {
        for mesh in &self.meshes {
            let data = MeshUniforms {
                view_proj: view_proj.to_cols_array_2d(),
                model: model.to_cols_array_2d(),
                color: mesh.color,
            };
            queue.write_buffer(&mesh.uniforms, 0, bytemuck::bytes_of(&data));
        }
    }

    pub fn draw<'a>(&'a self, rpass: &mut wgpu::RenderPass<'a>) {
        if self.meshes.is_empty() {
            return;
        }
        rpass.set_pipeline(&self.pipeline);
        for mesh in &self.meshes {
            rpass.set_bind_group(0, &mesh.bind_group, &[]);
            rpass.set_vertex_buffer(0, mesh.vertices.slice(..));
            rpass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
            rpass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }
}

const MESH_WGSL: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    model: mat4x4<f32>,
    color: vec4<f32>,
};

@group(0) @binding(0) var<uniform> u: Uniforms;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return u.view_proj * u.model * vec4<f32>(position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return u.color;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambient_shading_scales_diffuse() {
        let mut material = Material::new("grey");
        material.diffuse = [0.5, 0.5, 0.5];
        let color = shade(&material, &AmbientLight::default());
        let expected = 0.5 * 4.1 / PI;
        assert!((color[0] - expected).abs() < 1e-6);
        assert_eq!(color[3], 1.0);
    }

    #[test]
    fn black_light_gives_black() {
        let light = AmbientLight::from_hex(0x000000, 4.1);
        assert_eq!(shade(&Material::default(), &light), [0.0, 0.0, 0.0, 1.0]);
    }
}
