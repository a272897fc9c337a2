//! Gaussian splats as camera-facing quads.
//!
//! Each gaussian's 3D covariance is projected to a 2D screen ellipse in the
//! vertex shader; the quad spans two standard deviations along the ellipse
//! axes and the fragment shader evaluates the gaussian falloff. Splats are
//! blended premultiplied, so instances are kept sorted back to front.

use collage::splat::{sort_back_to_front, SplatCloud, SplatInstance};
use glam::Mat4;
use wgpu::util::DeviceExt;

/// Matrix change below which the previous depth order is reused.
const SORT_EPSILON: f32 = 1e-3;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SplatUniforms {
    pub model_view: [[f32; 4]; 4], // 64 B
    pub proj: [[f32; 4]; 4],       // +64
    pub viewport: [f32; 2],        // +8
    /// Focal lengths in pixels.
    pub focal: [f32; 2],           // +8 -> 144
}

const _: [(); 144] = [(); core::mem::size_of::<SplatUniforms>()];

impl SplatUniforms {
    pub fn new(model_view: Mat4, proj: Mat4, viewport: [f32; 2], fov_y_rad: f32) -> Self {
        let fy = viewport[1] / (2.0 * (fov_y_rad / 2.0).tan());
        Self {
            model_view: model_view.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
            viewport,
            focal: [fy, fy],
        }
    }
}

/// True when the splats must be re-sorted for `model_view`.
pub fn needs_sort(last: Option<&Mat4>, model_view: &Mat4) -> bool {
    last.map_or(true, |m| !m.abs_diff_eq(*model_view, SORT_EPSILON))
}

pub struct SplatPipeline {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    quad_vb: wgpu::Buffer,
    instances: Vec<SplatInstance>,
    instance_buffer: Option<wgpu::Buffer>,
    sorted_for: Option<Mat4>,
}

impl SplatPipeline {
    pub fn new(
        device: &wgpu::Device,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
    ) -> Self {
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Splat Uniform Buffer"),
            size: std::mem::size_of::<SplatUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Splat BGL"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<SplatUniforms>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Splat Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Splat WGSL"),
            source: wgpu::ShaderSource::Wgsl(SPLAT_WGSL.into()),
        });

        let quad_corners: [[f32; 2]; 6] = [
            [-1.0, -1.0],
            [1.0, -1.0],
            [1.0, 1.0],
            [-1.0, -1.0],
            [1.0, 1.0],
            [-1.0, 1.0],
        ];
        let quad_vb = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Splat Quad VB"),
            contents: bytemuck::cast_slice(&quad_corners),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let vbuf_layouts = [
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[wgpu::VertexAttribute {
                    shader_location: 0,
                    offset: 0,
                    format: wgpu::VertexFormat::Float32x2,
                }],
            },
            // Layout of `SplatInstance`.
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<SplatInstance>() as u64,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &wgpu::vertex_attr_array![
                    1 => Float32x3,
                    2 => Float32x3,
                    3 => Float32x3,
                    4 => Unorm8x4
                ],
            },
        ];

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Splat Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let premultiplied = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Splat Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &vbuf_layouts,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            // Tested against the mesh, but splats never occlude each other.
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_fmt,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_fmt,
                    blend: Some(wgpu::BlendState {
                        color: premultiplied,
                        alpha: premultiplied,
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self {
            pipeline,
            bind_group,
            uniform_buffer,
            quad_vb,
            instances: Vec::new(),
            instance_buffer: None,
            sorted_for: None,
        }
    }

    /// Replaces the drawn cloud.
    pub fn upload(&mut self, device: &wgpu::Device, cloud: &SplatCloud) {
        self.instances = cloud.instances();
        self.sorted_for = None;
        self.instance_buffer = (!self.instances.is_empty()).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Splat Instances"),
                contents: bytemuck::cast_slice(&self.instances),
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            })
        });
        log::debug!("Uploaded {} splat instances", self.instances.len());
    }

    pub fn prepare(&mut self, queue: &wgpu::Queue, uniforms: &SplatUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));

        let Some(buffer) = &self.instance_buffer else {
            return;
        };
        let model_view = Mat4::from_cols_array_2d(&uniforms.model_view);
        if needs_sort(self.sorted_for.as_ref(), &model_view) {
            let sorted = sort_back_to_front(&self.instances, &model_view);
            queue.write_buffer(buffer, 0, bytemuck::cast_slice(&sorted));
            self.sorted_for = Some(model_view);
        }
    }

    pub fn draw<'a>(&'a self, rpass: &mut wgpu::RenderPass<'a>) {
        let Some(buffer) = &self.instance_buffer else {
            return;
        };
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.bind_group, &[]);
        rpass.set_vertex_buffer(0, self.quad_vb.slice(..));
        rpass.set_vertex_buffer(1, buffer.slice(..));
        rpass.draw(0..6, 0..self.instances.len() as u32);
    }
}

const SPLAT_WGSL: &str = r#"
struct Uniforms {
    model_view: mat4x4<f32>,
    proj: mat4x4<f32>,
    viewport: vec2<f32>,
    focal: vec2<f32>,
};

@group(0) @binding(0) var<uniform> u: Uniforms;

struct VsIn {
    @location(0) corner: vec2<f32>,
    @location(1) center: vec3<f32>,
    @location(2) cov_a: vec3<f32>,
    @location(3) cov_b: vec3<f32>,
    @location(4) color: vec4<f32>,
};

struct VsOut {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) offset: vec2<f32>,
};

// Quad half-extent, in units of sqrt(2 * eigenvalue).
const EXTENT: f32 = 2.0;

fn srgb_to_linear(c: vec3<f32>) -> vec3<f32> {
    let lo = c / 12.92;
    let hi = pow((c + vec3<f32>(0.055)) / 1.055, vec3<f32>(2.4));
    return select(hi, lo, c <= vec3<f32>(0.04045));
}

@vertex
fn vs_main(in: VsIn) -> VsOut {
    var out: VsOut;
    out.position = vec4<f32>(0.0, 0.0, 2.0, 1.0);
    out.color = vec4<f32>(0.0);
    out.offset = vec2<f32>(0.0);

    let cam = u.model_view * vec4<f32>(in.center, 1.0);
    let clip = u.proj * cam;
    let bound = 1.2 * clip.w;
    if (clip.w <= 0.0 || abs(clip.x) > bound || abs(clip.y) > bound) {
        return out;
    }

    let sigma = mat3x3<f32>(
        vec3<f32>(in.cov_a.x, in.cov_a.y, in.cov_a.z),
        vec3<f32>(in.cov_a.y, in.cov_b.x, in.cov_b.y),
        vec3<f32>(in.cov_a.z, in.cov_b.y, in.cov_b.z),
    );

    // Jacobian of the perspective projection at the splat centre.
    let z = cam.z;
    let z2 = z * z;
    let j = mat3x3<f32>(
        vec3<f32>(-u.focal.x / z, 0.0, 0.0),
        vec3<f32>(0.0, -u.focal.y / z, 0.0),
        vec3<f32>(u.focal.x * cam.x / z2, u.focal.y * cam.y / z2, 0.0),
    );
    let w = mat3x3<f32>(u.model_view[0].xyz, u.model_view[1].xyz, u.model_view[2].xyz);
    let t = j * w;
    let cov = t * sigma * transpose(t);

    // Low-pass filter keeps tiny splats at least a pixel wide.
    let a = cov[0][0] + 0.3;
    let b = cov[0][1];
    let c = cov[1][1] + 0.3;

    let mid = 0.5 * (a + c);
    let radius = length(vec2<f32>(0.5 * (a - c), b));
    let l1 = mid + radius;
    let l2 = max(mid - radius, 0.1);

    var dir = vec2<f32>(1.0, 0.0);
    if (abs(b) > 1e-6) {
        dir = normalize(vec2<f32>(b, l1 - a));
    } else if (c > a) {
        dir = vec2<f32>(0.0, 1.0);
    }
    let major = min(sqrt(2.0 * l1), 1024.0) * dir;
    let minor = min(sqrt(2.0 * l2), 1024.0) * vec2<f32>(dir.y, -dir.x);

    let corner = in.corner * EXTENT;
    let px = corner.x * major + corner.y * minor;
    let ndc = clip.xy / clip.w + 2.0 * px / u.viewport;

    out.position = vec4<f32>(ndc, clip.z / clip.w, 1.0);
    out.color = vec4<f32>(srgb_to_linear(in.color.rgb), in.color.a);
    out.offset = corner;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let power = -dot(in.offset, in.offset);
    if (power < -EXTENT * EXTENT) {
        discard;
    }
    let alpha = min(0.99, exp(power) * in.color.a);
    if (alpha < 1.0 / 255.0) {
        discard;
    }
    return vec4<f32>(in.color.rgb * alpha, alpha);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn focal_length_matches_fov() {
        let u = SplatUniforms::new(Mat4::IDENTITY, Mat4::IDENTITY, [800.0, 600.0], 90f32.to_radians());
        assert!((u.focal[0] - 300.0).abs() < 1e-3);
        assert_eq!(u.focal[0], u.focal[1]);
    }

    #[test]
    fn resort_only_after_view_changes() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 250.0, 220.0), Vec3::ZERO, Vec3::Y);
        assert!(needs_sort(None, &view));
        assert!(!needs_sort(Some(&view), &view));

        let moved = Mat4::look_at_rh(Vec3::new(1.0, 250.0, 220.0), Vec3::ZERO, Vec3::Y);
        assert!(needs_sort(Some(&view), &moved));
    }
}
