//! Gaussian splat clouds and their on-disk formats.
//!
//! Two encodings are read:
//! - 3DGS `.ply` files (see [`ply`]), with log scales, logit opacity and
//!   spherical-harmonic DC colour;
//! - the compact 32-byte `.splat` record format (see [`dotsplat`]).
//!
//! Both decode into a [`SplatCloud`] of linear-space [`Gaussian`]s.

pub mod dotsplat;
pub mod ply;
pub mod source;

use glam::{Mat3, Mat4, Quat, Vec3};
use rayon::prelude::*;

pub use source::{read_splat_file, SplatFormat, SplatSource};

/// One gaussian in linear space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gaussian {
    pub position: Vec3,
    /// Standard deviations along the local axes.
    pub scale: Vec3,
    pub rotation: Quat,
    /// sRGB colour with opacity in alpha.
    pub color: [u8; 4],
}

impl Gaussian {
    /// 3D covariance `R S Sᵀ Rᵀ` packed as `[xx, xy, xz, yy, yz, zz]`.
    pub fn covariance(&self) -> [f32; 6] {
        let m = Mat3::from_quat(self.rotation.normalize()) * Mat3::from_diagonal(self.scale);
        let sigma = m * m.transpose();
        [
            sigma.x_axis.x,
            sigma.y_axis.x,
            sigma.z_axis.x,
            sigma.y_axis.y,
            sigma.z_axis.y,
            sigma.z_axis.z,
        ]
    }
}

/// Per-instance data of the splat pipeline.
/// Must match the instance inputs of the splat shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SplatInstance {
    pub center: [f32; 3],
    /// Covariance `xx, xy, xz`.
    pub cov_a: [f32; 3],
    /// Covariance `yy, yz, zz`.
    pub cov_b: [f32; 3],
    pub color: [u8; 4],
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplatCloud {
    pub gaussians: Vec<Gaussian>,
}

impl SplatCloud {
    pub fn new(gaussians: Vec<Gaussian>) -> Self {
        Self { gaussians }
    }

    pub fn len(&self) -> usize {
        self.gaussians.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gaussians.is_empty()
    }

    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = self.gaussians.first()?.position;
        Some(self.gaussians.iter().fold((first, first), |(lo, hi), g| {
            (lo.min(g.position), hi.max(g.position))
        }))
    }

    pub fn instances(&self) -> Vec<SplatInstance> {
        self.gaussians
            .par_iter()
            .map(|g| {
                let c = g.covariance();
                SplatInstance {
                    center: g.position.to_array(),
                    cov_a: [c[0], c[1], c[2]],
                    cov_b: [c[3], c[4], c[5]],
                    color: g.color,
                }
            })
            .collect()
    }
}

/// Reorders instances far-to-near as seen through `model_view` (right
/// handed, camera looking down -Z) so alpha blending composites correctly.
pub fn sort_back_to_front(instances: &[SplatInstance], model_view: &Mat4) -> Vec<SplatInstance> {
    let depths: Vec<f32> = instances
        .par_iter()
        .map(|s| model_view.transform_point3(Vec3::from(s.center)).z)
        .collect();

    let mut order: Vec<u32> = (0..instances.len() as u32).collect();
    order.par_sort_unstable_by(|&a, &b| depths[a as usize].total_cmp(&depths[b as usize]));

    order.into_par_iter().map(|i| instances[i as usize]).collect()
}

#[inline]
pub(crate) fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

#[inline]
pub(crate) fn unit_to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaussian_at(z: f32) -> Gaussian {
        Gaussian {
            position: Vec3::new(0.0, 0.0, z),
            scale: Vec3::ONE,
            rotation: Quat::IDENTITY,
            color: [255, 255, 255, 255],
        }
    }

    #[test]
    fn axis_aligned_covariance_is_diagonal_of_squares() {
        let g = Gaussian {
            position: Vec3::ZERO,
            scale: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::IDENTITY,
            color: [0; 4],
        };
        assert_eq!(g.covariance(), [1.0, 0.0, 0.0, 4.0, 0.0, 9.0]);
    }

    #[test]
    fn rotated_covariance_swaps_axes() {
        let g = Gaussian {
            position: Vec3::ZERO,
            scale: Vec3::new(2.0, 1.0, 1.0),
            rotation: Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            color: [0; 4],
        };
        let c = g.covariance();
        assert!((c[0] - 1.0).abs() < 1e-5);
        assert!((c[3] - 4.0).abs() < 1e-5);
        assert!(c[1].abs() < 1e-5);
    }

    #[test]
    fn sorts_far_to_near() {
        let cloud = SplatCloud::new(vec![gaussian_at(-1.0), gaussian_at(-10.0), gaussian_at(-5.0)]);
        let sorted = sort_back_to_front(&cloud.instances(), &Mat4::IDENTITY);
        let zs: Vec<f32> = sorted.iter().map(|s| s.center[2]).collect();
        assert_eq!(zs, vec![-10.0, -5.0, -1.0]);
    }

    #[test]
    fn bounds_cover_all_centers() {
        let cloud = SplatCloud::new(vec![gaussian_at(3.0), gaussian_at(-2.0)]);
        assert_eq!(
            cloud.bounds(),
            Some((Vec3::new(0.0, 0.0, -2.0), Vec3::new(0.0, 0.0, 3.0)))
        );
        assert_eq!(SplatCloud::default().bounds(), None);
    }

    #[test]
    fn helpers_saturate() {
        assert_eq!(unit_to_u8(2.0), 255);
        assert_eq!(unit_to_u8(-1.0), 0);
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
    }
}
