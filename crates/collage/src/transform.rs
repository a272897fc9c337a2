//! Object placement and rotation readout math.

use glam::{Mat3, Mat4, Quat, Vec3};

/// Threshold on `|m13|` beyond which the XYZ decomposition is gimbal locked.
const GIMBAL_EPS: f32 = 0.999_999_9;

/// Position, orientation and per-axis scale of a scene object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Rotates around `axis` expressed in object space.
    pub fn rotate_on_axis(&mut self, axis: Vec3, angle: f32) {
        let axis = axis.normalize_or_zero();
        if axis == Vec3::ZERO {
            return;
        }
        self.rotation = (self.rotation * Quat::from_axis_angle(axis, angle)).normalize();
    }

    /// Rotates around `axis` expressed in world space.
    pub fn rotate_on_world_axis(&mut self, axis: Vec3, angle: f32) {
        let axis = axis.normalize_or_zero();
        if axis == Vec3::ZERO {
            return;
        }
        self.rotation = (Quat::from_axis_angle(axis, angle) * self.rotation).normalize();
    }

    pub fn rotate_x(&mut self, angle: f32) {
        self.rotate_on_axis(Vec3::X, angle);
    }

    pub fn rotate_y(&mut self, angle: f32) {
        self.rotate_on_axis(Vec3::Y, angle);
    }

    pub fn rotate_z(&mut self, angle: f32) {
        self.rotate_on_axis(Vec3::Z, angle);
    }

    /// Local-to-world matrix: translation * rotation * scale.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Unit vector of a local axis (0 = X, 1 = Y, 2 = Z) in world space.
    pub fn local_axis(&self, index: usize) -> Vec3 {
        self.rotation * Vec3::AXES[index.min(2)]
    }
}

/// Pure rotation part of an affine matrix, with per-axis scale divided out.
pub fn extract_rotation(m: &Mat4) -> Mat3 {
    let column = |c: Vec3| {
        let len = c.length();
        if len > f32::EPSILON {
            c / len
        } else {
            Vec3::ZERO
        }
    };

    Mat3::from_cols(
        column(m.x_axis.truncate()),
        column(m.y_axis.truncate()),
        column(m.z_axis.truncate()),
    )
}

/// Euler angles in radians for the intrinsic X-Y-Z order, i.e. the angles
/// `(x, y, z)` with `m == Rx(x) * Ry(y) * Rz(z)`.
pub fn euler_xyz(m: &Mat3) -> Vec3 {
    // Row/column naming: m12 is row 1, column 2.
    let m11 = m.x_axis.x;
    let m12 = m.y_axis.x;
    let m13 = m.z_axis.x;
    let m22 = m.y_axis.y;
    let m23 = m.z_axis.y;
    let m32 = m.y_axis.z;
    let m33 = m.z_axis.z;

    let y = m13.clamp(-1.0, 1.0).asin();

    if m13.abs() < GIMBAL_EPS {
        Vec3::new((-m23).atan2(m33), y, (-m12).atan2(m11))
    } else {
        Vec3::new(m32.atan2(m22), y, 0.0)
    }
}

/// Display angles of a model: the Euler decomposition of its current
/// rotation, independent of any scale baked into the transform.
pub fn model_angles(t: &Transform) -> Vec3 {
    euler_xyz(&extract_rotation(&t.matrix()))
}
