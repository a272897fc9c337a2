use glam::{Mat4, Vec2, Vec3};
use std::f32::consts::{PI, TAU};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

pub const FOV_Y_DEG: f32 = 50.0;
pub const NEAR: f32 = 1.0;
pub const FAR: f32 = 1500.0;
pub const INITIAL_EYE: Vec3 = Vec3::new(0.0, 250.0, 220.0);
pub const DAMPING_FACTOR: f32 = 0.05;

/// Keeps the polar angle away from the poles, where `look_at` degenerates.
const POLAR_EPS: f32 = 1e-6;

/// A half-line in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Distance along the ray to the plane through `point` with `normal`.
    /// `None` when parallel or behind the origin.
    pub fn intersect_plane(&self, point: Vec3, normal: Vec3) -> Option<f32> {
        let denom = normal.dot(self.direction);
        if denom.abs() < 1e-6 {
            return None;
        }
        let t = normal.dot(point - self.origin) / denom;
        (t >= 0.0).then_some(t)
    }

    /// Closest approach to the segment `a..b`: `(t along the ray, distance)`.
    pub fn closest_to_segment(&self, a: Vec3, b: Vec3) -> (f32, f32) {
        let seg = b - a;
        let seg_len2 = seg.length_squared();
        let w = self.origin - a;

        let d = self.direction;
        let b_dot = d.dot(seg);
        let denom = seg_len2 - b_dot * b_dot;

        // Segment parameter in [0, 1]; parallel lines fall back to the start.
        let s = if seg_len2 <= f32::EPSILON || denom.abs() < 1e-9 {
            0.0
        } else {
            ((seg.dot(w) - b_dot * d.dot(w)) / denom).clamp(0.0, 1.0)
        };

        let on_seg = a + seg * s;
        let t = d.dot(on_seg - self.origin).max(0.0);
        (t, self.at(t).distance(on_seg))
    }
}

/// Perspective camera looking from `eye` at `target`.
#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    pub fov_y_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

impl PerspectiveCamera {
    pub fn new(aspect: f32) -> Self {
        Self {
            fov_y_deg: FOV_Y_DEG,
            aspect,
            near: NEAR,
            far: FAR,
            eye: INITIAL_EYE,
            target: Vec3::ZERO,
            up: Vec3::Y,
        }
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// Right-handed projection with wgpu's 0..1 depth range.
    pub fn proj(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_deg.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.proj() * self.view()
    }

    /// World-space ray through a pixel (origin top-left).
    pub fn ray_from_screen(&self, px: f32, py: f32, viewport: Vec2) -> Ray {
        let ndc = Vec2::new(
            2.0 * px / viewport.x.max(1.0) - 1.0,
            1.0 - 2.0 * py / viewport.y.max(1.0),
        );
        let inv = self.view_proj().inverse();
        let near = inv.project_point3(ndc.extend(0.0));
        let far = inv.project_point3(ndc.extend(1.0));
        Ray::new(near, far - near)
    }
}

/// Orbit, dolly and pan around the camera target, with optional damping.
///
/// Input accumulates into pending deltas; [`OrbitControls::update`] applies
/// them to the camera once per frame. With damping on, only a
/// `damping_factor` share of the pending motion is applied each frame and
/// the remainder decays, so the camera glides to a stop.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub enabled: bool,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,

    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
    pan_offset: Vec3,

    rotating: bool,
    panning: bool,
    last_cursor: Option<Vec2>,
    viewport_height: f32,
}

impl OrbitControls {
    pub fn new() -> Self {
        Self {
            enabled: true,
            enable_damping: true,
            damping_factor: DAMPING_FACTOR,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            pan_offset: Vec3::ZERO,
            rotating: false,
            panning: false,
            last_cursor: None,
            viewport_height: 1.0,
        }
    }

    pub fn set_viewport_height(&mut self, height: u32) {
        self.viewport_height = height.max(1) as f32;
    }

    pub fn is_active(&self) -> bool {
        self.rotating || self.panning
    }

    /// Left drag orbits, right drag pans, the wheel dollies.
    pub fn handle_event(&mut self, event: &WindowEvent, camera: &PerspectiveCamera) {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                let cursor = Vec2::new(position.x as f32, position.y as f32);
                if let Some(last) = self.last_cursor {
                    let delta = cursor - last;
                    if self.enabled && self.rotating {
                        self.rotate_pixels(delta);
                    } else if self.enabled && self.panning {
                        self.pan_pixels(delta, camera);
                    }
                }
                self.last_cursor = Some(cursor);
            }
            WindowEvent::MouseInput { button, state, .. } => {
                let pressed = *state == ElementState::Pressed;
                if pressed && !self.enabled {
                    return;
                }
                match button {
                    MouseButton::Left => self.rotating = pressed,
                    MouseButton::Right => self.panning = pressed,
                    _ => {}
                }
            }
            WindowEvent::MouseWheel { delta, .. } if self.enabled => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 120.0,
                };
                self.dolly(scroll);
            }
            _ => {}
        }
    }

    fn rotate_pixels(&mut self, delta: Vec2) {
        let h = self.viewport_height;
        self.rotate_left(TAU * delta.x / h * self.rotate_speed);
        self.rotate_up(TAU * delta.y / h * self.rotate_speed);
    }

    fn pan_pixels(&mut self, delta: Vec2, camera: &PerspectiveCamera) {
        // World units per pixel at the target's depth.
        let target_distance =
            (camera.eye - camera.target).length() * (camera.fov_y_deg.to_radians() / 2.0).tan();
        let per_pixel = 2.0 * target_distance / self.viewport_height;

        let view_inv = camera.view().inverse();
        let right = view_inv.x_axis.truncate();
        let up = view_inv.y_axis.truncate();
        self.pan_offset += -right * delta.x * per_pixel + up * delta.y * per_pixel;
    }

    /// Azimuth change (radians); positive turns the view to the left.
    pub fn rotate_left(&mut self, angle: f32) {
        self.delta_theta -= angle;
    }

    /// Polar change (radians); positive tilts the view upwards.
    pub fn rotate_up(&mut self, angle: f32) {
        self.delta_phi -= angle;
    }

    /// Positive steps move towards the target.
    pub fn dolly(&mut self, steps: f32) {
        let zoom = 0.95f32.powf(self.zoom_speed * steps.abs());
        if steps > 0.0 {
            self.scale *= zoom;
        } else if steps < 0.0 {
            self.scale /= zoom;
        }
    }

    pub fn pan(&mut self, offset: Vec3) {
        self.pan_offset += offset;
    }

    /// Applies pending motion to `camera`; true if the eye moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let offset = camera.eye - camera.target;
        let mut radius = offset.length();
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = if radius > 0.0 {
            (offset.y / radius).clamp(-1.0, 1.0).acos()
        } else {
            0.0
        };

        let step = if self.enable_damping { self.damping_factor } else { 1.0 };
        theta += self.delta_theta * step;
        phi += self.delta_phi * step;
        phi = phi.clamp(POLAR_EPS, PI - POLAR_EPS);

        radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);
        camera.target += self.pan_offset * step;

        let new_offset = Vec3::new(
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
            radius * phi.sin() * theta.cos(),
        );
        let old_eye = camera.eye;
        camera.eye = camera.target + new_offset;

        if self.enable_damping {
            let keep = 1.0 - self.damping_factor;
            self.delta_theta *= keep;
            self.delta_phi *= keep;
            self.pan_offset *= keep;
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
            self.pan_offset = Vec3::ZERO;
        }
        self.scale = 1.0;

        old_eye.distance_squared(camera.eye) > 1e-6
    }
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> PerspectiveCamera {
        PerspectiveCamera::new(16.0 / 9.0)
    }

    #[test]
    fn initial_camera_setup() {
        let cam = camera();
        assert_eq!(cam.eye, Vec3::new(0.0, 250.0, 220.0));
        assert_eq!(cam.fov_y_deg, 50.0);
        assert_eq!((cam.near, cam.far), (1.0, 1500.0));
        assert_eq!(OrbitControls::new().damping_factor, 0.05);
    }

    #[test]
    fn center_ray_points_at_target() {
        let cam = camera();
        let ray = cam.ray_from_screen(640.0, 360.0, Vec2::new(1280.0, 720.0));
        let to_target = (cam.target - cam.eye).normalize();
        assert!(ray.direction.dot(to_target) > 0.9999);
    }

    #[test]
    fn update_without_input_keeps_eye() {
        let mut cam = camera();
        let mut orbit = OrbitControls::new();
        assert!(!orbit.update(&mut cam));
        assert!(cam.eye.distance(INITIAL_EYE) < 1e-3);
    }

    #[test]
    fn damped_rotation_glides_and_settles() {
        let mut cam = camera();
        let mut orbit = OrbitControls::new();
        let radius = cam.eye.length();

        orbit.rotate_left(0.5);
        assert!(orbit.update(&mut cam));
        let after_one = cam.eye;
        assert!(after_one.distance(INITIAL_EYE) > 0.0);

        for _ in 0..500 {
            orbit.update(&mut cam);
        }
        // Distance to the target is preserved by orbiting.
        assert!((cam.eye.length() - radius).abs() < 1e-2);
        // The total azimuth change converges to the requested angle.
        let theta = cam.eye.x.atan2(cam.eye.z);
        assert!((theta + 0.5).abs() < 1e-3, "theta = {theta}");
        assert!(!orbit.update(&mut cam));
    }

    #[test]
    fn undamped_rotation_applies_at_once() {
        let mut cam = camera();
        let mut orbit = OrbitControls::new();
        orbit.enable_damping = false;
        orbit.rotate_left(-0.25);
        orbit.update(&mut cam);
        let theta = cam.eye.x.atan2(cam.eye.z);
        assert!((theta - 0.25).abs() < 1e-4);
    }

    #[test]
    fn polar_angle_is_clamped() {
        let mut cam = camera();
        let mut orbit = OrbitControls::new();
        orbit.enable_damping = false;
        orbit.rotate_up(10.0);
        orbit.update(&mut cam);
        assert!(cam.eye.y > 0.0);
        assert!(cam.eye.x.is_finite() && cam.eye.z.is_finite());
    }

    #[test]
    fn dolly_in_and_out() {
        let mut cam = camera();
        let mut orbit = OrbitControls::new();
        let r0 = cam.eye.length();

        orbit.dolly(1.0);
        orbit.update(&mut cam);
        let r1 = cam.eye.length();
        assert!((r1 - r0 * 0.95).abs() < 1e-2);

        orbit.dolly(-1.0);
        orbit.update(&mut cam);
        assert!((cam.eye.length() - r0).abs() < 1e-2);
    }

    #[test]
    fn pan_moves_target_and_eye_together() {
        let mut cam = camera();
        let mut orbit = OrbitControls::new();
        orbit.enable_damping = false;
        orbit.pan(Vec3::new(10.0, 0.0, 0.0));
        orbit.update(&mut cam);
        assert!(cam.target.distance(Vec3::new(10.0, 0.0, 0.0)) < 1e-4);
        assert!(cam.eye.distance(INITIAL_EYE + Vec3::new(10.0, 0.0, 0.0)) < 1e-2);
    }

    #[test]
    fn ray_plane_and_segment_queries() {
        let ray = Ray::new(Vec3::new(0.0, 10.0, 0.0), Vec3::NEG_Y);
        assert_eq!(ray.intersect_plane(Vec3::ZERO, Vec3::Y), Some(10.0));
        assert_eq!(ray.intersect_plane(Vec3::new(0.0, 20.0, 0.0), Vec3::Y), None);

        let (t, d) = ray.closest_to_segment(Vec3::new(-1.0, 5.0, 2.0), Vec3::new(1.0, 5.0, 2.0));
        assert!((t - 5.0).abs() < 1e-5);
        assert!((d - 2.0).abs() < 1e-5);
    }
}
