//! Transform gizmo: axis handles for moving, rotating and scaling the model.
//!
//! Translate and rotate work on world axes; scale works on the model's local
//! axes. Each axis handle is only pickable while its `show_*` flag is set.

use crate::camera::Ray;
use collage::Transform;
use glam::{Quat, Vec3};
use std::f32::consts::TAU;

/// Handle length as a fraction of `distance * tan(fov / 2)`, which keeps the
/// gizmo at a roughly constant size on screen.
const SCREEN_FRACTION: f32 = 0.27;

/// Pick tolerance as a fraction of the handle length.
const PICK_TOLERANCE: f32 = 0.12;

const RING_SEGMENTS: usize = 48;
const MIN_SCALE: f32 = 1e-4;

const AXIS_COLORS: [[f32; 4]; 3] = [
    [1.0, 0.25, 0.25, 1.0],
    [0.3, 0.9, 0.3, 1.0],
    [0.3, 0.45, 1.0, 1.0],
];
const ACTIVE_COLOR: [f32; 4] = [1.0, 0.9, 0.2, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GizmoMode {
    #[default]
    Translate,
    Rotate,
    Scale,
}

impl GizmoMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Translate => "translate",
            Self::Rotate => "rotate",
            Self::Scale => "scale",
        }
    }
}

/// Vertex of the gizmo line list.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    axis: usize,
    start: Transform,
    /// World direction the drag works along (or around, for rotate).
    direction: Vec3,
    plane_normal: Vec3,
    start_point: Vec3,
}

#[derive(Debug, Clone)]
pub struct TransformGizmo {
    pub mode: GizmoMode,
    pub show_x: bool,
    pub show_y: bool,
    pub show_z: bool,
    hovered: Option<usize>,
    drag: Option<Drag>,
}

impl Default for TransformGizmo {
    fn default() -> Self {
        Self::attached()
    }
}

impl TransformGizmo {
    /// A gizmo freshly attached to an object, with all handles hidden.
    pub fn attached() -> Self {
        Self {
            mode: GizmoMode::Translate,
            show_x: false,
            show_y: false,
            show_z: false,
            hovered: None,
            drag: None,
        }
    }

    pub fn shown(&self) -> [bool; 3] {
        [self.show_x, self.show_y, self.show_z]
    }

    /// Re-attaches to a freshly loaded target: handles hidden, any drag
    /// dropped, mode kept. Returns `Some(false)` when a drag was cancelled.
    pub fn attach(&mut self) -> Option<bool> {
        let cancelled = self.end_drag();
        *self = Self {
            mode: self.mode,
            ..Self::attached()
        };
        cancelled
    }

    /// Flips handle visibility based on the X flag and applies the result to
    /// all three axes. Returns the new status.
    pub fn toggle_visibility(&mut self) -> bool {
        let status = !self.show_x;
        self.show_x = status;
        self.show_y = status;
        self.show_z = status;
        if !status {
            self.hovered = None;
        }
        status
    }

    /// Switches mode unless a drag is in progress.
    pub fn set_mode(&mut self, mode: GizmoMode) {
        if self.drag.is_none() {
            self.mode = mode;
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn active_axis(&self) -> Option<usize> {
        self.drag.map(|d| d.axis).or(self.hovered)
    }

    fn axis_direction(&self, target: &Transform, axis: usize) -> Vec3 {
        match self.mode {
            GizmoMode::Translate | GizmoMode::Rotate => Vec3::AXES[axis],
            GizmoMode::Scale => target.local_axis(axis),
        }
    }

    /// Visible handle under `ray`, nearest to the viewer.
    pub fn pick(&self, ray: &Ray, target: &Transform, handle_len: f32) -> Option<usize> {
        let origin = target.position;
        let tolerance = handle_len * PICK_TOLERANCE;

        let mut best: Option<(usize, f32)> = None;
        for axis in (0..3).filter(|&i| self.shown()[i]) {
            let dir = self.axis_direction(target, axis);

            let hit = match self.mode {
                GizmoMode::Translate | GizmoMode::Scale => {
                    let (t, dist) = ray.closest_to_segment(origin, origin + dir * handle_len);
                    (dist <= tolerance).then_some(t)
                }
                GizmoMode::Rotate => ray.intersect_plane(origin, dir).filter(|&t| {
                    (ray.at(t).distance(origin) - handle_len).abs() <= tolerance
                }),
            };

            if let Some(t) = hit {
                if best.map_or(true, |(_, bt)| t < bt) {
                    best = Some((axis, t));
                }
            }
        }
        best.map(|(axis, _)| axis)
    }

    /// Updates the highlighted handle; ignored while dragging.
    pub fn hover(&mut self, ray: &Ray, target: &Transform, handle_len: f32) {
        if self.drag.is_none() {
            self.hovered = self.pick(ray, target, handle_len);
        }
    }

    /// Starts a drag if `ray` hits a visible handle.
    /// Returns `Some(true)` as the dragging-changed notification.
    pub fn begin_drag(&mut self, ray: &Ray, target: &Transform, handle_len: f32) -> Option<bool> {
        if self.drag.is_some() {
            return None;
        }
        let axis = self.pick(ray, target, handle_len)?;
        let direction = self.axis_direction(target, axis);

        let plane_normal = match self.mode {
            GizmoMode::Rotate => direction,
            // The plane containing the axis that faces the viewer the most.
            GizmoMode::Translate | GizmoMode::Scale => {
                direction.cross(ray.direction).cross(direction).normalize_or_zero()
            }
        };
        if plane_normal == Vec3::ZERO {
            return None;
        }

        let t = ray.intersect_plane(target.position, plane_normal)?;
        self.drag = Some(Drag {
            axis,
            start: *target,
            direction,
            plane_normal,
            start_point: ray.at(t),
        });
        self.hovered = Some(axis);
        log::debug!("gizmo drag started: {} axis {axis}", self.mode.label());
        Some(true)
    }

    /// Placement of the dragged object for the current pointer ray, or `None`
    /// when not dragging or the ray misses the drag plane.
    pub fn drag_to(&self, ray: &Ray) -> Option<Transform> {
        let drag = self.drag?;
        let origin = drag.start.position;
        let t = ray.intersect_plane(origin, drag.plane_normal)?;
        let point = ray.at(t);

        let mut out = drag.start;
        match self.mode {
            GizmoMode::Translate => {
                let along = (point - drag.start_point).dot(drag.direction);
                out.position = origin + drag.direction * along;
            }
            GizmoMode::Rotate => {
                let angle = signed_angle(
                    drag.start_point - origin,
                    point - origin,
                    drag.direction,
                );
                out.rotation = (Quat::from_axis_angle(drag.direction, angle) * drag.start.rotation)
                    .normalize();
            }
            GizmoMode::Scale => {
                let d0 = (drag.start_point - origin).dot(drag.direction);
                let d1 = (point - origin).dot(drag.direction);
                if d0.abs() <= f32::EPSILON {
                    return None;
                }
                let scaled = (drag.start.scale[drag.axis] * d1 / d0).max(MIN_SCALE);
                out.scale[drag.axis] = scaled;
            }
        }
        Some(out)
    }

    /// Ends the drag. Returns `Some(false)` as the dragging-changed
    /// notification if one was active.
    pub fn end_drag(&mut self) -> Option<bool> {
        self.drag.take().map(|_| {
            log::debug!("gizmo drag ended");
            false
        })
    }

    /// Line-list geometry for the visible handles.
    pub fn lines(&self, target: &Transform, handle_len: f32) -> Vec<LineVertex> {
        let mut out = Vec::new();
        let origin = target.position;

        for axis in (0..3).filter(|&i| self.shown()[i]) {
            let color = if self.active_axis() == Some(axis) {
                ACTIVE_COLOR
            } else {
                AXIS_COLORS[axis]
            };
            let dir = self.axis_direction(target, axis);
            let (side_a, side_b) = dir.any_orthonormal_pair();
            let mut seg = |a: Vec3, b: Vec3| {
                out.push(LineVertex { position: a.to_array(), color });
                out.push(LineVertex { position: b.to_array(), color });
            };

            match self.mode {
                GizmoMode::Translate => {
                    let tip = origin + dir * handle_len;
                    let back = tip - dir * handle_len * 0.15;
                    seg(origin, tip);
                    for side in [side_a, -side_a, side_b, -side_b] {
                        seg(tip, back + side * handle_len * 0.06);
                    }
                }
                GizmoMode::Scale => {
                    let tip = origin + dir * handle_len;
                    let h = handle_len * 0.06;
                    seg(origin, tip);
                    for (u, v) in [(side_a, side_b), (side_b, -side_a)] {
                        seg(tip + (u + v) * h, tip + (u - v) * h);
                        seg(tip - (u + v) * h, tip - (u - v) * h);
                    }
                }
                GizmoMode::Rotate => {
                    let point = |i: usize| {
                        let a = TAU * i as f32 / RING_SEGMENTS as f32;
                        origin + (side_a * a.cos() + side_b * a.sin()) * handle_len
                    };
                    for i in 0..RING_SEGMENTS {
                        seg(point(i), point(i + 1));
                    }
                }
            }
        }
        out
    }
}

/// World-space handle length for a gizmo at `at` seen from `eye`.
pub fn handle_length(eye: Vec3, at: Vec3, fov_y_deg: f32) -> f32 {
    eye.distance(at).max(1e-3) * (fov_y_deg.to_radians() / 2.0).tan() * SCREEN_FRACTION
}

/// Angle from `a` to `b` around `axis`, both projected onto its plane.
fn signed_angle(a: Vec3, b: Vec3, axis: Vec3) -> f32 {
    let a = a - axis * a.dot(axis);
    let b = b - axis * b.dot(axis);
    axis.dot(a.cross(b)).atan2(a.dot(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn visible() -> TransformGizmo {
        let mut g = TransformGizmo::attached();
        g.toggle_visibility();
        g
    }

    /// Looking straight down -Y from above the point `(x, _, z)`.
    fn down_at(x: f32, z: f32) -> Ray {
        Ray::new(Vec3::new(x, 50.0, z), Vec3::NEG_Y)
    }

    #[test]
    fn attached_gizmo_hides_handles() {
        let g = TransformGizmo::attached();
        assert_eq!(g.shown(), [false, false, false]);
        assert_eq!(g.mode, GizmoMode::Translate);
        // Hidden handles cannot be picked.
        assert_eq!(g.pick(&down_at(5.0, 0.0), &Transform::IDENTITY, 10.0), None);
    }

    #[test]
    fn attach_hides_handles_again_and_keeps_mode() {
        let mut g = visible();
        g.set_mode(GizmoMode::Scale);
        g.begin_drag(&down_at(5.0, 0.0), &Transform::IDENTITY, 10.0).unwrap();

        assert_eq!(g.attach(), Some(false));
        assert_eq!(g.shown(), [false, false, false]);
        assert_eq!(g.mode, GizmoMode::Scale);
        assert!(!g.is_dragging());
        assert_eq!(g.active_axis(), None);

        // Nothing to cancel the second time.
        assert_eq!(g.attach(), None);
    }

    #[test]
    fn toggle_follows_x_flag() {
        let mut g = TransformGizmo::attached();
        assert!(g.toggle_visibility());
        assert_eq!(g.shown(), [true, true, true]);

        g.show_y = false;
        assert!(!g.toggle_visibility());
        assert_eq!(g.shown(), [false, false, false]);

        // X decides even when the other flags disagree.
        g.show_z = true;
        assert!(g.toggle_visibility());
        assert_eq!(g.shown(), [true, true, true]);
    }

    #[test]
    fn mode_is_locked_while_dragging() {
        let mut g = visible();
        g.set_mode(GizmoMode::Scale);
        assert_eq!(g.mode, GizmoMode::Scale);

        assert_eq!(g.begin_drag(&down_at(5.0, 0.0), &Transform::IDENTITY, 10.0), Some(true));
        g.set_mode(GizmoMode::Rotate);
        assert_eq!(g.mode, GizmoMode::Scale);

        assert_eq!(g.end_drag(), Some(false));
        assert_eq!(g.end_drag(), None);
        g.set_mode(GizmoMode::Rotate);
        assert_eq!(g.mode, GizmoMode::Rotate);
    }

    #[test]
    fn picks_the_axis_under_the_pointer() {
        let g = visible();
        let t = Transform::IDENTITY;
        assert_eq!(g.pick(&down_at(6.0, 0.0), &t, 10.0), Some(0));
        assert_eq!(g.pick(&down_at(0.0, 6.0), &t, 10.0), Some(2));
        assert_eq!(g.pick(&down_at(6.0, 6.0), &t, 10.0), None);
        // Past the end of the handle.
        assert_eq!(g.pick(&down_at(14.0, 0.0), &t, 10.0), None);
    }

    #[test]
    fn translate_moves_along_world_axis_only() {
        let mut g = visible();
        let mut t = Transform::IDENTITY;
        t.position = Vec3::new(1.0, 0.0, 0.0);

        g.begin_drag(&down_at(6.0, 0.0), &t, 10.0).unwrap();
        let moved = g.drag_to(&down_at(9.0, 4.0)).unwrap();
        assert!(moved.position.distance(Vec3::new(4.0, 0.0, 0.0)) < 1e-4);
        assert_eq!(moved.rotation, t.rotation);
        assert_eq!(moved.scale, t.scale);
    }

    #[test]
    fn rotate_sweeps_signed_angle_around_world_axis() {
        let mut g = visible();
        g.set_mode(GizmoMode::Rotate);
        let t = Transform::IDENTITY;

        // Ring around Y lies in the XZ plane at radius 10.
        assert_eq!(g.begin_drag(&down_at(10.0, 0.0), &t, 10.0), Some(true));
        let rotated = g.drag_to(&down_at(0.0, -10.0)).unwrap();
        // +X to -Z is a positive quarter turn around +Y.
        let expected = Quat::from_rotation_y(FRAC_PI_2);
        assert!(rotated.rotation.angle_between(expected) < 1e-4);
        assert_eq!(rotated.position, t.position);
    }

    #[test]
    fn scale_uses_distance_ratio_on_local_axis() {
        let mut g = visible();
        g.set_mode(GizmoMode::Scale);
        let mut t = Transform::IDENTITY;
        t.scale = Vec3::new(2.0, 1.0, 1.0);

        g.begin_drag(&down_at(5.0, 0.0), &t, 10.0).unwrap();
        let scaled = g.drag_to(&down_at(7.5, 0.0)).unwrap();
        assert!((scaled.scale.x - 3.0).abs() < 1e-4);
        assert_eq!(scaled.scale.y, 1.0);

        // Crossing the origin does not flip or zero the scale.
        let collapsed = g.drag_to(&down_at(-5.0, 0.0)).unwrap();
        assert!(collapsed.scale.x > 0.0);
    }

    #[test]
    fn lines_cover_only_visible_axes() {
        let mut g = TransformGizmo::attached();
        assert!(g.lines(&Transform::IDENTITY, 1.0).is_empty());

        g.toggle_visibility();
        g.show_y = false;
        g.show_z = false;
        let translate = g.lines(&Transform::IDENTITY, 1.0);
        assert_eq!(translate.len(), 2 * 5);
        assert_eq!(translate[0].color, AXIS_COLORS[0]);

        g.set_mode(GizmoMode::Rotate);
        assert_eq!(g.lines(&Transform::IDENTITY, 1.0).len(), 2 * RING_SEGMENTS);
    }

    #[test]
    fn handle_length_grows_with_distance() {
        let near = handle_length(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, 50.0);
        let far = handle_length(Vec3::new(0.0, 0.0, 20.0), Vec3::ZERO, 50.0);
        assert!((far / near - 2.0).abs() < 1e-4);
    }
}
