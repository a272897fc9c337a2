pub mod gizmo;
pub mod mesh;
pub mod splat;
