//! Collage viewer: a CAD model placed inside a Gaussian-splat capture.
//!
//! The viewer loads a scene descriptor, decodes the splat capture and the
//! OBJ/MTL model on a background thread, and renders both with `wgpu`. An
//! orbit camera and a transform gizmo drive the view and the model, and an
//! egui overlay shows the model's transform.

pub mod app;
pub mod camera;
pub mod config;
pub mod gizmo;
pub mod input;
pub mod loader;
pub mod renderer;
pub mod scene;
pub mod ui;
