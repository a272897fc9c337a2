//! JSON scene descriptors.
//!
//! A descriptor names the CAD model (`<name>.obj` / `<name>.mtl`), the splat
//! source and the placement of both objects:
//!
//! ```json
//! {
//!   "name": "onco_low",
//!   "splat": { "url": "onco.ply", "rotation": { "x": 0, "y": 0, "z": 3.14 },
//!              "scale": { "x": 100, "y": 100, "z": 100 } },
//!   "cad":   { "rotation": { "x": -1.57, "y": 0, "z": 0 },
//!              "position": { "x": 0, "y": 12, "z": 0 },
//!              "scale": { "x": 1, "y": 1, "z": 1 } }
//! }
//! ```
//!
//! Rotations are radians. Missing rotations and positions are zero, missing
//! scales are one.

use crate::{
    error::{Error, Result},
    transform::Transform,
};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Triple {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Triple {
    pub const ONE: Self = Self {
        x: 1.0,
        y: 1.0,
        z: 1.0,
    };

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Name of the first non-finite component, if any.
    fn first_non_finite(&self) -> Option<&'static str> {
        [("x", self.x), ("y", self.y), ("z", self.z)]
            .into_iter()
            .find(|(_, v)| !v.is_finite())
            .map(|(axis, _)| axis)
    }
}

impl From<Triple> for Vec3 {
    fn from(t: Triple) -> Self {
        Vec3::new(t.x, t.y, t.z)
    }
}

impl From<Vec3> for Triple {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

fn unit_scale() -> Triple {
    Triple::ONE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplatPlacement {
    pub url: String,
    #[serde(default)]
    pub rotation: Triple,
    #[serde(default = "unit_scale")]
    pub scale: Triple,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CadPlacement {
    #[serde(default)]
    pub rotation: Triple,
    #[serde(default)]
    pub position: Triple,
    #[serde(default = "unit_scale")]
    pub scale: Triple,
}

impl Default for CadPlacement {
    fn default() -> Self {
        Self {
            rotation: Triple::default(),
            position: Triple::default(),
            scale: Triple::ONE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescriptor {
    pub name: String,
    pub splat: SplatPlacement,
    #[serde(default)]
    pub cad: CadPlacement,
}

impl SceneDescriptor {
    /// Reads and validates a descriptor file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let descriptor: Self = serde_json::from_str(text)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Checks that `name` is usable as a file stem and every number is finite.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid("descriptor `name` is empty"));
        }

        if self.name.contains(['/', '\\']) {
            return Err(Error::invalid(format!(
                "descriptor `name` must be a bare file stem, got `{}`",
                self.name
            )));
        }

        let fields = [
            ("splat.rotation", &self.splat.rotation),
            ("splat.scale", &self.splat.scale),
            ("cad.rotation", &self.cad.rotation),
            ("cad.position", &self.cad.position),
            ("cad.scale", &self.cad.scale),
        ];

        for (prefix, triple) in fields {
            if let Some(axis) = triple.first_non_finite() {
                return Err(Error::NonFinite(format!("{prefix}.{axis}")));
            }
        }

        Ok(())
    }

    /// Placement of the splat: rotated about X, then Y, then Z, then scaled.
    pub fn splat_transform(&self) -> Transform {
        let r = self.splat.rotation;
        let mut t = Transform::IDENTITY;
        t.rotate_x(r.x);
        t.rotate_y(r.y);
        t.rotate_z(r.z);
        t.scale = self.splat.scale.into();
        t
    }

    /// Placement of the CAD model: axis rotations, then position, then scale.
    pub fn cad_transform(&self) -> Transform {
        let r = self.cad.rotation;
        let mut t = Transform::IDENTITY;
        t.rotate_on_axis(Vec3::X, r.x);
        t.rotate_on_axis(Vec3::Y, r.y);
        t.rotate_on_axis(Vec3::Z, r.z);
        t.position = self.cad.position.into();
        t.scale = self.cad.scale.into();
        t
    }

    pub fn obj_file_name(&self) -> String {
        format!("{}.obj", self.name)
    }

    pub fn mtl_file_name(&self) -> String {
        format!("{}.mtl", self.name)
    }
}
