//! CPU-side scene: the light, the splat node and the model node.

use crate::loader::LoadEvent;
use collage::{Material, MaterialLibrary, ObjModel, SplatCloud, Transform};

pub const AMBIENT_COLOR: u32 = 0xffffff;
pub const AMBIENT_INTENSITY: f32 = 4.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    /// Linear RGB.
    pub color: [f32; 3],
    pub intensity: f32,
}

impl AmbientLight {
    pub fn from_hex(hex: u32, intensity: f32) -> Self {
        let channel = |shift: u32| ((hex >> shift) & 0xff) as f32 / 255.0;
        Self {
            color: [channel(16), channel(8), channel(0)],
            intensity,
        }
    }

    pub fn irradiance(&self) -> [f32; 3] {
        self.color.map(|c| c * self.intensity)
    }
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self::from_hex(AMBIENT_COLOR, AMBIENT_INTENSITY)
    }
}

#[derive(Debug, Clone)]
pub struct SplatNode {
    pub transform: Transform,
    pub cloud: SplatCloud,
}

#[derive(Debug, Clone)]
pub struct ModelNode {
    pub transform: Transform,
    pub model: ObjModel,
    /// Resolved material of each mesh, in mesh order.
    pub materials: Vec<Material>,
}

/// What the renderer has to upload after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Nothing,
    Splat,
    Model,
}

#[derive(Debug, Default)]
pub struct Scene {
    pub ambient: AmbientLight,
    pub name: Option<String>,
    pub splat: Option<SplatNode>,
    pub model: Option<ModelNode>,
    pub errors: Vec<String>,
    pub finished: bool,
    splat_placement: Transform,
    cad_placement: Transform,
    materials: MaterialLibrary,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: LoadEvent) -> Change {
        match event {
            LoadEvent::Descriptor(d) => {
                self.splat_placement = d.splat_transform();
                self.cad_placement = d.cad_transform();
                self.name = Some(d.name);
                Change::Nothing
            }
            LoadEvent::Splat(cloud) => {
                self.splat = Some(SplatNode {
                    transform: self.splat_placement,
                    cloud,
                });
                Change::Splat
            }
            LoadEvent::Materials(mut lib) => {
                lib.force_opaque();
                self.materials = lib;
                Change::Nothing
            }
            LoadEvent::Model(model) => {
                let materials = model
                    .meshes
                    .iter()
                    .map(|mesh| {
                        let mut m = self.materials.resolve(mesh.material.as_deref());
                        m.transparent = false;
                        m
                    })
                    .collect();
                self.model = Some(ModelNode {
                    transform: self.cad_placement,
                    model,
                    materials,
                });
                Change::Model
            }
            LoadEvent::Failed { asset, error } => {
                self.errors.push(format!("{asset}: {error}"));
                Change::Nothing
            }
            LoadEvent::Finished => {
                self.finished = true;
                Change::Nothing
            }
        }
    }

    /// The object the gizmo is attached to and the readout reports on.
    pub fn model_transform(&self) -> Option<&Transform> {
        self.model.as_ref().map(|m| &m.transform)
    }

    pub fn set_model_transform(&mut self, transform: Transform) {
        if let Some(model) = &mut self.model {
            model.transform = transform;
        }
    }

    /// One line per loaded asset, for the HUD.
    pub fn status_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(name) = &self.name {
            lines.push(format!("scene: {name}"));
        }
        if let Some(splat) = &self.splat {
            lines.push(format!("splat: {} gaussians", splat.cloud.len()));
        }
        if let Some(model) = &self.model {
            lines.push(format!(
                "model: {} meshes, {} triangles",
                model.model.meshes.len(),
                model.model.triangle_count()
            ));
        }
        if !self.finished {
            lines.push("loading...".to_owned());
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Asset;
    use collage::{mtl::parse_mtl_str, obj::parse_obj_str, SceneDescriptor};
    use glam::Vec3;

    fn descriptor() -> SceneDescriptor {
        SceneDescriptor::from_json_str(
            r#"{
                "name": "part",
                "splat": { "url": "room.ply", "scale": { "x": 2, "y": 2, "z": 2 } },
                "cad": { "position": { "x": 1, "y": 2, "z": 3 } }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn ambient_light_defaults() {
        let light = AmbientLight::default();
        assert_eq!(light.color, [1.0, 1.0, 1.0]);
        assert_eq!(light.intensity, 4.1);
        assert_eq!(AmbientLight::from_hex(0xff8000, 1.0).color[1], 128.0 / 255.0);
    }

    #[test]
    fn nodes_take_descriptor_placement() {
        let mut scene = Scene::new();
        assert_eq!(scene.apply(LoadEvent::Descriptor(descriptor())), Change::Nothing);
        assert_eq!(scene.apply(LoadEvent::Splat(SplatCloud::default())), Change::Splat);
        assert_eq!(
            scene.splat.as_ref().unwrap().transform.scale,
            Vec3::splat(2.0)
        );

        let model = parse_obj_str("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        assert_eq!(scene.apply(LoadEvent::Model(model)), Change::Model);
        assert_eq!(
            scene.model_transform().unwrap().position,
            Vec3::new(1.0, 2.0, 3.0)
        );
    }

    #[test]
    fn materials_are_forced_opaque() {
        let mut scene = Scene::new();
        let lib = parse_mtl_str("newmtl glass\nKd 0.2 0.4 0.6\nd 0.25\n").unwrap();
        scene.apply(LoadEvent::Materials(lib));

        let model = parse_obj_str("v 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl glass\nf 1 2 3\n").unwrap();
        scene.apply(LoadEvent::Model(model));

        let material = &scene.model.as_ref().unwrap().materials[0];
        assert_eq!(material.name, "glass");
        assert!(!material.transparent);
        assert_eq!(material.diffuse_rgba()[3], 1.0);
    }

    #[test]
    fn readout_target_is_the_model() {
        let mut scene = Scene::new();
        assert!(scene.model_transform().is_none());
        scene.set_model_transform(Transform::IDENTITY);
        assert!(scene.model_transform().is_none());

        scene.apply(LoadEvent::Model(ObjModel::default()));
        let mut moved = Transform::IDENTITY;
        moved.position = Vec3::X;
        scene.set_model_transform(moved);
        assert_eq!(scene.model_transform().unwrap().position, Vec3::X);
    }

    #[test]
    fn failures_and_completion_show_in_status() {
        let mut scene = Scene::new();
        scene.apply(LoadEvent::Failed {
            asset: Asset::Splat,
            error: "not found".into(),
        });
        assert_eq!(scene.errors, vec!["splat: not found".to_owned()]);
        assert_eq!(scene.status_lines(), vec!["loading...".to_owned()]);

        scene.apply(LoadEvent::Finished);
        assert!(scene.status_lines().is_empty());
    }
}
