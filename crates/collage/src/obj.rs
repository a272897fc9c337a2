//! Wavefront OBJ reader.
//!
//! Supports the subset CAD exports use: `v`, `vn`, `vt`, polygonal `f` faces
//! (fan-triangulated, with `v`, `v/vt`, `v//vn` and `v/vt/vn` corners and
//! negative relative indices), `o`/`g` groups, `usemtl` and `mtllib`.
//! Meshes are lit by ambient light only, so normal and texture indices are
//! validated but not kept.

use crate::error::{Error, Result};
use glam::Vec3;
use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

const FORMAT: &str = "OBJ";

/// Interleaved vertex as uploaded to the GPU.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
}

/// Triangles sharing one material.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjMesh {
    pub name: String,
    pub material: Option<String>,
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl ObjMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjModel {
    pub meshes: Vec<ObjMesh>,
    /// Material libraries named by `mtllib`, in file order.
    pub material_libs: Vec<String>,
}

impl ObjModel {
    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.vertices.len()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(ObjMesh::triangle_count).sum()
    }

    /// Axis-aligned bounds of all vertices, or `None` for an empty model.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        self.meshes
            .iter()
            .flat_map(|m| m.vertices.iter())
            .map(|v| Vec3::from(v.position))
            .fold(None, |acc, p| match acc {
                None => Some((p, p)),
                Some((lo, hi)) => Some((lo.min(p), hi.max(p))),
            })
    }
}

/// Accumulates one mesh while the file is scanned.
#[derive(Default)]
struct MeshBuilder {
    mesh: ObjMesh,
    /// Position index to mesh vertex index.
    lookup: HashMap<usize, u32>,
}

impl MeshBuilder {
    fn new(name: String, material: Option<String>) -> Self {
        Self {
            mesh: ObjMesh {
                name,
                material,
                ..ObjMesh::default()
            },
            ..Self::default()
        }
    }

    fn is_empty(&self) -> bool {
        self.mesh.indices.is_empty()
    }

    fn vertex(&mut self, position: usize, positions: &[Vec3]) -> u32 {
        let vertices = &mut self.mesh.vertices;
        *self.lookup.entry(position).or_insert_with(|| {
            vertices.push(MeshVertex {
                position: positions[position].to_array(),
            });
            vertices.len() as u32 - 1
        })
    }

    fn finish(self) -> ObjMesh {
        self.mesh
    }
}

fn parse_floats<'a>(
    parts: impl Iterator<Item = &'a str>,
    line: usize,
    want: usize,
) -> Result<Vec3> {
    let mut out = [0.0f32; 3];
    let mut parts = parts;

    for (i, slot) in out.iter_mut().enumerate().take(want) {
        let token = parts
            .next()
            .ok_or_else(|| Error::parse(FORMAT, line, format!("missing component {i}")))?;
        let value: f32 = token
            .parse()
            .map_err(|_| Error::parse(FORMAT, line, format!("bad number `{token}`")))?;
        if !value.is_finite() {
            return Err(Error::parse(FORMAT, line, "non-finite coordinate"));
        }
        *slot = value;
    }

    Ok(Vec3::from(out))
}

/// Resolves a 1-based (or negative, relative) OBJ index against `len` items.
fn resolve_index(token: &str, len: usize, line: usize, what: &str) -> Result<usize> {
    let raw: i64 = token
        .parse()
        .map_err(|_| Error::parse(FORMAT, line, format!("bad {what} index `{token}`")))?;

    let resolved = match raw {
        0 => None,
        r if r > 0 => Some(r as usize - 1),
        r => (len as i64 + r).try_into().ok(),
    };

    resolved
        .filter(|&i| i < len)
        .ok_or_else(|| Error::parse(FORMAT, line, format!("{what} index {raw} out of range")))
}

/// Resolves a face corner to its position index.
fn parse_corner(token: &str, positions: usize, normals: usize, line: usize) -> Result<usize> {
    let mut fields = token.split('/');

    let position = resolve_index(fields.next().unwrap_or(""), positions, line, "vertex")?;
    // Texture coordinates are not rendered.
    let _texcoord = fields.next();
    if let Some(n) = fields.next().filter(|n| !n.is_empty()) {
        resolve_index(n, normals, line, "normal")?;
    }

    Ok(position)
}

/// Parses OBJ text from any buffered reader.
pub fn parse_obj<R: BufRead>(reader: R) -> Result<ObjModel> {
    let mut positions: Vec<Vec3> = Vec::new();
    let mut normals = 0usize;
    let mut material_libs = Vec::new();
    let mut meshes = Vec::new();

    let mut group = String::from("default");
    let mut current = MeshBuilder::new(group.clone(), None);

    for (index, line_result) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line_result.map_err(|e| Error::parse(FORMAT, line_no, e.to_string()))?;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };

        match keyword {
            "v" => positions.push(parse_floats(parts, line_no, 3)?),
            "vn" => {
                parse_floats(parts, line_no, 3)?;
                normals += 1;
            }
            "vt" => {}
            "f" => {
                let corners = parts
                    .map(|t| parse_corner(t, positions.len(), normals, line_no))
                    .collect::<Result<Vec<_>>>()?;

                if corners.len() < 3 {
                    return Err(Error::parse(FORMAT, line_no, "face with fewer than 3 corners"));
                }

                let first = current.vertex(corners[0], &positions);
                for pair in corners[1..].windows(2) {
                    let b = current.vertex(pair[0], &positions);
                    let c = current.vertex(pair[1], &positions);
                    current.mesh.indices.extend_from_slice(&[first, b, c]);
                }
            }
            "o" | "g" => {
                group = parts.collect::<Vec<_>>().join(" ");
                if group.is_empty() {
                    group = String::from("default");
                }
                let material = current.mesh.material.clone();
                let previous = std::mem::replace(&mut current, MeshBuilder::new(group.clone(), material));
                if !previous.is_empty() {
                    meshes.push(previous.finish());
                }
            }
            "usemtl" => {
                let material = parts.next().map(str::to_owned);
                if current.is_empty() {
                    current.mesh.material = material;
                } else {
                    let previous = std::mem::replace(&mut current, MeshBuilder::new(group.clone(), material));
                    meshes.push(previous.finish());
                }
            }
            "mtllib" => material_libs.extend(parts.map(str::to_owned)),
            // Smoothing groups, lines, points and free-form geometry.
            _ => {}
        }
    }

    if !current.is_empty() {
        meshes.push(current.finish());
    }

    log::debug!(
        "OBJ parsed: {} positions, {} normals, {} meshes",
        positions.len(),
        normals,
        meshes.len()
    );

    Ok(ObjModel {
        meshes,
        material_libs,
    })
}

pub fn parse_obj_str(text: &str) -> Result<ObjModel> {
    parse_obj(text.as_bytes())
}

pub fn read_obj<P: AsRef<Path>>(path: P) -> Result<ObjModel> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    parse_obj(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
# unit quad
mtllib part.mtl
o plate
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vn 0 0 1
usemtl steel
f 1//1 2//1 3//1 4//1
";

    #[test]
    fn quad_is_fan_triangulated() {
        let model = parse_obj_str(QUAD).unwrap();
        assert_eq!(model.material_libs, vec!["part.mtl"]);
        assert_eq!(model.meshes.len(), 1);

        let mesh = &model.meshes[0];
        assert_eq!(mesh.name, "plate");
        assert_eq!(mesh.material.as_deref(), Some("steel"));
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn negative_and_textured_indices_resolve() {
        let text = "\
v 0 0 0
v 2 0 0
v 0 2 0
vt 0 0
vt 1 0
vt 0 1
vn 0 0 1
f -3/1/-1 -2/2/-1 -1/3/-1
f 1/1 2/2 3/3
";
        let model = parse_obj_str(text).unwrap();
        let mesh = &model.meshes[0];
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.vertices[1].position, [2.0, 0.0, 0.0]);
        assert_eq!(model.bounds(), Some((Vec3::ZERO, Vec3::new(2.0, 2.0, 0.0))));
    }

    #[test]
    fn corners_sharing_a_position_share_a_vertex() {
        // Same positions with different normals still collapse to one vertex each.
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nvn 0 0 -1\nf 1//1 2//1 3//1\nf 1//2 3//2 2//2\n";
        let model = parse_obj_str(text).unwrap();
        let mesh = &model.meshes[0];
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 1]);
    }

    #[test]
    fn out_of_range_normal_index_is_rejected() {
        let err = parse_obj_str("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1//1 2//1 3//1\n").unwrap_err();
        assert!(err.to_string().contains("normal index"), "{err}");
    }

    #[test]
    fn usemtl_splits_meshes() {
        let text = "\
v 0 0 0
v 1 0 0
v 0 1 0
v 1 1 0
usemtl red
f 1 2 3
usemtl blue
f 2 4 3
";
        let model = parse_obj_str(text).unwrap();
        let materials: Vec<_> = model.meshes.iter().map(|m| m.material.as_deref()).collect();
        assert_eq!(materials, vec![Some("red"), Some("blue")]);
        assert_eq!(model.triangle_count(), 2);
        assert_eq!(model.vertex_count(), 6);
    }

    #[test]
    fn out_of_range_index_reports_line() {
        let err = parse_obj_str("v 0 0 0\nv 1 0 0\nf 1 2 7\n").unwrap_err();
        match err {
            Error::Parse { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn degenerate_face_and_bad_numbers_fail() {
        assert!(parse_obj_str("v 0 0 0\nv 1 0 0\nf 1 2\n").is_err());
        assert!(parse_obj_str("v 0 zero 0\n").is_err());
        assert!(parse_obj_str("v 0 0\n").is_err());
    }

    #[test]
    fn empty_input_has_no_meshes() {
        let model = parse_obj_str("# nothing here\n").unwrap();
        assert!(model.meshes.is_empty());
        assert_eq!(model.bounds(), None);
    }
}
