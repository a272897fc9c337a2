//! Wavefront MTL material libraries.

use crate::error::{Error, Result};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

const FORMAT: &str = "MTL";

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// `Kd`, linear RGB.
    pub diffuse: [f32; 3],
    /// `Ka`.
    pub ambient: [f32; 3],
    /// `Ks`.
    pub specular: [f32; 3],
    /// `Ns`.
    pub shininess: f32,
    /// `d`, or `1 - Tr`.
    pub opacity: f32,
    /// Whether the material is blended rather than drawn opaque.
    pub transparent: bool,
    /// `map_Kd`, relative to the library file.
    pub diffuse_map: Option<String>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            diffuse: [1.0, 1.0, 1.0],
            ambient: [0.0, 0.0, 0.0],
            specular: [0.0, 0.0, 0.0],
            shininess: 30.0,
            opacity: 1.0,
            transparent: false,
            diffuse_map: None,
        }
    }

    /// Diffuse colour with opacity, as passed to shaders.
    pub fn diffuse_rgba(&self) -> [f32; 4] {
        let alpha = if self.transparent { self.opacity } else { 1.0 };
        [self.diffuse[0], self.diffuse[1], self.diffuse[2], alpha]
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new("default")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialLibrary {
    materials: BTreeMap<String, Material>,
}

impl MaterialLibrary {
    pub fn get(&self, name: &str) -> Option<&Material> {
        self.materials.get(name)
    }

    /// Looks up `name`, falling back to the default material.
    pub fn resolve(&self, name: Option<&str>) -> Material {
        name.and_then(|n| self.get(n))
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Material> {
        self.materials.values()
    }

    /// Draws every material opaque regardless of `d`/`Tr`.
    pub fn force_opaque(&mut self) {
        for material in self.materials.values_mut() {
            material.transparent = false;
        }
    }
}

fn parse_f32(token: Option<&str>, line: usize) -> Result<f32> {
    let token = token.ok_or_else(|| Error::parse(FORMAT, line, "missing value"))?;
    token
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::parse(FORMAT, line, format!("bad number `{token}`")))
}

fn parse_rgb<'a>(mut parts: impl Iterator<Item = &'a str>, line: usize) -> Result<[f32; 3]> {
    let r = parse_f32(parts.next(), line)?;
    // A single value means grey.
    let g = match parts.next() {
        Some(t) => parse_f32(Some(t), line)?,
        None => return Ok([r, r, r]),
    };
    let b = parse_f32(parts.next(), line)?;
    Ok([r, g, b])
}

pub fn parse_mtl<R: BufRead>(reader: R) -> Result<MaterialLibrary> {
    let mut materials = BTreeMap::new();
    let mut current: Option<Material> = None;

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

        if keyword == "newmtl" {
            if let Some(done) = current.take() {
                materials.insert(done.name.clone(), done);
            }
            let name = parts.collect::<Vec<_>>().join(" ");
            if name.is_empty() {
                return Err(Error::parse(FORMAT, line_no, "newmtl without a name"));
            }
            current = Some(Material::new(name));
            continue;
        }

        let Some(material) = current.as_mut() else {
            return Err(Error::parse(
                FORMAT,
                line_no,
                format!("`{keyword}` before any newmtl"),
            ));
        };

        match keyword {
            "Kd" => material.diffuse = parse_rgb(parts, line_no)?,
            "Ka" => material.ambient = parse_rgb(parts, line_no)?,
            "Ks" => material.specular = parse_rgb(parts, line_no)?,
            "Ns" => material.shininess = parse_f32(parts.next(), line_no)?,
            "d" => {
                material.opacity = parse_f32(parts.next(), line_no)?.clamp(0.0, 1.0);
                material.transparent = material.opacity < 1.0;
            }
            "Tr" => {
                material.opacity = (1.0 - parse_f32(parts.next(), line_no)?).clamp(0.0, 1.0);
                material.transparent = material.opacity < 1.0;
            }
            // Options such as `-s 1 1 1` precede the file name.
            "map_Kd" => material.diffuse_map = parts.last().map(str::to_owned),
            _ => {}
        }
    }

    if let Some(done) = current.take() {
        materials.insert(done.name.clone(), done);
    }

    Ok(MaterialLibrary { materials })
}

pub fn parse_mtl_str(text: &str) -> Result<MaterialLibrary> {
    parse_mtl(text.as_bytes())
}

pub fn read_mtl<P: AsRef<Path>>(path: P) -> Result<MaterialLibrary> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    parse_mtl(BufReader::new(file))
}
