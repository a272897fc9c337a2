//! 3D Gaussian Splatting PLY reader.
//!
//! The `vertex` element must carry at least
//! `x y z scale_0 scale_1 scale_2 opacity rot_0 rot_1 rot_2 rot_3 f_dc_0 f_dc_1 f_dc_2`.
//! Higher-order SH coefficients (`f_rest_*`) and any other elements are
//! skipped. Scales are stored as logarithms, opacity as a logit and colour as
//! the SH DC term; `rot_0` is the quaternion's real part.

use super::{sigmoid, unit_to_u8, Gaussian, SplatCloud};
use crate::{
    bytes::take,
    error::{Error, Result},
};
use glam::{Quat, Vec3};
use rayon::prelude::*;

/// Zeroth-order spherical harmonic constant.
const SH_C0: f32 = 0.282_094_8;

const REQUIRED: [&str; 14] = [
    "x", "y", "z", "scale_0", "scale_1", "scale_2", "opacity", "rot_0", "rot_1", "rot_2", "rot_3",
    "f_dc_0", "f_dc_1", "f_dc_2",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl Scalar {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "char" | "int8" => Self::I8,
            "uchar" | "uint8" => Self::U8,
            "short" | "int16" => Self::I16,
            "ushort" | "uint16" => Self::U16,
            "int" | "int32" => Self::I32,
            "uint" | "uint32" => Self::U32,
            "float" | "float32" => Self::F32,
            "double" | "float64" => Self::F64,
            _ => return None,
        })
    }

    pub fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    /// Decodes one value from exactly `self.size()` bytes.
    fn decode(self, b: &[u8], big_endian: bool) -> f64 {
        macro_rules! num {
            ($t:ty) => {{
                let mut arr = [0u8; std::mem::size_of::<$t>()];
                arr.copy_from_slice(b);
                if big_endian {
                    <$t>::from_be_bytes(arr) as f64
                } else {
                    <$t>::from_le_bytes(arr) as f64
                }
            }};
        }

        match self {
            Self::I8 => b[0] as i8 as f64,
            Self::U8 => b[0] as f64,
            Self::I16 => num!(i16),
            Self::U16 => num!(u16),
            Self::I32 => num!(i32),
            Self::U32 => num!(u32),
            Self::F32 => num!(f32),
            Self::F64 => num!(f64),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    Scalar(Scalar),
    List { count: Scalar, item: Scalar },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub kind: PropertyKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub count: usize,
    pub properties: Vec<Property>,
}

impl Element {
    /// Byte size of one row if it has no list properties.
    fn fixed_stride(&self) -> Option<usize> {
        self.properties
            .iter()
            .map(|p| match p.kind {
                PropertyKind::Scalar(s) => Some(s.size()),
                PropertyKind::List { .. } => None,
            })
            .sum()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub encoding: Encoding,
    pub elements: Vec<Element>,
}

impl Header {
    pub fn vertex_count(&self) -> Option<usize> {
        self.elements
            .iter()
            .find(|e| e.name == "vertex")
            .map(|e| e.count)
    }
}

fn header_err(line: usize, message: impl Into<String>) -> Error {
    Error::parse("PLY header", line, message)
}

/// Parses the header and returns it with the offset of the body.
pub fn parse_header(data: &[u8]) -> Result<(Header, usize)> {
    let mut offset = 0usize;
    let mut encoding = None;
    let mut elements: Vec<Element> = Vec::new();
    let mut line_no = 0usize;

    loop {
        line_no += 1;
        let rest = &data[offset..];
        let end = rest
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| header_err(line_no, "missing end_header"))?;
        let line = std::str::from_utf8(&rest[..end])
            .map_err(|_| header_err(line_no, "header is not UTF-8"))?
            .trim();
        offset += end + 1;

        if line_no == 1 {
            if line != "ply" {
                return Err(header_err(1, "missing `ply` magic"));
            }
            continue;
        }

        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("format") => {
                encoding = Some(match parts.next() {
                    Some("ascii") => Encoding::Ascii,
                    Some("binary_little_endian") => Encoding::BinaryLittleEndian,
                    Some("binary_big_endian") => Encoding::BinaryBigEndian,
                    other => {
                        return Err(header_err(line_no, format!("unknown format {other:?}")))
                    }
                });
            }
            Some("element") => {
                let name = parts
                    .next()
                    .ok_or_else(|| header_err(line_no, "element without name"))?;
                let count = parts
                    .next()
                    .and_then(|c| c.parse().ok())
                    .ok_or_else(|| header_err(line_no, "element without count"))?;
                elements.push(Element {
                    name: name.to_owned(),
                    count,
                    properties: Vec::new(),
                });
            }
            Some("property") => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| header_err(line_no, "property before element"))?;
                let scalar = |name: Option<&str>| {
                    name.and_then(Scalar::from_name)
                        .ok_or_else(|| header_err(line_no, format!("bad property type {name:?}")))
                };

                let kind = match parts.next() {
                    Some("list") => PropertyKind::List {
                        count: scalar(parts.next())?,
                        item: scalar(parts.next())?,
                    },
                    ty => PropertyKind::Scalar(scalar(ty)?),
                };
                let name = parts
                    .next()
                    .ok_or_else(|| header_err(line_no, "property without name"))?;
                element.properties.push(Property {
                    name: name.to_owned(),
                    kind,
                });
            }
            Some("end_header") => break,
            // comment, obj_info and blank lines
            _ => {}
        }
    }

    let encoding = encoding.ok_or_else(|| header_err(line_no, "missing format line"))?;
    Ok((Header { encoding, elements }, offset))
}

/// Row decoder over the body, shared by all encodings.
struct Body<'a> {
    encoding: Encoding,
    data: &'a [u8],
    /// Remaining ASCII lines.
    lines: std::str::Lines<'a>,
}

impl<'a> Body<'a> {
    fn new(encoding: Encoding, data: &'a [u8]) -> Result<Self> {
        let text = if encoding == Encoding::Ascii {
            std::str::from_utf8(data).map_err(|_| Error::invalid("ASCII PLY body is not UTF-8"))?
        } else {
            ""
        };
        Ok(Self {
            encoding,
            data,
            lines: text.lines(),
        })
    }

    /// Reads one row; scalar values go to `out` in property order, lists are skipped.
    fn row(&mut self, element: &Element, out: &mut Vec<f32>) -> Result<()> {
        out.clear();

        if self.encoding == Encoding::Ascii {
            let line = self
                .lines
                .next()
                .ok_or_else(|| Error::invalid(format!("truncated `{}` element", element.name)))?;
            let mut tokens = line.split_whitespace();
            let mut next = || -> Result<f64> {
                tokens
                    .next()
                    .and_then(|t| t.parse::<f64>().ok())
                    .ok_or_else(|| Error::invalid(format!("bad `{}` row `{line}`", element.name)))
            };

            for property in &element.properties {
                match property.kind {
                    PropertyKind::Scalar(_) => out.push(next()? as f32),
                    PropertyKind::List { .. } => {
                        let n = next()? as usize;
                        for _ in 0..n {
                            next()?;
                        }
                    }
                }
            }
            return Ok(());
        }

        let big = self.encoding == Encoding::BinaryBigEndian;
        for property in &element.properties {
            match property.kind {
                PropertyKind::Scalar(s) => {
                    let b = take(&mut self.data, s.size(), "PLY body")?;
                    out.push(s.decode(b, big) as f32);
                }
                PropertyKind::List { count, item } => {
                    let b = take(&mut self.data, count.size(), "PLY body")?;
                    let n = count.decode(b, big) as usize;
                    let len = n
                        .checked_mul(item.size())
                        .ok_or_else(|| Error::invalid("PLY list length overflows"))?;
                    take(&mut self.data, len, "PLY body")?;
                }
            }
        }
        Ok(())
    }
}

/// Column positions of the required properties within a vertex row.
struct Columns([usize; 14]);

impl Columns {
    fn find(vertex: &Element) -> Result<Self> {
        let mut cols = [0usize; 14];
        for (slot, name) in cols.iter_mut().zip(REQUIRED) {
            *slot = vertex.index_of(name).ok_or_else(|| {
                Error::invalid(format!("splat PLY is missing vertex property `{name}`"))
            })?;
            if !matches!(vertex.properties[*slot].kind, PropertyKind::Scalar(_)) {
                return Err(Error::invalid(format!("vertex property `{name}` is a list")));
            }
        }
        Ok(Self(cols))
    }

    /// Builds a gaussian from a row holding scalar values only.
    fn gaussian(&self, row: &[f32]) -> Gaussian {
        let v = |i: usize| row[self.0[i]];

        let rotation = Quat::from_xyzw(v(8), v(9), v(10), v(7));
        let rotation = if rotation.length_squared() > f32::EPSILON {
            rotation.normalize()
        } else {
            Quat::IDENTITY
        };

        Gaussian {
            position: Vec3::new(v(0), v(1), v(2)),
            scale: Vec3::new(v(3).exp(), v(4).exp(), v(5).exp()),
            rotation,
            color: [
                unit_to_u8(0.5 + SH_C0 * v(11)),
                unit_to_u8(0.5 + SH_C0 * v(12)),
                unit_to_u8(0.5 + SH_C0 * v(13)),
                unit_to_u8(sigmoid(v(6))),
            ],
        }
    }
}

/// Maps a row index (including list columns) to the index in a scalar-only row.
fn scalar_positions(element: &Element) -> Vec<Option<usize>> {
    let mut next = 0usize;
    element
        .properties
        .iter()
        .map(|p| match p.kind {
            PropertyKind::Scalar(_) => {
                next += 1;
                Some(next - 1)
            }
            PropertyKind::List { .. } => None,
        })
        .collect()
}

/// Decodes a splat PLY held in memory.
pub fn parse_ply(data: &[u8]) -> Result<SplatCloud> {
    let (header, body_start) = parse_header(data)?;
    let mut body = Body::new(header.encoding, &data[body_start..])?;
    let mut row = Vec::new();

    for element in &header.elements {
        if element.name != "vertex" {
            for _ in 0..element.count {
                body.row(element, &mut row)?;
            }
            continue;
        }

        let mut columns = Columns::find(element)?;
        // Rows only hold scalars, so list columns shift the later positions.
        let positions = scalar_positions(element);
        for c in columns.0.iter_mut() {
            *c = positions[*c].unwrap_or(*c);
        }

        // Fast path: fixed-stride binary rows decode in parallel.
        if let (Encoding::BinaryLittleEndian | Encoding::BinaryBigEndian, Some(stride)) =
            (header.encoding, element.fixed_stride())
        {
            let big = header.encoding == Encoding::BinaryBigEndian;
            let total = stride
                .checked_mul(element.count)
                .ok_or_else(|| Error::invalid("PLY vertex block overflows"))?;
            let block = take(&mut body.data, total, "PLY vertex block")?;
            let scalars: Vec<Scalar> = element
                .properties
                .iter()
                .filter_map(|p| match p.kind {
                    PropertyKind::Scalar(s) => Some(s),
                    PropertyKind::List { .. } => None,
                })
                .collect();

            let gaussians = block
                .par_chunks_exact(stride.max(1))
                .map(|chunk| {
                    let mut values = Vec::with_capacity(scalars.len());
                    let mut at = 0usize;
                    for s in &scalars {
                        values.push(s.decode(&chunk[at..at + s.size()], big) as f32);
                        at += s.size();
                    }
                    columns.gaussian(&values)
                })
                .collect::<Vec<_>>();

            log::debug!("PLY: decoded {} gaussians (binary)", gaussians.len());
            return Ok(SplatCloud::new(gaussians));
        }

        // Every row takes at least one byte, so the body bounds the header's count.
        let mut gaussians = Vec::with_capacity(element.count.min(body.data.len()));
        for _ in 0..element.count {
            body.row(element, &mut row)?;
            gaussians.push(columns.gaussian(&row));
        }

        log::debug!("PLY: decoded {} gaussians", gaussians.len());
        return Ok(SplatCloud::new(gaussians));
    }

    Err(Error::invalid("PLY file has no vertex element"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(format: &str, count: usize, extra: &str) -> String {
        let mut h = format!("ply\nformat {format} 1.0\ncomment test\nelement vertex {count}\n");
        for name in REQUIRED {
            h.push_str(&format!("property float {name}\n"));
        }
        h.push_str(extra);
        h.push_str("end_header\n");
        h
    }

    /// x y z, log scales, opacity logit, rot wxyz, f_dc.
    fn row(pos: [f32; 3]) -> [f32; 14] {
        [
            pos[0], pos[1], pos[2], 0.0, 1.0f32.ln(), 2.0f32.ln(), 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            0.0,
        ]
    }

    #[test]
    fn reads_binary_little_endian() {
        let mut data = header("binary_little_endian", 2, "").into_bytes();
        for pos in [[1.0, 2.0, 3.0], [-4.0, 5.5, 0.0]] {
            for v in row(pos) {
                data.extend_from_slice(&v.to_le_bytes());
            }
        }

        let cloud = parse_ply(&data).unwrap();
        assert_eq!(cloud.len(), 2);

        let g = cloud.gaussians[1];
        assert_eq!(g.position, Vec3::new(-4.0, 5.5, 0.0));
        assert!((g.scale - Vec3::new(1.0, 1.0, 2.0)).length() < 1e-5);
        assert_eq!(g.rotation, Quat::IDENTITY);
        // f_dc = 0 -> mid grey; logit 0 -> half opacity.
        assert_eq!(g.color, [128, 128, 128, 128]);
    }

    #[test]
    fn reads_binary_big_endian() {
        let mut data = header("binary_big_endian", 1, "").into_bytes();
        for v in row([1.5, -2.0, 3.25]) {
            data.extend_from_slice(&v.to_be_bytes());
        }

        let cloud = parse_ply(&data).unwrap();
        assert_eq!(cloud.len(), 1);
        let g = cloud.gaussians[0];
        assert_eq!(g.position, Vec3::new(1.5, -2.0, 3.25));
        assert!((g.scale - Vec3::new(1.0, 1.0, 2.0)).length() < 1e-5);
        assert_eq!(g.color, [128, 128, 128, 128]);
    }

    #[test]
    fn oversized_vertex_count_is_an_error() {
        let mut text = header("ascii", 1_000_000_000_000_000_000, "");
        let values: Vec<String> = row([0.0, 0.0, 0.0]).iter().map(|v| v.to_string()).collect();
        text.push_str(&values.join(" "));
        text.push('\n');

        let err = parse_ply(text.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("truncated"), "{err}");
    }

    #[test]
    fn oversized_binary_list_is_an_error() {
        let mut data = header("binary_little_endian", 1, "property list uint uint extra\n").into_bytes();
        for v in row([0.0, 0.0, 0.0]) {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(parse_ply(&data).is_err());
    }

    #[test]
    fn reads_ascii_and_skips_other_elements() {
        let mut text = String::from("ply\nformat ascii 1.0\nelement camera 1\nproperty float fov\n");
        text.push_str(&header("ascii", 1, "property list uchar int extra\n")["ply\nformat ascii 1.0\n".len()..]);
        text.push_str("0.8\n");
        let values: Vec<String> = row([7.0, 8.0, 9.0]).iter().map(|v| v.to_string()).collect();
        text.push_str(&values.join(" "));
        text.push_str(" 2 10 11\n");

        let cloud = parse_ply(text.as_bytes()).unwrap();
        assert_eq!(cloud.len(), 1);
        assert_eq!(cloud.gaussians[0].position, Vec3::new(7.0, 8.0, 9.0));
    }

    #[test]
    fn header_reports_vertex_count() {
        let data = header("binary_little_endian", 42, "");
        let (h, offset) = parse_header(data.as_bytes()).unwrap();
        assert_eq!(h.vertex_count(), Some(42));
        assert_eq!(h.encoding, Encoding::BinaryLittleEndian);
        assert_eq!(offset, data.len());
    }

    #[test]
    fn missing_property_is_rejected() {
        let text = "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nend_header\n1\n";
        let err = parse_ply(text.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("`y`"), "{err}");
    }

    #[test]
    fn truncated_body_is_rejected() {
        let mut data = header("binary_little_endian", 3, "").into_bytes();
        data.extend_from_slice(&[0u8; 20]);
        assert!(parse_ply(&data).is_err());
    }

    #[test]
    fn bad_magic_is_rejected() {
        assert!(parse_header(b"plx\nformat ascii 1.0\nend_header\n").is_err());
        assert!(parse_header(b"ply\nend_header\n").is_err());
    }
}
