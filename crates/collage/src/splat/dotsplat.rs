//! The `.splat` record format.
//!
//! A headerless array of 32-byte little-endian records:
//!
//! ```text
//!   00 : f32[3] position
//!   0C : f32[3] scale (linear)
//!   18 : u8[4]  rgba
//!   1C : u8[4]  rotation w, x, y, z, each encoded as q * 128 + 128
//! ```

use super::{Gaussian, SplatCloud};
use crate::{
    bytes::{array, le_f32, take},
    error::{Error, Result},
};
use glam::{Quat, Vec3};
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

pub const RECORD_SIZE: usize = 32;

const WHAT: &str = ".splat record";

fn decode_record(mut r: &[u8]) -> Result<Gaussian> {
    let position = Vec3::new(le_f32(&mut r, WHAT)?, le_f32(&mut r, WHAT)?, le_f32(&mut r, WHAT)?);
    let scale = Vec3::new(le_f32(&mut r, WHAT)?, le_f32(&mut r, WHAT)?, le_f32(&mut r, WHAT)?);
    let color = array::<4>(&mut r, WHAT)?;
    let q = take(&mut r, 4, WHAT)?;

    let unpack = |b: u8| (b as f32 - 128.0) / 128.0;
    let rotation = Quat::from_xyzw(unpack(q[1]), unpack(q[2]), unpack(q[3]), unpack(q[0]));
    let rotation = if rotation.length_squared() > f32::EPSILON {
        rotation.normalize()
    } else {
        Quat::IDENTITY
    };

    Ok(Gaussian {
        position,
        scale,
        rotation,
        color,
    })
}

/// Decodes a `.splat` buffer; its length must be a multiple of 32.
pub fn parse_splat(data: &[u8]) -> Result<SplatCloud> {
    if data.len() % RECORD_SIZE != 0 {
        return Err(Error::invalid(format!(
            ".splat size {} is not a multiple of {RECORD_SIZE}",
            data.len()
        )));
    }

    let gaussians = data
        .chunks_exact(RECORD_SIZE)
        .map(decode_record)
        .collect::<Result<Vec<_>>>()?;

    Ok(SplatCloud::new(gaussians))
}

fn encode_record(g: &Gaussian, out: &mut [u8; RECORD_SIZE]) {
    let pack = |v: f32| (v * 128.0 + 128.0).round().clamp(0.0, 255.0) as u8;
    let q = g.rotation.normalize();

    for (i, v) in g.position.to_array().into_iter().chain(g.scale.to_array()).enumerate() {
        out[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
    }
    out[24..28].copy_from_slice(&g.color);
    out[28..32].copy_from_slice(&[pack(q.w), pack(q.x), pack(q.y), pack(q.z)]);
}

pub fn write_splat<W: Write>(mut w: W, cloud: &SplatCloud) -> io::Result<()> {
    let mut record = [0u8; RECORD_SIZE];
    for g in &cloud.gaussians {
        encode_record(g, &mut record);
        w.write_all(&record)?;
    }
    w.flush()
}

pub fn write_splat_file<P: AsRef<Path>>(path: P, cloud: &SplatCloud) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    write_splat(BufWriter::new(file), cloud).map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_records_decode_to_the_same_cloud() {
        let cloud = SplatCloud::new(vec![
            Gaussian {
                position: Vec3::new(1.0, -2.0, 3.5),
                scale: Vec3::new(0.1, 0.2, 0.3),
                rotation: Quat::IDENTITY,
                color: [10, 20, 30, 255],
            },
            Gaussian {
                position: Vec3::ZERO,
                scale: Vec3::ONE,
                rotation: Quat::from_rotation_y(1.0),
                color: [200, 100, 50, 7],
            },
        ]);

        let mut buf = Vec::new();
        write_splat(&mut buf, &cloud).unwrap();
        assert_eq!(buf.len(), 2 * RECORD_SIZE);

        let decoded = parse_splat(&buf).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.gaussians[0].position, cloud.gaussians[0].position);
        assert_eq!(decoded.gaussians[0].scale, cloud.gaussians[0].scale);
        assert_eq!(decoded.gaussians[1].color, [200, 100, 50, 7]);
        // Quantised to 1/128 per component.
        let angle = decoded.gaussians[1]
            .rotation
            .angle_between(cloud.gaussians[1].rotation);
        assert!(angle < 0.05, "rotation drifted by {angle}");
    }

    #[test]
    fn identity_rotation_encoding() {
        // w = 1 packs to 255 (clamped from 256), xyz = 0 pack to 128.
        let mut record = [0u8; RECORD_SIZE];
        record[28..32].copy_from_slice(&[255, 128, 128, 128]);
        let g = parse_splat(&record).unwrap().gaussians[0];
        assert!(g.rotation.angle_between(Quat::IDENTITY) < 1e-2);
        assert_eq!(g.rotation.xyz(), Vec3::ZERO);
    }

    #[test]
    fn ragged_length_is_rejected() {
        assert!(parse_splat(&[0u8; 33]).is_err());
        assert!(parse_splat(&[]).unwrap().is_empty());
    }
}
