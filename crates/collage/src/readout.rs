//! Transform readout shown next to the gizmo.

use crate::transform::{model_angles, Transform};
use glam::Vec3;

pub const AXIS_TAGS: [&str; 3] = ["X", "Y", "Z"];

/// Frames between two readout refreshes.
pub const DEFAULT_REPORT_EVERY: u64 = 50;

/// A snapshot of a model's placement, as displayed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Readout {
    /// Euler XYZ angles in radians.
    pub rotation: Vec3,
    pub position: Vec3,
    pub scale: Vec3,
}

impl Readout {
    pub fn from_transform(t: &Transform) -> Self {
        Self {
            rotation: model_angles(t),
            position: t.position,
            scale: t.scale,
        }
    }

    pub fn rotation_lines(&self) -> [String; 3] {
        lines(self.rotation)
    }

    pub fn position_lines(&self) -> [String; 3] {
        lines(self.position)
    }

    pub fn scale_lines(&self) -> [String; 3] {
        lines(self.scale)
    }
}

/// `"<tag>: <value>"` with two decimals.
pub fn format_value(tag: &str, value: f32) -> String {
    // Negative zero prints as "-0.00".
    let value = if value == 0.0 { 0.0 } else { value };
    format!("{tag}: {value:.2}")
}

fn lines(v: Vec3) -> [String; 3] {
    [
        format_value(AXIS_TAGS[0], v.x),
        format_value(AXIS_TAGS[1], v.y),
        format_value(AXIS_TAGS[2], v.z),
    ]
}

/// Decides on which frames the readout is refreshed.
///
/// Frames are numbered from 1; a frame reports when its number is a multiple
/// of `every`. An `every` of zero never reports.
#[derive(Debug, Clone)]
pub struct FrameReporter {
    every: u64,
    frame: u64,
}

impl FrameReporter {
    pub fn new(every: u64) -> Self {
        Self { every, frame: 1 }
    }

    /// Advances one frame; true if this frame should refresh the readout.
    pub fn tick(&mut self) -> bool {
        let due = self.every != 0 && self.frame % self.every == 0;
        self.frame = self.frame.wrapping_add(1);
        due
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}

impl Default for FrameReporter {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_EVERY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_two_decimals() {
        assert_eq!(format_value("X", 1.0), "X: 1.00");
        assert_eq!(format_value("Y", -0.006), "Y: -0.01");
        assert_eq!(format_value("Y", -0.0), "Y: 0.00");
        assert_eq!(format_value("Z", 123.456), "Z: 123.46");
    }

    #[test]
    fn readout_lines_follow_transform() {
        let mut t = Transform::IDENTITY;
        t.position = Vec3::new(1.5, -2.0, 0.25);
        t.scale = Vec3::new(2.0, 2.0, 2.0);
        t.rotate_z(0.5);

        let r = Readout::from_transform(&t);
        assert_eq!(r.position_lines(), ["X: 1.50", "Y: -2.00", "Z: 0.25"]);
        assert_eq!(r.scale_lines(), ["X: 2.00", "Y: 2.00", "Z: 2.00"]);
        assert_eq!(r.rotation_lines(), ["X: 0.00", "Y: 0.00", "Z: 0.50"]);
    }

    #[test]
    fn reporter_fires_every_nth_frame() {
        let mut reporter = FrameReporter::default();
        let fired: Vec<u64> = (1..=150).filter(|_| reporter.tick()).collect();
        assert_eq!(fired.len(), 3);
        assert_eq!(reporter.frame(), 151);
    }

    #[test]
    fn reporter_first_fires_on_frame_fifty() {
        let mut reporter = FrameReporter::new(50);
        for _ in 1..50 {
            assert!(!reporter.tick());
        }
        assert!(reporter.tick());
    }

    #[test]
    fn zero_interval_never_reports() {
        let mut reporter = FrameReporter::new(0);
        assert!((0..200).all(|_| !reporter.tick()));
    }
}
