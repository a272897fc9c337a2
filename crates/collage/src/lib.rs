//! Collage: scene descriptors and asset decoding for the collage viewer.
//!
//! - [`descriptor`]: the JSON record placing a CAD model and a splat capture.
//! - [`transform`]: object placement and Euler readout math.
//! - [`readout`]: formatted transform readouts and their refresh cadence.
//! - [`obj`] / [`mtl`]: Wavefront mesh and material readers.
//! - [`splat`]: Gaussian splat clouds (`.ply` and `.splat`).

mod bytes;
pub mod descriptor;
pub mod error;
pub mod mtl;
pub mod obj;
pub mod readout;
pub mod splat;
pub mod transform;

pub use descriptor::{CadPlacement, SceneDescriptor, SplatPlacement, Triple};
pub use error::{Error, Result};
pub use mtl::{Material, MaterialLibrary};
pub use obj::{MeshVertex, ObjMesh, ObjModel};
pub use readout::{FrameReporter, Readout};
pub use splat::{Gaussian, SplatCloud, SplatInstance};
pub use transform::Transform;
