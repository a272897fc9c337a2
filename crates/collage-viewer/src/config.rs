use clap::Parser;
use collage::readout::DEFAULT_REPORT_EVERY;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// `collage_viewer` - places a CAD model inside a Gaussian-splat capture.
///
/// The scene is described by a JSON descriptor naming the model and the splat
/// source together with their rotations, positions and scales.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Scene descriptor to open.
    ///
    /// When omitted, the first `*.json` file under the models directory (in
    /// path order) is used.
    #[arg(long, env = "COLLAGE_SCENE")]
    pub scene: Option<PathBuf>,

    /// Directory holding `<name>.obj`, `<name>.mtl` and splat captures.
    #[arg(long, env = "COLLAGE_MODELS_DIR", default_value = "models")]
    pub models_dir: PathBuf,

    /// Refresh the transform readout every N frames (0 disables it).
    #[arg(long, default_value_t = DEFAULT_REPORT_EVERY)]
    pub report_every: u64,

    /// Upper bound on the device pixel ratio used for the render surface.
    #[arg(long, default_value_t = 2.0)]
    pub max_pixel_ratio: f64,

    /// Initial window width in logical pixels.
    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    /// Initial window height in logical pixels.
    #[arg(long, default_value_t = 720)]
    pub height: u32,
}

impl Config {
    /// The descriptor to load: `--scene`, or the first one found on disk.
    pub fn scene_path(&self) -> Option<PathBuf> {
        self.scene
            .clone()
            .or_else(|| discover_descriptors(&self.models_dir).into_iter().next())
    }
}

/// All `*.json` files below `root`, sorted by path.
pub fn discover_descriptors(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<_> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })
        .map(|e| e.path().to_path_buf())
        .collect();

    paths.sort();
    paths
}
