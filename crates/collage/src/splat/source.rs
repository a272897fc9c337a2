//! Resolving a descriptor's `splat.url` to a local file.

use super::{dotsplat, ply, SplatCloud};
use crate::error::{Error, Result};
use std::{
    io,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplatFormat {
    Ply,
    Splat,
}

impl SplatFormat {
    pub const EXTENSIONS: [(&'static str, SplatFormat); 2] =
        [("ply", SplatFormat::Ply), ("splat", SplatFormat::Splat)];

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::EXTENSIONS
            .iter()
            .find(|(e, _)| ext.eq_ignore_ascii_case(e))
            .map(|&(_, f)| f)
    }

    /// Guesses the format from file contents.
    pub fn sniff(data: &[u8]) -> Self {
        if data.starts_with(b"ply\n") || data.starts_with(b"ply\r\n") {
            Self::Ply
        } else {
            Self::Splat
        }
    }

    pub fn decode(self, data: &[u8]) -> Result<SplatCloud> {
        match self {
            Self::Ply => ply::parse_ply(data),
            Self::Splat => dotsplat::parse_splat(data),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplatSource {
    pub path: PathBuf,
    pub format: SplatFormat,
}

impl SplatSource {
    /// Resolves `url` against `models_dir`.
    ///
    /// A value with a `.ply`/`.splat` extension names a file (relative paths
    /// are taken from `models_dir`). Anything else is a capture id looked up
    /// as `<id>.ply`, then `<id>.splat`. Remote URLs are not supported.
    pub fn resolve(url: &str, models_dir: &Path) -> Result<Self> {
        let url = url.trim();

        if url.is_empty() || url.contains("://") {
            return Err(Error::UnsupportedSource(url.to_owned()));
        }

        let given = Path::new(url);
        if let Some(format) = SplatFormat::from_path(given) {
            let path = if given.is_absolute() {
                given.to_path_buf()
            } else {
                models_dir.join(given)
            };
            return Ok(Self { path, format });
        }

        for (ext, format) in SplatFormat::EXTENSIONS {
            let path = models_dir.join(format!("{url}.{ext}"));
            if path.is_file() {
                return Ok(Self { path, format });
            }
        }

        Err(Error::io(
            models_dir.join(format!("{url}.ply")),
            io::Error::new(io::ErrorKind::NotFound, "no .ply or .splat capture with this id"),
        ))
    }

    pub fn load(&self) -> Result<SplatCloud> {
        let data = std::fs::read(&self.path).map_err(|e| Error::io(&self.path, e))?;
        self.format.decode(&data)
    }
}

/// Reads a splat file, picking the decoder from the extension or contents.
pub fn read_splat_file<P: AsRef<Path>>(path: P) -> Result<SplatCloud> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    let format = SplatFormat::from_path(path).unwrap_or_else(|| SplatFormat::sniff(&data));
    format.decode(&data)
}
