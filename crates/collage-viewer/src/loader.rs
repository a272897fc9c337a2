//! Background asset loading.
//!
//! One thread per scene reads the descriptor, the splat capture, the
//! material library and the mesh, in that order, and hands each result to
//! the render thread over a channel.

use collage::{
    mtl::read_mtl, obj::read_obj, splat::SplatSource, MaterialLibrary, ObjModel, SceneDescriptor,
    SplatCloud,
};
use crossbeam_channel::{Receiver, Sender};
use std::{
    fmt, io,
    path::{Path, PathBuf},
    thread,
    time::Instant,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Asset {
    Descriptor,
    Splat,
    Materials,
    Model,
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Descriptor => "descriptor",
            Self::Splat => "splat",
            Self::Materials => "materials",
            Self::Model => "model",
        })
    }
}

#[derive(Debug)]
pub enum LoadEvent {
    Descriptor(SceneDescriptor),
    Splat(SplatCloud),
    Materials(MaterialLibrary),
    Model(ObjModel),
    Failed { asset: Asset, error: String },
    Finished,
}

/// Starts loading `scene` on a new thread.
pub fn spawn_loader(
    scene: PathBuf,
    models_dir: PathBuf,
) -> io::Result<(Receiver<LoadEvent>, thread::JoinHandle<()>)> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let handle = thread::Builder::new()
        .name("collage-loader".into())
        .spawn(move || load_scene(&scene, &models_dir, &tx))?;
    Ok((rx, handle))
}

/// Loads every asset of `scene`, sending events on `tx`.
///
/// A failed descriptor ends the load. Splat and mesh failures are reported
/// and loading continues; a missing material library falls back to an empty
/// one so every mesh gets the default material.
pub fn load_scene(scene: &Path, models_dir: &Path, tx: &Sender<LoadEvent>) {
    let send = |event: LoadEvent| {
        if tx.send(event).is_err() {
            log::debug!("Viewer closed; abandoning load of {}", scene.display());
            false
        } else {
            true
        }
    };
    let fail = |asset: Asset, error: String| {
        log::error!("Failed to load {asset}: {error}");
        send(LoadEvent::Failed { asset, error })
    };

    let descriptor = match SceneDescriptor::load(scene) {
        Ok(d) => d,
        Err(e) => {
            fail(Asset::Descriptor, format!("{}: {e}", scene.display()));
            send(LoadEvent::Finished);
            return;
        }
    };
    log::info!("Scene `{}` from {}", descriptor.name, scene.display());

    let splat_url = descriptor.splat.url.clone();
    let mtl_path = models_dir.join(descriptor.mtl_file_name());
    let obj_path = models_dir.join(descriptor.obj_file_name());

    if !send(LoadEvent::Descriptor(descriptor)) {
        return;
    }

    let started = Instant::now();
    let splat = SplatSource::resolve(&splat_url, models_dir).and_then(|src| {
        log::info!("Loading splat {}", src.path.display());
        src.load()
    });
    let keep_going = match splat {
        Ok(cloud) => {
            log::info!("Splat: {} gaussians in {:.2?}", cloud.len(), started.elapsed());
            send(LoadEvent::Splat(cloud))
        }
        Err(e) => fail(Asset::Splat, e.to_string()),
    };
    if !keep_going {
        return;
    }

    let materials = match read_mtl(&mtl_path) {
        Ok(lib) => {
            log::info!("Materials: {} from {}", lib.len(), mtl_path.display());
            lib
        }
        Err(e) => {
            log::warn!("Using default material: {e}");
            if !send(LoadEvent::Failed {
                asset: Asset::Materials,
                error: e.to_string(),
            }) {
                return;
            }
            MaterialLibrary::default()
        }
    };
    if !send(LoadEvent::Materials(materials)) {
        return;
    }

    let started = Instant::now();
    let keep_going = match read_obj(&obj_path) {
        Ok(model) => {
            log::info!(
                "Model: {} meshes, {} triangles in {:.2?}",
                model.meshes.len(),
                model.triangle_count(),
                started.elapsed()
            );
            send(LoadEvent::Model(model))
        }
        Err(e) => fail(Asset::Model, e.to_string()),
    };
    if keep_going {
        send(LoadEvent::Finished);
    }
}
