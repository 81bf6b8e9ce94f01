//! Hand-off to whatever owns GPU memory.
//!
//! The loaders only build CPU-side meshes.  A type implementing
//! [`Uploader`] turns each `(mesh, texture)` batch into a handle of its own
//! choosing; [`SceneHost`] keeps those handles and applies the reload rule:
//!
//! * the new level is built completely before anything is touched;
//! * a failed build leaves the current scene as it was;
//! * on success the old handles are released *before* the new batches are
//!   uploaded.

use std::path::Path;

use log::info;

use crate::{
    assets::loader::{LoadError, LoadOptions, LoadedLevel, load_bsp_file, load_map_file},
    world::{mesh::Mesh, texture::Image},
};

/// Receives finished batches.  Ownership of the mesh stays with the caller.
pub trait Uploader {
    type Handle;

    fn upload(&mut self, mesh: &Mesh, texture: &Image) -> Self::Handle;
    fn release(&mut self, handle: Self::Handle);
}

/// Summary of the scene currently uploaded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SceneStats {
    pub batches: usize,
    pub triangles: usize,
    pub textures: usize,
}

/// Owns an [`Uploader`] and the handles of the scene it currently shows.
pub struct SceneHost<U: Uploader> {
    uploader: U,
    handles: Vec<U::Handle>,
    stats: SceneStats,
}

impl<U: Uploader> SceneHost<U> {
    pub fn new(uploader: U) -> Self {
        Self {
            uploader,
            handles: Vec::new(),
            stats: SceneStats::default(),
        }
    }

    /// Run `build`; on success swap its output in, on failure keep the
    /// current scene and return the error.  A batch whose texture id is not
    /// in the level's bank fails the reload the same way.
    pub fn reload<F>(&mut self, build: F) -> Result<SceneStats, LoadError>
    where
        F: FnOnce() -> Result<LoadedLevel, LoadError>,
    {
        let level = build()?;
        let batches = level
            .meshes
            .iter()
            .map(|tm| -> Result<_, LoadError> { Ok((&tm.mesh, level.textures.texture(tm.texture_id)?)) })
            .collect::<Result<Vec<_>, _>>()?;
        self.clear();

        for (mesh, texture) in batches {
            self.handles.push(self.uploader.upload(mesh, texture));
        }
        self.stats = SceneStats {
            batches: level.meshes.len(),
            triangles: level.triangle_count(),
            // the checkerboard is always present
            textures: level.textures.len() - 1,
        };
        info!(
            "scene: {} batches, {} triangles uploaded",
            self.stats.batches, self.stats.triangles
        );
        Ok(self.stats)
    }

    /// Load a `.bsp` or `.map` file, picking the pipeline by extension.
    pub fn open<P: AsRef<Path>>(&mut self, path: P, opts: &LoadOptions) -> Result<SceneStats, LoadError> {
        let path = path.as_ref();
        let is_bsp = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("bsp"));
        if is_bsp {
            self.reload(|| load_bsp_file(path, opts))
        } else {
            self.reload(|| load_map_file(path, opts))
        }
    }

    /// Release every handle.
    pub fn clear(&mut self) {
        for h in self.handles.drain(..) {
            self.uploader.release(h);
        }
        self.stats = SceneStats::default();
    }

    pub fn stats(&self) -> SceneStats {
        self.stats
    }

    pub fn handles(&self) -> &[U::Handle] {
        &self.handles
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }
}

impl<U: Uploader> Drop for SceneHost<U> {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assets::{
            bsp::{Bsp, tests::two_room_bsp},
            loader::load_bsp,
        },
        world::texture::TextureError,
    };

    /// Records every call; handles are sequence numbers.
    #[derive(Default)]
    struct Recorder {
        next: u32,
        log: Vec<String>,
    }

    impl Uploader for Recorder {
        type Handle = u32;

        fn upload(&mut self, mesh: &Mesh, texture: &Image) -> u32 {
            self.next += 1;
            self.log.push(format!(
                "up {} {} {}",
                self.next,
                texture.name,
                mesh.triangle_count()
            ));
            self.next
        }

        fn release(&mut self, handle: u32) {
            self.log.push(format!("rel {handle}"));
        }
    }

    fn build() -> Result<LoadedLevel, LoadError> {
        let bsp = Bsp::from_bytes(two_room_bsp())?;
        load_bsp(&bsp, &LoadOptions::default())
    }

    #[test]
    fn uploads_one_handle_per_batch() {
        let mut host = SceneHost::new(Recorder::default());
        let stats = host.reload(build).unwrap();
        assert_eq!(
            stats,
            SceneStats {
                batches: 2,
                triangles: 8,
                textures: 2
            }
        );
        assert_eq!(host.handles(), &[1, 2]);
        assert_eq!(host.uploader().log, vec!["up 1 floor 6", "up 2 sky 2"]);
    }

    #[test]
    fn reload_releases_before_uploading() {
        let mut host = SceneHost::new(Recorder::default());
        host.reload(build).unwrap();
        host.reload(build).unwrap();
        assert_eq!(
            host.uploader().log[2..],
            ["rel 1", "rel 2", "up 3 floor 6", "up 4 sky 2"]
        );
        assert_eq!(host.handles(), &[3, 4]);
    }

    #[test]
    fn failed_reload_keeps_scene() {
        let mut host = SceneHost::new(Recorder::default());
        host.reload(build).unwrap();
        let err = host.reload(|| {
            let mut bytes = two_room_bsp();
            bytes[0] = 22;
            load_bsp(&Bsp::from_bytes(bytes)?, &LoadOptions::default())
        });
        assert!(err.is_err());
        assert_eq!(host.handles(), &[1, 2]);
        assert_eq!(host.stats().batches, 2);
        assert_eq!(host.uploader().log.len(), 2);
    }

    #[test]
    fn unknown_texture_id_keeps_scene() {
        let mut host = SceneHost::new(Recorder::default());
        host.reload(build).unwrap();
        let err = host.reload(|| {
            let mut level = build()?;
            level.meshes[1].texture_id = 99;
            Ok(level)
        });
        assert!(matches!(err, Err(LoadError::Texture(TextureError::BadId(99)))));
        assert_eq!(host.handles(), &[1, 2]);
        assert_eq!(host.uploader().log.len(), 2);
    }

    #[test]
    fn clear_releases_everything() {
        let mut host = SceneHost::new(Recorder::default());
        host.reload(build).unwrap();
        host.clear();
        assert!(host.handles().is_empty());
        assert_eq!(host.stats(), SceneStats::default());
        assert_eq!(host.uploader().log[2..], ["rel 1", "rel 2"]);
    }

    #[test]
    fn open_picks_pipeline_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("E1M1.BSP");
        std::fs::write(&path, two_room_bsp()).unwrap();
        let mut host = SceneHost::new(Recorder::default());
        assert_eq!(host.open(&path, &LoadOptions::default()).unwrap().triangles, 8);

        // a .map without a WAD key fails and leaves the scene alone
        let map = dir.path().join("broken.map");
        std::fs::write(&map, "{ \"classname\" \"worldspawn\" }").unwrap();
        assert!(matches!(
            host.open(&map, &LoadOptions::default()),
            Err(LoadError::MissingWadKey)
        ));
        assert_eq!(host.handles().len(), 2);
    }
}
