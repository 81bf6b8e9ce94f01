//! level_stats.rs - load a Quake `.map` or `.bsp`, print one line per
//! texture batch and optionally dump the geometry as Wavefront OBJ.
//!
//! USAGE:
//! ```bash
//! RUST_LOG=info cargo run --release --bin level_stats -- \
//!     maps/start.bsp --obj start.obj
//! cargo run --bin level_stats -- src/box.map --wad gfx/base.wad
//! ```

use std::{fmt::Write as _, fs, path::PathBuf};

use anyhow::Context;
use clap::Parser;

use qlevel_rs::{
    assets::{LoadOptions, Palette},
    scene::{SceneHost, Uploader},
    world::{mesh::Mesh, texture::Image},
};

/// CLI options handled via `clap` derive.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Opts {
    /// `.map` or `.bsp` file to load
    #[arg(value_name = "FILE")]
    level: PathBuf,

    /// WAD2 archive for `.map` textures (default: the map's `wad` key)
    #[arg(long, value_name = "FILE")]
    wad: Option<PathBuf>,

    /// 768-byte `palette.lmp` replacing the built-in palette
    #[arg(long, value_name = "FILE")]
    palette: Option<PathBuf>,

    /// Write every batch to this OBJ file
    #[arg(long, value_name = "FILE")]
    obj: Option<PathBuf>,
}

/// Stand-in for a GPU: records batches and renders them as OBJ text.
#[derive(Default)]
struct ObjSink {
    rows: Vec<(String, usize, usize, usize)>,
    obj: String,
    /// OBJ indices are 1-based and global to the file.
    emitted: usize,
}

impl Uploader for ObjSink {
    type Handle = usize;

    fn upload(&mut self, mesh: &Mesh, texture: &Image) -> usize {
        let handle = self.rows.len();
        self.rows.push((
            texture.name.clone(),
            texture.width,
            texture.height,
            mesh.triangle_count(),
        ));

        let _ = writeln!(self.obj, "o batch_{handle}\nusemtl {}", texture.name);
        for p in &mesh.positions {
            let _ = writeln!(self.obj, "v {} {} {}", p.x, p.y, p.z);
        }
        // OBJ texture space grows upward
        for uv in &mesh.uvs {
            let _ = writeln!(self.obj, "vt {} {}", uv.x, 1.0 - uv.y);
        }
        for n in &mesh.normals {
            let _ = writeln!(self.obj, "vn {} {} {}", n.x, n.y, n.z);
        }
        for tri in 0..mesh.triangle_count() {
            let i = self.emitted + tri * 3 + 1;
            let _ = writeln!(self.obj, "f {i}/{i}/{i} {0}/{0}/{0} {1}/{1}/{1}", i + 1, i + 2);
        }
        self.emitted += mesh.vertex_count();
        handle
    }

    fn release(&mut self, _handle: usize) {}
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opts = Opts::parse();

    // 1. Palette.
    let palette = match &opts.palette {
        Some(path) => {
            let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            Palette::from_lmp(&bytes)?
        }
        None => Palette::default(),
    };
    let load = LoadOptions {
        palette,
        wad: opts.wad.clone(),
    };

    // 2. Build + "upload".
    let mut host = SceneHost::new(ObjSink::default());
    let stats = host
        .open(&opts.level, &load)
        .with_context(|| format!("loading {}", opts.level.display()))?;

    // 3. Report.
    for (name, w, h, tris) in &host.uploader().rows {
        println!("{name:<16} {w:>4}x{h:<4} {tris:>7} triangles");
    }
    println!(
        "{} batches, {} triangles, {} textures",
        stats.batches, stats.triangles, stats.textures
    );

    if let Some(path) = &opts.obj {
        fs::write(path, &host.uploader().obj).with_context(|| format!("writing {}", path.display()))?;
        println!("wrote {}", path.display());
    }
    Ok(())
}
