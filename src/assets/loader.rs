// ──────────────────────────────────────────────────────────────────────────
// assets/loader.rs
//
//  *   Map + Wad2   (assets::map, assets::wad2)   ──╮
//  *   Bsp          (assets::bsp)                   │  --->  Vec<TexturedMesh>
//  *   Palette      (LoadOptions)                   │        + populated TextureBank
//                                                   ╯
// ──────────────────────────────────────────────────────────────────────────

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use glam::{Vec2, Vec3};
use log::{debug, info, warn};
use thiserror::Error;

use super::{
    bsp::{Bsp, BspError, Child, Face, Lump, Node},
    map::{Map, MapError},
    palette::Palette,
    wad2::{Wad2, Wad2Error},
};
use crate::world::{
    brush::polygonise,
    geometry::{Aabb, to_y_up},
    mesh::{Mesh, TexturedMesh, Winding},
    texcoord::project_map,
    texture::{Image, MISSING_NAME, NO_TEXTURE, TextureBank, TextureError, TextureId},
};

/*──────────────────────────── Error type ───────────────────────────*/

#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Map(#[from] MapError),

    #[error(transparent)]
    Bsp(#[from] BspError),

    #[error(transparent)]
    Wad(#[from] Wad2Error),

    #[error(transparent)]
    Texture(#[from] TextureError),

    #[error("texture `{0}` not found in WAD")]
    MissingTexture(String),

    #[error("world entity has no `wad` key and no WAD was given")]
    MissingWadKey,

    #[error("none of the WAD files `{0}` could be found next to the map")]
    WadNotFound(String),
}

/*──────────────────────────── Options / output ─────────────────────*/

/// Knobs shared by both pipelines.
#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    /// Palette used to expand texture indices.
    pub palette: Palette,
    /// Overrides the world `wad` key of `.MAP` files.
    pub wad: Option<PathBuf>,
}

/// Everything a load produces.  Meshes name their texture; the bank holds
/// exactly the images those names refer to, plus the fallback.
pub struct LoadedLevel {
    pub meshes: Vec<TexturedMesh>,
    pub textures: TextureBank,
    /// Brushes dropped because they produced no polygon.
    pub skipped_brushes: usize,
    pub bounds: Option<Aabb>,
}

impl LoadedLevel {
    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.mesh.triangle_count()).sum()
    }
}

/// Per-texture batches under construction, kept in first-seen order.
struct Groups {
    index: HashMap<String, usize>,
    batches: Vec<TexturedMesh>,
}

impl Groups {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            batches: Vec::new(),
        }
    }

    fn get(&mut self, key: &str) -> Option<&mut TexturedMesh> {
        let i = *self.index.get(key)?;
        Some(&mut self.batches[i])
    }

    fn add(&mut self, key: String, texture: String, texture_id: TextureId) -> &mut TexturedMesh {
        let i = self.batches.len();
        self.index.insert(key, i);
        self.batches.push(TexturedMesh {
            texture,
            texture_id,
            mesh: Mesh::new(),
        });
        &mut self.batches[i]
    }

    fn into_meshes(self) -> Vec<TexturedMesh> {
        self.batches
    }
}

/// Texture dimensions as the projection divisor.
fn texel_size(image: &Image) -> Vec2 {
    Vec2::new(image.width as f32, image.height as f32)
}

/*====================================================================*/
/*                       .MAP pipeline                                */
/*====================================================================*/

/// Polygonise every brush of `map`, texture it from `wad` and batch the
/// triangles per texture.  Brushes that produce no polygon are logged and
/// skipped; any other failure aborts the load.
pub fn load_map(map: &Map, wad: &Wad2, opts: &LoadOptions) -> Result<LoadedLevel, LoadError> {
    let mut bank = TextureBank::with_checker(&opts.palette);
    let mut groups = Groups::new();
    let mut skipped_brushes = 0;
    let mut bounds: Option<Aabb> = None;

    for (ent_idx, entity) in map.entities.iter().enumerate() {
        for (brush_idx, brush) in entity.brushes.iter().enumerate() {
            let polys = match polygonise(&brush.planes()) {
                Ok(p) => p,
                Err(e) => {
                    warn!("entity {ent_idx} brush {brush_idx}: {e}; skipped");
                    skipped_brushes += 1;
                    continue;
                }
            };
            bounds = Some(bounds.map_or(polys.bbox, |b| b.union(&polys.bbox)));

            for poly in &polys.faces {
                let face = &brush.faces[poly.face_index];
                let key = face.texture.to_ascii_lowercase();

                let textured = match groups.get(&key) {
                    Some(b) => b,
                    None => {
                        let id = match bank.id(&face.texture) {
                            Some(id) => id,
                            None => {
                                let image = wad
                                    .image(&face.texture)?
                                    .ok_or_else(|| LoadError::MissingTexture(face.texture.clone()))?;
                                bank.insert(face.texture.clone(), image)?
                            }
                        };
                        groups.add(key, face.texture.clone(), id)
                    }
                };

                let size = texel_size(bank.texture(textured.texture_id)?);
                let uvs = project_map(&poly.vertices, face.plane.n, &face.placement, size);
                textured
                    .mesh
                    .push_polygon(&poly.vertices, &uvs, Winding::CounterClockwise);
            }
        }
    }

    let level = LoadedLevel {
        meshes: groups.into_meshes(),
        textures: bank,
        skipped_brushes,
        bounds,
    };
    info!(
        "map: {} brushes ({} skipped) → {} batches, {} triangles",
        map.brush_count(),
        skipped_brushes,
        level.meshes.len(),
        level.triangle_count()
    );
    Ok(level)
}

/// Read a `.MAP` file, find its WAD and run [`load_map`].
pub fn load_map_file<P: AsRef<Path>>(path: P, opts: &LoadOptions) -> Result<LoadedLevel, LoadError> {
    let path = path.as_ref();
    let map = Map::from_file(path)?;
    let wad_path = match &opts.wad {
        Some(p) => p.clone(),
        None => resolve_wad(path, &map)?,
    };
    info!("map {}: using WAD {}", path.display(), wad_path.display());
    let wad = Wad2::from_file(&wad_path, &opts.palette)?;
    load_map(&map, &wad, opts)
}

/// First existing file named by the world `wad` key.  Each entry is tried
/// relative to the map's directory, then by bare file name in it.
pub fn resolve_wad(map_path: &Path, map: &Map) -> Result<PathBuf, LoadError> {
    let entries = map.wad_paths();
    if entries.is_empty() {
        return Err(LoadError::MissingWadKey);
    }
    let dir = map_path.parent().unwrap_or(Path::new(""));
    for entry in &entries {
        let rel = entry.replace('\\', "/");
        let rel = Path::new(rel.trim_start_matches('/'));
        let mut candidates = vec![dir.join(rel)];
        if let Some(name) = rel.file_name() {
            candidates.push(dir.join(name));
        }
        for c in candidates {
            debug!("trying WAD {}", c.display());
            if c.is_file() {
                return Ok(c);
            }
        }
    }
    Err(LoadError::WadNotFound(entries.join(";")))
}

/*====================================================================*/
/*                        BSP pipeline                                */
/*====================================================================*/

/// Leaves reachable from the world model's root, in first-visit order.
///
/// Depth-first with an explicit stack: each node records its front child,
/// then its back child.  Child nodes are pushed; leaves are appended once.
pub fn world_leaves(bsp: &Bsp) -> Result<Vec<usize>, BspError> {
    let node_count = bsp.count::<Node>();
    let root = bsp.world_model()?.roots[0];
    let root = usize::try_from(root).map_err(|_| BspError::IndexOutOfRange {
        lump: Lump::Nodes,
        index: usize::MAX,
        count: node_count,
    })?;

    let mut stack = vec![root];
    let mut seen_nodes = HashSet::from([root]);
    let mut seen_leaves = HashSet::new();
    let mut leaves = Vec::new();

    while let Some(n) = stack.pop() {
        let node = bsp.node(n)?;
        for raw in [node.front, node.back] {
            match Child::from_raw(raw) {
                Some(Child::Node(c)) => {
                    if seen_nodes.insert(c) {
                        stack.push(c);
                    }
                }
                Some(Child::Leaf(l)) => {
                    if seen_leaves.insert(l) {
                        leaves.push(l);
                    }
                }
                None => {
                    return Err(BspError::IndexOutOfRange {
                        lump: Lump::Nodes,
                        index: 0,
                        count: node_count,
                    });
                }
            }
        }
    }
    Ok(leaves)
}

/// Face indices of `leaves`, concatenated through `listfaces`.
pub fn leaf_faces(bsp: &Bsp, leaves: &[usize]) -> Result<Vec<usize>, BspError> {
    let mut faces = Vec::new();
    for &l in leaves {
        let leaf = bsp.leaf(l)?;
        let first = leaf.first_listface as usize;
        for k in 0..leaf.listface_count as usize {
            faces.push(bsp.listface(first + k)? as usize);
        }
    }
    Ok(faces)
}

/// File-space boundary loop of `face`: one vertex per listedge, the edge's
/// start for a positive entry and its end for a negative one.
pub fn face_polygon(bsp: &Bsp, face: &Face) -> Result<Vec<Vec3>, BspError> {
    let first = usize::try_from(face.first_listedge).unwrap_or(usize::MAX);
    (0..face.listedge_count as usize)
        .map(|i| {
            let e = bsp.listedge(first.saturating_add(i))?;
            let edge = bsp.edge(e.unsigned_abs() as usize)?;
            let v = if e >= 0 { edge.start } else { edge.end };
            Ok(bsp.vertex(v as usize)?.file_pos())
        })
        .collect()
}

/// Build per-texture meshes for the world model of `bsp`.
///
/// Faces reached from several leaves are emitted once per leaf.  Absent
/// textures are drawn with the bank's checkerboard under [`MISSING_NAME`].
pub fn load_bsp(bsp: &Bsp, opts: &LoadOptions) -> Result<LoadedLevel, LoadError> {
    let mut bank = TextureBank::with_checker(&opts.palette);
    let mut groups = Groups::new();
    let mut bounds: Option<Aabb> = None;

    let leaves = world_leaves(bsp)?;
    let faces = leaf_faces(bsp, &leaves)?;
    debug!("bsp: {} leaves, {} face references", leaves.len(), faces.len());

    for face_idx in faces {
        let face = bsp.face(face_idx)?;
        let texinfo = bsp.texinfo(face.texinfo as usize)?;
        let slot = texinfo.miptex as usize;

        // each face divides by its own miptex, even when names repeat
        let (name, size) = match bsp.miptex(slot)? {
            Some(mip) => (mip.name, Vec2::new(mip.width as f32, mip.height as f32)),
            None => (MISSING_NAME.to_owned(), texel_size(bank.texture(NO_TEXTURE)?)),
        };

        let textured = match groups.get(&name) {
            Some(b) => b,
            None => {
                let id = match bank.id(&name) {
                    Some(id) => id,
                    None => match bsp.mip_image(slot, &opts.palette)? {
                        Some(image) => bank.insert(name.clone(), image)?,
                        None => NO_TEXTURE,
                    },
                };
                groups.add(name.clone(), name, id)
            }
        };

        let axes = texinfo.axes();
        let polygon = face_polygon(bsp, &face)?;
        let uvs: Vec<Vec2> = polygon.iter().map(|&p| axes.project(p, size)).collect();
        let positions: Vec<Vec3> = polygon.into_iter().map(to_y_up).collect();
        if let Some(b) = Aabb::from_points(&positions) {
            bounds = Some(bounds.map_or(b, |acc| acc.union(&b)));
        }
        textured.mesh.push_polygon(&positions, &uvs, Winding::Clockwise);
    }

    let level = LoadedLevel {
        meshes: groups.into_meshes(),
        textures: bank,
        skipped_brushes: 0,
        bounds,
    };
    info!(
        "bsp: {} leaves → {} batches, {} triangles",
        leaves.len(),
        level.meshes.len(),
        level.triangle_count()
    );
    Ok(level)
}

/// Open a BSP file and run [`load_bsp`].
pub fn load_bsp_file<P: AsRef<Path>>(path: P, opts: &LoadOptions) -> Result<LoadedLevel, LoadError> {
    let bsp = Bsp::from_file(path.as_ref())?;
    info!("bsp {}: opened", path.as_ref().display());
    load_bsp(&bsp, opts)
}

/*====================================================================*/
/*                              Tests                                 */
/*====================================================================*/
