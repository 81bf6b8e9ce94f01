//! BSP version 23 reader.
//!
//! The whole file is kept in memory; records are decoded on demand with
//! **bincode 2** (little-endian, fixed-width).  Every lump is bounds-checked
//! and every fixed-size lump is checked for a whole number of records when
//! the file is opened, so later reads can only fail on a bad index.

use std::{
    fs,
    io::{self, Read},
    mem,
    path::Path,
};

use bincode::{Decode, error::DecodeError};
use bitflags::bitflags;
use byteorder::{LittleEndian as LE, ReadBytesExt};
use glam::Vec3;
use thiserror::Error;

use super::{
    decode_record,
    entities::{Properties, parse_entity_lump},
    map::MapError,
    miptex::{MipTex, MipTexError},
    palette::Palette,
};
use crate::world::{
    geometry::{Plane, to_y_up},
    texcoord::TexAxes,
    texture::Image,
};

/// The only version this reader accepts.
pub const BSP_VERSION: i32 = 23;

const HEADER_SIZE: usize = 4 + LUMP_COUNT * 8;
const LUMP_COUNT: usize = 15;

/*======================================================================*/
/*                          Lump directory                              */
/*======================================================================*/

/// Directory slots, in file order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lump {
    Entities,
    Planes,
    MipTex,
    Vertices,
    Visibility,
    Nodes,
    TexInfo,
    Faces,
    Lightmaps,
    Clipnodes,
    Leaves,
    ListFaces,
    Edges,
    ListEdges,
    Models,
}

impl Lump {
    pub const ALL: [Lump; LUMP_COUNT] = [
        Lump::Entities,
        Lump::Planes,
        Lump::MipTex,
        Lump::Vertices,
        Lump::Visibility,
        Lump::Nodes,
        Lump::TexInfo,
        Lump::Faces,
        Lump::Lightmaps,
        Lump::Clipnodes,
        Lump::Leaves,
        Lump::ListFaces,
        Lump::Edges,
        Lump::ListEdges,
        Lump::Models,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Lump::Entities => "entities",
            Lump::Planes => "planes",
            Lump::MipTex => "miptex",
            Lump::Vertices => "vertices",
            Lump::Visibility => "visibility",
            Lump::Nodes => "nodes",
            Lump::TexInfo => "texinfo",
            Lump::Faces => "faces",
            Lump::Lightmaps => "lightmaps",
            Lump::Clipnodes => "clipnodes",
            Lump::Leaves => "leaves",
            Lump::ListFaces => "listfaces",
            Lump::Edges => "edges",
            Lump::ListEdges => "listedges",
            Lump::Models => "models",
        }
    }

    /// On-disk record size of fixed-record lumps.
    pub fn record_size(self) -> Option<usize> {
        match self {
            Lump::Planes => Some(20),
            Lump::Vertices => Some(12),
            Lump::Nodes => Some(24),
            Lump::TexInfo => Some(40),
            Lump::Faces => Some(20),
            Lump::Clipnodes => Some(8),
            Lump::Leaves => Some(28),
            Lump::ListFaces => Some(2),
            Lump::Edges => Some(4),
            Lump::ListEdges => Some(4),
            Lump::Models => Some(64),
            Lump::Entities | Lump::MipTex | Lump::Visibility | Lump::Lightmaps => None,
        }
    }
}

impl std::fmt::Display for Lump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct LumpEntry {
    offset: usize,
    size: usize,
}

#[derive(Error, Debug)]
pub enum BspError {
    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    #[error("unsupported BSP version {0} (expected {BSP_VERSION})")]
    InvalidBspVersion(i32),

    #[error("lump {lump} lies outside the file")]
    LumpOutOfBounds { lump: Lump },

    #[error("lump {lump} size {size} is not a multiple of record size {record}")]
    LumpSizeMismatch {
        lump: Lump,
        size: usize,
        record: usize,
    },

    #[error("{lump} index {index} out of range ({count} records)")]
    IndexOutOfRange {
        lump: Lump,
        index: usize,
        count: usize,
    },

    #[error("{lump} record undecodable: {source}")]
    BadRecord { lump: Lump, source: DecodeError },

    #[error(transparent)]
    MipTex(#[from] MipTexError),

    #[error("entities lump: {0}")]
    Entities(#[from] MapError),
}

/*======================================================================*/
/*                            Records                                   */
/*======================================================================*/

/// A fixed-size record stored in one lump.
pub trait Record: Decode<()> + Sized {
    const LUMP: Lump;
    const SIZE: usize = mem::size_of::<Self>();
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug, PartialEq)]
pub struct Vertex {
    pub pos: [f32; 3],
}

impl Vertex {
    /// File-space (Z-up) position.
    pub fn file_pos(&self) -> Vec3 {
        Vec3::from_array(self.pos)
    }
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug, PartialEq, Eq)]
pub struct Edge {
    pub start: u16,
    pub end: u16,
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug, PartialEq)]
pub struct BspPlane {
    pub normal: [f32; 3],
    pub dist: f32,
    pub kind: i32,
}

impl BspPlane {
    /// `n·x = dist` in file space → `n·x + d = 0` in Y-up space.
    pub fn to_plane(&self) -> Plane {
        Plane::new(to_y_up(Vec3::from_array(self.normal)), -self.dist)
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TexFlags: u32 {
        /// Animated or sky/liquid surface; not lightmapped.
        const ANIMATED = 1;
    }
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug, PartialEq)]
pub struct TexInfo {
    pub u_axis: [f32; 3],
    pub u_offset: f32,
    pub v_axis: [f32; 3],
    pub v_offset: f32,
    pub miptex: u32,
    pub flags: u32,
}

impl TexInfo {
    pub fn axes(&self) -> TexAxes {
        TexAxes {
            u_axis: Vec3::from_array(self.u_axis),
            u_offset: self.u_offset,
            v_axis: Vec3::from_array(self.v_axis),
            v_offset: self.v_offset,
        }
    }

    pub fn tex_flags(&self) -> TexFlags {
        TexFlags::from_bits_retain(self.flags)
    }
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug, PartialEq, Eq)]
pub struct Face {
    pub plane: u16,
    pub side: u16,
    pub first_listedge: i32,
    pub listedge_count: u16,
    pub texinfo: u16,
    pub light_type: u8,
    pub base_light: u8,
    pub light: [u8; 2],
    pub lightmap: u32,
}

impl Face {
    /// The face lies on the back of its plane.
    pub fn is_back_side(&self) -> bool {
        self.side != 0
    }
}

/// Decoded node or leaf reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Child {
    Node(usize),
    Leaf(usize),
}

impl Child {
    /// `> 0` is a node, `< 0` is leaf `!raw`; `0` (the root) is never a child.
    pub fn from_raw(raw: i16) -> Option<Child> {
        match raw {
            0 => None,
            r if r > 0 => Some(Child::Node(r as usize)),
            r => Some(Child::Leaf(!r as usize)),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug, PartialEq, Eq)]
pub struct Node {
    pub plane: u32,
    pub front: i16,
    pub back: i16,
    pub bbox_min: [i16; 3],
    pub bbox_max: [i16; 3],
    pub first_face: u16,
    pub face_count: u16,
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug, PartialEq, Eq)]
pub struct Leaf {
    pub kind: i32,
    pub vis_offset: i32,
    pub bbox_min: [i16; 3],
    pub bbox_max: [i16; 3],
    pub first_listface: u16,
    pub listface_count: u16,
    pub ambient: [u8; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug, PartialEq, Eq)]
pub struct Clipnode {
    pub plane: u32,
    pub front: i16,
    pub back: i16,
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug, PartialEq)]
pub struct Model {
    pub bbox_min: [f32; 3],
    pub bbox_max: [f32; 3],
    pub origin: [f32; 3],
    /// `[0]` is the BSP root, `[1..]` the clip hulls.
    pub roots: [i32; 4],
    pub leaf_count: i32,
    pub first_face: i32,
    pub face_count: i32,
}

impl Record for Vertex {
    const LUMP: Lump = Lump::Vertices;
}
impl Record for Edge {
    const LUMP: Lump = Lump::Edges;
}
impl Record for BspPlane {
    const LUMP: Lump = Lump::Planes;
}
impl Record for TexInfo {
    const LUMP: Lump = Lump::TexInfo;
}
impl Record for Face {
    const LUMP: Lump = Lump::Faces;
}
impl Record for Node {
    const LUMP: Lump = Lump::Nodes;
}
impl Record for Leaf {
    const LUMP: Lump = Lump::Leaves;
}
impl Record for Clipnode {
    const LUMP: Lump = Lump::Clipnodes;
}
impl Record for Model {
    const LUMP: Lump = Lump::Models;
}
/// Face index stored in `listfaces`.
impl Record for u16 {
    const LUMP: Lump = Lump::ListFaces;
}
/// Signed edge index stored in `listedges`.
impl Record for i32 {
    const LUMP: Lump = Lump::ListEdges;
}

/*======================================================================*/
/*                               File                                   */
/*======================================================================*/

/// An opened BSP file.
#[derive(Debug)]
pub struct Bsp {
    bytes: Vec<u8>,
    lumps: [LumpEntry; LUMP_COUNT],
}

impl Bsp {
    // ---------------------------------------------------------------------
    // Loading
    // ---------------------------------------------------------------------

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, BspError> {
        Self::from_bytes(fs::read(path)?)
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, BspError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, BspError> {
        let mut cur = bytes.as_slice();
        let version = cur.read_i32::<LE>()?;
        if version != BSP_VERSION {
            return Err(BspError::InvalidBspVersion(version));
        }

        let mut lumps = [LumpEntry::default(); LUMP_COUNT];
        for (entry, lump) in lumps.iter_mut().zip(Lump::ALL) {
            let offset = cur.read_i32::<LE>()?;
            let size = cur.read_i32::<LE>()?;
            let (Ok(offset), Ok(size)) = (usize::try_from(offset), usize::try_from(size)) else {
                return Err(BspError::LumpOutOfBounds { lump });
            };
            if offset.checked_add(size).is_none_or(|end| end > bytes.len()) {
                return Err(BspError::LumpOutOfBounds { lump });
            }
            if let Some(record) = lump.record_size() {
                if size % record != 0 {
                    return Err(BspError::LumpSizeMismatch { lump, size, record });
                }
            }
            *entry = LumpEntry { offset, size };
        }

        Ok(Self { bytes, lumps })
    }

    // ---------------------------------------------------------------------
    // Raw access
    // ---------------------------------------------------------------------

    pub fn lump_bytes(&self, lump: Lump) -> &[u8] {
        let e = self.lumps[lump as usize];
        &self.bytes[e.offset..e.offset + e.size]
    }

    /// Number of records of type `T`.
    pub fn count<T: Record>(&self) -> usize {
        self.lumps[T::LUMP as usize].size / T::SIZE
    }

    /// Record `index` of type `T`.
    pub fn read<T: Record>(&self, index: usize) -> Result<T, BspError> {
        let count = self.count::<T>();
        if index >= count {
            return Err(BspError::IndexOutOfRange {
                lump: T::LUMP,
                index,
                count,
            });
        }
        let start = index * T::SIZE;
        let bytes = &self.lump_bytes(T::LUMP)[start..start + T::SIZE];
        decode_record(bytes).map_err(|source| BspError::BadRecord {
            lump: T::LUMP,
            source,
        })
    }

    /// Every record of type `T`, in file order.
    pub fn records<T: Record>(&self) -> impl Iterator<Item = Result<T, BspError>> + '_ {
        (0..self.count::<T>()).map(|i| self.read::<T>(i))
    }

    /// Visibility data, left undecoded.
    pub fn visibility(&self) -> &[u8] {
        self.lump_bytes(Lump::Visibility)
    }

    // ---------------------------------------------------------------------
    // Typed helpers
    // ---------------------------------------------------------------------

    pub fn vertex(&self, i: usize) -> Result<Vertex, BspError> {
        self.read(i)
    }
    pub fn edge(&self, i: usize) -> Result<Edge, BspError> {
        self.read(i)
    }
    pub fn plane(&self, i: usize) -> Result<BspPlane, BspError> {
        self.read(i)
    }
    pub fn texinfo(&self, i: usize) -> Result<TexInfo, BspError> {
        self.read(i)
    }
    pub fn face(&self, i: usize) -> Result<Face, BspError> {
        self.read(i)
    }
    pub fn node(&self, i: usize) -> Result<Node, BspError> {
        self.read(i)
    }
    pub fn leaf(&self, i: usize) -> Result<Leaf, BspError> {
        self.read(i)
    }
    pub fn clipnode(&self, i: usize) -> Result<Clipnode, BspError> {
        self.read(i)
    }
    pub fn model(&self, i: usize) -> Result<Model, BspError> {
        self.read(i)
    }
    pub fn listface(&self, i: usize) -> Result<u16, BspError> {
        self.read(i)
    }
    pub fn listedge(&self, i: usize) -> Result<i32, BspError> {
        self.read(i)
    }

    /// Model 0: the static world.
    pub fn world_model(&self) -> Result<Model, BspError> {
        self.model(0)
    }

    pub fn faces(&self) -> impl Iterator<Item = Result<Face, BspError>> + '_ {
        self.records()
    }
    pub fn nodes(&self) -> impl Iterator<Item = Result<Node, BspError>> + '_ {
        self.records()
    }
    pub fn leaves(&self) -> impl Iterator<Item = Result<Leaf, BspError>> + '_ {
        self.records()
    }
    pub fn models(&self) -> impl Iterator<Item = Result<Model, BspError>> + '_ {
        self.records()
    }

    /// Key/value blocks of the entities lump.
    pub fn entities(&self) -> Result<Vec<Properties>, BspError> {
        let text = String::from_utf8_lossy(self.lump_bytes(Lump::Entities));
        Ok(parse_entity_lump(&text)?)
    }

    // ---------------------------------------------------------------------
    // Mip textures
    // ---------------------------------------------------------------------

    /// Number of slots in the texture chest (absent ones included).
    pub fn miptex_count(&self) -> Result<usize, BspError> {
        let lump = self.lump_bytes(Lump::MipTex);
        if lump.is_empty() {
            return Ok(0);
        }
        let mut cur = lump;
        let n = cur.read_i32::<LE>()?;
        usize::try_from(n).map_err(|_| BspError::LumpOutOfBounds { lump: Lump::MipTex })
    }

    /// Bytes of texture `index`, header first; `None` for an absent slot.
    fn miptex_bytes(&self, index: usize) -> Result<Option<&[u8]>, BspError> {
        let count = self.miptex_count()?;
        if index >= count {
            return Err(BspError::IndexOutOfRange {
                lump: Lump::MipTex,
                index,
                count,
            });
        }
        let lump = self.lump_bytes(Lump::MipTex);
        let slot = 4 + index * 4;
        let mut cur = lump
            .get(slot..slot + 4)
            .ok_or(BspError::LumpOutOfBounds { lump: Lump::MipTex })?;
        let offset = cur.read_i32::<LE>()?;
        if offset == -1 {
            return Ok(None);
        }
        usize::try_from(offset)
            .ok()
            .and_then(|o| lump.get(o..))
            .map(Some)
            .ok_or(BspError::LumpOutOfBounds { lump: Lump::MipTex })
    }

    /// Header of texture `index`; `None` for an absent slot.
    pub fn miptex(&self, index: usize) -> Result<Option<MipTex>, BspError> {
        match self.miptex_bytes(index)? {
            Some(bytes) => Ok(Some(MipTex::parse(bytes)?)),
            None => Ok(None),
        }
    }

    /// `(w >> level) * (h >> level)` palette indices of texture `index`.
    pub fn mip_pixels(&self, index: usize, level: usize) -> Result<Option<&[u8]>, BspError> {
        let Some(bytes) = self.miptex_bytes(index)? else {
            return Ok(None);
        };
        let mip = MipTex::parse(bytes)?;
        Ok(Some(mip.pixels(bytes, level)?))
    }

    /// Level 0 of texture `index` expanded through `palette`.
    pub fn mip_image(&self, index: usize, palette: &Palette) -> Result<Option<Image>, BspError> {
        let Some(bytes) = self.miptex_bytes(index)? else {
            return Ok(None);
        };
        let mip = MipTex::parse(bytes)?;
        Ok(Some(mip.decode(bytes, 0, palette)?))
    }
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::assets::miptex::tests::miptex_bytes;
    use byteorder::WriteBytesExt;

    /// Assemble a file from one byte blob per lump.
    pub(crate) fn bsp_bytes(version: i32, lumps: &[Vec<u8>; LUMP_COUNT]) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_i32::<LE>(version).unwrap();
        let mut offset = HEADER_SIZE;
        for l in lumps {
            out.write_i32::<LE>(offset as i32).unwrap();
            out.write_i32::<LE>(l.len() as i32).unwrap();
            offset += l.len();
        }
        for l in lumps {
            out.extend_from_slice(l);
        }
        out
    }

    fn f32s(out: &mut Vec<u8>, vals: &[f32]) {
        for &v in vals {
            out.write_f32::<LE>(v).unwrap();
        }
    }

    /// Two 64×64 squares, floor at z=0 and ceiling at z=64, plus the floor's
    /// underside.  Node 0 → (node 1, leaf 0); node 1 → (leaf 1, leaf 2).
    /// Leaf 1 lists faces [0, 1], leaf 2 lists [2, 0].
    /// Textures: 0 "floor" 16×16, 1 "sky" 8×8, 2 absent.
    pub(crate) fn two_room_bsp() -> Vec<u8> {
        let mut lumps: [Vec<u8>; LUMP_COUNT] = Default::default();

        lumps[Lump::Entities as usize] =
            b"{\n\"classname\" \"worldspawn\"\n\"wad\" \"gfx/base.wad\"\n}\n\0".to_vec();

        let planes = &mut lumps[Lump::Planes as usize];
        f32s(planes, &[0.0, 0.0, 1.0, 0.0]);
        planes.write_i32::<LE>(2).unwrap();
        f32s(planes, &[0.0, 0.0, 1.0, 64.0]);
        planes.write_i32::<LE>(2).unwrap();

        let mip = &mut lumps[Lump::MipTex as usize];
        let floor = miptex_bytes("floor", 16, 16, 254);
        let sky = miptex_bytes("sky", 8, 8, 8);
        mip.write_i32::<LE>(3).unwrap();
        mip.write_i32::<LE>(16).unwrap();
        mip.write_i32::<LE>(16 + floor.len() as i32).unwrap();
        mip.write_i32::<LE>(-1).unwrap();
        mip.extend_from_slice(&floor);
        mip.extend_from_slice(&sky);

        let verts = &mut lumps[Lump::Vertices as usize];
        for z in [0.0, 64.0] {
            f32s(verts, &[0.0, 0.0, z, 0.0, 64.0, z, 64.0, 64.0, z, 64.0, 0.0, z]);
        }

        let nodes = &mut lumps[Lump::Nodes as usize];
        for (plane, front, back) in [(0u32, 1i16, -1i16), (1, -2, -3)] {
            nodes.write_u32::<LE>(plane).unwrap();
            nodes.write_i16::<LE>(front).unwrap();
            nodes.write_i16::<LE>(back).unwrap();
            nodes.extend_from_slice(&[0u8; 12]);
            nodes.write_u16::<LE>(0).unwrap();
            nodes.write_u16::<LE>(0).unwrap();
        }

        let texinfo = &mut lumps[Lump::TexInfo as usize];
        for miptex in [0u32, 1] {
            f32s(texinfo, &[1.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0]);
            texinfo.write_u32::<LE>(miptex).unwrap();
            texinfo.write_u32::<LE>(0).unwrap();
        }

        // (plane, side, first listedge, count, texinfo)
        let faces = &mut lumps[Lump::Faces as usize];
        for (plane, side, first, texinfo) in [(0u16, 0u16, 0i32, 0u16), (1, 1, 4, 1), (0, 1, 8, 0)] {
            faces.write_u16::<LE>(plane).unwrap();
            faces.write_u16::<LE>(side).unwrap();
            faces.write_i32::<LE>(first).unwrap();
            faces.write_u16::<LE>(4).unwrap();
            faces.write_u16::<LE>(texinfo).unwrap();
            faces.extend_from_slice(&[0, 0, 0, 0]);
            faces.write_u32::<LE>(0).unwrap();
        }

        let leaves = &mut lumps[Lump::Leaves as usize];
        for (kind, first, count) in [(-2i32, 0u16, 0u16), (-1, 0, 2), (-1, 2, 2)] {
            leaves.write_i32::<LE>(kind).unwrap();
            leaves.write_i32::<LE>(-1).unwrap();
            leaves.extend_from_slice(&[0u8; 12]);
            leaves.write_u16::<LE>(first).unwrap();
            leaves.write_u16::<LE>(count).unwrap();
            leaves.extend_from_slice(&[0u8; 4]);
        }

        let listfaces = &mut lumps[Lump::ListFaces as usize];
        for f in [0u16, 1, 2, 0] {
            listfaces.write_u16::<LE>(f).unwrap();
        }

        // edge 0 unused; 1..=4 floor loop, 5..=8 ceiling loop
        let edges = &mut lumps[Lump::Edges as usize];
        for (a, b) in [(0u16, 0u16), (0, 1), (1, 2), (2, 3), (3, 0), (4, 7), (7, 6), (6, 5), (5, 4)] {
            edges.write_u16::<LE>(a).unwrap();
            edges.write_u16::<LE>(b).unwrap();
        }

        let listedges = &mut lumps[Lump::ListEdges as usize];
        for e in [1i32, 2, 3, 4, 5, 6, 7, 8, -4, -3, -2, -1] {
            listedges.write_i32::<LE>(e).unwrap();
        }

        let models = &mut lumps[Lump::Models as usize];
        f32s(models, &[0.0, 0.0, 0.0, 64.0, 64.0, 64.0, 0.0, 0.0, 0.0]);
        for v in [0i32, 0, 0, 0, 3, 0, 3] {
            models.write_i32::<LE>(v).unwrap();
        }

        bsp_bytes(BSP_VERSION, &lumps)
    }

    #[test]
    fn record_sizes_match_directory() {
        fn check<T: Record>() {
            assert_eq!(Some(T::SIZE), T::LUMP.record_size(), "{}", T::LUMP);
        }
        check::<Vertex>();
        check::<Edge>();
        check::<BspPlane>();
        check::<TexInfo>();
        check::<Face>();
        check::<Node>();
        check::<Leaf>();
        check::<Clipnode>();
        check::<Model>();
        check::<u16>();
        check::<i32>();
    }

    #[test]
    fn opens_fixture() {
        let bsp = Bsp::from_bytes(two_room_bsp()).unwrap();
        assert_eq!(bsp.count::<Vertex>(), 8);
        assert_eq!(bsp.count::<Edge>(), 9);
        assert_eq!(bsp.count::<Face>(), 3);
        assert_eq!(bsp.vertex(6).unwrap().file_pos(), Vec3::new(64.0, 64.0, 64.0));
        assert_eq!(bsp.edge(5).unwrap(), Edge { start: 4, end: 7 });
        assert_eq!(bsp.listedge(8).unwrap(), -4);
        assert_eq!(bsp.listface(3).unwrap(), 0);

        let face = bsp.face(1).unwrap();
        assert!(face.is_back_side());
        assert_eq!(face.first_listedge, 4);

        let world = bsp.world_model().unwrap();
        assert_eq!(world.roots[0], 0);
        assert_eq!(world.face_count, 3);
        assert_eq!(bsp.models().count(), 1);
        assert_eq!(bsp.leaves().filter_map(Result::ok).map(|l| l.listface_count).sum::<u16>(), 4);

        let node = bsp.node(0).unwrap();
        assert_eq!(Child::from_raw(node.front), Some(Child::Node(1)));
        assert_eq!(Child::from_raw(node.back), Some(Child::Leaf(0)));
        assert_eq!(Child::from_raw(0), None);
    }

    #[test]
    fn plane_in_y_up() {
        let bsp = Bsp::from_bytes(two_room_bsp()).unwrap();
        let p = bsp.plane(1).unwrap().to_plane();
        assert_eq!(p, Plane::new(Vec3::Y, -64.0));
        assert_eq!(p.signed_distance(Vec3::new(0.0, 64.0, 0.0)), 0.0);
    }

    #[test]
    fn entities_lump() {
        let bsp = Bsp::from_bytes(two_room_bsp()).unwrap();
        let ents = bsp.entities().unwrap();
        assert_eq!(ents.len(), 1);
        assert_eq!(ents[0]["classname"], "worldspawn");
    }

    #[test]
    fn texture_chest() {
        let bsp = Bsp::from_bytes(two_room_bsp()).unwrap();
        assert_eq!(bsp.miptex_count().unwrap(), 3);
        let sky = bsp.miptex(1).unwrap().unwrap();
        assert_eq!((sky.name.as_str(), sky.width, sky.height), ("sky", 8, 8));
        assert!(bsp.miptex(2).unwrap().is_none());
        assert_eq!(bsp.mip_pixels(0, 2).unwrap().unwrap(), &[2u8; 16][..]);
        let img = bsp.mip_image(0, &Palette::default()).unwrap().unwrap();
        assert_eq!(img.pixel(3, 3), [255, 255, 255]);
        assert!(matches!(
            bsp.miptex(3),
            Err(BspError::IndexOutOfRange { lump: Lump::MipTex, index: 3, count: 3 })
        ));
    }

    #[test]
    fn texinfo_flags_and_axes() {
        let bsp = Bsp::from_bytes(two_room_bsp()).unwrap();
        let ti = bsp.texinfo(0).unwrap();
        assert!(!ti.tex_flags().contains(TexFlags::ANIMATED));
        assert_eq!(ti.axes().v_axis, Vec3::NEG_Y);
    }

    #[test]
    fn wrong_version() {
        let mut bytes = two_room_bsp();
        bytes[0] = 22;
        assert!(matches!(
            Bsp::from_bytes(bytes),
            Err(BspError::InvalidBspVersion(22))
        ));
    }

    #[test]
    fn index_out_of_range() {
        let bsp = Bsp::from_bytes(two_room_bsp()).unwrap();
        assert!(matches!(
            bsp.face(3),
            Err(BspError::IndexOutOfRange { lump: Lump::Faces, index: 3, count: 3 })
        ));
    }

    #[test]
    fn partial_record_lump() {
        let mut lumps: [Vec<u8>; LUMP_COUNT] = Default::default();
        lumps[Lump::Edges as usize] = vec![0; 6];
        assert!(matches!(
            Bsp::from_bytes(bsp_bytes(BSP_VERSION, &lumps)),
            Err(BspError::LumpSizeMismatch { lump: Lump::Edges, size: 6, record: 4 })
        ));
    }

    #[test]
    fn lump_past_eof() {
        let mut bytes = two_room_bsp();
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(
            Bsp::from_bytes(bytes),
            Err(BspError::LumpOutOfBounds { lump: Lump::Models })
        ));
    }

    #[test]
    fn truncated_header() {
        let err = Bsp::from_bytes(vec![23, 0, 0, 0, 1]).unwrap_err();
        assert!(matches!(err, BspError::Io(_)));
    }
}
