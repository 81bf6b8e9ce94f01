//! WAD2 texture archive reader.
//!
//! ### Layout
//! ```text
//! "WAD2"  i32 count  i32 dir_offset
//! dir[count]: i32 offset  i32 disk_size  i32 mem_size  u8 type  u8 compression  u16 pad  name[16]
//! ```
//! * `0x40` – palette, replaces the palette for every *later* texture.
//! * `0x42` – status-bar picture, recognised and skipped.
//! * `0x44` – mip texture.

use std::collections::HashMap;

use byteorder::{LittleEndian as LE, ReadBytesExt};
use std::{
    fs,
    io::{self, Read},
    path::Path,
};
use thiserror::Error;

use super::{
    miptex::{MipTex, MipTexError, name_str},
    palette::{Palette, PaletteError},
};
use crate::world::texture::Image;

/// Size (in bytes) of one directory entry.
const DIR_ENTRY_SIZE: usize = 32;
const HEADER_SIZE: usize = 12;

/// Entry type byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WadEntryKind {
    Palette,
    Picture,
    MipTex,
}

impl WadEntryKind {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x40 => Some(Self::Palette),
            0x42 => Some(Self::Picture),
            0x44 => Some(Self::MipTex),
            _ => None,
        }
    }
}

/// One directory entry.
#[derive(Clone, Debug)]
pub struct WadEntry {
    pub name: String,
    pub kind: WadEntryKind,
    pub offset: usize,
    pub disk_size: usize,
    pub mem_size: usize,
    pub compression: u8,
    /// Index into `Wad2::palettes` in effect at this directory position.
    palette: usize,
}

/// Whole archive resident in memory; pixels are decoded on request.
#[derive(Debug)]
pub struct Wad2 {
    /// Directory entries in file order.
    pub entries: Vec<WadEntry>,
    /// `palettes[0]` is the caller's; each palette entry appends one.
    palettes: Vec<Palette>,
    bytes: Vec<u8>,
    /// lowercase name → entry index (mip textures only), keyed by both the
    /// directory name and the name stored in the mip header
    by_name: HashMap<String, usize>,
}

#[derive(Error, Debug)]
pub enum Wad2Error {
    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    #[error("not a WAD2 file")]
    BadMagic,

    #[error("corrupt WAD2: directory or entry extends beyond end of file")]
    DirectoryOutOfBounds,

    #[error("entry `{name}` has unknown type {kind:#04x}")]
    UnknownWadEntryType { name: String, kind: u8 },

    #[error(transparent)]
    MipTex(#[from] MipTexError),

    #[error(transparent)]
    Palette(#[from] PaletteError),
}

fn to_usize(v: i32) -> Result<usize, Wad2Error> {
    usize::try_from(v).map_err(|_| Wad2Error::DirectoryOutOfBounds)
}

impl Wad2 {
    /// Read a whole archive from disk.
    pub fn from_file<P: AsRef<Path>>(path: P, palette: &Palette) -> Result<Self, Wad2Error> {
        Self::from_bytes(fs::read(path)?, palette)
    }

    /// Parse an in-memory archive.  `palette` is used for textures that
    /// precede any palette entry.
    pub fn from_bytes(bytes: Vec<u8>, palette: &Palette) -> Result<Self, Wad2Error> {
        /*----------- 1. header -----------------------------------------*/
        let mut cur = bytes.as_slice();
        let mut magic = [0u8; 4];
        cur.read_exact(&mut magic)?;
        if &magic != b"WAD2" {
            return Err(Wad2Error::BadMagic);
        }
        let count = to_usize(cur.read_i32::<LE>()?)?;
        let dir_offset = to_usize(cur.read_i32::<LE>()?)?;

        /*----------- 2. directory bounds -------------------------------*/
        let dir_end = count
            .checked_mul(DIR_ENTRY_SIZE)
            .and_then(|n| n.checked_add(dir_offset))
            .filter(|&end| end <= bytes.len())
            .ok_or(Wad2Error::DirectoryOutOfBounds)?;

        /*----------- 3. entries ----------------------------------------*/
        let mut palettes = vec![palette.clone()];
        let mut entries = Vec::with_capacity(count);
        let mut by_name = HashMap::new();
        let mut cursor = &bytes[dir_offset..dir_end];

        for _ in 0..count {
            let offset = to_usize(cursor.read_i32::<LE>()?)?;
            let disk_size = to_usize(cursor.read_i32::<LE>()?)?;
            let mem_size = to_usize(cursor.read_i32::<LE>()?)?;
            let kind_byte = cursor.read_u8()?;
            let compression = cursor.read_u8()?;
            let _pad = cursor.read_u16::<LE>()?;
            let mut raw_name = [0u8; 16];
            cursor.read_exact(&mut raw_name)?;
            let name = name_str(&raw_name);

            if offset
                .checked_add(disk_size)
                .is_none_or(|end| end > bytes.len())
            {
                return Err(Wad2Error::DirectoryOutOfBounds);
            }
            let kind = WadEntryKind::from_byte(kind_byte).ok_or_else(|| {
                Wad2Error::UnknownWadEntryType {
                    name: name.clone(),
                    kind: kind_byte,
                }
            })?;

            match kind {
                WadEntryKind::Palette => {
                    palettes.push(Palette::from_lmp(&bytes[offset..offset + disk_size])?);
                }
                WadEntryKind::MipTex => {
                    let header = MipTex::parse(&bytes[offset..offset + disk_size])?;
                    by_name.insert(name.to_ascii_lowercase(), entries.len());
                    by_name.insert(header.name.to_ascii_lowercase(), entries.len());
                }
                WadEntryKind::Picture => {}
            }

            entries.push(WadEntry {
                name,
                kind,
                offset,
                disk_size,
                mem_size,
                compression,
                palette: palettes.len() - 1,
            });
        }

        Ok(Self {
            entries,
            palettes,
            bytes,
            by_name,
        })
    }

    // ---------------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------------

    /// Mip-texture entry by name, ignoring ASCII case.
    pub fn find(&self, name: &str) -> Option<&WadEntry> {
        self.by_name
            .get(&name.to_ascii_lowercase())
            .map(|&i| &self.entries[i])
    }

    /// Raw bytes of `entry`.
    pub fn entry_bytes(&self, entry: &WadEntry) -> &[u8] {
        &self.bytes[entry.offset..entry.offset + entry.disk_size]
    }

    /// Number of mip textures in the archive.
    pub fn texture_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.kind == WadEntryKind::MipTex)
            .count()
    }

    /// Header of the named texture (dimensions drive MAP texture projection).
    pub fn texture(&self, name: &str) -> Result<Option<MipTex>, Wad2Error> {
        self.find(name)
            .map(|e| MipTex::parse(self.entry_bytes(e)).map_err(Wad2Error::from))
            .transpose()
    }

    /// Level-0 pixels of the named texture expanded to RGB with the palette
    /// in effect at its directory position.
    pub fn image(&self, name: &str) -> Result<Option<Image>, Wad2Error> {
        let Some(entry) = self.find(name) else {
            return Ok(None);
        };
        let bytes = self.entry_bytes(entry);
        let mip = MipTex::parse(bytes)?;
        Ok(Some(mip.decode(bytes, 0, &self.palettes[entry.palette])?))
    }
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
