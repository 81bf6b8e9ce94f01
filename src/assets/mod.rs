//! File formats: `.MAP` text, BSP v23, WAD2 archives, mip textures,
//! palettes, plus the load pipelines that turn them into meshes.

pub mod bsp;
pub mod entities;
pub mod loader;
pub mod map;
pub mod miptex;
pub mod palette;
pub mod wad2;

use bincode::{Decode, config, decode_from_slice, error::DecodeError};

/// Decode one little-endian, fixed-width record from the start of `bytes`.
pub(crate) fn decode_record<T>(bytes: &[u8]) -> Result<T, DecodeError>
where
    T: Decode<()>,
{
    let cfg = config::standard()
        .with_fixed_int_encoding()
        .with_little_endian();
    decode_from_slice::<T, _>(bytes, cfg).map(|(val, _read)| val)
}

pub use bsp::{Bsp, BspError};
pub use loader::{LoadError, LoadOptions, LoadedLevel, load_bsp, load_bsp_file, load_map, load_map_file};
pub use map::{Map, MapError};
pub use palette::Palette;
pub use wad2::{Wad2, Wad2Error};
