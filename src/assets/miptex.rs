//! Mip textures: the palette-indexed texture format shared by BSP texture
//! chests and WAD2 archives.
//!
//! ```text
//! name[16]  width  height  offset[4]   (40 bytes, offsets relative to header)
//! ```

use bincode::Decode;
use thiserror::Error;

use super::{decode_record, palette::Palette};
use crate::world::texture::Image;

/// Number of stored mip levels.
pub const MIP_LEVELS: usize = 4;

/// On-disk header.
#[repr(C)]
#[derive(Clone, Copy, Decode, Debug)]
pub struct RawMipTex {
    pub name: [u8; 16],
    pub width: u32,
    pub height: u32,
    pub offsets: [u32; MIP_LEVELS],
}

/// Decoded header, name trimmed at the first NUL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MipTex {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub offsets: [u32; MIP_LEVELS],
}

#[derive(Error, Debug)]
pub enum MipTexError {
    #[error("mip texture header truncated: {0}")]
    Header(#[from] bincode::error::DecodeError),

    #[error("mip level {level} of `{name}` lies outside its lump")]
    TextureOutOfBounds { name: String, level: usize },

    #[error("mip level {0} does not exist")]
    BadLevel(usize),
}

/// Return the text of a fixed-size, NUL-padded name.
pub fn name_str(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

impl From<RawMipTex> for MipTex {
    fn from(r: RawMipTex) -> Self {
        MipTex {
            name: name_str(&r.name),
            width: r.width,
            height: r.height,
            offsets: r.offsets,
        }
    }
}

impl MipTex {
    /// Parse the header at the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, MipTexError> {
        Ok(decode_record::<RawMipTex>(bytes)?.into())
    }

    /// `(width, height)` of mip `level`.
    pub fn level_size(&self, level: usize) -> (usize, usize) {
        ((self.width >> level) as usize, (self.height >> level) as usize)
    }

    /// Palette indices of mip `level`; `bytes` starts at the header.
    pub fn pixels<'a>(&self, bytes: &'a [u8], level: usize) -> Result<&'a [u8], MipTexError> {
        if level >= MIP_LEVELS {
            return Err(MipTexError::BadLevel(level));
        }
        let (w, h) = self.level_size(level);
        let start = self.offsets[level] as usize;
        bytes
            .get(start..start + w * h)
            .ok_or_else(|| MipTexError::TextureOutOfBounds {
                name: self.name.clone(),
                level,
            })
    }

    /// Expand mip `level` through `palette` into an RGB image.
    pub fn decode(
        &self,
        bytes: &[u8],
        level: usize,
        palette: &Palette,
    ) -> Result<Image, MipTexError> {
        let (w, h) = self.level_size(level);
        let indices = self.pixels(bytes, level)?;
        Ok(Image::from_indexed(self.name.clone(), w, h, indices, palette))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use byteorder::{LittleEndian as LE, WriteBytesExt};

    /// Header + all four levels; level 0 filled with `fill`.
    pub(crate) fn miptex_bytes(name: &str, w: u32, h: u32, fill: u8) -> Vec<u8> {
        let mut out = Vec::new();
        let mut raw_name = [0u8; 16];
        raw_name[..name.len()].copy_from_slice(name.as_bytes());
        out.extend_from_slice(&raw_name);
        out.write_u32::<LE>(w).unwrap();
        out.write_u32::<LE>(h).unwrap();
        let mut offset = 40u32;
        let mut sizes = Vec::new();
        for level in 0..MIP_LEVELS {
            out.write_u32::<LE>(offset).unwrap();
            let size = (w >> level) * (h >> level);
            sizes.push(size);
            offset += size;
        }
        for (level, size) in sizes.into_iter().enumerate() {
            let value = if level == 0 { fill } else { level as u8 };
            out.extend(std::iter::repeat_n(value, size as usize));
        }
        out
    }

    #[test]
    fn header_and_levels() {
        let bytes = miptex_bytes("wall1", 16, 8, 254);
        let mip = MipTex::parse(&bytes).unwrap();
        assert_eq!(mip.name, "wall1");
        assert_eq!((mip.width, mip.height), (16, 8));
        assert_eq!(mip.offsets[0], 40);

        assert_eq!(mip.pixels(&bytes, 0).unwrap().len(), 128);
        assert_eq!(mip.pixels(&bytes, 1).unwrap(), &[1u8; 32][..]);
        assert_eq!(mip.pixels(&bytes, 3).unwrap().len(), 2);

        let img = mip.decode(&bytes, 0, &Palette::default()).unwrap();
        assert_eq!((img.width, img.height), (16, 8));
        assert_eq!(img.pixel(15, 7), [255, 255, 255]);
    }

    #[test]
    fn truncated_pixels_rejected() {
        let mut bytes = miptex_bytes("short", 8, 8, 0);
        bytes.truncate(60);
        let mip = MipTex::parse(&bytes).unwrap();
        assert!(matches!(
            mip.pixels(&bytes, 0),
            Err(MipTexError::TextureOutOfBounds { level: 0, .. })
        ));
        assert!(matches!(mip.pixels(&bytes, 4), Err(MipTexError::BadLevel(4))));
    }

    #[test]
    fn truncated_header_rejected() {
        assert!(matches!(MipTex::parse(&[0u8; 12]), Err(MipTexError::Header(_))));
    }
}
