// Format-agnostic repository of decoded textures.
// Loaders register each image once and stamp the returned `TextureId` on
// every batch drawn with it; the scene resolves ids back to images.

use std::collections::HashMap;

use crate::assets::palette::Palette;

/// Runtime handle for a texture in this bank.
///
/// *Guaranteed* to remain stable for the lifetime of the bank.
pub type TextureId = u16;

/// `TextureId` whose pixels are the checkerboard fallback.
/// Always = 0 because `TextureBank::new()` inserts it first.
pub const NO_TEXTURE: TextureId = 0;

/// Name under which the fallback is registered.
pub const MISSING_NAME: &str = "MISSING";

/// Tightly packed 24-bit RGB, row-major, top row first.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub name: String,
    pub width: usize,
    pub height: usize,
    /// `width * height * 3` bytes.
    pub rgb: Vec<u8>,
}

impl Image {
    /// Expand palette indices into RGB.
    pub fn from_indexed(
        name: impl Into<String>,
        width: usize,
        height: usize,
        indices: &[u8],
        palette: &Palette,
    ) -> Self {
        let mut rgb = Vec::with_capacity(indices.len() * 3);
        for &i in indices {
            rgb.extend_from_slice(&palette[i as usize]);
        }
        Image {
            name: name.into(),
            width,
            height,
            rgb,
        }
    }

    /// Colour of the texel at `(x, y)`.
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let o = (y * self.width + x) * 3;
        [self.rgb[o], self.rgb[o + 1], self.rgb[o + 2]]
    }

    /// Convenience checkerboard 8×8 (dark/light grey of `palette`).
    pub fn checker(palette: &Palette) -> Self {
        const LIGHT_IDX: u8 = 8;
        const DARK_IDX: u8 = 16;
        let mut pix = vec![0u8; 8 * 8];
        for y in 0..8 {
            for x in 0..8 {
                pix[y * 8 + x] = if (x ^ y) & 1 == 0 {
                    LIGHT_IDX
                } else {
                    DARK_IDX
                };
            }
        }
        Image::from_indexed(MISSING_NAME, 8, 8, &pix, palette)
    }
}

/// Things that can go wrong when using the bank.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextureError {
    /// Attempted to insert a second texture with an existing name.
    #[error("texture name `{0}` already present in bank")]
    Duplicate(String),

    /// Requested ID is outside `0 .. bank.len()`.
    #[error("texture id {0} out of range")]
    BadId(TextureId),

    /// Bank already holds `TextureId::MAX + 1` textures.
    #[error("texture bank full")]
    Full,
}

/// A palette-agnostic, format-agnostic cache of textures.
///
/// * Does **not** know about WADs or BSPs; the loaders fill it.
/// * Stores exactly one copy of every name.
/// * ID **0** is always the “missing” checkerboard.
pub struct TextureBank {
    by_name: HashMap<String, TextureId>,
    data: Vec<Image>,
}

impl TextureBank {
    // ---------------------------------------------------------------------
    // Constructors
    // ---------------------------------------------------------------------

    /// Create an empty bank with a mandatory *missing* texture used as
    /// fallback.  The texture is inserted under the fixed name `"MISSING"`
    /// and obtains the handle **0**.
    pub fn new(missing_tex: Image) -> Self {
        let mut by_name = HashMap::new();
        by_name.insert(MISSING_NAME.into(), NO_TEXTURE);
        Self {
            by_name,
            data: vec![missing_tex],
        }
    }

    pub fn with_checker(palette: &Palette) -> Self {
        Self::new(Image::checker(palette))
    }

    // ---------------------------------------------------------------------
    // Query helpers
    // ---------------------------------------------------------------------

    /// Number of textures stored (including the “missing” one).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` while only the checkerboard is stored.
    pub fn is_empty(&self) -> bool {
        self.data.len() == 1
    }

    /// Obtain the id for a *loaded* texture by name.
    /// Returns `None` if the name is unknown.
    pub fn id(&self, name: &str) -> Option<TextureId> {
        self.by_name.get(name).copied()
    }

    /// Borrow a texture by id, with bounds-checking.
    pub fn texture(&self, id: TextureId) -> Result<&Image, TextureError> {
        self.data.get(id as usize).ok_or(TextureError::BadId(id))
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    /// Insert a texture under `name`.
    ///
    /// * Returns the newly assigned `TextureId`.
    /// * Fails if the name already exists (`Duplicate`).
    pub fn insert<S: Into<String>>(&mut self, name: S, tex: Image) -> Result<TextureId, TextureError> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(TextureError::Duplicate(name));
        }
        let id = TextureId::try_from(self.data.len()).map_err(|_| TextureError::Full)?;
        self.data.push(tex);
        self.by_name.insert(name, id);
        Ok(id)
    }
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
