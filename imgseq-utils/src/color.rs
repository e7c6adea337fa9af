use image::Rgba;

use crate::raster::{Palette, TRANSPARENT};

/// Either a palette index with its resolved color, or a direct color
///
/// Used for the transparent and background colors so that indexed and
/// truecolor code paths can share one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOrColor {
    index: Option<u8>,
    color: Rgba<u8>,
}

impl IndexOrColor {
    /// Resolves `index` against `palette`
    ///
    /// Indices outside of `0..=255` carry no index at all. Indices that are
    /// representable but not present in the palette keep the index and
    /// resolve to transparent black.
    pub fn from_index(index: i32, palette: &Palette) -> Self {
        match u8::try_from(index) {
            Ok(index) => Self {
                index: Some(index),
                color: palette.get(index).unwrap_or(TRANSPARENT),
            },
            Err(_) => Self::transparent(),
        }
    }

    pub const fn from_color(color: Rgba<u8>) -> Self {
        Self { index: None, color }
    }

    /// Direct fully transparent black
    pub const fn transparent() -> Self {
        Self::from_color(TRANSPARENT)
    }

    pub fn index(&self) -> Option<u8> {
        self.index
    }

    pub fn color(&self) -> Rgba<u8> {
        self.color
    }

    /// Index that denotes this color in `palette`
    ///
    /// Prefers the stored index if it addresses the same color, otherwise
    /// looks for an entry with exactly the same color.
    pub fn index_in(&self, palette: &Palette) -> Option<u8> {
        match self.index {
            Some(index) if palette.get(index) == Some(self.color) => Some(index),
            _ => palette.position(self.color),
        }
    }
}

impl Default for IndexOrColor {
    fn default() -> Self {
        Self::transparent()
    }
}

impl From<Rgba<u8>> for IndexOrColor {
    fn from(color: Rgba<u8>) -> Self {
        Self::from_color(color)
    }
}
