//! Pixel buffers exchanged between decoders and the compositor

use image::{Rgba, RgbaImage};

use crate::error::{DecoderError, DimensionTooLargerError};
use crate::save_math::{SafeConversion, SafeMath};

/// Maximum number of entries an indexed image can address
pub const MAX_PALETTE_LEN: usize = 256;

/// Fully transparent black
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Pixel encoding of a [`Raster`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelEncoding {
    /// One byte per pixel, addressing a palette
    Indexed8,
    /// Four bytes per pixel, non-premultiplied RGBA
    Rgba32,
}

impl PixelEncoding {
    pub const fn n_bytes(self) -> usize {
        match self {
            Self::Indexed8 => 1,
            Self::Rgba32 => 4,
        }
    }
}

/// Ordered color table of an indexed image
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Palette {
    entries: Vec<Rgba<u8>>,
}

impl Palette {
    pub fn new(entries: Vec<Rgba<u8>>) -> Result<Self, DecoderError> {
        if entries.len() > MAX_PALETTE_LEN {
            return Err(DecoderError::LoadingError(format!(
                "Palette has {} entries, at most {MAX_PALETTE_LEN} are possible",
                entries.len()
            )));
        }

        Ok(Self { entries })
    }

    /// Builds an opaque palette from packed RGB triplets
    ///
    /// Trailing bytes that do not form a full triplet are ignored.
    pub fn from_rgb(rgb: &[u8]) -> Result<Self, DecoderError> {
        Self::new(
            rgb.chunks_exact(3)
                .map(|c| Rgba([c[0], c[1], c[2], u8::MAX]))
                .collect(),
        )
    }

    pub fn get(&self, index: u8) -> Option<Rgba<u8>> {
        self.entries.get(usize::from(index)).copied()
    }

    /// Index of the first entry with exactly this color
    pub fn position(&self, color: Rgba<u8>) -> Option<u8> {
        self.entries
            .iter()
            .position(|entry| *entry == color)
            .and_then(|i| u8::try_from(i).ok())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Rgba<u8>] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [Rgba<u8>] {
        &mut self.entries
    }

    /// Copy of the palette where `transparent` is fully transparent
    pub fn with_transparent(&self, transparent: Option<u8>) -> Palette {
        let mut palette = self.clone();
        if let Some(entry) = transparent.and_then(|i| palette.entries.get_mut(usize::from(i))) {
            *entry = TRANSPARENT;
        }
        palette
    }

    /// Extends the palette with transparent entries until every pixel in
    /// `pixels` addresses an entry
    pub fn cover_pixels(&mut self, pixels: &[u8]) {
        let Some(max) = pixels.iter().max() else {
            return;
        };
        let needed = usize::from(*max).saturating_add(1);
        if needed > self.entries.len() {
            self.entries.resize(needed, TRANSPARENT);
        }
    }
}

/// Palette-indexed image with one byte per pixel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedImage {
    width: u32,
    height: u32,
    palette: Palette,
    pixels: Vec<u8>,
}

impl IndexedImage {
    /// Creates an indexed image
    ///
    /// Fails if the buffer does not hold exactly `width * height` pixels or
    /// if any pixel does not address an entry of the palette.
    pub fn new(
        width: u32,
        height: u32,
        palette: Palette,
        pixels: Vec<u8>,
    ) -> Result<Self, DecoderError> {
        let n_pixels = width.try_usize()?.smul(height.try_usize()?)?;
        if pixels.len() != n_pixels {
            return Err(DecoderError::LoadingError(format!(
                "Indexed buffer has {} pixels, expected {width}x{height}",
                pixels.len()
            )));
        }

        if let Some(invalid) = pixels
            .iter()
            .find(|index| usize::from(**index) >= palette.len())
        {
            return Err(DecoderError::LoadingError(format!(
                "Pixel index {invalid} outside of palette with {} entries",
                palette.len()
            )));
        }

        Ok(Self {
            width,
            height,
            palette,
            pixels,
        })
    }

    /// Image where every pixel is `index`
    pub fn filled(
        width: u32,
        height: u32,
        palette: Palette,
        index: u8,
    ) -> Result<Self, DecoderError> {
        let n_pixels = width.try_usize()?.smul(height.try_usize()?)?;
        Self::new(width, height, palette, vec![index; n_pixels])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable pixel access
    ///
    /// Callers must only write indices that are valid for [`Self::palette`].
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Mutable palette access for color transformations
    ///
    /// The number of entries can't be changed through this.
    pub fn palette_entries_mut(&mut self) -> &mut [Rgba<u8>] {
        self.palette.entries_mut()
    }

    pub fn index_at(&self, x: u32, y: u32) -> Option<u8> {
        let i = self.offset(x, y)?;
        self.pixels.get(i).copied()
    }

    pub fn color_at(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        self.index_at(x, y).and_then(|i| self.palette.get(i))
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let row = usize::try_from(y).ok()?.checked_mul(self.width.try_usize().ok()?)?;
        row.checked_add(usize::try_from(x).ok()?)
    }

    /// Expands to RGBA, `transparent` becoming fully transparent
    pub fn to_rgba(&self, transparent: Option<u8>) -> RgbaImage {
        let palette = self.palette.with_transparent(transparent);
        let mut out = RgbaImage::new(self.width, self.height);
        for (dst, index) in out.pixels_mut().zip(&self.pixels) {
            *dst = palette.get(*index).unwrap_or(TRANSPARENT);
        }
        out
    }

    pub fn n_bytes(&self) -> Result<u64, DimensionTooLargerError> {
        let palette_bytes = self.palette.len().try_u64()?.smul(4)?;
        self.pixels.len().try_u64()?.sadd(palette_bytes)
    }
}

/// Image data in one of the supported encodings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Raster {
    Indexed(IndexedImage),
    Rgba(RgbaImage),
}

impl Raster {
    pub fn width(&self) -> u32 {
        match self {
            Self::Indexed(img) => img.width(),
            Self::Rgba(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::Indexed(img) => img.height(),
            Self::Rgba(img) => img.height(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn encoding(&self) -> PixelEncoding {
        match self {
            Self::Indexed(_) => PixelEncoding::Indexed8,
            Self::Rgba(_) => PixelEncoding::Rgba32,
        }
    }

    pub fn palette(&self) -> Option<&Palette> {
        match self {
            Self::Indexed(img) => Some(img.palette()),
            Self::Rgba(_) => None,
        }
    }

    /// Color of the pixel, resolved through the palette for indexed images
    pub fn color_at(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        match self {
            Self::Indexed(img) => img.color_at(x, y),
            Self::Rgba(img) => img.get_pixel_checked(x, y).copied(),
        }
    }

    /// Converts to RGBA, keeping RGBA data as it is
    pub fn into_rgba(self, transparent: Option<u8>) -> RgbaImage {
        match self {
            Self::Indexed(img) => img.to_rgba(transparent),
            Self::Rgba(img) => img,
        }
    }

    /// Approximate memory used by the pixel data
    pub fn n_bytes(&self) -> Result<u64, DimensionTooLargerError> {
        match self {
            Self::Indexed(img) => img.n_bytes(),
            Self::Rgba(img) => img.as_raw().len().try_u64(),
        }
    }
}

impl From<IndexedImage> for Raster {
    fn from(img: IndexedImage) -> Self {
        Self::Indexed(img)
    }
}

impl From<RgbaImage> for Raster {
    fn from(img: RgbaImage) -> Self {
        Self::Rgba(img)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn two_colors() -> Palette {
        Palette::new(vec![Rgba([0, 0, 0, 255]), Rgba([255, 255, 255, 255])]).unwrap()
    }

    #[test]
    fn palette_size_is_limited() {
        assert!(Palette::new(vec![TRANSPARENT; 256]).is_ok());
        assert!(Palette::new(vec![TRANSPARENT; 257]).is_err());
    }

    #[test]
    fn palette_from_rgb_is_opaque() {
        let palette = Palette::from_rgb(&[1, 2, 3, 4, 5, 6, 7]).unwrap();
        assert_eq!(palette.len(), 2);
        assert_eq!(palette.get(1), Some(Rgba([4, 5, 6, 255])));
        assert_eq!(palette.get(2), None);
    }

    #[test]
    fn indexed_rejects_out_of_palette_pixels() {
        assert!(IndexedImage::new(2, 1, two_colors(), vec![0, 1]).is_ok());
        assert!(IndexedImage::new(2, 1, two_colors(), vec![0, 2]).is_err());
        assert!(IndexedImage::new(2, 2, two_colors(), vec![0, 1]).is_err());
    }

    #[test]
    fn palette_covers_stray_indices() {
        let mut palette = two_colors();
        palette.cover_pixels(&[0, 1, 3]);
        assert_eq!(palette.len(), 4);
        assert_eq!(palette.get(2), Some(TRANSPARENT));
        assert_eq!(palette.get(3), Some(TRANSPARENT));

        let mut palette = two_colors();
        palette.cover_pixels(&[1, 0]);
        assert_eq!(palette, two_colors());

        let mut palette = Palette::default();
        palette.cover_pixels(&[255]);
        assert_eq!(palette.len(), MAX_PALETTE_LEN);
    }

    #[test]
    fn expansion_applies_transparent_index() {
        let img = IndexedImage::new(2, 1, two_colors(), vec![0, 1]).unwrap();
        let rgba = img.to_rgba(Some(1));
        assert_eq!(*rgba.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(*rgba.get_pixel(1, 0), TRANSPARENT);

        let opaque = img.to_rgba(None);
        assert_eq!(*opaque.get_pixel(1, 0), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn byte_size_includes_palette() {
        let img = IndexedImage::filled(3, 3, two_colors(), 0).unwrap();
        assert_eq!(Raster::from(img).n_bytes(), Ok(9 + 8));
        assert_eq!(Raster::from(RgbaImage::new(3, 3)).n_bytes(), Ok(36));
    }
}
