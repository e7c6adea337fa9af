//! Accumulated raster between frames and the pixel operations on it

use image::{Rgba, RgbaImage};
use imgseq_utils::{
    DimensionTooLargerError, IndexOrColor, IndexedImage, PixelEncoding, Raster, SafeConversion,
    SubFrame, TRANSPARENT,
};

/// Rectangle on the canvas, already clipped to its bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Clips the rectangle at `(x, y)` to a canvas of the given size
    ///
    /// The resulting size is `min(width, canvas_width - x)` by
    /// `min(height, canvas_height - y)`, or empty if the origin is outside.
    pub fn clipped(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        canvas_width: u32,
        canvas_height: u32,
    ) -> Self {
        Self {
            x,
            y,
            width: width.min(canvas_width.saturating_sub(x)),
            height: height.min(canvas_height.saturating_sub(y)),
        }
    }

    /// Region of `subframe` on a canvas with the given size
    pub fn of_subframe(subframe: &SubFrame, canvas_width: u32, canvas_height: u32) -> Self {
        Self::clipped(
            subframe.x,
            subframe.y,
            subframe.width(),
            subframe.height(),
            canvas_width,
            canvas_height,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn rows(&self) -> (usize, usize) {
        (
            self.y.try_usize().unwrap_or(usize::MAX),
            self.height.try_usize().unwrap_or(0),
        )
    }

    fn columns(&self) -> (usize, usize) {
        (
            self.x.try_usize().unwrap_or(usize::MAX),
            self.width.try_usize().unwrap_or(0),
        )
    }
}

/// The composited image an animation builds upon
///
/// A canvas starts out uninitialized. The first composited sub-frame decides
/// its encoding, while the size comes from the size hint if one was given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Canvas {
    raster: Option<Raster>,
    size_hint: Option<(u32, u32)>,
}

impl Canvas {
    /// Uninitialized canvas that takes the size of the first sub-frame
    pub fn new() -> Self {
        Self::default()
    }

    /// Uninitialized canvas that will have the given size
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            raster: None,
            size_hint: Some((width, height)),
        }
    }

    pub fn from_raster(raster: Raster) -> Self {
        Self {
            raster: Some(raster),
            size_hint: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.raster.is_some()
    }

    pub fn raster(&self) -> Option<&Raster> {
        self.raster.as_ref()
    }

    pub fn into_raster(self) -> Option<Raster> {
        self.raster
    }

    pub fn encoding(&self) -> Option<PixelEncoding> {
        self.raster.as_ref().map(Raster::encoding)
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.raster.as_ref().map(Raster::dimensions)
    }

    /// Returns the raster, creating it from `first` if necessary
    ///
    /// A new raster has the encoding of `first` and is filled with
    /// `background`. Indexed canvases fall back to RGBA if the background
    /// can't be expressed with the palette of `first`.
    pub(crate) fn materialize(
        self,
        first: &SubFrame,
        background: &IndexOrColor,
    ) -> Result<Raster, DimensionTooLargerError> {
        if let Some(raster) = self.raster {
            return Ok(raster);
        }

        let (width, height) = self.size_hint.unwrap_or(first.raster.dimensions());
        tracing::debug!(
            "Initializing {width}x{height} canvas as {:?}",
            first.raster.encoding()
        );

        if let Raster::Indexed(img) = &first.raster {
            if let Some(index) = background.index_in(img.palette()) {
                return IndexedImage::filled(width, height, img.palette().clone(), index)
                    .map(Raster::Indexed)
                    .map_err(|_| DimensionTooLargerError);
            }
            tracing::debug!("Background not in palette, starting with RGBA canvas");
        }

        Ok(Raster::Rgba(RgbaImage::from_pixel(
            width,
            height,
            background.color(),
        )))
    }
}

impl From<Raster> for Canvas {
    fn from(raster: Raster) -> Self {
        Self::from_raster(raster)
    }
}

/// Fills `region` with `background`
///
/// Indexed rasters are promoted to RGBA if the background has no entry in
/// their palette.
pub fn fill_region(raster: &mut Raster, region: Region, background: &IndexOrColor) {
    if let Raster::Indexed(img) = raster {
        if let Some(index) = background.index_in(img.palette()) {
            fill_indexed(img, region, index);
            return;
        }

        tracing::debug!("Background not in palette, promoting canvas to RGBA");
        let promoted = img.to_rgba(None);
        *raster = Raster::Rgba(promoted);
    }

    if let Raster::Rgba(img) = raster {
        fill_rgba(img, region, background.color());
    }
}

fn fill_indexed(img: &mut IndexedImage, region: Region, index: u8) {
    let Ok(width) = img.width().try_usize() else {
        return;
    };
    if width == 0 || region.is_empty() {
        return;
    }

    let (y, height) = region.rows();
    let (x, columns) = region.columns();

    for row in img.pixels_mut().chunks_exact_mut(width).skip(y).take(height) {
        for px in row.iter_mut().skip(x).take(columns) {
            *px = index;
        }
    }
}

fn fill_rgba(img: &mut RgbaImage, region: Region, color: Rgba<u8>) {
    if region.is_empty() {
        return;
    }

    let (y, height) = region.rows();
    let (x, columns) = region.columns();

    for row in img.rows_mut().skip(y).take(height) {
        for px in row.skip(x).take(columns) {
            *px = color;
        }
    }
}

/// Copies the indices of `src` onto `dst` at `(x, y)`
///
/// Pixels equal to `skip` are left untouched. Both images must share the
/// same palette. Everything outside of `dst` is clipped.
pub fn copy_indices(dst: &mut IndexedImage, src: &IndexedImage, x: u32, y: u32, skip: Option<u8>) {
    let (Ok(dst_width), Ok(src_width)) = (dst.width().try_usize(), src.width().try_usize()) else {
        return;
    };
    if dst_width == 0 || src_width == 0 {
        return;
    }
    let (Ok(x), Ok(y)) = (x.try_usize(), y.try_usize()) else {
        return;
    };

    let dst_rows = dst.pixels_mut().chunks_exact_mut(dst_width).skip(y);
    for (dst_row, src_row) in dst_rows.zip(src.pixels().chunks_exact(src_width)) {
        for (px, index) in dst_row.iter_mut().skip(x).zip(src_row) {
            if Some(*index) != skip {
                *px = *index;
            }
        }
    }
}

/// Writes `src` onto `dst` at `(x, y)`, either replacing or blending
pub fn draw_rgba(dst: &mut RgbaImage, src: &RgbaImage, x: u32, y: u32, blend: bool) {
    if dst.width() == 0 || src.width() == 0 {
        return;
    }
    let (Ok(x), Ok(y)) = (x.try_usize(), y.try_usize()) else {
        return;
    };

    for (dst_row, src_row) in dst.rows_mut().skip(y).zip(src.rows()) {
        for (px, color) in dst_row.skip(x).zip(src_row) {
            *px = if blend { over(*px, *color) } else { *color };
        }
    }
}

/// Non-premultiplied "source over destination"
pub fn over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let src_alpha = u32::from(src[3]);
    if src_alpha == u32::from(u8::MAX) {
        return src;
    }
    if src_alpha == 0 {
        return dst;
    }

    // All weights are scaled by 255
    let src_weight = src_alpha.saturating_mul(255);
    let dst_weight = u32::from(dst[3]).saturating_mul(255u32.saturating_sub(src_alpha));
    let out_alpha = src_weight.saturating_add(dst_weight);
    if out_alpha == 0 {
        return TRANSPARENT;
    }

    let rounded_div = |num: u32, den: u32| -> u8 {
        let half = den.checked_div(2).unwrap_or_default();
        let value = num
            .saturating_add(half)
            .checked_div(den)
            .unwrap_or_default();
        u8::try_from(value).unwrap_or(u8::MAX)
    };

    let channel = |i: usize| {
        let num = u32::from(src[i])
            .saturating_mul(src_weight)
            .saturating_add(u32::from(dst[i]).saturating_mul(dst_weight));
        rounded_div(num, out_alpha)
    };

    Rgba([channel(0), channel(1), channel(2), rounded_div(out_alpha, 255)])
}
