//! Combines sub-frames with the canvas into displayable frames
//!
//! [`composite`] is a pure function: it takes the canvas from before the
//! sub-frame and returns both the frame to display and the canvas for the
//! next sub-frame. The decision between the available strategies happens in
//! this order:
//!
//! 1. A sub-frame that covers the whole canvas and either replaces it or has
//!    no transparency is emitted as it is.
//! 2. Indexed sub-frames on an indexed canvas with an identical palette are
//!    merged in index space.
//! 3. Everything else is merged as RGBA. From then on the canvas stays RGBA.

use std::borrow::Cow;

use image::RgbaImage;
use imgseq_utils::{
    BlendMode, DimensionTooLargerError, DisposeMode, IndexOrColor, Raster, SubFrame,
};

use crate::canvas::{self, Canvas, Region};

/// Directives for compositing one sub-frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompositeParams {
    pub blend: BlendMode,
    pub dispose: DisposeMode,
    /// Palette entry of an indexed sub-frame that is not drawn
    pub transparent: Option<IndexOrColor>,
    /// Color for new canvases and for [`DisposeMode::ToBackground`]
    pub background: IndexOrColor,
}

/// Result of [`composite`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composited {
    /// Frame to display
    pub frame: Raster,
    /// Canvas to composite the next sub-frame on
    pub canvas: Canvas,
}

/// Composites `subframe` onto `canvas`
///
/// Placements outside of the canvas are clipped. The only possible error is
/// a canvas size that can't be allocated on this system.
pub fn composite(
    canvas: Canvas,
    subframe: &SubFrame,
    params: &CompositeParams,
) -> Result<Composited, DimensionTooLargerError> {
    let previous = canvas.materialize(subframe, &params.background)?;
    let (width, height) = previous.dimensions();
    let transparent = transparent_index(subframe, params);

    let frame = if covers(subframe, width, height)
        && (params.blend == BlendMode::Replace || !has_transparency(subframe, transparent))
    {
        tracing::trace!("Sub-frame replaces the whole canvas");
        full_replace(&previous, subframe, transparent)
    } else {
        match (&previous, &subframe.raster) {
            (Raster::Indexed(dst), Raster::Indexed(src)) if dst.palette() == src.palette() => {
                let skip = match params.blend {
                    BlendMode::Replace => None,
                    BlendMode::Overlay => transparent,
                };
                let mut out = dst.clone();
                canvas::copy_indices(&mut out, src, subframe.x, subframe.y, skip);
                Raster::Indexed(out)
            }
            (canvas_raster, subframe_raster) => {
                if canvas_raster.palette().is_some() && subframe_raster.palette().is_some() {
                    tracing::debug!("Palettes differ, compositing as RGBA");
                }
                truecolor(&previous, subframe, transparent, params.blend)
            }
        }
    };

    let canvas = match params.dispose {
        DisposeMode::None => Canvas::from_raster(frame.clone()),
        DisposeMode::ToBackground => {
            let mut next = frame.clone();
            let region = Region::of_subframe(subframe, width, height);
            canvas::fill_region(&mut next, region, &params.background);
            Canvas::from_raster(next)
        }
        DisposeMode::RevertToPrevious => Canvas::from_raster(previous),
    };

    Ok(Composited { frame, canvas })
}

/// Transparent index, only meaningful for indexed sub-frames
fn transparent_index(subframe: &SubFrame, params: &CompositeParams) -> Option<u8> {
    match subframe.raster {
        Raster::Indexed(_) => params.transparent.and_then(|t| t.index()),
        Raster::Rgba(_) => None,
    }
}

fn covers(subframe: &SubFrame, width: u32, height: u32) -> bool {
    subframe.x == 0 && subframe.y == 0 && subframe.raster.dimensions() == (width, height)
}

fn has_transparency(subframe: &SubFrame, transparent: Option<u8>) -> bool {
    match &subframe.raster {
        Raster::Indexed(_) => transparent.is_some(),
        Raster::Rgba(img) => img.pixels().any(|px| px[3] != u8::MAX),
    }
}

fn full_replace(previous: &Raster, subframe: &SubFrame, transparent: Option<u8>) -> Raster {
    match (previous, &subframe.raster) {
        (Raster::Rgba(_), Raster::Indexed(img)) => Raster::Rgba(img.to_rgba(transparent)),
        (_, raster) => raster.clone(),
    }
}

fn truecolor(
    previous: &Raster,
    subframe: &SubFrame,
    transparent: Option<u8>,
    blend: BlendMode,
) -> Raster {
    let mut out = previous.clone().into_rgba(None);
    let src: Cow<RgbaImage> = match &subframe.raster {
        Raster::Indexed(img) => Cow::Owned(img.to_rgba(transparent)),
        Raster::Rgba(img) => Cow::Borrowed(img),
    };

    canvas::draw_rgba(
        &mut out,
        &src,
        subframe.x,
        subframe.y,
        blend == BlendMode::Overlay,
    );

    Raster::Rgba(out)
}
