use crate::color::IndexOrColor;
use crate::raster::Raster;

/// How a sub-frame's pixels combine with the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// Sub-frame pixels overwrite the canvas, transparency included
    #[default]
    Replace,
    /// Sub-frame pixels are composited over the canvas
    Overlay,
}

/// How the canvas is prepared for the next frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisposeMode {
    /// Keep the composited frame
    #[default]
    None,
    /// Clear the sub-frame's rectangle to the background
    ToBackground,
    /// Restore the canvas from before this sub-frame
    RevertToPrevious,
}

/// Delay in the unit the container stores it in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RawDelay {
    /// GIF style hundredths of a second
    Centiseconds(u16),
    /// APNG style fraction of a second
    Fraction { numerator: u16, denominator: u16 },
    Milliseconds(u32),
    #[default]
    Unspecified,
}

/// Decoded rectangular patch and its placement on the canvas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubFrame {
    pub raster: Raster,
    pub x: u32,
    pub y: u32,
}

impl SubFrame {
    pub fn new(raster: impl Into<Raster>, x: u32, y: u32) -> Self {
        Self {
            raster: raster.into(),
            x,
            y,
        }
    }

    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }
}

/// Everything a decoder reports for one sub-frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSubFrame {
    pub subframe: SubFrame,
    pub blend: BlendMode,
    pub dispose: DisposeMode,
    /// Palette entry that is not drawn, for indexed sub-frames
    pub transparent: Option<IndexOrColor>,
    pub delay: RawDelay,
}

impl DecodedSubFrame {
    /// Sub-frame that replaces the whole image, as used for still images
    pub fn still(raster: impl Into<Raster>) -> Self {
        Self {
            subframe: SubFrame::new(raster, 0, 0),
            blend: BlendMode::Replace,
            dispose: DisposeMode::None,
            transparent: None,
            delay: RawDelay::Unspecified,
        }
    }
}
