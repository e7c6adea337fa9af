//! Utilities for building imgseq decoders
//!
//! Decoders translate a container format into [`SequenceInfo`] and a stream
//! of [`DecodedSubFrame`]s. The pixel data is handed over as a [`Raster`],
//! either palette-indexed or RGBA.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod color;
pub mod decoder;
pub mod error;
pub mod raster;
pub mod save_math;
pub mod subframe;

pub use color::*;
pub use decoder::*;
pub use error::*;
pub use raster::*;
pub use save_math::*;
pub use subframe::*;

pub use image::{Rgba, RgbaImage};
