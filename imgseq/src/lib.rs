#![deny(clippy::arithmetic_side_effects)]
#![deny(clippy::cast_possible_truncation)]
#![deny(clippy::cast_possible_wrap)]

//! Imgseq reconstructs the displayable frames of animated images. Decoders
//! deliver sub-frames with placement and blend/dispose directives, which are
//! composited onto a canvas and published frame by frame in an
//! [`ImageCache`].
//!
//! Decoders implement the [`Decoder`] trait from
//! [`imgseq-utils`](imgseq_utils) and are collected in a [`DecoderRegistry`].
//!
//! # Example
//!
//! ```no_run
//! # use imgseq::*;
//! # fn registry() -> DecoderRegistry { DecoderRegistry::new() }
//! # async_global_executor::block_on(async {
//! let image = Loader::new("animation.gif", registry()).load();
//!
//! let frame_count = image.info().await.map(|info| info.frame_count);
//! if let Some(frame) = image.frame(0).await {
//!     let delay = frame.delay();
//! }
//! # });
//! ```
//!
//! Loading happens in a background thread. Frames become available as soon
//! as they are composited, see [`ImageCache::subscribe`].

mod api;
mod assembler;
mod cache;
mod canvas;
mod compositor;
mod config;
mod error;
mod icc;
mod registry;

pub use api::*;
pub use assembler::{normalize_delay, run as assemble, FrameAssembler};
pub use cache::{CacheEvent, CacheInfo, Frame, ImageCache, Status};
pub use canvas::{Canvas, Region};
pub use compositor::{composite, CompositeParams, Composited};
pub use config::{Config, DelayPolicy, CONFIG_ENV};
pub use error::Error;
pub use icc::{apply_transform, ColorManager, ColorTransform, IccTransform};
pub use registry::{DecoderRegistry, HEAD_LEN};

pub use imgseq_utils::{
    BlendMode, DecodedSubFrame, Decoder, DecoderError, DisposeMode, IndexOrColor, IndexedImage,
    LoopCount, Palette, PixelEncoding, Raster, RawDelay, SequenceInfo, SubFrame, SubFrameSource,
    VecSource,
};
