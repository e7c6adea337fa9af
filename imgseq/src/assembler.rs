//! Turns the sub-frames of a decoder into the frames of an [`ImageCache`]

use std::sync::Arc;

use imgseq_utils::{DecodedSubFrame, IndexOrColor, RawDelay, SequenceInfo, SubFrameSource};

use crate::cache::{CacheInfo, Frame, ImageCache};
use crate::canvas::Canvas;
use crate::compositor::{composite, CompositeParams};
use crate::config::DelayPolicy;
use crate::icc::{apply_transform, ColorTransform};
use crate::Error;

/// Display delay in milliseconds for a delay as stored in the container
///
/// Never returns less than one millisecond.
pub fn normalize_delay(raw: RawDelay, policy: &DelayPolicy) -> u32 {
    let ms = match raw {
        RawDelay::Centiseconds(cs) => u32::from(cs).saturating_mul(10),
        RawDelay::Fraction {
            numerator,
            denominator,
        } => {
            let denominator = if denominator == 0 { 100 } else { denominator };
            let ms = u64::from(numerator)
                .saturating_mul(1000)
                .div_ceil(u64::from(denominator));
            u32::try_from(ms).unwrap_or(u32::MAX)
        }
        RawDelay::Milliseconds(ms) => ms,
        RawDelay::Unspecified => policy.unspecified_ms,
    };

    ms.max(policy.minimum_ms.max(1))
}

/// Composites the sub-frames of one image in order
pub struct FrameAssembler {
    canvas: Canvas,
    background: IndexOrColor,
    animated: bool,
    skip_next: bool,
    delay_policy: DelayPolicy,
    transform: Option<Arc<dyn ColorTransform>>,
}

impl FrameAssembler {
    pub fn new(info: &SequenceInfo, delay_policy: DelayPolicy) -> Self {
        let canvas = if info.width > 0 && info.height > 0 {
            Canvas::with_size(info.width, info.height)
        } else {
            Canvas::new()
        };

        Self {
            canvas,
            background: info.background,
            animated: info.animated,
            skip_next: info.first_frame_hidden,
            delay_policy,
            transform: None,
        }
    }

    /// Color transformation for the emitted frames
    pub fn set_transform(&mut self, transform: Option<Arc<dyn ColorTransform>>) {
        self.transform = transform;
    }

    /// Number of frames that `info` announces for display
    pub fn displayed_frames(info: &SequenceInfo) -> u32 {
        if info.first_frame_hidden {
            info.frame_count.saturating_sub(1)
        } else {
            info.frame_count
        }
    }

    /// Composites the next sub-frame
    ///
    /// Returns `None` for a hidden sub-frame that is not part of the
    /// animation.
    pub fn push(&mut self, decoded: DecodedSubFrame) -> Result<Option<Frame>, Error> {
        if std::mem::take(&mut self.skip_next) {
            tracing::debug!("Skipping hidden first frame");
            return Ok(None);
        }

        let params = CompositeParams {
            blend: decoded.blend,
            dispose: decoded.dispose,
            transparent: decoded.transparent,
            background: self.background,
        };

        let canvas = std::mem::take(&mut self.canvas);
        let composited = composite(canvas, &decoded.subframe, &params)?;
        self.canvas = composited.canvas;

        let mut raster = composited.frame;
        if let Some(transform) = &self.transform {
            apply_transform(transform.as_ref(), &mut raster);
        }

        let delay_ms = if self.animated {
            normalize_delay(decoded.delay, &self.delay_policy)
        } else {
            0
        };

        Ok(Some(Frame::new(raster, delay_ms)))
    }
}

impl std::fmt::Debug for FrameAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameAssembler")
            .field("canvas", &self.canvas.dimensions())
            .field("animated", &self.animated)
            .field("skip_next", &self.skip_next)
            .finish_non_exhaustive()
    }
}

/// Feeds all sub-frames of `source` into `cache`
///
/// Stops without touching the cache any further once the cache is canceled.
/// On errors, frames that were already added stay in the cache.
pub fn run(
    info: SequenceInfo,
    mut source: Box<dyn SubFrameSource>,
    cache: &ImageCache,
    delay_policy: DelayPolicy,
    transform: Option<Arc<dyn ColorTransform>>,
) -> Result<(), Error> {
    let mut assembler = FrameAssembler::new(&info, delay_policy);
    assembler.set_transform(transform);

    cache.set_info(CacheInfo {
        width: info.width,
        height: info.height,
        frame_count: FrameAssembler::displayed_frames(&info),
        animated: info.animated,
        loop_count: info.loop_count,
        format_name: info.format_name.clone(),
    })?;

    let mut n_frames: u32 = 0;
    loop {
        if cache.is_canceled() {
            tracing::debug!("Loading superseded after {n_frames} frames");
            return Err(Error::Canceled);
        }

        let Some(decoded) = source.next_subframe()? else {
            break;
        };

        if let Some(frame) = assembler.push(decoded)? {
            let delay_ms = frame.delay_ms();
            let index = cache.add_frame(frame.into_raster(), delay_ms)?;
            tracing::trace!("Frame {index} ready with {delay_ms} ms delay");
            n_frames = n_frames.saturating_add(1);
        }
    }

    if n_frames == 0 {
        return Err(Error::NoFrames);
    }

    cache.set_fully_loaded()
}
