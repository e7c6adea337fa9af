//! GIF decoder for imgseq based on the `gif` crate
//!
//! Sub-frames are delivered palette-indexed, so that animations with a
//! shared palette can be composited without expanding to RGBA. Frames are
//! decoded one at a time while the animation is assembled.

use std::collections::VecDeque;
use std::io::Cursor;

use imgseq_utils::*;

const MAGIC: [&[u8]; 2] = [b"GIF87a", b"GIF89a"];

#[derive(Debug, Default, Clone, Copy)]
pub struct GifDecoder;

impl Decoder for GifDecoder {
    fn format_name(&self) -> &str {
        "GIF"
    }

    fn extensions(&self) -> &[&str] {
        &["gif"]
    }

    fn can_decode(&self, head: &[u8]) -> bool {
        MAGIC.iter().any(|magic| head.starts_with(magic))
    }

    fn decode(
        &self,
        data: Vec<u8>,
    ) -> Result<(SequenceInfo, Box<dyn SubFrameSource>), DecoderError> {
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::Indexed);
        let decoder = options
            .read_info(Cursor::new(data))
            .map_err(|err| DecoderError::loading(&err))?;

        let global_palette = decoder
            .global_palette()
            .map(Palette::from_rgb)
            .transpose()?;

        let background = match (&global_palette, decoder.bg_color()) {
            (Some(palette), Some(index)) => {
                IndexOrColor::from_index(i32::try_from(index).unwrap_or(-1), palette)
            }
            _ => IndexOrColor::transparent(),
        };

        let mut source = GifSource {
            decoder,
            global_palette,
            lookahead: VecDeque::new(),
            next: 0,
            finished: false,
        };

        // The second frame decides whether this is an animation. The loop
        // count is known once the first frame has been read.
        for _ in 0..LOOKAHEAD {
            match source.read_frame() {
                Some(subframe) => source.lookahead.push_back(subframe),
                None => break,
            }
        }

        let n_frames = source
            .lookahead
            .iter()
            .filter(|subframe| subframe.is_ok())
            .count();
        let n_frames = u32::try_from(n_frames).unwrap_or(u32::MAX);

        let loop_count = match source.decoder.repeat() {
            gif::Repeat::Infinite => LoopCount::Infinite,
            gif::Repeat::Finite(n) => LoopCount::Repeat(u32::from(n)),
        };

        let info = SequenceInfo {
            width: u32::from(source.decoder.width()),
            height: u32::from(source.decoder.height()),
            // Lower bound until all frames are read
            frame_count: n_frames,
            animated: n_frames > 1,
            loop_count,
            first_frame_hidden: false,
            background,
            format_name: String::from("GIF"),
            iccp: None,
        };

        Ok((info, Box::new(source)))
    }
}

/// Frames read before the sequence info is returned
const LOOKAHEAD: usize = 2;

struct GifSource {
    decoder: gif::Decoder<Cursor<Vec<u8>>>,
    global_palette: Option<Palette>,
    lookahead: VecDeque<Result<DecodedSubFrame, DecoderError>>,
    next: u32,
    finished: bool,
}

impl GifSource {
    /// Reads the next frame, `None` once the stream has ended or failed
    fn read_frame(&mut self) -> Option<Result<DecodedSubFrame, DecoderError>> {
        if self.finished {
            return None;
        }

        let index = self.next;
        let subframe = match self.decoder.read_next_frame() {
            Ok(Some(frame)) => convert_frame(frame, self.global_palette.as_ref())
                .map_err(|err| DecoderError::subframe(index, &err)),
            Ok(None) => {
                self.finished = true;
                return None;
            }
            Err(err) => {
                tracing::warn!("GIF decoding stopped after {index} frames: {err}");
                Err(DecoderError::subframe(index, &err))
            }
        };

        if subframe.is_err() {
            self.finished = true;
        }
        self.next = index.saturating_add(1);

        Some(subframe)
    }
}

impl SubFrameSource for GifSource {
    fn next_subframe(&mut self) -> Result<Option<DecodedSubFrame>, DecoderError> {
        match self.lookahead.pop_front().or_else(|| self.read_frame()) {
            Some(subframe) => subframe.map(Some),
            None => Ok(None),
        }
    }
}

fn convert_frame(
    frame: &gif::Frame<'_>,
    global_palette: Option<&Palette>,
) -> Result<DecodedSubFrame, DecoderError> {
    let mut palette = match &frame.palette {
        Some(local) => Palette::from_rgb(local)?,
        None => global_palette
            .cloned()
            .context_unsupported(String::from("GIF frame without palette"))?,
    };

    // Indices beyond the color table are drawn transparent
    palette.cover_pixels(&frame.buffer);

    let transparent = frame
        .transparent
        .map(|index| IndexOrColor::from_index(i32::from(index), &palette));

    let raster = IndexedImage::new(
        u32::from(frame.width),
        u32::from(frame.height),
        palette,
        frame.buffer.to_vec(),
    )?;

    let dispose = match frame.dispose {
        gif::DisposalMethod::Any | gif::DisposalMethod::Keep => DisposeMode::None,
        gif::DisposalMethod::Background => DisposeMode::ToBackground,
        gif::DisposalMethod::Previous => DisposeMode::RevertToPrevious,
    };

    Ok(DecodedSubFrame {
        subframe: SubFrame::new(raster, u32::from(frame.left), u32::from(frame.top)),
        blend: BlendMode::Overlay,
        dispose,
        transparent,
        delay: RawDelay::Centiseconds(frame.delay),
    })
}
