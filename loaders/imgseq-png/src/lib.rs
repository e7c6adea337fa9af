//! PNG and APNG decoder for imgseq based on the `png` crate
//!
//! Frames are decoded one at a time while the animation is assembled.

use std::io::Cursor;

use imgseq_utils::*;

const MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

#[derive(Debug, Default, Clone, Copy)]
pub struct PngDecoder;

impl Decoder for PngDecoder {
    fn format_name(&self) -> &str {
        "PNG"
    }

    fn extensions(&self) -> &[&str] {
        &["png", "apng"]
    }

    fn can_decode(&self, head: &[u8]) -> bool {
        head.starts_with(MAGIC)
    }

    fn decode(
        &self,
        data: Vec<u8>,
    ) -> Result<(SequenceInfo, Box<dyn SubFrameSource>), DecoderError> {
        let mut decoder = png::Decoder::new(Cursor::new(data));
        decoder.set_transformations(png::Transformations::normalize_to_color8());
        let reader = decoder.read_info().map_err(|err| DecoderError::loading(&err))?;

        let png_info = reader.info();
        let iccp = png_info.icc_profile.as_ref().map(|iccp| iccp.to_vec());

        let info = match png_info.animation_control.as_ref() {
            Some(actl) => {
                let first_frame_hidden = png_info.frame_control.is_none();
                let frame_count = if first_frame_hidden {
                    actl.num_frames.saturating_add(1)
                } else {
                    actl.num_frames
                };
                let loop_count = match actl.num_plays {
                    0 => LoopCount::Infinite,
                    plays => LoopCount::Repeat(plays.saturating_sub(1)),
                };

                SequenceInfo {
                    width: png_info.width,
                    height: png_info.height,
                    frame_count,
                    animated: actl.num_frames > 1,
                    loop_count,
                    first_frame_hidden,
                    background: IndexOrColor::transparent(),
                    format_name: String::from("APNG"),
                    iccp,
                }
            }
            None => SequenceInfo {
                iccp,
                ..SequenceInfo::still(png_info.width, png_info.height, "PNG")
            },
        };

        tracing::debug!(
            "{} with {} frames, first hidden: {}",
            info.format_name,
            info.frame_count,
            info.first_frame_hidden
        );

        let source = PngSource {
            buf: vec![0; reader.output_buffer_size()],
            reader,
            next: 0,
            total: info.frame_count,
            first_frame_hidden: info.first_frame_hidden,
        };

        Ok((info, Box::new(source)))
    }
}

struct PngSource {
    reader: png::Reader<Cursor<Vec<u8>>>,
    buf: Vec<u8>,
    next: u32,
    total: u32,
    first_frame_hidden: bool,
}

impl PngSource {
    fn is_hidden(&self, index: u32) -> bool {
        self.first_frame_hidden && index == 0
    }

    fn is_first_animation_frame(&self, index: u32) -> bool {
        index == u32::from(self.first_frame_hidden)
    }
}

impl SubFrameSource for PngSource {
    fn next_subframe(&mut self) -> Result<Option<DecodedSubFrame>, DecoderError> {
        if self.next >= self.total {
            return Ok(None);
        }

        let index = self.next;
        let output = self
            .reader
            .next_frame(&mut self.buf)
            .map_err(|err| DecoderError::subframe(index, &err))?;
        self.next = index.saturating_add(1);

        let raster = to_rgba(&self.buf, &output).map_err(|err| DecoderError::subframe(index, &err))?;

        let fctl = match self.reader.info().frame_control.as_ref() {
            Some(fctl) if !self.is_hidden(index) => fctl,
            _ => return Ok(Some(DecodedSubFrame::still(raster))),
        };

        let dispose = match fctl.dispose_op {
            png::DisposeOp::None => DisposeMode::None,
            png::DisposeOp::Background => DisposeMode::ToBackground,
            // Nothing to revert to before the first frame
            png::DisposeOp::Previous if self.is_first_animation_frame(index) => {
                DisposeMode::ToBackground
            }
            png::DisposeOp::Previous => DisposeMode::RevertToPrevious,
        };

        let blend = match fctl.blend_op {
            png::BlendOp::Source => BlendMode::Replace,
            png::BlendOp::Over => BlendMode::Overlay,
        };

        Ok(Some(DecodedSubFrame {
            subframe: SubFrame::new(raster, fctl.x_offset, fctl.y_offset),
            blend,
            dispose,
            transparent: None,
            delay: RawDelay::Fraction {
                numerator: fctl.delay_num,
                denominator: fctl.delay_den,
            },
        }))
    }
}

/// Converts 8 bit output of any color type to RGBA
fn to_rgba(buf: &[u8], output: &png::OutputInfo) -> Result<RgbaImage, DecoderError> {
    let data = buf.get(..output.buffer_size()).context_internal()?;

    let rgba: Vec<u8> = match output.color_type {
        png::ColorType::Rgba => data.to_vec(),
        png::ColorType::Rgb => data
            .chunks_exact(3)
            .flat_map(|px| [px[0], px[1], px[2], u8::MAX])
            .collect(),
        png::ColorType::GrayscaleAlpha => data
            .chunks_exact(2)
            .flat_map(|px| [px[0], px[0], px[0], px[1]])
            .collect(),
        png::ColorType::Grayscale => data.iter().flat_map(|v| [*v, *v, *v, u8::MAX]).collect(),
        png::ColorType::Indexed => {
            return Err(DecoderError::UnsupportedImageFormat(String::from(
                "Palette was not expanded",
            )))
        }
    };

    RgbaImage::from_raw(output.width, output.height, rgba).context_internal()
}

#[cfg(test)]
mod test {
    use super::*;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn still_png() -> Vec<u8> {
        let mut data = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut data, 2, 1);
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[255, 0, 0, 0, 0, 255]).unwrap();
        }
        data
    }

    fn apng_with_default_image() -> Vec<u8> {
        let mut data = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut data, 2, 2);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_animated(2, 3).unwrap();
            encoder.set_sep_def_img(true).unwrap();
            let mut writer = encoder.write_header().unwrap();

            writer.write_image_data(&BLUE.repeat(4)).unwrap();

            writer.set_frame_delay(1, 0).unwrap();
            writer.set_dispose_op(png::DisposeOp::Previous).unwrap();
            writer.write_image_data(&RED.repeat(4)).unwrap();

            writer.set_frame_dimension(1, 1).unwrap();
            writer.set_frame_position(1, 1).unwrap();
            writer.set_blend_op(png::BlendOp::Over).unwrap();
            writer.set_frame_delay(3, 1000).unwrap();
            writer.write_image_data(&BLUE).unwrap();

            writer.finish().unwrap();
        }
        data
    }

    #[test]
    fn still_png_is_expanded() {
        let (info, mut source) = PngDecoder.decode(still_png()).unwrap();
        assert!(!info.animated);
        assert_eq!(info.frame_count, 1);

        let frame = source.next_subframe().unwrap().unwrap();
        assert_eq!(frame.subframe.raster.color_at(1, 0), Some(Rgba(BLUE)));
        assert_eq!(frame.delay, RawDelay::Unspecified);
        assert!(source.next_subframe().unwrap().is_none());
    }

    #[test]
    fn apng_with_hidden_default_image() {
        let (info, mut source) = PngDecoder.decode(apng_with_default_image()).unwrap();
        assert!(info.animated);
        assert!(info.first_frame_hidden);
        assert_eq!(info.frame_count, 3);
        assert_eq!(info.loop_count, LoopCount::Repeat(2));

        let default_image = source.next_subframe().unwrap().unwrap();
        assert_eq!(default_image.subframe.raster.color_at(0, 0), Some(Rgba(BLUE)));

        let first = source.next_subframe().unwrap().unwrap();
        assert_eq!(first.dispose, DisposeMode::ToBackground);
        assert_eq!(first.blend, BlendMode::Replace);
        assert_eq!(
            first.delay,
            RawDelay::Fraction {
                numerator: 1,
                denominator: 0
            }
        );

        let second = source.next_subframe().unwrap().unwrap();
        assert_eq!((second.subframe.x, second.subframe.y), (1, 1));
        assert_eq!(second.subframe.raster.dimensions(), (1, 1));
        assert_eq!(second.blend, BlendMode::Overlay);

        assert!(source.next_subframe().unwrap().is_none());
    }

    #[test]
    fn detects_signature() {
        assert!(PngDecoder.can_decode(&still_png()));
        assert!(!PngDecoder.can_decode(b"GIF89a"));
    }
}
