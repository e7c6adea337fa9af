//! Still image decoder for imgseq based on the `image` crate

use std::io::Cursor;

use image::{codecs, DynamicImage, ImageDecoder, ImageFormat};
use imgseq_utils::*;

type Reader = Cursor<Vec<u8>>;

/// Formats handled by this decoder, with their names and extensions
const FORMATS: &[(ImageFormat, &str, &[&str])] = &[
    (ImageFormat::Bmp, "BMP", &["bmp"]),
    (ImageFormat::Ico, "ICO", &["ico"]),
    (ImageFormat::Jpeg, "JPEG", &["jpg", "jpeg", "jpe", "jfif"]),
    (ImageFormat::Qoi, "QOI", &["qoi"]),
    (ImageFormat::Tiff, "TIFF", &["tif", "tiff"]),
    (ImageFormat::WebP, "WebP", &["webp"]),
];

const EXTENSIONS: &[&str] = &[
    "bmp", "ico", "jpg", "jpeg", "jpe", "jfif", "qoi", "tif", "tiff", "webp",
];

/// Decodes the first frame of the formats supported by `image`
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageRsDecoder;

impl ImageRsDecoder {
    fn format(head: &[u8]) -> Option<(ImageFormat, &'static str)> {
        let format = image::guess_format(head).ok()?;
        FORMATS
            .iter()
            .find(|(known, _, _)| *known == format)
            .map(|(format, name, _)| (*format, *name))
    }
}

impl Decoder for ImageRsDecoder {
    fn format_name(&self) -> &str {
        "image-rs"
    }

    fn extensions(&self) -> &[&str] {
        EXTENSIONS
    }

    fn can_decode(&self, head: &[u8]) -> bool {
        Self::format(head).is_some()
    }

    fn decode(
        &self,
        data: Vec<u8>,
    ) -> Result<(SequenceInfo, Box<dyn SubFrameSource>), DecoderError> {
        let (format, name) = Self::format(&data)
            .context_unsupported(String::from("Format not supported by image-rs"))?;
        let mut decoder = create_decoder(Cursor::new(data), format)?;

        let iccp = match decoder.icc_profile() {
            Ok(iccp) => iccp,
            Err(err) => {
                tracing::warn!("Failed to read ICC profile: {err}");
                None
            }
        };

        let (width, height) = decoder.dimensions();
        let image = DynamicImage::from_decoder(decoder).context_failed()?;

        let info = SequenceInfo {
            iccp,
            ..SequenceInfo::still(width, height, name)
        };
        let frame = DecodedSubFrame::still(image.into_rgba8());

        Ok((info, Box::new(VecSource::new([Ok(frame)]))))
    }
}

fn create_decoder(
    data: Reader,
    format: ImageFormat,
) -> Result<Box<dyn ImageDecoder>, DecoderError> {
    Ok(match format {
        ImageFormat::Bmp => Box::new(codecs::bmp::BmpDecoder::new(data).context_failed()?),
        ImageFormat::Ico => Box::new(codecs::ico::IcoDecoder::new(data).context_failed()?),
        ImageFormat::Jpeg => Box::new(codecs::jpeg::JpegDecoder::new(data).context_failed()?),
        ImageFormat::Qoi => Box::new(codecs::qoi::QoiDecoder::new(data).context_failed()?),
        ImageFormat::Tiff => Box::new(codecs::tiff::TiffDecoder::new(data).context_failed()?),
        ImageFormat::WebP => Box::new(codecs::webp::WebPDecoder::new(data).context_failed()?),
        other => {
            return Err(DecoderError::UnsupportedImageFormat(format!(
                "{other:?} is not supported by image-rs"
            )))
        }
    })
}
