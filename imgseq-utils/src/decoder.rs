use crate::color::IndexOrColor;
use crate::error::DecoderError;
use crate::subframe::DecodedSubFrame;

/// How often an animation is played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopCount {
    #[default]
    Infinite,
    /// Number of additional repetitions after the first play
    Repeat(u32),
}

impl LoopCount {
    /// `-1` for infinite, otherwise the number of additional repetitions
    pub fn as_legacy(self) -> i64 {
        match self {
            Self::Infinite => -1,
            Self::Repeat(n) => i64::from(n),
        }
    }
}

/// Sequence metadata a decoder knows before producing pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceInfo {
    /// Logical screen width, used to size the canvas
    pub width: u32,
    /// Logical screen height, used to size the canvas
    pub height: u32,
    /// Number of sub-frames the container declares, hidden one included
    ///
    /// For progressive loading this can be a lower bound.
    pub frame_count: u32,
    pub animated: bool,
    pub loop_count: LoopCount,
    /// The first sub-frame is a default image outside of the animation
    pub first_frame_hidden: bool,
    pub background: IndexOrColor,
    pub format_name: String,
    /// Embedded ICC profile
    pub iccp: Option<Vec<u8>>,
}

impl SequenceInfo {
    /// Info for a non-animated image with a single frame
    pub fn still(width: u32, height: u32, format_name: impl ToString) -> Self {
        Self {
            width,
            height,
            frame_count: 1,
            animated: false,
            loop_count: LoopCount::Infinite,
            first_frame_hidden: false,
            background: IndexOrColor::transparent(),
            format_name: format_name.to_string(),
            iccp: None,
        }
    }
}

/// Stream of decoded sub-frames of one image
pub trait SubFrameSource: Send {
    /// Next sub-frame, `None` once the container has no more
    fn next_subframe(&mut self) -> Result<Option<DecodedSubFrame>, DecoderError>;
}

/// A format-specific decoder
pub trait Decoder: Send + Sync {
    /// Human readable name of the format
    fn format_name(&self) -> &str;

    /// File name extensions images of this format usually have
    fn extensions(&self) -> &[&str];

    /// Checks the leading bytes of the image for a known signature
    fn can_decode(&self, head: &[u8]) -> bool;

    /// Reads the sequence info and prepares decoding of the sub-frames
    fn decode(
        &self,
        data: Vec<u8>,
    ) -> Result<(SequenceInfo, Box<dyn SubFrameSource>), DecoderError>;
}

/// Source that yields prepared sub-frames in order
///
/// Useful for decoders that have to read the whole container at once.
#[derive(Debug, Default)]
pub struct VecSource {
    subframes: std::collections::VecDeque<Result<DecodedSubFrame, DecoderError>>,
}

impl VecSource {
    pub fn new(subframes: impl IntoIterator<Item = Result<DecodedSubFrame, DecoderError>>) -> Self {
        Self {
            subframes: subframes.into_iter().collect(),
        }
    }
}

impl SubFrameSource for VecSource {
    fn next_subframe(&mut self) -> Result<Option<DecodedSubFrame>, DecoderError> {
        self.subframes.pop_front().transpose()
    }
}
