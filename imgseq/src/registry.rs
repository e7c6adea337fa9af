use std::path::Path;
use std::sync::Arc;

use imgseq_utils::Decoder;

use crate::Error;

/// Number of leading bytes decoders get to detect their format
pub const HEAD_LEN: usize = 64;

/// Set of decoders available for loading
///
/// Formats are detected by their signature. The file extension is only
/// used if no decoder recognizes the data.
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    decoders: Vec<Arc<dyn Decoder>>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a decoder, earlier decoders take precedence
    pub fn register(&mut self, decoder: impl Decoder + 'static) -> &mut Self {
        self.decoders.push(Arc::new(decoder));
        self
    }

    pub fn decoders(&self) -> &[Arc<dyn Decoder>] {
        &self.decoders
    }

    /// Lower case extensions of all registered decoders
    pub fn supported_extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self
            .decoders
            .iter()
            .flat_map(|decoder| decoder.extensions().iter().map(|ext| ext.to_lowercase()))
            .collect();
        extensions.sort();
        extensions.dedup();
        extensions
    }

    /// Decoder for `data`, using `file_name` as a hint
    pub fn find(&self, data: &[u8], file_name: Option<&Path>) -> Result<Arc<dyn Decoder>, Error> {
        let head = data.get(..HEAD_LEN).unwrap_or(data);

        if let Some(decoder) = self.decoders.iter().find(|d| d.can_decode(head)) {
            tracing::debug!("Detected format {}", decoder.format_name());
            return Ok(decoder.clone());
        }

        let extension = file_name
            .and_then(Path::extension)
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase);

        if let Some(extension) = &extension {
            if let Some(decoder) = self.decoders.iter().find(|d| {
                d.extensions()
                    .iter()
                    .any(|ext| ext.eq_ignore_ascii_case(extension))
            }) {
                tracing::debug!(
                    "No signature matched, using {} for extension {extension}",
                    decoder.format_name()
                );
                return Ok(decoder.clone());
            }
        }

        Err(Error::UnknownImageFormat(
            extension.unwrap_or_else(|| String::from("unknown")),
        ))
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.decoders.iter().map(|d| d.format_name()))
            .finish()
    }
}
