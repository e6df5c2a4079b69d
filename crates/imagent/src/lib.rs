// imagent - image handling for generated output
// Decodes backend image payloads and runs the transparency heuristic

pub mod error;
pub mod transparency;

pub use error::{ImageGenError, Result};
pub use transparency::{
    AlphaSource, TransparencyAnalysis, TransparencyOutcome, TransparencyThresholds,
};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// An encoded image as returned by the generation backend
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    /// Encoded image bytes (PNG, JPEG, ...), exactly as decoded from base64
    pub data: Vec<u8>,
}

impl GeneratedImage {
    /// Decode a base64 payload. A `data:<mime>;base64,` prefix is tolerated.
    pub fn from_base64(payload: &str) -> Result<Self> {
        let encoded = match payload.split_once("base64,") {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => payload,
        };
        let data = STANDARD.decode(encoded.trim())?;
        Ok(Self { data })
    }

    /// Size of the encoded image in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Pixel dimensions, decoding only the header
    pub fn dimensions(&self) -> Result<(u32, u32)> {
        let reader = image::ImageReader::new(std::io::Cursor::new(&self.data)).with_guessed_format()?;
        Ok(reader.into_dimensions()?)
    }

    /// Run the transparency heuristic on this image
    pub fn transparency(&self, thresholds: &TransparencyThresholds) -> Result<TransparencyOutcome> {
        transparency::apply(&self.data, thresholds)
    }
}

/// Base64-encode raw file bytes for a backend request
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
