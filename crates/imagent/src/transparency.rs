// Transparency detection and colour-keyed alpha synthesis

use crate::Result;
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Empirical thresholds for the background heuristic
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransparencyThresholds {
    /// Every channel above this is treated as white background
    pub white_floor: u8,
    /// Max-min channel spread below this counts as "uniform"
    pub spread_max: u8,
    /// Brightest channel above this makes a uniform pixel background
    pub bright_floor: u8,
    /// Ratio above which the transparency is reported as effective
    pub effective_ratio: f64,
}

impl Default for TransparencyThresholds {
    fn default() -> Self {
        Self {
            white_floor: 245,
            spread_max: 15,
            bright_floor: 235,
            effective_ratio: 0.05,
        }
    }
}

impl TransparencyThresholds {
    /// Whether an opaque RGB pixel should be keyed out
    pub fn is_background(&self, [r, g, b]: [u8; 3]) -> bool {
        if r > self.white_floor && g > self.white_floor && b > self.white_floor {
            return true;
        }
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        max - min < self.spread_max && max > self.bright_floor
    }
}

/// Where the reported alpha came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaSource {
    /// The decoded image already carried an alpha channel
    Existing,
    /// Alpha was synthesized from background colour
    Synthesized,
}

/// Result of measuring an image's transparency
#[derive(Debug, Clone, PartialEq)]
pub struct TransparencyAnalysis {
    pub source: AlphaSource,
    pub transparent_pixels: u64,
    pub total_pixels: u64,
}

impl TransparencyAnalysis {
    /// Fraction of pixels that are fully or partially transparent
    pub fn ratio(&self) -> f64 {
        if self.total_pixels == 0 {
            return 0.0;
        }
        self.transparent_pixels as f64 / self.total_pixels as f64
    }

    pub fn percent(&self) -> f64 {
        self.ratio() * 100.0
    }

    pub fn is_effective(&self, thresholds: &TransparencyThresholds) -> bool {
        self.ratio() > thresholds.effective_ratio
    }
}

/// Outcome of [`apply`]: the analysis plus re-encoded PNG bytes when alpha was synthesized
#[derive(Debug, Clone)]
pub struct TransparencyOutcome {
    pub analysis: TransparencyAnalysis,
    pub rewritten: Option<Vec<u8>>,
}

/// Count pixels with alpha below 255
pub fn measure_alpha(image: &RgbaImage) -> TransparencyAnalysis {
    let transparent_pixels = image.pixels().filter(|p| p.0[3] < 255).count() as u64;
    TransparencyAnalysis {
        source: AlphaSource::Existing,
        transparent_pixels,
        total_pixels: u64::from(image.width()) * u64::from(image.height()),
    }
}

/// Convert to RGBA and key out background-coloured pixels.
///
/// Each pixel gets alpha 0 when [`TransparencyThresholds::is_background`]
/// matches its RGB value and alpha 255 otherwise.
pub fn synthesize_alpha(
    image: &DynamicImage,
    thresholds: &TransparencyThresholds,
) -> (RgbaImage, TransparencyAnalysis) {
    let mut rgba = image.to_rgba8();
    let mut transparent_pixels = 0u64;

    for pixel in rgba.pixels_mut() {
        let [r, g, b, _] = pixel.0;
        if thresholds.is_background([r, g, b]) {
            pixel.0[3] = 0;
            transparent_pixels += 1;
        } else {
            pixel.0[3] = 255;
        }
    }

    let analysis = TransparencyAnalysis {
        source: AlphaSource::Synthesized,
        transparent_pixels,
        total_pixels: u64::from(rgba.width()) * u64::from(rgba.height()),
    };
    (rgba, analysis)
}

/// Inspect encoded image bytes and synthesize alpha when none is present
pub fn apply(bytes: &[u8], thresholds: &TransparencyThresholds) -> Result<TransparencyOutcome> {
    let image = image::load_from_memory(bytes)?;

    if image.color().has_alpha() {
        let analysis = measure_alpha(&image.to_rgba8());
        tracing::debug!(
            "Image already has alpha: {:.1}% transparent",
            analysis.percent()
        );
        return Ok(TransparencyOutcome {
            analysis,
            rewritten: None,
        });
    }

    let (rgba, analysis) = synthesize_alpha(&image, thresholds);
    tracing::debug!(
        "Synthesized alpha for {}x{} image: {:.1}% transparent",
        rgba.width(),
        rgba.height(),
        analysis.percent()
    );

    Ok(TransparencyOutcome {
        analysis,
        rewritten: Some(encode_png(&rgba)?),
    })
}

/// Encode an RGBA buffer as PNG
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}
