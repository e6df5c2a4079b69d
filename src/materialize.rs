//! Decode generated images, write them to disk and run the transparency pass

use crate::error::{Result, ToolError};
use crate::request::GenerationMode;
use imagent::{GeneratedImage, TransparencyAnalysis, TransparencyThresholds};
use std::path::{Path, PathBuf};
use webui::WebUiError;

#[derive(Debug, Clone, PartialEq)]
pub enum TransparencyCheck {
    Measured {
        analysis: TransparencyAnalysis,
        effective: bool,
    },
    /// The heuristic could not run; the original bytes were kept
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SavedImage {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub dimensions: Option<(u32, u32)>,
    pub transparency: Option<TransparencyCheck>,
}

#[derive(Debug, Clone)]
pub struct Materializer {
    base_dir: PathBuf,
    thresholds: TransparencyThresholds,
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"))
}

fn persistence(path: &Path) -> impl FnOnce(std::io::Error) -> ToolError + '_ {
    move |source| ToolError::Persistence {
        path: path.to_path_buf(),
        source,
    }
}

impl Materializer {
    pub fn new(base_dir: impl Into<PathBuf>, thresholds: TransparencyThresholds) -> Self {
        Self {
            base_dir: base_dir.into(),
            thresholds,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Absolute paths are kept; relative ones are anchored to the base directory
    pub fn resolve(&self, output_path: &str) -> PathBuf {
        let path = Path::new(output_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Write the first generated image to `output_path`
    pub fn materialize(
        &self,
        encoded: &str,
        output_path: &str,
        mode: GenerationMode,
    ) -> Result<SavedImage> {
        let image = GeneratedImage::from_base64(encoded).map_err(|e| {
            WebUiError::MalformedResponse(format!("image payload could not be decoded: {e}"))
        })?;

        let path = self.resolve(output_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(persistence(parent))?;
        }
        std::fs::write(&path, &image.data).map_err(persistence(&path))?;
        tracing::info!("Saved {} bytes to {}", image.len(), path.display());

        let transparency = (mode == GenerationMode::Transparent && is_png(&path))
            .then(|| self.apply_transparency(&image, &path));

        let size_bytes = std::fs::metadata(&path)
            .map_err(persistence(&path))?
            .len();

        Ok(SavedImage {
            dimensions: image.dimensions().ok(),
            path,
            size_bytes,
            transparency,
        })
    }

    fn apply_transparency(&self, image: &GeneratedImage, path: &Path) -> TransparencyCheck {
        let outcome = match image.transparency(&self.thresholds) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Transparency pass failed, keeping original image: {}", e);
                return TransparencyCheck::Failed(e.to_string());
            }
        };

        if let Some(rewritten) = &outcome.rewritten {
            if let Err(e) = std::fs::write(path, rewritten) {
                tracing::warn!("Could not write transparent image, keeping original: {}", e);
                // A partial write would leave a corrupt file behind
                if let Err(e) = std::fs::write(path, &image.data) {
                    tracing::error!("Could not restore original image {}: {}", path.display(), e);
                }
                return TransparencyCheck::Failed(e.to_string());
            }
        }

        let effective = outcome.analysis.is_effective(&self.thresholds);
        tracing::info!(
            "Transparency: {:.1}% of pixels transparent ({})",
            outcome.analysis.percent(),
            if effective { "effective" } else { "not detected" }
        );
        TransparencyCheck::Measured {
            analysis: outcome.analysis,
            effective,
        }
    }
}
