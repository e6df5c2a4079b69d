//! Validated generation requests

use crate::error::{Result, ToolError};
use crate::prompt::Style;
use std::ops::RangeInclusive;

pub const DIMENSION_RANGE: RangeInclusive<u32> = 64..=2048;
pub const STEPS_RANGE: RangeInclusive<u32> = 1..=150;
pub const CFG_SCALE_RANGE: RangeInclusive<f64> = 1.0..=30.0;
pub const DENOISING_RANGE: RangeInclusive<f64> = 0.0..=1.0;

/// Sampler names accepted by the generation tools
pub const SAMPLERS: [&str; 17] = [
    "Euler a",
    "Euler",
    "LMS",
    "Heun",
    "DPM2",
    "DPM2 a",
    "DPM++ 2S a",
    "DPM++ 2M",
    "DPM++ SDE",
    "DPM++ 2M Karras",
    "DPM++ SDE Karras",
    "DPM fast",
    "DPM adaptive",
    "DDIM",
    "PLMS",
    "UniPC",
    "LCM",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    Standard,
    Transparent,
    Img2Img,
}

/// How the source image is fitted to the requested size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeMode {
    JustResize,
    #[default]
    CropAndResize,
    ResizeAndFill,
    LatentUpscale,
}

impl ResizeMode {
    pub const ALL: [ResizeMode; 4] = [
        ResizeMode::JustResize,
        ResizeMode::CropAndResize,
        ResizeMode::ResizeAndFill,
        ResizeMode::LatentUpscale,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ResizeMode::JustResize => "Just resize",
            ResizeMode::CropAndResize => "Crop and resize",
            ResizeMode::ResizeAndFill => "Resize and fill",
            ResizeMode::LatentUpscale => "Just resize (latent upscale)",
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            ResizeMode::JustResize => 0,
            ResizeMode::CropAndResize => 1,
            ResizeMode::ResizeAndFill => 2,
            ResizeMode::LatentUpscale => 3,
        }
    }

    /// Accepts a label or its numeric code
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|mode| mode.label().eq_ignore_ascii_case(value) || mode.code().to_string() == value)
            .ok_or_else(|| {
                let labels: Vec<_> = Self::ALL.iter().map(|m| m.label()).collect();
                ToolError::validation(format!(
                    "resize_mode '{value}' is not one of: {}",
                    labels.join(", ")
                ))
            })
    }

    pub fn from_code(code: i64) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|mode| i64::from(mode.code()) == code)
            .ok_or_else(|| ToolError::validation(format!("resize_mode {code} must be between 0 and 3")))
    }
}

/// Fill used for the masked area when inpainting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillMode {
    Fill,
    #[default]
    Original,
    LatentNoise,
    LatentNothing,
}

impl FillMode {
    /// Unknown names map to [`FillMode::Original`]
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "fill" => FillMode::Fill,
            "latent_noise" => FillMode::LatentNoise,
            "latent_nothing" => FillMode::LatentNothing,
            _ => FillMode::Original,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FillMode::Fill => "fill",
            FillMode::Original => "original",
            FillMode::LatentNoise => "latent_noise",
            FillMode::LatentNothing => "latent_nothing",
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            FillMode::Fill => 0,
            FillMode::Original => 1,
            FillMode::LatentNoise => 2,
            FillMode::LatentNothing => 3,
        }
    }
}

/// Source image (and optional mask) of an img2img call, already read from disk
#[derive(Debug, Clone)]
pub struct Img2ImgSource {
    pub input_path: String,
    pub image: Vec<u8>,
    pub mask_path: Option<String>,
    pub mask: Option<Vec<u8>>,
    pub denoising_strength: f64,
    pub resize_mode: ResizeMode,
    pub mask_blur: u32,
    /// Sent when no mask is supplied
    pub inpainting_fill: u8,
    /// Replaces `inpainting_fill` when a mask is supplied
    pub fill_mode: FillMode,
    pub inpaint_full_res: bool,
    pub inpaint_full_res_padding: u32,
    pub mask_invert: bool,
}

impl Img2ImgSource {
    pub fn new(input_path: impl Into<String>, image: Vec<u8>) -> Self {
        Self {
            input_path: input_path.into(),
            image,
            mask_path: None,
            mask: None,
            denoising_strength: 0.75,
            resize_mode: ResizeMode::default(),
            mask_blur: 4,
            inpainting_fill: 1,
            fill_mode: FillMode::default(),
            inpaint_full_res: true,
            inpaint_full_res_padding: 32,
            mask_invert: false,
        }
    }

    pub fn is_inpainting(&self) -> bool {
        self.mask.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub mode: GenerationMode,
    pub prompt: String,
    pub negative_prompt: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg_scale: f64,
    pub sampler: String,
    pub style: Style,
    pub model_name: String,
    pub vae_name: Option<String>,
    pub output_path: String,
    pub source: Option<Img2ImgSource>,
}

fn check_range<T: PartialOrd + std::fmt::Display>(
    name: &str,
    value: T,
    range: &RangeInclusive<T>,
) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ToolError::validation(format!(
            "{name} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        )))
    }
}

pub fn check_sampler(sampler: &str) -> Result<()> {
    if SAMPLERS.contains(&sampler) {
        Ok(())
    } else {
        Err(ToolError::validation(format!(
            "sampler '{sampler}' is not one of: {}",
            SAMPLERS.join(", ")
        )))
    }
}

impl GenerationRequest {
    /// Checks everything that can be checked without the backend
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(ToolError::validation("prompt must not be empty"));
        }
        if self.output_path.trim().is_empty() {
            return Err(ToolError::validation("output_path must not be empty"));
        }
        check_range("width", self.width, &DIMENSION_RANGE)?;
        check_range("height", self.height, &DIMENSION_RANGE)?;
        check_range("steps", self.steps, &STEPS_RANGE)?;
        check_range("cfg_scale", self.cfg_scale, &CFG_SCALE_RANGE)?;
        check_sampler(&self.sampler)?;

        match (self.mode, &self.source) {
            (GenerationMode::Img2Img, None) => {
                Err(ToolError::validation("input_image_path is required for img2img"))
            }
            (GenerationMode::Img2Img, Some(source)) => {
                if source.image.is_empty() {
                    return Err(ToolError::validation(format!(
                        "input image {} is empty",
                        source.input_path
                    )));
                }
                if source.mask.as_ref().is_some_and(|m| m.is_empty()) {
                    return Err(ToolError::validation("mask image is empty"));
                }
                check_range("denoising_strength", source.denoising_strength, &DENOISING_RANGE)
            }
            (_, Some(_)) => Err(ToolError::validation(
                "a source image is only accepted in img2img mode",
            )),
            (_, None) => Ok(()),
        }
    }
}
