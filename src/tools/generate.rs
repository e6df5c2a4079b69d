//! Image generation tools

use super::args::Arguments;
use super::schema;
use super::{Tool, ToolContext};
use crate::config::DefaultParams;
use crate::error::{Result, ToolError};
use crate::materialize::{SavedImage, TransparencyCheck};
use crate::pipeline::GenerationOutcome;
use crate::prompt::{self, Style};
use crate::request::{
    CFG_SCALE_RANGE, DIMENSION_RANGE, FillMode, GenerationMode, GenerationRequest, Img2ImgSource,
    ResizeMode, SAMPLERS, STEPS_RANGE,
};
use async_trait::async_trait;
use imagent::GeneratedImage;
use serde_json::{Map, Value};
use std::fmt::Write;
use std::sync::Arc;

const STYLES: [&str; 5] = [
    "none",
    "anime_character",
    "realistic_portrait",
    "fantasy_art",
    "modern_style",
];

/// Fields shared by all three generation tools. `defaults` fills in steps,
/// cfg_scale and sampler when the caller leaves them out.
fn parse_request(
    ctx: &ToolContext,
    args: &Arguments<'_>,
    mode: GenerationMode,
    defaults: &DefaultParams,
    dimensions: (u32, u32),
) -> Result<GenerationRequest> {
    let config = ctx.pipeline.config();

    let prompt = args.required_str("prompt")?;
    let output_path = args.required_str("output_path")?;
    let negative_prompt = match args.optional_str("negative_prompt")? {
        Some(negative) => negative,
        None => prompt::default_negative(&config.prompt_suggestions, mode),
    };
    let model_name = args
        .optional_str("model_name")?
        .unwrap_or_else(|| config.default_model.clone());
    let vae_name = match args.optional_str("vae_name")? {
        Some(vae) => Some(vae),
        None => config.default_vae().map(str::to_string),
    }
    .filter(|vae| vae != "None");
    let style = match args.optional_str("style")? {
        Some(name) => {
            let style = Style::parse(&name);
            if style == Style::None && !name.eq_ignore_ascii_case("none") {
                tracing::warn!("Unknown style '{}', using none", name);
            }
            style
        }
        None => Style::None,
    };

    Ok(GenerationRequest {
        mode,
        prompt,
        negative_prompt,
        width: dimensions.0,
        height: dimensions.1,
        steps: args.u32_or("steps", defaults.steps)?,
        cfg_scale: args.f64_or("cfg_scale", defaults.cfg_scale)?,
        sampler: args
            .optional_str("sampler")?
            .unwrap_or_else(|| defaults.sampler_index.clone()),
        style,
        model_name,
        vae_name,
        output_path,
        source: None,
    })
}

fn common_properties(required_size: bool) -> Vec<(&'static str, Value)> {
    let size_default = (!required_size).then_some(512);
    vec![
        ("prompt", schema::string("Text prompt describing the image")),
        (
            "output_path",
            schema::string("Where to save the image; relative paths are resolved against the server directory"),
        ),
        ("model_name", schema::string("Checkpoint to use (default: configured model)")),
        ("vae_name", schema::string("VAE to use (default: configured VAE)")),
        ("negative_prompt", schema::string("Things to avoid in the image")),
        (
            "width",
            schema::integer("Image width in pixels", *DIMENSION_RANGE.start(), *DIMENSION_RANGE.end(), size_default),
        ),
        (
            "height",
            schema::integer("Image height in pixels", *DIMENSION_RANGE.start(), *DIMENSION_RANGE.end(), size_default),
        ),
        (
            "steps",
            schema::integer("Sampling steps", *STEPS_RANGE.start(), *STEPS_RANGE.end(), Some(20)),
        ),
        (
            "cfg_scale",
            schema::number("Prompt adherence", *CFG_SCALE_RANGE.start(), *CFG_SCALE_RANGE.end(), 7.5),
        ),
        ("sampler", schema::one_of("Sampling method", &SAMPLERS, "Euler a")),
        ("style", schema::one_of("Prompt template preset", &STYLES, "none")),
    ]
}

fn size_kb(image: &SavedImage) -> f64 {
    image.size_bytes as f64 / 1024.0
}

fn transparency_line(check: &TransparencyCheck) -> String {
    match check {
        TransparencyCheck::Measured {
            analysis,
            effective,
        } => format!(
            "Transparency: {:.1}% of pixels transparent ({})",
            analysis.percent(),
            if *effective { "effective" } else { "not detected" }
        ),
        TransparencyCheck::Failed(reason) => format!("Transparency: not detected ({reason})"),
    }
}

fn write_summary(report: &mut String, outcome: &GenerationOutcome) {
    let request = &outcome.request;
    let _ = writeln!(report, "Saved to: {}", outcome.image.path.display());
    let _ = writeln!(report, "Size: {:.1} KB", size_kb(&outcome.image));
    let _ = writeln!(report, "Model: {}", request.model_name);
    let _ = writeln!(report, "Sampler: {}", request.sampler);
    let _ = writeln!(report, "Dimensions: {}x{}", request.width, request.height);
    let _ = writeln!(report, "Style: {}", request.style.as_str());
}

pub fn standard_report(outcome: &GenerationOutcome) -> String {
    let mut report = String::from("Image generated successfully\n");
    write_summary(&mut report, outcome);
    if let Some(check) = &outcome.image.transparency {
        let _ = writeln!(report, "{}", transparency_line(check));
    }
    let _ = write!(report, "Prompt: {}", outcome.request.prompt);
    report
}

pub fn transparent_report(outcome: &GenerationOutcome) -> String {
    let mut report = String::from("Transparent image generated successfully\n");
    write_summary(&mut report, outcome);
    match &outcome.image.transparency {
        Some(check) => {
            let _ = writeln!(report, "{}", transparency_line(check));
        }
        None => {
            let _ = writeln!(report, "Transparency: not checked (output is not PNG)");
        }
    }
    let _ = writeln!(report, "Original prompt: {}", outcome.original_prompt);
    let _ = write!(report, "Optimized prompt: {}", outcome.request.prompt);
    report
}

pub fn img2img_report(outcome: &GenerationOutcome) -> String {
    let request = &outcome.request;
    let mut report = String::from("Image-to-image generation completed\n");
    if let Some(source) = &request.source {
        let _ = writeln!(report, "Input: {}", source.input_path);
        match &source.mask_path {
            Some(mask) => {
                let _ = writeln!(
                    report,
                    "Mask: {} (inverted: {}, fill: {})",
                    mask,
                    if source.mask_invert { "yes" } else { "no" },
                    source.fill_mode.as_str()
                );
            }
            None => {
                let _ = writeln!(report, "Mode: standard img2img");
            }
        }
        write_summary(&mut report, outcome);
        let _ = writeln!(report, "Denoising strength: {}", source.denoising_strength);
        let _ = writeln!(report, "Resize mode: {}", source.resize_mode.label());
        let _ = writeln!(
            report,
            "Source retained: {:.0}%",
            (1.0 - source.denoising_strength) * 100.0
        );
    } else {
        write_summary(&mut report, outcome);
    }
    let _ = write!(report, "Prompt: {}", request.prompt);
    report
}

pub struct GenerateImageTool {
    ctx: Arc<ToolContext>,
}

impl GenerateImageTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for GenerateImageTool {
    fn name(&self) -> &'static str {
        "generate_image"
    }

    fn description(&self) -> &'static str {
        "Generate an image from a text prompt with Stable Diffusion WebUI"
    }

    fn input_schema(&self) -> Value {
        let mut properties = common_properties(true);
        properties.push((
            "transparent_background",
            schema::boolean("Optimize for a transparent PNG background", false),
        ));
        schema::object(properties, &["prompt", "output_path", "width", "height"])
    }

    async fn call(&self, arguments: &Map<String, Value>) -> Result<String> {
        let args = Arguments::new(arguments);
        let transparent = args.bool_or("transparent_background", false)?;
        let mode = if transparent {
            GenerationMode::Transparent
        } else {
            GenerationMode::Standard
        };
        let dimensions = (args.required_u32("width")?, args.required_u32("height")?);
        let defaults = &self.ctx.pipeline.config().default_params;
        let request = parse_request(&self.ctx, &args, mode, defaults, dimensions)?;

        let outcome = self.ctx.pipeline.run(request).await?;
        Ok(if transparent {
            transparent_report(&outcome)
        } else {
            standard_report(&outcome)
        })
    }
}

pub struct GenerateTransparentImageTool {
    ctx: Arc<ToolContext>,
}

impl GenerateTransparentImageTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for GenerateTransparentImageTool {
    fn name(&self) -> &'static str {
        "generate_transparent_image"
    }

    fn description(&self) -> &'static str {
        "Generate a PNG with a transparent background; the output extension is forced to .png"
    }

    fn input_schema(&self) -> Value {
        schema::object(common_properties(false), &["prompt", "output_path"])
    }

    async fn call(&self, arguments: &Map<String, Value>) -> Result<String> {
        let args = Arguments::new(arguments);
        // Fixed 512x512, 20 steps, cfg 7.5, "Euler a"; the configured defaults do not apply
        let defaults = DefaultParams::default();
        let dimensions = (
            args.u32_or("width", defaults.width)?,
            args.u32_or("height", defaults.height)?,
        );
        let request = parse_request(
            &self.ctx,
            &args,
            GenerationMode::Transparent,
            &defaults,
            dimensions,
        )?;

        let outcome = self.ctx.pipeline.run(request).await?;
        Ok(transparent_report(&outcome))
    }
}

pub struct GenerateImg2ImgTool {
    ctx: Arc<ToolContext>,
}

impl GenerateImg2ImgTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }

    fn read_image(&self, name: &str, path: &str) -> Result<Vec<u8>> {
        let resolved = self.ctx.pipeline.materializer().resolve(path);
        std::fs::read(&resolved).map_err(|e| {
            ToolError::validation(format!("{name} {} cannot be read: {e}", resolved.display()))
        })
    }

    fn parse_source(&self, args: &Arguments<'_>) -> Result<Img2ImgSource> {
        let input_path = args.required_str("input_image_path")?;
        let mut source = Img2ImgSource::new(input_path.clone(), Vec::new());

        source.denoising_strength = args.f64_or("denoising_strength", source.denoising_strength)?;
        source.resize_mode = match args.optional_int("resize_mode") {
            Ok(Some(code)) => ResizeMode::from_code(code)?,
            Ok(None) => ResizeMode::default(),
            Err(_) => match args.optional_str("resize_mode")? {
                Some(label) => ResizeMode::parse(&label)?,
                None => ResizeMode::default(),
            },
        };
        source.mask_blur = args.u32_or("mask_blur", source.mask_blur)?;
        source.inpaint_full_res = args.bool_or("inpaint_full_res", source.inpaint_full_res)?;
        source.inpaint_full_res_padding =
            args.u32_or("inpaint_full_res_padding", source.inpaint_full_res_padding)?;
        source.mask_invert = args.bool_or("inpainting_mask_invert", false)?;
        source.fill_mode = args
            .optional_str("inpainting_fill_mode")?
            .map(|name| FillMode::parse(&name))
            .unwrap_or_default();
        source.inpainting_fill = match args.u32_or("inpainting_fill", 1)? {
            fill @ 0..=3 => fill as u8,
            other => {
                return Err(ToolError::validation(format!(
                    "inpainting_fill must be between 0 and 3, got {other}"
                )));
            }
        };
        source.mask_path = args.optional_str("mask_image_path")?;

        source.image = self.read_image("input image", &input_path)?;
        if let Some(mask_path) = &source.mask_path {
            let mask = self.read_image("mask image", mask_path)?;
            let source_size = GeneratedImage { data: source.image.clone() }.dimensions();
            let mask_size = GeneratedImage { data: mask.clone() }.dimensions();
            if let (Ok(source_size), Ok(mask_size)) = (source_size, mask_size) {
                if source_size != mask_size {
                    tracing::warn!(
                        "Mask size {}x{} differs from source size {}x{}",
                        mask_size.0,
                        mask_size.1,
                        source_size.0,
                        source_size.1
                    );
                }
            }
            source.mask = Some(mask);
        }
        Ok(source)
    }
}

#[async_trait]
impl Tool for GenerateImg2ImgTool {
    fn name(&self) -> &'static str {
        "generate_image_img2img"
    }

    fn description(&self) -> &'static str {
        "Transform an existing image with a prompt (img2img), optionally inpainting through a mask"
    }

    fn input_schema(&self) -> Value {
        let resize_labels: Vec<&str> = ResizeMode::ALL.iter().map(|m| m.label()).collect();
        let mut properties = common_properties(true);
        properties.extend([
            ("input_image_path", schema::string("Source image file")),
            (
                "denoising_strength",
                schema::number("How much the source is changed", 0.0, 1.0, 0.75),
            ),
            (
                "resize_mode",
                schema::one_of("How the source is fitted to the size", &resize_labels, "Crop and resize"),
            ),
            ("mask_image_path", schema::string("Inpainting mask; white areas are regenerated")),
            (
                "inpainting_mask_invert",
                schema::integer("1 regenerates the black areas instead", 0, 1, Some(0)),
            ),
            (
                "inpainting_fill_mode",
                schema::one_of(
                    "Initial content of the masked area",
                    &["fill", "original", "latent_noise", "latent_nothing"],
                    "original",
                ),
            ),
            ("mask_blur", schema::integer("Mask edge blur in pixels", 0, 64, Some(4))),
            ("inpaint_full_res", schema::boolean("Inpaint the masked area at full resolution", true)),
            (
                "inpaint_full_res_padding",
                schema::integer("Padding around the masked area in pixels", 0, 256, Some(32)),
            ),
        ]);
        schema::object(
            properties,
            &["prompt", "input_image_path", "output_path", "width", "height"],
        )
    }

    async fn call(&self, arguments: &Map<String, Value>) -> Result<String> {
        let args = Arguments::new(arguments);
        let dimensions = (args.required_u32("width")?, args.required_u32("height")?);
        let defaults = &self.ctx.pipeline.config().default_params;
        let mut request = parse_request(
            &self.ctx,
            &args,
            GenerationMode::Img2Img,
            defaults,
            dimensions,
        )?;
        request.source = Some(self.parse_source(&args)?);

        let outcome = self.ctx.pipeline.run(request).await?;
        Ok(img2img_report(&outcome))
    }
}
