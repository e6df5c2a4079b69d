//! Read-only backend introspection tools

use super::schema;
use super::{Tool, ToolContext};
use crate::error::Result;
use crate::reconcile::model_is_loaded;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt::Write;
use std::sync::Arc;
use webui::{Options, SdModel, SdVae};

const CONTROLNET_PREVIEW: usize = 3;
const VAE_PREVIEW: usize = 5;

fn no_arguments() -> Value {
    schema::object(Vec::new(), &[])
}

fn short_hash(model: &SdModel) -> String {
    model
        .hash
        .as_deref()
        .filter(|h| !h.is_empty())
        .map(|h| h.chars().take(8).collect())
        .unwrap_or_else(|| "Unknown".to_string())
}

pub fn models_report(models: &[SdModel], current: &str, hypernetworks: usize) -> String {
    let mut report = String::new();
    let _ = writeln!(report, "Available models ({}):", models.len());
    let _ = writeln!(report, "Current model: {current}");
    let _ = writeln!(report, "Hypernetworks: {hypernetworks}");
    let _ = writeln!(report);

    for (i, model) in models.iter().enumerate() {
        let _ = writeln!(report, "{}. {}", i + 1, model.title);
        let _ = writeln!(report, "   File: {}", model.filename);
        let _ = writeln!(report, "   Hash: {}", short_hash(model));
        if !model.model_name.is_empty() && model_is_loaded(current, &model.model_name) {
            let _ = writeln!(report, "   [current]");
        }
        let _ = writeln!(report);
    }

    report.push_str("Tips:\n");
    report.push_str("- Pass model_name to a generation tool to switch checkpoints\n");
    report.push_str("- The hash identifies the exact checkpoint version\n");
    report.push_str("- Hypernetworks can strengthen particular styles or features");
    report
}

pub struct ListModelsTool {
    ctx: Arc<ToolContext>,
}

impl ListModelsTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for ListModelsTool {
    fn name(&self) -> &'static str {
        "get_models"
    }

    fn description(&self) -> &'static str {
        "List the checkpoints available on the backend and mark the loaded one"
    }

    fn input_schema(&self) -> Value {
        no_arguments()
    }

    async fn call(&self, _arguments: &Map<String, Value>) -> Result<String> {
        let backend = &self.ctx.backend;
        let models = backend.sd_models().await?;
        let options = backend.get_options().await?;
        let hypernetworks = match backend.hypernetworks().await {
            Ok(list) => list.len(),
            Err(e) => {
                tracing::debug!("Hypernetworks unavailable: {}", e);
                0
            }
        };

        let current = options
            .sd_model_checkpoint
            .unwrap_or_else(|| "Unknown".to_string());
        Ok(models_report(&models, &current, hypernetworks))
    }
}

fn info_field(info: &Value, key: &str, default: &str) -> String {
    match info.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => default.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Optional introspection results; `None` means the endpoint was unavailable
pub struct BackendDetails {
    pub options: Options,
    pub system_info: Option<Value>,
    pub vaes: Option<Vec<SdVae>>,
    pub controlnet: Option<Vec<String>>,
}

pub fn details_report(details: &BackendDetails) -> String {
    let options = &details.options;
    let mut report = String::from("Model details:\n\n");
    let _ = writeln!(
        report,
        "Current model: {}",
        options.sd_model_checkpoint.as_deref().unwrap_or("Unknown")
    );
    let _ = writeln!(report, "VAE: {}", options.sd_vae.as_deref().unwrap_or("None"));
    let _ = writeln!(report, "CLIP skip: {}", options.clip_stop_at_last_layers.unwrap_or(1));
    let _ = writeln!(
        report,
        "ETA noise seed delta: {}",
        options.eta_noise_seed_delta.unwrap_or(0)
    );

    match &details.controlnet {
        Some(models) => {
            report.push_str("ControlNet: available\n");
            if !models.is_empty() {
                let _ = writeln!(report, "ControlNet models ({}):", models.len());
                for (i, model) in models.iter().take(CONTROLNET_PREVIEW).enumerate() {
                    let _ = writeln!(report, "   {}. {}", i + 1, model);
                }
                if models.len() > CONTROLNET_PREVIEW {
                    let _ = writeln!(report, "   ... and {} more", models.len() - CONTROLNET_PREVIEW);
                }
            }
        }
        None => report.push_str("ControlNet: not installed\n"),
    }
    report.push('\n');

    if let Some(vaes) = details.vaes.as_ref().filter(|v| !v.is_empty()) {
        let _ = writeln!(report, "Available VAEs ({}):", vaes.len());
        for (i, vae) in vaes.iter().take(VAE_PREVIEW).enumerate() {
            let _ = writeln!(report, "   {}. {}", i + 1, vae.model_name);
        }
        if vaes.len() > VAE_PREVIEW {
            let _ = writeln!(report, "   ... and {} more", vaes.len() - VAE_PREVIEW);
        }
        report.push('\n');
    }

    let info = details.system_info.clone().unwrap_or(Value::Null);
    report.push_str("System:\n");
    let _ = writeln!(report, "   Python: {}", info_field(&info, "python_version", "Unknown"));
    let _ = writeln!(report, "   PyTorch: {}", info_field(&info, "torch_version", "Unknown"));
    let _ = writeln!(report, "   CUDA available: {}", info_field(&info, "cuda_available", "false"));
    let _ = write!(report, "   GPU count: {}", info_field(&info, "gpu_count", "0"));
    report
}

pub struct ModelDetailsTool {
    ctx: Arc<ToolContext>,
}

impl ModelDetailsTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for ModelDetailsTool {
    fn name(&self) -> &'static str {
        "get_model_details"
    }

    fn description(&self) -> &'static str {
        "Show the loaded checkpoint, VAE, CLIP skip, ControlNet models and system information"
    }

    fn input_schema(&self) -> Value {
        no_arguments()
    }

    async fn call(&self, _arguments: &Map<String, Value>) -> Result<String> {
        let backend = &self.ctx.backend;
        let options = backend.get_options().await?;

        let system_info = backend
            .system_info()
            .await
            .inspect_err(|e| tracing::debug!("System info unavailable: {}", e))
            .ok();
        let vaes = backend
            .sd_vaes()
            .await
            .inspect_err(|e| tracing::debug!("VAE list unavailable: {}", e))
            .ok();
        let controlnet = backend
            .controlnet_models()
            .await
            .inspect_err(|e| tracing::debug!("ControlNet unavailable: {}", e))
            .ok();

        Ok(details_report(&BackendDetails {
            options,
            system_info,
            vaes,
            controlnet,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    Anime,
    Realistic,
    Artistic,
    General,
}

struct Recommendation {
    family: ModelFamily,
    keywords: &'static [&'static str],
    samplers: &'static [&'static str],
    cfg_scale: &'static str,
    steps: &'static str,
    description: &'static str,
}

static RECOMMENDATIONS: [Recommendation; 3] = [
    Recommendation {
        family: ModelFamily::Anime,
        keywords: &["anything", "anime", "nai"],
        samplers: &["DPM++ 2M Karras", "Euler a", "DDIM"],
        cfg_scale: "7-12",
        steps: "20-30",
        description: "Anime model, suited to illustrated characters and scenes",
    },
    Recommendation {
        family: ModelFamily::Realistic,
        keywords: &["realistic", "photo", "real"],
        samplers: &["DPM++ SDE Karras", "DPM++ 2M Karras", "Heun"],
        cfg_scale: "5-8",
        steps: "30-50",
        description: "Realistic model, suited to lifelike people and scenes",
    },
    Recommendation {
        family: ModelFamily::Artistic,
        keywords: &["art", "painting", "illustration"],
        samplers: &["DDIM", "PLMS", "UniPC"],
        cfg_scale: "6-10",
        steps: "25-40",
        description: "Artistic model, suited to painterly work",
    },
];

impl ModelFamily {
    pub fn classify(checkpoint: &str) -> Self {
        let lower = checkpoint.to_lowercase();
        RECOMMENDATIONS
            .iter()
            .find(|rec| rec.keywords.iter().any(|k| lower.contains(k)))
            .map(|rec| rec.family)
            .unwrap_or(ModelFamily::General)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::Anime => "ANIME",
            ModelFamily::Realistic => "REALISTIC",
            ModelFamily::Artistic => "ARTISTIC",
            ModelFamily::General => "GENERAL",
        }
    }

    fn recommendation(&self) -> Option<&'static Recommendation> {
        RECOMMENDATIONS.iter().find(|rec| rec.family == *self)
    }
}

pub fn recommendations_report(checkpoint: &str) -> String {
    let family = ModelFamily::classify(checkpoint);
    let mut report = String::from("Model recommendations:\n\n");
    let _ = writeln!(report, "Model type: {}", family.as_str());
    let _ = writeln!(report, "Current model: {checkpoint}");
    report.push('\n');

    if let Some(rec) = family.recommendation() {
        let _ = writeln!(report, "{}", rec.description);
        report.push_str("Recommended settings:\n");
        let _ = writeln!(report, "   Sampler: {}", rec.samplers[..2].join(", "));
        let _ = writeln!(report, "   CFG scale: {}", rec.cfg_scale);
        let _ = writeln!(report, "   Steps: {}", rec.steps);
        report.push('\n');
    }

    report.push_str("General practice:\n");
    report.push_str("- DPM++ samplers favour quality, Euler samplers favour speed\n");
    report.push_str("- CFG scale 7-9 is balanced; higher oversaturates, lower blurs\n");
    report.push_str("- 20-30 steps is usually enough\n");
    report.push_str("- A fitting negative prompt noticeably improves results\n");
    report.push_str("- Use a VAE that matches the checkpoint for better colour\n");
    report.push_str("- Start at 512x512 or 512x768 before going larger");
    report
}

pub struct ModelRecommendationsTool {
    ctx: Arc<ToolContext>,
}

impl ModelRecommendationsTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for ModelRecommendationsTool {
    fn name(&self) -> &'static str {
        "get_model_recommendations"
    }

    fn description(&self) -> &'static str {
        "Suggest sampler, CFG scale and steps for the loaded checkpoint"
    }

    fn input_schema(&self) -> Value {
        no_arguments()
    }

    async fn call(&self, _arguments: &Map<String, Value>) -> Result<String> {
        let checkpoint = match self.ctx.backend.get_options().await {
            Ok(options) => options.sd_model_checkpoint.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Could not read current model: {}", e);
                String::new()
            }
        };
        Ok(recommendations_report(&checkpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(ModelFamily::classify("anything-v5 [7f96a1a9ca]"), ModelFamily::Anime);
        assert_eq!(ModelFamily::classify("RealisticVision"), ModelFamily::Realistic);
        assert_eq!(ModelFamily::classify("dreamshaper_8"), ModelFamily::General);
        assert_eq!(ModelFamily::classify(""), ModelFamily::General);
    }

    #[test]
    fn test_recommendations_report() {
        let report = recommendations_report("photon_v1");
        assert!(report.contains("Model type: REALISTIC"));
        assert!(report.contains("Sampler: DPM++ SDE Karras, DPM++ 2M Karras"));

        let report = recommendations_report("sdxl_base");
        assert!(report.contains("GENERAL"));
        assert!(!report.contains("Recommended settings"));
    }

    #[test]
    fn test_models_report_marks_current() {
        let models = vec![
            SdModel {
                title: "alpha.safetensors [1234567890]".into(),
                model_name: "alpha".into(),
                filename: "/m/alpha.safetensors".into(),
                hash: Some("1234567890".into()),
                ..Default::default()
            },
            SdModel {
                title: "beta.safetensors".into(),
                model_name: "beta".into(),
                filename: "/m/beta.safetensors".into(),
                ..Default::default()
            },
        ];
        let report = models_report(&models, "beta.safetensors [ffff]", 2);
        assert!(report.contains("Available models (2):"));
        assert!(report.contains("Hash: 12345678\n"));
        assert!(report.contains("Hash: Unknown"));
        let marked: Vec<_> = report.match_indices("[current]").collect();
        assert_eq!(marked.len(), 1);
        assert!(report.find("[current]") > report.find("2. beta.safetensors"));
    }

    #[test]
    fn test_details_report_without_optional_endpoints() {
        let report = details_report(&BackendDetails {
            options: Options {
                sd_model_checkpoint: Some("a [1]".into()),
                clip_stop_at_last_layers: Some(2),
                ..Default::default()
            },
            system_info: None,
            vaes: None,
            controlnet: None,
        });
        assert!(report.contains("Current model: a [1]"));
        assert!(report.contains("VAE: None"));
        assert!(report.contains("CLIP skip: 2"));
        assert!(report.contains("ControlNet: not installed"));
        assert!(report.contains("Python: Unknown"));
    }

    #[test]
    fn test_details_report_truncates_lists() {
        let report = details_report(&BackendDetails {
            options: Options::default(),
            system_info: Some(serde_json::json!({"python_version": "3.10.6", "gpu_count": 1})),
            vaes: Some(
                (0..7)
                    .map(|i| SdVae {
                        model_name: format!("vae{i}"),
                        filename: String::new(),
                    })
                    .collect(),
            ),
            controlnet: Some((0..4).map(|i| format!("cn{i}")).collect()),
        });
        assert!(report.contains("ControlNet models (4):"));
        assert!(report.contains("... and 1 more"));
        assert!(report.contains("... and 2 more"));
        assert!(report.contains("Python: 3.10.6"));
        assert!(report.contains("GPU count: 1"));
    }
}
