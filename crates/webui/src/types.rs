//! Request and response bodies of the WebUI HTTP API

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `GET /sdapi/v1/options` (only the fields this crate reads are typed)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Options {
    #[serde(default)]
    pub sd_model_checkpoint: Option<String>,
    #[serde(default)]
    pub sd_vae: Option<String>,
    #[serde(default, rename = "CLIP_stop_at_last_layers")]
    pub clip_stop_at_last_layers: Option<i64>,
    #[serde(default)]
    pub eta_noise_seed_delta: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `POST /sdapi/v1/options`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OptionsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sd_model_checkpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sd_vae: Option<String>,
}

impl OptionsUpdate {
    pub fn model(name: impl Into<String>) -> Self {
        Self {
            sd_model_checkpoint: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn vae(name: impl Into<String>) -> Self {
        Self {
            sd_vae: Some(name.into()),
            ..Default::default()
        }
    }
}

/// Fields shared by txt2img and img2img requests
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommonParams {
    pub prompt: String,
    pub negative_prompt: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg_scale: f64,
    pub sampler_index: String,
    pub n_iter: u32,
    pub batch_size: u32,
    pub seed: i64,
    pub override_settings: Map<String, Value>,
}

/// Fixed sampler settings that keep transparency post-processing predictable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeterministicSampling {
    pub enable_hr: bool,
    pub restore_faces: bool,
    pub tiling: bool,
    pub eta: f64,
    pub s_churn: f64,
    pub s_tmax: f64,
    pub s_tmin: f64,
    pub s_noise: f64,
}

impl Default for DeterministicSampling {
    fn default() -> Self {
        Self {
            enable_hr: false,
            restore_faces: false,
            tiling: false,
            eta: 0.0,
            s_churn: 0.0,
            s_tmax: 0.0,
            s_tmin: 0.0,
            s_noise: 1.0,
        }
    }
}

/// `POST {endpoint}` (txt2img)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Txt2ImgPayload {
    #[serde(flatten)]
    pub common: CommonParams,
    #[serde(flatten)]
    pub deterministic: Option<DeterministicSampling>,
}

/// Inpainting fields, present only when a mask is supplied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaskParams {
    pub mask: String,
    pub inpainting_mask_invert: u8,
}

/// `POST /sdapi/v1/img2img`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Img2ImgPayload {
    pub init_images: Vec<String>,
    #[serde(flatten)]
    pub common: CommonParams,
    pub denoising_strength: f64,
    pub resize_mode: u8,
    pub mask_blur: u32,
    pub inpainting_fill: u8,
    pub inpaint_full_res: bool,
    pub inpaint_full_res_padding: u32,
    #[serde(flatten)]
    pub mask: Option<MaskParams>,
}

/// Successful generation response; `images` is guaranteed non-empty
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationResponse {
    pub images: Vec<String>,
    #[serde(default)]
    pub parameters: Option<Value>,
    #[serde(default)]
    pub info: Option<Value>,
}

/// Entry of `GET /sdapi/v1/sd-models`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SdModel {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub config: Option<Value>,
}

/// Entry of `GET /sdapi/v1/sd-vae`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SdVae {
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub filename: String,
}

/// `GET /controlnet/model_list`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ControlNetModels {
    #[serde(default)]
    pub model_list: Vec<String>,
}
