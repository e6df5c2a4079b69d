//! Translate a composed request into a WebUI payload

use crate::request::{GenerationMode, GenerationRequest, Img2ImgSource};
use imagent::encode_base64;
use serde_json::{Map, Value, json};
use std::path::Path;
use webui::{
    CommonParams, DeterministicSampling, Img2ImgPayload, MaskParams, Txt2ImgPayload,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Txt2Img(Txt2ImgPayload),
    Img2Img(Img2ImgPayload),
}

impl Payload {
    pub fn common(&self) -> &CommonParams {
        match self {
            Payload::Txt2Img(p) => &p.common,
            Payload::Img2Img(p) => &p.common,
        }
    }
}

fn common(request: &GenerationRequest) -> CommonParams {
    let mut override_settings = Map::new();
    if request.mode == GenerationMode::Transparent {
        override_settings.insert("CLIP_stop_at_last_layers".into(), json!(1));
    }

    CommonParams {
        prompt: request.prompt.clone(),
        negative_prompt: request.negative_prompt.clone(),
        width: request.width,
        height: request.height,
        steps: request.steps,
        cfg_scale: request.cfg_scale,
        sampler_index: request.sampler.clone(),
        n_iter: 1,
        batch_size: 1,
        seed: -1,
        override_settings,
    }
}

fn img2img(request: &GenerationRequest, source: &Img2ImgSource) -> Img2ImgPayload {
    let mask = source.mask.as_ref().map(|mask| MaskParams {
        mask: encode_base64(mask),
        inpainting_mask_invert: u8::from(source.mask_invert),
    });
    let inpainting_fill = if mask.is_some() {
        source.fill_mode.code()
    } else {
        source.inpainting_fill
    };

    Img2ImgPayload {
        init_images: vec![encode_base64(&source.image)],
        common: common(request),
        denoising_strength: source.denoising_strength,
        resize_mode: source.resize_mode.code(),
        mask_blur: source.mask_blur,
        inpainting_fill,
        inpaint_full_res: source.inpaint_full_res,
        inpaint_full_res_padding: source.inpaint_full_res_padding,
        mask,
    }
}

/// Build the payload for `request`; its prompts are used as given
pub fn build(request: &GenerationRequest) -> Payload {
    match (&request.mode, &request.source) {
        (GenerationMode::Img2Img, Some(source)) => Payload::Img2Img(img2img(request, source)),
        (GenerationMode::Transparent, _) => Payload::Txt2Img(Txt2ImgPayload {
            common: common(request),
            deterministic: Some(DeterministicSampling::default()),
        }),
        _ => Payload::Txt2Img(Txt2ImgPayload {
            common: common(request),
            deterministic: None,
        }),
    }
}

/// Transparent output is always PNG
pub fn png_output_path(output_path: &str) -> String {
    let path = Path::new(output_path);
    let is_png = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"));
    if is_png {
        output_path.to_string()
    } else {
        path.with_extension("png").to_string_lossy().into_owned()
    }
}

/// Serialized payload, for debug logging
pub fn to_json(payload: &Payload) -> Value {
    let value = match payload {
        Payload::Txt2Img(p) => serde_json::to_value(p),
        Payload::Img2Img(p) => serde_json::to_value(p),
    };
    value.unwrap_or(Value::Null)
}
