//! Shared fixtures for unit tests

use async_trait::async_trait;
use base64::Engine;
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;
use webui::*;

/// In-memory backend that records every call
pub struct FakeBackend {
    pub options: Mutex<Options>,
    pub options_fail: bool,
    pub set_fail: bool,
    pub generation: Mutex<Option<webui::Result<GenerationResponse>>>,
    pub calls: Mutex<Vec<String>>,
    pub updates: Mutex<Vec<OptionsUpdate>>,
    pub txt2img_payloads: Mutex<Vec<Txt2ImgPayload>>,
    pub img2img_payloads: Mutex<Vec<Img2ImgPayload>>,
    /// Sleep after recording each options or generation call
    pub delay: Option<Duration>,
}

impl FakeBackend {
    pub fn with_model(model: &str) -> Self {
        Self {
            options: Mutex::new(Options {
                sd_model_checkpoint: Some(model.to_string()),
                ..Default::default()
            }),
            options_fail: false,
            set_fail: false,
            generation: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
            txt2img_payloads: Mutex::new(Vec::new()),
            img2img_payloads: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every generation call answers with this image
    pub fn returning_image(self, b64: String) -> Self {
        *self.generation.lock().unwrap() = Some(Ok(GenerationResponse {
            images: vec![b64],
            parameters: None,
            info: None,
        }));
        self
    }

    pub fn returning_error(self, error: WebUiError) -> Self {
        *self.generation.lock().unwrap() = Some(Err(error));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn generated(&self) -> webui::Result<GenerationResponse> {
        let mut slot = self.generation.lock().unwrap();
        match slot.take() {
            Some(Ok(response)) => {
                *slot = Some(Ok(response.clone()));
                Ok(response)
            }
            Some(Err(e)) => Err(e),
            None => Err(WebUiError::MalformedResponse("no images".into())),
        }
    }
}

#[async_trait]
impl WebUiApi for FakeBackend {
    async fn get_options(&self) -> webui::Result<Options> {
        self.record("get_options");
        self.pause().await;
        if self.options_fail {
            return Err(WebUiError::Rejected {
                status: 500,
                body: "options unavailable".into(),
            });
        }
        Ok(self.options.lock().unwrap().clone())
    }

    async fn set_options(&self, update: &OptionsUpdate) -> webui::Result<()> {
        self.record("set_options");
        self.pause().await;
        self.updates.lock().unwrap().push(update.clone());
        if self.set_fail {
            return Err(WebUiError::Rejected {
                status: 422,
                body: "unknown checkpoint".into(),
            });
        }
        let mut options = self.options.lock().unwrap();
        if let Some(model) = &update.sd_model_checkpoint {
            options.sd_model_checkpoint = Some(model.clone());
        }
        if let Some(vae) = &update.sd_vae {
            options.sd_vae = Some(vae.clone());
        }
        Ok(())
    }

    async fn txt2img(&self, payload: &Txt2ImgPayload) -> webui::Result<GenerationResponse> {
        self.record("txt2img");
        self.pause().await;
        self.txt2img_payloads.lock().unwrap().push(payload.clone());
        self.generated()
    }

    async fn img2img(&self, payload: &Img2ImgPayload) -> webui::Result<GenerationResponse> {
        self.record("img2img");
        self.img2img_payloads.lock().unwrap().push(payload.clone());
        self.generated()
    }

    async fn sd_models(&self) -> webui::Result<Vec<SdModel>> {
        self.record("sd_models");
        Ok(vec![
            SdModel {
                title: "anything-v5.safetensors [7f96a1a9ca]".into(),
                model_name: "anything-v5".into(),
                filename: "/models/Stable-diffusion/anything-v5.safetensors".into(),
                hash: Some("7f96a1a9ca".into()),
                ..Default::default()
            },
            SdModel {
                title: "realisticVision.safetensors [c0d1994c73]".into(),
                model_name: "realisticVision".into(),
                filename: "/models/Stable-diffusion/realisticVision.safetensors".into(),
                ..Default::default()
            },
        ])
    }

    async fn sd_vaes(&self) -> webui::Result<Vec<SdVae>> {
        self.record("sd_vaes");
        Ok(vec![SdVae {
            model_name: "kl-f8-anime2".into(),
            filename: "/models/VAE/kl-f8-anime2.ckpt".into(),
        }])
    }

    async fn hypernetworks(&self) -> webui::Result<Vec<Value>> {
        self.record("hypernetworks");
        Ok(Vec::new())
    }

    async fn system_info(&self) -> webui::Result<Value> {
        self.record("system_info");
        Ok(serde_json::json!({"Platform": "Linux", "Version": "v1.10.1"}))
    }

    async fn controlnet_models(&self) -> webui::Result<Vec<String>> {
        self.record("controlnet_models");
        Err(WebUiError::Rejected {
            status: 404,
            body: "Not Found".into(),
        })
    }
}

/// Base64 PNG of a solid-colour image
pub fn png_base64(width: u32, height: u32, rgb: [u8; 3]) -> String {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    base64::engine::general_purpose::STANDARD.encode(bytes.into_inner())
}
