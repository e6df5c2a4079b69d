//! Stable Diffusion WebUI API client

use crate::error::{Result, WebUiError};
use crate::types::*;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Default txt2img endpoint, relative to the base URL
pub const DEFAULT_TXT2IMG_ENDPOINT: &str = "/sdapi/v1/txt2img";
pub const IMG2IMG_ENDPOINT: &str = "/sdapi/v1/img2img";
pub const OPTIONS_ENDPOINT: &str = "/sdapi/v1/options";

/// Operations the tool layer needs from the backend
#[async_trait]
pub trait WebUiApi: Send + Sync {
    /// Current backend settings (loaded checkpoint, VAE, ...)
    async fn get_options(&self) -> Result<Options>;

    /// Change backend settings
    async fn set_options(&self, update: &OptionsUpdate) -> Result<()>;

    /// Text-to-image generation
    async fn txt2img(&self, payload: &Txt2ImgPayload) -> Result<GenerationResponse>;

    /// Image-to-image / inpainting generation
    async fn img2img(&self, payload: &Img2ImgPayload) -> Result<GenerationResponse>;

    async fn sd_models(&self) -> Result<Vec<SdModel>>;

    async fn sd_vaes(&self) -> Result<Vec<SdVae>>;

    async fn hypernetworks(&self) -> Result<Vec<Value>>;

    async fn system_info(&self) -> Result<Value>;

    async fn controlnet_models(&self) -> Result<Vec<String>>;
}

/// reqwest-backed [`WebUiApi`] implementation
#[derive(Debug, Clone)]
pub struct WebUiClient {
    client: reqwest::Client,
    base_url: String,
    txt2img_endpoint: String,
    generation_timeout: Duration,
    options_timeout: Duration,
}

impl WebUiClient {
    /// Create a client for a WebUI instance, e.g. `http://127.0.0.1:7860`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            txt2img_endpoint: DEFAULT_TXT2IMG_ENDPOINT.to_string(),
            generation_timeout: Duration::from_secs(300),
            options_timeout: Duration::from_secs(30),
        }
    }

    /// Override the txt2img endpoint path
    pub fn with_txt2img_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.txt2img_endpoint = endpoint.into();
        self
    }

    /// Set the generation and auxiliary-call timeouts
    pub fn with_timeouts(mut self, generation: Duration, options: Duration) -> Self {
        self.generation_timeout = generation;
        self.options_timeout = options;
        self
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check that the backend answers on its root URL
    pub async fn probe(&self) -> Result<()> {
        let response = self
            .client
            .get(self.url("/"))
            .timeout(self.options_timeout)
            .send()
            .await?;
        Self::ensure_ok(response).await?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .timeout(self.options_timeout)
            .send()
            .await?;
        let response = Self::ensure_ok(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| WebUiError::MalformedResponse(format!("{path}: {e}")))
    }

    async fn generate<P: serde::Serialize + Sync>(
        &self,
        path: &str,
        payload: &P,
    ) -> Result<GenerationResponse> {
        let url = self.url(path);
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(payload)
            .timeout(self.generation_timeout)
            .send()
            .await?;
        let response = Self::ensure_ok(response).await?;
        let body = response.text().await?;

        parse_generation_response(&body)
    }

    /// Turn any status other than 200 into [`WebUiError::Rejected`]
    async fn ensure_ok(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status != StatusCode::OK {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(WebUiError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Validate a generation response body: it must be JSON with a non-empty `images` array
pub fn parse_generation_response(body: &str) -> Result<GenerationResponse> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| WebUiError::MalformedResponse(format!("invalid JSON: {e}")))?;

    match value.get("images") {
        Some(Value::Array(images)) if !images.is_empty() => {}
        Some(Value::Array(_)) => {
            return Err(WebUiError::MalformedResponse("empty images array".into()));
        }
        _ => {
            return Err(WebUiError::MalformedResponse("no images in response".into()));
        }
    }

    serde_json::from_value(value)
        .map_err(|e| WebUiError::MalformedResponse(format!("unexpected images payload: {e}")))
}

#[async_trait]
impl WebUiApi for WebUiClient {
    async fn get_options(&self) -> Result<Options> {
        self.get_json(OPTIONS_ENDPOINT).await
    }

    async fn set_options(&self, update: &OptionsUpdate) -> Result<()> {
        let response = self
            .client
            .post(self.url(OPTIONS_ENDPOINT))
            .json(update)
            .timeout(self.options_timeout)
            .send()
            .await?;
        Self::ensure_ok(response).await?;
        Ok(())
    }

    async fn txt2img(&self, payload: &Txt2ImgPayload) -> Result<GenerationResponse> {
        self.generate(&self.txt2img_endpoint, payload).await
    }

    async fn img2img(&self, payload: &Img2ImgPayload) -> Result<GenerationResponse> {
        self.generate(IMG2IMG_ENDPOINT, payload).await
    }

    async fn sd_models(&self) -> Result<Vec<SdModel>> {
        self.get_json("/sdapi/v1/sd-models").await
    }

    async fn sd_vaes(&self) -> Result<Vec<SdVae>> {
        self.get_json("/sdapi/v1/sd-vae").await
    }

    async fn hypernetworks(&self) -> Result<Vec<Value>> {
        self.get_json("/sdapi/v1/hypernetworks").await
    }

    async fn system_info(&self) -> Result<Value> {
        self.get_json("/sdapi/v1/system-info").await
    }

    async fn controlnet_models(&self) -> Result<Vec<String>> {
        let models: ControlNetModels = self.get_json("/controlnet/model_list").await?;
        Ok(models.model_list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generation_response() {
        let ok = parse_generation_response(r#"{"images":["aGk="],"info":"{}"}"#).unwrap();
        assert_eq!(ok.images, vec!["aGk=".to_string()]);

        for body in [r#"{}"#, r#"{"images":[]}"#, r#"{"images":null}"#, "not json"] {
            assert!(
                matches!(parse_generation_response(body), Err(WebUiError::MalformedResponse(_))),
                "body {body} should be malformed"
            );
        }
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = WebUiClient::new("http://127.0.0.1:7860/");
        assert_eq!(client.base_url(), "http://127.0.0.1:7860");
        assert_eq!(client.url(OPTIONS_ENDPOINT), "http://127.0.0.1:7860/sdapi/v1/options");
    }
}
