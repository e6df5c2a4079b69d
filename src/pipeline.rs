//! Generation pipeline: compose, reconcile, build, invoke, materialize

use crate::config::Config;
use crate::error::Result;
use crate::materialize::{Materializer, SavedImage};
use crate::payload::{self, Payload};
use crate::prompt;
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::request::{GenerationMode, GenerationRequest};
use std::sync::Arc;
use tokio::sync::Mutex;
use webui::{WebUiApi, WebUiError};

/// Everything a tool report needs about a finished generation
#[derive(Debug)]
pub struct GenerationOutcome {
    /// Request as sent, with composed prompts and final output path
    pub request: GenerationRequest,
    /// Prompt before composition
    pub original_prompt: String,
    pub reconcile: ReconcileReport,
    pub image: SavedImage,
}

pub struct Pipeline {
    config: Arc<Config>,
    backend: Arc<dyn WebUiApi>,
    materializer: Materializer,
    /// Held across reconcile and invoke so concurrent calls cannot swap the
    /// checkpoint under each other
    generation_lock: Option<Mutex<()>>,
}

impl Pipeline {
    pub fn new(config: Arc<Config>, backend: Arc<dyn WebUiApi>) -> Self {
        let materializer = Materializer::new(config.output_base_dir(), config.transparency);
        let generation_lock = config.serialize_generation.then(|| Mutex::new(()));
        Self {
            config,
            backend,
            materializer,
            generation_lock,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    /// Run one generation. Validation happens before any backend call.
    pub async fn run(&self, mut request: GenerationRequest) -> Result<GenerationOutcome> {
        request.validate()?;

        let original_prompt = request.prompt.clone();
        let composed = prompt::compose(
            &self.config.prompt_suggestions,
            &request.prompt,
            &request.negative_prompt,
            request.style,
            request.mode,
        );
        request.prompt = composed.prompt;
        request.negative_prompt = composed.negative_prompt;
        if request.mode == GenerationMode::Transparent {
            request.output_path = payload::png_output_path(&request.output_path);
        }

        let payload = payload::build(&request);
        tracing::debug!("Payload: {}", payload::to_json(&payload));

        let (response, reconcile) = {
            let _guard = match &self.generation_lock {
                Some(lock) => Some(lock.lock().await),
                None => None,
            };

            let reconcile = Reconciler::new(self.backend.as_ref())
                .reconcile(&request.model_name, request.vae_name.as_deref())
                .await;
            reconcile.log(&request.model_name, request.vae_name.as_deref());

            tracing::info!(
                "Generating {}x{} image ({:?}, {} steps)",
                request.width,
                request.height,
                request.mode,
                request.steps
            );
            let response = match &payload {
                Payload::Txt2Img(p) => self.backend.txt2img(p).await,
                Payload::Img2Img(p) => self.backend.img2img(p).await,
            }?;
            (response, reconcile)
        };

        let encoded = response.images.first().ok_or_else(|| {
            WebUiError::MalformedResponse("response contains no images".into())
        })?;
        let image = self
            .materializer
            .materialize(encoded, &request.output_path, request.mode)?;

        Ok(GenerationOutcome {
            request,
            original_prompt,
            reconcile,
            image,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::Style;
    use crate::request::Img2ImgSource;
    use crate::test_support::{FakeBackend, png_base64};
    use std::path::Path;
    use std::time::Duration;

    fn config(dir: &Path) -> Arc<Config> {
        let mut config = Config::new("http://127.0.0.1:7860", "default-model");
        config.output_dir = Some(dir.to_path_buf());
        Arc::new(config)
    }

    fn request(mode: GenerationMode, output: &str) -> GenerationRequest {
        GenerationRequest {
            mode,
            prompt: "cat".into(),
            negative_prompt: String::new(),
            width: 512,
            height: 512,
            steps: 20,
            cfg_scale: 7.5,
            sampler: "Euler a".into(),
            style: Style::None,
            model_name: "default-model".into(),
            vae_name: None,
            output_path: output.into(),
            source: None,
        }
    }

    #[tokio::test]
    async fn test_standard_generation() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(
            FakeBackend::with_model("default-model [123]")
                .returning_image(png_base64(512, 512, [200, 10, 10])),
        );
        let pipeline = Pipeline::new(config(dir.path()), backend.clone());

        let outcome = pipeline
            .run(request(GenerationMode::Standard, "out/cat.png"))
            .await
            .unwrap();

        assert_eq!(outcome.image.path, dir.path().join("out/cat.png"));
        assert!(outcome.image.path.exists());
        assert_eq!(outcome.image.dimensions, Some((512, 512)));
        assert_eq!(backend.calls(), vec!["get_options", "txt2img"]);
    }

    #[tokio::test]
    async fn test_transparent_rewrites_extension() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(
            FakeBackend::with_model("default-model").returning_image(png_base64(8, 8, [255; 3])),
        );
        let pipeline = Pipeline::new(config(dir.path()), backend.clone());

        let outcome = pipeline
            .run(request(GenerationMode::Transparent, "apple.jpg"))
            .await
            .unwrap();

        assert_eq!(outcome.request.output_path, "apple.png");
        assert!(outcome.request.prompt.contains(prompt::TRANSPARENT_PROMPT));
        assert!(outcome.image.transparency.is_some());
        let payload = &backend.txt2img_payloads.lock().unwrap()[0];
        assert!(payload.deterministic.is_some());
    }

    #[tokio::test]
    async fn test_validation_failure_makes_no_calls() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeBackend::with_model("m"));
        let pipeline = Pipeline::new(config(dir.path()), backend.clone());

        let mut bad = request(GenerationMode::Standard, "x.png");
        bad.width = 4096;
        assert!(pipeline.run(bad).await.is_err());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_model_switch_failure_does_not_abort() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FakeBackend::with_model("other").returning_image(png_base64(4, 4, [0; 3]));
        backend.set_fail = true;
        let backend = Arc::new(backend);
        let pipeline = Pipeline::new(config(dir.path()), backend.clone());

        let outcome = pipeline
            .run(request(GenerationMode::Standard, "a.png"))
            .await
            .unwrap();
        assert!(outcome.reconcile.model.is_err());
        assert_eq!(backend.calls(), vec!["get_options", "set_options", "txt2img"]);
    }

    #[tokio::test]
    async fn test_backend_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeBackend::with_model("default-model").returning_error(
            WebUiError::Rejected {
                status: 500,
                body: "CUDA out of memory".into(),
            },
        ));
        let pipeline = Pipeline::new(config(dir.path()), backend);

        let err = pipeline
            .run(request(GenerationMode::Standard, "a.png"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("CUDA out of memory"));
        assert!(!dir.path().join("a.png").exists());
    }

    #[tokio::test]
    async fn test_img2img_uses_img2img_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(
            FakeBackend::with_model("default-model").returning_image(png_base64(4, 4, [1; 3])),
        );
        let pipeline = Pipeline::new(config(dir.path()), backend.clone());

        let mut r = request(GenerationMode::Img2Img, "edit.png");
        r.source = Some(Img2ImgSource::new("in.png", b"png".to_vec()));
        pipeline.run(r).await.unwrap();
        assert_eq!(backend.calls(), vec!["get_options", "img2img"]);
        assert_eq!(backend.img2img_payloads.lock().unwrap().len(), 1);
    }

    fn slow_backend() -> Arc<FakeBackend> {
        Arc::new(
            FakeBackend::with_model("other")
                .returning_image(png_base64(4, 4, [0; 3]))
                .with_delay(Duration::from_millis(20)),
        )
    }

    fn two_models() -> (GenerationRequest, GenerationRequest) {
        let mut first = request(GenerationMode::Standard, "a.png");
        first.model_name = "alpha".into();
        let mut second = request(GenerationMode::Standard, "b.png");
        second.model_name = "beta".into();
        (first, second)
    }

    #[tokio::test]
    async fn test_serialized_runs_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let backend = slow_backend();
        let pipeline = Pipeline::new(config(dir.path()), backend.clone());

        let (first, second) = two_models();
        let (a, b) = tokio::join!(pipeline.run(first), pipeline.run(second));
        a.unwrap();
        b.unwrap();

        let one_run = ["get_options", "set_options", "txt2img"];
        assert_eq!(backend.calls(), [one_run, one_run].concat());
        let switched: Vec<_> = backend
            .updates
            .lock()
            .unwrap()
            .iter()
            .filter_map(|u| u.sd_model_checkpoint.clone())
            .collect();
        assert_eq!(switched, vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn test_unserialized_runs_may_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::new("http://127.0.0.1:7860", "default-model");
        config.output_dir = Some(dir.path().to_path_buf());
        config.serialize_generation = false;
        let backend = slow_backend();
        let pipeline = Pipeline::new(Arc::new(config), backend.clone());

        let (first, second) = two_models();
        let (a, b) = tokio::join!(pipeline.run(first), pipeline.run(second));
        a.unwrap();
        b.unwrap();

        assert_eq!(backend.calls()[..2], ["get_options", "get_options"]);
    }
}
